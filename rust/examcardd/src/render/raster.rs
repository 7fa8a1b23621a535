//! JPEG cards.
//!
//! Boxes, rules, text and the QR code are laid out as SVG and rasterized with resvg; photos, logo
//! and signature are composited onto the result with `image`.

use anyhow::{anyhow, Context};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use super::card::{
    CardContent, COLUMN_DAY, COLUMN_PARAF, COLUMN_SLOT, COLUMN_SUBJECT, COLUMN_TIME,
    PHOTO_PLACEHOLDER, SCHEDULE_TITLE, SIGN_ROLE,
};
use crate::template::{Rect, Rgb, Template, TemplateConfig};

/// Preferred face first; fontdb falls back through the generic family.
const FONT_FAMILY: &str = "Arial, 'Liberation Sans', 'DejaVu Sans', sans-serif";
pub const JPEG_QUALITY: u8 = 95;
const QR_QUIET_MODULES: usize = 2;

/// Font database shared by every card of a batch.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<usvg::fontdb::Database>,
}

impl FontBook {
    /// System fonts plus any `.ttf`/`.otf`/`.ttc` files found directly in `extra_dirs`.
    pub fn load(extra_dirs: &[&Path]) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        for dir in extra_dirs {
            load_fonts_from_dir(&mut db, dir);
        }
        tracing::debug!(faces = db.faces().count(), "font database ready");
        FontBook { db: Arc::new(db) }
    }

    /// No faces at all. Text is skipped; boxes and images still render.
    pub fn empty() -> Self {
        FontBook {
            db: Arc::new(usvg::fontdb::Database::new()),
        }
    }

    pub fn face_count(&self) -> usize {
        self.db.faces().count()
    }
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in rd.flatten() {
        let path = entry.path();
        let is_font = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
            .unwrap_or(false);
        if path.is_file() && is_font {
            let _ = db.load_font_file(&path);
        }
    }
}

fn font_resolver() -> usvg::FontResolver<'static> {
    use usvg::fontdb::{Family, Query, Stretch, Style, Weight};

    usvg::FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families: Vec<Family<'_>> = font
                .families()
                .iter()
                .map(|f| match f {
                    usvg::FontFamily::Named(s) => Family::Name(s),
                    usvg::FontFamily::Serif => Family::Serif,
                    usvg::FontFamily::SansSerif => Family::SansSerif,
                    usvg::FontFamily::Cursive => Family::Cursive,
                    usvg::FontFamily::Fantasy => Family::Fantasy,
                    usvg::FontFamily::Monospace => Family::Monospace,
                })
                .collect();
            families.push(Family::SansSerif);

            let style = match font.style() {
                usvg::FontStyle::Normal => Style::Normal,
                usvg::FontStyle::Italic => Style::Italic,
                usvg::FontStyle::Oblique => Style::Oblique,
            };
            let query = Query {
                families: &families,
                weight: Weight(font.weight()),
                stretch: Stretch::Normal,
                style,
            };
            fontdb
                .query(&query)
                .or_else(|| fontdb.faces().next().map(|f| f.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CardImages<'a> {
    pub photo: Option<&'a DynamicImage>,
    pub logo: Option<&'a DynamicImage>,
    pub signature: Option<&'a DynamicImage>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// `(x, y)` is the top-left corner of the text.
    TopLeft,
    /// `(x, y)` is the center of the text.
    Center,
}

#[derive(Clone, Copy)]
struct TextStyle {
    size: f32,
    bold: bool,
    italic: bool,
    color: Rgb,
}

impl TextStyle {
    fn new(size: f32, color: Rgb) -> Self {
        TextStyle {
            size,
            bold: false,
            italic: false,
            color,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }
}

struct Svg {
    out: String,
}

impl Svg {
    fn new(width: u32, height: u32) -> Self {
        let mut out = String::with_capacity(16 * 1024);
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        );
        Svg { out }
    }

    fn rect(&mut self, r: Rect, fill: Option<Rgb>, stroke: Option<(Rgb, u32)>) {
        let fill = fill.map(Rgb::css).unwrap_or_else(|| "none".to_string());
        let _ = write!(
            self.out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}""#,
            r.x, r.y, r.w, r.h, fill
        );
        if let Some((color, width)) = stroke {
            let _ = write!(
                self.out,
                r#" stroke="{}" stroke-width="{}""#,
                color.css(),
                width
            );
        }
        self.out.push_str("/>");
    }

    fn line(&mut self, from: (u32, u32), to: (u32, u32), color: Rgb, width: u32) {
        let _ = write!(
            self.out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
            from.0,
            from.1,
            to.0,
            to.1,
            color.css(),
            width
        );
    }

    /// `max_width` squeezes text that would overflow its column instead of letting it run into
    /// the neighbouring element.
    fn text(
        &mut self,
        (x, y): (u32, u32),
        text: &str,
        style: TextStyle,
        anchor: Anchor,
        max_width: Option<u32>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let (text_anchor, baseline) = match anchor {
            Anchor::TopLeft => ("start", "hanging"),
            Anchor::Center => ("middle", "central"),
        };
        let _ = write!(
            self.out,
            r#"<text x="{}" y="{}" font-family="{}" font-size="{}" font-weight="{}" font-style="{}" fill="{}" text-anchor="{}" dominant-baseline="{}""#,
            x,
            y,
            FONT_FAMILY,
            style.size,
            if style.bold { "bold" } else { "normal" },
            if style.italic { "italic" } else { "normal" },
            style.color.css(),
            text_anchor,
            baseline
        );
        if let Some(max) = max_width {
            let per_char = if style.bold { 0.62 } else { 0.55 };
            let estimated = text.chars().count() as f32 * style.size * per_char;
            if estimated > max as f32 {
                let _ = write!(
                    self.out,
                    r#" textLength="{}" lengthAdjust="spacingAndGlyphs""#,
                    max
                );
            }
        }
        let _ = write!(self.out, ">{}</text>", escape(text));
    }

    fn path(&mut self, d: &str, fill: Rgb) {
        let _ = write!(self.out, r#"<path d="{}" fill="{}"/>"#, d, fill.css());
    }

    fn finish(mut self) -> String {
        self.out.push_str("</svg>");
        self.out
    }
}

/// Dark modules of the QR symbol as one SVG path filling `area`.
fn qr_path(payload: &str, area: Rect) -> Option<String> {
    let code = match qrcode::QrCode::new(payload.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "qr payload rejected; code omitted");
            return None;
        }
    };
    let n = code.width();
    let module = area.w.min(area.h) as f32 / (n + 2 * QR_QUIET_MODULES) as f32;
    let mut d = String::new();
    for (i, color) in code.to_colors().iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let x = area.x as f32 + (i % n + QR_QUIET_MODULES) as f32 * module;
        let y = area.y as f32 + (i / n + QR_QUIET_MODULES) as f32 * module;
        let _ = write!(
            d,
            "M{:.2} {:.2}h{:.2}v{:.2}h-{:.2}z",
            x, y, module, module, module
        );
    }
    Some(d)
}

/// Column x positions of the timetable: day, slot, time, subject, and paraf when present.
fn schedule_columns(right: Rect, paraf: bool) -> ([u32; 4], Option<u32>) {
    let cols = [right.x + 10, right.x + 150, right.x + 215, right.x + 330];
    (cols, paraf.then_some(right.x + 510))
}

fn build_svg(content: &CardContent, cfg: &TemplateConfig, has_photo: bool) -> String {
    let l = cfg.layout;
    let mut svg = Svg::new(l.width, l.height);
    svg.rect(Rect::new(0, 0, l.width, l.height), Some(cfg.background), None);

    // Identity block.
    let cx = l.left.center_x();
    let header_color = if l.header_band > 0 {
        svg.rect(
            Rect::new(l.left.x, l.left.y, l.left.w, l.header_band),
            Some(cfg.header_fill),
            None,
        );
        cfg.header_text
    } else {
        cfg.text
    };
    svg.rect(l.left, None, Some((cfg.border, cfg.border_width)));
    let header_max = Some(l.left.w - 2 * (l.logo.right() - l.left.x));
    svg.text(
        (cx, 30),
        &content.foundation,
        TextStyle::new(13.0, header_color),
        Anchor::Center,
        header_max,
    );
    svg.text(
        (cx, 55),
        &content.school_name,
        TextStyle::new(20.0, header_color).bold(),
        Anchor::Center,
        header_max,
    );
    svg.text(
        (cx, 80),
        &content.address,
        TextStyle::new(13.0, header_color),
        Anchor::Center,
        header_max,
    );
    svg.line(
        (l.left.x + 10, l.header_rule_y),
        (l.left.right() - 10, l.header_rule_y),
        cfg.border,
        2,
    );
    svg.text(
        (cx, l.title_y),
        content.title,
        TextStyle::new(20.0, cfg.accent).bold(),
        Anchor::Center,
        Some(l.left.w - 20),
    );
    svg.text(
        (cx, l.title_y + 20),
        &content.subtitle,
        TextStyle::new(13.0, cfg.text),
        Anchor::Center,
        Some(l.left.w - 20),
    );

    let value_limit = if l.photo.x > l.value_x {
        l.photo.x
    } else {
        l.left.right()
    };
    let mut y = l.fields_y;
    for field in &content.fields {
        svg.text(
            (l.label_x, y),
            field.label,
            TextStyle::new(16.0, cfg.text),
            Anchor::TopLeft,
            None,
        );
        svg.text(
            (l.colon_x, y),
            ":",
            TextStyle::new(16.0, cfg.text),
            Anchor::TopLeft,
            None,
        );
        svg.text(
            (l.value_x, y),
            &field.value,
            TextStyle::new(16.0, cfg.text).bold(),
            Anchor::TopLeft,
            Some(value_limit - l.value_x - 10),
        );
        y += l.field_step;
    }

    svg.rect(l.photo, Some(cfg.photo_fill), Some((cfg.border, 1)));
    if !has_photo {
        svg.text(
            (l.photo.center_x(), l.photo.y + l.photo.h / 2),
            PHOTO_PLACEHOLDER,
            TextStyle::new(13.0, cfg.muted),
            Anchor::Center,
            None,
        );
    }

    if let Some(d) = content.qr_payload.as_deref().and_then(|p| qr_path(p, l.qr)) {
        svg.rect(l.qr, Some(Rgb::WHITE), None);
        svg.path(&d, Rgb::BLACK);
    }

    let (sx, sy) = l.sign_label;
    let sign_width = Some(l.left.right() - sx - 10);
    svg.text(
        (sx, sy.saturating_sub(20)),
        &content.sign_place,
        TextStyle::new(13.0, cfg.text),
        Anchor::TopLeft,
        sign_width,
    );
    svg.text(
        (sx, sy),
        SIGN_ROLE,
        TextStyle::new(16.0, cfg.text),
        Anchor::TopLeft,
        sign_width,
    );
    svg.text(
        (sx, l.sign_name_y),
        &content.headmaster,
        TextStyle::new(16.0, cfg.text).bold(),
        Anchor::TopLeft,
        sign_width,
    );

    if let Some(warning) = content.warning {
        svg.text(
            (cx, l.left.bottom() - 12),
            warning,
            TextStyle::new(12.0, cfg.alert).bold().italic(),
            Anchor::Center,
            Some(l.left.w - 20),
        );
    }

    // Timetable.
    let r = l.right;
    svg.rect(r, None, Some((cfg.border, cfg.border_width)));
    svg.rect(
        Rect::new(r.x, r.y, r.w, l.schedule_title_h),
        Some(cfg.header_fill),
        Some((cfg.border, 1)),
    );
    svg.text(
        (r.center_x(), r.y + l.schedule_title_h / 2),
        SCHEDULE_TITLE,
        TextStyle::new(20.0, cfg.header_text).bold(),
        Anchor::Center,
        None,
    );

    let (cols, paraf_x) = schedule_columns(r, content.paraf_column);
    let ty = l.table_header_y;
    let head = TextStyle::new(16.0, cfg.text).bold();
    for (x, label) in cols
        .iter()
        .zip([COLUMN_DAY, COLUMN_SLOT, COLUMN_TIME, COLUMN_SUBJECT])
    {
        svg.text((*x, ty), label, head, Anchor::TopLeft, None);
    }
    if let Some(px) = paraf_x {
        svg.text((px, ty), COLUMN_PARAF, head, Anchor::TopLeft, None);
    }
    svg.line((r.x, ty + 20), (r.right(), ty + 20), cfg.border, 2);

    let first_row = ty + 30;
    let available = r.bottom().saturating_sub(first_row + 10);
    let rows = content.schedule.len().max(1) as u32;
    let step = l.table_row_step.min((available / rows).max(8));
    let size = (13.0 * step as f32 / l.table_row_step as f32).max(8.0);
    let cell = TextStyle::new(size, cfg.text);
    let subject_width = paraf_x.unwrap_or(r.right()) - cols[3] - 10;

    let mut cy = first_row;
    for row in &content.schedule {
        svg.text((cols[0], cy), &row.day, cell, Anchor::TopLeft, Some(cols[1] - cols[0] - 8));
        svg.text((cols[1], cy), &row.slot, cell, Anchor::TopLeft, Some(cols[2] - cols[1] - 8));
        svg.text((cols[2], cy), &row.time, cell, Anchor::TopLeft, Some(cols[3] - cols[2] - 8));
        svg.text((cols[3], cy), &row.subject, cell, Anchor::TopLeft, Some(subject_width));
        let rule_y = cy + step - 10;
        svg.line((r.x, rule_y), (r.right(), rule_y), cfg.rule, 1);
        cy += step;
    }
    if let Some(px) = paraf_x {
        let bottom = if content.schedule.is_empty() {
            ty + 20
        } else {
            cy - 10
        };
        svg.line((px - 10, ty - 5), (px - 10, bottom), cfg.rule, 1);
    }

    svg.finish()
}

fn composite(canvas: &mut RgbaImage, image: &DynamicImage, area: Rect) {
    let resized = image.resize_exact(area.w, area.h, FilterType::Triangle).to_rgba8();
    imageops::overlay(canvas, &resized, area.x as i64, area.y as i64);
}

/// Draw one card. Pure: the same inputs always give the same pixels.
pub fn render_card(
    content: &CardContent,
    template: Template,
    images: &CardImages<'_>,
    fonts: &FontBook,
) -> anyhow::Result<RgbImage> {
    let cfg = template.config();
    let l = cfg.layout;
    let svg = build_svg(content, cfg, images.photo.is_some());

    let opts = usvg::Options {
        fontdb: fonts.db.clone(),
        font_resolver: font_resolver(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(&svg, &opts).context("failed to lay out card")?;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(l.width, l.height)
        .ok_or_else(|| anyhow!("failed to allocate {}x{} canvas", l.width, l.height))?;
    pixmap.fill(resvg::tiny_skia::Color::WHITE);
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::identity(),
        &mut pixmap.as_mut(),
    );
    // The canvas is opaque, so premultiplied and straight alpha coincide.
    let mut canvas = RgbaImage::from_raw(l.width, l.height, pixmap.take())
        .ok_or_else(|| anyhow!("canvas buffer has unexpected size"))?;

    if cfg.show_logo {
        if let Some(logo) = images.logo {
            composite(&mut canvas, logo, l.logo);
        }
    }
    if let Some(photo) = images.photo {
        composite(&mut canvas, photo, l.photo);
    }
    if cfg.show_signature_image {
        if let Some(sig) = images.signature {
            composite(&mut canvas, sig, l.signature);
        }
    }

    Ok(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    image
        .write_with_encoder(encoder)
        .context("failed to encode card as JPEG")?;
    Ok(buf)
}

pub fn render_card_jpeg(
    content: &CardContent,
    template: Template,
    images: &CardImages<'_>,
    fonts: &FontBook,
) -> anyhow::Result<Vec<u8>> {
    let img = render_card(content, template, images, fonts)?;
    encode_jpeg(&img, JPEG_QUALITY)
}
