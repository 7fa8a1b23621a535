//! Word-processor output: one two-column table per card, two cards per A4 landscape page.

use anyhow::Context;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::card::{
    CardContent, COLUMN_DAY, COLUMN_PARAF, COLUMN_SLOT, COLUMN_SUBJECT, COLUMN_TIME,
    PHOTO_PLACEHOLDER, SCHEDULE_TITLE, SIGN_ROLE,
};
use crate::assets::BrandAssets;
use crate::template::{Rgb, Template, TemplateConfig};

pub const PAGE_WIDTH: u32 = 16838;
pub const PAGE_HEIGHT: u32 = 11906;
pub const PAGE_MARGIN: u32 = 720;
const LEFT_COL: u32 = 7200;
const RIGHT_COL: u32 = PAGE_WIDTH - 2 * PAGE_MARGIN - LEFT_COL;
const EMU_PER_PX: u64 = 9525;
const PHOTO_MAX_PX: (u32, u32) = (300, 390);

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
}

impl Align {
    fn val(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
        }
    }
}

#[derive(Clone, Copy)]
struct RunStyle {
    /// Half-points, as `w:sz` expects.
    size: u32,
    bold: bool,
    italic: bool,
    color: Rgb,
}

impl RunStyle {
    fn new(points: u32, color: Rgb) -> Self {
        RunStyle {
            size: points * 2,
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

fn run(xml: &mut String, text: &str, style: RunStyle) {
    xml.push_str("<w:r><w:rPr><w:rFonts w:ascii=\"Arial\" w:hAnsi=\"Arial\" w:cs=\"Arial\"/>");
    if style.bold {
        xml.push_str("<w:b/>");
    }
    if style.italic {
        xml.push_str("<w:i/>");
    }
    let _ = write!(
        xml,
        "<w:color w:val=\"{}\"/><w:sz w:val=\"{}\"/></w:rPr><w:t xml:space=\"preserve\">{}</w:t></w:r>",
        style.color.ooxml(),
        style.size,
        escape(text)
    );
}

fn paragraph(xml: &mut String, align: Align, text: &str, style: RunStyle) {
    let _ = write!(
        xml,
        "<w:p><w:pPr><w:spacing w:before=\"0\" w:after=\"40\"/><w:jc w:val=\"{}\"/></w:pPr>",
        align.val()
    );
    if !text.is_empty() {
        run(xml, text, style);
    }
    xml.push_str("</w:p>");
}

fn cell_open(xml: &mut String, width: u32, fill: Option<Rgb>) {
    let _ = write!(xml, "<w:tc><w:tcPr><w:tcW w:w=\"{}\" w:type=\"dxa\"/>", width);
    if let Some(fill) = fill {
        let _ = write!(
            xml,
            "<w:shd w:val=\"clear\" w:color=\"auto\" w:fill=\"{}\"/>",
            fill.ooxml()
        );
    }
    xml.push_str("</w:tcPr>");
}

fn table_open(xml: &mut String, widths: &[u32], border: Option<(Rgb, u32)>) {
    let total: u32 = widths.iter().sum();
    let _ = write!(
        xml,
        "<w:tbl><w:tblPr><w:tblW w:w=\"{}\" w:type=\"dxa\"/>",
        total
    );
    xml.push_str("<w:tblBorders>");
    for side in ["top", "left", "bottom", "right", "insideH", "insideV"] {
        match border {
            Some((color, eighths)) => {
                let _ = write!(
                    xml,
                    "<w:{} w:val=\"single\" w:sz=\"{}\" w:space=\"0\" w:color=\"{}\"/>",
                    side,
                    eighths,
                    color.ooxml()
                );
            }
            None => {
                let _ = write!(xml, "<w:{} w:val=\"nil\"/>", side);
            }
        }
    }
    // tblPr children are order-checked: borders come before layout.
    xml.push_str("</w:tblBorders><w:tblLayout w:type=\"fixed\"/></w:tblPr><w:tblGrid>");
    for w in widths {
        let _ = write!(xml, "<w:gridCol w:w=\"{}\"/>", w);
    }
    xml.push_str("</w:tblGrid>");
}

/// One embedded picture part.
struct Media {
    rel_id: String,
    part: String,
    bytes: Vec<u8>,
}

fn png_bytes(img: &DynamicImage) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .context("failed to encode image as PNG")?;
    Ok(buf.into_inner())
}

fn qr_image(payload: &str) -> Option<DynamicImage> {
    let code = qrcode::QrCode::new(payload.as_bytes()).ok()?;
    let n = code.width() as u32;
    let (quiet, scale) = (2u32, 8u32);
    let side = (n + 2 * quiet) * scale;
    let colors = code.to_colors();
    let img = GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        if mx < quiet || my < quiet || mx >= n + quiet || my >= n + quiet {
            return Luma([255]);
        }
        let i = ((my - quiet) * n + (mx - quiet)) as usize;
        if colors[i] == qrcode::Color::Dark {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    Some(DynamicImage::ImageLuma8(img))
}

/// Accumulates card tables and their pictures; [`DocxBuilder::finish`] packages the document.
pub struct DocxBuilder<'a> {
    template: Template,
    brand: &'a BrandAssets,
    body: String,
    media: Vec<Media>,
    logo: Option<String>,
    signature: Option<String>,
    next_drawing: u32,
    cards: usize,
    page_breaks: usize,
}

impl<'a> DocxBuilder<'a> {
    pub fn new(template: Template, brand: &'a BrandAssets) -> Self {
        DocxBuilder {
            template,
            brand,
            body: String::with_capacity(64 * 1024),
            media: Vec::new(),
            logo: None,
            signature: None,
            next_drawing: 1,
            cards: 0,
            page_breaks: 0,
        }
    }

    pub fn cards(&self) -> usize {
        self.cards
    }

    pub fn page_breaks(&self) -> usize {
        self.page_breaks
    }

    fn embed(&mut self, img: &DynamicImage) -> anyhow::Result<String> {
        let n = self.media.len() + 1;
        let media = Media {
            rel_id: format!("rIdImg{}", n),
            part: format!("media/image{}.png", n),
            bytes: png_bytes(img)?,
        };
        let rel = media.rel_id.clone();
        self.media.push(media);
        Ok(rel)
    }

    /// Brand pictures are stored once and referenced from every card.
    fn brand_rel(&mut self, signature: bool) -> anyhow::Result<Option<String>> {
        let brand = self.brand;
        let (cached, img) = if signature {
            (self.signature.clone(), brand.signature.as_ref())
        } else {
            (self.logo.clone(), brand.logo.as_ref())
        };
        if cached.is_some() {
            return Ok(cached);
        }
        let Some(img) = img else {
            return Ok(None);
        };
        let rel = self.embed(img)?;
        if signature {
            self.signature = Some(rel.clone());
        } else {
            self.logo = Some(rel.clone());
        }
        Ok(Some(rel))
    }

    fn drawing(&mut self, xml: &mut String, rel: &str, px: (u32, u32), descr: &str) {
        let id = self.next_drawing;
        self.next_drawing += 1;
        let cx = px.0 as u64 * EMU_PER_PX;
        let cy = px.1 as u64 * EMU_PER_PX;
        let descr = escape(descr);
        let _ = write!(
            xml,
            r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:docPr id="{id}" name="Picture {id}" descr="{descr}"/><wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {id}" descr="{descr}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
        );
    }

    fn picture_paragraph(
        &mut self,
        xml: &mut String,
        align: Align,
        rel: &str,
        px: (u32, u32),
        descr: &str,
    ) {
        let _ = write!(
            xml,
            "<w:p><w:pPr><w:spacing w:before=\"0\" w:after=\"40\"/><w:jc w:val=\"{}\"/></w:pPr>",
            align.val()
        );
        self.drawing(xml, rel, px, descr);
        xml.push_str("</w:p>");
    }

    fn identity_cell(
        &mut self,
        xml: &mut String,
        content: &CardContent,
        cfg: &TemplateConfig,
        photo: Option<&DynamicImage>,
    ) -> anyhow::Result<()> {
        let l = cfg.layout;
        cell_open(xml, LEFT_COL, None);

        if cfg.show_logo {
            if let Some(rel) = self.brand_rel(false)? {
                self.picture_paragraph(xml, Align::Center, &rel, (l.logo.w / 2, l.logo.h / 2), "logo");
            }
        }
        let header = if l.header_band > 0 {
            cfg.header_text
        } else {
            cfg.text
        };
        paragraph(xml, Align::Center, &content.foundation, RunStyle::new(9, header));
        paragraph(xml, Align::Center, &content.school_name, RunStyle::new(13, header).bold());
        paragraph(xml, Align::Center, &content.address, RunStyle::new(9, header));
        paragraph(xml, Align::Center, content.title, RunStyle::new(13, cfg.accent).bold());
        paragraph(xml, Align::Center, &content.subtitle, RunStyle::new(9, cfg.text));

        let widths = [1600, 200, LEFT_COL - 1800 - 200];
        table_open(xml, &widths, None);
        for field in &content.fields {
            xml.push_str("<w:tr>");
            for (w, (text, style)) in widths.iter().zip([
                (field.label, RunStyle::new(10, cfg.text)),
                (":", RunStyle::new(10, cfg.text)),
                (field.value.as_str(), RunStyle::new(10, cfg.text).bold()),
            ]) {
                cell_open(xml, *w, None);
                paragraph(xml, Align::Left, text, style);
                xml.push_str("</w:tc>");
            }
            xml.push_str("</w:tr>");
        }
        // Adjacent tables merge unless a paragraph separates them.
        xml.push_str("</w:tbl><w:p/>");

        // Photo (or placeholder) | QR | signature block.
        let widths = [1800, 1800, LEFT_COL - 3600 - 200];
        table_open(xml, &widths, None);
        xml.push_str("<w:tr>");

        cell_open(xml, widths[0], None);
        match photo {
            Some(img) => {
                let img = if img.width() > PHOTO_MAX_PX.0 || img.height() > PHOTO_MAX_PX.1 {
                    img.thumbnail(PHOTO_MAX_PX.0, PHOTO_MAX_PX.1)
                } else {
                    img.clone()
                };
                let rel = self.embed(&img)?;
                self.picture_paragraph(xml, Align::Center, &rel, (l.photo.w, l.photo.h), "photo");
            }
            None => {
                table_open(xml, &[1500], Some((cfg.border, 4)));
                xml.push_str("<w:tr><w:trPr><w:trHeight w:val=\"1900\" w:hRule=\"exact\"/></w:trPr>");
                cell_open(xml, 1500, Some(cfg.photo_fill));
                paragraph(xml, Align::Center, PHOTO_PLACEHOLDER, RunStyle::new(9, cfg.muted));
                xml.push_str("</w:tc></w:tr></w:tbl><w:p/>");
            }
        }
        xml.push_str("</w:tc>");

        cell_open(xml, widths[1], None);
        match content.qr_payload.as_deref().and_then(qr_image) {
            Some(qr) => {
                let rel = self.embed(&qr)?;
                self.picture_paragraph(xml, Align::Center, &rel, (l.qr.w, l.qr.h), "qr");
            }
            None => xml.push_str("<w:p/>"),
        }
        xml.push_str("</w:tc>");

        cell_open(xml, widths[2], None);
        paragraph(xml, Align::Left, &content.sign_place, RunStyle::new(9, cfg.text));
        paragraph(xml, Align::Left, SIGN_ROLE, RunStyle::new(10, cfg.text));
        let sig = if cfg.show_signature_image {
            self.brand_rel(true)?
        } else {
            None
        };
        match sig {
            Some(rel) => self.picture_paragraph(
                xml,
                Align::Left,
                &rel,
                (l.signature.w, l.signature.h),
                "signature",
            ),
            None => paragraph(xml, Align::Left, "", RunStyle::new(10, cfg.text)),
        }
        paragraph(xml, Align::Left, &content.headmaster, RunStyle::new(10, cfg.text).bold());
        xml.push_str("</w:tc></w:tr></w:tbl>");

        if let Some(warning) = content.warning {
            paragraph(xml, Align::Center, warning, RunStyle::new(8, cfg.alert).bold().italic());
        } else {
            xml.push_str("<w:p/>");
        }
        xml.push_str("</w:tc>");
        Ok(())
    }

    fn schedule_cell(&self, xml: &mut String, content: &CardContent, cfg: &TemplateConfig) {
        cell_open(xml, RIGHT_COL, None);
        let title_widths = [RIGHT_COL - 200];
        table_open(xml, &title_widths, None);
        xml.push_str("<w:tr>");
        cell_open(xml, title_widths[0], Some(cfg.header_fill));
        paragraph(xml, Align::Center, SCHEDULE_TITLE, RunStyle::new(13, cfg.header_text).bold());
        xml.push_str("</w:tc></w:tr></w:tbl><w:p/>");

        let inner = RIGHT_COL - 200;
        let widths: Vec<u32> = if content.paraf_column {
            vec![1900, 900, 1500, inner - 5500, 1200]
        } else {
            vec![1900, 900, 1500, inner - 4300]
        };
        let mut headers = vec![COLUMN_DAY, COLUMN_SLOT, COLUMN_TIME, COLUMN_SUBJECT];
        if content.paraf_column {
            headers.push(COLUMN_PARAF);
        }
        table_open(xml, &widths, Some((cfg.rule, 4)));
        xml.push_str("<w:tr><w:trPr><w:tblHeader/></w:trPr>");
        for (w, h) in widths.iter().zip(&headers) {
            cell_open(xml, *w, None);
            paragraph(xml, Align::Left, h, RunStyle::new(9, cfg.text).bold());
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
        for row in &content.schedule {
            xml.push_str("<w:tr>");
            let mut cells = vec![
                row.day.as_str(),
                row.slot.as_str(),
                row.time.as_str(),
                row.subject.as_str(),
            ];
            if content.paraf_column {
                cells.push("");
            }
            for (w, text) in widths.iter().zip(cells) {
                cell_open(xml, *w, None);
                paragraph(xml, Align::Left, text, RunStyle::new(9, cfg.text));
                xml.push_str("</w:tc>");
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl><w:p/></w:tc>");
    }

    /// Append one card. Every second card starts a new page; the one between gets a spacer.
    pub fn push_card(
        &mut self,
        content: &CardContent,
        photo: Option<&DynamicImage>,
    ) -> anyhow::Result<()> {
        let cfg = self.template.config();
        let mut xml = String::with_capacity(8 * 1024);
        if self.cards > 0 {
            if self.cards % 2 == 0 {
                xml.push_str("<w:p><w:r><w:br w:type=\"page\"/></w:r></w:p>");
                self.page_breaks += 1;
            } else {
                xml.push_str("<w:p><w:pPr><w:spacing w:before=\"240\" w:after=\"240\"/></w:pPr></w:p>");
            }
        }

        table_open(&mut xml, &[LEFT_COL, RIGHT_COL], Some((cfg.border, cfg.border_width * 4)));
        xml.push_str("<w:tr><w:trPr><w:cantSplit/></w:trPr>");
        self.identity_cell(&mut xml, content, cfg, photo)?;
        self.schedule_cell(&mut xml, content, cfg);
        xml.push_str("</w:tr></w:tbl>");

        self.body.push_str(&xml);
        self.cards += 1;
        Ok(())
    }

    fn document_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<w:document xmlns:w=\"{NS_W}\" xmlns:r=\"{NS_R}\" xmlns:wp=\"{NS_WP}\"><w:body>{}\
<w:sectPr><w:pgSz w:w=\"{PAGE_WIDTH}\" w:h=\"{PAGE_HEIGHT}\" w:orient=\"landscape\"/>\
<w:pgMar w:top=\"{PAGE_MARGIN}\" w:right=\"{PAGE_MARGIN}\" w:bottom=\"{PAGE_MARGIN}\" w:left=\"{PAGE_MARGIN}\" w:header=\"0\" w:footer=\"0\" w:gutter=\"0\"/>\
</w:sectPr></w:body></w:document>",
            self.body
        )
    }

    fn document_rels(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        );
        for m in &self.media {
            let _ = write!(
                xml,
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/>",
                m.rel_id, REL_IMAGE, m.part
            );
        }
        xml.push_str("</Relationships>");
        xml
    }

    pub fn finish(self) -> anyhow::Result<Vec<u8>> {
        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let content_types = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Default Extension=\"png\" ContentType=\"image/png\"/>\
<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
</Types>";
        let root_rels = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
</Relationships>";
        let core = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
<dc:title>{}</dc:title><dc:creator>examcardd</dc:creator>\
<dcterms:created xsi:type=\"dcterms:W3CDTF\">{created}</dcterms:created>\
<dcterms:modified xsi:type=\"dcterms:W3CDTF\">{created}</dcterms:modified>\
</cp:coreProperties>",
            escape(self.template.config().title)
        );

        let document = self.document_xml();
        let document_rels = self.document_rels();

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let parts: [(&str, &[u8]); 5] = [
            ("[Content_Types].xml", content_types.as_bytes()),
            ("_rels/.rels", root_rels.as_bytes()),
            ("docProps/core.xml", core.as_bytes()),
            ("word/document.xml", document.as_bytes()),
            ("word/_rels/document.xml.rels", document_rels.as_bytes()),
        ];
        for (name, bytes) in parts {
            zip.start_file(name, opts)
                .with_context(|| format!("failed to start {}", name))?;
            zip.write_all(bytes)
                .with_context(|| format!("failed to write {}", name))?;
        }
        for m in &self.media {
            let name = format!("word/{}", m.part);
            zip.start_file(name.as_str(), opts)
                .with_context(|| format!("failed to start {}", name))?;
            zip.write_all(&m.bytes)
                .with_context(|| format!("failed to write {}", name))?;
        }
        let out = zip.finish().context("failed to finalize document package")?;
        Ok(out.into_inner())
    }
}
