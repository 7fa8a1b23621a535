use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// `#rrggbb`, as used in SVG.
    pub fn css(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// `RRGGBB`, as used in WordprocessingML attributes.
    pub fn ooxml(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Axis-aligned box in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Rect { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn center_x(&self) -> u32 {
        self.x + self.w / 2
    }
}

/// Raster canvas coordinates. The identity block lives in `left`, the timetable in `right`.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub left: Rect,
    pub right: Rect,
    /// Height of a filled band behind the institution header; 0 draws no band.
    pub header_band: u32,
    pub header_rule_y: u32,
    pub title_y: u32,
    pub fields_y: u32,
    pub field_step: u32,
    pub label_x: u32,
    pub colon_x: u32,
    pub value_x: u32,
    pub logo: Rect,
    pub photo: Rect,
    pub signature: Rect,
    pub sign_label: (u32, u32),
    pub sign_name_y: u32,
    pub qr: Rect,
    pub schedule_title_h: u32,
    pub table_header_y: u32,
    pub table_row_step: u32,
}

const STANDARD_LAYOUT: Layout = Layout {
    width: 1200,
    height: 500,
    left: Rect::new(10, 10, 580, 480),
    right: Rect::new(600, 10, 590, 480),
    header_band: 0,
    header_rule_y: 100,
    title_y: 130,
    fields_y: 170,
    field_step: 35,
    label_x: 30,
    colon_x: 150,
    value_x: 160,
    logo: Rect::new(30, 20, 80, 80),
    photo: Rect::new(30, 330, 100, 130),
    signature: Rect::new(350, 370, 120, 60),
    sign_label: (350, 350),
    sign_name_y: 430,
    qr: Rect::new(160, 360, 100, 100),
    schedule_title_h: 40,
    table_header_y: 60,
    table_row_step: 25,
};

const BANDED_LAYOUT: Layout = Layout {
    header_band: 95,
    header_rule_y: 105,
    title_y: 132,
    photo: Rect::new(460, 165, 100, 130),
    signature: Rect::new(350, 385, 120, 60),
    sign_label: (350, 362),
    sign_name_y: 448,
    qr: Rect::new(30, 370, 100, 100),
    ..STANDARD_LAYOUT
};

#[derive(Debug, Clone, Copy)]
pub struct TemplateConfig {
    pub border: Rgb,
    pub border_width: u32,
    pub background: Rgb,
    pub header_fill: Rgb,
    pub header_text: Rgb,
    pub accent: Rgb,
    pub text: Rgb,
    pub muted: Rgb,
    pub rule: Rgb,
    pub photo_fill: Rgb,
    pub alert: Rgb,
    pub title: &'static str,
    pub warning: Option<&'static str>,
    pub show_logo: bool,
    pub show_qr: bool,
    pub show_signature_image: bool,
    pub paraf_column: bool,
    pub layout: Layout,
}

const CLASSIC: TemplateConfig = TemplateConfig {
    border: Rgb::BLACK,
    border_width: 2,
    background: Rgb::WHITE,
    header_fill: Rgb(0xee, 0xee, 0xee),
    header_text: Rgb::BLACK,
    accent: Rgb::BLACK,
    text: Rgb::BLACK,
    muted: Rgb(0x80, 0x80, 0x80),
    rule: Rgb(0xdd, 0xdd, 0xdd),
    photo_fill: Rgb::WHITE,
    alert: Rgb(0xc6, 0x28, 0x28),
    title: "KARTU PESERTA UJIAN",
    warning: None,
    show_logo: true,
    show_qr: false,
    show_signature_image: true,
    paraf_column: false,
    layout: STANDARD_LAYOUT,
};

const MODERN: TemplateConfig = TemplateConfig {
    border: Rgb(0x1e, 0x40, 0xaf),
    border_width: 3,
    header_fill: Rgb(0x1e, 0x40, 0xaf),
    header_text: Rgb::WHITE,
    accent: Rgb(0x1e, 0x40, 0xaf),
    rule: Rgb(0xcb, 0xd5, 0xe1),
    photo_fill: Rgb(0xf1, 0xf5, 0xf9),
    show_qr: true,
    layout: BANDED_LAYOUT,
    ..CLASSIC
};

const ISLAMIC: TemplateConfig = TemplateConfig {
    border: Rgb(0x06, 0x5f, 0x46),
    border_width: 3,
    background: Rgb(0xfb, 0xfd, 0xf7),
    header_fill: Rgb(0xd1, 0xfa, 0xe5),
    header_text: Rgb(0x06, 0x4e, 0x3b),
    accent: Rgb(0x06, 0x5f, 0x46),
    rule: Rgb(0xa7, 0xf3, 0xd0),
    paraf_column: true,
    ..CLASSIC
};

const EMERGENCY: TemplateConfig = TemplateConfig {
    border: Rgb(0xc6, 0x28, 0x28),
    header_fill: Rgb(0xfd, 0xe8, 0xe8),
    title: "KARTU PESERTA UJIAN (DUPLIKAT)",
    warning: Some("Kartu pengganti sementara. Wajib dibawa bersama kartu identitas."),
    show_signature_image: false,
    ..CLASSIC
};

/// The closed set of card designs. Ids are what the UI sends and what the settings table stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    #[default]
    Classic,
    Modern,
    Islamic,
    Emergency,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::Classic,
        Template::Modern,
        Template::Islamic,
        Template::Emergency,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" | "klasik" => Some(Template::Classic),
            "modern" => Some(Template::Modern),
            "islamic" | "islami" => Some(Template::Islamic),
            "emergency" | "darurat" | "duplikat" => Some(Template::Emergency),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Template::Classic => "classic",
            Template::Modern => "modern",
            Template::Islamic => "islamic",
            Template::Emergency => "emergency",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Template::Classic => "Klasik",
            Template::Modern => "Modern",
            Template::Islamic => "Islami",
            Template::Emergency => "Darurat / Duplikat",
        }
    }

    pub fn config(self) -> &'static TemplateConfig {
        match self {
            Template::Classic => &CLASSIC,
            Template::Modern => &MODERN,
            Template::Islamic => &ISLAMIC,
            Template::Emergency => &EMERGENCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_parse() {
        for t in Template::ALL {
            assert_eq!(Template::parse(t.id()), Some(t));
        }
        assert_eq!(Template::parse(" Darurat "), Some(Template::Emergency));
        assert_eq!(Template::parse("fancy"), None);
    }

    #[test]
    fn only_emergency_changes_title_and_warns() {
        for t in Template::ALL {
            let cfg = t.config();
            if t == Template::Emergency {
                assert_ne!(cfg.title, CLASSIC.title);
                assert!(cfg.warning.is_some());
            } else {
                assert_eq!(cfg.title, CLASSIC.title);
                assert!(cfg.warning.is_none());
            }
        }
    }

    #[test]
    fn layouts_stay_inside_their_regions() {
        for t in Template::ALL {
            let l = t.config().layout;
            for r in [l.logo, l.photo, l.signature, l.qr] {
                assert!(r.x >= l.left.x && r.right() <= l.left.right());
                assert!(r.y >= l.left.y && r.bottom() <= l.left.bottom());
            }
            assert!(l.right.right() <= l.width && l.right.bottom() <= l.height);
        }
    }

    #[test]
    fn colors_format_for_svg_and_ooxml() {
        assert_eq!(Rgb(0x1e, 0x40, 0xaf).css(), "#1e40af");
        assert_eq!(Rgb(0x1e, 0x40, 0xaf).ooxml(), "1E40AF");
    }
}
