use examcardd::assets::BrandAssets;
use examcardd::batch::{render_docx, RenderInputs};
use examcardd::photos::{PhotoIndex, PhotoSource};
use examcardd::render::{FontBook, SchoolIdentity};
use examcardd::roster::{Roster, StudentRecord};
use examcardd::schedule::ScheduleEntry;
use examcardd::sheet::CellValue;
use examcardd::template::Template;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::{Cursor, Read};

fn record(row: usize, name: &str, nisn: f64) -> StudentRecord {
    StudentRecord::from_pairs(
        row,
        vec![
            ("NO PESERTA", CellValue::Number(row as f64)),
            ("NAMA", CellValue::Text(name.to_string())),
            ("NISN", CellValue::Number(nisn)),
            ("RUANG", CellValue::Text("R1".into())),
        ],
    )
}

fn part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open docx");
    let mut s = String::new();
    archive
        .by_name(name)
        .expect("part present")
        .read_to_string(&mut s)
        .expect("read part");
    s
}

#[test]
fn five_cards_in_row_order_with_two_page_breaks() {
    let names = ["Andi", "Budi", "Citra", "Dewi", "Eka"];
    let records = names
        .iter()
        .enumerate()
        .map(|(i, n)| record(i + 2, n, 100.0 + i as f64))
        .collect();
    let roster = Roster::from_records(Vec::new(), records);

    let mut photos = PhotoIndex::new();
    photos.insert(
        "101",
        DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 26, Rgb([10, 20, 30]))),
    );
    let school = SchoolIdentity {
        name: "SMA Contoh".into(),
        exam_name: "Penilaian Akhir Semester".into(),
        ..SchoolIdentity::default()
    };
    let brand = BrandAssets::default();
    let schedule = vec![
        ScheduleEntry::new("Senin", "1", "07.30", "Matematika"),
        ScheduleEntry::new("Selasa", "2.0", "09.30", "Bahasa Indonesia"),
    ];
    let fonts = FontBook::empty();
    let inputs = RenderInputs {
        roster: &roster,
        template: Template::Islamic,
        school: &school,
        brand: &brand,
        photos: &photos,
        schedule: &schedule,
        fonts: &fonts,
    };

    let mut done = 0;
    let doc = render_docx(&inputs, &mut |d, _| done = d).expect("render");
    assert_eq!(done, 5);
    assert_eq!((doc.cards, doc.page_breaks), (5, 2));
    assert_eq!(doc.outcomes[1].photo, PhotoSource::Primary);
    assert_eq!(doc.outcomes[0].photo, PhotoSource::Placeholder);

    let xml = part(&doc.bytes, "word/document.xml");
    assert_eq!(xml.matches("<w:br w:type=\"page\"/>").count(), 2);
    assert!(xml.contains("w:w=\"16838\" w:h=\"11906\" w:orient=\"landscape\""));
    assert!(xml.contains(">PARAF<"));
    assert!(xml.contains(">Penilaian Akhir Semester<"));
    // Slot typed as 2.0 prints as 2.
    assert!(xml.contains(">2<"));
    assert!(!xml.contains(">2.0<"));

    let positions: Vec<usize> = names
        .iter()
        .map(|n| xml.find(&format!(">{}<", n.to_uppercase())).expect("name present"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let rels = part(&doc.bytes, "word/_rels/document.xml.rels");
    assert_eq!(rels.matches("relationships/image").count(), 1);
}

#[test]
fn empty_roster_gives_a_valid_empty_document() {
    let roster = Roster::default();
    let school = SchoolIdentity::default();
    let brand = BrandAssets::default();
    let photos = PhotoIndex::new();
    let fonts = FontBook::empty();
    let inputs = RenderInputs {
        roster: &roster,
        template: Template::Classic,
        school: &school,
        brand: &brand,
        photos: &photos,
        schedule: &[],
        fonts: &fonts,
    };
    let doc = render_docx(&inputs, &mut |_, _| {}).expect("render");
    assert_eq!((doc.cards, doc.page_breaks), (0, 0));
    assert!(part(&doc.bytes, "[Content_Types].xml").contains("image/png"));
}
