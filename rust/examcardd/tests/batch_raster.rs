use examcardd::assets::BrandAssets;
use examcardd::batch::{render_preview, render_zip, RenderInputs};
use examcardd::photos::{PhotoIndex, PhotoSource};
use examcardd::render::raster::render_card;
use examcardd::render::{CardContent, CardImages, FontBook, SchoolIdentity};
use examcardd::roster::{Roster, StudentRecord};
use examcardd::schedule::ScheduleEntry;
use examcardd::sheet::CellValue;
use examcardd::template::Template;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

fn student(row: usize, no: f64, name: &str, nisn: Option<f64>, nis: &str) -> StudentRecord {
    let mut pairs = vec![
        ("NO PESERTA", CellValue::Number(no)),
        ("NAMA", text(name)),
        ("NIS", text(nis)),
        ("RUANG", CellValue::Number(1.0)),
    ];
    if let Some(n) = nisn {
        pairs.push(("NISN", CellValue::Number(n)));
    }
    StudentRecord::from_pairs(row, pairs)
}

fn roster(records: Vec<StudentRecord>) -> Roster {
    let columns = ["NO PESERTA", "NAMA", "NISN", "NIS", "RUANG"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    Roster::from_records(columns, records)
}

fn encoded(color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 65, Rgb(color)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("encode fixture");
    buf.into_inner()
}

fn photo_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        zip.start_file(*name, FileOptions::default())
            .expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut f = archive.by_index(i).expect("entry");
        let mut data = Vec::new();
        f.read_to_end(&mut data).expect("read entry");
        out.push((f.name().to_string(), data));
    }
    out
}

fn close(px: &Rgb<u8>, want: [u8; 3]) -> bool {
    px.0.iter()
        .zip(want)
        .all(|(a, b)| (*a as i32 - b as i32).abs() <= 40)
}

struct Fixture {
    roster: Roster,
    school: SchoolIdentity,
    brand: BrandAssets,
    photos: PhotoIndex,
    schedule: Vec<ScheduleEntry>,
    fonts: FontBook,
}

impl Fixture {
    fn new(roster: Roster, photos: PhotoIndex) -> Self {
        Fixture {
            roster,
            school: SchoolIdentity {
                name: "SMA Contoh".into(),
                headmaster: "Drs. Kepala".into(),
                ..SchoolIdentity::default()
            },
            brand: BrandAssets::default(),
            photos,
            schedule: vec![ScheduleEntry::new("Senin", "1.0", "07.30 - 09.00", "Matematika")],
            fonts: FontBook::empty(),
        }
    }

    fn inputs(&self, template: Template) -> RenderInputs<'_> {
        RenderInputs {
            roster: &self.roster,
            template,
            school: &self.school,
            brand: &self.brand,
            photos: &self.photos,
            schedule: &self.schedule,
            fonts: &self.fonts,
        }
    }
}

#[test]
fn one_entry_per_student_with_placeholder_for_missing_photo() {
    let mut photos = PhotoIndex::new();
    let archive = photo_zip(&[
        ("111.jpg", encoded([255, 0, 0], ImageFormat::Jpeg)),
        ("foto/333.png", encoded([0, 0, 255], ImageFormat::Png)),
        ("__MACOSX/foto/._333.png", b"junk".to_vec()),
    ]);
    let summary = photos.merge_zip(Cursor::new(archive)).expect("merge");
    assert_eq!(summary.added, 2);
    assert_eq!(summary.skipped, 1);

    let fx = Fixture::new(
        roster(vec![
            student(2, 1.0, "Andi", Some(111.0), "A1"),
            student(3, 2.0, "Budi", Some(222.0), "B1"),
            student(4, 3.0, "Citra", Some(333.0), "C1"),
        ]),
        photos,
    );
    let mut ticks = Vec::new();
    let out = render_zip(&fx.inputs(Template::Classic), &mut |done, total| {
        ticks.push((done, total))
    })
    .expect("render");

    assert_eq!(ticks, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(out.entry_names, vec!["Andi.jpg", "Budi.jpg", "Citra.jpg"]);
    assert_eq!(out.collisions, 0);
    let sources: Vec<_> = out.outcomes.iter().map(|o| o.photo).collect();
    assert_eq!(
        sources,
        vec![
            PhotoSource::Primary,
            PhotoSource::Placeholder,
            PhotoSource::Primary
        ]
    );
    assert_eq!(out.outcomes[0].photo_key.as_deref(), Some("111"));
    assert_eq!(out.outcomes[1].photo_key, None);

    let entries = archive_entries(&out.bytes);
    assert_eq!(entries.len(), 3);
    let photo_box = Template::Classic.config().layout.photo;
    let (cx, cy) = (photo_box.center_x(), photo_box.y + photo_box.h / 2);
    let expected = [[255, 0, 0], [255, 255, 255], [0, 0, 255]];
    for ((name, jpeg), want) in entries.iter().zip(expected) {
        let img = image::load_from_memory(jpeg).expect("decode card").to_rgb8();
        assert_eq!((img.width(), img.height()), (1200, 500), "{}", name);
        let px = img.get_pixel(cx, cy);
        assert!(close(px, want), "{}: {:?} not near {:?}", name, px, want);
    }
}

#[test]
fn fallback_identifier_finds_photo_when_primary_is_absent() {
    let mut photos = PhotoIndex::new();
    photos
        .merge_zip(Cursor::new(photo_zip(&[(
            "NIS01.png",
            encoded([0, 160, 0], ImageFormat::Png),
        )])))
        .expect("merge");
    let record = StudentRecord::from_pairs(
        2,
        vec![
            ("NO PESERTA", text("P-1")),
            ("NAMA", text("Dewi")),
            ("NIS", text("NIS01")),
            ("RUANG", text("2")),
        ],
    );
    let fx = Fixture::new(roster(vec![record]), photos);
    let (jpeg, outcome) = render_preview(&fx.inputs(Template::Emergency), 0).expect("preview");
    assert_eq!(outcome.photo, PhotoSource::Fallback);
    assert_eq!(outcome.photo_key.as_deref(), Some("NIS01"));
    let img = image::load_from_memory(&jpeg).expect("decode").to_rgb8();
    let b = Template::Emergency.config().layout.photo;
    assert!(close(img.get_pixel(b.center_x(), b.y + b.h / 2), [0, 160, 0]));

    assert!(render_preview(&fx.inputs(Template::Classic), 1).is_err());
}

#[test]
fn repeated_name_keeps_one_entry_holding_the_later_card() {
    let mut photos = PhotoIndex::new();
    photos.insert("1", DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))));
    photos.insert("2", DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 255]))));
    let fx = Fixture::new(
        roster(vec![
            student(2, 1.0, "Ahmad", Some(1.0), "X"),
            student(3, 2.0, " Ahmad ", Some(2.0), "Y"),
        ]),
        photos,
    );
    let out = render_zip(&fx.inputs(Template::Modern), &mut |_, _| {}).expect("render");
    assert_eq!(out.entry_names, vec!["Ahmad.jpg"]);
    assert_eq!(out.collisions, 1);
    assert_eq!(out.outcomes.len(), 2);

    let entries = archive_entries(&out.bytes);
    assert_eq!(entries.len(), 1);
    let (later, _) = render_preview(&fx.inputs(Template::Modern), 1).expect("preview");
    assert_eq!(entries[0].1, later);
}

#[test]
fn same_inputs_render_identical_bytes() {
    let fx = Fixture::new(
        roster(vec![student(2, 7.0, "Eka", Some(777.0), "E7")]),
        PhotoIndex::new(),
    );
    for t in Template::ALL {
        let (a, _) = render_preview(&fx.inputs(t), 0).expect("first");
        let (b, _) = render_preview(&fx.inputs(t), 0).expect("second");
        assert_eq!(a, b, "{}", t.id());
    }
}

/// Left half opaque red, right half fully transparent.
fn half_transparent_signature() -> DynamicImage {
    let mut img = RgbaImage::from_pixel(120, 60, Rgba([0, 0, 0, 0]));
    for y in 0..60 {
        for x in 0..40 {
            img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
        }
    }
    DynamicImage::ImageRgba8(img)
}

#[test]
fn signature_blends_over_card_and_is_left_out_of_emergency_cards() {
    let record = student(2, 1.0, "Siti", Some(111.0), "NIS01");
    let school = SchoolIdentity::default();
    let logo = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 80, Rgb([0, 0, 255])));
    let signature = half_transparent_signature();
    let images = CardImages {
        photo: None,
        logo: Some(&logo),
        signature: Some(&signature),
    };
    let fonts = FontBook::empty();

    for (template, signed) in [(Template::Classic, true), (Template::Emergency, false)] {
        let content = CardContent::build(&record, template, &school, &[]);
        let card = render_card(&content, template, &images, &fonts).expect("render");
        let l = template.config().layout;
        let inked = card.get_pixel(l.signature.x + 10, l.signature.y + 30);
        let clear = card.get_pixel(l.signature.x + 100, l.signature.y + 30);
        if signed {
            assert!(close(inked, [255, 0, 0]), "{:?}: {:?}", template, inked);
        } else {
            assert!(close(inked, [255, 255, 255]), "{:?}: {:?}", template, inked);
        }
        assert!(close(clear, [255, 255, 255]), "{:?}: {:?}", template, clear);

        let logo_px = card.get_pixel(l.logo.x + l.logo.w / 2, l.logo.y + l.logo.h / 2);
        assert!(close(logo_px, [0, 0, 255]), "{:?}: {:?}", template, logo_px);
    }
}

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn find_font(dir: &Path, depth: usize) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ttf"))
            .unwrap_or(false)
        {
            return Some(path);
        }
    }
    if depth == 0 {
        return None;
    }
    subdirs.into_iter().find_map(|d| find_font(&d, depth - 1))
}

#[test]
fn fonts_from_workspace_folder_are_used_for_text() {
    let source = [
        "/usr/share/fonts",
        "/usr/local/share/fonts",
        "/System/Library/Fonts",
        "C:\\Windows\\Fonts",
    ]
    .iter()
    .find_map(|d| find_font(Path::new(d), 4));
    let Some(source) = source else {
        eprintln!("no .ttf available on this machine; skipping");
        return;
    };
    let dir = temp_dir("examcard-fonts");
    std::fs::copy(&source, dir.join("card.ttf")).expect("copy font");
    std::fs::write(dir.join("notes.txt"), b"not a font").expect("write");

    let system = FontBook::load(&[]);
    let with_dir = FontBook::load(&[dir.as_path()]);
    assert!(with_dir.face_count() > system.face_count());

    let record = student(2, 1.0, "Siti Aminah", Some(111.0), "NIS01");
    let school = SchoolIdentity {
        name: "SMA Contoh".into(),
        ..SchoolIdentity::default()
    };
    let content = CardContent::build(&record, Template::Classic, &school, &[]);
    let images = CardImages::default();
    let blank = render_card(&content, Template::Classic, &images, &FontBook::empty())
        .expect("render without fonts");
    let lettered =
        render_card(&content, Template::Classic, &images, &with_dir).expect("render with fonts");
    let dark = |img: &RgbImage| img.pixels().filter(|p| p.0.iter().all(|c| *c < 100)).count();
    assert!(dark(&lettered) > dark(&blank));
}
