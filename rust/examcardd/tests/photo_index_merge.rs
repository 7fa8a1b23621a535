use examcardd::photos::{PhotoIndex, PhotoSource};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn png(width: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 4, Rgb([1, 2, 3])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode");
    buf.into_inner()
}

fn archive(entries: &[(&str, Vec<u8>)]) -> Cursor<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        zip.start_file(*name, FileOptions::default()).expect("start");
        zip.write_all(bytes).expect("write");
    }
    Cursor::new(zip.finish().expect("finish").into_inner())
}

#[test]
fn later_archive_overwrites_same_key() {
    let mut index = PhotoIndex::new();
    let first = index
        .merge_zip(archive(&[("12345.jpg", png(5)), ("777.png", png(6))]))
        .expect("first merge");
    assert_eq!((first.added, first.replaced), (2, 0));

    let second = index
        .merge_zip(archive(&[
            ("kelas/12345.png", png(9)),
            ("broken.jpg", b"not an image".to_vec()),
            ("catatan.txt", b"hello".to_vec()),
        ]))
        .expect("second merge");
    assert_eq!(second.added, 0);
    assert_eq!(second.replaced, 1);
    assert_eq!(second.failed, 1);
    assert_eq!(second.skipped, 1);

    assert_eq!(index.len(), 2);
    assert_eq!(index.get("12345").map(|i| i.dimensions().0), Some(9));
    assert_eq!(index.keys(), vec!["12345".to_string(), "777".to_string()]);
}

#[test]
fn lookup_is_idempotent_and_empty_key_never_matches() {
    let mut index = PhotoIndex::new();
    index
        .merge_zip(archive(&[("NIS01.png", png(3))]))
        .expect("merge");
    for _ in 0..3 {
        let m = index.resolve("", "NIS01");
        assert_eq!(m.source, PhotoSource::Fallback);
        assert_eq!(m.key, Some("NIS01"));
    }
    assert!(index.get("").is_none());
    assert_eq!(index.resolve("", "").source, PhotoSource::Placeholder);
}

#[test]
fn files_and_folders_merge_into_the_same_index() {
    let dir = temp_dir("examcard-photo-dir");
    std::fs::write(dir.join("111.png"), png(2)).expect("write");
    std::fs::write(dir.join("222.JPG"), b"garbage").expect("write");
    std::fs::write(dir.join("daftar.xlsx"), b"x").expect("write");

    let mut index = PhotoIndex::new();
    let summary = index.merge_dir(&dir).expect("merge dir");
    assert_eq!((summary.added, summary.failed, summary.skipped), (1, 1, 1));

    let other = temp_dir("examcard-photo-files");
    let replacement = other.join("111.png");
    std::fs::write(&replacement, png(8)).expect("write");
    let summary = index.merge_files(&[replacement, other.join("missing.png")]);
    assert_eq!((summary.replaced, summary.failed), (1, 1));
    assert_eq!(index.get("111").map(|i| i.width()), Some(8));

    assert!(index.merge_dir(&dir.join("does-not-exist")).is_err());
}
