use examcardd::roster::{load_workbook, RosterError};
use examcardd::schedule::Schedule;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

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

fn write_students(path: &Path, header: &[&str], with_schedule: bool) {
    let mut wb = Workbook::new();
    {
        let ws = wb.add_worksheet();
        ws.set_name("Siswa").expect("sheet name");
        for (c, h) in header.iter().enumerate() {
            ws.write_string(0, c as u16, *h).expect("header");
        }
        // Numbers as a spreadsheet user would type them; the participant number is text.
        ws.write_string(1, 0, "01-001").expect("cell");
        ws.write_string(1, 1, "  Siti Aminah ").expect("cell");
        ws.write_number(1, 2, 12345).expect("cell");
        ws.write_string(1, 3, "NIS01").expect("cell");
        ws.write_number(1, 4, 3).expect("cell");
        // Row 3 left blank on purpose.
        ws.write_string(3, 0, "01-002").expect("cell");
        ws.write_string(3, 1, "Budi").expect("cell");
        ws.write_string(3, 3, "NIS02").expect("cell");
        ws.write_number(3, 4, 3).expect("cell");
    }
    if with_schedule {
        let ws = wb.add_worksheet();
        ws.set_name("JADWAL").expect("sheet name");
        for (c, h) in ["HARI", "JAM KE", "WAKTU", "MAPEL"].iter().enumerate() {
            ws.write_string(0, c as u16, *h).expect("header");
        }
        ws.write_string(1, 0, "Senin, 11 Mei").expect("cell");
        ws.write_number(1, 1, 1).expect("cell");
        ws.write_string(1, 2, "07.30 - 09.00").expect("cell");
        ws.write_string(1, 3, "Matematika").expect("cell");
        ws.write_string(2, 0, "Selasa, 12 Mei").expect("cell");
        ws.write_number(2, 1, 2).expect("cell");
        ws.write_string(2, 2, "09.30 - 11.00").expect("cell");
        ws.write_string(2, 3, "Fisika").expect("cell");
    }
    wb.save(path).expect("save workbook");
}

const HEADER: [&str; 5] = ["No Peserta", "Nama", "NISN", "NIS", "Ruang"];

#[test]
fn loads_students_in_row_order_with_normalized_identifiers() {
    let dir = temp_dir("examcard-roster");
    let path = dir.join("siswa.xlsx");
    write_students(&path, &HEADER, true);

    let loaded = load_workbook(&path).expect("load");
    let roster = loaded.roster;
    assert_eq!(roster.len(), 2);
    assert_eq!(roster.source(), Some(path.as_path()));

    let first = &roster.records()[0];
    assert_eq!(first.row(), 2);
    assert_eq!(first.participant_no(), "01-001");
    assert_eq!(first.name(), "Siti Aminah");
    assert_eq!(first.primary_id(), "12345");
    assert_eq!(first.fallback_id(), "NIS01");
    assert_eq!(first.room(), "3");

    let second = &roster.records()[1];
    assert_eq!(second.row(), 4);
    assert_eq!(second.primary_id(), "");
    assert_eq!(second.fallback_id(), "NIS02");

    let entries = loaded.schedule.expect("timetable sheet");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].slot, "1");
    assert_eq!(entries[1].subject, "Fisika");
}

#[test]
fn timetable_only_fills_an_empty_schedule() {
    let dir = temp_dir("examcard-roster-schedule");
    let path = dir.join("siswa.xlsx");
    write_students(&path, &HEADER, true);

    let mut schedule = Schedule::new();
    let entries = load_workbook(&path).expect("load").schedule.expect("sheet");
    assert_eq!(schedule.load_if_empty(entries), 2);
    let again = load_workbook(&path).expect("load").schedule.expect("sheet");
    assert_eq!(schedule.load_if_empty(again), 0);
    assert_eq!(schedule.len(), 2);
}

#[test]
fn missing_timetable_sheet_is_not_an_error() {
    let dir = temp_dir("examcard-roster-nosched");
    let path = dir.join("siswa.xlsx");
    write_students(&path, &HEADER, false);
    let loaded = load_workbook(&path).expect("load");
    assert!(loaded.schedule.is_none());
    assert_eq!(loaded.roster.len(), 2);
}

#[test]
fn misnamed_column_reports_expected_set() {
    let dir = temp_dir("examcard-roster-bad");
    let path = dir.join("siswa.xlsx");
    write_students(&path, &["No Peserta", "Nama Lengkap", "NISN", "NIS", "Ruang"], false);

    let e = match load_workbook(&path) {
        Ok(_) => panic!("workbook without NAMA must be rejected"),
        Err(e) => e,
    };
    match e.downcast_ref::<RosterError>() {
        Some(RosterError::MissingColumns { missing, found }) => {
            assert_eq!(missing, &vec!["NAMA".to_string()]);
            assert!(found.contains(&"NAMA LENGKAP".to_string()));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(RosterError::expected_columns().contains(&"NAMA".to_string()));
}

#[test]
fn timetable_date_and_time_cells_print_as_written() {
    let dir = temp_dir("examcard-roster-dates");
    let path = dir.join("siswa.xlsx");
    let mut wb = Workbook::new();
    {
        let ws = wb.add_worksheet();
        for (c, h) in HEADER.iter().enumerate() {
            ws.write_string(0, c as u16, *h).expect("header");
        }
        ws.write_string(1, 0, "01-001").expect("cell");
        ws.write_string(1, 1, "Siti").expect("cell");
        ws.write_number(1, 2, 12345).expect("cell");
    }
    {
        let ws = wb.add_worksheet();
        ws.set_name("JADWAL").expect("sheet name");
        let date = Format::new().set_num_format("dd/mm/yyyy");
        let clock = Format::new().set_num_format("hh:mm");
        ws.write_string(0, 0, "HARI").expect("header");
        let day = ExcelDateTime::from_ymd(2026, 5, 18).expect("date");
        ws.write_datetime_with_format(1, 0, &day, &date)
            .expect("cell");
        ws.write_number(1, 1, 1).expect("cell");
        let start = ExcelDateTime::from_hms(7, 30, 0).expect("time");
        ws.write_datetime_with_format(1, 2, &start, &clock)
            .expect("cell");
        ws.write_string(1, 3, "Matematika").expect("cell");
        // A day typed as a plain number and a numeric subject code.
        ws.write_number(2, 0, 2).expect("cell");
        ws.write_number(2, 1, 2).expect("cell");
        ws.write_number(2, 3, 101).expect("cell");
    }
    wb.save(&path).expect("save workbook");

    let entries = load_workbook(&path).expect("load").schedule.expect("sheet");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].day, "18/05/2026");
    assert_eq!(entries[0].slot, "1");
    assert_eq!(entries[0].time, "07:30");
    assert_eq!(entries[0].subject, "Matematika");
    assert_eq!(entries[1].day, "2");
    assert_eq!(entries[1].subject, "101");
}
