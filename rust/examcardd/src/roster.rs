use crate::ident::normalize_cell;
use crate::schedule::{parse_schedule_sheet, ScheduleEntry, SCHEDULE_SHEET};
use crate::sheet::{CellValue, Sheet, Workbook};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const COL_PARTICIPANT: &str = "NO PESERTA";
pub const COL_NAME: &str = "NAMA";
/// Primary photo key.
pub const COL_PRIMARY_ID: &str = "NISN";
/// Looked up when the primary identifier has no photo.
pub const COL_FALLBACK_ID: &str = "NIS";
pub const COL_ROOM: &str = "RUANG";

static EMPTY: CellValue = CellValue::Empty;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("the workbook has no sheets")]
    NoSheets,
    #[error("the student sheet has no header row")]
    NoHeader,
    #[error("missing required columns: {}", missing.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },
}

impl RosterError {
    pub fn expected_columns() -> Vec<String> {
        vec![
            COL_PARTICIPANT.to_string(),
            COL_NAME.to_string(),
            format!("{} or {}", COL_PRIMARY_ID, COL_FALLBACK_ID),
            COL_ROOM.to_string(),
        ]
    }
}

/// Trim, uppercase and collapse inner whitespace: `" no  peserta "` -> `"NO PESERTA"`.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    row: usize,
    cells: HashMap<String, CellValue>,
}

impl StudentRecord {
    pub fn from_pairs<I, K>(row: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: AsRef<str>,
    {
        StudentRecord {
            row,
            cells: pairs
                .into_iter()
                .map(|(k, v)| (normalize_header(k.as_ref()), v))
                .collect(),
        }
    }

    /// 1-based spreadsheet row number.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(&normalize_header(column)).unwrap_or(&EMPTY)
    }

    pub fn text(&self, column: &str) -> String {
        self.get(column).to_string().trim().to_string()
    }

    pub fn participant_no(&self) -> String {
        normalize_cell(self.get(COL_PARTICIPANT))
    }

    pub fn name(&self) -> String {
        self.text(COL_NAME)
    }

    pub fn primary_id(&self) -> String {
        normalize_cell(self.get(COL_PRIMARY_ID))
    }

    pub fn fallback_id(&self) -> String {
        normalize_cell(self.get(COL_FALLBACK_ID))
    }

    pub fn room(&self) -> String {
        normalize_cell(self.get(COL_ROOM))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    columns: Vec<String>,
    records: Vec<StudentRecord>,
    source: Option<PathBuf>,
}

impl Roster {
    pub fn from_records(columns: Vec<String>, records: Vec<StudentRecord>) -> Self {
        Roster {
            columns,
            records,
            source: None,
        }
    }

    /// The header is the first non-empty row; fully blank data rows are dropped. Row order is
    /// kept as-is.
    pub fn from_sheet(sheet: &Sheet) -> Result<Self, RosterError> {
        let header_idx = sheet
            .rows
            .iter()
            .position(|r| r.iter().any(|c| !c.is_empty()))
            .ok_or(RosterError::NoHeader)?;
        let columns: Vec<String> = sheet.rows[header_idx]
            .iter()
            .map(|c| normalize_header(&c.to_string()))
            .collect();

        let has = |name: &str| columns.iter().any(|c| c == name);
        let mut missing = Vec::new();
        for col in [COL_PARTICIPANT, COL_NAME] {
            if !has(col) {
                missing.push(col.to_string());
            }
        }
        if !has(COL_PRIMARY_ID) && !has(COL_FALLBACK_ID) {
            missing.push(format!("{} or {}", COL_PRIMARY_ID, COL_FALLBACK_ID));
        }
        if !has(COL_ROOM) {
            missing.push(COL_ROOM.to_string());
        }
        if !missing.is_empty() {
            return Err(RosterError::MissingColumns {
                missing,
                found: columns.into_iter().filter(|c| !c.is_empty()).collect(),
            });
        }

        let mut records = Vec::new();
        for (r, row) in sheet.rows.iter().enumerate().skip(header_idx + 1) {
            if row.iter().all(|c| c.is_empty()) {
                continue;
            }
            let cells = columns
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.is_empty())
                .map(|(i, name)| (name.clone(), sheet.cell(r, i).clone()))
                .collect();
            records.push(StudentRecord { row: r + 1, cells });
        }

        Ok(Roster {
            columns: columns.into_iter().filter(|c| !c.is_empty()).collect(),
            records,
            source: None,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// A parsed student workbook: the roster from the first sheet and, when the workbook carries a
/// timetable sheet, its entries.
pub struct LoadedWorkbook {
    pub roster: Roster,
    pub schedule: Option<Vec<ScheduleEntry>>,
}

pub fn load_workbook(path: &Path) -> anyhow::Result<LoadedWorkbook> {
    let workbook = Workbook::open(path)?;
    let mut loaded = from_workbook(&workbook)?;
    loaded.roster.source = Some(path.to_path_buf());
    Ok(loaded)
}

pub fn from_workbook(workbook: &Workbook) -> anyhow::Result<LoadedWorkbook> {
    let first = workbook.first_sheet().ok_or(RosterError::NoSheets)?;
    let roster = Roster::from_sheet(first)?;
    let schedule = workbook.sheet(SCHEDULE_SHEET).map(parse_schedule_sheet);
    match &schedule {
        Some(entries) => tracing::info!(entries = entries.len(), "timetable sheet found"),
        None => tracing::info!("no timetable sheet; schedule stays manual"),
    }
    Ok(LoadedWorkbook { roster, schedule })
}
