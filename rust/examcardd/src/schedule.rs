use crate::ident::{normalize_cell, normalize_identifier};
use crate::sheet::{CellValue, Sheet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the optional timetable sheet in the student workbook.
pub const SCHEDULE_SHEET: &str = "JADWAL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub day: String,
    pub slot: String,
    pub time: String,
    pub subject: String,
}

impl ScheduleEntry {
    /// Every field goes through the identifier normalizer: a slot typed as `1` in a spreadsheet
    /// arrives as `1.0`.
    pub fn new(day: &str, slot: &str, time: &str, subject: &str) -> Self {
        ScheduleEntry {
            id: Uuid::new_v4().to_string(),
            day: normalize_identifier(day),
            slot: normalize_identifier(slot),
            time: normalize_identifier(time),
            subject: normalize_identifier(subject),
        }
    }

    fn from_cells(cells: [&CellValue; 4]) -> Self {
        let [day, slot, time, subject] = cells;
        ScheduleEntry {
            id: Uuid::new_v4().to_string(),
            day: normalize_cell(day),
            slot: normalize_cell(slot),
            time: normalize_cell(time),
            subject: normalize_cell(subject),
        }
    }
}

/// Exam timetable in print order.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: ScheduleEntry) {
        self.entries.push(entry);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Bulk load used by the spreadsheet import. A schedule that already has entries is left
    /// untouched; returns how many entries were loaded.
    pub fn load_if_empty(&mut self, entries: Vec<ScheduleEntry>) -> usize {
        if !self.entries.is_empty() {
            return 0;
        }
        let n = entries.len();
        self.entries = entries;
        n
    }
}

/// First four columns of the timetable sheet (day, slot, time, subject). The first row is a
/// header; blank rows are skipped.
pub fn parse_schedule_sheet(sheet: &Sheet) -> Vec<ScheduleEntry> {
    sheet
        .rows
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| row.iter().take(4).any(|c| !c.is_empty()))
        .map(|(r, _)| {
            ScheduleEntry::from_cells([
                sheet.cell(r, 0),
                sheet.cell(r, 1),
                sheet.cell(r, 2),
                sheet.cell(r, 3),
            ])
        })
        .collect()
}
