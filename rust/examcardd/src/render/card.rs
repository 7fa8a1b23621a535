use serde::{Deserialize, Serialize};

use crate::roster::{StudentRecord, COL_FALLBACK_ID, COL_PRIMARY_ID};
use crate::schedule::ScheduleEntry;
use crate::template::Template;

/// School identity fields typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchoolIdentity {
    /// Line above the school name, e.g. the foundation that runs the school.
    pub foundation: String,
    pub name: String,
    pub address: String,
    pub headmaster: String,
    /// Printed under the card title when set.
    pub exam_name: String,
    /// Place/date line above the signature, e.g. "Bogor, 11 Mei 2026".
    pub sign_place: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardField {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    pub day: String,
    pub slot: String,
    pub time: String,
    pub subject: String,
}

pub const SCHEDULE_TITLE: &str = "JADWAL UJIAN";
pub const SIGN_ROLE: &str = "Kepala Sekolah,";
pub const PHOTO_PLACEHOLDER: &str = "FOTO";
pub const COLUMN_DAY: &str = "HARI/TGL";
pub const COLUMN_SLOT: &str = "JAM KE";
pub const COLUMN_TIME: &str = "WAKTU";
pub const COLUMN_SUBJECT: &str = "MATA PELAJARAN";
pub const COLUMN_PARAF: &str = "PARAF";

/// Everything one card prints, independent of output format.
#[derive(Debug, Clone, PartialEq)]
pub struct CardContent {
    pub foundation: String,
    pub school_name: String,
    pub address: String,
    pub title: &'static str,
    pub subtitle: String,
    pub warning: Option<&'static str>,
    pub fields: Vec<CardField>,
    pub headmaster: String,
    pub sign_place: String,
    pub schedule: Vec<ScheduleRow>,
    pub paraf_column: bool,
    pub qr_payload: Option<String>,
    pub display_name: String,
}

impl CardContent {
    /// Field order is fixed: participant number, name (uppercased), identifier, room. The
    /// identifier shown is the primary one when the record has it, else the fallback, labeled
    /// after the column it came from.
    pub fn build(
        record: &StudentRecord,
        template: Template,
        school: &SchoolIdentity,
        schedule: &[ScheduleEntry],
    ) -> Self {
        let cfg = template.config();
        let participant = record.participant_no();
        let name = record.name();
        let display_name = name.to_uppercase();
        let primary = record.primary_id();
        let (id_label, id_value) = if primary.is_empty() {
            (COL_FALLBACK_ID, record.fallback_id())
        } else {
            (COL_PRIMARY_ID, primary)
        };

        let fields = vec![
            CardField {
                label: "No Peserta",
                value: participant.clone(),
            },
            CardField {
                label: "Nama",
                value: display_name.clone(),
            },
            CardField {
                label: id_label,
                value: id_value.clone(),
            },
            CardField {
                label: "Ruang",
                value: record.room(),
            },
        ];

        let qr_payload = cfg
            .show_qr
            .then(|| format!("{}|{}|{}", participant, id_value, display_name));

        CardContent {
            foundation: school.foundation.trim().to_string(),
            school_name: school.name.trim().to_string(),
            address: school.address.trim().to_string(),
            title: cfg.title,
            subtitle: school.exam_name.trim().to_string(),
            warning: cfg.warning,
            fields,
            headmaster: school.headmaster.trim().to_string(),
            sign_place: school.sign_place.trim().to_string(),
            schedule: schedule
                .iter()
                .map(|e| ScheduleRow {
                    day: crate::ident::normalize_identifier(&e.day),
                    slot: crate::ident::normalize_identifier(&e.slot),
                    time: crate::ident::normalize_identifier(&e.time),
                    subject: crate::ident::normalize_identifier(&e.subject),
                })
                .collect(),
            paraf_column: cfg.paraf_column,
            qr_payload,
            display_name: name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

    fn record(pairs: &[(&str, CellValue)]) -> StudentRecord {
        StudentRecord::from_pairs(2, pairs.iter().cloned())
    }

    #[test]
    fn fields_are_ordered_normalized_and_uppercased() {
        let r = record(&[
            ("NO PESERTA", CellValue::Number(12.0)),
            ("NAMA", CellValue::Text("  Siti Aminah ".into())),
            ("NISN", CellValue::Number(998877.0)),
            ("NIS", CellValue::Text("NIS01".into())),
            ("RUANG", CellValue::Number(4.0)),
        ]);
        let c = CardContent::build(&r, Template::Classic, &SchoolIdentity::default(), &[]);
        let pairs: Vec<_> = c.fields.iter().map(|f| (f.label, f.value.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("No Peserta", "12"),
                ("Nama", "SITI AMINAH"),
                ("NISN", "998877"),
                ("Ruang", "4"),
            ]
        );
        assert_eq!(c.display_name, "Siti Aminah");
        assert!(c.qr_payload.is_none());
    }

    #[test]
    fn fallback_identifier_is_shown_when_primary_is_blank() {
        let r = record(&[
            ("NAMA", CellValue::Text("Budi".into())),
            ("NIS", CellValue::Number(222.0)),
        ]);
        let c = CardContent::build(&r, Template::Modern, &SchoolIdentity::default(), &[]);
        assert_eq!(c.fields[2].label, "NIS");
        assert_eq!(c.fields[2].value, "222");
        assert_eq!(c.qr_payload.as_deref(), Some("|222|BUDI"));
    }

    #[test]
    fn emergency_template_carries_title_and_warning() {
        let r = record(&[("NAMA", CellValue::Text("Budi".into()))]);
        let schedule = vec![ScheduleEntry::new("Senin", "1.0", "07.30", "IPA")];
        let c = CardContent::build(&r, Template::Emergency, &SchoolIdentity::default(), &schedule);
        assert_eq!(c.title, "KARTU PESERTA UJIAN (DUPLIKAT)");
        assert!(c.warning.is_some());
        assert_eq!(c.schedule[0].slot, "1");
    }
}
