//! Minimal `.xlsx` reader.
//!
//! Only what the roster needs: sheet names in workbook order, shared strings, and typed cell
//! values laid out as dense rows. Of the styles only number formats are read, so date and time
//! cells come back as dates instead of serial numbers. Formulas and merged ranges are ignored; a
//! formula cell contributes its cached value.

use anyhow::{anyhow, Context};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const WORKBOOK_ENTRY: &str = "xl/workbook.xml";
const WORKBOOK_RELS_ENTRY: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_ENTRY: &str = "xl/sharedStrings.xml";
const STYLES_ENTRY: &str = "xl/styles.xml";

/// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_DATE_SERIAL: f64 = 2_958_465.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

static EMPTY_CELL: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    /// Integral numbers keep a trailing `.0`, matching how numeric spreadsheet columns print once
    /// they have been coerced to floats.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
            CellValue::Date(d) => write!(f, "{}", d.format("%d/%m/%Y")),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%d/%m/%Y %H:%M")),
            CellValue::Time(t) => write!(f, "{}", t.format("%H:%M")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

#[derive(Debug, Clone)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path)
            .with_context(|| format!("failed to open spreadsheet {}", path.to_string_lossy()))?;
        Self::from_reader(f)
            .with_context(|| format!("failed to read spreadsheet {}", path.to_string_lossy()))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> anyhow::Result<Self> {
        let mut archive = ZipArchive::new(reader).context("not an xlsx (zip) file")?;

        let workbook_xml = read_entry(&mut archive, WORKBOOK_ENTRY)?
            .ok_or_else(|| anyhow!("spreadsheet missing {}", WORKBOOK_ENTRY))?;
        let (declared, date1904) = parse_workbook(&workbook_xml)?;
        let targets = match read_entry(&mut archive, WORKBOOK_RELS_ENTRY)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let shared = match read_entry(&mut archive, SHARED_STRINGS_ENTRY)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };
        let formats = match read_entry(&mut archive, STYLES_ENTRY)? {
            Some(xml) => parse_styles(&xml).context("failed to parse styles")?,
            None => Vec::new(),
        };
        let ctx = CellContext {
            shared: &shared,
            formats: &formats,
            date1904,
        };

        let mut sheets = Vec::with_capacity(declared.len());
        for (i, (name, rel_id)) in declared.into_iter().enumerate() {
            let entry = targets
                .get(&rel_id)
                .map(|t| resolve_target(t))
                .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", i + 1));
            let Some(xml) = read_entry(&mut archive, &entry)? else {
                return Err(anyhow!("sheet '{}' points at missing part {}", name, entry));
            };
            let rows = parse_worksheet(&xml, &ctx)
                .with_context(|| format!("failed to parse sheet '{}'", name))?;
            sheets.push(Sheet { name, rows });
        }

        Ok(Workbook { sheets })
    }

    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    /// Case-insensitive lookup on the trimmed sheet name.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        let wanted = name.trim().to_uppercase();
        self.sheets
            .iter()
            .find(|s| s.name.trim().to_uppercase() == wanted)
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to open {}", name)),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(Some(text))
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> anyhow::Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() == key {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            return Ok(Some(unescape(&raw)?.into_owned()));
        }
    }
    Ok(None)
}

/// Relationship id attribute; the namespace prefix is usually `r` but is not guaranteed.
fn rel_id_attr(e: &BytesStart<'_>) -> anyhow::Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        let key = a.key.as_ref();
        if key == b"r:id" || (key.ends_with(b":id") && key.len() > 3) {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            return Ok(Some(unescape(&raw)?.into_owned()));
        }
    }
    Ok(None)
}

fn push_entity(out: &mut String, raw: &[u8]) {
    let name = String::from_utf8_lossy(raw);
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        if let Some(ch) = code.and_then(char::from_u32) {
            out.push(ch);
        }
    } else if let Some(s) = resolve_predefined_entity(&name) {
        out.push_str(s);
    }
}

/// Declared sheets as `(name, relationship id)`, plus whether the workbook counts dates from 1904.
fn parse_workbook(xml: &str) -> anyhow::Result<(Vec<(String, String)>, bool)> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    let mut date1904 = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attr(&e, b"name")?.unwrap_or_default();
                    let rel = rel_id_attr(&e)?.unwrap_or_default();
                    sheets.push((name, rel));
                }
                b"workbookPr" => {
                    date1904 = matches!(attr(&e, b"date1904")?.as_deref(), Some("1" | "true"));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok((sheets, date1904))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberFormat {
    General,
    Date,
    DateTime,
    Time,
}

fn builtin_format(id: u32) -> NumberFormat {
    match id {
        14..=17 | 27..=31 | 34..=36 | 50..=58 => NumberFormat::Date,
        22 => NumberFormat::DateTime,
        18..=21 | 32 | 33 | 45..=47 => NumberFormat::Time,
        _ => NumberFormat::General,
    }
}

/// Classify a custom format code by its first section. Quoted literals, escapes and bracketed
/// modifiers (`[Red]`, `[$-409]`) are skipped; `[h]` style elapsed time counts as time. A lone `m`
/// is a month unless the code also has hours or seconds.
fn classify_format_code(code: &str) -> NumberFormat {
    let mut date = false;
    let mut time = false;
    let mut month_or_minute = false;
    let mut chars = code.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                let inner = inner.to_ascii_lowercase();
                if !inner.is_empty() && inner.chars().all(|c| matches!(c, 'h' | 'm' | 's')) {
                    time = true;
                }
            }
            ';' => break,
            'd' | 'D' | 'y' | 'Y' => date = true,
            'h' | 'H' | 's' | 'S' => time = true,
            'm' | 'M' => month_or_minute = true,
            _ => {}
        }
    }
    let date = date || (month_or_minute && !time);
    match (date, time) {
        (true, true) => NumberFormat::DateTime,
        (true, false) => NumberFormat::Date,
        (false, true) => NumberFormat::Time,
        (false, false) => NumberFormat::General,
    }
}

/// Number format of every cell style (`cellXfs`), indexed by the cell's `s` attribute.
fn parse_styles(xml: &str) -> anyhow::Result<Vec<NumberFormat>> {
    let mut reader = Reader::from_str(xml);
    let mut custom: HashMap<u32, NumberFormat> = HashMap::new();
    let mut xf_format_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attr(&e, b"numFmtId")?.and_then(|s| s.trim().parse::<u32>().ok());
                    if let (Some(id), Some(code)) = (id, attr(&e, b"formatCode")?) {
                        custom.insert(id, classify_format_code(&code));
                    }
                }
                b"xf" if in_cell_xfs => {
                    let id = attr(&e, b"numFmtId")?
                        .and_then(|s| s.trim().parse::<u32>().ok())
                        .unwrap_or(0);
                    xf_format_ids.push(id);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(xf_format_ids
        .into_iter()
        .map(|id| custom.get(&id).copied().unwrap_or_else(|| builtin_format(id)))
        .collect())
}

/// Serial day number to a calendar value. The 1900 system counts a phantom 1900-02-29 as serial
/// 60 (shown here as 1900-03-01), so serials from 61 on count from 1899-12-30.
fn serial_to_cell(serial: f64, format: NumberFormat, date1904: bool) -> Option<CellValue> {
    if format == NumberFormat::General
        || !serial.is_finite()
        || !(0.0..=MAX_DATE_SERIAL).contains(&serial)
    {
        return None;
    }
    let mut days = serial.trunc() as u64;
    let mut secs = (serial.fract() * SECONDS_PER_DAY).round() as u32;
    if secs >= SECONDS_PER_DAY as u32 {
        days += 1;
        secs -= SECONDS_PER_DAY as u32;
    }
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?;
    if format == NumberFormat::Time {
        return Some(CellValue::Time(time));
    }
    let epoch = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if days < 61 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let date = epoch.checked_add_days(Days::new(days))?;
    Some(match format {
        NumberFormat::DateTime => CellValue::DateTime(date.and_time(time)),
        _ => CellValue::Date(date),
    })
}

/// `t="d"` cells carry ISO 8601 text.
fn parse_iso_cell(v: &str) -> Option<CellValue> {
    let v = v.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(if NaiveTime::from_hms_opt(0, 0, 0) == Some(dt.time()) {
            CellValue::Date(dt.date())
        } else {
            CellValue::DateTime(dt)
        });
    }
    if let Ok(d) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
        return Some(CellValue::Date(d));
    }
    NaiveTime::parse_from_str(v, "%H:%M:%S%.f")
        .ok()
        .map(CellValue::Time)
}

fn parse_relationships(xml: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
                    out.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn parse_shared_strings(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    // Phonetic runs (<rPh>) carry reading hints, not cell text.
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si && !in_phonetic => in_t = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_t => current.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) if in_t => push_entity(&mut current, &r),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// `"AB12"` -> column index 27 (zero-based).
fn column_index(reference: &str) -> Option<usize> {
    let mut col = 0usize;
    let mut seen = false;
    for ch in reference.chars() {
        if ch.is_ascii_alphabetic() {
            col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
            seen = true;
        } else {
            break;
        }
    }
    seen.then(|| col - 1)
}

/// Workbook-wide lookups a worksheet needs to type its cells.
struct CellContext<'a> {
    shared: &'a [String],
    formats: &'a [NumberFormat],
    date1904: bool,
}

struct PendingCell {
    col: usize,
    kind: String,
    style: usize,
    value: String,
}

fn finish_cell(cell: PendingCell, ctx: &CellContext<'_>) -> CellValue {
    let v = cell.value;
    match cell.kind.as_str() {
        "s" => v
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| ctx.shared.get(i))
            .map(|s| CellValue::Text(s.clone()))
            .unwrap_or(CellValue::Empty),
        "d" if !v.trim().is_empty() => parse_iso_cell(&v).unwrap_or(CellValue::Text(v)),
        "str" | "inlineStr" | "d" => {
            if v.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(v)
            }
        }
        "b" => CellValue::Bool(v.trim() == "1"),
        "e" => CellValue::Empty,
        _ => {
            let t = v.trim();
            if t.is_empty() {
                CellValue::Empty
            } else {
                match t.parse::<f64>() {
                    Ok(n) => {
                        let format = ctx
                            .formats
                            .get(cell.style)
                            .copied()
                            .unwrap_or(NumberFormat::General);
                        serial_to_cell(n, format, ctx.date1904).unwrap_or(CellValue::Number(n))
                    }
                    Err(_) => CellValue::Text(v),
                }
            }
        }
    }
}

fn parse_worksheet(xml: &str, ctx: &CellContext<'_>) -> anyhow::Result<Vec<Vec<CellValue>>> {
    let mut reader = Reader::from_str(xml);
    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    let mut row_idx: Option<usize> = None;
    let mut next_col = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut capture = false;

    fn place(rows: &mut Vec<Vec<CellValue>>, r: usize, c: usize, value: CellValue) {
        if rows.len() <= r {
            rows.resize_with(r + 1, Vec::new);
        }
        let row = &mut rows[r];
        if row.len() <= c {
            row.resize(c + 1, CellValue::Empty);
        }
        row[c] = value;
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    let r = attr(&e, b"r")?
                        .and_then(|s| s.trim().parse::<usize>().ok())
                        .map(|n| n.saturating_sub(1))
                        .unwrap_or_else(|| row_idx.map(|p| p + 1).unwrap_or(0));
                    row_idx = Some(r);
                    next_col = 0;
                }
                b"c" => {
                    let col = attr(&e, b"r")?
                        .as_deref()
                        .and_then(column_index)
                        .unwrap_or(next_col);
                    let kind = attr(&e, b"t")?.unwrap_or_default();
                    let style = attr(&e, b"s")?
                        .and_then(|s| s.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    cell = Some(PendingCell {
                        col,
                        kind,
                        style,
                        value: String::new(),
                    });
                }
                b"v" | b"t" if cell.is_some() => capture = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let col = attr(&e, b"r")?
                    .as_deref()
                    .and_then(column_index)
                    .unwrap_or(next_col);
                next_col = col + 1;
            }
            Event::Text(t) if capture => {
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) if capture => {
                if let Some(c) = cell.as_mut() {
                    push_entity(&mut c.value, &r);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let Some(done) = cell.take() {
                        let col = done.col;
                        let value = finish_cell(done, ctx);
                        if !value.is_empty() {
                            place(&mut rows, row_idx.unwrap_or(0), col, value);
                        }
                        next_col = col + 1;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}
