use crate::sheet::CellValue;

/// Canonical key for a spreadsheet identifier.
///
/// Spreadsheet numeric typing turns `12345` into `12345.0`; exactly one trailing `.0` is removed
/// per call, so `12345.00` becomes `12345.0` rather than collapsing further.
pub fn normalize_identifier(raw: &str) -> String {
    let t = raw.trim();
    t.strip_suffix(".0").unwrap_or(t).trim().to_string()
}

/// Stringify a cell the way it displays, then normalize it. Empty cells map to `""`, which never
/// matches a photo key.
pub fn normalize_cell(cell: &CellValue) -> String {
    normalize_identifier(&cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_trailing_float_suffix() {
        assert_eq!(normalize_identifier("12345.0"), "12345");
        assert_eq!(normalize_identifier("12345.00"), "12345.0");
        assert_eq!(normalize_identifier("  0012 "), "0012");
        assert_eq!(normalize_identifier("A.0B"), "A.0B");
        assert_eq!(normalize_identifier(""), "");
    }

    #[test]
    fn numeric_cells_lose_the_coercion_artifact() {
        assert_eq!(normalize_cell(&CellValue::Number(12345.0)), "12345");
        assert_eq!(normalize_cell(&CellValue::Number(7.5)), "7.5");
        assert_eq!(normalize_cell(&CellValue::Text(" NIS01 ".into())), "NIS01");
        assert_eq!(normalize_cell(&CellValue::Empty), "");
    }
}
