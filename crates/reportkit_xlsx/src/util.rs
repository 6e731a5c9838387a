//! Stateless helper utilities shared by the workbook model and the builders.

use polars::prelude::{AnyValue, TimeUnit};

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
    TUP_HTML_NAMED_COLORS,
};
use crate::spec::{EngineError, EnumCellValue};

/// Days between the Excel epoch (1899-12-30) and the Unix epoch.
const N_DAYS_EXCEL_TO_UNIX_EPOCH: f64 = 25_569.0;

////////////////////////////////////////////////////////////////////////////////
// #region TextValidation

/// Whether `value` is empty or whitespace-only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validate an Excel sheet name (non-blank, length cap, no illegal chars,
/// no leading/trailing apostrophe).
pub fn validate_sheet_name(name: &str) -> Result<(), EngineError> {
    let reject = |reason: &str| EngineError::InvalidSheetName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if is_blank(name) {
        return Err(reject("name must not be blank"));
    }
    if name.chars().count() > N_LEN_EXCEL_SHEET_NAME_MAX {
        return Err(reject(&format!(
            "name must be at most {N_LEN_EXCEL_SHEET_NAME_MAX} characters"
        )));
    }
    if let Some(c_illegal) = TUP_EXCEL_ILLEGAL.iter().find(|c| name.contains(**c)) {
        return Err(reject(&format!("name must not contain {c_illegal:?}")));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(reject("name must not start or end with an apostrophe"));
    }
    Ok(())
}

/// Normalize a fill color to upper-case `#RRGGBB`.
///
/// Accepts HTML color names (`Red`, `LightYellow`, any case) and hex values in
/// `RGB`, `RRGGBB`, or `AARRGGBB` form, with or without `#`. The alpha channel
/// of an ARGB value is dropped.
pub fn normalize_color(color: &str) -> Result<String, EngineError> {
    Ok(format!("#{:06X}", parse_color(color)?))
}

/// Parse a fill color into its `0xRRGGBB` value. See [`normalize_color`].
pub fn parse_color(color: &str) -> Result<u32, EngineError> {
    let c_color = color.trim();
    let c_name = c_color.to_ascii_lowercase();
    if let Some((_, n_rgb)) = TUP_HTML_NAMED_COLORS
        .iter()
        .find(|(c_known, _)| *c_known == c_name)
    {
        return Ok(*n_rgb);
    }

    let reject = || EngineError::InvalidColor(color.to_string());
    let c_hex = c_color.strip_prefix('#').unwrap_or(c_color);
    if !c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return Err(reject());
    }
    let c_rgb = match c_hex.len() {
        3 => c_hex.chars().flat_map(|chr| [chr, chr]).collect::<String>(),
        6 => c_hex.to_string(),
        8 => c_hex[2..].to_string(),
        _ => return Err(reject()),
    };
    u32::from_str_radix(&c_rgb, 16).map_err(|_| reject())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellAddressing

/// Validate a 1-based cell address against the Excel grid.
pub fn validate_cell_address(row: usize, col: usize) -> Result<(), EngineError> {
    if row == 0 || col == 0 || row > N_NROWS_EXCEL_MAX || col > N_NCOLS_EXCEL_MAX {
        return Err(EngineError::InvalidCellAddress { row, col });
    }
    Ok(())
}

/// Convert a 1-based column index to its letter form (`1 -> A`, `28 -> AB`).
pub fn derive_column_letter(col: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = col;
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// A1-style reference for a 1-based `(row, col)`.
pub fn derive_cell_reference(row: usize, col: usize) -> String {
    format!("{}{row}", derive_column_letter(col))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Convert one table value into a workbook cell value.
///
/// Dates and datetimes become Excel serial numbers; non-finite floats become blank.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => derive_finite_number(val as f64),
        AnyValue::Float64(val) => derive_finite_number(val),
        AnyValue::Date(n_days) => EnumCellValue::Number(n_days as f64 + N_DAYS_EXCEL_TO_UNIX_EPOCH),
        AnyValue::Datetime(n_ticks, time_unit, _) => {
            EnumCellValue::Number(derive_excel_serial_from_ticks(n_ticks, time_unit))
        }
        AnyValue::DatetimeOwned(n_ticks, time_unit, _) => {
            EnumCellValue::Number(derive_excel_serial_from_ticks(n_ticks, time_unit))
        }
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn derive_finite_number(value: f64) -> EnumCellValue {
    if value.is_finite() {
        EnumCellValue::Number(value)
    } else {
        EnumCellValue::None
    }
}

fn derive_excel_serial_from_ticks(n_ticks: i64, time_unit: TimeUnit) -> f64 {
    let n_ticks_per_day = match time_unit {
        TimeUnit::Nanoseconds => 86_400_000_000_000.0,
        TimeUnit::Microseconds => 86_400_000_000.0,
        TimeUnit::Milliseconds => 86_400_000.0,
    };
    n_ticks as f64 / n_ticks_per_day + N_DAYS_EXCEL_TO_UNIX_EPOCH
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_column_letter() {
        assert_eq!(derive_column_letter(1), "A");
        assert_eq!(derive_column_letter(26), "Z");
        assert_eq!(derive_column_letter(27), "AA");
        assert_eq!(derive_column_letter(28), "AB");
        assert_eq!(derive_column_letter(16_384), "XFD");
        assert_eq!(derive_cell_reference(12, 3), "C12");
    }

    #[test]
    fn test_validate_sheet_name_rejects_excel_illegal_names() {
        assert!(validate_sheet_name("Q1 Sales").is_ok());
        assert!(validate_sheet_name("   ").is_err());
        assert!(validate_sheet_name("a/b").is_err());
        assert!(validate_sheet_name("'quoted").is_err());
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
        assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
    }

    #[test]
    fn test_normalize_color_accepts_hex_forms() {
        assert_eq!(normalize_color("#ffffcc").expect("color"), "#FFFFCC");
        assert_eq!(normalize_color("000000").expect("color"), "#000000");
        assert_eq!(normalize_color("#FC0").expect("color"), "#FFCC00");
        // ARGB: alpha dropped.
        assert_eq!(normalize_color("#80FF0000").expect("color"), "#FF0000");
        assert_eq!(parse_color("#FFFFCC").expect("color"), 0xFF_FF_CC);
    }

    #[test]
    fn test_normalize_color_accepts_html_names() {
        assert_eq!(normalize_color("Red").expect("color"), "#FF0000");
        assert_eq!(normalize_color(" lightyellow ").expect("color"), "#FFFFE0");
        assert_eq!(normalize_color("NAVY").expect("color"), "#000080");
    }

    #[test]
    fn test_normalize_color_rejects_malformed_input() {
        for c_color in ["", "#FFFF", "#GGGGGG", "chartreuse-ish", "#FF0000FF00"] {
            assert!(
                matches!(normalize_color(c_color), Err(EngineError::InvalidColor(_))),
                "{c_color:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_validate_cell_address_is_one_based() {
        assert!(validate_cell_address(1, 1).is_ok());
        assert!(validate_cell_address(0, 1).is_err());
        assert!(validate_cell_address(1, 0).is_err());
        assert!(validate_cell_address(1, N_NCOLS_EXCEL_MAX + 1).is_err());
    }

    #[test]
    fn test_derive_cell_value_from_any_value() {
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Int32(25)),
            EnumCellValue::Number(25.0)
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::String("Cookie")),
            EnumCellValue::String("Cookie".to_string())
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Float64(f64::NAN)),
            EnumCellValue::None
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Null),
            EnumCellValue::None
        );
        // 1970-01-01
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Date(0)),
            EnumCellValue::Number(25_569.0)
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Datetime(
                43_200_000,
                TimeUnit::Milliseconds,
                None
            )),
            EnumCellValue::Number(25_569.5)
        );
    }
}
