//! Shared report specification models and top-level error types.

use std::fmt;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::util::{derive_cell_reference, is_blank};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format overlay.
///
/// Every field is optional; `None` means "inherit from the layer below"
/// (sheet base -> column -> cell).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCellFormat {
    /// Font size in points.
    pub font_size: Option<f64>,
    /// OOXML font family number (1 roman, 2 swiss, 3 modern, ...).
    pub font_family: Option<u8>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color, normalized `#RRGGBB`.
    pub bg_color: Option<String>,
}

impl SpecCellFormat {
    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_size: other.font_size.or(self.font_size),
            font_family: other.font_family.or(self.font_family),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
        }
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        *self == SpecCellFormat::default()
    }
}

/// Normalized cell value stored in the workbook model.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value (dates are Excel serial numbers).
    Number(f64),
    /// Boolean value.
    Boolean(bool),
}

impl EnumCellValue {
    /// Whether the value is blank.
    pub fn is_none(&self) -> bool {
        matches!(self, EnumCellValue::None)
    }

    /// Text rendering used for merged-range anchors and diagnostics.
    pub fn to_text(&self) -> String {
        match self {
            EnumCellValue::None => String::new(),
            EnumCellValue::String(val) => val.clone(),
            EnumCellValue::Number(val) => val.to_string(),
            EnumCellValue::Boolean(val) => if *val { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        EnumCellValue::String(value.to_string())
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        EnumCellValue::Number(value)
    }
}

/// One cell of the workbook model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCell {
    /// Cell value.
    pub value: EnumCellValue,
    /// Cell-level format overlay.
    pub format: SpecCellFormat,
    /// Set by "clear all formats": the column layer no longer applies.
    pub if_format_cleared: bool,
}

/// Inclusive, 1-based rectangular cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecCellRange {
    /// First row (1-based).
    pub row_start: usize,
    /// First column (1-based).
    pub col_start: usize,
    /// Last row (1-based, inclusive).
    pub row_end: usize,
    /// Last column (1-based, inclusive).
    pub col_end: usize,
}

impl SpecCellRange {
    /// Build a range from its corners.
    pub fn new(row_start: usize, col_start: usize, row_end: usize, col_end: usize) -> Self {
        Self {
            row_start,
            col_start,
            row_end,
            col_end,
        }
    }

    /// Whether `(row, col)` lies in the range.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_start..=self.row_end).contains(&row)
            && (self.col_start..=self.col_end).contains(&col)
    }

    /// Whether two ranges share at least one cell.
    pub fn intersects(&self, other: &SpecCellRange) -> bool {
        self.row_start <= other.row_end
            && other.row_start <= self.row_end
            && self.col_start <= other.col_end
            && other.col_start <= self.col_end
    }

    /// Whether the range covers exactly one cell.
    pub fn is_single_cell(&self) -> bool {
        self.row_start == self.row_end && self.col_start == self.col_end
    }
}

impl fmt::Display for SpecCellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            derive_cell_reference(self.row_start, self.col_start),
            derive_cell_reference(self.row_end, self.col_end)
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnSpecification

/// Caller-facing presentation options for one configured column.
///
/// Blank strings are treated the same as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnOptions {
    /// Number format code, e.g. [`crate::conf::FMT_QUANTITY`].
    pub num_format: Option<String>,
    /// Center the whole column horizontally.
    pub if_centered: bool,
    /// Background fill: HTML color name (`LightYellow`) or hex such as `#FFFFCC`.
    pub bg_color: Option<String>,
}

impl SpecColumnOptions {
    /// Options with only a number format.
    pub fn with_num_format(num_format: impl Into<String>) -> Self {
        Self {
            num_format: Some(num_format.into()),
            ..Default::default()
        }
    }

    /// Options with only a background fill.
    pub fn with_bg_color(bg_color: impl Into<String>) -> Self {
        Self {
            bg_color: Some(bg_color.into()),
            ..Default::default()
        }
    }
}

/// Formatting intent for one output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnStyle {
    /// Output (renamed) column the style applies to.
    pub output_column_name: String,
    /// Number format code.
    pub num_format: Option<String>,
    /// Horizontal centering.
    pub if_centered: bool,
    /// Background fill color.
    pub bg_color: Option<String>,
}

impl SpecColumnStyle {
    /// Materialize a style only when at least one option is non-default.
    pub fn from_options(
        output_column_name: &str,
        options: &SpecColumnOptions,
    ) -> Option<SpecColumnStyle> {
        let num_format = options
            .num_format
            .as_deref()
            .filter(|val| !is_blank(val))
            .map(ToString::to_string);
        let bg_color = options
            .bg_color
            .as_deref()
            .filter(|val| !is_blank(val))
            .map(|val| val.trim().to_string());

        if num_format.is_none() && bg_color.is_none() && !options.if_centered {
            return None;
        }

        Some(SpecColumnStyle {
            output_column_name: output_column_name.to_string(),
            num_format,
            if_centered: options.if_centered,
            bg_color,
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Spreadsheet engine failures (workbook model, serialization, loading).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Sheet name empty, too long, or containing illegal characters.
    #[error("Invalid sheet name {name:?}: {reason}")]
    InvalidSheetName {
        /// Rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Sheet name already used in the workbook (case-insensitive).
    #[error("Duplicate sheet name: {0:?}")]
    DuplicateSheetName(String),
    /// Row/column outside the 1-based Excel grid.
    #[error("Invalid cell address: row={row}, col={col} (1-based)")]
    InvalidCellAddress {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },
    /// Color is neither an HTML color name nor a hex RGB/ARGB value.
    #[error("Invalid color {0:?}: expected an HTML color name or hex RGB such as \"#FFFFCC\"")]
    InvalidColor(String),
    /// Merge range with inverted or out-of-grid corners.
    #[error("Invalid merge range: {0}")]
    InvalidMergeRange(SpecCellRange),
    /// Merge range overlapping an existing merge.
    #[error("Merge range {new} overlaps existing merge {existing}")]
    OverlappingMerge {
        /// Requested range.
        new: SpecCellRange,
        /// Already merged range.
        existing: SpecCellRange,
    },
    /// Failure reported by the xlsx writer.
    #[error("xlsx write error: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    /// Failure reported by the xlsx reader.
    #[error("xlsx read error: {0}")]
    Read(#[from] calamine::XlsxError),
    /// Failure opening the xlsx package.
    #[error("xlsx package error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Malformed XML inside the xlsx package.
    #[error("xlsx part error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Failure reading a package part.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Failure reading table values.
    #[error("table conversion error: {0}")]
    Table(#[from] PolarsError),
}

/// Report builder failures.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Blank worksheet title.
    #[error("You must provide a worksheet name.")]
    InvalidTitle,
    /// Source table without columns.
    #[error("You must provide a table with at least one column.")]
    EmptyTable,
    /// Source column not present (possibly already renamed).
    #[error("You must provide a matching source column name as the first parameter: {0:?} not found.")]
    NameMismatch(String),
    /// Blank output column name.
    #[error("You must provide a valid output column name as the second parameter.")]
    InvalidOutputName,
    /// Output column name already configured on this worksheet.
    #[error("You must provide a distinct output column name as the second parameter: {0:?} is already configured.")]
    DuplicateOutputName(String),
    /// Finalize without any configured column.
    #[error("You must configure at least one column.")]
    EmptyConfiguration,
    /// Banner already applied to this workbook.
    #[error("The workbook has already been marked with a banner.")]
    AlreadyMarked,
    /// Banner requested on a workbook without sheets.
    #[error("The workbook requires at least 1 worksheet.")]
    NoSheets,
    /// Spreadsheet engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Table operation failure (rename/projection/IPC decode).
    #[error("table error: {0}")]
    Table(#[from] PolarsError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_style_is_not_materialized_for_defaults() {
        assert_eq!(
            SpecColumnStyle::from_options("Count", &SpecColumnOptions::default()),
            None
        );

        let options_blank = SpecColumnOptions {
            num_format: Some("  ".to_string()),
            if_centered: false,
            bg_color: Some(String::new()),
        };
        assert_eq!(SpecColumnStyle::from_options("Count", &options_blank), None);
    }

    #[test]
    fn test_column_style_keeps_only_requested_attributes() {
        let style = SpecColumnStyle::from_options(
            "Dev",
            &SpecColumnOptions {
                num_format: None,
                if_centered: true,
                bg_color: Some(" #FFFFCC ".to_string()),
            },
        )
        .expect("style");

        assert_eq!(style.output_column_name, "Dev");
        assert_eq!(style.num_format, None);
        assert!(style.if_centered);
        assert_eq!(style.bg_color.as_deref(), Some("#FFFFCC"));
    }

    #[test]
    fn test_cell_format_merge_overlays_right_side() {
        let base = SpecCellFormat {
            font_size: Some(10.0),
            align: Some("left".to_string()),
            ..Default::default()
        };
        let merged = base.merge(&SpecCellFormat {
            align: Some("center".to_string()),
            bold: Some(true),
            ..Default::default()
        });

        assert_eq!(merged.font_size, Some(10.0));
        assert_eq!(merged.align.as_deref(), Some("center"));
        assert_eq!(merged.bold, Some(true));
        assert!(SpecCellFormat::default().is_empty());
        assert!(!merged.is_empty());
    }

    #[test]
    fn test_cell_range_geometry_and_display() {
        let range = SpecCellRange::new(1, 1, 1, 4);
        assert_eq!(range.to_string(), "A1:D1");
        assert!(range.contains(1, 3));
        assert!(!range.contains(2, 3));
        assert!(range.intersects(&SpecCellRange::new(1, 4, 3, 5)));
        assert!(!range.intersects(&SpecCellRange::new(2, 1, 2, 4)));
        assert!(SpecCellRange::new(3, 2, 3, 2).is_single_cell());
    }
}
