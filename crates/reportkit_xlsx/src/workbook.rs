//! In-memory workbook model.
//!
//! Cells, columns and rows are addressed with 1-based coordinates, as in the
//! spreadsheet UI. The model is rendered by [`crate::writer`] and re-loaded by
//! [`crate::reader`].

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::DataFrame;

use crate::spec::{EngineError, EnumCellValue, SpecCell, SpecCellFormat, SpecCellRange};
use crate::util::{
    derive_cell_value_from_any_value, normalize_color, validate_cell_address,
    validate_sheet_name,
};

////////////////////////////////////////////////////////////////////////////////
// #region Worksheet

/// One sheet of the workbook model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Worksheet {
    name: String,
    fmt_base: SpecCellFormat,
    dict_cells: BTreeMap<(usize, usize), SpecCell>,
    dict_col_formats: BTreeMap<usize, SpecCellFormat>,
    dict_row_heights: BTreeMap<usize, f64>,
    l_merges: Vec<SpecCellRange>,
    n_rows_frozen: usize,
}

impl Worksheet {
    /// Create an empty sheet.
    pub fn new(name: &str) -> Result<Self, EngineError> {
        validate_sheet_name(name)?;
        Ok(Self {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a sheet from a table: row 1 holds the column names, rows 2..
    /// hold the values in table row order.
    pub fn from_dataframe(df: &DataFrame, name: &str) -> Result<Self, EngineError> {
        let mut worksheet = Self::new(name)?;

        for (n_idx_col, c_col_name) in df.get_column_names_str().into_iter().enumerate() {
            worksheet.set_value(1, n_idx_col + 1, EnumCellValue::from(c_col_name))?;
        }

        for (n_idx_col, col) in df.get_columns().iter().enumerate() {
            for n_idx_row in 0..df.height() {
                let value = derive_cell_value_from_any_value(col.get(n_idx_row)?);
                if value.is_none() {
                    continue;
                }
                worksheet.set_value(n_idx_row + 2, n_idx_col + 1, value)?;
            }
        }

        Ok(worksheet)
    }

    /// Sheet title.
    pub fn name(&self) -> &str {
        &self.name
    }

    ////////////////////////////////////////////////////////////////////////////
    // Cells

    /// Cell at `(row, col)` if it holds a value or a format.
    pub fn cell(&self, row: usize, col: usize) -> Option<&SpecCell> {
        self.dict_cells.get(&(row, col))
    }

    /// Value at `(row, col)`; blank when the cell does not exist.
    pub fn value(&self, row: usize, col: usize) -> EnumCellValue {
        self.cell(row, col)
            .map(|cell| cell.value.clone())
            .unwrap_or_default()
    }

    /// Set the value at `(row, col)`, keeping the cell's format.
    pub fn set_value(
        &mut self,
        row: usize,
        col: usize,
        value: EnumCellValue,
    ) -> Result<(), EngineError> {
        self.cell_mut(row, col)?.value = value;
        Ok(())
    }

    /// Mutable cell-level format overlay at `(row, col)`.
    pub fn cell_format_mut(
        &mut self,
        row: usize,
        col: usize,
    ) -> Result<&mut SpecCellFormat, EngineError> {
        Ok(&mut self.cell_mut(row, col)?.format)
    }

    /// Clear all formatting on one cell.
    ///
    /// The cell keeps its value and the sheet base format; the column layer and
    /// any cell-level overlay no longer apply.
    pub fn clear_cell_formats(&mut self, row: usize, col: usize) -> Result<(), EngineError> {
        let cell = self.cell_mut(row, col)?;
        cell.format = SpecCellFormat::default();
        cell.if_format_cleared = true;
        Ok(())
    }

    /// Resolved format of one cell: sheet base -> column -> cell overlay.
    pub fn effective_format(&self, row: usize, col: usize) -> SpecCellFormat {
        match self.cell(row, col) {
            Some(cell) if cell.if_format_cleared => self.fmt_base.merge(&cell.format),
            Some(cell) => self.column_effective_format(col).merge(&cell.format),
            None => self.column_effective_format(col),
        }
    }

    /// Iterate populated cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = ((usize, usize), &SpecCell)> {
        self.dict_cells.iter().map(|(addr, cell)| (*addr, cell))
    }

    /// Values of one row, from column 1 through [`Self::last_used_column`].
    pub fn row_values(&self, row: usize) -> Vec<EnumCellValue> {
        (1..=self.last_used_column())
            .map(|col| self.value(row, col))
            .collect()
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> Result<&mut SpecCell, EngineError> {
        validate_cell_address(row, col)?;
        Ok(self.dict_cells.entry((row, col)).or_default())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Sheet and column formats

    /// Sheet-wide base format.
    pub fn base_format(&self) -> &SpecCellFormat {
        &self.fmt_base
    }

    /// Overlay `patch` onto the sheet-wide base format.
    pub fn apply_base_format(&mut self, patch: &SpecCellFormat) {
        self.fmt_base = self.fmt_base.merge(patch);
    }

    /// Column-level format overlay, if any.
    pub fn column_format(&self, col: usize) -> Option<&SpecCellFormat> {
        self.dict_col_formats.get(&col)
    }

    /// Columns carrying a column-level format.
    pub fn formatted_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.dict_col_formats.keys().copied()
    }

    /// Sheet base merged with the column overlay.
    pub fn column_effective_format(&self, col: usize) -> SpecCellFormat {
        match self.column_format(col) {
            Some(fmt_col) => self.fmt_base.merge(fmt_col),
            None => self.fmt_base.clone(),
        }
    }

    /// Set the number format of a whole column.
    pub fn set_column_num_format(&mut self, col: usize, num_format: &str) -> Result<(), EngineError> {
        self.column_format_mut(col)?.num_format = Some(num_format.to_string());
        Ok(())
    }

    /// Set the horizontal alignment of a whole column.
    pub fn set_column_align(&mut self, col: usize, align: &str) -> Result<(), EngineError> {
        self.column_format_mut(col)?.align = Some(align.to_string());
        Ok(())
    }

    /// Set the background fill of a whole column.
    pub fn set_column_bg_color(&mut self, col: usize, color: &str) -> Result<(), EngineError> {
        let c_color = normalize_color(color)?;
        self.column_format_mut(col)?.bg_color = Some(c_color);
        Ok(())
    }

    fn column_format_mut(&mut self, col: usize) -> Result<&mut SpecCellFormat, EngineError> {
        validate_cell_address(1, col)?;
        Ok(self.dict_col_formats.entry(col).or_default())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Rows, merges, panes

    /// Insert `n_rows` blank rows above `row`, shifting that row and every row
    /// below it down. Cells, row heights, and merges move with their rows.
    pub fn insert_rows_above(&mut self, row: usize, n_rows: usize) -> Result<(), EngineError> {
        validate_cell_address(row, 1)?;
        if n_rows == 0 {
            return Ok(());
        }
        let n_row_last = self.last_used_row();
        if n_row_last >= row {
            validate_cell_address(n_row_last + n_rows, 1)?;
        }

        let shift = |n_row: usize| if n_row >= row { n_row + n_rows } else { n_row };

        self.dict_cells = std::mem::take(&mut self.dict_cells)
            .into_iter()
            .map(|((n_row, n_col), cell)| ((shift(n_row), n_col), cell))
            .collect();
        self.dict_row_heights = std::mem::take(&mut self.dict_row_heights)
            .into_iter()
            .map(|(n_row, n_height)| (shift(n_row), n_height))
            .collect();
        for merge in &mut self.l_merges {
            if merge.row_start >= row {
                merge.row_start += n_rows;
                merge.row_end += n_rows;
            } else if merge.row_end >= row {
                merge.row_end += n_rows;
            }
        }
        Ok(())
    }

    /// Merge a rectangular range into one cell.
    ///
    /// A single-cell range is a no-op. Overlapping an existing merge fails.
    pub fn merge_range(&mut self, range: SpecCellRange) -> Result<(), EngineError> {
        validate_cell_address(range.row_start, range.col_start)
            .and_then(|_| validate_cell_address(range.row_end, range.col_end))
            .map_err(|_| EngineError::InvalidMergeRange(range))?;
        if range.row_start > range.row_end || range.col_start > range.col_end {
            return Err(EngineError::InvalidMergeRange(range));
        }
        if range.is_single_cell() {
            return Ok(());
        }
        if let Some(existing) = self.l_merges.iter().find(|merge| merge.intersects(&range)) {
            return Err(EngineError::OverlappingMerge {
                new: range,
                existing: *existing,
            });
        }
        self.l_merges.push(range);
        Ok(())
    }

    /// Merged ranges, in merge order.
    pub fn merged_ranges(&self) -> &[SpecCellRange] {
        &self.l_merges
    }

    /// Merged range whose anchor or body contains `(row, col)`.
    pub fn merged_range_at(&self, row: usize, col: usize) -> Option<&SpecCellRange> {
        self.l_merges.iter().find(|merge| merge.contains(row, col))
    }

    /// Set the height of one row, in points.
    pub fn set_row_height(&mut self, row: usize, height: f64) -> Result<(), EngineError> {
        validate_cell_address(row, 1)?;
        self.dict_row_heights.insert(row, height);
        Ok(())
    }

    /// Explicit height of one row, if set.
    pub fn row_height(&self, row: usize) -> Option<f64> {
        self.dict_row_heights.get(&row).copied()
    }

    /// Rows with an explicit height.
    pub fn row_heights(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.dict_row_heights.iter().map(|(row, height)| (*row, *height))
    }

    /// Keep the first `n_rows` rows visible on scroll.
    pub fn freeze_rows(&mut self, n_rows: usize) {
        self.n_rows_frozen = n_rows;
    }

    /// Number of frozen rows.
    pub fn rows_frozen(&self) -> usize {
        self.n_rows_frozen
    }

    /// Last row holding a value (0 for an empty sheet).
    pub fn last_used_row(&self) -> usize {
        self.dict_cells
            .iter()
            .filter(|(_, cell)| !cell.value.is_none())
            .map(|((n_row, _), _)| *n_row)
            .max()
            .unwrap_or(0)
    }

    /// Last column holding a value (0 for an empty sheet).
    pub fn last_used_column(&self) -> usize {
        self.dict_cells
            .iter()
            .filter(|(_, cell)| !cell.value.is_none())
            .map(|((_, n_col), _)| *n_col)
            .max()
            .unwrap_or(0)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workbook

/// Ordered collection of sheets plus workbook-scope custom properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    l_worksheets: Vec<Worksheet>,
    dict_custom_properties: BTreeMap<String, String>,
}

impl Workbook {
    /// Create an empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a workbook from xlsx bytes (values, merges, custom properties).
    pub fn from_bytes(v_xlsx: &[u8]) -> Result<Self, EngineError> {
        crate::reader::read_workbook_from_bytes(v_xlsx)
    }

    /// Serialize to xlsx bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        crate::writer::write_workbook_to_buffer(self)
    }

    /// Serialize to an xlsx file.
    pub fn save(&self, path_file_out: impl AsRef<Path>) -> Result<(), EngineError> {
        crate::writer::write_workbook_to_path(self, path_file_out.as_ref())
    }

    /// Append a sheet; names must be unique (case-insensitive, as in Excel).
    pub fn add_worksheet(&mut self, worksheet: Worksheet) -> Result<&mut Worksheet, EngineError> {
        let c_name_lower = worksheet.name().to_lowercase();
        if self
            .l_worksheets
            .iter()
            .any(|existing| existing.name().to_lowercase() == c_name_lower)
        {
            return Err(EngineError::DuplicateSheetName(worksheet.name().to_string()));
        }
        self.l_worksheets.push(worksheet);
        let n_idx_last = self.l_worksheets.len() - 1;
        Ok(&mut self.l_worksheets[n_idx_last])
    }

    /// Sheets in insertion order.
    pub fn worksheets(&self) -> &[Worksheet] {
        &self.l_worksheets
    }

    /// Mutable sheets in insertion order.
    pub fn worksheets_mut(&mut self) -> &mut [Worksheet] {
        &mut self.l_worksheets
    }

    /// Sheet by exact name.
    pub fn worksheet(&self, name: &str) -> Option<&Worksheet> {
        self.l_worksheets.iter().find(|sheet| sheet.name() == name)
    }

    /// Number of sheets.
    pub fn len(&self) -> usize {
        self.l_worksheets.len()
    }

    /// Whether the workbook has no sheets.
    pub fn is_empty(&self) -> bool {
        self.l_worksheets.is_empty()
    }

    /// Set a workbook-scope custom property.
    pub fn set_custom_property(&mut self, name: &str, value: impl Into<String>) {
        self.dict_custom_properties
            .insert(name.to_string(), value.into());
    }

    /// Value of a custom property.
    pub fn custom_property(&self, name: &str) -> Option<&str> {
        self.dict_custom_properties.get(name).map(String::as_str)
    }

    /// Whether a custom property exists, regardless of its value.
    pub fn has_custom_property(&self, name: &str) -> bool {
        self.dict_custom_properties.contains_key(name)
    }

    /// All custom properties, sorted by name.
    pub fn custom_properties(&self) -> &BTreeMap<String, String> {
        &self.dict_custom_properties
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;

    fn create_sheet_abc() -> Worksheet {
        let mut sheet = Worksheet::new("test").expect("sheet");
        for (n_col, c_val) in ["A", "B", "C"].iter().enumerate() {
            sheet
                .set_value(1, n_col + 1, EnumCellValue::from(*c_val))
                .expect("header");
            sheet
                .set_value(2, n_col + 1, EnumCellValue::Number(n_col as f64))
                .expect("body");
        }
        sheet
    }

    #[test]
    fn test_from_dataframe_writes_header_then_rows() {
        let df = df!(
            "Count" => [25i32, 50],
            "Food" => ["Cookie", "Rice"],
        )
        .expect("df");

        let sheet = Worksheet::from_dataframe(&df, "test").expect("sheet");
        assert_eq!(
            sheet.row_values(1),
            vec![EnumCellValue::from("Count"), EnumCellValue::from("Food")]
        );
        assert_eq!(
            sheet.row_values(3),
            vec![EnumCellValue::Number(50.0), EnumCellValue::from("Rice")]
        );
        assert_eq!(sheet.last_used_row(), 3);
        assert_eq!(sheet.last_used_column(), 2);
    }

    #[test]
    fn test_from_dataframe_rejects_invalid_sheet_name() {
        let df = df!("Count" => [1i32]).expect("df");
        assert!(matches!(
            Worksheet::from_dataframe(&df, "bad:name"),
            Err(EngineError::InvalidSheetName { .. })
        ));
    }

    #[test]
    fn test_effective_format_layers_and_clear() {
        let mut sheet = create_sheet_abc();
        sheet.apply_base_format(&SpecCellFormat {
            font_size: Some(10.0),
            ..Default::default()
        });
        sheet.set_column_bg_color(2, "ffffcc").expect("fill");
        sheet.set_column_num_format(2, "#,##0").expect("num fmt");

        let fmt_body = sheet.effective_format(2, 2);
        assert_eq!(fmt_body.bg_color.as_deref(), Some("#FFFFCC"));
        assert_eq!(fmt_body.num_format.as_deref(), Some("#,##0"));
        assert_eq!(fmt_body.font_size, Some(10.0));

        sheet.clear_cell_formats(1, 2).expect("clear");
        assert_eq!(sheet.effective_format(1, 2), *sheet.base_format());
        assert_eq!(sheet.effective_format(1, 2), sheet.effective_format(1, 1));
        assert_eq!(sheet.value(1, 2), EnumCellValue::from("B"));
    }

    #[test]
    fn test_invalid_color_leaves_column_unformatted() {
        let mut sheet = create_sheet_abc();
        assert!(matches!(
            sheet.set_column_bg_color(1, "not-a-color"),
            Err(EngineError::InvalidColor(_))
        ));
        assert!(sheet.column_format(1).is_none());
    }

    #[test]
    fn test_insert_rows_above_shifts_cells_heights_and_merges() {
        let mut sheet = create_sheet_abc();
        sheet.set_row_height(2, 30.0).expect("height");
        sheet
            .merge_range(SpecCellRange::new(2, 1, 2, 2))
            .expect("merge");

        sheet.insert_rows_above(1, 1).expect("insert");

        assert_eq!(sheet.value(1, 1), EnumCellValue::None);
        assert_eq!(sheet.value(2, 1), EnumCellValue::from("A"));
        assert_eq!(sheet.value(3, 3), EnumCellValue::Number(2.0));
        assert_eq!(sheet.row_height(3), Some(30.0));
        assert_eq!(sheet.row_height(2), None);
        assert_eq!(sheet.merged_ranges(), &[SpecCellRange::new(3, 1, 3, 2)]);
        assert_eq!(sheet.last_used_row(), 3);
    }

    #[test]
    fn test_merge_range_validation() {
        let mut sheet = create_sheet_abc();
        sheet
            .merge_range(SpecCellRange::new(1, 1, 1, 3))
            .expect("merge");
        assert!(matches!(
            sheet.merge_range(SpecCellRange::new(1, 3, 2, 3)),
            Err(EngineError::OverlappingMerge { .. })
        ));
        assert!(matches!(
            sheet.merge_range(SpecCellRange::new(3, 2, 3, 1)),
            Err(EngineError::InvalidMergeRange(_))
        ));
        assert!(matches!(
            sheet.merge_range(SpecCellRange::new(0, 1, 1, 1)),
            Err(EngineError::InvalidMergeRange(_))
        ));

        sheet
            .merge_range(SpecCellRange::new(5, 5, 5, 5))
            .expect("single cell");
        assert_eq!(sheet.merged_ranges().len(), 1);
        assert_eq!(sheet.merged_range_at(1, 2), Some(&SpecCellRange::new(1, 1, 1, 3)));
    }

    #[test]
    fn test_workbook_rejects_duplicate_sheet_names() {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet(Worksheet::new("Report").expect("sheet"))
            .expect("add");
        assert!(matches!(
            workbook.add_worksheet(Worksheet::new("REPORT").expect("sheet")),
            Err(EngineError::DuplicateSheetName(_))
        ));
        assert_eq!(workbook.len(), 1);
    }

    #[test]
    fn test_custom_properties() {
        let mut workbook = Workbook::new();
        assert!(!workbook.has_custom_property("k"));
        workbook.set_custom_property("k", "v");
        assert!(workbook.has_custom_property("k"));
        assert_eq!(workbook.custom_property("k"), Some("v"));
    }
}
