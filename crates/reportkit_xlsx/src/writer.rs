//! XLSX writer kernel that renders the workbook model through `rust_xlsxwriter`.

use std::collections::BTreeSet;
use std::path::Path;

use rust_xlsxwriter::{
    Color, DocProperties, Format, FormatAlign, Workbook as XlsxWorkbook, Worksheet as XlsxWorksheet,
};

use crate::spec::{EngineError, EnumCellValue, SpecCellFormat};
use crate::util::parse_color;
use crate::workbook::{Workbook, Worksheet};

/// Serialize the workbook model to xlsx bytes.
pub fn write_workbook_to_buffer(workbook: &Workbook) -> Result<Vec<u8>, EngineError> {
    let mut xlsx = derive_xlsx_workbook(workbook)?;
    Ok(xlsx.save_to_buffer()?)
}

/// Serialize the workbook model to an xlsx file.
pub fn write_workbook_to_path(workbook: &Workbook, path_file_out: &Path) -> Result<(), EngineError> {
    let mut xlsx = derive_xlsx_workbook(workbook)?;
    xlsx.save(path_file_out)?;
    log::debug!("Workbook saved to {}", path_file_out.display());
    Ok(())
}

fn derive_xlsx_workbook(workbook: &Workbook) -> Result<XlsxWorkbook, EngineError> {
    let mut xlsx = XlsxWorkbook::new();

    if !workbook.custom_properties().is_empty() {
        let mut properties = DocProperties::new();
        for (c_name, c_value) in workbook.custom_properties() {
            properties = properties.set_custom_property(c_name.as_str(), c_value.as_str());
        }
        xlsx.set_properties(&properties);
    }

    for worksheet in workbook.worksheets() {
        let xlsx_worksheet = xlsx.add_worksheet();
        write_worksheet(xlsx_worksheet, worksheet)?;
    }

    Ok(xlsx)
}

fn write_worksheet(xlsx_worksheet: &mut XlsxWorksheet, worksheet: &Worksheet) -> Result<(), EngineError> {
    xlsx_worksheet.set_name(worksheet.name())?;

    for n_col in derive_formatted_columns(worksheet) {
        let format = derive_rust_xlsx_format(&worksheet.column_effective_format(n_col))?;
        xlsx_worksheet.set_column_format(cast_col_num(n_col)?, &format)?;
    }

    for (n_row, n_height) in worksheet.row_heights() {
        xlsx_worksheet.set_row_height(cast_row_num(n_row)?, n_height)?;
    }

    for ((n_row, n_col), cell) in worksheet.cells() {
        if worksheet.merged_range_at(n_row, n_col).is_some() {
            continue;
        }
        let format = derive_rust_xlsx_format(&worksheet.effective_format(n_row, n_col))?;
        write_cell_with_format(xlsx_worksheet, n_row, n_col, &cell.value, &format)?;
    }

    for merge in worksheet.merged_ranges() {
        let format =
            derive_rust_xlsx_format(&worksheet.effective_format(merge.row_start, merge.col_start))?;
        xlsx_worksheet.merge_range(
            cast_row_num(merge.row_start)?,
            cast_col_num(merge.col_start)?,
            cast_row_num(merge.row_end)?,
            cast_col_num(merge.col_end)?,
            &worksheet.value(merge.row_start, merge.col_start).to_text(),
            &format,
        )?;
    }

    if worksheet.rows_frozen() > 0 {
        let n_rows_frozen = u32::try_from(worksheet.rows_frozen()).map_err(|_| {
            EngineError::InvalidCellAddress {
                row: worksheet.rows_frozen(),
                col: 1,
            }
        })?;
        xlsx_worksheet.set_freeze_panes(n_rows_frozen, 0)?;
    }

    Ok(())
}

/// Columns needing a column format: every used column once the sheet has a
/// base format, plus any column with its own overlay.
fn derive_formatted_columns(worksheet: &Worksheet) -> BTreeSet<usize> {
    let mut set_cols: BTreeSet<usize> = worksheet.formatted_columns().collect();
    if !worksheet.base_format().is_empty() {
        set_cols.extend(1..=worksheet.last_used_column());
    }
    set_cols
}

fn write_cell_with_format(
    xlsx_worksheet: &mut XlsxWorksheet,
    row: usize,
    col: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), EngineError> {
    let n_row = cast_row_num(row)?;
    let n_col = cast_col_num(col)?;
    match value {
        EnumCellValue::None => {
            xlsx_worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            xlsx_worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            xlsx_worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::Boolean(val) => {
            xlsx_worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

/// Convert a resolved cell format into a `rust_xlsxwriter` format.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Result<Format, EngineError> {
    let mut format = Format::new();

    if let Some(val) = spec.font_size {
        format = format.set_font_size(val);
    }
    if let Some(val) = spec.font_family {
        format = format.set_font_family(val);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(Color::RGB(parse_color(val)?));
    }

    Ok(format)
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "vcenter" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

/// 1-based model row -> 0-based writer row.
fn cast_row_num(row: usize) -> Result<u32, EngineError> {
    row.checked_sub(1)
        .and_then(|val| u32::try_from(val).ok())
        .ok_or(EngineError::InvalidCellAddress { row, col: 1 })
}

/// 1-based model column -> 0-based writer column.
fn cast_col_num(col: usize) -> Result<u16, EngineError> {
    col.checked_sub(1)
        .and_then(|val| u16::try_from(val).ok())
        .ok_or(EngineError::InvalidCellAddress { row: 1, col })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_indices_are_zero_based() {
        assert_eq!(cast_row_num(1).expect("row"), 0);
        assert_eq!(cast_col_num(3).expect("col"), 2);
        assert!(cast_row_num(0).is_err());
        assert!(cast_col_num(0).is_err());
    }

    #[test]
    fn test_derive_format_align() {
        assert!(matches!(
            derive_format_align(" Center "),
            Some(FormatAlign::Center)
        ));
        assert!(matches!(
            derive_format_align("vcenter"),
            Some(FormatAlign::VerticalCenter)
        ));
        assert!(derive_format_align("diagonal").is_none());
    }

    #[test]
    fn test_base_format_reaches_every_used_column() {
        let mut worksheet = Worksheet::new("data").expect("sheet");
        for n_col in 1..=3 {
            worksheet
                .set_value(1, n_col, EnumCellValue::Number(n_col as f64))
                .expect("value");
        }
        assert!(derive_formatted_columns(&worksheet).is_empty());

        worksheet.set_column_num_format(5, "#,##0").expect("num fmt");
        worksheet.apply_base_format(&SpecCellFormat {
            font_size: Some(10.0),
            ..Default::default()
        });
        assert_eq!(
            derive_formatted_columns(&worksheet).into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3, 5]
        );
        assert_eq!(worksheet.column_effective_format(2).font_size, Some(10.0));
    }

    #[test]
    fn test_derive_rust_xlsx_format_rejects_bad_fill() {
        let spec = SpecCellFormat {
            bg_color: Some("#GGGGGG".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            derive_rust_xlsx_format(&spec),
            Err(EngineError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_write_empty_sheet_produces_package() {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet(Worksheet::new("empty").expect("sheet"))
            .expect("add");
        let v_xlsx = write_workbook_to_buffer(&workbook).expect("bytes");
        assert!(v_xlsx.starts_with(b"PK"));
    }
}
