//! One-shot workbook banner.
//!
//! The banner is a bold title row inserted above the header of every sheet and
//! merged across the used columns. A workbook custom property records that it
//! was applied, so a workbook (including one re-loaded from bytes) is marked at
//! most once.

use crate::conf::{C_BANNER_PROPERTY_KEY, N_HEIGHT_BANNER_ROW, derive_banner_format};
use crate::spec::{EngineError, EnumCellValue, ReportError, SpecCellRange};
use crate::workbook::{Workbook, Worksheet};

/// Insert `text` as a banner row on top of every sheet of `workbook`.
///
/// Fails with [`ReportError::AlreadyMarked`] when the marker property exists and
/// with [`ReportError::NoSheets`] on an empty workbook. On failure the workbook
/// is left unchanged.
pub fn mark_banner(workbook: &mut Workbook, text: &str) -> Result<(), ReportError> {
    if workbook.has_custom_property(C_BANNER_PROPERTY_KEY) {
        return Err(ReportError::AlreadyMarked);
    }
    if workbook.is_empty() {
        return Err(ReportError::NoSheets);
    }

    let mut l_worksheets = workbook.worksheets().to_vec();
    for worksheet in &mut l_worksheets {
        insert_banner_row(worksheet, text)?;
    }

    for (worksheet_dst, worksheet_src) in workbook.worksheets_mut().iter_mut().zip(l_worksheets) {
        *worksheet_dst = worksheet_src;
    }
    workbook.set_custom_property(C_BANNER_PROPERTY_KEY, chrono::Local::now().to_rfc3339());

    log::info!(
        "Banner {text:?} applied to {} sheet(s)",
        workbook.len()
    );
    Ok(())
}

fn insert_banner_row(worksheet: &mut Worksheet, text: &str) -> Result<(), EngineError> {
    let n_col_last = worksheet.last_used_column().max(1);

    worksheet.insert_rows_above(1, 1)?;
    worksheet.set_value(1, 1, EnumCellValue::from(text))?;
    let fmt_banner = worksheet.cell_format_mut(1, 1)?;
    *fmt_banner = fmt_banner.merge(&derive_banner_format());
    worksheet.set_row_height(1, N_HEIGHT_BANNER_ROW)?;
    worksheet.merge_range(SpecCellRange::new(1, 1, 1, n_col_last))?;

    log::debug!(
        "Worksheet {:?}: banner merged over {}",
        worksheet.name(),
        SpecCellRange::new(1, 1, 1, n_col_last)
    );
    Ok(())
}
