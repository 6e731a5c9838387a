//! Fluent report builders.
//!
//! ```no_run
//! use polars::prelude::*;
//! use reportkit_xlsx::{FMT_QUANTITY, ReportBuilder, SpecColumnOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let df_sales = df!("qty" => [25i32, 50], "item" => ["Cookie", "Rice"])?;
//! let mut report = ReportBuilder::new();
//! let v_xlsx = report
//!     .add_worksheet(&df_sales, "Sales")?
//!     .configure_column("item", "Food", SpecColumnOptions::default())?
//!     .configure_column("qty", "Count", SpecColumnOptions::with_num_format(FMT_QUANTITY))?
//!     .finalize_worksheet(None)?
//!     .generate_bytes(Some("Q1 Report"))?;
//! # let _ = v_xlsx;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use polars::prelude::{DataFrame, IpcReader, SerReader};

use crate::banner::mark_banner;
use crate::conf::{N_FONT_SIZE_DEFAULT, N_ROWS_BANNER_AND_HEADER, derive_default_sheet_format};
use crate::spec::{ReportError, SpecColumnOptions, SpecColumnStyle};
use crate::util::is_blank;
use crate::workbook::{Workbook, Worksheet};

////////////////////////////////////////////////////////////////////////////////
// #region ReportBuilder

/// Owns the destination workbook and hands out one [`WorksheetBuilder`] per
/// source table.
///
/// The workbook is released when the builder is dropped, unless it was handed
/// out through [`ReportBuilder::into_workbook`].
#[derive(Debug, Default)]
pub struct ReportBuilder {
    workbook: Workbook,
}

impl ReportBuilder {
    /// Create a builder around an empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start configuring a worksheet from `df`.
    ///
    /// `df` itself is never modified: the builder works on its own copy.
    pub fn add_worksheet(
        &mut self,
        df: &DataFrame,
        title: &str,
    ) -> Result<WorksheetBuilder<'_>, ReportError> {
        if is_blank(title) {
            return Err(ReportError::InvalidTitle);
        }
        if df.width() < 1 {
            return Err(ReportError::EmptyTable);
        }

        log::debug!(
            "Worksheet {title:?} started from a {}x{} table",
            df.height(),
            df.width()
        );
        Ok(WorksheetBuilder::new(df.clone(), title, self))
    }

    /// Start configuring a worksheet from a polars IPC payload.
    pub fn add_worksheet_from_ipc_bytes(
        &mut self,
        v_ipc_df: &[u8],
        title: &str,
    ) -> Result<WorksheetBuilder<'_>, ReportError> {
        let df = IpcReader::new(Cursor::new(v_ipc_df)).finish()?;
        self.add_worksheet(&df, title)
    }

    /// Live workbook, optionally marked with `banner` first.
    ///
    /// `None` or a blank banner leaves the workbook unmarked.
    pub fn generate(&mut self, banner: Option<&str>) -> Result<&Workbook, ReportError> {
        self.add_banner(banner)?;
        Ok(&self.workbook)
    }

    /// Serialized workbook, optionally marked with `banner` first.
    pub fn generate_bytes(&mut self, banner: Option<&str>) -> Result<Vec<u8>, ReportError> {
        self.add_banner(banner)?;
        let v_xlsx = self.workbook.to_bytes()?;
        log::info!(
            "Report serialized: {} sheet(s), {} bytes",
            self.workbook.len(),
            v_xlsx.len()
        );
        Ok(v_xlsx)
    }

    /// Write the workbook to `path_file_out`, optionally marked with `banner` first.
    pub fn save(
        &mut self,
        path_file_out: impl AsRef<Path>,
        banner: Option<&str>,
    ) -> Result<(), ReportError> {
        self.add_banner(banner)?;
        self.workbook.save(path_file_out)?;
        Ok(())
    }

    /// Borrow the workbook without marking it.
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// Hand the workbook over to the caller.
    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }

    fn add_banner(&mut self, banner: Option<&str>) -> Result<(), ReportError> {
        match banner {
            Some(text) if !is_blank(text) => mark_banner(&mut self.workbook, text),
            _ => Ok(()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorksheetBuilder

/// Column projection/rename/style choices for one source table.
///
/// Consumed by [`WorksheetBuilder::finalize_worksheet`], which hands control
/// back to the owning [`ReportBuilder`].
#[derive(Debug)]
pub struct WorksheetBuilder<'a> {
    df_source: DataFrame,
    title: String,
    l_output_names: Vec<String>,
    dict_styles: BTreeMap<String, SpecColumnStyle>,
    parent: &'a mut ReportBuilder,
}

impl<'a> WorksheetBuilder<'a> {
    fn new(df_source: DataFrame, title: &str, parent: &'a mut ReportBuilder) -> Self {
        Self {
            df_source,
            title: title.to_string(),
            l_output_names: Vec::new(),
            dict_styles: BTreeMap::new(),
            parent,
        }
    }

    /// Map `source_column_name` to `output_column_name` and append it to the
    /// output column order.
    ///
    /// The rename is applied to the builder's working table, so the source name
    /// stops resolving: each source column can be configured once. Failed calls
    /// leave the working table unchanged.
    pub fn configure_column(
        mut self,
        source_column_name: &str,
        output_column_name: &str,
        options: SpecColumnOptions,
    ) -> Result<Self, ReportError> {
        self.push_column(source_column_name, output_column_name, &options)?;
        Ok(self)
    }

    fn push_column(
        &mut self,
        source_column_name: &str,
        output_column_name: &str,
        options: &SpecColumnOptions,
    ) -> Result<(), ReportError> {
        if self.df_source.get_column_index(source_column_name).is_none() {
            return Err(ReportError::NameMismatch(source_column_name.to_string()));
        }
        if is_blank(output_column_name) {
            return Err(ReportError::InvalidOutputName);
        }
        if self.l_output_names.iter().any(|c_name| c_name == output_column_name) {
            return Err(ReportError::DuplicateOutputName(
                output_column_name.to_string(),
            ));
        }

        if source_column_name != output_column_name {
            self.df_source
                .rename(source_column_name, output_column_name.into())?;
        }

        if let Some(style) = SpecColumnStyle::from_options(output_column_name, options) {
            self.dict_styles
                .insert(output_column_name.to_string(), style);
        }
        self.l_output_names.push(output_column_name.to_string());

        log::debug!(
            "Worksheet {:?}: column {source_column_name:?} -> {output_column_name:?}",
            self.title
        );
        Ok(())
    }

    /// Output column names in configuration order.
    pub fn output_column_names(&self) -> &[String] {
        &self.l_output_names
    }

    /// Column names of the working table.
    pub fn column_names(&self) -> Vec<String> {
        self.df_source
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Build the styled sheet, add it to the workbook, and return the parent.
    ///
    /// `font_size` defaults to [`N_FONT_SIZE_DEFAULT`]. The sheet is fully built
    /// before insertion, so a failure leaves the workbook unchanged.
    pub fn finalize_worksheet(
        self,
        font_size: Option<f64>,
    ) -> Result<&'a mut ReportBuilder, ReportError> {
        if self.l_output_names.is_empty() {
            return Err(ReportError::EmptyConfiguration);
        }

        let df_projected = self.df_source.select(self.l_output_names.iter().map(String::as_str))?;
        let mut worksheet = Worksheet::from_dataframe(&df_projected, &self.title)?;

        worksheet.apply_base_format(&derive_default_sheet_format(
            font_size.unwrap_or(N_FONT_SIZE_DEFAULT),
        ));

        for style in self.dict_styles.values() {
            let Some(n_idx_col) = df_projected.get_column_index(&style.output_column_name) else {
                log::debug!(
                    "Worksheet {:?}: style for {:?} skipped, column not in projection",
                    self.title,
                    style.output_column_name
                );
                continue;
            };
            let n_col = n_idx_col + 1;

            if let Some(c_num_format) = &style.num_format {
                worksheet.set_column_num_format(n_col, c_num_format)?;
            }
            if style.if_centered {
                worksheet.set_column_align(n_col, "center")?;
            }
            if let Some(c_bg_color) = &style.bg_color {
                worksheet.set_column_bg_color(n_col, c_bg_color)?;
                // Header row renders the same for every column.
                worksheet.clear_cell_formats(1, n_col)?;
            }
        }

        worksheet.freeze_rows(N_ROWS_BANNER_AND_HEADER);

        let parent = self.parent;
        parent.workbook.add_worksheet(worksheet)?;
        log::info!(
            "Worksheet {:?} finalized: {} column(s), {} row(s)",
            self.title,
            df_projected.width(),
            df_projected.height()
        );
        Ok(parent)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
