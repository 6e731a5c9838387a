//! `reportkit_xlsx` v1:
//! Fluent builders that turn polars tables into styled XLSX reports.
//!
//! Modules:
//! - `conf`     : Excel limits, number formats, layout presets
//! - `spec`     : format/column models and error types
//! - `util`     : pure helper functions
//! - `workbook` : in-memory workbook model (1-based addressing)
//! - `writer`   : serialization through `rust_xlsxwriter`
//! - `reader`   : re-loading through `calamine`
//! - `report`   : `ReportBuilder` / `WorksheetBuilder`
//! - `banner`   : one-shot workbook banner
pub mod banner;
pub mod conf;
pub mod reader;
pub mod report;
pub mod spec;
pub mod util;
pub mod workbook;
pub mod writer;

pub use banner::mark_banner;
pub use conf::{
    C_BANNER_PROPERTY_KEY, FMT_CURRENCY_0_DECIMALS, FMT_CURRENCY_2_DECIMALS,
    FMT_CURRENCY_4_DECIMALS, FMT_QUANTITY, FMT_SHORT_DATE, N_FONT_SIZE_DEFAULT,
};
pub use report::{ReportBuilder, WorksheetBuilder};
pub use spec::{
    EngineError, EnumCellValue, ReportError, SpecCell, SpecCellFormat, SpecCellRange,
    SpecColumnOptions, SpecColumnStyle,
};
pub use workbook::{Workbook, Worksheet};
