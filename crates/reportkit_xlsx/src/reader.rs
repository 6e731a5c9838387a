//! XLSX loader that rebuilds the workbook model from serialized bytes.
//!
//! Values and merged ranges are read through `calamine`; workbook custom
//! properties come from `docProps/custom.xml`. Cell formats are not re-loaded.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use calamine::{Data, Reader, Xlsx};
use quick_xml::Reader as XmlReader;
use quick_xml::escape::{EscapeError, resolve_predefined_entity};
use quick_xml::events::Event;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::spec::{EngineError, EnumCellValue, SpecCellRange};
use crate::workbook::{Workbook, Worksheet};

const C_PATH_CUSTOM_PROPERTIES: &str = "docProps/custom.xml";

/// Load values, merges, and custom properties from xlsx bytes.
pub fn read_workbook_from_bytes(v_xlsx: &[u8]) -> Result<Workbook, EngineError> {
    let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(v_xlsx))?;
    xlsx.load_merged_regions()?;

    let mut workbook = Workbook::new();
    for c_sheet_name in xlsx.sheet_names() {
        let mut worksheet = Worksheet::new(&c_sheet_name)?;

        let range = xlsx.worksheet_range(&c_sheet_name)?;
        if let Some((n_row_start, n_col_start)) = range.start() {
            for (n_row_rel, n_col_rel, data) in range.used_cells() {
                let value = derive_cell_value_from_data(data);
                if value.is_none() {
                    continue;
                }
                worksheet.set_value(
                    n_row_start as usize + n_row_rel + 1,
                    n_col_start as usize + n_col_rel + 1,
                    value,
                )?;
            }
        }

        let l_merges = xlsx
            .worksheet_merge_cells(&c_sheet_name)
            .unwrap_or(Ok(Vec::new()))?;
        for dims in l_merges {
            worksheet.merge_range(SpecCellRange::new(
                dims.start.0 as usize + 1,
                dims.start.1 as usize + 1,
                dims.end.0 as usize + 1,
                dims.end.1 as usize + 1,
            ))?;
        }

        workbook.add_worksheet(worksheet)?;
    }

    for (c_name, c_value) in read_custom_properties(v_xlsx)? {
        workbook.set_custom_property(&c_name, c_value);
    }

    log::debug!("Workbook loaded with {} sheet(s)", workbook.len());
    Ok(workbook)
}

fn derive_cell_value_from_data(data: &Data) -> EnumCellValue {
    match data {
        Data::Empty => EnumCellValue::None,
        Data::String(val) => EnumCellValue::String(val.clone()),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Bool(val) => EnumCellValue::Boolean(*val),
        Data::DateTime(val) => EnumCellValue::Number(val.as_f64()),
        Data::DateTimeIso(val) | Data::DurationIso(val) => EnumCellValue::String(val.clone()),
        Data::Error(err) => EnumCellValue::String(err.to_string()),
    }
}

/// Read `name -> value` pairs from the package's custom properties part.
///
/// A package without the part yields an empty map.
pub fn read_custom_properties(v_xlsx: &[u8]) -> Result<BTreeMap<String, String>, EngineError> {
    let mut archive = ZipArchive::new(Cursor::new(v_xlsx))?;

    let mut v_xml = Vec::new();
    match archive.by_name(C_PATH_CUSTOM_PROPERTIES) {
        Ok(mut file) => {
            file.read_to_end(&mut v_xml)?;
        }
        Err(ZipError::FileNotFound) => return Ok(BTreeMap::new()),
        Err(err) => return Err(err.into()),
    }

    let mut reader = XmlReader::from_reader(v_xml.as_slice());

    let mut dict_properties = BTreeMap::new();
    // Property currently open, and its value accumulated across text/entity events.
    let mut c_name_current: Option<String> = None;
    let mut c_value = String::new();
    let mut if_in_value = false;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == b"property" => {
                c_name_current = e.attributes().with_checks(false).flatten().find_map(|a| {
                    (a.key.as_ref() == b"name")
                        .then(|| String::from_utf8_lossy(&a.value).into_owned())
                });
                c_value.clear();
            }
            Event::Start(_) if c_name_current.is_some() => {
                if_in_value = true;
            }
            Event::Text(ref t) if if_in_value => {
                c_value.push_str(&t.decode().map_err(quick_xml::Error::from)?);
            }
            Event::GeneralRef(ref e) if if_in_value => {
                if let Some(chr) = e.resolve_char_ref()? {
                    c_value.push(chr);
                } else {
                    let c_entity = e.decode().map_err(quick_xml::Error::from)?;
                    let c_resolved = resolve_predefined_entity(&c_entity).ok_or_else(|| {
                        quick_xml::Error::Escape(EscapeError::UnrecognizedEntity(
                            0..c_entity.len(),
                            c_entity.to_string(),
                        ))
                    })?;
                    c_value.push_str(c_resolved);
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"property" => {
                if let Some(c_name) = c_name_current.take() {
                    dict_properties.insert(c_name, std::mem::take(&mut c_value));
                }
                if_in_value = false;
            }
            Event::End(_) => {
                if_in_value = false;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(dict_properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_workbook_restores_values_merges_and_properties() {
        let mut workbook = Workbook::new();
        let worksheet = workbook
            .add_worksheet(Worksheet::new("data").expect("sheet"))
            .expect("add");
        worksheet
            .set_value(1, 1, EnumCellValue::from("title"))
            .expect("value");
        worksheet
            .merge_range(SpecCellRange::new(1, 1, 1, 3))
            .expect("merge");
        worksheet
            .set_value(2, 1, EnumCellValue::from("Count"))
            .expect("value");
        worksheet
            .set_value(3, 1, EnumCellValue::Number(25.0))
            .expect("value");
        worksheet
            .set_value(3, 2, EnumCellValue::Boolean(true))
            .expect("value");
        workbook.set_custom_property("reportkit.test", "2026-01-01T00:00:00+00:00");

        let v_xlsx = workbook.to_bytes().expect("bytes");
        let workbook_loaded = read_workbook_from_bytes(&v_xlsx).expect("load");

        assert_eq!(workbook_loaded.len(), 1);
        let sheet = workbook_loaded.worksheet("data").expect("sheet");
        assert_eq!(sheet.value(1, 1), EnumCellValue::from("title"));
        assert_eq!(sheet.value(2, 1), EnumCellValue::from("Count"));
        assert_eq!(sheet.value(3, 1), EnumCellValue::Number(25.0));
        assert_eq!(sheet.value(3, 2), EnumCellValue::Boolean(true));
        assert_eq!(sheet.merged_ranges(), &[SpecCellRange::new(1, 1, 1, 3)]);
        assert_eq!(
            workbook_loaded.custom_property("reportkit.test"),
            Some("2026-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_read_custom_properties_unescapes_markup_characters() {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet(Worksheet::new("data").expect("sheet"))
            .expect("add");
        workbook.set_custom_property("k", "a & b");
        workbook.set_custom_property("tags", "<Q1> & \"Q2\" 'draft'");

        let v_xlsx = workbook.to_bytes().expect("bytes");
        let workbook_loaded = Workbook::from_bytes(&v_xlsx).expect("load");

        assert_eq!(workbook_loaded.custom_property("k"), Some("a & b"));
        assert_eq!(
            workbook_loaded.custom_property("tags"),
            Some("<Q1> & \"Q2\" 'draft'")
        );
        assert_eq!(workbook_loaded.custom_properties(), workbook.custom_properties());
    }

    #[test]
    fn test_read_custom_properties_without_part_is_empty() {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet(Worksheet::new("data").expect("sheet"))
            .expect("add");
        let v_xlsx = workbook.to_bytes().expect("bytes");

        assert!(read_custom_properties(&v_xlsx).expect("props").is_empty());
    }

    #[test]
    fn test_read_rejects_non_xlsx_bytes() {
        assert!(matches!(
            read_workbook_from_bytes(b"not a zip"),
            Err(EngineError::Read(_))
        ));
        assert!(matches!(
            read_custom_properties(b"not a zip"),
            Err(EngineError::Zip(_))
        ));
    }
}
