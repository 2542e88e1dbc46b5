//! Workbook reading for spreadsheet imports
//!
//! Every cell of the first worksheet is rendered as a string. Rows are
//! anchored at A1, so leading blank rows and columns are kept as empty
//! strings and row `n` of the sheet is always `rows[n - 1]`.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use calamine::{Data, Reader, Xlsx};

use crate::error::{Error, Result};

/// Read the first worksheet of an xlsx workbook
pub fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Workbook("workbook has no worksheet".into()))??;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };
    let start_row = start_row as usize;
    let start_col = start_col as usize;
    let width = start_col + range.width();

    let mut rows = vec![vec![String::new(); width]; start_row];
    for (offset, cells) in range.rows().enumerate() {
        let row = start_row + offset + 1;
        let mut values = vec![String::new(); start_col];
        for (index, cell) in cells.iter().enumerate() {
            values.push(coerce_cell(cell, row, start_col + index + 1)?);
        }
        rows.push(values);
    }

    tracing::debug!("Read {} row(s) from workbook", rows.len());
    Ok(rows)
}

/// Decode a base64 upload and read its first worksheet.
///
/// Line breaks inside the encoded text are ignored.
pub fn read_rows_base64(text: &str) -> Result<Vec<Vec<String>>> {
    let compact: String = text.split_whitespace().collect();
    let bytes = STANDARD.decode(compact)?;
    read_rows(&bytes)
}

/// Render one cell; `row` and `col` are 1-based and only used in errors
pub fn coerce_cell(cell: &Data, row: usize, col: usize) -> Result<String> {
    Ok(match cell {
        Data::Empty => String::new(),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => text.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => float_repr(*value),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        Data::DateTime(value) => {
            let serial = value.as_f64();
            match value.as_datetime() {
                Some(datetime) if value.is_duration() || (0.0..1.0).contains(&serial) => {
                    datetime.format("%H:%M:%S").to_string()
                }
                Some(datetime) if datetime.time() == chrono::NaiveTime::MIN => {
                    datetime.format("%Y-%m-%d").to_string()
                }
                Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
                None => float_repr(serial),
            }
        }
        Data::Error(error) => {
            return Err(Error::CellValue {
                row,
                col,
                value: error.to_string(),
            })
        }
    })
}

/// Shortest round-trip rendering, integral values without a fraction
#[allow(clippy::float_cmp)]
fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    if value.abs() < 1e-4 {
        let scientific = format!("{value:e}");
        if let Some((mantissa, exponent)) = scientific.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                return format!("{mantissa}e{sign}{:02}", exponent.abs());
            }
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    #[test]
    fn numbers_render_like_python() {
        assert_eq!(coerce_cell(&Data::Float(5.0), 1, 1).unwrap(), "5");
        assert_eq!(coerce_cell(&Data::Float(5.5), 1, 1).unwrap(), "5.5");
        assert_eq!(coerce_cell(&Data::Float(-12.0), 1, 1).unwrap(), "-12");
        assert_eq!(coerce_cell(&Data::Float(0.1), 1, 1).unwrap(), "0.1");
        assert_eq!(coerce_cell(&Data::Float(0.000_015), 1, 1).unwrap(), "1.5e-05");
        assert_eq!(coerce_cell(&Data::Int(42), 1, 1).unwrap(), "42");
    }

    #[test]
    fn booleans_and_empties() {
        assert_eq!(coerce_cell(&Data::Bool(true), 1, 1).unwrap(), "True");
        assert_eq!(coerce_cell(&Data::Bool(false), 1, 1).unwrap(), "False");
        assert_eq!(coerce_cell(&Data::Empty, 1, 1).unwrap(), "");
        assert_eq!(
            coerce_cell(&Data::String(" keep ".into()), 1, 1).unwrap(),
            " keep "
        );
    }

    #[test]
    fn error_cells_report_their_position() {
        let err = coerce_cell(&Data::Error(CellErrorType::Div0), 3, 2).unwrap_err();
        match err {
            Error::CellValue { row, col, value } => {
                assert_eq!((row, col), (3, 2));
                assert_eq!(value, "#DIV/0!");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn workbook_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        let sheet = workbook.add_worksheet();
        sheet.write_string(1, 1, "LAPTOP X1").unwrap();
        sheet.write_number(1, 2, 3.0).unwrap();
        sheet.write_number(1, 3, 2.25).unwrap();
        sheet.write_boolean(1, 4, true).unwrap();
        let day = ExcelDateTime::from_ymd(2024, 5, 3).unwrap();
        sheet.write_datetime_with_format(2, 1, &day, &date_format).unwrap();
        let moment = ExcelDateTime::from_ymd(2024, 5, 3)
            .unwrap()
            .and_hms(10, 30, 0)
            .unwrap();
        sheet
            .write_datetime_with_format(2, 2, &moment, &datetime_format)
            .unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn rows_are_anchored_at_a1() {
        let rows = read_rows(&workbook_bytes()).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].iter().all(String::is_empty));
        assert_eq!(rows[1], vec!["", "LAPTOP X1", "3", "2.25", "True"]);
        assert_eq!(rows[2][0], "");
        assert_eq!(rows[2][1], "2024-05-03");
        assert_eq!(rows[2][2], "2024-05-03 10:30:00");
    }

    #[test]
    fn base64_uploads_are_decoded() {
        let encoded = STANDARD.encode(workbook_bytes());
        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| format!("{}\n", String::from_utf8_lossy(line)))
            .collect();

        let rows = read_rows_base64(&wrapped).unwrap();
        assert_eq!(rows[1][1], "LAPTOP X1");
    }

    #[test]
    fn garbage_is_a_workbook_error() {
        assert!(matches!(read_rows(b"not a workbook"), Err(Error::Workbook(_))));
        assert!(matches!(read_rows_base64("%%%"), Err(Error::Workbook(_))));
    }
}
