//! Column header labels from the first row of the first worksheet.
//!
//! Workbooks (xlsx/xlsm/xlsb/xls/ods) are read with calamine. Bytes that are not a workbook
//! but are plain text are read as delimited text with the csv crate.

use std::io::Cursor;

use calamine::{Data, Reader};
use tracing::debug;

use super::{ExtractedContent, ExtractionError};

pub fn header_labels(data: &[u8]) -> Result<ExtractedContent, ExtractionError> {
    let cells: Vec<String> = match calamine::open_workbook_auto_from_rs(Cursor::new(data)) {
        Ok(mut workbook) => {
            let range = workbook
                .worksheet_range_at(0)
                .ok_or_else(|| malformed("workbook has no worksheets"))?
                .map_err(|e| malformed(&format!("unreadable worksheet: {e}")))?;
            let first_row = range
                .rows()
                .next()
                .ok_or_else(|| malformed("first worksheet is empty"))?;
            first_row.iter().map(cell_label).collect()
        }
        Err(workbook_error) => match std::str::from_utf8(data) {
            Ok(text) if !text.contains('\0') => {
                debug!("Not a workbook ({workbook_error}), reading as delimited text");
                delimited_header_row(text)?
            }
            _ => {
                return Err(malformed(&format!(
                    "not a readable workbook: {workbook_error}"
                )))
            }
        },
    };

    labels_from_cells(cells)
}

fn cell_label(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn delimited_header_row(text: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(text))
        .from_reader(text.as_bytes());

    let record = reader
        .records()
        .next()
        .ok_or_else(|| malformed("table has no rows"))?
        .map_err(|e| malformed(&format!("unreadable header row: {e}")))?;

    Ok(record.iter().map(|field| field.trim().to_string()).collect())
}

/// Picks the most frequent of tab, `;` and `,` on the first line. Ties go to `,`.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    [b'\t', b';', b',']
        .into_iter()
        .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
        .unwrap_or(b',')
}

/// Trailing empty cells are dropped; interior empty cells become `Unnamed: {index}`.
fn labels_from_cells(mut cells: Vec<String>) -> Result<ExtractedContent, ExtractionError> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    if cells.is_empty() {
        return Err(malformed("header row has no labels"));
    }

    let labels = cells
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            if label.is_empty() {
                format!("Unnamed: {index}")
            } else {
                label
            }
        })
        .collect();

    Ok(ExtractedContent::Labels(labels))
}

fn malformed(reason: &str) -> ExtractionError {
    ExtractionError::MalformedTable(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(content: ExtractedContent) -> Vec<String> {
        match content {
            ExtractedContent::Labels(labels) => labels,
            other => panic!("expected labels, got {other:?}"),
        }
    }

    const STAFF_XLSX: &[u8] = include_bytes!("../../fixtures/staff_headers.xlsx");
    const SPARSE_XLSX: &[u8] = include_bytes!("../../fixtures/sparse_headers.xlsx");
    const EMPTY_XLSX: &[u8] = include_bytes!("../../fixtures/empty_sheet.xlsx");

    #[test]
    fn test_workbook_first_row_is_header() {
        let content = header_labels(STAFF_XLSX).unwrap();
        assert_eq!(labels(content), vec!["Name", "Age", "Salary"]);
    }

    #[test]
    fn test_workbook_gaps_numbers_and_padding() {
        let content = header_labels(SPARSE_XLSX).unwrap();
        assert_eq!(labels(content), vec!["Name", "Unnamed: 1", "2024", "Salary"]);
    }

    #[test]
    fn test_workbook_with_empty_sheet_is_malformed() {
        let err = header_labels(EMPTY_XLSX).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedTable(msg) if msg.contains("empty")));
    }

    #[test]
    fn test_cell_label_formats() {
        assert_eq!(cell_label(&Data::Empty), "");
        assert_eq!(cell_label(&Data::String("  Dept ".to_string())), "Dept");
        assert_eq!(cell_label(&Data::Float(2024.0)), "2024");
        assert_eq!(cell_label(&Data::Float(0.5)), "0.5");
        assert_eq!(cell_label(&Data::Int(7)), "7");
        assert_eq!(cell_label(&Data::Bool(true)), "true");
    }

    #[test]
    fn test_csv_first_row_is_header() {
        let content = header_labels(b"Name,Age,Salary\nAda,36,100000\n").unwrap();
        assert_eq!(labels(content), vec!["Name", "Age", "Salary"]);
    }

    #[test]
    fn test_csv_semicolon_delimiter_is_sniffed() {
        let content = header_labels(b"Region;Quarter;Revenue\nEU;Q1;10\n").unwrap();
        assert_eq!(labels(content), vec!["Region", "Quarter", "Revenue"]);
    }

    #[test]
    fn test_quoted_and_padded_labels_are_trimmed() {
        let content = header_labels(b"\" Name \", Age ,\"Salary, gross\"\n").unwrap();
        assert_eq!(labels(content), vec!["Name", "Age", "Salary, gross"]);
    }

    #[test]
    fn test_interior_empty_header_is_unnamed() {
        let content = header_labels(b"Name,,Salary,\n").unwrap();
        assert_eq!(labels(content), vec!["Name", "Unnamed: 1", "Salary"]);
    }

    #[test]
    fn test_empty_table_is_malformed() {
        assert!(matches!(
            header_labels(b""),
            Err(ExtractionError::MalformedTable(_))
        ));
        assert!(matches!(
            header_labels(b" , ,\n1,2,3\n"),
            Err(ExtractionError::MalformedTable(_))
        ));
    }

    #[test]
    fn test_binary_garbage_is_malformed() {
        let err = header_labels(&[0xff, 0xfe, 0x00, 0x12, 0x80]).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedTable(msg) if msg.contains("workbook")));
    }
}
