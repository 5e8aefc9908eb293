//! Workbook text via `calamine`: one header line per sheet, then one
//! tab-separated line per non-blank row.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::ExtractError;

pub fn workbook_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;

    let mut out = String::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Spreadsheet(format!("{}: {}", name, e)))?;

        out.push_str(&format!("Sheet: {}\n", name));
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out.push('\n');
    }
    Ok(out)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}
