// Copyright 2023 Remi Bernotavicius

use std::path::Path;

/// Written ahead of comma-separated files so spreadsheet apps detect UTF-8.
pub const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One non-empty record of a spreadsheet. `line` is the 1-based file line the record starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub line: usize,
    pub cells: Vec<String>,
}

/// `.csv` files are comma-separated. Everything else, including the `.xls` files this program
/// exports, is read as tab-separated text.
pub fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => b',',
        _ => b'\t',
    }
}

pub fn decode(bytes: &[u8], delimiter: u8) -> csv::Result<Vec<GridRow>> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows = vec![];
    for (index, record) in reader.byte_records().enumerate() {
        let record = record?;
        let mut cells: Vec<String> = record
            .iter()
            .map(|c| String::from_utf8_lossy(c).trim().to_owned())
            .collect();
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        if !cells.is_empty() {
            let line = record
                .position()
                .map_or(index + 1, |position| position.line() as usize);
            rows.push(GridRow { line, cells });
        }
    }
    Ok(rows)
}

pub fn encode(grid: &[Vec<String>], delimiter: u8) -> csv::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .delimiter(delimiter)
        .from_writer(vec![]);
    for row in grid {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[test]
fn decode_skips_blank_rows_and_trailing_cells() {
    let text = "\u{feff}原料名稱,原料分類,單位,單價\n麵粉,粉類,公斤,35,,\n,,,\n 雞蛋 ,蛋奶類,顆,8\n";
    let rows = decode(text.as_bytes(), b',').unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].cells[0], "原料名稱");
    assert_eq!(rows[1].cells, ["麵粉", "粉類", "公斤", "35"]);
    assert_eq!(rows[2].line, 4);
    assert_eq!(rows[2].cells[0], "雞蛋");
}

#[test]
fn rows_report_their_file_line() {
    let rows = decode(b"h1,h2\n\n\na,b\n\"multi\nline\",c\nd,e\n", b',').unwrap();
    let lines: Vec<usize> = rows.iter().map(|r| r.line).collect();
    assert_eq!(lines, [1, 4, 5, 7]);
}

#[test]
fn quoted_cells_keep_their_delimiters() {
    let text = "配方名稱\t原料及數量\n海綿蛋糕\t\"麵粉:500,雞蛋:200\"\n";
    let rows = decode(text.as_bytes(), b'\t').unwrap();
    assert_eq!(rows[1].cells[1], "麵粉:500,雞蛋:200");

    let grid: Vec<Vec<String>> = rows.into_iter().map(|r| r.cells).collect();
    let encoded = encode(&grid, b',').unwrap();
    let decoded = decode(&encoded, b',').unwrap();
    assert_eq!(decoded[1].cells[1], "麵粉:500,雞蛋:200");
}

#[test]
fn delimiter_follows_extension() {
    assert_eq!(delimiter_for(Path::new("原料範例.csv")), b',');
    assert_eq!(delimiter_for(Path::new("UPPER.CSV")), b',');
    assert_eq!(delimiter_for(Path::new("原料清單.xls")), b'\t');
    assert_eq!(delimiter_for(Path::new("data.tsv")), b'\t');
}
