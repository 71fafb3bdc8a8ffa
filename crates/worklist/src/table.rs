use crate::{WorklistError, WorklistResult};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;

static EMPTY: Cell = Cell::Empty;

/// A single cell value as read from the source table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Text(value) => f.write_str(value),
            Cell::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::Int(value) => Cell::Int(*value),
            Data::Float(value) => Cell::Float(*value),
            Data::String(value) => Cell::Text(value.clone()),
            Data::Bool(value) => Cell::Bool(*value),
            other => Cell::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Any workbook calamine can open (xlsx, xlsm, xlsb, xls, ods).
    Spreadsheet,
    Csv,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Spreadsheet),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Header row plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
    first_data_row: usize,
}

impl Table {
    /// Drop the first `skip_rows` rows and take the next one as the header.
    pub fn from_rows(rows: Vec<Vec<Cell>>, skip_rows: usize) -> WorklistResult<Self> {
        let mut rows = rows.into_iter().skip(skip_rows);
        let headers = rows
            .next()
            .ok_or(WorklistError::MissingHeader { skip_rows })?
            .iter()
            .map(|cell| cell.to_string().trim().to_owned())
            .collect();

        Ok(Self { headers, rows: rows.collect(), first_data_row: skip_rows + 2 })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|header| header == name)
    }

    /// Values of one column paired with their 1-based row number in the source.
    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = (usize, &Cell)> + '_ {
        self.rows.iter().enumerate().map(move |(offset, row)| {
            (self.first_data_row + offset, row.get(index).unwrap_or(&EMPTY))
        })
    }
}

pub fn read_table(bytes: &[u8], format: TableFormat, skip_rows: usize) -> WorklistResult<Table> {
    let rows = match format {
        TableFormat::Spreadsheet => spreadsheet_rows(bytes)?,
        TableFormat::Csv => csv_rows(bytes)?,
    };
    log::debug!("read {} raw rows from {format:?} table", rows.len());

    Table::from_rows(rows, skip_rows)
}

pub fn read_table_file(path: &Path, skip_rows: usize) -> WorklistResult<Table> {
    let format = TableFormat::from_path(path)
        .ok_or_else(|| WorklistError::UnsupportedFormat(path.display().to_string()))?;
    let bytes = fs::read(path)?;

    read_table(&bytes, format, skip_rows)
}

/// Rows of the first worksheet, counted from the top of the sheet.
fn spreadsheet_rows(bytes: &[u8]) -> WorklistResult<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| WorklistError::Read(format!("failed to open workbook: {err}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| WorklistError::Read("workbook has no worksheets".to_owned()))?
        .map_err(|err| WorklistError::Read(format!("failed to read first worksheet: {err}")))?;

    Ok(range_rows(&range))
}

fn range_rows(range: &Range<Data>) -> Vec<Vec<Cell>> {
    // calamine trims leading empty rows and columns; put them back so
    // skip counts and column positions line up with what a user sees.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(Cell::from));
        rows.push(cells);
    }

    rows
}

fn csv_rows(bytes: &[u8]) -> WorklistResult<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| WorklistError::Read(format!("invalid CSV: {err}")))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_owned())
                    }
                })
                .collect(),
        );
    }

    Ok(rows)
}
