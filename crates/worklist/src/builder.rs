use crate::table::{Cell, Table};
use crate::{WorklistError, WorklistResult};
use doc_model::{Identifier, Worklist};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXEMPT_MARKER: &str = "Exempted";

/// Largest float that still holds every smaller integer exactly.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// What to do with a cell that cannot be turned into an identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Log a warning and drop the row.
    #[default]
    Skip,
    Abort,
}

/// Normalize a cell into an identifier.
///
/// `Ok(None)` means the row carries no identifier (empty or exempt).
/// `Err` carries the offending value as displayed. Negative numbers are
/// malformed whether they arrive as numbers or as text.
pub fn normalize_cell(cell: &Cell, exempt_marker: &str) -> Result<Option<Identifier>, String> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Int(value) if *value >= 0 => Ok(Some(Identifier::new(value.to_string()))),
        Cell::Float(value) if value.fract() == 0.0 && (0.0..=MAX_EXACT_FLOAT).contains(value) => {
            Ok(Some(Identifier::new((*value as u64).to_string())))
        }
        Cell::Text(value) => {
            let value = value.trim();
            if value.is_empty() {
                return Ok(None);
            }
            if value.eq_ignore_ascii_case(exempt_marker.trim()) {
                return Ok(None);
            }
            integral_digits(value).map(|digits| Some(Identifier::new(digits))).ok_or_else(|| value.to_owned())
        }
        other => Err(other.to_string()),
    }
}

/// `"00123"` and `"123.00"` are integral; `"12a"`, `"1.5"` and `"-3"` are not.
fn integral_digits(value: &str) -> Option<&str> {
    let (digits, fraction) = value.split_once('.').unwrap_or((value, ""));
    let all_digits = !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit());
    let zero_fraction = fraction.bytes().all(|byte| byte == b'0');

    (all_digits && zero_fraction).then_some(digits)
}

#[derive(Debug, Clone)]
pub struct WorklistBuilder {
    exempt_marker: String,
    policy: MalformedPolicy,
}

impl Default for WorklistBuilder {
    fn default() -> Self {
        Self { exempt_marker: DEFAULT_EXEMPT_MARKER.to_owned(), policy: MalformedPolicy::default() }
    }
}

impl WorklistBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exempt_marker(mut self, marker: impl Into<String>) -> Self {
        self.exempt_marker = marker.into();
        self
    }

    pub fn policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Worklist for a single column.
    pub fn build(&self, table: &Table, column: &str) -> WorklistResult<Worklist> {
        let index = column_index(table, column)?;
        self.collect(table, column, index)
    }

    /// One worklist per column, in the order given.
    ///
    /// Every column is looked up before any cell is read, so a missing column
    /// is reported even when an earlier column holds malformed values.
    pub fn build_all(&self, table: &Table, columns: &[&str]) -> WorklistResult<Vec<Worklist>> {
        let indices = columns
            .iter()
            .map(|column| column_index(table, column))
            .collect::<WorklistResult<Vec<_>>>()?;

        columns
            .iter()
            .zip(indices)
            .map(|(column, index)| self.collect(table, column, index))
            .collect()
    }

    fn collect(&self, table: &Table, column: &str, index: usize) -> WorklistResult<Worklist> {
        let mut worklist = Worklist::new();
        let mut skipped = 0usize;

        for (row, cell) in table.column_cells(index) {
            match normalize_cell(cell, &self.exempt_marker) {
                Ok(Some(identifier)) => worklist.push(identifier),
                Ok(None) => skipped += 1,
                Err(value) => match self.policy {
                    MalformedPolicy::Skip => {
                        log::warn!("row {row}, column {column:?}: skipping malformed identifier {value:?}");
                        skipped += 1;
                    }
                    MalformedPolicy::Abort => {
                        return Err(WorklistError::MalformedIdentifier {
                            row,
                            column: column.to_owned(),
                            value,
                        })
                    }
                },
            }
        }

        log::debug!("column {column:?}: {} identifiers, {skipped} rows skipped", worklist.len());
        Ok(worklist)
    }
}

fn column_index(table: &Table, column: &str) -> WorklistResult<usize> {
    table.column_index(column).ok_or_else(|| WorklistError::Schema {
        column: column.to_owned(),
        available: table.headers().iter().filter(|header| !header.is_empty()).cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_owned())
    }

    fn ids(worklist: &Worklist) -> Vec<&str> {
        worklist.iter().map(Identifier::as_str).collect()
    }

    fn payroll() -> Table {
        let rows = vec![
            vec![text("UAN No."), text("ESI No")],
            vec![Cell::Float(100123456789.0), Cell::Int(3312345678)],
            vec![text("Exempted"), text(" 0042 ")],
            vec![Cell::Empty, text("exempted")],
            vec![Cell::Int(100123456789), Cell::Float(12.0)],
        ];
        Table::from_rows(rows, 0).expect("table")
    }

    #[test]
    fn normalizes_cells() {
        assert_eq!(normalize_cell(&Cell::Int(12345), "Exempted"), Ok(Some(Identifier::from("12345"))));
        assert_eq!(normalize_cell(&Cell::Float(12345.0), "Exempted"), Ok(Some(Identifier::from("12345"))));
        assert_eq!(normalize_cell(&text(" 007 "), "Exempted"), Ok(Some(Identifier::from("007"))));
        assert_eq!(normalize_cell(&text("123.000"), "Exempted"), Ok(Some(Identifier::from("123"))));
        assert_eq!(normalize_cell(&text("   "), "Exempted"), Ok(None));
        assert_eq!(normalize_cell(&Cell::Empty, "Exempted"), Ok(None));
        assert_eq!(normalize_cell(&text("EXEMPTED"), "Exempted"), Ok(None));
    }

    #[test]
    fn rejects_non_integral_values() {
        assert_eq!(normalize_cell(&Cell::Float(1.5), "Exempted"), Err("1.5".to_owned()));
        assert_eq!(normalize_cell(&Cell::Float(1e300), "Exempted"), Err(1e300f64.to_string()));
        assert_eq!(normalize_cell(&text("12a"), "Exempted"), Err("12a".to_owned()));
        assert_eq!(normalize_cell(&text("1.5"), "Exempted"), Err("1.5".to_owned()));
        assert_eq!(normalize_cell(&text(".0"), "Exempted"), Err(".0".to_owned()));
        assert_eq!(normalize_cell(&Cell::Bool(true), "Exempted"), Err("true".to_owned()));
    }

    #[test]
    fn negative_values_are_malformed_in_every_cell_kind() {
        assert_eq!(normalize_cell(&Cell::Int(-5), "Exempted"), Err("-5".to_owned()));
        assert_eq!(normalize_cell(&Cell::Float(-5.0), "Exempted"), Err("-5".to_owned()));
        assert_eq!(normalize_cell(&text("-5"), "Exempted"), Err("-5".to_owned()));
        assert_eq!(normalize_cell(&Cell::Int(0), "Exempted"), Ok(Some(Identifier::from("0"))));
    }

    #[test]
    fn builds_worklist_in_row_order_with_duplicates() {
        let worklist = WorklistBuilder::new().build(&payroll(), "UAN No.").expect("worklist");

        assert_eq!(ids(&worklist), vec!["100123456789", "100123456789"]);
    }

    #[test]
    fn builds_every_column() {
        let worklists = WorklistBuilder::new().build_all(&payroll(), &["UAN No.", "ESI No"]).expect("worklists");

        assert_eq!(worklists.len(), 2);
        assert_eq!(ids(&worklists[1]), vec!["3312345678", "0042", "12"]);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let err = WorklistBuilder::new().build_all(&payroll(), &["UAN No.", "PF No"]).expect_err("should fail");

        match err {
            WorklistError::Schema { column, available } => {
                assert_eq!(column, "PF No");
                assert_eq!(available, vec!["UAN No.", "ESI No"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn schema_is_checked_before_malformed_cells() {
        let rows = vec![vec![text("UAN No.")], vec![text("bogus")]];
        let table = Table::from_rows(rows, 0).expect("table");

        let err = WorklistBuilder::new()
            .policy(MalformedPolicy::Abort)
            .build_all(&table, &["UAN No.", "ESI No"])
            .expect_err("should fail");
        assert!(matches!(err, WorklistError::Schema { .. }));
    }

    #[test]
    fn malformed_rows_are_skipped_by_default() {
        let rows = vec![vec![text("UAN No.")], vec![text("n/a")], vec![Cell::Int(5)]];
        let table = Table::from_rows(rows, 0).expect("table");

        let worklist = WorklistBuilder::new().build(&table, "UAN No.").expect("worklist");
        assert_eq!(ids(&worklist), vec!["5"]);
    }

    #[test]
    fn abort_policy_reports_row_and_column() {
        let rows = vec![vec![text("skip me")], vec![text("UAN No.")], vec![Cell::Int(5)], vec![text("n/a")]];
        let table = Table::from_rows(rows, 1).expect("table");

        let err = WorklistBuilder::new()
            .policy(MalformedPolicy::Abort)
            .build(&table, "UAN No.")
            .expect_err("should fail");

        match err {
            WorklistError::MalformedIdentifier { row, column, value } => {
                assert_eq!(row, 4);
                assert_eq!(column, "UAN No.");
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn custom_exempt_marker() {
        let rows = vec![vec![text("ESI No")], vec![text("N.A.")], vec![text("Exempted")]];
        let table = Table::from_rows(rows, 0).expect("table");

        let worklist = WorklistBuilder::new()
            .exempt_marker("n.a.")
            .policy(MalformedPolicy::Skip)
            .build(&table, "ESI No")
            .expect("worklist");
        assert!(worklist.is_empty());
    }

    #[test]
    fn policy_serializes_in_snake_case() {
        assert_eq!(serde_json::to_string(&MalformedPolicy::Abort).expect("json"), "\"abort\"");
    }
}
