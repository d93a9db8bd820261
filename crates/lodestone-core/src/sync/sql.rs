//! Dialect-neutral statement text builders.
//!
//! The synchronizer renders to the lowest common denominator: positional `?`
//! placeholders, no quoting, no dialect hooks. Rendering is mechanical; the
//! interesting part is which statement family the descriptor selects.

use crate::model::ColumnModel;
use std::fmt::Write;

///
/// InsertBuilder
///

#[derive(Debug)]
pub(crate) struct InsertBuilder {
    table: String,
    columns: Vec<String>,
}

impl InsertBuilder {
    #[must_use]
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn columns(mut self, columns: &[ColumnModel]) -> Self {
        self.columns
            .extend(columns.iter().map(|c| c.name.clone()));
        self
    }

    #[must_use]
    pub(crate) fn column(mut self, column: &ColumnModel) -> Self {
        self.columns.push(column.name.clone());
        self
    }

    #[must_use]
    pub(crate) fn build(self) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "insert into {} ({}) values ({placeholders})",
            self.table,
            self.columns.join(", ")
        )
    }
}

///
/// UpdateBuilder
///

#[derive(Debug)]
pub(crate) struct UpdateBuilder {
    table: String,
    assignments: Vec<String>,
    predicates: Vec<String>,
}

impl UpdateBuilder {
    #[must_use]
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            assignments: Vec::new(),
            predicates: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn set_columns(mut self, columns: &[ColumnModel]) -> Self {
        self.assignments
            .extend(columns.iter().map(|c| format!("{} = ?", c.name)));
        self
    }

    #[must_use]
    pub(crate) fn set_null(mut self, columns: &[ColumnModel]) -> Self {
        self.assignments
            .extend(columns.iter().map(|c| format!("{} = null", c.name)));
        self
    }

    #[must_use]
    pub(crate) fn where_columns(mut self, columns: &[ColumnModel]) -> Self {
        self.predicates
            .extend(columns.iter().map(|c| format!("{} = ?", c.name)));
        self
    }

    #[must_use]
    pub(crate) fn build(self) -> String {
        let mut sql = format!("update {} set {}", self.table, self.assignments.join(", "));
        if !self.predicates.is_empty() {
            let _ = write!(sql, " where {}", self.predicates.join(" and "));
        }
        sql
    }
}

///
/// DeleteBuilder
///

#[derive(Debug)]
pub(crate) struct DeleteBuilder {
    table: String,
    predicates: Vec<String>,
}

impl DeleteBuilder {
    #[must_use]
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            predicates: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn where_columns(mut self, columns: &[ColumnModel]) -> Self {
        self.predicates
            .extend(columns.iter().map(|c| format!("{} = ?", c.name)));
        self
    }

    #[must_use]
    pub(crate) fn build(self) -> String {
        format!(
            "delete from {} where {}",
            self.table,
            self.predicates.join(" and ")
        )
    }
}
