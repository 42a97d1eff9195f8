// SPDX-License-Identifier: PMPL-1.0-or-later

//! Query results and their projection to output strings

use crate::pql::query::Selection;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum QueryResult {
    Stmts(BTreeSet<usize>),
    Names(BTreeSet<String>),
    Boolean(bool),
    Tuples(Vec<Vec<String>>),
}

impl QueryResult {
    /// Result of a query whose clauses cannot all be satisfied
    pub fn empty(selection: &Selection) -> Self {
        match selection {
            Selection::Boolean => QueryResult::Boolean(false),
            Selection::Elements(elements) if elements.len() > 1 => QueryResult::Tuples(Vec::new()),
            Selection::Elements(elements) => {
                if elements.first().is_some_and(|e| e.yields_statements()) {
                    QueryResult::Stmts(BTreeSet::new())
                } else {
                    QueryResult::Names(BTreeSet::new())
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryResult::Stmts(values) => values.len(),
            QueryResult::Names(values) => values.len(),
            QueryResult::Boolean(_) => 1,
            QueryResult::Tuples(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Format a result as one string per answer, in a stable order
pub fn project(result: &QueryResult) -> Vec<String> {
    match result {
        QueryResult::Boolean(true) => vec!["TRUE".to_string()],
        QueryResult::Boolean(false) => vec!["FALSE".to_string()],
        QueryResult::Stmts(values) => values.iter().map(usize::to_string).collect(),
        QueryResult::Names(values) => values.iter().cloned().collect(),
        QueryResult::Tuples(rows) => {
            let mut lines: Vec<String> = rows.iter().map(|row| row.join(" ")).collect();
            lines.sort();
            lines.dedup();
            lines
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_projection() {
        assert_eq!(project(&QueryResult::Boolean(true)), vec!["TRUE"]);
        assert_eq!(project(&QueryResult::Boolean(false)), vec!["FALSE"]);
    }

    #[test]
    fn test_statements_sorted_numerically() {
        let result = QueryResult::Stmts([10, 2, 1].into_iter().collect());
        assert_eq!(project(&result), vec!["1", "2", "10"]);
    }

    #[test]
    fn test_tuples_space_joined() {
        let result = QueryResult::Tuples(vec![
            vec!["3".to_string(), "x".to_string()],
            vec!["1".to_string(), "y".to_string()],
        ]);
        assert_eq!(project(&result), vec!["1 y", "3 x"]);
    }
}
