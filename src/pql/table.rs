// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-memory relations used during query evaluation
//!
//! A [`ResultTable`] maps synonyms to equally long columns; row `i` across
//! all columns is one consistent joint binding. Row order carries no meaning.

use crate::types::TableElement;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type Column = Vec<TableElement>;

/// One joint binding, used only while building tables
pub type Row = BTreeMap<String, TableElement>;

/// Tables accumulated clause by clause before the final merge
pub type Database = Vec<ResultTable>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    columns: BTreeMap<String, Column>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(synonym: &str, values: Column) -> Self {
        let mut columns = BTreeMap::new();
        columns.insert(synonym.to_string(), values);
        Self { columns }
    }

    pub fn pair(lhs: &str, rhs: &str, rows: impl IntoIterator<Item = (TableElement, TableElement)>) -> Self {
        let (left, right): (Column, Column) = rows.into_iter().unzip();
        let mut columns = BTreeMap::new();
        columns.insert(lhs.to_string(), left);
        columns.insert(rhs.to_string(), right);
        Self { columns }
    }

    fn from_rows(synonyms: &[String], rows: impl IntoIterator<Item = Vec<TableElement>>) -> Self {
        let mut columns: BTreeMap<String, Column> =
            synonyms.iter().map(|s| (s.clone(), Vec::new())).collect();
        for row in rows {
            for (synonym, value) in synonyms.iter().zip(row) {
                if let Some(column) = columns.get_mut(synonym) {
                    column.push(value);
                }
            }
        }
        Self { columns }
    }

    pub fn height(&self) -> usize {
        self.columns.values().next().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn synonyms(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has(&self, synonym: &str) -> bool {
        self.columns.contains_key(synonym)
    }

    pub fn column(&self, synonym: &str) -> Option<&Column> {
        self.columns.get(synonym)
    }

    /// Distinct values bound to a synonym, in ascending order
    pub fn distinct(&self, synonym: &str) -> Vec<TableElement> {
        self.column(synonym)
            .map(|column| column.iter().cloned().collect::<BTreeSet<_>>())
            .unwrap_or_default()
            .into_iter()
            .collect()
    }

    pub fn row(&self, index: usize) -> Row {
        self.columns
            .iter()
            .filter_map(|(synonym, column)| column.get(index).map(|v| (synonym.clone(), v.clone())))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.height()).map(|index| self.row(index))
    }

    /// Keep only the given synonyms, dropping duplicate rows
    pub fn project(&self, synonyms: &[String]) -> ResultTable {
        let kept: Vec<String> = synonyms.iter().filter(|s| self.has(s)).cloned().collect();
        let rows: BTreeSet<Vec<TableElement>> = (0..self.height())
            .map(|index| {
                kept.iter()
                    .filter_map(|s| self.columns.get(s).and_then(|c| c.get(index)).cloned())
                    .collect()
            })
            .collect();
        Self::from_rows(&kept, rows)
    }

    pub fn shares_synonym_with(&self, other: &ResultTable) -> bool {
        self.synonyms().any(|s| other.has(s))
    }

    /// Every row of `self` paired with every row of `other`
    pub fn cross_join(&self, other: &ResultTable) -> ResultTable {
        if self.columns.is_empty() {
            return other.clone();
        }
        if other.columns.is_empty() {
            return self.clone();
        }

        let mut columns: BTreeMap<String, Column> = BTreeMap::new();
        let (left_height, right_height) = (self.height(), other.height());
        for (synonym, column) in &self.columns {
            let repeated = column
                .iter()
                .flat_map(|value| std::iter::repeat(value).take(right_height))
                .cloned()
                .collect();
            columns.insert(synonym.clone(), repeated);
        }
        for (synonym, column) in &other.columns {
            let tiled = (0..left_height).flat_map(|_| column.iter()).cloned().collect();
            columns.insert(synonym.clone(), tiled);
        }
        ResultTable { columns }
    }

    /// Equi-join on every shared synonym; falls back to a cross join
    pub fn inner_join(&self, other: &ResultTable) -> ResultTable {
        let shared: Vec<&str> = self.synonyms().filter(|s| other.has(s)).collect();
        if shared.is_empty() {
            return self.cross_join(other);
        }

        let key_of = |table: &ResultTable, index: usize| -> Vec<TableElement> {
            shared
                .iter()
                .filter_map(|s| table.columns.get(*s).and_then(|c| c.get(index)).cloned())
                .collect()
        };

        let mut buckets: HashMap<Vec<TableElement>, Vec<usize>> = HashMap::new();
        for index in 0..other.height() {
            buckets.entry(key_of(other, index)).or_default().push(index);
        }

        let extra: Vec<&String> = other.columns.keys().filter(|s| !self.has(s)).collect();
        let mut synonyms: Vec<String> = self.columns.keys().cloned().collect();
        synonyms.extend(extra.iter().map(|s| (*s).clone()));

        let mut rows = Vec::new();
        for left in 0..self.height() {
            let Some(matches) = buckets.get(&key_of(self, left)) else {
                continue;
            };
            for right in matches {
                let mut row: Vec<TableElement> = self
                    .columns
                    .values()
                    .filter_map(|c| c.get(left).cloned())
                    .collect();
                row.extend(
                    extra
                        .iter()
                        .filter_map(|s| other.columns.get(*s).and_then(|c| c.get(*right)).cloned()),
                );
                rows.push(row);
            }
        }
        Self::from_rows(&synonyms, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts(values: &[usize]) -> Column {
        values.iter().map(|v| TableElement::Stmt(*v)).collect()
    }

    fn two_columns(w: &[usize], a: &[usize]) -> ResultTable {
        ResultTable::pair(
            "w",
            "a",
            stmts(w).into_iter().zip(stmts(a)),
        )
    }

    #[test]
    fn test_inner_join_on_two_shared_columns() {
        let left = two_columns(&[1, 1, 2], &[2, 3, 4]);
        let right = two_columns(&[1, 2, 2], &[2, 3, 4]);
        let joined = left.inner_join(&right);

        assert_eq!(joined.height(), 2);
        let rows: BTreeSet<(TableElement, TableElement)> = joined
            .rows()
            .map(|row| (row["w"].clone(), row["a"].clone()))
            .collect();
        assert!(rows.contains(&(TableElement::Stmt(1), TableElement::Stmt(2))));
        assert!(rows.contains(&(TableElement::Stmt(2), TableElement::Stmt(4))));
    }

    #[test]
    fn test_inner_join_fans_out_duplicate_keys() {
        let left = ResultTable::pair("s", "v", [
            (TableElement::Stmt(1), TableElement::name("x")),
            (TableElement::Stmt(2), TableElement::name("x")),
        ]);
        let right = ResultTable::pair("v", "p", [
            (TableElement::name("x"), TableElement::name("main")),
            (TableElement::name("x"), TableElement::name("sub")),
        ]);
        let joined = left.inner_join(&right);
        assert_eq!(joined.height(), 4);
        assert_eq!(joined.synonyms().collect::<Vec<_>>(), vec!["p", "s", "v"]);
    }

    #[test]
    fn test_cross_join_sizes() {
        let left = ResultTable::single("a", stmts(&[1, 2, 3]));
        let right = ResultTable::single("b", stmts(&[4, 5]));
        let crossed = left.cross_join(&right);

        assert_eq!(crossed.height(), 6);
        let combos: BTreeSet<(TableElement, TableElement)> = crossed
            .rows()
            .map(|row| (row["a"].clone(), row["b"].clone()))
            .collect();
        assert_eq!(combos.len(), 6);
    }

    #[test]
    fn test_join_without_shared_synonyms_is_cross_join() {
        let left = ResultTable::single("a", stmts(&[1, 2]));
        let right = ResultTable::single("b", stmts(&[3, 4]));
        assert_eq!(left.inner_join(&right), left.cross_join(&right));
    }

    #[test]
    fn test_project_drops_duplicates() {
        let table = two_columns(&[1, 1, 2], &[2, 3, 4]);
        let projected = table.project(&["w".to_string()]);
        assert_eq!(projected.height(), 2);
        assert_eq!(table.distinct("w"), stmts(&[1, 2]));
    }

    #[test]
    fn test_cross_join_with_empty_table_is_empty() {
        let left = ResultTable::single("a", stmts(&[1, 2]));
        let right = ResultTable::single("b", Vec::new());
        assert!(left.cross_join(&right).is_empty());
    }
}
