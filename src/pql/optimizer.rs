// SPDX-License-Identifier: PMPL-1.0-or-later

//! Clause rewrites before evaluation and table grouping before the merge

use crate::pql::query::Clause;
use crate::pql::table::{Database, ResultTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// The four independent optimizer toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub dedup_clauses: bool,
    pub sort_clauses: bool,
    pub group_before_merge: bool,
    pub sort_before_bfs: bool,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self::enabled()
    }
}

impl OptimizerSettings {
    pub fn enabled() -> Self {
        Self {
            dedup_clauses: true,
            sort_clauses: true,
            group_before_merge: true,
            sort_before_bfs: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            dedup_clauses: false,
            sort_clauses: false,
            group_before_merge: false,
            sort_before_bfs: false,
        }
    }

    pub fn from_flag(optimize: bool) -> Self {
        if optimize {
            Self::enabled()
        } else {
            Self::disabled()
        }
    }
}

/// Drop structurally identical clauses, keeping the first occurrence
pub fn dedup_clauses(clauses: &[Clause]) -> Vec<Clause> {
    let mut unique: Vec<Clause> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        if !unique.contains(clause) {
            unique.push(clause.clone());
        }
    }
    unique
}

/// Fewest synonyms first, then with < such that < pattern; stable
pub fn sort_clauses(mut clauses: Vec<Clause>) -> Vec<Clause> {
    clauses.sort_by_key(|clause| (clause.synonyms().len(), clause.rank()));
    clauses
}

pub fn rewrite(clauses: &[Clause], settings: &OptimizerSettings) -> Vec<Clause> {
    let mut rewritten = if settings.dedup_clauses {
        dedup_clauses(clauses)
    } else {
        clauses.to_vec()
    };
    if settings.sort_clauses {
        rewritten = sort_clauses(rewritten);
    }
    if rewritten.len() != clauses.len() {
        debug!(before = clauses.len(), after = rewritten.len(), "deduplicated clauses");
    }
    rewritten
}

/// Merge tables into one table per connected component, where two tables
/// are connected when they share a synonym
pub fn group_tables(database: Database, sort_by_height: bool) -> Vec<ResultTable> {
    let adjacency = adjacency(&database);

    let mut seeds: Vec<usize> = (0..database.len()).collect();
    if sort_by_height {
        seeds.sort_by_key(|index| database[*index].height());
    }

    let mut visited = vec![false; database.len()];
    let mut groups = Vec::new();
    for seed in seeds {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;

        let mut merged = database[seed].clone();
        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            if current != seed {
                merged = merged.inner_join(&database[current]);
            }
            let mut neighbours: Vec<usize> = adjacency[current]
                .iter()
                .copied()
                .filter(|n| !visited[*n])
                .collect();
            if sort_by_height {
                neighbours.sort_by_key(|index| database[*index].height());
            }
            for neighbour in neighbours {
                visited[neighbour] = true;
                queue.push_back(neighbour);
            }
        }
        groups.push(merged);
    }

    debug!(tables = database.len(), groups = groups.len(), "grouped result tables");
    groups
}

/// Fold every table into one, left to right
pub fn merge_all(database: Database) -> Vec<ResultTable> {
    let mut tables = database.into_iter();
    let Some(first) = tables.next() else {
        return Vec::new();
    };
    vec![tables.fold(first, |merged, table| merged.inner_join(&table))]
}

fn adjacency(database: &Database) -> Vec<BTreeSet<usize>> {
    let mut adjacency = vec![BTreeSet::new(); database.len()];
    let mut seen: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, table) in database.iter().enumerate() {
        for synonym in table.synonyms() {
            let earlier = seen.entry(synonym).or_default();
            for other in earlier.iter() {
                adjacency[index].insert(*other);
                adjacency[*other].insert(index);
            }
            earlier.push(index);
        }
    }
    adjacency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pql::query::{ClauseParam, DesignEntity};
    use crate::types::{AttributeType, EntityType, Relation, TableElement};

    fn follows(lhs: ClauseParam, rhs: ClauseParam) -> Clause {
        Clause::SuchThat {
            relation: Relation::Follows,
            lhs,
            rhs,
        }
    }

    fn syn(name: &str) -> ClauseParam {
        ClauseParam::Entity(DesignEntity::new(EntityType::Stmt, name))
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let clauses = vec![
            follows(syn("s"), ClauseParam::Index(3)),
            follows(syn("s"), syn("t")),
            follows(syn("s"), ClauseParam::Index(3)),
        ];
        let once = dedup_clauses(&clauses);
        assert_eq!(once.len(), 2);
        assert_eq!(dedup_clauses(&once), once);
    }

    #[test]
    fn test_sort_by_synonyms_then_rank() {
        let pattern = Clause::Pattern {
            entity: DesignEntity::new(EntityType::Assign, "a"),
            lhs: ClauseParam::Wildcard,
            rhs: ClauseParam::Wildcard,
        };
        let with = Clause::With {
            lhs: syn("s"),
            lhs_attribute: Some(AttributeType::StmtNo),
            rhs: ClauseParam::Index(2),
            rhs_attribute: None,
        };
        let two = follows(syn("s"), syn("t"));
        let one = follows(syn("s"), ClauseParam::Wildcard);

        let sorted = sort_clauses(vec![two.clone(), pattern.clone(), one.clone(), with.clone()]);
        assert_eq!(sorted, vec![with, one, pattern, two]);
    }

    #[test]
    fn test_group_tables_by_component() {
        let stmt = |n| TableElement::Stmt(n);
        let database = vec![
            ResultTable::pair("a", "b", [(stmt(1), stmt(2)), (stmt(2), stmt(3))]),
            ResultTable::single("c", vec![stmt(7), stmt(8), stmt(9)]),
            ResultTable::single("b", vec![stmt(2)]),
        ];
        let groups = group_tables(database.clone(), true);
        assert_eq!(groups.len(), 2);
        let ab = groups.iter().find(|t| t.has("a")).unwrap();
        assert_eq!(ab.height(), 1);

        let naive = merge_all(database);
        assert_eq!(naive.len(), 1);
        assert_eq!(naive[0].height(), 3);
    }
}
