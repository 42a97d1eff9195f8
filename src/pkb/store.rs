// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-memory program knowledge base
//!
//! Every relation lives in its own [`RelationTable`]; the tables are
//! selected with an exhaustive match so a new [`Relation`] variant cannot be
//! queried before it is stored.

use crate::pkb::KnowledgeBase;
use crate::types::{EntityType, Relation, StatementKind, TableElement};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Set of `(lhs, rhs)` facts for one relation
#[derive(Debug, Clone, Default)]
pub(crate) struct RelationTable {
    pairs: HashSet<(TableElement, TableElement)>,
}

impl RelationTable {
    pub fn insert(&mut self, lhs: TableElement, rhs: TableElement) {
        self.pairs.insert((lhs, rhs));
    }

    pub fn contains(&self, lhs: &TableElement, rhs: &TableElement) -> bool {
        // HashSet<(A, B)> cannot be probed with borrowed halves
        self.pairs.contains(&(lhs.clone(), rhs.clone()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

#[derive(Debug, Clone, Default)]
struct RelationTables {
    follows: RelationTable,
    follows_t: RelationTable,
    parent: RelationTable,
    parent_t: RelationTable,
    uses: RelationTable,
    modifies: RelationTable,
    calls: RelationTable,
    calls_t: RelationTable,
    next: RelationTable,
    next_t: RelationTable,
    affects: RelationTable,
    affects_t: RelationTable,
    next_bip: RelationTable,
    next_bip_t: RelationTable,
    affects_bip: RelationTable,
    affects_bip_t: RelationTable,
}

impl RelationTables {
    fn get(&self, relation: Relation) -> &RelationTable {
        match relation {
            Relation::Follows => &self.follows,
            Relation::FollowsT => &self.follows_t,
            Relation::Parent => &self.parent,
            Relation::ParentT => &self.parent_t,
            Relation::Uses => &self.uses,
            Relation::Modifies => &self.modifies,
            Relation::Calls => &self.calls,
            Relation::CallsT => &self.calls_t,
            Relation::Next => &self.next,
            Relation::NextT => &self.next_t,
            Relation::Affects => &self.affects,
            Relation::AffectsT => &self.affects_t,
            Relation::NextBip => &self.next_bip,
            Relation::NextBipT => &self.next_bip_t,
            Relation::AffectsBip => &self.affects_bip,
            Relation::AffectsBipT => &self.affects_bip_t,
        }
    }

    fn get_mut(&mut self, relation: Relation) -> &mut RelationTable {
        match relation {
            Relation::Follows => &mut self.follows,
            Relation::FollowsT => &mut self.follows_t,
            Relation::Parent => &mut self.parent,
            Relation::ParentT => &mut self.parent_t,
            Relation::Uses => &mut self.uses,
            Relation::Modifies => &mut self.modifies,
            Relation::Calls => &mut self.calls,
            Relation::CallsT => &mut self.calls_t,
            Relation::Next => &mut self.next,
            Relation::NextT => &mut self.next_t,
            Relation::Affects => &mut self.affects,
            Relation::AffectsT => &mut self.affects_t,
            Relation::NextBip => &mut self.next_bip,
            Relation::NextBipT => &mut self.next_bip_t,
            Relation::AffectsBip => &mut self.affects_bip,
            Relation::AffectsBipT => &mut self.affects_bip_t,
        }
    }
}

/// The fact database populated by the design extractor
#[derive(Debug, Clone, Default)]
pub struct Pkb {
    statements: BTreeMap<usize, StatementKind>,
    variables: BTreeSet<String>,
    procedures: BTreeSet<String>,
    constants: BTreeSet<String>,
    relations: RelationTables,
    assign_rpn: HashMap<usize, Vec<String>>,
    condition_variables: HashMap<usize, BTreeSet<String>>,
    called_procedures: HashMap<usize, String>,
    io_variables: HashMap<usize, String>,
}

impl Pkb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_statement(&mut self, number: usize, kind: StatementKind) {
        self.statements.insert(number, kind);
    }

    pub fn insert_variable(&mut self, name: &str) {
        self.variables.insert(name.to_string());
    }

    pub fn insert_procedure(&mut self, name: &str) {
        self.procedures.insert(name.to_string());
    }

    pub fn insert_constant(&mut self, literal: &str) {
        self.constants.insert(literal.to_string());
    }

    pub fn insert_relation(&mut self, relation: Relation, lhs: TableElement, rhs: TableElement) {
        self.relations.get_mut(relation).insert(lhs, rhs);
    }

    pub fn set_assign_rpn(&mut self, stmt: usize, rpn: Vec<String>) {
        self.assign_rpn.insert(stmt, rpn);
    }

    pub fn set_condition_variables(&mut self, stmt: usize, variables: BTreeSet<String>) {
        self.condition_variables.insert(stmt, variables);
    }

    pub fn set_called_procedure(&mut self, stmt: usize, procedure: &str) {
        self.called_procedures.insert(stmt, procedure.to_string());
    }

    /// Variable read into, or printed, by a read/print statement
    pub fn set_io_variable(&mut self, stmt: usize, variable: &str) {
        self.io_variables.insert(stmt, variable.to_string());
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    fn io_variable_of(&self, stmt: usize, kind: StatementKind) -> Option<&str> {
        if self.statements.get(&stmt) == Some(&kind) {
            self.io_variables.get(&stmt).map(String::as_str)
        } else {
            None
        }
    }
}

impl KnowledgeBase for Pkb {
    fn entities(&self, entity: EntityType) -> Vec<TableElement> {
        match entity {
            EntityType::Variable => self.variables.iter().map(TableElement::name).collect(),
            EntityType::Procedure => self.procedures.iter().map(TableElement::name).collect(),
            EntityType::Constant => self.constants.iter().map(TableElement::name).collect(),
            statement => self
                .statements
                .iter()
                .filter(|(_, kind)| statement.admits(**kind))
                .map(|(number, _)| TableElement::Stmt(*number))
                .collect(),
        }
    }

    fn holds(&self, relation: Relation, lhs: &TableElement, rhs: &TableElement) -> bool {
        self.relations.get(relation).contains(lhs, rhs)
    }

    fn assign_rpn(&self, stmt: usize) -> Option<&[String]> {
        self.assign_rpn.get(&stmt).map(Vec::as_slice)
    }

    fn condition_variables(&self, stmt: usize) -> Vec<String> {
        self.condition_variables
            .get(&stmt)
            .map(|vars| vars.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn called_procedure(&self, stmt: usize) -> Option<&str> {
        self.called_procedures.get(&stmt).map(String::as_str)
    }

    fn read_variable(&self, stmt: usize) -> Option<&str> {
        self.io_variable_of(stmt, StatementKind::Read)
    }

    fn printed_variable(&self, stmt: usize) -> Option<&str> {
        self.io_variable_of(stmt, StatementKind::Print)
    }

    fn relation_size(&self, relation: Relation) -> usize {
        self.relations.get(relation).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_filter_by_kind() {
        let mut pkb = Pkb::new();
        pkb.insert_statement(1, StatementKind::Assign);
        pkb.insert_statement(2, StatementKind::While);
        pkb.insert_statement(3, StatementKind::Assign);

        assert_eq!(pkb.entities(EntityType::Stmt).len(), 3);
        assert_eq!(
            pkb.entities(EntityType::Assign),
            vec![TableElement::Stmt(1), TableElement::Stmt(3)]
        );
        assert!(pkb.entities(EntityType::If).is_empty());
    }

    #[test]
    fn test_relation_lookup() {
        let mut pkb = Pkb::new();
        pkb.insert_relation(Relation::Follows, TableElement::Stmt(1), TableElement::Stmt(2));

        assert!(pkb.holds(Relation::Follows, &TableElement::Stmt(1), &TableElement::Stmt(2)));
        assert!(!pkb.holds(Relation::Follows, &TableElement::Stmt(2), &TableElement::Stmt(1)));
        assert!(!pkb.holds(Relation::FollowsT, &TableElement::Stmt(1), &TableElement::Stmt(2)));
        assert_eq!(pkb.relation_size(Relation::Follows), 1);
    }

    #[test]
    fn test_io_variable_respects_kind() {
        let mut pkb = Pkb::new();
        pkb.insert_statement(4, StatementKind::Read);
        pkb.set_io_variable(4, "x");
        assert_eq!(pkb.read_variable(4), Some("x"));
        assert_eq!(pkb.printed_variable(4), None);
    }
}
