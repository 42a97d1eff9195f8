// SPDX-License-Identifier: PMPL-1.0-or-later

//! Program knowledge base
//!
//! Provides:
//! - **Fact store** holding entities and every design abstraction
//! - **Design extractor** populating the store from a parsed program
//! - **Control flow graphs** for `Next`, `Affects` and their `Bip` forms
//!
//! The query evaluator only ever sees the read-only [`KnowledgeBase`] trait.

pub mod cfg;
pub mod extractor;
pub mod store;

pub use cfg::ControlFlowGraph;
pub use extractor::extract;
pub use store::Pkb;

use crate::types::{EntityType, Relation, TableElement};

/// Read-only interface the query evaluator depends on
pub trait KnowledgeBase {
    /// Every value of an entity type, in ascending order
    fn entities(&self, entity: EntityType) -> Vec<TableElement>;

    fn holds(&self, relation: Relation, lhs: &TableElement, rhs: &TableElement) -> bool;

    /// Postfix right-hand side of an assignment
    fn assign_rpn(&self, stmt: usize) -> Option<&[String]>;

    /// Variables in the condition of a while or if statement
    fn condition_variables(&self, stmt: usize) -> Vec<String>;

    fn called_procedure(&self, stmt: usize) -> Option<&str>;

    fn read_variable(&self, stmt: usize) -> Option<&str>;

    fn printed_variable(&self, stmt: usize) -> Option<&str>;

    /// Number of stored facts, zero when the program never produces one
    fn relation_size(&self, relation: Relation) -> usize;
}
