// SPDX-License-Identifier: PMPL-1.0-or-later

//! Procedure call graph and its whole-program checks

use crate::error::{SpaError, SpaResult};
use crate::simple::ast::{NodeKind, TNode};
use std::collections::{BTreeMap, BTreeSet};

/// Declared procedures mapped to the procedures they call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure; returns `false` if it was already declared
    pub fn declare(&mut self, procedure: &str) -> bool {
        if self.edges.contains_key(procedure) {
            return false;
        }
        self.edges.insert(procedure.to_string(), BTreeSet::new());
        true
    }

    pub fn add_call(&mut self, caller: &str, callee: &str) {
        self.edges
            .entry(caller.to_string())
            .or_default()
            .insert(callee.to_string());
    }

    /// Rebuild the graph from a parsed program
    pub fn from_program(program: &TNode) -> Self {
        let mut graph = Self::new();
        for procedure in program.children() {
            let name = procedure.value().unwrap_or_default();
            graph.declare(name);
            collect_calls(procedure, name, &mut graph);
        }
        graph
    }

    pub fn procedures(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn callees(&self, procedure: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(procedure)
            .into_iter()
            .flat_map(|callees| callees.iter().map(String::as_str))
    }

    /// Every callee must be a declared procedure
    pub fn validate_declared(&self) -> SpaResult<()> {
        for (caller, callees) in &self.edges {
            if let Some(missing) = callees.iter().find(|c| !self.edges.contains_key(*c)) {
                return Err(SpaError::validation(format!(
                    "procedure '{}' calls undeclared procedure '{}'",
                    caller, missing
                )));
            }
        }
        Ok(())
    }

    /// Depth-first cycle detection over the call graph
    ///
    /// On success returns the procedures ordered so that every caller comes
    /// before all of its callees.
    pub fn validate_non_recursive_calls(&self) -> SpaResult<Vec<String>> {
        let mut visiting = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut finished = Vec::with_capacity(self.edges.len());

        for procedure in self.edges.keys() {
            self.visit(procedure, &mut visiting, &mut visited, &mut finished)?;
        }

        finished.reverse();
        Ok(finished)
    }

    fn visit<'a>(
        &'a self,
        procedure: &'a str,
        visiting: &mut BTreeSet<&'a str>,
        visited: &mut BTreeSet<&'a str>,
        finished: &mut Vec<String>,
    ) -> SpaResult<()> {
        if visited.contains(procedure) {
            return Ok(());
        }
        if !visiting.insert(procedure) {
            return Err(SpaError::validation(format!(
                "recursive call cycle through procedure '{}'",
                procedure
            )));
        }

        for callee in self.callees(procedure) {
            if visiting.contains(callee) {
                return Err(SpaError::validation(format!(
                    "recursive call from '{}' to '{}'",
                    procedure, callee
                )));
            }
            self.visit(callee, visiting, visited, finished)?;
        }

        visiting.remove(procedure);
        visited.insert(procedure);
        finished.push(procedure.to_string());
        Ok(())
    }
}

fn collect_calls(node: &TNode, caller: &str, graph: &mut CallGraph) {
    if node.kind() == NodeKind::Call {
        if let Some(callee) = node.value() {
            graph.add_call(caller, callee);
        }
    }
    for child in node.children() {
        collect_calls(child, caller, graph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str], close_cycle: bool) -> CallGraph {
        let mut graph = CallGraph::new();
        for name in names {
            graph.declare(name);
        }
        for pair in names.windows(2) {
            graph.add_call(pair[0], pair[1]);
        }
        if close_cycle {
            graph.add_call(names[names.len() - 1], names[0]);
        }
        graph
    }

    #[test]
    fn test_cycle_detected() {
        let graph = chain(&["A", "B", "C", "D"], true);
        assert!(matches!(
            graph.validate_non_recursive_calls(),
            Err(SpaError::Validation(_))
        ));
    }

    #[test]
    fn test_dag_ordering() {
        let graph = chain(&["A", "B", "C", "D"], false);
        let order = graph.validate_non_recursive_calls().unwrap();
        let position = |name: &str| order.iter().position(|p| p == name).unwrap();
        assert!(position("A") < position("B"));
        assert!(position("B") < position("C"));
        assert!(position("C") < position("D"));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut graph = CallGraph::new();
        for name in ["top", "left", "right", "bottom"] {
            graph.declare(name);
        }
        graph.add_call("top", "left");
        graph.add_call("top", "right");
        graph.add_call("left", "bottom");
        graph.add_call("right", "bottom");
        assert_eq!(graph.validate_non_recursive_calls().unwrap().len(), 4);
    }

    #[test]
    fn test_self_call_is_recursive() {
        let mut graph = CallGraph::new();
        graph.declare("loop");
        graph.add_call("loop", "loop");
        assert!(graph.validate_non_recursive_calls().is_err());
    }

    #[test]
    fn test_undeclared_callee() {
        let mut graph = CallGraph::new();
        graph.declare("main");
        graph.add_call("main", "ghost");
        assert!(graph.validate_declared().is_err());
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut graph = CallGraph::new();
        assert!(graph.declare("main"));
        assert!(!graph.declare("main"));
    }
}
