// SPDX-License-Identifier: PMPL-1.0-or-later

//! Control flow graphs
//!
//! One intra-procedural graph per procedure (the `Next` relation) plus the
//! call/return structure needed for the interprocedural `Bip` relations.
//! Interprocedural walks carry an explicit call stack so control only
//! returns to the call site it came from.

use crate::simple::ast::{NodeKind, TNode};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

type Stack = Vec<usize>;

#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    next: BTreeMap<usize, BTreeSet<usize>>,
    procedure_of: BTreeMap<usize, String>,
    first: BTreeMap<String, usize>,
    exits: BTreeMap<String, BTreeSet<usize>>,
    callee: BTreeMap<usize, String>,
}

impl ControlFlowGraph {
    pub fn build(program: &TNode) -> Self {
        let mut cfg = Self::default();
        for procedure in program.children() {
            let name = procedure.value().unwrap_or_default().to_string();
            let Some(body) = procedure.child(0) else {
                continue;
            };
            if let Some(first) = first_statement(body) {
                cfg.first.insert(name.clone(), first);
            }
            cfg.exits.entry(name.clone()).or_default();
            cfg.link(body, None, &name);
        }
        cfg
    }

    /// Wire a statement list; `after` is where control goes once the list ends
    fn link(&mut self, list: &TNode, after: Option<usize>, procedure: &str) {
        let statements = list.children();
        for (index, statement) in statements.iter().enumerate() {
            let Some(number) = statement.statement_number() else {
                continue;
            };
            self.procedure_of.insert(number, procedure.to_string());
            self.next.entry(number).or_default();

            let follower = statements
                .get(index + 1)
                .and_then(TNode::statement_number)
                .or(after);

            match statement.kind() {
                NodeKind::While => {
                    if let Some(body) = statement.child(1) {
                        if let Some(first) = first_statement(body) {
                            self.add_edge(number, first);
                        }
                        self.link(body, Some(number), procedure);
                    }
                    self.leave(number, follower, procedure);
                }
                NodeKind::If => {
                    for branch in statement.children().iter().skip(1) {
                        if let Some(first) = first_statement(branch) {
                            self.add_edge(number, first);
                        }
                        self.link(branch, follower, procedure);
                    }
                }
                kind => {
                    if kind == NodeKind::Call {
                        if let Some(callee) = statement.value() {
                            self.callee.insert(number, callee.to_string());
                        }
                    }
                    self.leave(number, follower, procedure);
                }
            }
        }
    }

    fn leave(&mut self, from: usize, follower: Option<usize>, procedure: &str) {
        match follower {
            Some(to) => self.add_edge(from, to),
            None => {
                self.exits
                    .entry(procedure.to_string())
                    .or_default()
                    .insert(from);
            }
        }
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        self.next.entry(from).or_default().insert(to);
    }

    pub fn statements(&self) -> impl Iterator<Item = usize> + '_ {
        self.next.keys().copied()
    }

    pub fn successors(&self, stmt: usize) -> impl Iterator<Item = usize> + '_ {
        self.next
            .get(&stmt)
            .into_iter()
            .flat_map(|succ| succ.iter().copied())
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.next
            .iter()
            .flat_map(|(from, to)| to.iter().map(move |t| (*from, *t)))
    }

    pub fn callee_of(&self, stmt: usize) -> Option<&str> {
        self.callee.get(&stmt).map(String::as_str)
    }

    /// Statements reachable through one or more `Next` edges
    pub fn reachable_from(&self, start: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<usize> = self.successors(start).collect();
        while let Some(stmt) = queue.pop_front() {
            if seen.insert(stmt) {
                queue.extend(self.successors(stmt));
            }
        }
        seen
    }

    /// Last statements executed in a procedure, looking through trailing calls
    pub fn terminal_statements(&self, procedure: &str) -> BTreeSet<usize> {
        let mut terminals = BTreeSet::new();
        for exit in self.exits.get(procedure).into_iter().flatten() {
            match self.callee_of(*exit) {
                Some(callee) => terminals.extend(self.terminal_statements(callee)),
                None => {
                    terminals.insert(*exit);
                }
            }
        }
        terminals
    }

    /// Direct interprocedural edges: calls branch into the callee and the
    /// callee's terminal statements branch back to the call's successors
    pub fn bip_edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (from, successors) in &self.next {
            match self.callee_of(*from) {
                Some(callee) => {
                    if let Some(first) = self.first.get(callee) {
                        edges.push((*from, *first));
                    }
                    let terminals = self.terminal_statements(callee);
                    for to in successors {
                        edges.extend(terminals.iter().map(|t| (*t, *to)));
                    }
                }
                None => edges.extend(successors.iter().map(|to| (*from, *to))),
            }
        }
        edges
    }

    /// Visit every (statement, call stack) state reachable from `start`
    /// along interprocedural paths
    ///
    /// `visit` returns whether the walk continues past the visited statement.
    pub fn bip_walk<F>(&self, start: usize, mut visit: F)
    where
        F: FnMut(usize) -> bool,
    {
        let mut seen: HashSet<(usize, Stack)> = HashSet::new();
        let mut queue: VecDeque<(usize, Stack)> = self.bip_step(start, Vec::new()).into();

        while let Some(state) = queue.pop_front() {
            if !seen.insert(state.clone()) {
                continue;
            }
            let (stmt, stack) = state;
            if visit(stmt) {
                queue.extend(self.bip_step(stmt, stack));
            }
        }
    }

    /// Statements reachable from `start` along interprocedural paths
    pub fn bip_reachable_from(&self, start: usize) -> BTreeSet<usize> {
        let mut reached = BTreeSet::new();
        self.bip_walk(start, |stmt| {
            reached.insert(stmt);
            true
        });
        reached
    }

    fn bip_step(&self, stmt: usize, stack: Stack) -> Vec<(usize, Stack)> {
        if let Some(callee) = self.callee_of(stmt) {
            if let Some(first) = self.first.get(callee) {
                let mut inner = stack;
                inner.push(stmt);
                return vec![(*first, inner)];
            }
        }
        self.continue_after(stmt, stack)
    }

    fn continue_after(&self, stmt: usize, stack: Stack) -> Vec<(usize, Stack)> {
        let mut states: Vec<(usize, Stack)> = self
            .successors(stmt)
            .map(|succ| (succ, stack.clone()))
            .collect();

        if let Some(procedure) = self.procedure_of.get(&stmt) {
            let is_exit = self
                .exits
                .get(procedure)
                .is_some_and(|exits| exits.contains(&stmt));
            if is_exit {
                states.extend(self.unwind(procedure, stack));
            }
        }
        states
    }

    /// Leave `procedure`: return to the call on top of the stack, or to every
    /// call site when the walk started inside the procedure
    fn unwind(&self, procedure: &str, mut stack: Stack) -> Vec<(usize, Stack)> {
        match stack.pop() {
            Some(call) => self.continue_after(call, stack),
            None => self
                .callee
                .iter()
                .filter(|(_, callee)| callee.as_str() == procedure)
                .flat_map(|(call, _)| self.continue_after(*call, Vec::new()))
                .collect(),
        }
    }
}

fn first_statement(list: &TNode) -> Option<usize> {
    list.children().first().and_then(TNode::statement_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::parse;

    fn cfg(source: &str) -> ControlFlowGraph {
        ControlFlowGraph::build(&parse(source).unwrap())
    }

    #[test]
    fn test_while_loops_back() {
        let graph = cfg("procedure p { while (x > 0) { x = x - 1; y = y + 1; } print y; }");
        let edges: BTreeSet<_> = graph.edges().collect();
        assert!(edges.contains(&(1, 2)));
        assert!(edges.contains(&(3, 1)));
        assert!(edges.contains(&(1, 4)));
        assert!(!edges.contains(&(3, 4)));
    }

    #[test]
    fn test_if_branches_rejoin() {
        let graph = cfg("procedure p { if (x > 0) then { x = 1; } else { x = 2; } print x; }");
        let edges: BTreeSet<_> = graph.edges().collect();
        assert_eq!(
            edges,
            [(1, 2), (1, 3), (2, 4), (3, 4)].into_iter().collect()
        );
    }

    #[test]
    fn test_reachable_in_loop_includes_self() {
        let graph = cfg("procedure p { while (x > 0) { x = x - 1; } }");
        assert!(graph.reachable_from(2).contains(&2));
        assert!(graph.reachable_from(1).contains(&1));
    }

    #[test]
    fn test_bip_edges_enter_and_return() {
        let graph = cfg(
            "procedure a { call b; print x; }
             procedure b { if (x > 0) then { x = 1; } else { x = 2; } }",
        );
        let edges: BTreeSet<_> = graph.bip_edges().into_iter().collect();
        assert!(edges.contains(&(1, 3)));
        assert!(edges.contains(&(4, 2)));
        assert!(edges.contains(&(5, 2)));
        assert!(!edges.contains(&(1, 2)));
    }

    #[test]
    fn test_bip_walk_returns_to_matching_call_site() {
        let graph = cfg(
            "procedure a { call c; x = 1; }
             procedure b { call c; y = 1; }
             procedure c { z = 1; }",
        );
        let reached = graph.bip_reachable_from(1);
        assert!(reached.contains(&5));
        assert!(reached.contains(&2));
        assert!(!reached.contains(&4));

        // starting inside the callee, control may return to either caller
        let reached = graph.bip_reachable_from(5);
        assert!(reached.contains(&2));
        assert!(reached.contains(&4));
    }
}
