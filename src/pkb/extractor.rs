// SPDX-License-Identifier: PMPL-1.0-or-later

//! Design extractor: walks a validated AST and populates a [`Pkb`]

use crate::error::{SpaError, SpaResult};
use crate::pkb::cfg::ControlFlowGraph;
use crate::pkb::store::Pkb;
use crate::pkb::KnowledgeBase;
use crate::simple::ast::{NodeKind, TNode};
use crate::simple::call_graph::CallGraph;
use crate::types::{Relation, StatementKind, TableElement};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// Variables a statement (or procedure) uses and modifies
#[derive(Debug, Clone, Default)]
struct Effects {
    uses: BTreeSet<String>,
    modifies: BTreeSet<String>,
}

impl Effects {
    fn absorb(&mut self, other: &Effects) {
        self.uses.extend(other.uses.iter().cloned());
        self.modifies.extend(other.modifies.iter().cloned());
    }
}

/// Per-assignment data needed for the Affects family
#[derive(Debug, Clone)]
struct AssignFacts {
    target: String,
    used: BTreeSet<String>,
}

/// Populate a knowledge base from a `Program` node
pub fn extract(program: &TNode) -> SpaResult<Pkb> {
    if program.kind() != NodeKind::Program {
        return Err(SpaError::validation(format!(
            "design extraction needs a Program node, got {:?}",
            program.kind()
        )));
    }

    let call_graph = CallGraph::from_program(program);
    call_graph.validate_declared()?;
    let order = call_graph.validate_non_recursive_calls()?;

    let mut extractor = Extractor::default();
    let procedures: HashMap<&str, &TNode> = program
        .children()
        .iter()
        .filter_map(|p| p.value().map(|name| (name, p)))
        .collect();

    // Callees before callers so call statements can inherit callee effects
    for name in order.iter().rev() {
        if let Some(procedure) = procedures.get(name.as_str()) {
            extractor.visit_procedure(name, procedure);
        }
    }

    for (caller, callee) in call_graph
        .procedures()
        .flat_map(|p| call_graph.callees(p).map(move |c| (p, c)))
    {
        extractor.pkb.insert_relation(
            Relation::Calls,
            TableElement::name(caller),
            TableElement::name(callee),
        );
    }
    let calls: BTreeMap<String, BTreeSet<String>> = call_graph
        .procedures()
        .map(|p| (p.to_string(), call_graph.callees(p).map(String::from).collect()))
        .collect();
    for (caller, callee) in transitive_closure(&calls) {
        extractor.pkb.insert_relation(
            Relation::CallsT,
            TableElement::Name(caller),
            TableElement::Name(callee),
        );
    }

    let cfg = ControlFlowGraph::build(program);
    extractor.extract_flow(&cfg);

    let pkb = extractor.pkb;
    debug!(
        statements = pkb.statement_count(),
        follows = pkb.relation_size(Relation::Follows),
        parent = pkb.relation_size(Relation::Parent),
        next = pkb.relation_size(Relation::Next),
        affects = pkb.relation_size(Relation::Affects),
        "design extraction complete"
    );
    Ok(pkb)
}

#[derive(Default)]
struct Extractor {
    pkb: Pkb,
    procedure_effects: HashMap<String, Effects>,
    statement_effects: HashMap<usize, Effects>,
    assigns: BTreeMap<usize, AssignFacts>,
    reads: HashMap<usize, String>,
    calls: BTreeSet<usize>,
}

impl Extractor {
    fn visit_procedure(&mut self, name: &str, procedure: &TNode) {
        self.pkb.insert_procedure(name);
        let mut effects = Effects::default();
        if let Some(body) = procedure.child(0) {
            effects = self.visit_statement_list(body, &[]);
        }

        for variable in &effects.uses {
            self.pkb
                .insert_relation(Relation::Uses, TableElement::name(name), TableElement::name(variable));
        }
        for variable in &effects.modifies {
            self.pkb.insert_relation(
                Relation::Modifies,
                TableElement::name(name),
                TableElement::name(variable),
            );
        }
        self.procedure_effects.insert(name.to_string(), effects);
    }

    /// `ancestors` are the enclosing container statements, innermost last
    fn visit_statement_list(&mut self, list: &TNode, ancestors: &[usize]) -> Effects {
        let numbers: Vec<usize> = list
            .children()
            .iter()
            .filter_map(TNode::statement_number)
            .collect();

        for (index, earlier) in numbers.iter().enumerate() {
            if let Some(next) = numbers.get(index + 1) {
                self.pkb
                    .insert_relation(Relation::Follows, TableElement::Stmt(*earlier), TableElement::Stmt(*next));
            }
            for later in &numbers[index + 1..] {
                self.pkb
                    .insert_relation(Relation::FollowsT, TableElement::Stmt(*earlier), TableElement::Stmt(*later));
            }
        }

        let mut effects = Effects::default();
        for statement in list.children() {
            let statement_effects = self.visit_statement(statement, ancestors);
            effects.absorb(&statement_effects);
        }
        effects
    }

    fn visit_statement(&mut self, statement: &TNode, ancestors: &[usize]) -> Effects {
        let Some(number) = statement.statement_number() else {
            return Effects::default();
        };

        if let Some(parent) = ancestors.last() {
            self.pkb
                .insert_relation(Relation::Parent, TableElement::Stmt(*parent), TableElement::Stmt(number));
        }
        for ancestor in ancestors {
            self.pkb
                .insert_relation(Relation::ParentT, TableElement::Stmt(*ancestor), TableElement::Stmt(number));
        }

        let mut effects = Effects::default();
        match statement.kind() {
            NodeKind::Assign => {
                self.pkb.insert_statement(number, StatementKind::Assign);
                let target = statement
                    .child(0)
                    .and_then(TNode::value)
                    .unwrap_or_default()
                    .to_string();
                let expression = statement.child(1);
                let used = expression.map(TNode::variables).unwrap_or_default();
                for constant in expression.map(TNode::constants).unwrap_or_default() {
                    self.pkb.insert_constant(&constant);
                }
                if let Some(rpn) = statement.rpn() {
                    self.pkb.set_assign_rpn(number, rpn.to_vec());
                }
                effects.modifies.insert(target.clone());
                effects.uses.extend(used.iter().cloned());
                self.assigns.insert(number, AssignFacts { target, used });
            }
            NodeKind::Read | NodeKind::Print => {
                let variable = statement
                    .child(0)
                    .and_then(TNode::value)
                    .unwrap_or_default()
                    .to_string();
                self.pkb.set_io_variable(number, &variable);
                if statement.kind() == NodeKind::Read {
                    self.pkb.insert_statement(number, StatementKind::Read);
                    self.reads.insert(number, variable.clone());
                    effects.modifies.insert(variable);
                } else {
                    self.pkb.insert_statement(number, StatementKind::Print);
                    effects.uses.insert(variable);
                }
            }
            NodeKind::Call => {
                self.pkb.insert_statement(number, StatementKind::Call);
                self.calls.insert(number);
                let callee = statement.value().unwrap_or_default();
                self.pkb.set_called_procedure(number, callee);
                if let Some(callee_effects) = self.procedure_effects.get(callee) {
                    effects = callee_effects.clone();
                }
            }
            NodeKind::While | NodeKind::If => {
                let kind = if statement.kind() == NodeKind::While {
                    StatementKind::While
                } else {
                    StatementKind::If
                };
                self.pkb.insert_statement(number, kind);

                let condition = statement.child(0);
                let condition_vars = condition.map(TNode::variables).unwrap_or_default();
                for constant in condition.map(TNode::constants).unwrap_or_default() {
                    self.pkb.insert_constant(&constant);
                }
                effects.uses.extend(condition_vars.iter().cloned());
                self.pkb.set_condition_variables(number, condition_vars);

                let mut nested = ancestors.to_vec();
                nested.push(number);
                for branch in statement.children().iter().skip(1) {
                    let branch_effects = self.visit_statement_list(branch, &nested);
                    effects.absorb(&branch_effects);
                }
            }
            _ => {}
        }

        for variable in effects.uses.iter().chain(effects.modifies.iter()) {
            self.pkb.insert_variable(variable);
        }
        for variable in &effects.uses {
            self.pkb
                .insert_relation(Relation::Uses, TableElement::Stmt(number), TableElement::name(variable));
        }
        for variable in &effects.modifies {
            self.pkb.insert_relation(
                Relation::Modifies,
                TableElement::Stmt(number),
                TableElement::name(variable),
            );
        }
        self.statement_effects.insert(number, effects.clone());
        effects
    }

    /// Next, Affects and their transitive and interprocedural forms
    fn extract_flow(&mut self, cfg: &ControlFlowGraph) {
        for (from, to) in cfg.edges() {
            self.pkb
                .insert_relation(Relation::Next, TableElement::Stmt(from), TableElement::Stmt(to));
        }
        for from in cfg.statements() {
            for to in cfg.reachable_from(from) {
                self.pkb
                    .insert_relation(Relation::NextT, TableElement::Stmt(from), TableElement::Stmt(to));
            }
        }

        let affects = self.intra_affects(cfg);
        self.insert_with_closure(&affects, Relation::Affects, Relation::AffectsT);

        for (from, to) in cfg.bip_edges() {
            self.pkb
                .insert_relation(Relation::NextBip, TableElement::Stmt(from), TableElement::Stmt(to));
        }
        for from in cfg.statements() {
            for to in cfg.bip_reachable_from(from) {
                self.pkb.insert_relation(
                    Relation::NextBipT,
                    TableElement::Stmt(from),
                    TableElement::Stmt(to),
                );
            }
        }

        let affects_bip = self.bip_affects(cfg);
        self.insert_with_closure(&affects_bip, Relation::AffectsBip, Relation::AffectsBipT);
    }

    fn insert_with_closure(
        &mut self,
        edges: &BTreeMap<usize, BTreeSet<usize>>,
        direct: Relation,
        transitive: Relation,
    ) {
        for (from, targets) in edges {
            for to in targets {
                self.pkb
                    .insert_relation(direct, TableElement::Stmt(*from), TableElement::Stmt(*to));
            }
        }
        for (from, to) in transitive_closure(edges) {
            self.pkb
                .insert_relation(transitive, TableElement::Stmt(from), TableElement::Stmt(to));
        }
    }

    /// Whether `stmt` overwrites `variable` within its own procedure
    fn kills(&self, stmt: usize, variable: &str) -> bool {
        if let Some(assign) = self.assigns.get(&stmt) {
            return assign.target == variable;
        }
        if let Some(read) = self.reads.get(&stmt) {
            return read == variable;
        }
        self.calls.contains(&stmt)
            && self
                .statement_effects
                .get(&stmt)
                .is_some_and(|e| e.modifies.contains(variable))
    }

    fn intra_affects(&self, cfg: &ControlFlowGraph) -> BTreeMap<usize, BTreeSet<usize>> {
        let mut affects: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        for (origin, facts) in &self.assigns {
            let mut seen = BTreeSet::new();
            let mut queue: VecDeque<usize> = cfg.successors(*origin).collect();
            while let Some(stmt) = queue.pop_front() {
                if !seen.insert(stmt) {
                    continue;
                }
                if self
                    .assigns
                    .get(&stmt)
                    .is_some_and(|a| a.used.contains(&facts.target))
                {
                    affects.entry(*origin).or_default().insert(stmt);
                }
                if !self.kills(stmt, &facts.target) {
                    queue.extend(cfg.successors(stmt));
                }
            }
        }
        affects
    }

    /// Affects along interprocedural paths; call statements are walked into
    /// rather than treated as a single modification
    fn bip_affects(&self, cfg: &ControlFlowGraph) -> BTreeMap<usize, BTreeSet<usize>> {
        let mut affects: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        for (origin, facts) in &self.assigns {
            cfg.bip_walk(*origin, |stmt| {
                if self
                    .assigns
                    .get(&stmt)
                    .is_some_and(|a| a.used.contains(&facts.target))
                {
                    affects.entry(*origin).or_default().insert(stmt);
                }
                let overwritten = match self.assigns.get(&stmt) {
                    Some(assign) => assign.target == facts.target,
                    None => self.reads.get(&stmt).is_some_and(|r| *r == facts.target),
                };
                !overwritten
            });
        }
        affects
    }
}

/// All `(a, b)` pairs connected by a path of one or more edges
pub fn transitive_closure<K>(edges: &BTreeMap<K, BTreeSet<K>>) -> Vec<(K, K)>
where
    K: Ord + Clone,
{
    let mut pairs = Vec::new();
    for start in edges.keys() {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&K> = edges.get(start).into_iter().flatten().collect();
        while let Some(node) = queue.pop_front() {
            if seen.insert(node) {
                queue.extend(edges.get(node).into_iter().flatten());
            }
        }
        pairs.extend(seen.into_iter().map(|end| (start.clone(), end.clone())));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkb::KnowledgeBase;
    use crate::simple::parse;

    fn pkb(source: &str) -> Pkb {
        extract(&parse(source).unwrap()).unwrap()
    }

    fn s(n: usize) -> TableElement {
        TableElement::Stmt(n)
    }

    fn v(name: &str) -> TableElement {
        TableElement::name(name)
    }

    #[test]
    fn test_follows_and_parent() {
        let kb = pkb("procedure p { x = 1; while (x > 0) { y = 2; z = 3; } print x; }");
        assert!(kb.holds(Relation::Follows, &s(1), &s(2)));
        assert!(kb.holds(Relation::FollowsT, &s(1), &s(5)));
        assert!(!kb.holds(Relation::Follows, &s(2), &s(3)));
        assert!(kb.holds(Relation::Parent, &s(2), &s(4)));
        assert!(kb.holds(Relation::ParentT, &s(2), &s(3)));
        assert!(!kb.holds(Relation::Parent, &s(1), &s(3)));
    }

    #[test]
    fn test_uses_modifies_through_calls() {
        let kb = pkb(
            "procedure main { while (a > 0) { call helper; } }
             procedure helper { read b; c = d + 1; }",
        );
        assert!(kb.holds(Relation::Modifies, &s(2), &v("b")));
        assert!(kb.holds(Relation::Modifies, &s(1), &v("c")));
        assert!(kb.holds(Relation::Uses, &s(1), &v("a")));
        assert!(kb.holds(Relation::Uses, &s(1), &v("d")));
        assert!(kb.holds(Relation::Uses, &v("main"), &v("d")));
        assert!(kb.holds(Relation::Calls, &v("main"), &v("helper")));
        assert!(!kb.holds(Relation::Uses, &s(3), &v("b")));
    }

    #[test]
    fn test_calls_transitive() {
        let kb = pkb(
            "procedure a { call b; } procedure b { call c; } procedure c { print x; }",
        );
        assert!(kb.holds(Relation::CallsT, &v("a"), &v("c")));
        assert!(!kb.holds(Relation::Calls, &v("a"), &v("c")));
    }

    #[test]
    fn test_affects_respects_kills() {
        let kb = pkb(
            "procedure p {
                x = 1;
                y = x + 1;
                x = 5;
                z = x * y;
                read y;
                w = y;
            }",
        );
        assert!(kb.holds(Relation::Affects, &s(1), &s(2)));
        assert!(!kb.holds(Relation::Affects, &s(1), &s(4)));
        assert!(kb.holds(Relation::Affects, &s(3), &s(4)));
        assert!(kb.holds(Relation::Affects, &s(2), &s(4)));
        assert!(!kb.holds(Relation::Affects, &s(2), &s(6)));
        assert!(kb.holds(Relation::AffectsT, &s(1), &s(4)));
    }

    #[test]
    fn test_affects_in_loop_is_reflexive() {
        let kb = pkb("procedure p { while (i > 0) { i = i - 1; } }");
        assert!(kb.holds(Relation::Affects, &s(2), &s(2)));
        assert!(kb.holds(Relation::NextT, &s(1), &s(1)));
        assert!(!kb.holds(Relation::Next, &s(2), &s(2)));
    }

    #[test]
    fn test_call_kills_intra_affects_but_not_bip() {
        let kb = pkb(
            "procedure p { x = 1; call q; y = x; }
             procedure q { x = x + 1; }",
        );
        assert!(!kb.holds(Relation::Affects, &s(1), &s(3)));
        assert!(kb.holds(Relation::AffectsBip, &s(1), &s(4)));
        assert!(kb.holds(Relation::AffectsBip, &s(4), &s(3)));
        assert!(!kb.holds(Relation::AffectsBip, &s(1), &s(3)));
        assert!(kb.holds(Relation::AffectsBipT, &s(1), &s(3)));
        assert!(kb.holds(Relation::NextBip, &s(2), &s(4)));
        assert!(kb.holds(Relation::NextBip, &s(4), &s(3)));
        assert!(kb.holds(Relation::NextBipT, &s(1), &s(3)));
    }

    #[test]
    fn test_transitive_closure() {
        let mut edges: BTreeMap<u8, BTreeSet<u8>> = BTreeMap::new();
        edges.entry(1).or_default().insert(2);
        edges.entry(2).or_default().insert(3);
        edges.entry(3).or_default().insert(1);
        let pairs = transitive_closure(&edges);
        assert_eq!(pairs.len(), 9);
    }

    #[test]
    fn test_entity_lookups() {
        let kb = pkb("procedure p { read x; print y; call q; } procedure q { z = 42; }");
        assert_eq!(kb.read_variable(1), Some("x"));
        assert_eq!(kb.printed_variable(2), Some("y"));
        assert_eq!(kb.called_procedure(3), Some("q"));
        assert_eq!(kb.assign_rpn(4).unwrap(), &["42".to_string()]);
        assert_eq!(kb.entities(crate::types::EntityType::Constant), vec![v("42")]);
    }
}
