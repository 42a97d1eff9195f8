// SPDX-License-Identifier: PMPL-1.0-or-later

//! Owned syntax tree for SIMPLE programs
//!
//! Children are owned by their parent, so the whole tree is owned by the
//! `Program` root and dropped with it. Nodes are assembled bottom-up by the
//! parser and never mutated afterwards.

use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Program,
    Procedure,
    StatementList,
    Call,
    Read,
    Print,
    Assign,
    While,
    If,
    Variable,
    Constant,
    ExpressionOp,
    ConditionalExpressionOp,
    RelativeExpressionOp,
}

impl NodeKind {
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            NodeKind::Call
                | NodeKind::Read
                | NodeKind::Print
                | NodeKind::Assign
                | NodeKind::While
                | NodeKind::If
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TNode {
    kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statement_number: Option<usize>,
    /// Right-hand side in postfix order; only set on `Assign`
    #[serde(skip_serializing_if = "Option::is_none")]
    rpn: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TNode>,
}

impl TNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            value: None,
            statement_number: None,
            rpn: None,
            children: Vec::new(),
        }
    }

    pub fn leaf(kind: NodeKind, value: impl Into<String>) -> Self {
        Self::new(kind).with_value(value)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_statement_number(mut self, number: usize) -> Self {
        self.statement_number = Some(number);
        self
    }

    pub fn with_child(mut self, child: TNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<TNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_rpn(mut self, rpn: Vec<String>) -> Self {
        self.rpn = Some(rpn);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn statement_number(&self) -> Option<usize> {
        self.statement_number
    }

    pub fn children(&self) -> &[TNode] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&TNode> {
        self.children.get(index)
    }

    pub fn rpn(&self) -> Option<&[String]> {
        self.rpn.as_deref()
    }

    /// Names of every `Variable` node in this subtree
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect(NodeKind::Variable, &mut names);
        names
    }

    /// Literals of every `Constant` node in this subtree
    pub fn constants(&self) -> BTreeSet<String> {
        let mut literals = BTreeSet::new();
        self.collect(NodeKind::Constant, &mut literals);
        literals
    }

    fn collect(&self, kind: NodeKind, into: &mut BTreeSet<String>) {
        if self.kind == kind {
            if let Some(value) = &self.value {
                into.insert(value.clone());
            }
        }
        for child in &self.children {
            child.collect(kind, into);
        }
    }

    /// Number of statement nodes in this subtree
    pub fn statement_count(&self) -> usize {
        let own = usize::from(self.kind.is_statement());
        own + self
            .children
            .iter()
            .map(TNode::statement_count)
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_variables_and_constants() {
        let expr = TNode::leaf(NodeKind::ExpressionOp, "+")
            .with_child(TNode::leaf(NodeKind::Variable, "x"))
            .with_child(
                TNode::leaf(NodeKind::ExpressionOp, "*")
                    .with_child(TNode::leaf(NodeKind::Constant, "2"))
                    .with_child(TNode::leaf(NodeKind::Variable, "y")),
            );

        assert_eq!(
            expr.variables().into_iter().collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        assert_eq!(expr.constants().into_iter().collect::<Vec<_>>(), vec!["2"]);
    }

    #[test]
    fn test_statement_count() {
        let list = TNode::new(NodeKind::StatementList)
            .with_child(
                TNode::new(NodeKind::Read)
                    .with_statement_number(1)
                    .with_child(TNode::leaf(NodeKind::Variable, "x")),
            )
            .with_child(TNode::leaf(NodeKind::Call, "p").with_statement_number(2));
        assert_eq!(list.statement_count(), 2);
    }
}
