// SPDX-License-Identifier: PMPL-1.0-or-later

//! Structured form of a parsed PQL query

use crate::types::{AttributeType, EntityType, Relation};
use serde::Serialize;
use std::fmt;

/// A declared synonym, scoped to one query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DesignEntity {
    pub entity: EntityType,
    pub synonym: String,
}

impl DesignEntity {
    pub fn new(entity: EntityType, synonym: impl Into<String>) -> Self {
        Self {
            entity,
            synonym: synonym.into(),
        }
    }
}

/// Right-hand side of an assignment pattern, already in postfix order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PatternExpr {
    /// `_"expr"_`: match any contiguous sub-expression
    pub partial: bool,
    pub rpn: Vec<String>,
}

impl PatternExpr {
    pub fn matches(&self, assigned: &[String]) -> bool {
        if !self.partial {
            return assigned == self.rpn.as_slice();
        }
        if self.rpn.is_empty() || self.rpn.len() > assigned.len() {
            return false;
        }
        assigned
            .windows(self.rpn.len())
            .any(|window| window == self.rpn.as_slice())
    }
}

/// One argument slot of a clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ClauseParam {
    Entity(DesignEntity),
    Name(String),
    Index(usize),
    Wildcard,
    Expr(PatternExpr),
}

impl ClauseParam {
    pub fn synonym(&self) -> Option<&str> {
        match self {
            ClauseParam::Entity(entity) => Some(&entity.synonym),
            _ => None,
        }
    }

    pub fn entity(&self) -> Option<&DesignEntity> {
        match self {
            ClauseParam::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}

impl fmt::Display for ClauseParam {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClauseParam::Entity(entity) => f.write_str(&entity.synonym),
            ClauseParam::Name(name) => write!(f, "\"{}\"", name),
            ClauseParam::Index(index) => write!(f, "{}", index),
            ClauseParam::Wildcard => f.write_str("_"),
            ClauseParam::Expr(expr) if expr.partial => write!(f, "_\"{}\"_", expr.rpn.join(" ")),
            ClauseParam::Expr(expr) => write!(f, "\"{}\"", expr.rpn.join(" ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Clause {
    SuchThat {
        relation: Relation,
        lhs: ClauseParam,
        rhs: ClauseParam,
    },
    Pattern {
        entity: DesignEntity,
        lhs: ClauseParam,
        rhs: ClauseParam,
    },
    With {
        lhs: ClauseParam,
        lhs_attribute: Option<AttributeType>,
        rhs: ClauseParam,
        rhs_attribute: Option<AttributeType>,
    },
}

impl Clause {
    /// Distinct synonyms the clause constrains, in argument order
    pub fn synonyms(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(3);
        let params: [Option<&str>; 3] = match self {
            Clause::SuchThat { lhs, rhs, .. } | Clause::With { lhs, rhs, .. } => {
                [lhs.synonym(), rhs.synonym(), None]
            }
            Clause::Pattern { entity, lhs, .. } => {
                [Some(entity.synonym.as_str()), lhs.synonym(), None]
            }
        };
        for name in params.into_iter().flatten() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Evaluation rank among clauses with the same number of synonyms
    pub fn rank(&self) -> u8 {
        match self {
            Clause::With { .. } => 0,
            Clause::SuchThat { .. } => 1,
            Clause::Pattern { .. } => 2,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Clause::SuchThat { relation, lhs, rhs } => {
                write!(f, "such that {}({}, {})", relation, lhs, rhs)
            }
            Clause::Pattern { entity, lhs, rhs } => {
                write!(f, "pattern {}({}, {})", entity.synonym, lhs, rhs)
            }
            Clause::With {
                lhs,
                lhs_attribute,
                rhs,
                rhs_attribute,
            } => {
                let side = |param: &ClauseParam, attribute: &Option<AttributeType>| match attribute {
                    Some(attribute) => format!("{}.{}", param, attribute.name()),
                    None => param.to_string(),
                };
                write!(f, "with {} = {}", side(lhs, lhs_attribute), side(rhs, rhs_attribute))
            }
        }
    }
}

/// A selected synonym with an optional attribute projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub entity: DesignEntity,
    pub attribute: Option<AttributeType>,
}

impl Element {
    /// Whether the projected values are statement numbers
    pub fn yields_statements(&self) -> bool {
        self.entity.entity.is_statement()
            && self
                .attribute
                .map_or(true, |attribute| attribute == AttributeType::StmtNo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Selection {
    Boolean,
    Elements(Vec<Element>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    /// In declaration order
    pub declarations: Vec<DesignEntity>,
    pub selection: Selection,
    pub clauses: Vec<Clause>,
    /// Deferred until evaluation so BOOLEAN queries can still answer FALSE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_error: Option<String>,
}

impl Query {
    pub fn is_boolean(&self) -> bool {
        self.selection == Selection::Boolean
    }

    pub fn declaration(&self, synonym: &str) -> Option<&DesignEntity> {
        self.declarations.iter().find(|d| d.synonym == synonym)
    }
}
