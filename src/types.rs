// SPDX-License-Identifier: PMPL-1.0-or-later

//! Core type definitions shared by the knowledge base and the query engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Design entities that a PQL synonym can be declared as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Stmt,
    Assign,
    While,
    If,
    Call,
    Read,
    Print,
    Variable,
    Procedure,
    Constant,
    ProgLine,
}

impl EntityType {
    pub const ALL: [EntityType; 11] = [
        EntityType::Stmt,
        EntityType::Assign,
        EntityType::While,
        EntityType::If,
        EntityType::Call,
        EntityType::Read,
        EntityType::Print,
        EntityType::Variable,
        EntityType::Procedure,
        EntityType::Constant,
        EntityType::ProgLine,
    ];

    /// PQL keyword used in declarations
    pub fn keyword(self) -> &'static str {
        match self {
            EntityType::Stmt => "stmt",
            EntityType::Assign => "assign",
            EntityType::While => "while",
            EntityType::If => "if",
            EntityType::Call => "call",
            EntityType::Read => "read",
            EntityType::Print => "print",
            EntityType::Variable => "variable",
            EntityType::Procedure => "procedure",
            EntityType::Constant => "constant",
            EntityType::ProgLine => "prog_line",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.keyword() == word)
    }

    /// Entities whose values are statement numbers
    pub fn is_statement(self) -> bool {
        !matches!(
            self,
            EntityType::Variable | EntityType::Procedure | EntityType::Constant
        )
    }

    /// Whether a statement of the given kind belongs to this entity's domain
    pub fn admits(self, kind: StatementKind) -> bool {
        match self {
            EntityType::Stmt | EntityType::ProgLine => true,
            EntityType::Assign => kind == StatementKind::Assign,
            EntityType::While => kind == StatementKind::While,
            EntityType::If => kind == StatementKind::If,
            EntityType::Call => kind == StatementKind::Call,
            EntityType::Read => kind == StatementKind::Read,
            EntityType::Print => kind == StatementKind::Print,
            EntityType::Variable | EntityType::Procedure | EntityType::Constant => false,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Kinds of SIMPLE statements as recorded in the knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StatementKind {
    Assign,
    While,
    If,
    Call,
    Read,
    Print,
}

/// Design abstractions (relations) answerable by the knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Relation {
    Follows,
    FollowsT,
    Parent,
    ParentT,
    Uses,
    Modifies,
    Calls,
    CallsT,
    Next,
    NextT,
    Affects,
    AffectsT,
    NextBip,
    NextBipT,
    AffectsBip,
    AffectsBipT,
}

/// Which kind of value a relation argument accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentDomain {
    /// Statement numbers of any kind
    Statement,
    /// Assignment statements only
    Assignment,
    /// Statement numbers or procedure names
    StatementOrProcedure,
    Procedure,
    Variable,
}

impl Relation {
    pub const ALL: [Relation; 16] = [
        Relation::Follows,
        Relation::FollowsT,
        Relation::Parent,
        Relation::ParentT,
        Relation::Uses,
        Relation::Modifies,
        Relation::Calls,
        Relation::CallsT,
        Relation::Next,
        Relation::NextT,
        Relation::Affects,
        Relation::AffectsT,
        Relation::NextBip,
        Relation::NextBipT,
        Relation::AffectsBip,
        Relation::AffectsBipT,
    ];

    /// Name as written in PQL
    pub fn name(self) -> &'static str {
        match self {
            Relation::Follows => "Follows",
            Relation::FollowsT => "Follows*",
            Relation::Parent => "Parent",
            Relation::ParentT => "Parent*",
            Relation::Uses => "Uses",
            Relation::Modifies => "Modifies",
            Relation::Calls => "Calls",
            Relation::CallsT => "Calls*",
            Relation::Next => "Next",
            Relation::NextT => "Next*",
            Relation::Affects => "Affects",
            Relation::AffectsT => "Affects*",
            Relation::NextBip => "NextBip",
            Relation::NextBipT => "NextBip*",
            Relation::AffectsBip => "AffectsBip",
            Relation::AffectsBipT => "AffectsBip*",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Interprocedural relations gated behind the bip feature flag
    pub fn is_bip(self) -> bool {
        matches!(
            self,
            Relation::NextBip | Relation::NextBipT | Relation::AffectsBip | Relation::AffectsBipT
        )
    }

    /// Relations that can never relate an element to itself
    pub fn is_irreflexive(self) -> bool {
        matches!(
            self,
            Relation::Follows
                | Relation::FollowsT
                | Relation::Parent
                | Relation::ParentT
                | Relation::Calls
                | Relation::CallsT
                | Relation::Next
                | Relation::NextBip
        )
    }

    pub fn lhs_domain(self) -> ArgumentDomain {
        match self {
            Relation::Uses | Relation::Modifies => ArgumentDomain::StatementOrProcedure,
            Relation::Calls | Relation::CallsT => ArgumentDomain::Procedure,
            Relation::Affects
            | Relation::AffectsT
            | Relation::AffectsBip
            | Relation::AffectsBipT => ArgumentDomain::Assignment,
            _ => ArgumentDomain::Statement,
        }
    }

    pub fn rhs_domain(self) -> ArgumentDomain {
        match self {
            Relation::Uses | Relation::Modifies => ArgumentDomain::Variable,
            Relation::Calls | Relation::CallsT => ArgumentDomain::Procedure,
            Relation::Affects
            | Relation::AffectsT
            | Relation::AffectsBip
            | Relation::AffectsBipT => ArgumentDomain::Assignment,
            _ => ArgumentDomain::Statement,
        }
    }

    /// Entity type enumerated for a wildcard argument
    pub fn wildcard_entity(domain: ArgumentDomain) -> Option<EntityType> {
        match domain {
            ArgumentDomain::Statement => Some(EntityType::Stmt),
            ArgumentDomain::Assignment => Some(EntityType::Assign),
            ArgumentDomain::Procedure => Some(EntityType::Procedure),
            ArgumentDomain::Variable => Some(EntityType::Variable),
            // `Uses(_, v)` is ambiguous between statements and procedures
            ArgumentDomain::StatementOrProcedure => None,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ArgumentDomain {
    /// Whether a synonym of this entity type may stand in this argument slot
    pub fn accepts(self, entity: EntityType) -> bool {
        match self {
            ArgumentDomain::Statement | ArgumentDomain::Assignment => entity.is_statement(),
            ArgumentDomain::StatementOrProcedure => {
                entity.is_statement() || entity == EntityType::Procedure
            }
            ArgumentDomain::Procedure => entity == EntityType::Procedure,
            ArgumentDomain::Variable => entity == EntityType::Variable,
        }
    }

    pub fn accepts_index(self) -> bool {
        matches!(
            self,
            ArgumentDomain::Statement
                | ArgumentDomain::Assignment
                | ArgumentDomain::StatementOrProcedure
        )
    }

    pub fn accepts_name(self) -> bool {
        matches!(
            self,
            ArgumentDomain::StatementOrProcedure
                | ArgumentDomain::Procedure
                | ArgumentDomain::Variable
        )
    }
}

/// Attribute selectors usable in `with` clauses and result projections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeType {
    ProcName,
    VarName,
    Value,
    StmtNo,
}

impl AttributeType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "procName" => Some(AttributeType::ProcName),
            "varName" => Some(AttributeType::VarName),
            "value" => Some(AttributeType::Value),
            "stmt#" => Some(AttributeType::StmtNo),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeType::ProcName => "procName",
            AttributeType::VarName => "varName",
            AttributeType::Value => "value",
            AttributeType::StmtNo => "stmt#",
        }
    }

    pub fn applies_to(self, entity: EntityType) -> bool {
        match self {
            AttributeType::ProcName => {
                matches!(entity, EntityType::Procedure | EntityType::Call)
            }
            AttributeType::VarName => matches!(
                entity,
                EntityType::Variable | EntityType::Read | EntityType::Print
            ),
            AttributeType::Value => entity == EntityType::Constant,
            AttributeType::StmtNo => entity.is_statement() && entity != EntityType::ProgLine,
        }
    }

    /// Whether the attribute yields a name (as opposed to an integer)
    pub fn is_name(self) -> bool {
        matches!(self, AttributeType::ProcName | AttributeType::VarName)
    }
}

/// One cell of a result table: a statement number or a name
///
/// Values of different variants never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TableElement {
    Stmt(usize),
    Name(String),
}

impl TableElement {
    pub fn name(value: impl Into<String>) -> Self {
        TableElement::Name(value.into())
    }

    pub fn as_stmt(&self) -> Option<usize> {
        match self {
            TableElement::Stmt(n) => Some(*n),
            TableElement::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            TableElement::Name(s) => Some(s),
            TableElement::Stmt(_) => None,
        }
    }
}

impl fmt::Display for TableElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TableElement::Stmt(n) => write!(f, "{}", n),
            TableElement::Name(s) => f.write_str(s),
        }
    }
}
