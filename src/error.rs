// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error taxonomy shared by the SIMPLE front end and the PQL engine

use thiserror::Error;

/// Every failure the engine can report, grouped by where it originates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaError {
    /// Malformed SIMPLE source (lexer or recursive-descent parser)
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Whole-program checks: undeclared callees, recursion, duplicate procedures
    #[error("invalid program: {0}")]
    Validation(String),

    /// Parenthesis adjacency, operator/operand alternation or RPN reduction failures
    #[error("invalid expression: {0}")]
    Expression(String),

    /// Malformed PQL text
    #[error("invalid query syntax: {0}")]
    QuerySyntax(String),

    /// Well-formed PQL that is meaningless (wrong parameter types, undeclared synonyms)
    #[error("semantic error: {0}")]
    Semantic(String),

    /// Feature toggles that forbid part of the query language
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Discriminant of [`SpaError`] for callers that only branch on the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Validation,
    Expression,
    QuerySyntax,
    Semantic,
    Configuration,
}

impl SpaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpaError::Syntax(_) => ErrorKind::Syntax,
            SpaError::Validation(_) => ErrorKind::Validation,
            SpaError::Expression(_) => ErrorKind::Expression,
            SpaError::QuerySyntax(_) => ErrorKind::QuerySyntax,
            SpaError::Semantic(_) => ErrorKind::Semantic,
            SpaError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        SpaError::Syntax(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SpaError::Validation(msg.into())
    }

    pub fn expression(msg: impl Into<String>) -> Self {
        SpaError::Expression(msg.into())
    }

    pub fn query_syntax(msg: impl Into<String>) -> Self {
        SpaError::QuerySyntax(msg.into())
    }

    pub fn semantic(msg: impl Into<String>) -> Self {
        SpaError::Semantic(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        SpaError::Configuration(msg.into())
    }
}

pub type SpaResult<T> = std::result::Result<T, SpaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(SpaError::syntax("x").kind(), ErrorKind::Syntax);
        assert_eq!(SpaError::semantic("x").kind(), ErrorKind::Semantic);
        assert_eq!(SpaError::configuration("x").kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_display_carries_message() {
        let err = SpaError::validation("procedure main calls undeclared procedure foo");
        assert_eq!(
            err.to_string(),
            "invalid program: procedure main calls undeclared procedure foo"
        );
    }
}
