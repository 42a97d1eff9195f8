// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tokens of the SIMPLE language and the FIFO work queue the parser consumes

use crate::error::{SpaError, SpaResult};
use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("valid name regex"));
static CONSTANT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid constant regex"));
static EXPRESSION_OP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+*/%]$").expect("valid operator regex"));
static CONDITIONAL_OP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(!|&&|\|\|)$").expect("valid conditional regex"));
static RELATIONAL_OP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(>|>=|<|<=|==|!=)$").expect("valid relational regex"));

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenType {
    ProcedureKeyword,
    ReadKeyword,
    PrintKeyword,
    CallKeyword,
    WhileKeyword,
    IfKeyword,
    ThenKeyword,
    ElseKeyword,
    VariableName,
    ProcedureName,
    Constant,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Semicolon,
    Assign,
    /// `+ - * / %`
    ExpressionOp,
    /// `! && ||`
    ConditionalOp,
    /// `> >= < <= == !=`
    RelationalOp,
}

impl TokenType {
    /// Keyword type for a reserved word, if it is one
    pub fn keyword(word: &str) -> Option<Self> {
        match word {
            "procedure" => Some(TokenType::ProcedureKeyword),
            "read" => Some(TokenType::ReadKeyword),
            "print" => Some(TokenType::PrintKeyword),
            "call" => Some(TokenType::CallKeyword),
            "while" => Some(TokenType::WhileKeyword),
            "if" => Some(TokenType::IfKeyword),
            "then" => Some(TokenType::ThenKeyword),
            "else" => Some(TokenType::ElseKeyword),
            _ => None,
        }
    }

    /// Operands of arithmetic and relational expressions
    pub fn is_operand(self) -> bool {
        matches!(self, TokenType::VariableName | TokenType::Constant)
    }

    pub fn is_operator(self) -> bool {
        matches!(
            self,
            TokenType::ExpressionOp | TokenType::ConditionalOp | TokenType::RelationalOp
        )
    }

    fn accepts(self, value: &str) -> bool {
        match self {
            TokenType::ProcedureKeyword => value == "procedure",
            TokenType::ReadKeyword => value == "read",
            TokenType::PrintKeyword => value == "print",
            TokenType::CallKeyword => value == "call",
            TokenType::WhileKeyword => value == "while",
            TokenType::IfKeyword => value == "if",
            TokenType::ThenKeyword => value == "then",
            TokenType::ElseKeyword => value == "else",
            TokenType::VariableName | TokenType::ProcedureName => NAME_RE.is_match(value),
            TokenType::Constant => CONSTANT_RE.is_match(value),
            TokenType::LeftBrace => value == "{",
            TokenType::RightBrace => value == "}",
            TokenType::LeftParen => value == "(",
            TokenType::RightParen => value == ")",
            TokenType::Semicolon => value == ";",
            TokenType::Assign => value == "=",
            TokenType::ExpressionOp => EXPRESSION_OP_RE.is_match(value),
            TokenType::ConditionalOp => CONDITIONAL_OP_RE.is_match(value),
            TokenType::RelationalOp => RELATIONAL_OP_RE.is_match(value),
        }
    }
}

/// An immutable `(value, type)` pair, validated on construction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    value: String,
    token_type: TokenType,
}

impl Token {
    pub fn new(value: impl Into<String>, token_type: TokenType) -> SpaResult<Self> {
        let value = value.into();
        if !token_type.accepts(&value) {
            return Err(SpaError::syntax(format!(
                "'{}' is not a valid {:?} token",
                value, token_type
            )));
        }
        Ok(Self { value, token_type })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    pub fn is(&self, token_type: TokenType, value: &str) -> bool {
        self.token_type == token_type && self.value == value
    }

    /// Binding strength for the shunting-yard algorithm
    pub fn precedence(&self) -> u8 {
        match (self.token_type, self.value.as_str()) {
            (TokenType::ExpressionOp, "*" | "/" | "%") => 2,
            (TokenType::ExpressionOp, _) => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// FIFO of tokens: the lexer pushes at the back, the parser pops at the front
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList {
    tokens: VecDeque<Token>,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, token: Token) {
        self.tokens.push_back(token);
    }

    pub fn pop_front(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    pub fn peek_match(&self, token_type: TokenType) -> bool {
        self.peek()
            .map(|token| token.token_type() == token_type)
            .unwrap_or(false)
    }

    /// Pop the front token if it has the expected type, otherwise fail
    pub fn pop_expect(&mut self, token_type: TokenType) -> SpaResult<Token> {
        match self.tokens.pop_front() {
            Some(token) if token.token_type() == token_type => Ok(token),
            Some(token) => Err(SpaError::syntax(format!(
                "expected {:?} but found '{}' before '{}'",
                token_type,
                token,
                self.context()
            ))),
            None => Err(SpaError::syntax(format!(
                "expected {:?} but reached end of input",
                token_type
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// A few upcoming token values, for diagnostics
    pub fn context(&self) -> String {
        self.tokens
            .iter()
            .take(6)
            .map(Token::value)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<Vec<Token>> for TokenList {
    fn from(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }
}

impl IntoIterator for TokenList {
    type Item = Token;
    type IntoIter = std::collections::vec_deque::IntoIter<Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_rejects_invalid_pairing() {
        assert!(Token::new("x1", TokenType::VariableName).is_ok());
        assert!(Token::new("1x", TokenType::VariableName).is_err());
        assert!(Token::new("12a", TokenType::Constant).is_err());
        assert!(Token::new("&&", TokenType::ExpressionOp).is_err());
        assert!(Token::new("!=", TokenType::RelationalOp).is_ok());
    }

    #[test]
    fn test_precedence() {
        let times = Token::new("*", TokenType::ExpressionOp).unwrap();
        let plus = Token::new("+", TokenType::ExpressionOp).unwrap();
        assert!(times.precedence() > plus.precedence());
    }

    #[test]
    fn test_pop_expect() {
        let mut list = TokenList::new();
        list.push_back(Token::new("read", TokenType::ReadKeyword).unwrap());
        list.push_back(Token::new("x", TokenType::VariableName).unwrap());

        assert!(list.peek_match(TokenType::ReadKeyword));
        assert!(list.pop_expect(TokenType::ReadKeyword).is_ok());
        assert!(list.pop_expect(TokenType::Semicolon).is_err());
        assert!(list.is_empty());
    }
}
