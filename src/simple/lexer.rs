// SPDX-License-Identifier: PMPL-1.0-or-later

//! SIMPLE lexer
//!
//! Whitespace is collapsed first, then each position is matched against an
//! ordered list of alternatives: assignment, while header, if header,
//! reserved keyword, name, constant, bracket, semicolon. The first match
//! wins, so an assignment to a variable called `while` is still an
//! assignment. Expressions embedded in assignments and headers are handed to
//! the expression tokenisers.

use crate::error::{SpaError, SpaResult};
use crate::simple::expression::{tokenise_conditional_expression, tokenise_expression};
use crate::simple::token::{Token, TokenList, TokenType};
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*)\s*=\s*([^;{}]*);").expect("valid assign regex")
});
static WHILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^while\s*\(([^{}]*)\)\s*\{").expect("valid while regex")
});
static IF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^if\s*\(([^{}]*)\)\s*then\s*\{").expect("valid if regex")
});
static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(procedure|read|print|call|while|if|then|else)\b").expect("valid keyword regex")
});
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*").expect("valid name regex"));
static CONSTANT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+").expect("valid constant regex"));
static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[{}()]").expect("valid bracket regex"));

const SNIPPET_LEN: usize = 24;

/// Convert SIMPLE source text into a token queue
///
/// Each call builds its own buffer, so tokenising is reentrant.
pub fn tokenise(source: &str) -> SpaResult<TokenList> {
    let normalised = WHITESPACE_RE.replace_all(source, " ");
    let mut tokens = TokenList::new();
    let mut last_type: Option<TokenType> = None;
    let mut rest = normalised.trim();

    while !rest.is_empty() {
        let consumed = if let Some(caps) = ASSIGN_RE.captures(rest) {
            push(&mut tokens, &mut last_type, &caps[1], TokenType::VariableName)?;
            push(&mut tokens, &mut last_type, "=", TokenType::Assign)?;
            for token in tokenise_expression(&caps[2]).map_err(|e| located(e, rest))? {
                push_token(&mut tokens, &mut last_type, token);
            }
            push(&mut tokens, &mut last_type, ";", TokenType::Semicolon)?;
            caps[0].len()
        } else if let Some(caps) = WHILE_RE.captures(rest) {
            push(&mut tokens, &mut last_type, "while", TokenType::WhileKeyword)?;
            push_condition(&mut tokens, &mut last_type, &caps[1], rest)?;
            push(&mut tokens, &mut last_type, "{", TokenType::LeftBrace)?;
            caps[0].len()
        } else if let Some(caps) = IF_RE.captures(rest) {
            push(&mut tokens, &mut last_type, "if", TokenType::IfKeyword)?;
            push_condition(&mut tokens, &mut last_type, &caps[1], rest)?;
            push(&mut tokens, &mut last_type, "then", TokenType::ThenKeyword)?;
            push(&mut tokens, &mut last_type, "{", TokenType::LeftBrace)?;
            caps[0].len()
        } else if let Some(m) = KEYWORD_RE.find(rest) {
            let token_type = match name_context(last_type) {
                Some(name_type) => name_type,
                None => TokenType::keyword(m.as_str()).ok_or_else(|| {
                    SpaError::syntax(format!("unknown keyword '{}'", m.as_str()))
                })?,
            };
            push(&mut tokens, &mut last_type, m.as_str(), token_type)?;
            m.end()
        } else if let Some(m) = NAME_RE.find(rest) {
            let token_type = name_context(last_type).unwrap_or(TokenType::VariableName);
            push(&mut tokens, &mut last_type, m.as_str(), token_type)?;
            m.end()
        } else if let Some(m) = CONSTANT_RE.find(rest) {
            push(&mut tokens, &mut last_type, m.as_str(), TokenType::Constant)?;
            m.end()
        } else if let Some(m) = BRACKET_RE.find(rest) {
            let token_type = match m.as_str() {
                "{" => TokenType::LeftBrace,
                "}" => TokenType::RightBrace,
                "(" => TokenType::LeftParen,
                _ => TokenType::RightParen,
            };
            push(&mut tokens, &mut last_type, m.as_str(), token_type)?;
            m.end()
        } else if rest.starts_with(';') {
            push(&mut tokens, &mut last_type, ";", TokenType::Semicolon)?;
            1
        } else {
            return Err(SpaError::syntax(format!(
                "unexpected input near '{}'",
                snippet(rest)
            )));
        };

        rest = rest[consumed..].trim_start();
    }

    Ok(tokens)
}

/// After `procedure`/`call` a word names a procedure, after `read`/`print` a
/// variable, even if it is a reserved word
fn name_context(last_type: Option<TokenType>) -> Option<TokenType> {
    match last_type {
        Some(TokenType::ProcedureKeyword) | Some(TokenType::CallKeyword) => {
            Some(TokenType::ProcedureName)
        }
        Some(TokenType::ReadKeyword) | Some(TokenType::PrintKeyword) => {
            Some(TokenType::VariableName)
        }
        _ => None,
    }
}

fn push(
    tokens: &mut TokenList,
    last_type: &mut Option<TokenType>,
    value: &str,
    token_type: TokenType,
) -> SpaResult<()> {
    push_token(tokens, last_type, Token::new(value, token_type)?);
    Ok(())
}

fn push_token(tokens: &mut TokenList, last_type: &mut Option<TokenType>, token: Token) {
    *last_type = Some(token.token_type());
    tokens.push_back(token);
}

fn push_condition(
    tokens: &mut TokenList,
    last_type: &mut Option<TokenType>,
    raw: &str,
    rest: &str,
) -> SpaResult<()> {
    push(tokens, last_type, "(", TokenType::LeftParen)?;
    for token in tokenise_conditional_expression(raw).map_err(|e| located(e, rest))? {
        push_token(tokens, last_type, token);
    }
    push(tokens, last_type, ")", TokenType::RightParen)
}

fn located(err: SpaError, rest: &str) -> SpaError {
    SpaError::syntax(format!("{} (in '{}')", err, snippet(rest)))
}

fn snippet(rest: &str) -> String {
    rest.chars().take(SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        tokenise(source)
            .unwrap()
            .iter()
            .map(Token::token_type)
            .collect()
    }

    #[test]
    fn test_assignment_tokens() {
        assert_eq!(
            types("x = y + 1;"),
            vec![
                TokenType::VariableName,
                TokenType::Assign,
                TokenType::VariableName,
                TokenType::ExpressionOp,
                TokenType::Constant,
                TokenType::Semicolon,
            ]
        );
    }

    #[test]
    fn test_keyword_reinterpreted_after_read() {
        assert_eq!(
            types("read read;"),
            vec![
                TokenType::ReadKeyword,
                TokenType::VariableName,
                TokenType::Semicolon
            ]
        );
        assert_eq!(
            types("procedure while { call if; }"),
            vec![
                TokenType::ProcedureKeyword,
                TokenType::ProcedureName,
                TokenType::LeftBrace,
                TokenType::CallKeyword,
                TokenType::ProcedureName,
                TokenType::Semicolon,
                TokenType::RightBrace,
            ]
        );
    }

    #[test]
    fn test_assignment_to_keyword_named_variable() {
        let tokens = tokenise("while = while + 1;").unwrap();
        assert_eq!(tokens.peek().unwrap().token_type(), TokenType::VariableName);
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn test_headers_embed_conditions() {
        let tokens = tokenise("while (x > 1) { x = x - 1; }").unwrap();
        let values: Vec<_> = tokens.iter().map(Token::value).collect();
        assert_eq!(
            values,
            vec!["while", "(", "x", ">", "1", ")", "{", "x", "=", "x", "-", "1", ";", "}"]
        );

        let tokens = tokenise("if ((a==b) && (!(c<d))) then { read a; } else { print b; }").unwrap();
        assert_eq!(tokens.peek().unwrap().token_type(), TokenType::IfKeyword);
        assert!(tokens
            .iter()
            .any(|t| t.token_type() == TokenType::ThenKeyword));
    }

    #[test]
    fn test_whitespace_collapsed() {
        let compact = tokenise("procedure p{read x;}").unwrap();
        let spaced = tokenise("procedure   p\n{\n\tread\n x ;\n}\n").unwrap();
        assert_eq!(compact, spaced);
    }

    #[test]
    fn test_rejects_unknown_character() {
        let err = tokenise("procedure p { read x$; }").unwrap_err();
        assert!(matches!(err, SpaError::Syntax(_)));
        assert!(err.to_string().contains("$"));
    }
}
