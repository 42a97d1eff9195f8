// SPDX-License-Identifier: PMPL-1.0-or-later

//! Arithmetic expression handling
//!
//! Expressions are scanned into typed tokens, checked by two structural
//! validators that the shunting-yard algorithm cannot enforce on its own,
//! converted to postfix (RPN) and finally reduced into a binary tree.

use crate::error::{SpaError, SpaResult};
use crate::simple::ast::{NodeKind, TNode};
use crate::simple::token::{Token, TokenType};
use regex::Regex;
use std::sync::LazyLock;

static EXPRESSION_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?P<name>[A-Za-z][A-Za-z0-9]*)|(?P<constant>[0-9]+)|(?P<op>[-+*/%])|(?P<paren>[()]))")
        .expect("valid expression token regex")
});

static CONDITIONAL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?P<name>[A-Za-z][A-Za-z0-9]*)|(?P<constant>[0-9]+)|(?P<rel>>=|<=|==|!=|>|<)|(?P<cond>&&|\|\||!)|(?P<op>[-+*/%])|(?P<paren>[()]))",
    )
    .expect("valid conditional token regex")
});

/// A successfully parsed expression: its tree and its postfix token order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExpression {
    pub ast: TNode,
    pub rpn: Vec<Token>,
}

impl ParsedExpression {
    pub fn rpn_values(&self) -> Vec<String> {
        rpn_values(&self.rpn)
    }
}

/// Tokenise an arithmetic expression (`+ - * / %`, parentheses, names, integers)
pub fn tokenise_expression(raw: &str) -> SpaResult<Vec<Token>> {
    scan(raw, &EXPRESSION_TOKEN_RE)
}

/// Tokenise a conditional expression, which additionally admits `! && ||`
/// and the relational operators
pub fn tokenise_conditional_expression(raw: &str) -> SpaResult<Vec<Token>> {
    scan(raw, &CONDITIONAL_TOKEN_RE)
}

fn scan(raw: &str, pattern: &Regex) -> SpaResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = raw;

    while !rest.trim_start().is_empty() {
        let caps = pattern.captures(rest).ok_or_else(|| {
            SpaError::syntax(format!(
                "unrecognised character in expression near '{}'",
                rest.trim_start()
            ))
        })?;

        let token = if let Some(m) = caps.name("name") {
            Token::new(m.as_str(), TokenType::VariableName)?
        } else if let Some(m) = caps.name("constant") {
            Token::new(m.as_str(), TokenType::Constant)?
        } else if let Some(m) = caps.name("rel") {
            Token::new(m.as_str(), TokenType::RelationalOp)?
        } else if let Some(m) = caps.name("cond") {
            Token::new(m.as_str(), TokenType::ConditionalOp)?
        } else if let Some(m) = caps.name("op") {
            Token::new(m.as_str(), TokenType::ExpressionOp)?
        } else if let Some(m) = caps.name("paren") {
            let paren_type = if m.as_str() == "(" {
                TokenType::LeftParen
            } else {
                TokenType::RightParen
            };
            Token::new(m.as_str(), paren_type)?
        } else {
            return Err(SpaError::syntax(format!(
                "unrecognised expression input near '{}'",
                rest
            )));
        };

        tokens.push(token);
        rest = &rest[caps[0].len()..];
    }

    Ok(tokens)
}

fn is_operator(token: &Token) -> bool {
    token.token_type().is_operator()
}

fn is_operand(token: &Token) -> bool {
    token.token_type().is_operand()
}

fn describe(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::value)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reject operator-`)`, operand-`(`, `)`-operand, `)`-`(`, `(`-operator and `(`-`)`
pub fn validate_parentheses(tokens: &[Token]) -> SpaResult<()> {
    for pair in tokens.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        let invalid = match current.token_type() {
            TokenType::LeftParen => is_operator(next) || next.token_type() == TokenType::RightParen,
            TokenType::RightParen => is_operand(next) || next.token_type() == TokenType::LeftParen,
            _ if is_operator(current) => next.token_type() == TokenType::RightParen,
            _ if is_operand(current) => next.token_type() == TokenType::LeftParen,
            _ => false,
        };
        if invalid {
            return Err(SpaError::expression(format!(
                "'{}' cannot be followed by '{}' in '{}'",
                current,
                next,
                describe(tokens)
            )));
        }
    }
    Ok(())
}

/// Ignoring parentheses, operands and operators must alternate, starting and
/// ending on an operand
pub fn validate_alternation(tokens: &[Token]) -> SpaResult<()> {
    let mut expect_operand = true;

    for token in tokens.iter().filter(|t| {
        !matches!(t.token_type(), TokenType::LeftParen | TokenType::RightParen)
    }) {
        let valid = if expect_operand {
            is_operand(token)
        } else {
            is_operator(token)
        };
        if !valid {
            return Err(SpaError::expression(format!(
                "unexpected '{}' in '{}'",
                token,
                describe(tokens)
            )));
        }
        expect_operand = !expect_operand;
    }

    if expect_operand {
        return Err(SpaError::expression(format!(
            "expression '{}' must end with an operand",
            describe(tokens)
        )));
    }
    Ok(())
}

/// Shunting-yard conversion of an infix token sequence into postfix order
pub fn to_rpn(tokens: &[Token]) -> SpaResult<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<&Token> = Vec::new();

    for token in tokens {
        match token.token_type() {
            TokenType::VariableName | TokenType::Constant => output.push(token.clone()),
            TokenType::ExpressionOp => {
                // Left-associative: pop equal-or-higher precedence first
                while let Some(top) = stack.last() {
                    if top.token_type() == TokenType::ExpressionOp
                        && top.precedence() >= token.precedence()
                    {
                        output.push((*top).clone());
                        stack.pop();
                    } else {
                        break;
                    }
                }
                stack.push(token);
            }
            TokenType::LeftParen => stack.push(token),
            TokenType::RightParen => loop {
                match stack.pop() {
                    Some(top) if top.token_type() == TokenType::LeftParen => break,
                    Some(top) => output.push(top.clone()),
                    None => {
                        return Err(SpaError::expression(format!(
                            "unmatched ')' in '{}'",
                            describe(tokens)
                        )))
                    }
                }
            },
            other => {
                return Err(SpaError::expression(format!(
                    "{:?} '{}' is not allowed in an arithmetic expression",
                    other, token
                )))
            }
        }
    }

    while let Some(top) = stack.pop() {
        if top.token_type() == TokenType::LeftParen {
            return Err(SpaError::expression(format!(
                "unmatched '(' in '{}'",
                describe(tokens)
            )));
        }
        output.push(top.clone());
    }

    Ok(output)
}

/// Reduce a postfix sequence into a binary expression tree
pub fn construct_expression_ast(rpn: &[Token]) -> SpaResult<TNode> {
    let mut stack: Vec<TNode> = Vec::new();

    for token in rpn {
        match token.token_type() {
            TokenType::VariableName => stack.push(TNode::leaf(NodeKind::Variable, token.value())),
            TokenType::Constant => stack.push(TNode::leaf(NodeKind::Constant, token.value())),
            TokenType::ExpressionOp => {
                let (rhs, lhs) = match (stack.pop(), stack.pop()) {
                    (Some(rhs), Some(lhs)) => (rhs, lhs),
                    _ => {
                        return Err(SpaError::expression(format!(
                            "operator '{}' is missing an operand",
                            token
                        )))
                    }
                };
                stack.push(
                    TNode::leaf(NodeKind::ExpressionOp, token.value())
                        .with_child(lhs)
                        .with_child(rhs),
                );
            }
            _ => {
                return Err(SpaError::expression(format!(
                    "unexpected '{}' in postfix expression",
                    token
                )))
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(SpaError::expression(format!(
            "postfix expression '{}' does not reduce to a single tree",
            describe(rpn)
        ))),
    }
}

/// Validate, convert and reduce an infix expression
pub fn parse_expression(tokens: &[Token]) -> SpaResult<ParsedExpression> {
    if let Some(stray) = tokens.iter().find(|t| {
        !matches!(
            t.token_type(),
            TokenType::VariableName
                | TokenType::Constant
                | TokenType::ExpressionOp
                | TokenType::LeftParen
                | TokenType::RightParen
        )
    }) {
        return Err(SpaError::expression(format!(
            "'{}' is not allowed in an arithmetic expression",
            stray
        )));
    }

    validate_parentheses(tokens)?;
    validate_alternation(tokens)?;
    let rpn = to_rpn(tokens)?;
    let ast = construct_expression_ast(&rpn)?;
    Ok(ParsedExpression { ast, rpn })
}

/// Tokenise and parse an arithmetic expression given as text
pub fn parse_expression_str(raw: &str) -> SpaResult<ParsedExpression> {
    let tokens = tokenise_expression(raw)?;
    parse_expression(&tokens)
}

pub fn rpn_values(rpn: &[Token]) -> Vec<String> {
    rpn.iter().map(|t| t.value().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpn_of(raw: &str) -> Vec<String> {
        parse_expression_str(raw).unwrap().rpn_values()
    }

    #[test]
    fn test_precedence_ordering() {
        assert_eq!(rpn_of("1+2*3"), vec!["1", "2", "3", "*", "+"]);
        assert_eq!(rpn_of("1*2+3"), vec!["1", "2", "*", "3", "+"]);
    }

    #[test]
    fn test_nested_parentheses() {
        assert_eq!(
            rpn_of("((a1+69)/(420-b12))%(88*cs3203)"),
            vec!["a1", "69", "+", "420", "b12", "-", "/", "88", "cs3203", "*", "%"]
        );
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(rpn_of("a-b-c"), vec!["a", "b", "-", "c", "-"]);
        assert_eq!(rpn_of("a/b*c"), vec!["a", "b", "/", "c", "*"]);
    }

    #[test]
    fn test_parenthesis_adjacency_rejects() {
        for raw in ["()", "(+)", "1(", ")1", "(x+)", "x(y)"] {
            assert!(parse_expression_str(raw).is_err(), "{} should fail", raw);
        }
    }

    #[test]
    fn test_alternation_rejects() {
        for raw in ["", "+", "x y", "x + + y", "x +", "* x"] {
            assert!(parse_expression_str(raw).is_err(), "{} should fail", raw);
        }
    }

    #[test]
    fn test_unmatched_parentheses() {
        assert!(matches!(
            parse_expression_str("(x + y"),
            Err(SpaError::Expression(_))
        ));
        assert!(matches!(
            parse_expression_str("x + y)"),
            Err(SpaError::Expression(_))
        ));
    }

    #[test]
    fn test_ast_shape() {
        let parsed = parse_expression_str("x + y * 2").unwrap();
        assert_eq!(parsed.ast.kind(), NodeKind::ExpressionOp);
        assert_eq!(parsed.ast.value(), Some("+"));
        assert_eq!(parsed.ast.children()[0].value(), Some("x"));
        assert_eq!(parsed.ast.children()[1].value(), Some("*"));
    }

    #[test]
    fn test_operand_multiset_preserved() {
        let parsed = parse_expression_str("(a + b) * (c - 4) % a").unwrap();
        let mut operands: Vec<_> = parsed
            .rpn
            .iter()
            .filter(|t| t.token_type().is_operand())
            .map(|t| t.value().to_string())
            .collect();
        operands.sort();
        assert_eq!(operands, vec!["4", "a", "a", "b", "c"]);
    }

    #[test]
    fn test_conditional_tokeniser() {
        let tokens = tokenise_conditional_expression("!(x != 1) && (y>=2)").unwrap();
        let types: Vec<_> = tokens.iter().map(Token::token_type).collect();
        assert_eq!(types[0], TokenType::ConditionalOp);
        assert_eq!(types[3], TokenType::RelationalOp);
        assert_eq!(tokens[3].value(), "!=");
        assert!(tokenise_conditional_expression("x # 1").is_err());
    }
}
