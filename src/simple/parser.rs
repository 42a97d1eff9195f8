// SPDX-License-Identifier: PMPL-1.0-or-later

//! Recursive-descent parser for SIMPLE programs
//!
//! Tokens are consumed destructively from the front of a [`TokenList`], so
//! every decision is made with single-token lookahead. All mutable state
//! (token queue, statement counter, call graph) lives in a [`Parser`] that is
//! created per [`parse`] call.

use crate::error::{SpaError, SpaResult};
use crate::simple::ast::{NodeKind, TNode};
use crate::simple::call_graph::CallGraph;
use crate::simple::expression::parse_expression;
use crate::simple::lexer::tokenise;
use crate::simple::token::{Token, TokenList, TokenType};
use tracing::debug;

/// Parse and validate a SIMPLE program, returning the `Program` root
pub fn parse(source: &str) -> SpaResult<TNode> {
    let tokens = tokenise(source)?;
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;

    if let Some(name) = parser.duplicate_procedures.first() {
        return Err(SpaError::validation(format!(
            "procedure '{}' is declared more than once",
            name
        )));
    }
    parser.call_graph.validate_declared()?;
    parser.call_graph.validate_non_recursive_calls()?;

    debug!(
        procedures = program.children().len(),
        statements = parser.statement_counter,
        "parsed SIMPLE program"
    );
    Ok(program)
}

pub struct Parser {
    tokens: TokenList,
    statement_counter: usize,
    call_graph: CallGraph,
    duplicate_procedures: Vec<String>,
    current_procedure: String,
}

impl Parser {
    pub fn new(tokens: TokenList) -> Self {
        Self {
            tokens,
            statement_counter: 0,
            call_graph: CallGraph::new(),
            duplicate_procedures: Vec::new(),
            current_procedure: String::new(),
        }
    }

    pub fn parse_program(&mut self) -> SpaResult<TNode> {
        let mut program = TNode::new(NodeKind::Program);
        if self.tokens.is_empty() {
            return Err(SpaError::syntax("program must declare at least one procedure"));
        }
        while !self.tokens.is_empty() {
            program = program.with_child(self.parse_procedure()?);
        }
        Ok(program)
    }

    fn parse_procedure(&mut self) -> SpaResult<TNode> {
        self.tokens.pop_expect(TokenType::ProcedureKeyword)?;
        let name = self.tokens.pop_expect(TokenType::ProcedureName)?;
        // Reported once the whole program has parsed
        if !self.call_graph.declare(name.value()) {
            self.duplicate_procedures.push(name.value().to_string());
        }
        self.current_procedure = name.value().to_string();

        self.tokens.pop_expect(TokenType::LeftBrace)?;
        let body = self.parse_statement_list()?;
        self.tokens.pop_expect(TokenType::RightBrace)?;

        Ok(TNode::leaf(NodeKind::Procedure, name.value()).with_child(body))
    }

    fn parse_statement_list(&mut self) -> SpaResult<TNode> {
        let mut statements = Vec::new();
        while !self.tokens.is_empty() && !self.tokens.peek_match(TokenType::RightBrace) {
            statements.push(self.parse_statement()?);
        }
        if statements.is_empty() {
            return Err(SpaError::syntax(format!(
                "statement list in procedure '{}' is empty",
                self.current_procedure
            )));
        }
        Ok(TNode::new(NodeKind::StatementList).with_children(statements))
    }

    fn parse_statement(&mut self) -> SpaResult<TNode> {
        self.statement_counter += 1;
        let number = self.statement_counter;

        let token_type = match self.tokens.peek() {
            Some(token) => token.token_type(),
            None => return Err(SpaError::syntax("expected a statement but reached end of input")),
        };

        match token_type {
            TokenType::CallKeyword => self.parse_call(number),
            TokenType::ReadKeyword => self.parse_io(number, TokenType::ReadKeyword, NodeKind::Read),
            TokenType::PrintKeyword => {
                self.parse_io(number, TokenType::PrintKeyword, NodeKind::Print)
            }
            TokenType::WhileKeyword => self.parse_while(number),
            TokenType::IfKeyword => self.parse_if(number),
            TokenType::VariableName => self.parse_assign(number),
            _ => Err(SpaError::syntax(format!(
                "unexpected '{}' at start of statement {}",
                self.tokens.context(),
                number
            ))),
        }
    }

    fn parse_call(&mut self, number: usize) -> SpaResult<TNode> {
        self.tokens.pop_expect(TokenType::CallKeyword)?;
        let callee = self.tokens.pop_expect(TokenType::ProcedureName)?;
        self.tokens.pop_expect(TokenType::Semicolon)?;

        let caller = self.current_procedure.clone();
        self.call_graph.add_call(&caller, callee.value());
        Ok(TNode::leaf(NodeKind::Call, callee.value()).with_statement_number(number))
    }

    fn parse_io(&mut self, number: usize, keyword: TokenType, kind: NodeKind) -> SpaResult<TNode> {
        self.tokens.pop_expect(keyword)?;
        let variable = self.tokens.pop_expect(TokenType::VariableName)?;
        self.tokens.pop_expect(TokenType::Semicolon)?;

        Ok(TNode::new(kind)
            .with_statement_number(number)
            .with_child(TNode::leaf(NodeKind::Variable, variable.value())))
    }

    fn parse_assign(&mut self, number: usize) -> SpaResult<TNode> {
        let variable = self.tokens.pop_expect(TokenType::VariableName)?;
        self.tokens.pop_expect(TokenType::Assign)?;

        let mut expression = Vec::new();
        while !self.tokens.is_empty() && !self.tokens.peek_match(TokenType::Semicolon) {
            if let Some(token) = self.tokens.pop_front() {
                expression.push(token);
            }
        }
        self.tokens.pop_expect(TokenType::Semicolon)?;

        let parsed = parse_expression(&expression)?;
        let rpn = parsed.rpn_values();
        Ok(TNode::new(NodeKind::Assign)
            .with_statement_number(number)
            .with_child(TNode::leaf(NodeKind::Variable, variable.value()))
            .with_child(parsed.ast)
            .with_rpn(rpn))
    }

    fn parse_while(&mut self, number: usize) -> SpaResult<TNode> {
        self.tokens.pop_expect(TokenType::WhileKeyword)?;
        let condition = self.take_condition()?;
        let condition = parse_conditional_expression(&condition)?;

        self.tokens.pop_expect(TokenType::LeftBrace)?;
        let body = self.parse_statement_list()?;
        self.tokens.pop_expect(TokenType::RightBrace)?;

        Ok(TNode::new(NodeKind::While)
            .with_statement_number(number)
            .with_child(condition)
            .with_child(body))
    }

    fn parse_if(&mut self, number: usize) -> SpaResult<TNode> {
        self.tokens.pop_expect(TokenType::IfKeyword)?;
        let condition = self.take_condition()?;
        let condition = parse_conditional_expression(&condition)?;

        self.tokens.pop_expect(TokenType::ThenKeyword)?;
        self.tokens.pop_expect(TokenType::LeftBrace)?;
        let then_branch = self.parse_statement_list()?;
        self.tokens.pop_expect(TokenType::RightBrace)?;

        self.tokens.pop_expect(TokenType::ElseKeyword)?;
        self.tokens.pop_expect(TokenType::LeftBrace)?;
        let else_branch = self.parse_statement_list()?;
        self.tokens.pop_expect(TokenType::RightBrace)?;

        Ok(TNode::new(NodeKind::If)
            .with_statement_number(number)
            .with_child(condition)
            .with_child(then_branch)
            .with_child(else_branch))
    }

    /// Pop `( ... )` and return the tokens strictly inside the outer parentheses
    fn take_condition(&mut self) -> SpaResult<Vec<Token>> {
        self.tokens.pop_expect(TokenType::LeftParen)?;
        let mut depth = 1usize;
        let mut condition = Vec::new();

        loop {
            let token = self.tokens.pop_front().ok_or_else(|| {
                SpaError::syntax("unterminated condition: missing ')'")
            })?;
            match token.token_type() {
                TokenType::LeftParen => depth += 1,
                TokenType::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(condition);
                    }
                }
                _ => {}
            }
            condition.push(token);
        }
    }
}

/// Parse a conditional expression: a relative expression, `!(c)`, or
/// `(c) && (c)` / `(c) || (c)`
pub fn parse_conditional_expression(tokens: &[Token]) -> SpaResult<TNode> {
    let Some(first) = tokens.first() else {
        return Err(SpaError::syntax("empty conditional expression"));
    };

    if is_relative_expression(tokens) {
        return parse_relative_expression(tokens);
    }

    if first.is(TokenType::ConditionalOp, "!") {
        let open = 1;
        if !tokens
            .get(open)
            .is_some_and(|t| t.token_type() == TokenType::LeftParen)
        {
            return Err(condition_error("'!' must be followed by '('", tokens));
        }
        let close = matching_paren(tokens, open)?;
        if close != tokens.len() - 1 {
            return Err(condition_error("trailing tokens after '!(...)'", tokens));
        }
        let inner = parse_conditional_expression(&tokens[open + 1..close])?;
        return Ok(TNode::leaf(NodeKind::ConditionalExpressionOp, "!").with_child(inner));
    }

    if first.token_type() != TokenType::LeftParen {
        return Err(condition_error("expected '(' or '!'", tokens));
    }

    let lhs_close = matching_paren(tokens, 0)?;
    let operator = tokens
        .get(lhs_close + 1)
        .filter(|t| t.is(TokenType::ConditionalOp, "&&") || t.is(TokenType::ConditionalOp, "||"))
        .ok_or_else(|| condition_error("expected '&&' or '||'", tokens))?;

    let rhs_open = lhs_close + 2;
    if !tokens
        .get(rhs_open)
        .is_some_and(|t| t.token_type() == TokenType::LeftParen)
    {
        return Err(condition_error("expected '(' after conditional operator", tokens));
    }
    let rhs_close = matching_paren(tokens, rhs_open)?;
    if rhs_close != tokens.len() - 1 {
        return Err(condition_error("trailing tokens after conditional expression", tokens));
    }

    let lhs = parse_conditional_expression(&tokens[1..lhs_close])?;
    let rhs = parse_conditional_expression(&tokens[rhs_open + 1..rhs_close])?;
    Ok(TNode::leaf(NodeKind::ConditionalExpressionOp, operator.value())
        .with_child(lhs)
        .with_child(rhs))
}

/// A condition is a bare relative expression when it holds no `! && ||`
fn is_relative_expression(tokens: &[Token]) -> bool {
    !tokens
        .iter()
        .any(|t| t.token_type() == TokenType::ConditionalOp)
}

/// `expr relop expr`, each side parsed independently
pub fn parse_relative_expression(tokens: &[Token]) -> SpaResult<TNode> {
    let mut depth = 0i32;
    let mut operator_at = None;

    for (index, token) in tokens.iter().enumerate() {
        match token.token_type() {
            TokenType::LeftParen => depth += 1,
            TokenType::RightParen => depth -= 1,
            TokenType::RelationalOp if depth == 0 => {
                if operator_at.is_some() {
                    return Err(condition_error("more than one relational operator", tokens));
                }
                operator_at = Some(index);
            }
            TokenType::RelationalOp => {
                return Err(condition_error("relational operator inside parentheses", tokens))
            }
            _ => {}
        }
    }

    let index = operator_at
        .ok_or_else(|| condition_error("missing relational operator", tokens))?;
    let lhs = parse_expression(&tokens[..index])?;
    let rhs = parse_expression(&tokens[index + 1..])?;

    Ok(TNode::leaf(NodeKind::RelativeExpressionOp, tokens[index].value())
        .with_child(lhs.ast)
        .with_child(rhs.ast))
}

fn matching_paren(tokens: &[Token], open: usize) -> SpaResult<usize> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token.token_type() {
            TokenType::LeftParen => depth += 1,
            TokenType::RightParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(index);
                }
            }
            _ => {}
        }
    }
    Err(condition_error("unbalanced parentheses", tokens))
}

fn condition_error(reason: &str, tokens: &[Token]) -> SpaError {
    let text = tokens
        .iter()
        .map(Token::value)
        .collect::<Vec<_>>()
        .join(" ");
    SpaError::syntax(format!("{} in condition '{}'", reason, text))
}
