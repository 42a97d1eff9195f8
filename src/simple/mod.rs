// SPDX-License-Identifier: PMPL-1.0-or-later

//! SIMPLE front end: lexer, expression parser, program parser and AST

pub mod ast;
pub mod call_graph;
pub mod expression;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{NodeKind, TNode};
pub use call_graph::CallGraph;
pub use expression::{parse_expression, parse_expression_str, ParsedExpression};
pub use lexer::tokenise;
pub use parser::parse;
pub use token::{Token, TokenList, TokenType};
