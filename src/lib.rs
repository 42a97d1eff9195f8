// SPDX-License-Identifier: PMPL-1.0-or-later

//! simple-spa: static program analysis for the SIMPLE teaching language.
//!
//! A SIMPLE program is lexed and parsed into an owned AST, validated as a
//! whole (declared callees, no recursion), and walked by the design
//! extractor into a program knowledge base. PQL queries are then parsed,
//! optimized and evaluated against that knowledge base.
//!
//! ENGINE PILLARS:
//! 1. **simple**: lexer, shunting-yard expression parser and recursive-descent
//!    program parser.
//! 2. **pkb**: fact store, control flow graphs and the design extractor.
//! 3. **pql**: query parser, optimizer, relational evaluator and projector.

pub mod batch;
pub mod config;
pub mod error;
pub mod pkb;
pub mod pql;
pub mod simple;
pub mod types;

pub use config::EngineProfile;
pub use error::{ErrorKind, SpaError, SpaResult};
pub use pkb::{extract, KnowledgeBase, Pkb};
pub use pql::{QueryProcessor, QueryResult};
pub use simple::parse;
