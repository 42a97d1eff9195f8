// SPDX-License-Identifier: PMPL-1.0-or-later

//! Program Query Language engine
//!
//! Queries flow through [`parser`] into a [`query::Query`], are rewritten by
//! [`optimizer`], evaluated clause by clause into [`table::ResultTable`]s by
//! [`evaluator`], and formatted by [`result::project`].

pub mod evaluator;
pub mod optimizer;
pub mod parser;
pub mod processor;
pub mod query;
pub mod result;
pub mod table;

pub use evaluator::{evaluate_query, evaluate_with_settings};
pub use optimizer::OptimizerSettings;
pub use parser::{parse_query, QueryParserConfig};
pub use processor::QueryProcessor;
pub use query::{Clause, ClauseParam, DesignEntity, Element, PatternExpr, Query, Selection};
pub use result::{project, QueryResult};
pub use table::{Column, Database, ResultTable, Row};
