// SPDX-License-Identifier: PMPL-1.0-or-later

//! One-stop query answering over a parsed program

use crate::config::EngineProfile;
use crate::error::SpaResult;
use crate::pkb::{extract, Pkb};
use crate::pql::evaluator::evaluate_with_settings;
use crate::pql::parser::parse_query;
use crate::pql::result::{project, QueryResult};
use crate::simple::parse;
use tracing::info;

/// Owns the knowledge base of one program and answers PQL against it
pub struct QueryProcessor {
    pkb: Pkb,
    profile: EngineProfile,
}

impl QueryProcessor {
    pub fn new(pkb: Pkb, profile: EngineProfile) -> Self {
        Self { pkb, profile }
    }

    /// Parse, validate and extract a SIMPLE program
    pub fn from_source(source: &str, profile: EngineProfile) -> SpaResult<Self> {
        let program = parse(source)?;
        let pkb = extract(&program)?;
        info!(statements = pkb.statement_count(), "knowledge base ready");
        Ok(Self::new(pkb, profile))
    }

    pub fn pkb(&self) -> &Pkb {
        &self.pkb
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    pub fn evaluate(&self, text: &str) -> SpaResult<QueryResult> {
        let query = parse_query(text, &self.profile.parser_config())?;
        evaluate_with_settings(&query, &self.pkb, &self.profile.settings())
    }

    /// Answer a query as output lines
    pub fn process(&self, text: &str) -> SpaResult<Vec<String>> {
        self.evaluate(text).map(|result| project(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn processor() -> QueryProcessor {
        QueryProcessor::from_source(
            "procedure main { x = 1; call other; } procedure other { print x; }",
            EngineProfile::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_process_entity_query() {
        assert_eq!(
            processor().process("procedure p; Select p such that Calls(p, _)").unwrap(),
            vec!["main"]
        );
    }

    #[test]
    fn test_semantic_error_degrades_boolean() {
        let processor = processor();
        assert_eq!(
            processor.process("Select BOOLEAN such that Follows(s, 1)").unwrap(),
            vec!["FALSE"]
        );
        assert!(processor.process("stmt s; Select v such that Follows(s, 1)").is_err());
    }

    #[test]
    fn test_syntax_error_propagates_for_boolean() {
        let err = processor().process("Select BOOLEAN such that").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuerySyntax);
    }
}
