// SPDX-License-Identifier: PMPL-1.0-or-later

//! Integration tests for the SIMPLE front end

mod common;

use common::SAMPLE_PROGRAM;
use simple_spa::simple::NodeKind;
use simple_spa::{parse, ErrorKind};

#[test]
fn test_sample_program_parses() {
    let program = parse(SAMPLE_PROGRAM).expect("sample should parse");
    assert_eq!(program.kind(), NodeKind::Program);
    assert_eq!(program.children().len(), 3);
    assert_eq!(program.statement_count(), 19);
    assert_eq!(program.variables().len(), 7);
}

#[test]
fn test_statement_numbers_follow_source_order() {
    let program = parse(SAMPLE_PROGRAM).unwrap();
    let report = &program.children()[2];
    assert_eq!(report.value(), Some("report"));

    let body = report.child(0).unwrap();
    let outer_while = &body.children()[0];
    assert_eq!(outer_while.kind(), NodeKind::While);
    assert_eq!(outer_while.statement_number(), Some(14));
    assert_eq!(body.children()[1].statement_number(), Some(19));
}

#[test]
fn test_recursive_programs_rejected() {
    let source = "
        procedure a { call b; }
        procedure b { call c; }
        procedure c { call a; }";
    assert_eq!(parse(source).unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn test_undeclared_procedure_rejected() {
    let err = parse("procedure main { call missing; }").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_malformed_sources_are_syntax_errors() {
    for source in [
        "procedure main { x = 1 }",
        "procedure main { }",
        "procedure { x = 1; }",
        "procedure main { while x > 1 { y = 2; } }",
        "procedure main { if (x > 1) { y = 2; } }",
        "procedure main { x = 1; } extra",
    ] {
        let err = parse(source).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::Syntax | ErrorKind::Expression),
            "{} gave {:?}",
            source,
            err
        );
    }
}

#[test]
fn test_bad_expressions_rejected() {
    for source in [
        "procedure main { x = (); }",
        "procedure main { x = 1 +; }",
        "procedure main { x = (1 + 2; }",
        "procedure main { x = 1 2; }",
    ] {
        assert!(parse(source).is_err(), "{}", source);
    }
}

#[test]
fn test_ast_serializes_to_json() {
    let program = parse("procedure main { x = a + 1; }").unwrap();
    let json = serde_json::to_string(&program).unwrap();
    assert!(json.contains("\"Program\""));
    assert!(json.contains("\"rpn\":[\"a\",\"1\",\"+\"]"));
}
