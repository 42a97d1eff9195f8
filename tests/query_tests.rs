// SPDX-License-Identifier: PMPL-1.0-or-later

//! End-to-end query evaluation over the sample program

mod common;

use common::{answers, bip_profile, processor};
use simple_spa::pql::OptimizerSettings;
use simple_spa::{EngineProfile, ErrorKind};

fn default_answers(query: &str) -> Vec<String> {
    answers(EngineProfile::default(), query)
}

#[test]
fn test_all_variables() {
    assert_eq!(default_answers("variable v, k; Select v").len(), 7);
}

#[test]
fn test_assignments_nested_under_while() {
    assert_eq!(
        default_answers("assign a; Select a such that Parent*(14, a)"),
        vec!["16", "17", "18"]
    );
}

#[test]
fn test_unsatisfiable_clause_wins() {
    let clauses = "such that Follows(1, 2) and Follows(2, 1) and Parent(5, 6)";
    assert!(default_answers(&format!("stmt s; Select s {}", clauses)).is_empty());
    assert_eq!(
        default_answers(&format!("Select BOOLEAN {}", clauses)),
        vec!["FALSE"]
    );
}

#[test]
fn test_procedure_relations() {
    assert_eq!(
        default_answers(r#"procedure p; Select p such that Modifies(p, "flag")"#),
        vec!["compute", "main", "report"]
    );
    assert_eq!(
        default_answers(r#"procedure p; Select p such that Calls*("main", p)"#),
        vec!["compute", "report"]
    );
    assert_eq!(
        default_answers("call c; Select c.procName"),
        vec!["compute", "report"]
    );
}

#[test]
fn test_uses_through_calls() {
    assert_eq!(
        default_answers(r#"stmt s; Select s such that Uses(s, "z") with s.stmt# = 4"#),
        vec!["4"]
    );
}

#[test]
fn test_next_and_affects() {
    assert_eq!(default_answers("prog_line n; Select n such that Next(5, n)"), vec!["6", "8"]);
    assert_eq!(default_answers("Select BOOLEAN such that Next*(7, 7)"), vec!["TRUE"]);
    assert_eq!(default_answers("Select BOOLEAN such that Affects(6, 6)"), vec!["TRUE"]);
    assert_eq!(default_answers("Select BOOLEAN such that Affects(2, 7)"), vec!["TRUE"]);
    assert_eq!(default_answers("Select BOOLEAN such that Affects(9, 16)"), vec!["FALSE"]);
}

#[test]
fn test_patterns() {
    assert_eq!(
        default_answers(r#"assign a; Select a pattern a(_, _"count * 2"_)"#),
        vec!["7"]
    );
    assert_eq!(
        default_answers(r#"assign a; variable v; Select v pattern a(v, "z - y")"#),
        vec!["total"]
    );
    assert_eq!(
        default_answers("if ifs; variable v; Select <ifs, v> pattern ifs(v, _, _)"),
        vec!["10 z", "15 y", "15 z"]
    );
}

#[test]
fn test_merge_modes_agree_under_projection() {
    let queries = [
        "assign a; while w; variable v; Select <a, w> such that Parent(w, a) and Modifies(a, v) pattern a(v, _)",
        "assign a; stmt s; procedure p; Select <s, p> such that Follows(s, a) and Modifies(p, \"total\")",
        "stmt s1, s2; assign a; Select a such that Follows*(s1, s2) and Uses(a, \"y\")",
        "call c; assign a; Select <c, a> with c.procName = \"report\" such that Next*(a, c)",
    ];
    let grouped = EngineProfile::default();
    let naive = EngineProfile {
        optimizer: OptimizerSettings {
            group_before_merge: false,
            ..OptimizerSettings::enabled()
        },
        ..EngineProfile::default()
    };
    let disabled = EngineProfile {
        optimize: false,
        ..EngineProfile::default()
    };
    for query in queries {
        let expected = answers(grouped, query);
        assert!(!expected.is_empty(), "{}", query);
        assert_eq!(answers(naive, query), expected, "{}", query);
        assert_eq!(answers(disabled, query), expected, "{}", query);
    }
}

#[test]
fn test_semantic_errors() {
    let processor = processor(EngineProfile::default());
    assert_eq!(
        processor.process(r#"Select BOOLEAN such that Uses(_, "x")"#).unwrap(),
        vec!["FALSE"]
    );
    let err = processor
        .process("variable v; Select v such that Parent(v, 2)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_bip_relations_gated_by_profile() {
    let query = "stmt s; Select s such that NextBip(4, s)";
    let err = processor(EngineProfile::default()).process(query).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    assert_eq!(answers(bip_profile(), query), vec!["9"]);
    assert_eq!(answers(bip_profile(), "stmt s; Select s such that NextBip(19, s)"), vec!["5"]);
    assert_eq!(
        answers(bip_profile(), "assign a; Select a such that AffectsBip(9, a)"),
        vec!["16", "17"]
    );
}
