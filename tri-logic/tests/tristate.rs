// tri-logic/tests/tristate.rs
// ============================================================================
// Module: Tri-State Tests
// Description: Tests for tri-state logic tables and group semantics.
// ============================================================================
//! ## Overview
//! Validates tri-state evaluation under Kleene and Bochvar logic, the
//! `require_group` default semantics, and `LogicMode` dispatch. These are the
//! same logic tables the velocity engine uses to fold per-rule contributions
//! into a single evaluation result when a dependency is unavailable.

use tri_logic::BochvarLogic;
use tri_logic::GroupCounts;
use tri_logic::KleeneLogic;
use tri_logic::LogicMode;
use tri_logic::NoopTrace;
use tri_logic::RequirementTrace;
use tri_logic::TriLogic;
use tri_logic::TriState;

#[test]
fn kleene_and_propagates_unknown_unless_either_side_false() {
    assert_eq!(KleeneLogic.and(TriState::True, TriState::Unknown), TriState::Unknown);
    assert_eq!(KleeneLogic.and(TriState::False, TriState::Unknown), TriState::False);
    assert_eq!(KleeneLogic.and(TriState::True, TriState::True), TriState::True);
}

#[test]
fn kleene_or_propagates_unknown_unless_either_side_true() {
    assert_eq!(KleeneLogic.or(TriState::False, TriState::Unknown), TriState::Unknown);
    assert_eq!(KleeneLogic.or(TriState::True, TriState::Unknown), TriState::True);
    assert_eq!(KleeneLogic.or(TriState::False, TriState::False), TriState::False);
}

#[test]
fn kleene_not_is_involutive_on_known_values() {
    assert_eq!(KleeneLogic.not(TriState::True), TriState::False);
    assert_eq!(KleeneLogic.not(TriState::False), TriState::True);
    assert_eq!(KleeneLogic.not(TriState::Unknown), TriState::Unknown);
}

#[test]
fn bochvar_unknown_is_infectious() {
    assert_eq!(BochvarLogic.and(TriState::True, TriState::Unknown), TriState::Unknown);
    assert_eq!(BochvarLogic.and(TriState::False, TriState::Unknown), TriState::Unknown);
    assert_eq!(BochvarLogic.or(TriState::True, TriState::Unknown), TriState::Unknown);
}

#[test]
fn require_group_insufficient_evidence_yields_unknown() {
    let counts = GroupCounts { satisfied: 1, unknown: 1, total: 3 };
    assert_eq!(KleeneLogic.require_group(2, counts), TriState::Unknown);
}

#[test]
fn require_group_enough_failures_yields_false() {
    let counts = GroupCounts { satisfied: 1, unknown: 0, total: 3 };
    assert_eq!(counts.failed(), 2);
    assert_eq!(KleeneLogic.require_group(2, counts), TriState::False);
}

#[test]
fn require_group_zero_minimum_always_true() {
    let counts = GroupCounts { satisfied: 0, unknown: 0, total: 0 };
    assert_eq!(KleeneLogic.require_group(0, counts), TriState::True);
}

#[test]
fn logic_mode_dispatches_to_matching_table() {
    assert_eq!(
        LogicMode::Kleene.and(TriState::True, TriState::Unknown),
        KleeneLogic.and(TriState::True, TriState::Unknown)
    );
    assert_eq!(
        LogicMode::Bochvar.and(TriState::True, TriState::Unknown),
        BochvarLogic.and(TriState::True, TriState::Unknown)
    );
}

#[test]
fn noop_trace_accepts_predicate_events_without_panicking() {
    let mut trace = NoopTrace;
    trace.on_predicate_evaluated(&"velocity:card_hash", TriState::Unknown);
}

#[test]
fn bool_conversion_maps_true_and_false() {
    assert_eq!(TriState::from(true), TriState::True);
    assert_eq!(TriState::from(false), TriState::False);
    assert!(TriState::Unknown.is_unknown());
}
