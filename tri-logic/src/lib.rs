// tri-logic/src/lib.rs
// ============================================================================
// Module: Tri-State Logic Root
// Description: Public API surface for the three-valued logic used to express
//              degraded/indeterminate evaluation outcomes.
// Purpose: Wire together the tristate module and its re-exports.
// Dependencies: crate::tristate
// ============================================================================

//! ## Overview
//! `True`/`False`/`Unknown` logic with Kleene and Bochvar group semantics.
//! Used by the velocity engine and rule evaluator to represent a rule
//! contribution that could not be determined because a dependency (the
//! counter store) was unavailable, without collapsing that case into either
//! a match or a non-match.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod tristate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use tristate::BochvarLogic;
pub use tristate::GroupCounts;
pub use tristate::KleeneLogic;
pub use tristate::LogicMode;
pub use tristate::NoopTrace;
pub use tristate::RequirementTrace;
pub use tristate::TriLogic;
pub use tristate::TriState;
