#![forbid(unsafe_code)]
//! Provide shared, pure registration semantics for the quipu suite engine.
//!
//! This crate is intentionally small and dependency-light. It contains deterministic policy
//! helpers that both:
//! - the suite builder can use when lowering declarative metadata into runner calls, and
//! - the engine's tests can use to state expected behavior without duplicating the rules.
//!
//! ## Notes
//!
//! - This is a "semantic core" crate: **no IO**, no global state, and no engine-specific types.
//! - Current scope: mark algebra (skip/only/pending combination and the two precedence rules),
//!   parameterized test-name resolution, and the declared-parameter-count asynchrony rule.

pub mod arity;
pub mod marks;
pub mod naming;

pub use arity::{Invocation, hook_invocation, method_invocation};
pub use marks::{Mark, MarkKind, MarkSet, Variant};
pub use naming::parameter_case_name;
