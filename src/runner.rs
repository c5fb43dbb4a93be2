//! Host test-runner boundary interfaces
//!
//! This module defines the narrow capability surface the suite engine consumes from the
//! underlying test runner:
//! - Suite construction (nested suite/test/hook registration, per-suite knobs)
//! - Live hook/test contexts (timeout/slow/retries, skip, failure state)
//! - The runner's pluggable interface registration point
//!
//! Everything else about the runner (its suite tree, reporters, scheduling, CLI) stays on
//! the other side of these traits. The engine only lowers metadata into these calls; tests
//! drive the engine through a scripted implementation of the same traits.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

pub use quipu_core::{Invocation, Variant};

/// Errors raised while lowering declarative metadata into runner registrations.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// A suite class may not extend another suite class. Raised at suite-build time, once
    /// the inheritance chain is actually walked.
    #[error("suite class `{derived}` cannot be a subclass of suite class `{ancestor}`")]
    NestedSuite { derived: String, ancestor: String },

    /// A declarator addressed a method or hook key the class does not define.
    #[error("class `{class}` has no method or hook named `{key}`")]
    UnknownMember { class: String, key: String },
}

/// Completion callback handed to asynchronous hooks and tests.
///
/// The host runner waits for it to fire before proceeding; `Err` carries the failure
/// message the runner should report.
pub type Done = Box<dyn FnOnce(Result<(), String>)>;

/// Shared handle to the live context of the currently running hook or test.
///
/// `Rc<RefCell<..>>` because suite construction and execution are single-threaded by
/// design; the handle is cloned into context-injection targets.
pub type Ctx = Rc<RefCell<dyn ContextApi>>;

/// Body of a registered hook or test.
///
/// The runner passes the live context and, for asynchronous registrations, the completion
/// callback to wait on.
pub type MemberBody = Box<dyn FnMut(&Ctx, Option<Done>)>;

/// Deferred suite-construction closure, invoked by the runner during its own
/// suite-building phase.
pub type SuiteBuild<'a> = Box<dyn FnOnce(&mut dyn SuiteScope) -> Result<(), RegisterError> + 'a>;

/// Capabilities of a live hook/test context.
///
/// `timeout` is always available; slow thresholds and retry counts are optional runner
/// features, so their setters report whether the runner honored the value. A `false`
/// return means the call was a no-op.
pub trait ContextApi {
    fn timeout(&mut self, ms: u64);
    fn try_slow(&mut self, ms: u64) -> bool;
    fn try_retries(&mut self, count: u64) -> bool;

    /// Mark the current test as skipped.
    fn skip(&mut self);

    /// Failure state of the current (most recently finished) test.
    fn current_test_failed(&self) -> bool;
}

/// Registration surface of one suite under construction.
pub trait SuiteScope {
    /// Register a nested suite. The builder closure runs synchronously, inside the
    /// runner's suite-construction phase; registration errors propagate out of it.
    fn suite(
        &mut self,
        name: &str,
        variant: Variant,
        build: SuiteBuild<'_>,
    ) -> Result<(), RegisterError>;

    /// Register a test in this suite.
    fn test(&mut self, registration: TestRegistration);

    fn before_all(&mut self, registration: HookRegistration);
    fn after_all(&mut self, registration: HookRegistration);
    fn before_each(&mut self, registration: HookRegistration);
    fn after_each(&mut self, registration: HookRegistration);

    /// Suite-level knobs, mirroring [`ContextApi`].
    fn timeout(&mut self, ms: u64);
    fn try_slow(&mut self, ms: u64) -> bool;
    fn try_retries(&mut self, count: u64) -> bool;
}

/// The runner's pluggable interface registration point.
///
/// Registering an interface under a name makes its registration surface available to
/// every suite-construction context the runner subsequently opens.
pub trait InterfaceRegistry {
    fn register_interface(&mut self, name: &str, interface: crate::interface::DeclarativeInterface);
}

/// One test registration, as handed to the host runner.
pub struct TestRegistration {
    /// Display name of the test.
    pub name: String,
    /// Name of the originating method, preserved for tooling and reporting.
    pub origin: String,
    pub variant: Variant,
    pub invocation: Invocation,
    pub body: MemberBody,
}

/// One lifecycle-hook registration, as handed to the host runner.
pub struct HookRegistration {
    /// Name of the originating member, preserved for tooling and reporting.
    pub name: String,
    pub invocation: Invocation,
    pub body: MemberBody,
}

impl HookRegistration {
    /// Build a synchronous hook from a plain context closure.
    pub fn sync(name: &str, mut body: impl FnMut(&Ctx) + 'static) -> Self {
        HookRegistration {
            name: name.to_string(),
            invocation: Invocation::Sync,
            body: Box::new(move |ctx, _done| body(ctx)),
        }
    }
}
