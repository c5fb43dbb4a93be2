#![forbid(unsafe_code)]
//! Quipu: declarative class-style suites for callback-driven test runners
//!
//! Quipu lets test authors describe suites as classes with annotated methods instead of
//! nested registration calls, then lowers that metadata into an existing runner's
//! primitive registrations (suites, tests, lifecycle hooks, skip/only/pending variants,
//! per-test timeout/slow/retry knobs). The runner itself stays on the far side of a
//! narrow trait boundary (`runner` module); quipu does no scheduling, reporting, or
//! discovery of its own.
//!
//! The moving parts:
//!
//! - `model`: the explicit class record ([`SuiteClass`]/[`ClassSpec`]): constructor,
//!   hooks, methods with recorded arity, inheritance linkage.
//! - `metadata`: side tables holding everything declarators record about classes and
//!   methods.
//! - `declare`: the declarator surface ([`Registry`], suite/test/params declarators,
//!   execution modifiers, context injection).
//! - `traits`: composable registration-time modifiers and the numeric builtins.
//! - `builder`: lowers a declared class into runner calls at suite-construction time.
//! - `interface`: registers the whole surface as a named runner interface and re-derives
//!   the BDD-style functions scoped to a registration context.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Registration paths**: configuration mistakes surface as [`RegisterError`] values
//!   propagated with `?` (invalid inheritance, unknown member keys).
//! - **True invariants**: impossible-by-construction states use
//!   `.expect("INVARIANT: reason")` or a panic with an `INVARIANT:` message (for example
//!   a tagged trait applied in a position its shape forbids). These indicate wiring bugs,
//!   not user errors.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! ## Example
//!
//! ```
//! use quipu::{ClassSpec, Registry, subject, timeout};
//! use serde_json::json;
//!
//! struct Calculator {
//!     total: i64,
//! }
//!
//! let class = ClassSpec::new("Calculator")
//!     .construct(|| Calculator { total: 0 })
//!     .method_with_params("adds", |instance, payload| {
//!         let calc = subject::<Calculator>(instance);
//!         calc.total += payload["amount"].as_i64().unwrap();
//!         assert_eq!(calc.total, payload["expected"].as_i64().unwrap());
//!     })
//!     .build();
//!
//! let registry = Registry::new();
//! registry.params().case(&class, "adds", json!({"amount": 2, "expected": 2})).unwrap();
//! registry.params().case(&class, "adds", json!({"amount": 3, "expected": 3})).unwrap();
//! timeout(500).on_class(&registry, &class);
//! // Suite registration happens through a runner interface; see the `interface` module.
//! ```

mod builder;
pub mod declare;
pub mod di;
pub mod interface;
pub mod metadata;
pub mod model;
pub mod runner;
pub mod traits;

pub use declare::{
    ContextBinding, ExecutionModifier, ParamsDeclarator, Registry, SuiteDeclarator, TestDeclarator,
};
pub use di::{DefaultConstruct, InstanceProvider, ProviderChain};
pub use interface::{DeclarativeInterface, Dsl, INTERFACE_NAME};
pub use metadata::{ClassRecord, MetadataStore, MethodRecord, NamingFn, ParamCase};
pub use model::{
    subject, CallArgs, ClassId, ClassSpec, Instance, InstanceHook, MemberId, Method, StaticHook,
    SuiteClass,
};
pub use runner::{
    ContextApi, Ctx, Done, HookRegistration, InterfaceRegistry, MemberBody, RegisterError,
    SuiteBuild, SuiteScope, TestRegistration,
};
pub use traits::{
    retries, skip_on_error, slow, suite_trait, test_trait, timeout, NumericTrait, Trait,
};

pub use quipu_core::{Invocation, Mark, MarkKind, MarkSet, Variant};
