//! Metadata side tables
//!
//! Everything the declarators record about a class or method lives in explicit side tables
//! keyed by class/member identity, so descriptor storage cannot collide with user-visible
//! members at all.
//!
//! Records are created lazily on first touch, grow additively, and are read (never
//! mutated) by the suite builder at registration time. Every read of an untouched key
//! reports "absent" rather than an error.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use quipu_core::{Mark, MarkSet};

use crate::model::{ClassId, Instance, MemberId};
use crate::runner::Ctx;
use crate::traits::Trait;

/// Naming function for parameterized tests: payload in, display name out.
pub type NamingFn = Rc<dyn Fn(&Value) -> String>;

/// Context injector: hands the live per-test context handle to the instance.
pub type ContextInjector = Rc<dyn Fn(&mut Instance, &Ctx)>;

/// One parameterized-test entry.
///
/// The payload is opaque to the engine; it is cloned through to the method call. The mark
/// is independent of the owning method's marks and ORed with them at emission time.
#[derive(Clone)]
pub struct ParamCase {
    pub mark: Mark,
    pub name: Option<String>,
    pub payload: Value,
}

/// Per-method descriptor record.
///
/// A method is a test exactly when `test_name` is set.
#[derive(Clone, Default)]
pub struct MethodRecord {
    pub test_name: Option<String>,
    pub marks: MarkSet,
    pub traits: Vec<Trait>,
    pub cases: Vec<ParamCase>,
    pub naming: Option<NamingFn>,
    pub slow: Option<u64>,
    pub timeout: Option<u64>,
    pub retries: Option<u64>,
}

/// Per-class descriptor record.
#[derive(Clone, Default)]
pub struct ClassRecord {
    /// Set when the class has been declared a suite.
    pub is_suite: bool,
    pub marks: MarkSet,
    pub traits: Vec<Trait>,
    pub slow: Option<u64>,
    pub timeout: Option<u64>,
    pub retries: Option<u64>,
    pub context_inject: Option<ContextInjector>,
    /// Set once suite registration has consumed the class.
    pub handled: bool,
}

/// The side tables. One per [`crate::declare::Registry`].
#[derive(Default)]
pub struct MetadataStore {
    classes: HashMap<ClassId, ClassRecord>,
    members: HashMap<MemberId, MethodRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        MetadataStore::default()
    }

    /// Class record, created on first touch.
    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassRecord {
        self.classes.entry(id).or_default()
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassRecord> {
        self.classes.get(&id)
    }

    /// Member record, created on first touch.
    pub fn member_mut(&mut self, id: MemberId) -> &mut MethodRecord {
        self.members.entry(id).or_default()
    }

    pub fn member(&self, id: MemberId) -> Option<&MethodRecord> {
        self.members.get(&id)
    }

    pub fn is_suite(&self, id: ClassId) -> bool {
        self.class(id).is_some_and(|record| record.is_suite)
    }

    /// A member is a test when a declarator recorded a test name for it.
    pub fn is_test(&self, id: MemberId) -> bool {
        self.member(id).is_some_and(|record| record.test_name.is_some())
    }
}
