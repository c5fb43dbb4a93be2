//! Trait engine and builtin trait factories
//!
//! A trait is a named, tagged callable applied at suite-build time. The tag (the enum
//! variant) is what lets registration code tell traits apart from other values and reject
//! a trait used in a position its shape does not permit:
//!
//! - suite traits receive the suite registration scope and the class;
//! - test traits receive the live test context, the instance, and the method;
//! - numeric traits carry a single value and apply in either position.
//!
//! The numeric builtins (`slow`, `timeout`, `retries`) double as bare class/method
//! decorators: their value is then stored in the metadata record and applied by the suite
//! builder before any listed trait runs.

use std::cell::Cell;
use std::rc::Rc;

use crate::declare::Registry;
use crate::metadata::MethodRecord;
use crate::model::{Instance, Method, SuiteClass};
use crate::runner::{Ctx, HookRegistration, RegisterError, SuiteScope};

/// A registration-time modifier for suites and tests.
#[derive(Clone)]
pub enum Trait {
    Suite {
        name: Rc<str>,
        run: Rc<dyn Fn(&mut dyn SuiteScope, &SuiteClass)>,
    },
    Test {
        name: Rc<str>,
        run: Rc<dyn Fn(&Ctx, &mut Instance, &Method)>,
    },
    Numeric(NumericTrait),
}

impl Trait {
    pub fn name(&self) -> &str {
        match self {
            Trait::Suite { name, .. } | Trait::Test { name, .. } => name,
            Trait::Numeric(numeric) => numeric.concern.key(),
        }
    }

    /// Apply in suite position. A test-shaped trait here is a wiring bug and fails loudly
    /// rather than silently doing nothing.
    pub(crate) fn apply_suite(&self, scope: &mut dyn SuiteScope, class: &SuiteClass) {
        tracing::trace!(name = self.name(), class = class.name(), "applying suite trait");
        match self {
            Trait::Suite { run, .. } => (**run)(scope, class),
            Trait::Numeric(numeric) => numeric.apply_to_scope(scope),
            Trait::Test { name, .. } => {
                panic!("INVARIANT: test trait `{name}` applied in suite position")
            }
        }
    }

    /// Apply in test position. A suite-shaped trait here fails loudly.
    pub(crate) fn apply_test(&self, ctx: &Ctx, instance: &mut Instance, method: &Method) {
        tracing::trace!(name = self.name(), method = method.key(), "applying test trait");
        match self {
            Trait::Test { run, .. } => (**run)(ctx, instance, method),
            Trait::Numeric(numeric) => numeric.apply_to_ctx(ctx),
            Trait::Suite { name, .. } => {
                panic!("INVARIANT: suite trait `{name}` applied in test position")
            }
        }
    }
}

/// Tag a closure as a suite trait.
pub fn suite_trait(
    name: &str,
    run: impl Fn(&mut dyn SuiteScope, &SuiteClass) + 'static,
) -> Trait {
    Trait::Suite {
        name: Rc::from(name),
        run: Rc::new(run),
    }
}

/// Tag a closure as a test trait.
pub fn test_trait(name: &str, run: impl Fn(&Ctx, &mut Instance, &Method) + 'static) -> Trait {
    Trait::Test {
        name: Rc::from(name),
        run: Rc::new(run),
    }
}

/// The three numeric cross-cutting concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericConcern {
    Slow,
    Timeout,
    Retries,
}

impl NumericConcern {
    fn key(self) -> &'static str {
        match self {
            NumericConcern::Slow => "slow",
            NumericConcern::Timeout => "timeout",
            NumericConcern::Retries => "retries",
        }
    }

    fn store(self, record: &mut MethodRecord, value: u64) {
        match self {
            NumericConcern::Slow => record.slow = Some(value),
            NumericConcern::Timeout => record.timeout = Some(value),
            NumericConcern::Retries => record.retries = Some(value),
        }
    }
}

/// A numeric trait value: slow threshold, timeout, or retry count.
///
/// Works in every decorator position: bare class decorator ([`Self::on_class`]), bare
/// method decorator ([`Self::on_method`]), and as an entry in a suite or test trait list
/// (via `Trait::from`). Timeout is always forwarded; slow and retries are forwarded only
/// when the runner context supports them, and are no-ops otherwise.
#[derive(Debug, Clone, Copy)]
pub struct NumericTrait {
    concern: NumericConcern,
    value: u64,
}

/// Set a test/suite execution time that is considered slow, in milliseconds.
pub fn slow(ms: u64) -> NumericTrait {
    NumericTrait {
        concern: NumericConcern::Slow,
        value: ms,
    }
}

/// Set a test or suite timeout, in milliseconds.
pub fn timeout(ms: u64) -> NumericTrait {
    NumericTrait {
        concern: NumericConcern::Timeout,
        value: ms,
    }
}

/// Set the number of retries to attempt when running a test.
pub fn retries(count: u64) -> NumericTrait {
    NumericTrait {
        concern: NumericConcern::Retries,
        value: count,
    }
}

impl NumericTrait {
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Class-decorator position: record the value on the class.
    pub fn on_class(&self, registry: &Registry, class: &SuiteClass) {
        let mut store = registry.store.borrow_mut();
        let record = store.class_mut(class.id());
        match self.concern {
            NumericConcern::Slow => record.slow = Some(self.value),
            NumericConcern::Timeout => record.timeout = Some(self.value),
            NumericConcern::Retries => record.retries = Some(self.value),
        }
    }

    /// Method-decorator position: record the value on the named method or hook.
    pub fn on_method(
        &self,
        registry: &Registry,
        class: &SuiteClass,
        key: &str,
    ) -> Result<(), RegisterError> {
        let id = class.member_id(key).ok_or_else(|| RegisterError::UnknownMember {
            class: class.name().to_string(),
            key: key.to_string(),
        })?;
        let mut store = registry.store.borrow_mut();
        self.concern.store(store.member_mut(id), self.value);
        Ok(())
    }

    /// Suite-trait position: forward the value to the suite scope.
    pub fn apply_to_scope(&self, scope: &mut dyn SuiteScope) {
        match self.concern {
            NumericConcern::Timeout => scope.timeout(self.value),
            NumericConcern::Slow => {
                let _ = scope.try_slow(self.value);
            }
            NumericConcern::Retries => {
                let _ = scope.try_retries(self.value);
            }
        }
    }

    /// Test-trait position: forward the value to the live context.
    pub fn apply_to_ctx(&self, ctx: &Ctx) {
        let mut ctx = ctx.borrow_mut();
        match self.concern {
            NumericConcern::Timeout => ctx.timeout(self.value),
            NumericConcern::Slow => {
                let _ = ctx.try_slow(self.value);
            }
            NumericConcern::Retries => {
                let _ = ctx.try_retries(self.value);
            }
        }
    }
}

impl From<NumericTrait> for Trait {
    fn from(numeric: NumericTrait) -> Trait {
        Trait::Numeric(numeric)
    }
}

/// Suite trait: once any test in the suite fails, skip the remaining tests.
///
/// Each application owns one failure flag whose lifetime equals the suite's: a before-each
/// hook skips the current test while the flag is set, an after-each hook raises the flag
/// when the test that just ran failed.
pub fn skip_on_error() -> Trait {
    suite_trait("skip_on_error", |scope, _class| {
        let failed = Rc::new(Cell::new(false));

        let flag = failed.clone();
        scope.before_each(HookRegistration::sync("skip_on_error", move |ctx| {
            if flag.get() {
                ctx.borrow_mut().skip();
            }
        }));

        let flag = failed;
        scope.after_each(HookRegistration::sync("skip_on_error", move |ctx| {
            if ctx.borrow().current_test_failed() {
                flag.set(true);
            }
        }));
    })
}
