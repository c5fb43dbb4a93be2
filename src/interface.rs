//! Runner interface adapter
//!
//! Mirrors how the runner's stock BDD interface is put together, augmented with the
//! declarative constructors: installing [`DeclarativeInterface`] under its name makes the
//! whole surface available to every suite-construction context the runner opens, and
//! [`DeclarativeInterface::activate`] derives that surface, the [`Dsl`], for one
//! registration context. BDD blocks and declarative suites can nest inside each other
//! freely, since everything funnels into the same [`SuiteScope`] calls.

use quipu_core::{Invocation, Variant};

use crate::declare::{ParamsDeclarator, Registry, SuiteDeclarator, TestDeclarator};
use crate::model::CallArgs;
use crate::runner::{
    Ctx, Done, HookRegistration, InterfaceRegistry, RegisterError, SuiteScope, TestRegistration,
};

/// Name the declarative interface registers under.
pub const INTERFACE_NAME: &str = "quipu";

/// The pluggable interface: a [`Registry`] plus the ability to derive a [`Dsl`] for a
/// registration context.
#[derive(Clone, Default)]
pub struct DeclarativeInterface {
    registry: Registry,
}

impl DeclarativeInterface {
    pub fn new() -> Self {
        DeclarativeInterface {
            registry: Registry::new(),
        }
    }

    /// Build the interface around an existing registry (shared providers/metadata).
    pub fn with_registry(registry: Registry) -> Self {
        DeclarativeInterface { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register this interface with the host runner under [`INTERFACE_NAME`].
    pub fn install(self, host: &mut dyn InterfaceRegistry) {
        tracing::debug!(name = INTERFACE_NAME, "installing declarative interface");
        host.register_interface(INTERFACE_NAME, self);
    }

    /// Derive the registration surface for one suite-construction context.
    pub fn activate<'s>(&self, scope: &'s mut dyn SuiteScope) -> Dsl<'s> {
        Dsl {
            scope,
            registry: self.registry.clone(),
        }
    }
}

/// The full registration surface scoped to one context: the re-derived BDD functions plus
/// the declarative suite/test/params constructors.
pub struct Dsl<'s> {
    scope: &'s mut dyn SuiteScope,
    registry: Registry,
}

impl<'s> Dsl<'s> {
    pub(crate) fn scoped(scope: &'s mut dyn SuiteScope, registry: Registry) -> Self {
        Dsl { scope, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // BDD: suites
    // ------------------------------------------------------------------

    pub fn describe(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut Dsl<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), RegisterError> {
        self.describe_variant(name, Variant::Normal, build)
    }

    /// Alias for [`Self::describe`].
    pub fn context(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut Dsl<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), RegisterError> {
        self.describe(name, build)
    }

    pub fn describe_skip(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut Dsl<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), RegisterError> {
        self.describe_variant(name, Variant::Skip, build)
    }

    pub fn describe_only(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut Dsl<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), RegisterError> {
        self.describe_variant(name, Variant::Only, build)
    }

    fn describe_variant(
        &mut self,
        name: &str,
        variant: Variant,
        build: impl FnOnce(&mut Dsl<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), RegisterError> {
        let registry = self.registry.clone();
        self.scope.suite(
            name,
            variant,
            Box::new(move |scope| {
                let mut dsl = Dsl::scoped(scope, registry);
                build(&mut dsl)
            }),
        )
    }

    // ------------------------------------------------------------------
    // BDD: tests
    // ------------------------------------------------------------------

    pub fn it(&mut self, name: &str, body: impl FnMut(&Ctx) + 'static) {
        self.register_it(name, Variant::Normal, body);
    }

    /// Alias for [`Self::it`].
    pub fn specify(&mut self, name: &str, body: impl FnMut(&Ctx) + 'static) {
        self.it(name, body);
    }

    pub fn it_only(&mut self, name: &str, body: impl FnMut(&Ctx) + 'static) {
        self.register_it(name, Variant::Only, body);
    }

    /// Register a pending test: it has no body and reports as skipped.
    pub fn it_skip(&mut self, name: &str) {
        self.scope.test(TestRegistration {
            name: name.to_string(),
            origin: name.to_string(),
            variant: Variant::Skip,
            invocation: Invocation::Sync,
            body: Box::new(|_ctx, _done| {}),
        });
    }

    pub fn it_async(&mut self, name: &str, mut body: impl FnMut(&Ctx, Done) + 'static) {
        let trap_key = name.to_string();
        self.scope.test(TestRegistration {
            name: name.to_string(),
            origin: name.to_string(),
            variant: Variant::Normal,
            invocation: Invocation::Async,
            body: Box::new(move |ctx, done| {
                let done = CallArgs::done_or_trap(done, &trap_key);
                body(ctx, done)
            }),
        });
    }

    /// Forward a retry count to the enclosing suite context.
    pub fn it_retries(&mut self, count: u64) {
        let _ = self.scope.try_retries(count);
    }

    fn register_it(&mut self, name: &str, variant: Variant, mut body: impl FnMut(&Ctx) + 'static) {
        self.scope.test(TestRegistration {
            name: name.to_string(),
            origin: name.to_string(),
            variant,
            invocation: Invocation::Sync,
            body: Box::new(move |ctx, _done| body(ctx)),
        });
    }

    // ------------------------------------------------------------------
    // BDD: hooks
    // ------------------------------------------------------------------

    pub fn before(&mut self, body: impl FnMut(&Ctx) + 'static) {
        let registration = HookRegistration::sync("before", body);
        self.scope.before_all(registration);
    }

    pub fn before_async(&mut self, body: impl FnMut(&Ctx, Done) + 'static) {
        let registration = async_hook("before", body);
        self.scope.before_all(registration);
    }

    pub fn after(&mut self, body: impl FnMut(&Ctx) + 'static) {
        let registration = HookRegistration::sync("after", body);
        self.scope.after_all(registration);
    }

    pub fn after_async(&mut self, body: impl FnMut(&Ctx, Done) + 'static) {
        let registration = async_hook("after", body);
        self.scope.after_all(registration);
    }

    pub fn before_each(&mut self, body: impl FnMut(&Ctx) + 'static) {
        let registration = HookRegistration::sync("beforeEach", body);
        self.scope.before_each(registration);
    }

    pub fn before_each_async(&mut self, body: impl FnMut(&Ctx, Done) + 'static) {
        let registration = async_hook("beforeEach", body);
        self.scope.before_each(registration);
    }

    pub fn after_each(&mut self, body: impl FnMut(&Ctx) + 'static) {
        let registration = HookRegistration::sync("afterEach", body);
        self.scope.after_each(registration);
    }

    pub fn after_each_async(&mut self, body: impl FnMut(&Ctx, Done) + 'static) {
        let registration = async_hook("afterEach", body);
        self.scope.after_each(registration);
    }

    // ------------------------------------------------------------------
    // Declarative constructors, scoped to this context
    // ------------------------------------------------------------------

    pub fn suite(&mut self) -> SuiteDeclarator<'_> {
        SuiteDeclarator::new(&mut *self.scope, self.registry.clone())
    }

    pub fn test(&mut self) -> TestDeclarator<'_> {
        TestDeclarator::new(&mut *self.scope, self.registry.clone())
    }

    pub fn params(&self) -> ParamsDeclarator {
        self.registry.params()
    }
}

fn async_hook(name: &str, mut body: impl FnMut(&Ctx, Done) + 'static) -> HookRegistration {
    let trap_key = name.to_string();
    HookRegistration {
        name: name.to_string(),
        invocation: Invocation::Async,
        body: Box::new(move |ctx, done| {
            let done = CallArgs::done_or_trap(done, &trap_key);
            body(ctx, done)
        }),
    }
}
