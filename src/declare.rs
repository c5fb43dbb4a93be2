//! Declarators: the decorator-equivalent registration surface
//!
//! One declarator covers several usage shapes (ad-hoc registration, direct decoration,
//! decorator factories with trait arguments). Each shape is a named entry point on a small
//! builder, so every behavior stays expressible while each call site is unambiguous:
//!
//! - `suite()`: ad-hoc registration (`describe`), direct class decoration (`class`), and
//!   the bare/named factory forms (`with`/`named` before `class`), with
//!   `.skip()/.only()/.pending()` variants that force the registration variant.
//! - `test()`: ad-hoc registration (`it`/`it_async`), the property-decorator form
//!   (`method`), and the factory forms, with mark variants.
//! - `params()`: parameter-entry declarators (`case`/`named_case`), per-entry mark
//!   variants, and the `naming` function.
//! - `skip()/only()/pending()`: execution modifiers usable on classes or methods.
//! - `context()`: records how an instance receives the live per-test context.
//!
//! All metadata lands in the [`Registry`]'s side tables; nothing global.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use quipu_core::{Mark, MarkKind, Variant};

use crate::builder::build_suite;
use crate::di::{InstanceProvider, ProviderChain};
use crate::interface::Dsl;
use crate::metadata::MetadataStore;
use crate::model::{Instance, SuiteClass};
use crate::runner::{Ctx, Done, RegisterError, SuiteScope, TestRegistration};
use crate::traits::Trait;

/// Shared registration state: the metadata side tables and the instantiation-provider
/// chain. One registry per interface installation; clones share state.
#[derive(Clone)]
pub struct Registry {
    pub(crate) store: Rc<RefCell<MetadataStore>>,
    pub(crate) providers: Rc<RefCell<ProviderChain>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            store: Rc::new(RefCell::new(MetadataStore::new())),
            providers: Rc::new(RefCell::new(ProviderChain::new())),
        }
    }

    /// Register an instantiation provider. It takes priority over everything registered
    /// before it; the default plain-construction provider always stays last.
    pub fn register_di(&self, provider: impl InstanceProvider + 'static) {
        self.providers.borrow_mut().register(provider);
    }

    /// Parameter-entry declarator with the plain mark.
    pub fn params(&self) -> ParamsDeclarator {
        ParamsDeclarator {
            store: self.store.clone(),
            mark: Mark::Normal,
        }
    }

    /// Execution modifier: mark a class or method as skipped.
    pub fn skip(&self) -> ExecutionModifier {
        ExecutionModifier {
            store: self.store.clone(),
            kind: MarkKind::Skip,
        }
    }

    /// Execution modifier: mark a class or method as the only one to execute.
    pub fn only(&self) -> ExecutionModifier {
        ExecutionModifier {
            store: self.store.clone(),
            kind: MarkKind::Only,
        }
    }

    /// Execution modifier: mark a class or method as pending.
    pub fn pending(&self) -> ExecutionModifier {
        ExecutionModifier {
            store: self.store.clone(),
            kind: MarkKind::Pending,
        }
    }

    /// Context-injection declarator.
    pub fn context(&self) -> ContextBinding {
        ContextBinding {
            store: self.store.clone(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

fn unknown_member(class: &SuiteClass, key: &str) -> RegisterError {
    RegisterError::UnknownMember {
        class: class.name().to_string(),
        key: key.to_string(),
    }
}

// ============================================================================
// Suite declarator
// ============================================================================

/// Builder resolving the suite declarator's usage shapes.
pub struct SuiteDeclarator<'a> {
    scope: &'a mut dyn SuiteScope,
    registry: Registry,
    forced: Option<Variant>,
    name: Option<String>,
    traits: Vec<Trait>,
}

impl<'a> SuiteDeclarator<'a> {
    pub(crate) fn new(scope: &'a mut dyn SuiteScope, registry: Registry) -> Self {
        SuiteDeclarator {
            scope,
            registry,
            forced: None,
            name: None,
            traits: Vec::new(),
        }
    }

    /// Force skip registration regardless of class marks.
    pub fn skip(mut self) -> Self {
        self.forced = Some(Variant::Skip);
        self
    }

    /// Force exclusive registration regardless of class marks.
    pub fn only(mut self) -> Self {
        self.forced = Some(Variant::Only);
        self
    }

    /// Force pending registration (lowered as skip) regardless of class marks.
    pub fn pending(mut self) -> Self {
        self.forced = Some(Variant::Skip);
        self
    }

    /// Named-factory form: register under `name` instead of the class name.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Factory form: attach suite traits, applied in list order at build time.
    pub fn with(mut self, traits: Vec<Trait>) -> Self {
        self.traits = traits;
        self
    }

    /// Ad-hoc form: register a suite by name with a plain construction closure.
    pub fn describe(
        self,
        name: &str,
        build: impl FnOnce(&mut Dsl<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), RegisterError> {
        let variant = self.forced.unwrap_or(Variant::Normal);
        let registry = self.registry;
        self.scope.suite(
            name,
            variant,
            Box::new(move |scope| {
                let mut dsl = Dsl::scoped(scope, registry);
                build(&mut dsl)
            }),
        )
    }

    /// Decorator form: declare `class` a suite and register it.
    ///
    /// The registration variant comes from the class's accumulated marks (only wins over
    /// skip/pending at suite level) unless a variant was forced on this declarator.
    pub fn class(self, class: &SuiteClass) -> Result<(), RegisterError> {
        let SuiteDeclarator {
            scope,
            registry,
            forced,
            name,
            traits,
        } = self;

        let variant = {
            let mut store = registry.store.borrow_mut();
            let record = store.class_mut(class.id());
            record.is_suite = true;
            if !traits.is_empty() {
                record.traits = traits;
            }
            if record.handled {
                tracing::warn!(class = class.name(), "suite class registered more than once");
            }
            record.handled = true;
            forced.unwrap_or_else(|| record.marks.suite_variant())
        };

        let display_name = name.unwrap_or_else(|| class.name().to_string());
        tracing::debug!(suite = %display_name, class = class.name(), "registering declarative suite");

        let class = class.clone();
        scope.suite(
            &display_name,
            variant,
            Box::new(move |scope| build_suite(&registry, &class, scope)),
        )
    }
}

// ============================================================================
// Test declarator
// ============================================================================

/// Builder resolving the test declarator's usage shapes.
pub struct TestDeclarator<'a> {
    scope: &'a mut dyn SuiteScope,
    registry: Registry,
    mark: Option<MarkKind>,
    name: Option<String>,
    traits: Vec<Trait>,
}

impl<'a> TestDeclarator<'a> {
    pub(crate) fn new(scope: &'a mut dyn SuiteScope, registry: Registry) -> Self {
        TestDeclarator {
            scope,
            registry,
            mark: None,
            name: None,
            traits: Vec::new(),
        }
    }

    pub fn skip(mut self) -> Self {
        self.mark = Some(MarkKind::Skip);
        self
    }

    pub fn only(mut self) -> Self {
        self.mark = Some(MarkKind::Only);
        self
    }

    pub fn pending(mut self) -> Self {
        self.mark = Some(MarkKind::Pending);
        self
    }

    /// Named-factory form: register the test under `name` instead of the method key.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Factory form: attach test traits, applied in list order at each invocation.
    pub fn with(mut self, traits: Vec<Trait>) -> Self {
        self.traits = traits;
        self
    }

    /// Ad-hoc form: register a synchronous test directly.
    pub fn it(self, name: &str, mut body: impl FnMut(&Ctx) + 'static) {
        let variant = ad_hoc_variant(self.mark);
        self.scope.test(TestRegistration {
            name: name.to_string(),
            origin: name.to_string(),
            variant,
            invocation: quipu_core::Invocation::Sync,
            body: Box::new(move |ctx, _done| body(ctx)),
        });
    }

    /// Ad-hoc form: register an asynchronous test directly.
    pub fn it_async(self, name: &str, mut body: impl FnMut(&Ctx, Done) + 'static) {
        let variant = ad_hoc_variant(self.mark);
        let trap_key = name.to_string();
        self.scope.test(TestRegistration {
            name: name.to_string(),
            origin: name.to_string(),
            variant,
            invocation: quipu_core::Invocation::Async,
            body: Box::new(move |ctx, done| {
                let done = crate::model::CallArgs::done_or_trap(done, &trap_key);
                body(ctx, done)
            }),
        });
    }

    /// Property/decorator form: mark the method under `key` as a test.
    ///
    /// The stored test name is this declarator's name, if any, else the method key.
    pub fn method(self, class: &SuiteClass, key: &str) -> Result<(), RegisterError> {
        let id = class.member_id(key).ok_or_else(|| unknown_member(class, key))?;
        let mut store = self.registry.store.borrow_mut();
        let record = store.member_mut(id);
        record.test_name = Some(self.name.unwrap_or_else(|| key.to_string()));
        if !self.traits.is_empty() {
            record.traits = self.traits;
        }
        if let Some(kind) = self.mark {
            record.marks.set(kind);
        }
        tracing::debug!(class = class.name(), method = key, "marked method as test");
        Ok(())
    }
}

fn ad_hoc_variant(mark: Option<MarkKind>) -> Variant {
    match mark {
        Some(MarkKind::Skip) | Some(MarkKind::Pending) => Variant::Skip,
        Some(MarkKind::Only) => Variant::Only,
        None => Variant::Normal,
    }
}

// ============================================================================
// Parameterized-test declarator
// ============================================================================

/// Declarator for parameterized-test entries.
#[derive(Clone)]
pub struct ParamsDeclarator {
    store: Rc<RefCell<MetadataStore>>,
    mark: Mark,
}

impl ParamsDeclarator {
    pub fn skip(mut self) -> Self {
        self.mark = Mark::Skip;
        self
    }

    pub fn only(mut self) -> Self {
        self.mark = Mark::Only;
        self
    }

    pub fn pending(mut self) -> Self {
        self.mark = Mark::Pending;
        self
    }

    /// Append one parameter entry to the method. Also marks the method as a test under
    /// its own key if no test name was recorded yet.
    pub fn case(&self, class: &SuiteClass, key: &str, payload: Value) -> Result<(), RegisterError> {
        self.push_case(class, key, None, payload)
    }

    /// Append one parameter entry with an explicit display name.
    pub fn named_case(
        &self,
        class: &SuiteClass,
        key: &str,
        name: &str,
        payload: Value,
    ) -> Result<(), RegisterError> {
        self.push_case(class, key, Some(name.to_string()), payload)
    }

    fn push_case(
        &self,
        class: &SuiteClass,
        key: &str,
        name: Option<String>,
        payload: Value,
    ) -> Result<(), RegisterError> {
        let id = class.member_id(key).ok_or_else(|| unknown_member(class, key))?;
        let mut store = self.store.borrow_mut();
        let record = store.member_mut(id);
        if record.test_name.is_none() {
            record.test_name = Some(key.to_string());
        }
        record.cases.push(crate::metadata::ParamCase {
            mark: self.mark,
            name,
            payload,
        });
        Ok(())
    }

    /// Record the naming function used for entries without an explicit name.
    pub fn naming(
        &self,
        class: &SuiteClass,
        key: &str,
        naming: impl Fn(&Value) -> String + 'static,
    ) -> Result<(), RegisterError> {
        let id = class.member_id(key).ok_or_else(|| unknown_member(class, key))?;
        self.store.borrow_mut().member_mut(id).naming = Some(Rc::new(naming));
        Ok(())
    }
}

// ============================================================================
// Execution modifiers and context injection
// ============================================================================

/// One of the `skip`/`only`/`pending` modifiers, applicable to a class or a method.
pub struct ExecutionModifier {
    store: Rc<RefCell<MetadataStore>>,
    kind: MarkKind,
}

impl ExecutionModifier {
    pub fn on_class(&self, class: &SuiteClass) {
        self.store.borrow_mut().class_mut(class.id()).marks.set(self.kind);
    }

    pub fn on_method(&self, class: &SuiteClass, key: &str) -> Result<(), RegisterError> {
        let id = class.member_id(key).ok_or_else(|| unknown_member(class, key))?;
        self.store.borrow_mut().member_mut(id).marks.set(self.kind);
        Ok(())
    }
}

/// Records how instances of a class receive the live per-test context.
pub struct ContextBinding {
    store: Rc<RefCell<MetadataStore>>,
}

impl ContextBinding {
    /// Bind the context handle into instances of type `T` with `assign`.
    ///
    /// The injector runs before every hook and test invocation on the instance.
    pub fn bind<T: Any>(&self, class: &SuiteClass, assign: impl Fn(&mut T, Ctx) + 'static) {
        let injector = move |instance: &mut Instance, ctx: &Ctx| match instance.downcast_mut::<T>() {
            Some(subject) => assign(subject, ctx.clone()),
            None => panic!(
                "INVARIANT: context injection target is not a `{}`",
                std::any::type_name::<T>()
            ),
        };
        self.store.borrow_mut().class_mut(class.id()).context_inject = Some(Rc::new(injector));
    }
}
