//! Suite builder: lowers a decorated class into runner registrations
//!
//! The builder runs inside the runner's suite-construction phase, as the closure handed
//! over by [`crate::declare::SuiteDeclarator::class`]. Ordering is contractual:
//!
//! 1. suite traits, in list order;
//! 2. numeric overrides recorded on the class;
//! 3. static `before_all`/`after_all` hooks;
//! 4. the instance-managing before-each hook (fresh instance per test);
//! 5. the instance-discarding after-each hook (discard on every exit path);
//! 6. inheritance-chain walk collecting effective test methods;
//! 7. one test registration per collected method, or per parameter entry.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use quipu_core::{hook_invocation, method_invocation, parameter_case_name, Invocation, Variant};
use serde_json::Value;

use crate::declare::Registry;
use crate::di::ProviderChain;
use crate::metadata::MetadataStore;
use crate::model::{CallArgs, Instance, InstanceHook, MemberId, Method, StaticHook, SuiteClass};
use crate::runner::{Ctx, HookRegistration, RegisterError, SuiteScope, TestRegistration};
use crate::traits::Trait;

type Store = Rc<RefCell<MetadataStore>>;
type Providers = Rc<RefCell<ProviderChain>>;
type InstanceSlot = Rc<RefCell<Option<Instance>>>;

/// Build the registration closure body for one suite class.
pub(crate) fn build_suite(
    registry: &Registry,
    class: &SuiteClass,
    scope: &mut dyn SuiteScope,
) -> Result<(), RegisterError> {
    let store = registry.store.clone();
    let providers = registry.providers.clone();

    // 1. Suite traits, in list order.
    let suite_traits = store
        .borrow()
        .class(class.id())
        .map(|record| record.traits.clone())
        .unwrap_or_default();
    for applied in &suite_traits {
        applied.apply_suite(scope, class);
    }

    // 2. Numeric overrides recorded directly on the class. Timeout is always honored;
    //    slow/retries only where the runner exposes them.
    let (timeout, slow, retries) = {
        let store = store.borrow();
        match store.class(class.id()) {
            Some(record) => (record.timeout, record.slow, record.retries),
            None => (None, None, None),
        }
    };
    if let Some(ms) = timeout {
        scope.timeout(ms);
    }
    if let Some(ms) = slow {
        let _ = scope.try_slow(ms);
    }
    if let Some(count) = retries {
        let _ = scope.try_retries(count);
    }

    // 3. Static hooks, resolved through the chain (nearest definition wins).
    if let Some(hook) = class.resolve_before_all() {
        scope.before_all(static_hook_registration(&store, class, hook));
    }
    if let Some(hook) = class.resolve_after_all() {
        scope.after_all(static_hook_registration(&store, class, hook));
    }

    // 4./5. Per-test instance lifecycle around the shared slot.
    let slot: InstanceSlot = Rc::new(RefCell::new(None));
    scope.before_each(before_each_registration(
        &store,
        &providers,
        class,
        class.resolve_before(),
        &slot,
    ));
    scope.after_each(after_each_registration(&store, class, class.resolve_after(), &slot));

    // 6. Collect effective test methods; rejects suite-decorated ancestors.
    let methods = collect_tests(&store.borrow(), class)?;
    tracing::debug!(
        suite = class.name(),
        methods = methods.len(),
        "collected test methods"
    );

    // 7. Emit registrations.
    for method in &methods {
        emit_method(scope, &store, class, method, &slot);
    }
    Ok(())
}

/// Walk the inheritance chain and collect effective test methods.
///
/// First write wins per member key, so a subclass definition shadows an ancestor's even
/// when the subclass override is itself not test-decorated. Finding a suite-decorated
/// ancestor aborts the build.
fn collect_tests(store: &MetadataStore, class: &SuiteClass) -> Result<Vec<Method>, RegisterError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut collected = Vec::new();
    let mut level = Some(class.clone());

    while let Some(current) = level {
        if current.id() != class.id() && store.is_suite(current.id()) {
            return Err(RegisterError::NestedSuite {
                derived: class.name().to_string(),
                ancestor: current.name().to_string(),
            });
        }
        for method in current.methods() {
            if seen.contains(method.key()) {
                continue;
            }
            seen.insert(method.key().to_string());
            if store.is_test(method.id()) {
                collected.push(method.clone());
            }
        }
        level = current.parent();
    }
    Ok(collected)
}

/// Forward a member's recorded numeric overrides to the live context, then run the
/// class's context injector if the member executes against an instance.
fn apply_member_overrides(
    store: &MetadataStore,
    ctx: &Ctx,
    member: MemberId,
    class: &SuiteClass,
    instance: Option<&mut Instance>,
) {
    if let Some(record) = store.member(member) {
        if let Some(ms) = record.timeout {
            ctx.borrow_mut().timeout(ms);
        }
        if let Some(ms) = record.slow {
            let _ = ctx.borrow_mut().try_slow(ms);
        }
        if let Some(count) = record.retries {
            let _ = ctx.borrow_mut().try_retries(count);
        }
    }
    if let Some(instance) = instance {
        let mut level = Some(class.clone());
        while let Some(current) = level {
            let injector = store.class(current.id()).and_then(|r| r.context_inject.clone());
            if let Some(inject) = injector {
                (*inject)(&mut *instance, ctx);
                break;
            }
            level = current.parent();
        }
    }
}

fn static_hook_registration(store: &Store, class: &SuiteClass, hook: StaticHook) -> HookRegistration {
    let store = store.clone();
    let class = class.clone();
    HookRegistration {
        name: hook.key().to_string(),
        invocation: hook_invocation(hook.arity()),
        body: Box::new(move |ctx, done| {
            apply_member_overrides(&store.borrow(), ctx, hook.id(), &class, None);
            hook.invoke(CallArgs { done, payload: None });
        }),
    }
}

fn before_each_registration(
    store: &Store,
    providers: &Providers,
    class: &SuiteClass,
    hook: Option<InstanceHook>,
    slot: &InstanceSlot,
) -> HookRegistration {
    let store = store.clone();
    let providers = providers.clone();
    let class = class.clone();
    let slot = slot.clone();

    match hook {
        Some(hook) => HookRegistration {
            name: hook.key().to_string(),
            invocation: hook_invocation(hook.arity()),
            body: Box::new(move |ctx, done| {
                slot.replace(Some(providers.borrow().create(&class)));
                let mut held = slot.borrow_mut();
                let instance = held
                    .as_mut()
                    .expect("INVARIANT: instance installed by this hook");
                apply_member_overrides(&store.borrow(), ctx, hook.id(), &class, Some(&mut *instance));
                hook.invoke(instance, CallArgs { done, payload: None });
            }),
        },
        None => HookRegistration {
            name: String::new(),
            invocation: Invocation::Sync,
            body: Box::new(move |_ctx, _done| {
                slot.replace(Some(providers.borrow().create(&class)));
            }),
        },
    }
}

/// Clears the instance slot when dropped, so discard happens on every exit path of the
/// after-each hook, unwinding included.
struct DiscardInstance(InstanceSlot);

impl Drop for DiscardInstance {
    fn drop(&mut self) {
        self.0.borrow_mut().take();
    }
}

fn after_each_registration(
    store: &Store,
    class: &SuiteClass,
    hook: Option<InstanceHook>,
    slot: &InstanceSlot,
) -> HookRegistration {
    let store = store.clone();
    let class = class.clone();
    let slot = slot.clone();

    match hook {
        Some(hook) => HookRegistration {
            name: hook.key().to_string(),
            invocation: hook_invocation(hook.arity()),
            body: Box::new(move |ctx, done| {
                // Declared before `held` so the held borrow is released before the
                // guard's drop clears the slot.
                let _discard = DiscardInstance(slot.clone());
                let mut held = slot.borrow_mut();
                if let Some(instance) = held.as_mut() {
                    apply_member_overrides(&store.borrow(), ctx, hook.id(), &class, Some(&mut *instance));
                    hook.invoke(instance, CallArgs { done, payload: None });
                }
            }),
        },
        None => HookRegistration {
            name: String::new(),
            invocation: Invocation::Sync,
            body: Box::new(move |_ctx, _done| {
                slot.borrow_mut().take();
            }),
        },
    }
}

struct EmittedCase {
    name: String,
    variant: Variant,
    invocation: Invocation,
    payload: Option<Value>,
}

fn emit_method(
    scope: &mut dyn SuiteScope,
    store: &Store,
    class: &SuiteClass,
    method: &Method,
    slot: &InstanceSlot,
) {
    let record = store
        .borrow()
        .member(method.id())
        .cloned()
        .unwrap_or_default();
    let base = record
        .test_name
        .clone()
        .expect("INVARIANT: collected methods carry a test name");

    if record.cases.is_empty() {
        push_test(
            scope,
            store,
            class,
            method,
            slot,
            record.traits.clone(),
            EmittedCase {
                name: base,
                variant: record.marks.test_variant(),
                invocation: method_invocation(method.arity(), false),
                payload: None,
            },
        );
    } else {
        for (index, case) in record.cases.iter().enumerate() {
            let name = parameter_case_name(
                &base,
                index,
                case.name.as_deref(),
                record.naming.as_deref(),
                &case.payload,
            );
            push_test(
                scope,
                store,
                class,
                method,
                slot,
                record.traits.clone(),
                EmittedCase {
                    name,
                    variant: record.marks.union(case.mark.as_set()).test_variant(),
                    invocation: method_invocation(method.arity(), true),
                    payload: Some(case.payload.clone()),
                },
            );
        }
    }
}

fn push_test(
    scope: &mut dyn SuiteScope,
    store: &Store,
    class: &SuiteClass,
    method: &Method,
    slot: &InstanceSlot,
    traits: Vec<Trait>,
    case: EmittedCase,
) {
    let store = store.clone();
    let class = class.clone();
    let method = method.clone();
    let slot = slot.clone();
    let payload = case.payload;

    tracing::debug!(test = %case.name, origin = method.key(), "registering test");
    scope.test(TestRegistration {
        name: case.name,
        origin: method.key().to_string(),
        variant: case.variant,
        invocation: case.invocation,
        body: Box::new(move |ctx, done| {
            let mut held = slot.borrow_mut();
            let instance = held
                .as_mut()
                .expect("INVARIANT: before-each hook installs the instance");
            apply_member_overrides(&store.borrow(), ctx, method.id(), &class, Some(&mut *instance));
            for applied in &traits {
                applied.apply_test(ctx, instance, &method);
            }
            method.invoke(
                instance,
                CallArgs {
                    done,
                    payload: payload.clone(),
                },
            );
        }),
    });
}
