//! Explicit class model for declarative suites
//!
//! Rust has no runtime class object to hang metadata on, so the decorated class becomes an
//! explicit record: [`SuiteClass`] carries a name, an optional parent link, a constructor,
//! static and instance lifecycle hooks, and an ordered method list. [`ClassSpec`] is the
//! builder that assembles one.
//!
//! Two conventions are load-bearing here:
//!
//! - Every method and hook records its *declared parameter count* at registration. The
//!   suite builder later derives synchronous vs asynchronous invocation from that count
//!   alone (see `quipu_core::arity`).
//! - Instances are `Box<dyn Any>`, created fresh per test by the instantiation-provider
//!   chain. Test bodies downcast with [`subject`].

use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::runner::Done;

/// A live test-subject instance, one per test.
pub type Instance = Box<dyn Any>;

/// Constructor closure recorded on a class, used by the default instantiation provider.
pub type ConstructFn = Rc<dyn Fn() -> Instance>;

/// Unified callable for instance methods and instance hooks.
pub type MemberFn = Rc<dyn Fn(&mut Instance, CallArgs)>;

/// Unified callable for static (class-level) hooks.
pub type StaticFn = Rc<dyn Fn(CallArgs)>;

/// Identity of a class, stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u64);

/// Identity of a method or hook, stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(u64);

fn next_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Call arguments forwarded into a method or hook body.
///
/// `done` is present exactly when the member was registered for asynchronous invocation;
/// `payload` is present exactly when the test was expanded from a parameter entry.
pub struct CallArgs {
    pub done: Option<Done>,
    pub payload: Option<Value>,
}

impl CallArgs {
    /// Take the completion callback, or a trap that fails loudly if a member registered
    /// for synchronous invocation tries to complete asynchronously anyway.
    pub(crate) fn done_or_trap(done: Option<Done>, key: &str) -> Done {
        match done {
            Some(done) => done,
            None => {
                let key = key.to_string();
                Box::new(move |_result| {
                    panic!(
                        "INVARIANT: completion callback for `{key}` invoked in a synchronous registration"
                    )
                })
            }
        }
    }
}

/// Downcast the live instance to the concrete suite type.
///
/// Panics when the instance is of a different type; inside a test body that panic is
/// reported as an ordinary test failure by the host runner.
pub fn subject<T: Any>(instance: &mut Instance) -> &mut T {
    match instance.downcast_mut::<T>() {
        Some(subject) => subject,
        None => panic!(
            "test subject is not a `{}`; check the class constructor and instantiation providers",
            std::any::type_name::<T>()
        ),
    }
}

/// One registered method of a suite class.
#[derive(Clone)]
pub struct Method {
    inner: Rc<MethodInner>,
}

struct MethodInner {
    id: MemberId,
    key: String,
    arity: usize,
    run: MemberFn,
}

impl Method {
    fn new(key: &str, arity: usize, run: MemberFn) -> Self {
        Method {
            inner: Rc::new(MethodInner {
                id: MemberId(next_id()),
                key: key.to_string(),
                arity,
                run,
            }),
        }
    }

    pub fn id(&self) -> MemberId {
        self.inner.id
    }

    /// The member key the method was registered under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Declared parameter count, recorded at registration.
    pub fn arity(&self) -> usize {
        self.inner.arity
    }

    pub fn invoke(&self, instance: &mut Instance, args: CallArgs) {
        (*self.inner.run)(instance, args)
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("arity", &self.inner.arity)
            .finish_non_exhaustive()
    }
}

/// A class-level (static) lifecycle hook: `before_all` or `after_all`.
#[derive(Clone)]
pub struct StaticHook {
    inner: Rc<StaticHookInner>,
}

struct StaticHookInner {
    id: MemberId,
    key: &'static str,
    arity: usize,
    run: StaticFn,
}

impl StaticHook {
    fn new(key: &'static str, arity: usize, run: StaticFn) -> Self {
        StaticHook {
            inner: Rc::new(StaticHookInner {
                id: MemberId(next_id()),
                key,
                arity,
                run,
            }),
        }
    }

    pub fn id(&self) -> MemberId {
        self.inner.id
    }

    pub fn key(&self) -> &'static str {
        self.inner.key
    }

    pub fn arity(&self) -> usize {
        self.inner.arity
    }

    pub fn invoke(&self, args: CallArgs) {
        (*self.inner.run)(args)
    }
}

/// An instance-level lifecycle hook: `before` or `after`, run per test.
#[derive(Clone)]
pub struct InstanceHook {
    inner: Rc<InstanceHookInner>,
}

struct InstanceHookInner {
    id: MemberId,
    key: &'static str,
    arity: usize,
    run: MemberFn,
}

impl InstanceHook {
    fn new(key: &'static str, arity: usize, run: MemberFn) -> Self {
        InstanceHook {
            inner: Rc::new(InstanceHookInner {
                id: MemberId(next_id()),
                key,
                arity,
                run,
            }),
        }
    }

    pub fn id(&self) -> MemberId {
        self.inner.id
    }

    pub fn key(&self) -> &'static str {
        self.inner.key
    }

    pub fn arity(&self) -> usize {
        self.inner.arity
    }

    pub fn invoke(&self, instance: &mut Instance, args: CallArgs) {
        (*self.inner.run)(instance, args)
    }
}

/// An immutable, cheaply-cloneable suite class record.
///
/// Identity (for metadata side tables) is the [`ClassId`] allocated by
/// [`ClassSpec::build`]; clones share it.
#[derive(Clone)]
pub struct SuiteClass {
    inner: Rc<ClassInner>,
}

struct ClassInner {
    id: ClassId,
    name: String,
    parent: Option<SuiteClass>,
    construct: Option<ConstructFn>,
    before_all: Option<StaticHook>,
    after_all: Option<StaticHook>,
    before: Option<InstanceHook>,
    after: Option<InstanceHook>,
    methods: Vec<Method>,
}

impl SuiteClass {
    pub fn id(&self) -> ClassId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<SuiteClass> {
        self.inner.parent.clone()
    }

    /// Own methods, in registration order.
    pub fn methods(&self) -> &[Method] {
        &self.inner.methods
    }

    /// Resolve the instance `before` hook through the inheritance chain; the nearest
    /// definition wins.
    pub fn resolve_before(&self) -> Option<InstanceHook> {
        self.resolve(|class| class.inner.before.clone())
    }

    /// Resolve the instance `after` hook through the inheritance chain.
    pub fn resolve_after(&self) -> Option<InstanceHook> {
        self.resolve(|class| class.inner.after.clone())
    }

    /// Resolve the static `before_all` hook through the inheritance chain.
    pub fn resolve_before_all(&self) -> Option<StaticHook> {
        self.resolve(|class| class.inner.before_all.clone())
    }

    /// Resolve the static `after_all` hook through the inheritance chain.
    pub fn resolve_after_all(&self) -> Option<StaticHook> {
        self.resolve(|class| class.inner.after_all.clone())
    }

    fn resolve<T>(&self, pick: impl Fn(&SuiteClass) -> Option<T>) -> Option<T> {
        let mut level = Some(self.clone());
        while let Some(current) = level {
            if let Some(found) = pick(&current) {
                return Some(found);
            }
            level = current.parent();
        }
        None
    }

    /// Look up an own member (method or hook) by key.
    ///
    /// Hooks answer to their conventional keys: `before`, `after`, `before_all`,
    /// `after_all`. Ancestor members are addressed on the ancestor class itself.
    pub fn member_id(&self, key: &str) -> Option<MemberId> {
        if let Some(method) = self.inner.methods.iter().find(|m| m.key() == key) {
            return Some(method.id());
        }
        match key {
            "before" => self.inner.before.as_ref().map(InstanceHook::id),
            "after" => self.inner.after.as_ref().map(InstanceHook::id),
            "before_all" => self.inner.before_all.as_ref().map(StaticHook::id),
            "after_all" => self.inner.after_all.as_ref().map(StaticHook::id),
            _ => None,
        }
    }

    pub fn has_constructor(&self) -> bool {
        self.inner.construct.is_some()
    }

    /// Construct a fresh instance with the recorded constructor, if any.
    pub fn construct_instance(&self) -> Option<Instance> {
        self.inner.construct.as_ref().map(|construct| (**construct)())
    }
}

/// Builder for [`SuiteClass`] records.
///
/// Each `method*`/hook entry point fixes the member's declared parameter count; pick the
/// one matching the closure shape you actually have.
pub struct ClassSpec {
    name: String,
    parent: Option<SuiteClass>,
    construct: Option<ConstructFn>,
    before_all: Option<StaticHook>,
    after_all: Option<StaticHook>,
    before: Option<InstanceHook>,
    after: Option<InstanceHook>,
    methods: Vec<Method>,
}

impl ClassSpec {
    pub fn new(name: &str) -> Self {
        ClassSpec {
            name: name.to_string(),
            parent: None,
            construct: None,
            before_all: None,
            after_all: None,
            before: None,
            after: None,
            methods: Vec::new(),
        }
    }

    /// Start a subclass of `parent`. The parent's methods are inherited at suite-build
    /// time; same-key methods declared here shadow them.
    pub fn extending(name: &str, parent: &SuiteClass) -> Self {
        let mut spec = ClassSpec::new(name);
        spec.parent = Some(parent.clone());
        spec
    }

    /// Record the plain constructor used by the default instantiation provider.
    pub fn construct<T: Any>(mut self, construct: impl Fn() -> T + 'static) -> Self {
        self.construct = Some(Rc::new(move || Box::new(construct()) as Instance));
        self
    }

    pub fn before_all(mut self, hook: impl Fn() + 'static) -> Self {
        self.before_all = Some(StaticHook::new("before_all", 0, Rc::new(move |_args| hook())));
        self
    }

    pub fn before_all_async(mut self, hook: impl Fn(Done) + 'static) -> Self {
        self.before_all = Some(StaticHook::new(
            "before_all",
            1,
            Rc::new(move |args| hook(CallArgs::done_or_trap(args.done, "before_all"))),
        ));
        self
    }

    pub fn after_all(mut self, hook: impl Fn() + 'static) -> Self {
        self.after_all = Some(StaticHook::new("after_all", 0, Rc::new(move |_args| hook())));
        self
    }

    pub fn after_all_async(mut self, hook: impl Fn(Done) + 'static) -> Self {
        self.after_all = Some(StaticHook::new(
            "after_all",
            1,
            Rc::new(move |args| hook(CallArgs::done_or_trap(args.done, "after_all"))),
        ));
        self
    }

    pub fn before(mut self, hook: impl Fn(&mut Instance) + 'static) -> Self {
        self.before = Some(InstanceHook::new(
            "before",
            0,
            Rc::new(move |instance, _args| hook(instance)),
        ));
        self
    }

    pub fn before_async(mut self, hook: impl Fn(&mut Instance, Done) + 'static) -> Self {
        self.before = Some(InstanceHook::new(
            "before",
            1,
            Rc::new(move |instance, args| {
                let done = CallArgs::done_or_trap(args.done, "before");
                hook(instance, done)
            }),
        ));
        self
    }

    pub fn after(mut self, hook: impl Fn(&mut Instance) + 'static) -> Self {
        self.after = Some(InstanceHook::new(
            "after",
            0,
            Rc::new(move |instance, _args| hook(instance)),
        ));
        self
    }

    pub fn after_async(mut self, hook: impl Fn(&mut Instance, Done) + 'static) -> Self {
        self.after = Some(InstanceHook::new(
            "after",
            1,
            Rc::new(move |instance, args| {
                let done = CallArgs::done_or_trap(args.done, "after");
                hook(instance, done)
            }),
        ));
        self
    }

    /// A synchronous method declaring no parameters.
    pub fn method(mut self, key: &str, body: impl Fn(&mut Instance) + 'static) -> Self {
        self.methods
            .push(Method::new(key, 0, Rc::new(move |instance, _args| body(instance))));
        self
    }

    /// An asynchronous method declaring one parameter, the completion callback.
    pub fn method_async(mut self, key: &str, body: impl Fn(&mut Instance, Done) + 'static) -> Self {
        let trap_key = key.to_string();
        self.methods.push(Method::new(
            key,
            1,
            Rc::new(move |instance, args| {
                let done = CallArgs::done_or_trap(args.done, &trap_key);
                body(instance, done)
            }),
        ));
        self
    }

    /// A synchronous parameterized method declaring one parameter, the payload.
    pub fn method_with_params(
        mut self,
        key: &str,
        body: impl Fn(&mut Instance, &Value) + 'static,
    ) -> Self {
        self.methods.push(Method::new(
            key,
            1,
            Rc::new(move |instance, args| {
                let payload = args.payload.unwrap_or(Value::Null);
                body(instance, &payload)
            }),
        ));
        self
    }

    /// An asynchronous parameterized method declaring two parameters: the completion
    /// callback, then the payload.
    pub fn method_async_with_params(
        mut self,
        key: &str,
        body: impl Fn(&mut Instance, Done, &Value) + 'static,
    ) -> Self {
        let trap_key = key.to_string();
        self.methods.push(Method::new(
            key,
            2,
            Rc::new(move |instance, args| {
                let payload = args.payload.unwrap_or(Value::Null);
                let done = CallArgs::done_or_trap(args.done, &trap_key);
                body(instance, done, &payload)
            }),
        ));
        self
    }

    pub fn build(self) -> SuiteClass {
        SuiteClass {
            inner: Rc::new(ClassInner {
                id: ClassId(next_id()),
                name: self.name,
                parent: self.parent,
                construct: self.construct,
                before_all: self.before_all,
                after_all: self.after_all,
                before: self.before,
                after: self.after,
                methods: self.methods,
            }),
        }
    }
}
