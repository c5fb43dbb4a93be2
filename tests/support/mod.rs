#![allow(dead_code)] // each test binary uses a different subset of this support module

//! Scripted runner double for integration tests
//!
//! Implements the engine's runner-boundary traits with an in-memory suite tree that
//! records registrations and executes them serially: hooks and tests run in registration
//! order, asynchronous members complete through the done callback, panics are captured as
//! failures, and skip/only variants filter execution the way a real runner would. Each
//! outcome also records the effective timeout/slow/retries values so tests can assert
//! what the engine forwarded.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use quipu::{
    ContextApi, Ctx, DeclarativeInterface, Done, Dsl, HookRegistration, InterfaceRegistry,
    Invocation, MemberBody, RegisterError, SuiteBuild, SuiteScope, TestRegistration, Variant,
};

/// One suite in the recorded tree.
pub struct SuiteNode {
    pub name: String,
    pub variant: Variant,
    pub timeout: Option<u64>,
    pub slow: Option<u64>,
    pub retries: Option<u64>,
    supports_slow: bool,
    supports_retries: bool,
    before_all: Vec<HookRegistration>,
    after_all: Vec<HookRegistration>,
    before_each: Vec<HookRegistration>,
    after_each: Vec<HookRegistration>,
    pub tests: Vec<TestRegistration>,
    pub children: Vec<SuiteNode>,
}

impl SuiteNode {
    fn new(name: &str, variant: Variant, supports_slow: bool, supports_retries: bool) -> Self {
        SuiteNode {
            name: name.to_string(),
            variant,
            timeout: None,
            slow: None,
            retries: None,
            supports_slow,
            supports_retries,
            before_all: Vec::new(),
            after_all: Vec::new(),
            before_each: Vec::new(),
            after_each: Vec::new(),
            tests: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Find a suite by name, depth-first.
    pub fn find(&self, name: &str) -> Option<&SuiteNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

impl SuiteScope for SuiteNode {
    fn suite(
        &mut self,
        name: &str,
        variant: Variant,
        build: SuiteBuild<'_>,
    ) -> Result<(), RegisterError> {
        let mut child = SuiteNode::new(name, variant, self.supports_slow, self.supports_retries);
        build(&mut child)?;
        self.children.push(child);
        Ok(())
    }

    fn test(&mut self, registration: TestRegistration) {
        self.tests.push(registration);
    }

    fn before_all(&mut self, registration: HookRegistration) {
        self.before_all.push(registration);
    }

    fn after_all(&mut self, registration: HookRegistration) {
        self.after_all.push(registration);
    }

    fn before_each(&mut self, registration: HookRegistration) {
        self.before_each.push(registration);
    }

    fn after_each(&mut self, registration: HookRegistration) {
        self.after_each.push(registration);
    }

    fn timeout(&mut self, ms: u64) {
        self.timeout = Some(ms);
    }

    fn try_slow(&mut self, ms: u64) -> bool {
        if self.supports_slow {
            self.slow = Some(ms);
        }
        self.supports_slow
    }

    fn try_retries(&mut self, count: u64) -> bool {
        if self.supports_retries {
            self.retries = Some(count);
        }
        self.supports_retries
    }
}

/// Live context state for one hook/test invocation.
struct RunContext {
    timeout: Option<u64>,
    slow: Option<u64>,
    retries: Option<u64>,
    supports_slow: bool,
    supports_retries: bool,
    skip_requested: bool,
    failed: bool,
}

impl RunContext {
    fn new(supports_slow: bool, supports_retries: bool) -> Self {
        RunContext {
            timeout: None,
            slow: None,
            retries: None,
            supports_slow,
            supports_retries,
            skip_requested: false,
            failed: false,
        }
    }
}

impl ContextApi for RunContext {
    fn timeout(&mut self, ms: u64) {
        self.timeout = Some(ms);
    }

    fn try_slow(&mut self, ms: u64) -> bool {
        if self.supports_slow {
            self.slow = Some(ms);
        }
        self.supports_slow
    }

    fn try_retries(&mut self, count: u64) -> bool {
        if self.supports_retries {
            self.retries = Some(count);
        }
        self.supports_retries
    }

    fn skip(&mut self) {
        self.skip_requested = true;
    }

    fn current_test_failed(&self) -> bool {
        self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub path: String,
    pub status: Status,
    pub message: Option<String>,
    pub timeout: Option<u64>,
    pub slow: Option<u64>,
    pub retries: Option<u64>,
}

pub struct RunReport {
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    pub fn status_of(&self, path: &str) -> Status {
        self.find(path).status
    }

    pub fn find(&self, path: &str) -> &Outcome {
        self.outcomes
            .iter()
            .find(|outcome| outcome.path == path)
            .unwrap_or_else(|| {
                let known: Vec<_> = self.outcomes.iter().map(|o| o.path.as_str()).collect();
                panic!("no outcome for `{path}`; ran: {known:?}")
            })
    }

    pub fn paths(&self) -> Vec<&str> {
        self.outcomes.iter().map(|outcome| outcome.path.as_str()).collect()
    }
}

/// The runner double: interface registration point plus a serial execution loop.
pub struct ScriptedRunner {
    interface: Option<DeclarativeInterface>,
    pub root: SuiteNode,
}

impl InterfaceRegistry for ScriptedRunner {
    fn register_interface(&mut self, name: &str, interface: DeclarativeInterface) {
        assert_eq!(name, quipu::INTERFACE_NAME);
        self.interface = Some(interface);
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        ScriptedRunner {
            interface: None,
            root: SuiteNode::new("", Variant::Normal, true, true),
        }
    }

    /// A runner whose contexts expose neither slow thresholds nor retry counts.
    pub fn without_optional_capabilities() -> Self {
        ScriptedRunner {
            interface: None,
            root: SuiteNode::new("", Variant::Normal, false, false),
        }
    }

    /// Open a registration context against the installed interface.
    pub fn declare(
        &mut self,
        register: impl FnOnce(&mut Dsl<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), RegisterError> {
        let interface = self
            .interface
            .clone()
            .expect("no interface installed; call DeclarativeInterface::install first");
        let mut dsl = interface.activate(&mut self.root);
        register(&mut dsl)
    }

    pub fn suite(&self, name: &str) -> &SuiteNode {
        self.root
            .find(name)
            .unwrap_or_else(|| panic!("no registered suite named `{name}`"))
    }

    /// Execute everything registered so far, serially.
    pub fn run(&mut self) -> RunReport {
        let mut outcomes = Vec::new();
        let exclusive = any_only(&self.root);
        run_suite(&mut self.root, String::new(), exclusive, false, &mut outcomes);
        RunReport { outcomes }
    }
}

fn any_only(node: &SuiteNode) -> bool {
    node.variant == Variant::Only
        || node.tests.iter().any(|test| test.variant == Variant::Only)
        || node.children.iter().any(any_only)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix} / {name}")
    }
}

fn run_suite(
    node: &mut SuiteNode,
    prefix: String,
    exclusive: bool,
    ancestor_only: bool,
    outcomes: &mut Vec<Outcome>,
) {
    let path = join(&prefix, &node.name);
    let suite_only = ancestor_only || node.variant == Variant::Only;

    if node.variant == Variant::Skip {
        record_all_skipped(node, &path, outcomes);
        return;
    }

    let supports = (node.supports_slow, node.supports_retries);
    let mut suite_failure: Option<String> = None;
    for hook in node.before_all.iter_mut() {
        let ctx_state = Rc::new(RefCell::new(RunContext::new(supports.0, supports.1)));
        let ctx: Ctx = ctx_state.clone();
        if let Err(message) = invoke_member(&mut hook.body, hook.invocation, &ctx) {
            suite_failure = Some(format!("\"{}\" hook failed: {message}", hook.name));
            break;
        }
    }

    let suite_settings = (node.timeout, node.slow, node.retries);
    let mut tests = std::mem::take(&mut node.tests);
    for test in tests.iter_mut() {
        let included = !exclusive || suite_only || test.variant == Variant::Only;
        if !included {
            continue;
        }
        let test_path = join(&path, &test.name);
        if test.variant == Variant::Skip {
            outcomes.push(Outcome {
                path: test_path,
                status: Status::Skipped,
                message: None,
                timeout: suite_settings.0,
                slow: suite_settings.1,
                retries: suite_settings.2,
            });
            continue;
        }
        if let Some(message) = &suite_failure {
            outcomes.push(Outcome {
                path: test_path,
                status: Status::Failed,
                message: Some(message.clone()),
                timeout: suite_settings.0,
                slow: suite_settings.1,
                retries: suite_settings.2,
            });
            continue;
        }
        run_one_test(
            &mut node.before_each,
            &mut node.after_each,
            suite_settings,
            supports,
            test,
            test_path,
            outcomes,
        );
    }
    node.tests = tests;

    let mut children = std::mem::take(&mut node.children);
    for child in children.iter_mut() {
        run_suite(child, path.clone(), exclusive, suite_only, outcomes);
    }
    node.children = children;

    for hook in node.after_all.iter_mut() {
        let ctx_state = Rc::new(RefCell::new(RunContext::new(supports.0, supports.1)));
        let ctx: Ctx = ctx_state.clone();
        let _ = invoke_member(&mut hook.body, hook.invocation, &ctx);
    }
}

fn record_all_skipped(node: &SuiteNode, path: &str, outcomes: &mut Vec<Outcome>) {
    for test in &node.tests {
        outcomes.push(Outcome {
            path: join(path, &test.name),
            status: Status::Skipped,
            message: None,
            timeout: None,
            slow: None,
            retries: None,
        });
    }
    for child in &node.children {
        let child_path = join(path, &child.name);
        record_all_skipped(child, &child_path, outcomes);
    }
}

fn run_one_test(
    before_each: &mut [HookRegistration],
    after_each: &mut [HookRegistration],
    suite_settings: (Option<u64>, Option<u64>, Option<u64>),
    supports: (bool, bool),
    test: &mut TestRegistration,
    path: String,
    outcomes: &mut Vec<Outcome>,
) {
    let ctx_state = Rc::new(RefCell::new(RunContext::new(supports.0, supports.1)));
    let ctx: Ctx = ctx_state.clone();

    let mut status = Status::Passed;
    let mut message = None;

    for hook in before_each.iter_mut() {
        match invoke_member(&mut hook.body, hook.invocation, &ctx) {
            Ok(()) => {}
            Err(failure) => {
                status = Status::Failed;
                message = Some(format!("before-each hook failed: {failure}"));
                break;
            }
        }
        if ctx_state.borrow().skip_requested {
            break;
        }
    }

    if status == Status::Passed {
        if ctx_state.borrow().skip_requested {
            status = Status::Skipped;
        } else {
            match invoke_member(&mut test.body, test.invocation, &ctx) {
                Ok(()) => {
                    if ctx_state.borrow().skip_requested {
                        status = Status::Skipped;
                    }
                }
                Err(failure) => {
                    status = Status::Failed;
                    message = Some(failure);
                }
            }
        }
    }

    ctx_state.borrow_mut().failed = status == Status::Failed;
    for hook in after_each.iter_mut() {
        if let Err(failure) = invoke_member(&mut hook.body, hook.invocation, &ctx) {
            if status != Status::Failed {
                status = Status::Failed;
                message = Some(format!("after-each hook failed: {failure}"));
            }
        }
    }

    let state = ctx_state.borrow();
    outcomes.push(Outcome {
        path,
        status,
        message,
        timeout: state.timeout.or(suite_settings.0),
        slow: state.slow.or(suite_settings.1),
        retries: state.retries.or(suite_settings.2),
    });
}

fn invoke_member(body: &mut MemberBody, invocation: Invocation, ctx: &Ctx) -> Result<(), String> {
    match invocation {
        Invocation::Sync => {
            catch_unwind(AssertUnwindSafe(|| (**body)(ctx, None))).map_err(panic_message)
        }
        Invocation::Async => {
            let completed: Rc<Cell<Option<Result<(), String>>>> = Rc::new(Cell::new(None));
            let done: Done = {
                let completed = completed.clone();
                Box::new(move |result| completed.set(Some(result)))
            };
            catch_unwind(AssertUnwindSafe(|| (**body)(ctx, Some(done)))).map_err(panic_message)?;
            match completed.take() {
                Some(result) => result,
                None => Err("completion callback never invoked".to_string()),
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
