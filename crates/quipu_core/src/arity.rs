//! Decide synchronous vs asynchronous invocation from declared parameter count.
//!
//! A member is invoked asynchronously exactly when it declares a completion-callback
//! parameter. Because a parameterized test method also declares one parameter for its
//! payload, the threshold shifts by one in that case:
//!
//! - plain method: 0 params = sync, 1+ = async (the parameter is the callback);
//! - parameterized method: 1 param = sync (the payload), 2+ = async (callback + payload);
//! - hook: 0 params = sync, 1+ = async.
//!
//! This rule is deliberately based on declared count alone. It cannot distinguish "takes a
//! payload but was never declared parameterized" from "is asynchronous"; callers that
//! mis-declare get the async interpretation, same as the system this engine registers into.

/// Represent how a registered member is driven by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Call and proceed when the call returns.
    Sync,
    /// Call with a completion callback and wait for it to fire.
    Async,
}

/// Classify a test method from its declared parameter count.
pub fn method_invocation(declared_arity: usize, parameterized: bool) -> Invocation {
    let takes_callback = if parameterized {
        declared_arity > 1
    } else {
        declared_arity > 0
    };
    if takes_callback { Invocation::Async } else { Invocation::Sync }
}

/// Classify a lifecycle hook from its declared parameter count.
pub fn hook_invocation(declared_arity: usize) -> Invocation {
    method_invocation(declared_arity, false)
}
