//! Instantiation providers
//!
//! The test subject is created fresh for every test. Where that instance comes from is
//! pluggable: providers are tried in reverse registration order and the first one whose
//! `handles` predicate accepts the class wins. A default provider that calls the class's
//! recorded constructor is seeded at the bottom of every chain, so lookup cannot come up
//! empty.
//!
//! The chain is owned by a `Registry` and handed to the suite builder: configuration is
//! injected, not a process-wide singleton.

use crate::model::{Instance, SuiteClass};

/// Pluggable strategy for constructing the test-subject instance used per test.
pub trait InstanceProvider {
    /// Whether this provider can instantiate the given class.
    fn handles(&self, class: &SuiteClass) -> bool;

    /// Construct a fresh instance of the class.
    fn create(&self, class: &SuiteClass) -> Instance;
}

/// Fallback provider: plain construction through the class's recorded constructor.
pub struct DefaultConstruct;

impl InstanceProvider for DefaultConstruct {
    fn handles(&self, _class: &SuiteClass) -> bool {
        true
    }

    fn create(&self, class: &SuiteClass) -> Instance {
        match class.construct_instance() {
            Some(instance) => instance,
            None => panic!(
                "class `{}` has no constructor; set one with ClassSpec::construct or register an instantiation provider",
                class.name()
            ),
        }
    }
}

/// Ordered provider chain. Most recently registered providers are consulted first; the
/// default provider always sits last.
pub struct ProviderChain {
    providers: Vec<Box<dyn InstanceProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        ProviderChain {
            providers: vec![Box::new(DefaultConstruct)],
        }
    }

    /// Add a provider. It takes priority over everything registered before it.
    pub fn register(&mut self, provider: impl InstanceProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Create an instance with the first matching provider.
    pub fn create(&self, class: &SuiteClass) -> Instance {
        let provider = self
            .providers
            .iter()
            .rev()
            .find(|provider| provider.handles(class))
            .expect("INVARIANT: the default instantiation provider matches every class");
        tracing::trace!(class = class.name(), "instantiating test subject");
        provider.create(class)
    }
}

impl Default for ProviderChain {
    fn default() -> Self {
        ProviderChain::new()
    }
}
