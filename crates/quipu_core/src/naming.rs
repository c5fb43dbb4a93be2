//! Resolve display names for parameterized test entries.
//!
//! Resolution order, applied independently per entry:
//! 1. the entry's explicit name, if any;
//! 2. the method's naming function applied to the entry's payload, if any;
//! 3. `"<base>_<index>"`, where index is the entry's registration position.

/// Compute the display name for one parameter entry.
///
/// Generic over the payload type so this crate stays free of serialization dependencies;
/// the engine instantiates it with its payload carrier.
pub fn parameter_case_name<P>(
    base: &str,
    index: usize,
    explicit: Option<&str>,
    naming: Option<&dyn Fn(&P) -> String>,
    payload: &P,
) -> String {
    if let Some(name) = explicit {
        return name.to_string();
    }
    if let Some(naming) = naming {
        return naming(payload);
    }
    format!("{base}_{index}")
}
