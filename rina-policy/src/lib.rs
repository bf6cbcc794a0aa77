//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! Pluggable algorithms and tunables per component (component C12): a
//! two-level map `component -> (policy-name -> builder)` plus a
//! per-component parameter table. Parameters are represented as a tagged
//! [`ParamValue`] sum type rather than a union-plus-type-field pair.

pub mod error;

use std::collections::{BTreeMap, HashMap, HashSet};

pub use error::Error;

/// The RIB components that carry their own policy and parameter set.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Component {
    Dft,
    Lfdb,
    Spf,
    AddrAlloc,
    FlowAlloc,
    Enrollment,
}

/// A typed, range-checked policy parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int { value: i64, min: i64, max: i64 },
    Bool(bool),
    Str(String),
}

impl ParamValue {
    pub fn int(value: i64, min: i64, max: i64) -> ParamValue {
        ParamValue::Int { value, min, max }
    }

    /// Parses `raw` according to this value's own variant, range-checking
    /// ints and requiring exactly "true"/"false" for bools.
    fn parse(&self, raw: &str) -> Option<ParamValue> {
        match self {
            ParamValue::Int { min, max, .. } => {
                let value: i64 = raw.parse().ok()?;
                if value < *min || value > *max {
                    return None;
                }
                Some(ParamValue::Int {
                    value,
                    min: *min,
                    max: *max,
                })
            }
            ParamValue::Bool(_) => match raw {
                "true" => Some(ParamValue::Bool(true)),
                "false" => Some(ParamValue::Bool(false)),
                _ => None,
            },
            ParamValue::Str(_) => Some(ParamValue::Str(raw.to_owned())),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Default)]
struct ComponentEntry {
    current_policy: String,
    available: HashSet<String>,
    params: BTreeMap<String, ParamValue>,
    /// Called on a successful policy swap; only DFT uses this today, to
    /// additionally call `reconfigure()`.
    on_policy_change: Option<Box<dyn FnMut() + Send>>,
}

/// The policy and parameter registry (component C12).
#[derive(Default)]
pub struct PolicyRegistry {
    components: HashMap<Component, ComponentEntry>,
}

impl PolicyRegistry {
    pub fn new() -> PolicyRegistry {
        PolicyRegistry::default()
    }

    fn entry(&mut self, component: Component) -> &mut ComponentEntry {
        self.components.entry(component).or_default()
    }

    /// Registers a policy implementation `name` as available for
    /// `component`. The first policy registered becomes the active one.
    pub fn register_policy(&mut self, component: Component, name: &str) {
        let entry = self.entry(component);
        let first = entry.available.is_empty();
        entry.available.insert(name.to_owned());
        if first {
            entry.current_policy = name.to_owned();
        }
    }

    /// Registers a callback invoked after a successful `policy_mod` on
    /// `component`; this is the DFT's `reconfigure()` hook.
    pub fn on_policy_change(
        &mut self,
        component: Component,
        callback: impl FnMut() + Send + 'static,
    ) {
        self.entry(component).on_policy_change = Some(Box::new(callback));
    }

    /// Declares a parameter and its default value. Callers must declare
    /// every parameter at init: [`PolicyRegistry::param`] panics on an
    /// undeclared key.
    pub fn declare_param(&mut self, component: Component, name: &str, default: ParamValue) {
        self.entry(component)
            .params
            .insert(name.to_owned(), default);
    }

    /// Swaps in policy `name` for `component`. A no-op (returns `Ok`, no
    /// side effect) if `name` is already current.
    pub fn policy_mod(&mut self, component: Component, name: &str) -> Result<(), Error> {
        let entry = self
            .components
            .get_mut(&component)
            .ok_or(Error::UnknownComponent(component))?;
        if entry.current_policy == name {
            return Ok(());
        }
        if !entry.available.contains(name) {
            return Err(Error::UnknownPolicy(component, name.to_owned()));
        }
        entry.current_policy = name.to_owned();
        if let Some(cb) = entry.on_policy_change.as_mut() {
            cb();
        }
        Ok(())
    }

    pub fn current_policy(&self, component: Component) -> Option<&str> {
        self.components
            .get(&component)
            .map(|e| e.current_policy.as_str())
    }

    /// Parses `raw` according to the parameter's declared type and installs
    /// it. On error the parameter is left untouched.
    pub fn policy_param_mod(
        &mut self,
        component: Component,
        name: &str,
        raw: &str,
    ) -> Result<(), Error> {
        let entry = self
            .components
            .get_mut(&component)
            .ok_or(Error::UnknownComponent(component))?;
        let current = entry
            .params
            .get(name)
            .ok_or_else(|| Error::UnknownParam(component, name.to_owned()))?;
        let parsed = current.parse(raw);
        let parsed = match (current, &parsed) {
            (ParamValue::Int { min, max, .. }, None) => {
                return Err(Error::OutOfRange(component, name.to_owned(), *min, *max));
            }
            (_, None) => return Err(Error::TypeMismatch(component, name.to_owned())),
            (_, Some(v)) => v.clone(),
        };
        entry.params.insert(name.to_owned(), parsed);
        Ok(())
    }

    /// Reads a declared parameter. Panics if `name` was never declared via
    /// [`PolicyRegistry::declare_param`].
    pub fn param(&self, component: Component, name: &str) -> &ParamValue {
        self.components
            .get(&component)
            .and_then(|e| e.params.get(name))
            .unwrap_or_else(|| panic!("undeclared policy parameter '{name}' on {component:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PolicyRegistry {
        let mut reg = PolicyRegistry::new();
        reg.register_policy(Component::AddrAlloc, "distributed");
        reg.declare_param(
            Component::AddrAlloc,
            "nack-wait-secs",
            ParamValue::int(2, 1, 10),
        );
        reg.register_policy(Component::Dft, "full-replication");
        reg
    }

    #[test]
    fn policy_mod_same_name_is_noop() {
        let mut reg = registry();
        assert_eq!(reg.policy_mod(Component::AddrAlloc, "distributed"), Ok(()));
    }

    #[test]
    fn policy_mod_unknown_is_rejected() {
        let mut reg = registry();
        assert_eq!(
            reg.policy_mod(Component::AddrAlloc, "centralized"),
            Err(Error::UnknownPolicy(
                Component::AddrAlloc,
                "centralized".into()
            ))
        );
    }

    #[test]
    fn dft_policy_mod_invokes_reconfigure() {
        let mut reg = registry();
        reg.register_policy(Component::Dft, "sparse");
        let called = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let called2 = std::sync::Arc::clone(&called);
        reg.on_policy_change(Component::Dft, move || {
            called2.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        reg.policy_mod(Component::Dft, "sparse").unwrap();
        assert!(called.load(std::sync::atomic::Ordering::SeqCst));
    }

    // Scenario S6: parameter value outside the declared range is rejected
    // and the parameter retains its previous value.
    #[test]
    fn s6_param_range_check() {
        let mut reg = registry();
        let err = reg
            .policy_param_mod(Component::AddrAlloc, "nack-wait-secs", "0")
            .unwrap_err();
        assert_eq!(
            err,
            Error::OutOfRange(Component::AddrAlloc, "nack-wait-secs".into(), 1, 10)
        );
        assert!(err.to_string().contains("range"));
        assert_eq!(
            reg.param(Component::AddrAlloc, "nack-wait-secs").as_int(),
            Some(2)
        );
    }

    #[test]
    fn bool_param_requires_exact_literal() {
        let mut reg = PolicyRegistry::new();
        reg.register_policy(Component::Enrollment, "default");
        reg.declare_param(
            Component::Enrollment,
            "reliable-n-flows",
            ParamValue::Bool(false),
        );
        assert!(
            reg.policy_param_mod(Component::Enrollment, "reliable-n-flows", "yes")
                .is_err()
        );
        reg.policy_param_mod(Component::Enrollment, "reliable-n-flows", "true")
            .unwrap();
        assert_eq!(
            reg.param(Component::Enrollment, "reliable-n-flows").as_bool(),
            Some(true)
        );
    }

    #[test]
    #[should_panic(expected = "undeclared policy parameter")]
    fn reading_undeclared_param_panics() {
        let reg = registry();
        reg.param(Component::AddrAlloc, "does-not-exist");
    }
}
