//! Module export values
//!
//! The host hands every executed module back as a `ModuleExports` trait
//! object. All access (read, write, invocation, membership, enumeration) goes
//! through the `Exports` trait, which is what lets the hot-swap indirection
//! stand in for a real export object without consumers noticing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ExportError;

/// Plain data exchanged with module exports
pub type Value = serde_json::Value;

/// A callable export member
pub type NativeFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Shared handle to a module's exports
pub type ModuleExports = Arc<dyn Exports>;

/// Operations every export object supports
pub trait Exports: Send + Sync {
    /// Read a data member
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a data member; returns false if the write was rejected
    fn set(&self, key: &str, value: Value) -> bool;

    /// Membership test over data and callable members
    fn has(&self, key: &str) -> bool;

    /// Member names in a stable order
    fn keys(&self) -> Vec<String>;

    /// Invoke a callable member
    fn call(&self, key: &str, args: &[Value]) -> Result<Value, ExportError>;
}

/// Identity comparison for export handles.
///
/// Compares the data pointer only, so two handles to the same object compare
/// equal regardless of which vtable they were created through.
pub fn same_exports(a: &ModuleExports, b: &ModuleExports) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Map-backed export object, the usual return value of a `ModuleExecutor`.
#[derive(Default)]
pub struct ObjectExports {
    values: RwLock<BTreeMap<String, Value>>,
    functions: RwLock<BTreeMap<String, NativeFn>>,
}

impl ObjectExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// The neutral object produced by the stub module
    pub fn empty() -> ModuleExports {
        Arc::new(Self::new())
    }

    pub fn with_value(self, key: impl Into<String>, value: Value) -> Self {
        self.values.write().insert(key.into(), value);
        self
    }

    pub fn with_function<F>(self, key: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.functions.write().insert(key.into(), Arc::new(function));
        self
    }

    pub fn into_exports(self) -> ModuleExports {
        Arc::new(self)
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty() && self.functions.read().is_empty()
    }
}

impl Exports for ObjectExports {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> bool {
        self.values.write().insert(key.to_string(), value);
        true
    }

    fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key) || self.functions.read().contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.extend(self.functions.read().keys().cloned());
        keys.sort();
        keys.dedup();
        keys
    }

    fn call(&self, key: &str, args: &[Value]) -> Result<Value, ExportError> {
        // Clone out so the function may re-enter this object
        let function = self.functions.read().get(key).cloned();
        match function {
            Some(function) => function(args).map_err(|source| ExportError::Failed {
                member: key.to_string(),
                source,
            }),
            None if self.values.read().contains_key(key) => Err(ExportError::NotCallable {
                member: key.to_string(),
            }),
            None => Err(ExportError::Missing {
                member: key.to_string(),
            }),
        }
    }
}

impl fmt::Debug for ObjectExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectExports")
            .field("keys", &self.keys())
            .finish()
    }
}
