//! Procedure registry.
//!
//! Maps schema-qualified callable names to registered callables with the
//! fixed two-argument shape `(job_id, config)`. Jobs store only the name
//! pair; resolution happens at execution time, so re-registering a name
//! at startup transparently rebinds every job pointing at it.
//!
//! Callables come in the engine's kinds. Only functions and procedures
//! are executable; aggregate and window callables can be registered (the
//! catalog allows naming them) but always fail dispatch with a
//! feature-not-supported error.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tempodb_commons::{JobId, ProcName, Result, TempoDbError};

use crate::app_context::AppContext;
use crate::txn::TxnSession;

/// A function target: runs inside a throwaway evaluation scope with a
/// read snapshot installed, and has no access to transaction control.
pub type JobFunction = Arc<dyn Fn(&AppContext, JobId, Option<&Value>) -> Result<()> + Send + Sync>;

/// A procedure target: runs through the call mechanism and may manage the
/// ambient transaction itself, including committing mid-run.
pub type JobProcedure =
    Arc<dyn Fn(&AppContext, &mut TxnSession, JobId, Option<&Value>) -> Result<()> + Send + Sync>;

/// A registered callable.
#[derive(Clone)]
pub enum JobCallable {
    Function(JobFunction),
    Procedure(JobProcedure),
    Aggregate,
    Window,
}

impl JobCallable {
    pub fn kind(&self) -> CallableKind {
        match self {
            JobCallable::Function(_) => CallableKind::Function,
            JobCallable::Procedure(_) => CallableKind::Procedure,
            JobCallable::Aggregate => CallableKind::Aggregate,
            JobCallable::Window => CallableKind::Window,
        }
    }
}

impl fmt::Debug for JobCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobCallable::{}", self.kind())
    }
}

/// The kind of a registered callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Procedure,
    Aggregate,
    Window,
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallableKind::Function => "function",
            CallableKind::Procedure => "procedure",
            CallableKind::Aggregate => "aggregate",
            CallableKind::Window => "window",
        };
        write!(f, "{}", s)
    }
}

/// Registry of job target callables.
///
/// Thread-safe; registration happens once at startup, resolution on every
/// job execution.
pub struct ProcedureRegistry {
    procs: DashMap<ProcName, JobCallable>,
}

impl ProcedureRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            procs: DashMap::new(),
        }
    }

    /// Register a callable under its schema-qualified name.
    ///
    /// # Panics
    /// Panics if the name is already registered; the registry is assembled
    /// once at startup and a duplicate is a wiring bug.
    pub fn register(&self, proc: ProcName, callable: JobCallable) {
        if self.procs.contains_key(&proc) {
            panic!("callable {} is already registered", proc);
        }
        self.procs.insert(proc, callable);
    }

    /// Resolve a name to its callable.
    ///
    /// # Errors
    /// `UndefinedObject` when no callable is registered under the name.
    pub fn resolve(&self, proc: &ProcName) -> Result<JobCallable> {
        self.procs
            .get(proc)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                TempoDbError::undefined_object(format!(
                    "function or procedure \"{}\" does not exist",
                    proc
                ))
            })
    }

    /// Check whether a name is registered
    pub fn contains(&self, proc: &ProcName) -> bool {
        self.procs.contains_key(proc)
    }

    /// Number of registered callables
    pub fn len(&self) -> usize {
        self.procs.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    /// All registered names
    pub fn names(&self) -> Vec<ProcName> {
        self.procs.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_function() -> JobCallable {
        JobCallable::Function(Arc::new(|_ctx, _job_id, _config| Ok(())))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ProcedureRegistry::new();
        let proc = ProcName::new("analytics", "rollup_hourly");
        registry.register(proc.clone(), noop_function());

        assert!(registry.contains(&proc));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.names(), vec![proc.clone()]);
        assert_eq!(
            registry.resolve(&proc).unwrap().kind(),
            CallableKind::Function
        );
    }

    #[test]
    fn test_resolve_unknown_is_undefined_object() {
        let registry = ProcedureRegistry::new();
        let err = registry
            .resolve(&ProcName::new("analytics", "missing"))
            .unwrap_err();
        assert!(matches!(err, TempoDbError::UndefinedObject(_)));
        assert!(err.to_string().contains("analytics.missing"));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let registry = ProcedureRegistry::new();
        let proc = ProcName::new("analytics", "rollup_hourly");
        registry.register(proc.clone(), noop_function());
        registry.register(proc, noop_function());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CallableKind::Function.to_string(), "function");
        assert_eq!(CallableKind::Window.to_string(), "window");
        assert_eq!(JobCallable::Aggregate.kind(), CallableKind::Aggregate);
    }
}
