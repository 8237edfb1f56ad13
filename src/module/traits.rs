//! Module lifecycle trait, factory type, and error taxonomy
//!
//! Defines the capability every module implements and the checked error
//! results returned by registry operations.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Upcast support for the typed lookup path.
///
/// Blanket-implemented for every sized type, so any `dyn Module` can be
/// recovered as `Arc<dyn Any>` and downcast to its concrete type. Module
/// authors never implement this by hand.
pub trait AsAnyArc: Any {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Lifecycle capability implemented by every module.
///
/// Both hooks are optional and default to no-ops. They run synchronously on
/// the thread driving the transition, with no registry lock held, so a hook
/// body may re-enter the registry to resolve modules it depends on.
pub trait Module: AsAnyArc + Send + Sync {
    /// Invoked exactly once per load, after construction and strictly
    /// before the instance becomes visible to any lookup.
    fn on_start(&self) {}

    /// Invoked exactly once per unload or teardown, after the instance is
    /// unpublished from lookups and strictly before it is destroyed.
    fn on_stop(&self) {}
}

/// Stored constructor producing a fresh module instance on demand.
///
/// Owned by the registration table once registered; never handed out.
pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn Module> + Send + Sync>;

/// Checked failures returned by registry operations.
///
/// Every operation leaves registry state unchanged when it fails, and none
/// of these propagate by panic. The one assertion-level condition,
/// [`ModuleError::TypeMismatch`], only panics through
/// [`ModuleRegistry::handle_of`](crate::ModuleRegistry::handle_of), which
/// documents it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("module identity {0:?} is malformed")]
    InvalidIdentity(String),

    #[error("module {0} is already registered")]
    AlreadyRegistered(String),

    #[error("module {0} is not registered, cannot load")]
    NotRegistered(String),

    #[error("module {0} is already loaded")]
    AlreadyLoaded(String),

    #[error("module {0} is not loaded, cannot unload")]
    NotLoaded(String),

    #[error("module {0} is loaded as a different concrete type")]
    TypeMismatch(String),
}

impl ModuleError {
    /// Name of the module the failure refers to.
    pub fn module_name(&self) -> &str {
        match self {
            Self::InvalidIdentity(name)
            | Self::AlreadyRegistered(name)
            | Self::NotRegistered(name)
            | Self::AlreadyLoaded(name)
            | Self::NotLoaded(name)
            | Self::TypeMismatch(name) => name,
        }
    }
}
