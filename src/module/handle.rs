//! Non-owning module handles
//!
//! The registry exclusively owns every loaded instance. Lookups hand out
//! weak handles: holding one never keeps a module alive past its unload.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::module::traits::Module;

/// Non-owning reference to a loaded module instance.
///
/// Valid until the module behind it is unloaded. A handle is a resolution
/// result, not a cache: re-resolve through the registry on each use rather
/// than retaining a handle across a potential unload boundary.
pub struct ModuleHandle<M: ?Sized = dyn Module> {
    inner: Weak<M>,
}

impl<M: ?Sized> ModuleHandle<M> {
    pub(crate) fn new(inner: Weak<M>) -> Self {
        Self { inner }
    }

    /// Borrow the instance for the duration of one use.
    ///
    /// Returns `None` once the module has been unloaded. The returned `Arc`
    /// keeps the instance alive only for the borrow; drop it promptly.
    pub fn upgrade(&self) -> Option<Arc<M>> {
        self.inner.upgrade()
    }

    /// Whether the module behind this handle is still loaded.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<M: ?Sized> Clone for ModuleHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<M: ?Sized> fmt::Debug for ModuleHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
