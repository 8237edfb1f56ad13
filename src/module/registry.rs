//! Module registry: registration table, lifecycle state machine, lookup
//!
//! The registry is the single authority over which module types are
//! *registered* (a factory is known) and which are *loaded* (an instance
//! exists and has started). It exclusively owns every loaded instance and
//! hands out only non-owning [`ModuleHandle`]s.
//!
//! ## Locking
//!
//! Each table sits behind its own reader/writer lock. Reads
//! (`is_registered`, `is_loaded`, a `get` hit) take a shared lock; writes
//! take an exclusive lock on the relevant table. Lifecycle hooks always run
//! with no lock held, which is what allows `on_start` bodies to re-enter
//! the registry for dependency resolution.
//!
//! There is no combined atomicity across the two tables. Two threads racing
//! `get` on the same not-yet-loaded identity can both miss the loaded table
//! and race into `load`; the in-flight marker guarantees the instance is
//! constructed and started exactly once, and the losing caller sees a
//! recoverable `AlreadyLoaded` failure it can resolve by retrying `get`.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::module::handle::ModuleHandle;
use crate::module::identity::ModuleIdentity;
use crate::module::traits::{Module, ModuleError, ModuleFactory};

/// Loaded-side state, guarded by a single lock.
///
/// `in_flight` holds identities whose factory or `on_start` is currently
/// running off-lock. They count as loaded for precondition checks but are
/// not yet visible to lookups, so a partially started module can never be
/// observed.
#[derive(Default)]
struct LoadedTable {
    instances: HashMap<ModuleIdentity, Arc<dyn Module>>,
    in_flight: HashSet<ModuleIdentity>,
    load_order: Vec<ModuleIdentity>,
}

/// Releases an in-flight claim if the factory or `on_start` unwinds, so a
/// panicking load leaves the identity loadable instead of claimed forever.
/// Disarmed once the instance is committed for publication.
struct ClaimGuard<'a> {
    loaded: &'a RwLock<LoadedTable>,
    identity: &'a ModuleIdentity,
    armed: bool,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.loaded.write().in_flight.remove(self.identity);
            warn!(module = %self.identity, "load aborted, claim released");
        }
    }
}

/// Process-wide authority over module registration and lifecycle.
///
/// Usually constructed once per process, either explicitly and passed by
/// reference, or through the [`global()`](crate::global) convenience
/// instance. All operations take `&self` and are safe to call from any
/// thread.
#[derive(Default)]
pub struct ModuleRegistry {
    registered: RwLock<HashMap<ModuleIdentity, ModuleFactory>>,
    loaded: RwLock<LoadedTable>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ----- registration -----

    /// Register a factory for `identity`.
    ///
    /// Inserts iff absent. Registering an already-present identity is a
    /// reported no-op: the first factory stays in effect. Never
    /// instantiates anything.
    pub fn register(
        &self,
        identity: ModuleIdentity,
        factory: ModuleFactory,
    ) -> Result<(), ModuleError> {
        if identity.name().is_empty() {
            warn!("rejecting module registration with empty name");
            return Err(ModuleError::InvalidIdentity(identity.name().to_string()));
        }

        let mut registered = self.registered.write();
        if registered.contains_key(&identity) {
            warn!(module = %identity, "already registered, keeping first factory");
            return Err(ModuleError::AlreadyRegistered(identity.name().to_string()));
        }
        debug!(module = %identity, "registered module factory");
        registered.insert(identity, factory);
        Ok(())
    }

    /// Register `M` under its own identity with a `Default`-based factory.
    pub fn register_type<M: Module + Default>(&self) -> Result<(), ModuleError> {
        self.register(
            ModuleIdentity::of::<M>(),
            Arc::new(|| Arc::new(M::default()) as Arc<dyn Module>),
        )
    }

    /// Whether a factory is known for `identity`.
    pub fn is_registered(&self, identity: &ModuleIdentity) -> bool {
        self.registered.read().contains_key(identity)
    }

    /// Number of registered module types.
    pub fn registered_count(&self) -> usize {
        self.registered.read().len()
    }

    /// Resolve a registered identity from its full or short name.
    pub fn identity_by_name(&self, name: &str) -> Option<ModuleIdentity> {
        let registered = self.registered.read();
        registered.keys().find(|id| id.matches_name(name)).cloned()
    }

    // ----- loading / unloading -----

    /// Instantiate and start the module registered under `identity`.
    ///
    /// The stored factory runs and `on_start` completes before the instance
    /// is published to any lookup. Fails with [`ModuleError::NotRegistered`]
    /// or [`ModuleError::AlreadyLoaded`] (the latter also covers a load of
    /// the same identity currently in flight on another thread), leaving
    /// both tables unchanged. A panic in the factory or in `on_start`
    /// propagates to the caller and also leaves both tables unchanged.
    pub fn load(&self, identity: &ModuleIdentity) -> Result<(), ModuleError> {
        let factory = {
            let registered = self.registered.read();
            match registered.get(identity) {
                Some(factory) => Arc::clone(factory),
                None => {
                    warn!(module = %identity, "not registered, cannot load");
                    return Err(ModuleError::NotRegistered(identity.name().to_string()));
                }
            }
        };

        // Claim the identity before constructing, so racing loaders fail
        // their precondition instead of building a second instance.
        {
            let mut loaded = self.loaded.write();
            if loaded.instances.contains_key(identity) || loaded.in_flight.contains(identity) {
                warn!(module = %identity, "already loaded");
                return Err(ModuleError::AlreadyLoaded(identity.name().to_string()));
            }
            loaded.in_flight.insert(identity.clone());
        }

        // No lock held: `on_start` may re-enter the registry. A re-entrant
        // load of the same identity sees the in-flight claim and fails
        // rather than deadlocking. If either step panics, the guard drops
        // the claim on the way out.
        let mut claim = ClaimGuard {
            loaded: &self.loaded,
            identity,
            armed: true,
        };
        let instance = factory();
        instance.on_start();
        claim.armed = false;

        let mut loaded = self.loaded.write();
        loaded.in_flight.remove(identity);
        loaded.instances.insert(identity.clone(), instance);
        loaded.load_order.push(identity.clone());
        info!(module = %identity, "module loaded");
        Ok(())
    }

    /// Stop and destroy the instance loaded under `identity`.
    ///
    /// The instance is unpublished first, then `on_stop` runs with no lock
    /// held, then the registry's owning reference is dropped, revoking all
    /// outstanding handles. Unpublishing first makes `on_stop` exactly-once
    /// even under concurrent unloads of the same identity.
    pub fn unload(&self, identity: &ModuleIdentity) -> Result<(), ModuleError> {
        let instance = {
            let mut loaded = self.loaded.write();
            match loaded.instances.remove(identity) {
                Some(instance) => {
                    loaded.load_order.retain(|id| id != identity);
                    instance
                }
                None => {
                    warn!(module = %identity, "not loaded, cannot unload");
                    return Err(ModuleError::NotLoaded(identity.name().to_string()));
                }
            }
        };

        instance.on_stop();
        info!(module = %identity, "module unloaded");
        Ok(())
    }

    /// Whether an instance is currently loaded (and visible) for `identity`.
    pub fn is_loaded(&self, identity: &ModuleIdentity) -> bool {
        self.loaded.read().instances.contains_key(identity)
    }

    /// Number of currently loaded modules.
    pub fn loaded_count(&self) -> usize {
        self.loaded.read().instances.len()
    }

    /// Identities of all loaded modules, in load order.
    pub fn loaded_modules(&self) -> Vec<ModuleIdentity> {
        self.loaded.read().load_order.clone()
    }

    /// Load a registered module by its full or short name.
    pub fn load_by_name(&self, name: &str) -> Result<(), ModuleError> {
        let identity = self
            .identity_by_name(name)
            .ok_or_else(|| ModuleError::NotRegistered(name.to_string()))?;
        self.load(&identity)
    }

    // ----- lookup -----

    /// Resolve a handle to the module loaded under `identity`.
    ///
    /// If the module is registered but not loaded, the registry self-heals
    /// by loading it on behalf of the caller. Returns `None`, with a
    /// diagnostic, when the identity was never registered or recovery
    /// failed; a recovery loss against a concurrent loader is resolved by
    /// calling `get` again. Never panics.
    pub fn get(&self, identity: &ModuleIdentity) -> Option<ModuleHandle> {
        if let Some(handle) = self.lookup(identity) {
            return Some(handle);
        }
        if !self.is_registered(identity) {
            warn!(module = %identity, "not registered, no handle");
            return None;
        }
        match self.load(identity) {
            Ok(()) => self.lookup(identity),
            Err(err) => {
                warn!(module = %identity, error = %err, "recovery load failed");
                None
            }
        }
    }

    /// Typed lookup: resolve a handle to the concrete module type `M`.
    ///
    /// Same recovery behavior as [`get`](Self::get). Returns
    /// [`ModuleError::TypeMismatch`] if the instance loaded under `M`'s
    /// identity is some other concrete type, and [`ModuleError::NotLoaded`]
    /// if no handle could be resolved.
    pub fn try_handle_of<M: Module>(&self) -> Result<ModuleHandle<M>, ModuleError> {
        let identity = ModuleIdentity::of::<M>();
        let instance = self
            .get(&identity)
            .and_then(|handle| handle.upgrade())
            .ok_or_else(|| ModuleError::NotLoaded(identity.name().to_string()))?;

        match instance.as_any_arc().downcast::<M>() {
            Ok(concrete) => Ok(ModuleHandle::new(Arc::downgrade(&concrete))),
            Err(_) => {
                error!(module = %identity, "identity resolves to a different concrete type");
                Err(ModuleError::TypeMismatch(identity.name().to_string()))
            }
        }
    }

    /// Typed lookup that treats a type mismatch as a programmer error.
    ///
    /// Returns `None` under the same recoverable conditions as
    /// [`get`](Self::get).
    ///
    /// # Panics
    ///
    /// Panics if the instance loaded under `M`'s identity is a different
    /// concrete type. That is a wiring defect (a foreign factory registered
    /// under `M`'s identity), not a runtime condition to recover from.
    pub fn handle_of<M: Module>(&self) -> Option<ModuleHandle<M>> {
        match self.try_handle_of::<M>() {
            Ok(handle) => Some(handle),
            Err(ModuleError::TypeMismatch(name)) => {
                panic!("module {name} is loaded as a different concrete type")
            }
            Err(_) => None,
        }
    }

    /// Ensure the module type `M` is loaded, loading it if necessary.
    ///
    /// Intended for `on_start` bodies declaring dependencies: an already
    /// loaded (or currently starting) dependency is success, not an error.
    pub fn require<M: Module>(&self) -> Result<(), ModuleError> {
        match self.load(&ModuleIdentity::of::<M>()) {
            Ok(()) | Err(ModuleError::AlreadyLoaded(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn lookup(&self, identity: &ModuleIdentity) -> Option<ModuleHandle> {
        let loaded = self.loaded.read();
        loaded
            .instances
            .get(identity)
            .map(|instance| ModuleHandle::new(Arc::downgrade(instance)))
    }

    // ----- teardown -----

    /// Stop and release every loaded instance, in reverse load order.
    ///
    /// The single bulk operation, meant to run exactly once at process
    /// shutdown; calling it again on an empty registry is a no-op. A hook
    /// that panics is logged and does not stop teardown of the remaining
    /// modules. Expects no loads to be in flight on other threads.
    pub fn teardown(&self) {
        let drained: Vec<(ModuleIdentity, Arc<dyn Module>)> = {
            let mut loaded = self.loaded.write();
            let order: Vec<ModuleIdentity> = loaded.load_order.drain(..).rev().collect();
            let mut drained = Vec::with_capacity(order.len());
            for identity in order {
                if let Some(instance) = loaded.instances.remove(&identity) {
                    drained.push((identity, instance));
                }
            }
            // Instances that somehow escaped order tracking still stop.
            drained.extend(loaded.instances.drain());
            drained
        };

        if drained.is_empty() {
            return;
        }

        info!(count = drained.len(), "tearing down loaded modules");
        for (identity, instance) in drained {
            if panic::catch_unwind(AssertUnwindSafe(|| instance.on_stop())).is_err() {
                error!(module = %identity, "on_stop panicked during teardown");
            } else {
                debug!(module = %identity, "module stopped");
            }
        }
    }
}

impl Drop for ModuleRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}
