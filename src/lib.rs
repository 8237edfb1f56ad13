//! Modkit - process-wide module registry and lifecycle manager
//!
//! Independently compiled components ("modules") declare themselves once,
//! are instantiated on demand, receive start/stop lifecycle callbacks, and
//! can be looked up by other modules through non-owning handles that never
//! extend an instance's lifetime past its unload.
//!
//! ## Design Principles
//!
//! 1. **Explicit bootstrap**: static registration is passive link-time
//!    data, installed by a deterministic pass at process start - no
//!    life-before-main side effects, no init-order hazards
//! 2. **Single ownership**: the registry owns every loaded instance;
//!    consumers hold weak handles and re-resolve them per use
//! 3. **Lazy recovery**: looking up a registered-but-unloaded module loads
//!    it on behalf of the caller, so `on_start` bodies can simply resolve
//!    the modules they depend on
//! 4. **Checked failures**: operations return `Result`/`Option` and leave
//!    registry state unchanged on failure; diagnostics go to `tracing`
//!
//! ## Example
//!
//! ```
//! use modkit::{Module, ModuleRegistry};
//!
//! #[derive(Default)]
//! struct Telemetry;
//!
//! impl Module for Telemetry {
//!     fn on_start(&self) { /* acquire resources, resolve dependencies */ }
//!     fn on_stop(&self) { /* flush and release */ }
//! }
//!
//! let registry = ModuleRegistry::new();
//! registry.register_type::<Telemetry>().unwrap();
//!
//! let handle = registry.handle_of::<Telemetry>().unwrap();
//! assert!(handle.is_alive());
//!
//! registry.teardown();
//! assert!(!handle.is_alive());
//! ```

pub mod config;
pub mod module;

pub use config::{ConfigError, RegistryConfig};
pub use module::bootstrap::{bootstrap, install_static_modules, StaticModule, STATIC_MODULES};
pub use module::handle::ModuleHandle;
pub use module::identity::ModuleIdentity;
pub use module::registry::ModuleRegistry;
pub use module::traits::{AsAnyArc, Module, ModuleError, ModuleFactory};

use once_cell::sync::Lazy;

static GLOBAL_REGISTRY: Lazy<ModuleRegistry> = Lazy::new(ModuleRegistry::new);

/// Process-wide default registry, constructed lazily on first use.
///
/// A convenience over threading an explicit `&ModuleRegistry`; the whole
/// API is instance-based, so prefer passing a registry where practical.
/// Lifecycle hooks that resolve dependencies through this instance must
/// belong to modules loaded through it as well.
pub fn global() -> &'static ModuleRegistry {
    &GLOBAL_REGISTRY
}
