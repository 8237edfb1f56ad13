//! Module system core
//!
//! This module provides the registry, the lifecycle capability, identity
//! keys, non-owning handles, and the static-registration bootstrap.
//!
//! ## Architecture
//!
//! - **Single ownership**: the registry exclusively owns loaded instances;
//!   consumers hold weak handles and re-resolve them per use
//! - **State machine per identity**: unregistered → registered → loaded →
//!   back to registered on unload
//! - **Lazy recovery**: `get` on a registered-but-unloaded identity loads
//!   the module on behalf of the caller
//! - **Unlocked hooks**: `on_start`/`on_stop` run with no registry lock
//!   held, so modules can resolve their dependencies from inside `on_start`

pub mod bootstrap;
pub mod handle;
pub mod identity;
pub mod registry;
pub mod traits;

pub use bootstrap::{bootstrap, install_static_modules, StaticModule, STATIC_MODULES};
pub use handle::ModuleHandle;
pub use identity::ModuleIdentity;
pub use registry::ModuleRegistry;
pub use traits::{AsAnyArc, Module, ModuleError, ModuleFactory};
