//! Static module registration and the bootstrap install pass
//!
//! Module types declare themselves once with [`register_module!`], which
//! contributes a passive descriptor to a link-time slice. Nothing runs
//! before `main`: an explicit, deterministic [`install_static_modules`]
//! pass walks the slice and registers every descriptor. Because the
//! descriptors are data, declaration order across compilation units is
//! irrelevant and registration-time code cannot observe other modules.

use std::sync::Arc;

use linkme::distributed_slice;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::module::identity::ModuleIdentity;
use crate::module::registry::ModuleRegistry;
use crate::module::traits::{Module, ModuleError};

/// Descriptor contributed by [`register_module!`] for one module type.
pub struct StaticModule {
    /// Declared type name, used in bootstrap logs.
    pub name: &'static str,
    /// Computes the identity of the module type.
    pub identity: fn() -> ModuleIdentity,
    /// Constructs a fresh instance.
    pub factory: fn() -> Arc<dyn Module>,
}

/// Every statically declared module linked into the final binary.
#[distributed_slice]
pub static STATIC_MODULES: [StaticModule];

/// Declare a module type for static registration.
///
/// The type must implement [`Module`] and `Default`. Expands to a passive
/// link-time descriptor; the module is registered when
/// [`install_static_modules`] (or [`bootstrap`]) runs. Callers need a
/// `linkme` dependency for the expansion.
///
/// ```ignore
/// #[derive(Default)]
/// struct Telemetry;
/// impl modkit::Module for Telemetry {}
/// modkit::register_module!(Telemetry);
/// ```
#[macro_export]
macro_rules! register_module {
    ($ty:ty) => {
        const _: () = {
            #[::linkme::distributed_slice($crate::module::bootstrap::STATIC_MODULES)]
            static REGISTRANT: $crate::module::bootstrap::StaticModule =
                $crate::module::bootstrap::StaticModule {
                    name: stringify!($ty),
                    identity: || $crate::ModuleIdentity::of_named::<$ty>(stringify!($ty)),
                    factory: || {
                        ::std::sync::Arc::new(<$ty as ::core::default::Default>::default())
                            as ::std::sync::Arc<dyn $crate::Module>
                    },
                };
        };
    };
}

/// Register every statically declared module with `registry`.
///
/// Deterministic and idempotent: an identity that is already registered
/// (including on a repeated install) is skipped with a warning and the
/// first factory stays in effect. Returns the number of newly registered
/// modules. Run this once at process start, before any module is requested.
pub fn install_static_modules(registry: &ModuleRegistry) -> usize {
    let mut installed = 0;
    for entry in STATIC_MODULES.iter() {
        let identity = (entry.identity)();
        match registry.register(identity, Arc::new(entry.factory)) {
            Ok(()) => {
                debug!(module = entry.name, "installed static module");
                installed += 1;
            }
            Err(err) => {
                warn!(module = entry.name, error = %err, "skipping static module");
            }
        }
    }
    info!(
        installed,
        declared = STATIC_MODULES.len(),
        "static module install pass complete"
    );
    installed
}

/// Install static modules, then eagerly load the configured autoload list.
///
/// Autoload names resolve against registered identities by full or short
/// name. Per-module failures are logged and collected rather than aborting
/// the pass. A disabled config skips everything.
pub fn bootstrap(
    registry: &ModuleRegistry,
    config: &RegistryConfig,
) -> Vec<(String, ModuleError)> {
    if !config.enabled {
        info!("module system disabled by config, skipping bootstrap");
        return Vec::new();
    }

    install_static_modules(registry);

    let mut failures = Vec::new();
    for name in &config.autoload {
        if let Err(err) = registry.load_by_name(name) {
            warn!(module = %name, error = %err, "autoload failed");
            failures.push((name.clone(), err));
        }
    }
    failures
}
