//! Module identity keys
//!
//! An identity names a module *type*, not an instance. Identities are the
//! sole key of both registry tables.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::module::traits::Module;

/// Immutable identity of a module type.
///
/// Two identities compare equal iff they denote the same concrete module
/// type; the name is carried for diagnostics and config lookup only and
/// does not participate in equality.
#[derive(Debug, Clone)]
pub struct ModuleIdentity {
    name: &'static str,
    type_id: TypeId,
}

impl ModuleIdentity {
    /// Compute the identity of a concrete module type.
    ///
    /// The name defaults to the type's full path as reported by the
    /// compiler.
    pub fn of<M: Module>() -> Self {
        Self {
            name: type_name::<M>(),
            type_id: TypeId::of::<M>(),
        }
    }

    /// Identity of `M` under a custom display name.
    ///
    /// Equality is still keyed on the type, so this resolves to the same
    /// registry entries as [`ModuleIdentity::of`].
    pub fn of_named<M: Module>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<M>(),
        }
    }

    /// Display name. Usually a full type path.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Trailing path segment of the name, for config files and logs.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    /// Opaque type tag backing equality.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether `name` refers to this identity, by full or short name.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.short_name() == name
    }
}

impl PartialEq for ModuleIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModuleIdentity {}

impl Hash for ModuleIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
