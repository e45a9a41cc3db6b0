//! Capability descriptors of public resources.
//!
//! A public resource declares which functional roles it can fulfill. Callers
//! ask for the roles they need and a resource matches when its declaration
//! *provides* the request (superset check, one direction only).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Immutable set of functional roles a resource can fulfill.
///
/// [`Capabilities::None`] is the sentinel for "no capabilities": a resource
/// carrying it is excluded from every public query even when it would
/// otherwise satisfy the predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capabilities {
    #[default]
    None,
    Provides(BTreeSet<String>),
}

impl Capabilities {
    pub fn none() -> Self {
        Self::None
    }

    /// Builds a declaration from role names.
    pub fn of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Provides(roles.into_iter().map(Into::into).collect())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        let roles = match self {
            Self::None => None,
            Self::Provides(roles) => Some(roles.iter().map(String::as_str)),
        };
        roles.into_iter().flatten()
    }

    /// Returns true when `provider` declares every role requested by `self`.
    ///
    /// The sentinel never provides anything and is never satisfied.
    pub fn provided_by(&self, provider: &Capabilities) -> bool {
        match (self, provider) {
            (Self::Provides(requested), Self::Provides(declared)) => {
                requested.is_subset(declared)
            }
            _ => false,
        }
    }

    /// Inverse of [`Capabilities::provided_by`].
    pub fn provides(&self, required: &Capabilities) -> bool {
        required.provided_by(self)
    }
}

impl Display for Capabilities {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "<none>"),
            Self::Provides(roles) => {
                let joined: Vec<&str> = roles.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(", "))
            }
        }
    }
}
