//! Environment sinks populated by [`SecretClient::sync_to_environment`]
//!
//! [`SecretClient::sync_to_environment`]: crate::SecretClient::sync_to_environment

use crate::{SecretError, SecureSecret};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Destination for secrets mirrored into an environment.
///
/// Entries are only ever created or overwritten; nothing is invalidated when a
/// secret rotates in the store, so callers re-sync after rotation.
pub trait EnvironmentSink: Send + Sync {
    /// Bind `name` to `value`, replacing any previous binding.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidRequest`] if the sink cannot represent
    /// the name or value. Nothing is written in that case.
    fn set(&self, name: &str, value: &str) -> Result<(), SecretError>;
}

/// In-memory environment mirror.
///
/// Holds the last synced value per name. Cloning the values out with
/// [`to_env_map`](Self::to_env_map) is the usual way to hand them to a child
/// process without touching the current process environment.
#[derive(Default)]
pub struct EnvironmentMirror {
    entries: RwLock<HashMap<String, SecureSecret>>,
}

impl EnvironmentMirror {
    /// Create an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the last synced value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SecureSecret> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Check if `name` has been synced.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Number of synced names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing has been synced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of synced names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Copy all bindings into a plain map for process injection.
    ///
    /// This exposes every value. Do not log or persist the result.
    #[must_use]
    pub fn to_env_map(&self) -> HashMap<String, String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.expose().to_string()))
            .collect()
    }
}

impl EnvironmentSink for EnvironmentMirror {
    fn set(&self, name: &str, value: &str) -> Result<(), SecretError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), SecureSecret::new(value));
        Ok(())
    }
}

impl std::fmt::Debug for EnvironmentMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentMirror")
            .field("names", &self.names())
            .finish()
    }
}

/// Writes synced secrets into the real process environment.
///
/// The process environment is global: every thread and every later child
/// process sees the binding. Prefer [`EnvironmentMirror`] unless code that
/// reads `std::env` directly must observe the secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl ProcessEnvironment {
    /// Create a sink bound to the current process environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EnvironmentSink for ProcessEnvironment {
    #[allow(unsafe_code)]
    fn set(&self, name: &str, value: &str) -> Result<(), SecretError> {
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            return Err(SecretError::InvalidRequest {
                reason: format!("'{name}' cannot be used as an environment variable name"),
            });
        }
        if value.contains('\0') {
            return Err(SecretError::InvalidRequest {
                reason: format!("value for '{name}' contains a NUL byte"),
            });
        }

        // SAFETY: Rust 2024 marks env mutation unsafe because concurrent
        // readers in other threads may observe a torn environment. Callers opt
        // into that by choosing this sink over `EnvironmentMirror`.
        unsafe {
            std::env::set_var(name, value);
        }
        Ok(())
    }
}
