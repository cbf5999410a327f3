//! In-process versioned secret store
//!
//! [`MemoryBackend`] honours the full [`SecretBackend`] contract without a
//! network: every write creates a new version, access can be denied per path
//! prefix, the session can be revoked and one-shot faults can be injected.

use crate::{SecretBackend, SecretFields, SecretPath, StoreError, VersionId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Capability a path-prefix denial applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Reading any version
    Read,
    /// Writing new versions
    Write,
}

#[derive(Default)]
struct VersionHistory {
    /// Retained versions, oldest first
    versions: VecDeque<(VersionId, SecretFields)>,
    /// Last version number handed out
    current: u64,
}

#[derive(Default)]
struct MemoryState {
    secrets: HashMap<String, VersionHistory>,
    denied: Vec<(String, Capability)>,
    revoked: bool,
    max_versions: Option<usize>,
    faults: VecDeque<StoreError>,
}

/// Versioned in-memory secret store.
///
/// # Example
///
/// ```ignore
/// use strongbox_secrets::{Capability, MemoryBackend};
///
/// let backend = MemoryBackend::new().with_max_versions(5);
/// backend.deny("system_secrets/", Capability::Write);
/// ```
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty store with unlimited version retention.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max` versions per path; older versions are pruned.
    ///
    /// Version numbers keep increasing after pruning.
    #[must_use]
    pub fn with_max_versions(self, max: usize) -> Self {
        self.state_mut().max_versions = Some(max.max(1));
        self
    }

    /// Deny `capability` on every path starting with `prefix`.
    pub fn deny(&self, prefix: impl Into<String>, capability: Capability) {
        self.state_mut().denied.push((prefix.into(), capability));
    }

    /// Invalidate the session; every later call fails as unauthorized.
    pub fn revoke_session(&self) {
        self.state_mut().revoked = true;
    }

    /// Make the next call fail with `error` instead of touching the store.
    ///
    /// Faults queue up and are consumed one per call, in order.
    pub fn fail_next(&self, error: StoreError) {
        self.state_mut().faults.push_back(error);
    }

    /// Number of versions currently retained at `path`.
    #[must_use]
    pub fn retained_versions(&self, path: &SecretPath) -> usize {
        self.state()
            .secrets
            .get(path.as_str())
            .map_or(0, |history| history.versions.len())
    }

    fn state(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply faults, revocation and denials shared by every call.
    fn admit(
        state: &mut MemoryState,
        path: Option<&SecretPath>,
        capability: Capability,
    ) -> Result<(), StoreError> {
        if let Some(fault) = state.faults.pop_front() {
            return Err(fault);
        }
        if state.revoked {
            return Err(StoreError::Unauthorized("session revoked".to_string()));
        }
        if let Some(path) = path {
            let denied = state
                .denied
                .iter()
                .any(|(prefix, cap)| *cap == capability && path.as_str().starts_with(prefix));
            if denied {
                return Err(StoreError::Forbidden("permission denied".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn validate_session(&self) -> Result<(), StoreError> {
        let mut state = self.state_mut();
        Self::admit(&mut state, None, Capability::Read)
    }

    async fn write(
        &self,
        path: &SecretPath,
        fields: &SecretFields,
    ) -> Result<VersionId, StoreError> {
        let mut state = self.state_mut();
        Self::admit(&mut state, Some(path), Capability::Write)?;

        let max_versions = state.max_versions;
        let history = state.secrets.entry(path.as_str().to_string()).or_default();
        history.current += 1;
        let version = VersionId::new(history.current);
        history.versions.push_back((version, fields.clone()));
        if let Some(max) = max_versions {
            while history.versions.len() > max {
                history.versions.pop_front();
            }
        }

        Ok(version)
    }

    async fn read_latest(&self, path: &SecretPath) -> Result<SecretFields, StoreError> {
        let mut state = self.state_mut();
        Self::admit(&mut state, Some(path), Capability::Read)?;

        state
            .secrets
            .get(path.as_str())
            .and_then(|history| history.versions.back())
            .map(|(_, fields)| fields.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn read_version(
        &self,
        path: &SecretPath,
        version: VersionId,
    ) -> Result<SecretFields, StoreError> {
        let mut state = self.state_mut();
        Self::admit(&mut state, Some(path), Capability::Read)?;

        state
            .secrets
            .get(path.as_str())
            .and_then(|history| history.versions.iter().find(|(v, _)| *v == version))
            .map(|(_, fields)| fields.clone())
            .ok_or(StoreError::NotFound)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryBackend")
            .field("paths", &state.secrets.len())
            .field("denied", &state.denied)
            .field("revoked", &state.revoked)
            .field("max_versions", &state.max_versions)
            .finish()
    }
}
