//! `HashiCorp` Vault integration for strongbox
//!
//! This crate provides a [`SecretBackend`](strongbox_secrets::SecretBackend)
//! for Vault's KV v2 secrets engine:
//! - [`VaultConfig`] / [`VaultCredentials`] describe where and how to connect
//! - [`VaultBackend`] performs the reads and writes and translates Vault
//!   errors into [`StoreError`](strongbox_secrets::StoreError)

mod backend;
mod config;

pub use backend::{VaultBackend, classify_client_error};
pub use config::{VaultConfig, VaultCredentials};
