//! # Vault Config Controller
//!
//! A Kubernetes controller that keeps HashiCorp Vault configuration in sync
//! with custom resources:
//!
//! - `VaultMount`: secret-engine mounts of any type
//! - `VaultKVMount`: key/value mounts (version 1 or 2)
//! - `VaultPolicy`: ACL policies
//!
//! Each resource is protected by a finalizer so its Vault counterpart is
//! removed before the manifest disappears. Renaming a mount path or policy
//! creates the new object first and removes the old one afterwards.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
pub mod vault;
