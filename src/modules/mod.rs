//! Core pseudo root modules.
//!
//! - `constants`: default paths, modes and identities
//! - `error`: typed errors for mounts, the root directory and subprocesses
//! - `export`: export entries and the per-class registry
//! - `execute`: subprocess runner with diagnostic capture
//! - `tree`: directory creation and removal inside the pseudo tree
//! - `mounts`: mount primitives behind the `Mounter` trait
//! - `sequencer`: shortest-path-first mount ordering
//! - `pseudo`: published root export and the lookups built on it
//! - `v4root`: building and tearing down the pseudo tree
//! - `config`: runtime configuration
//! - `service` and `daemon`: the long-running binary mode

pub mod config;
pub mod constants;
pub mod daemon;
pub mod error;
pub mod execute;
pub mod export;
pub mod mounts;
pub mod pseudo;
pub mod sequencer;
pub mod service;
pub mod tree;
/// Pseudo root construction and teardown.
pub mod v4root;
