//! Foundation types for the Keva key-value projection engine.
//!
//! This crate provides the identity and operation types shared by every
//! other Keva crate.
//!
//! # Key Types
//!
//! - [`NamespaceId`]: Namespace identity derived from its creating operation
//! - [`OpId`]: Identity of the transaction carrying an operation
//! - [`Operation`]: CreateNamespace / Put / Delete
//! - [`LedgerOp`]: An operation paired with its [`OpId`]
//! - [`OpRef`]: Confirmed (height, position) or pending (sequence) provenance
//! - [`OpScript`] / [`Block`]: Raw operation scripts and connected blocks

pub mod error;
pub mod namespace;
pub mod op;
pub mod script;

pub use error::TypeError;
pub use namespace::{NamespaceId, DISPLAY_NAME_KEY};
pub use op::{LedgerOp, OpId, OpKind, OpRef, Operation};
pub use script::{Block, LedgerTx, OpScript};
