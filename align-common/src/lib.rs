//! # Alignment common library
//!
//! Shared code for the alignment import/export clients:
//! - Transform models and tile/transform specifications
//! - Resolved tile spec collections with validation and filtering
//! - The stack web service client
//! - Section reconciliation (per-z batching and the two-phase commit)
//! - Progress timing and z-key canonicalization

pub mod client;
pub mod collection;
pub mod error;
pub mod progress;
pub mod reconcile;
pub mod spec;
pub mod testing;
pub mod transform;
pub mod validate;
pub mod zkey;

pub use error::{Error, Result};
