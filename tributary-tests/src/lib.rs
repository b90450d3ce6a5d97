//! Tributary Tests - Integration tests for Tributary.
//!
//! Cross-crate tests that run real listeners against the simulated broker
//! and the checkpoint stores.
//!
//! ## Test Organization
//!
//! **Integration Tests** (`*_tests.rs`):
//! - `assignment_tests`: Assignment properties over many cluster shapes
//! - `listener_tests`: Listener lifecycle, batching and multi-node runs
//! - `checkpoint_tests`: Resume-after-restart with both checkpoint stores
//!
//! **Support Modules**:
//! - `properties`: Assignment plan checkers (cover, overlap, idle nodes)
//! - `scenarios`: Standard cluster shapes and regression seeds
//! - `support`: Recording processor and polling helpers
//!
//! ## Naming Conventions
//!
//! - Integration tests: `test_<component>_<scenario>`
//! - Unit tests: Inline in each crate under `#[cfg(test)]`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod properties;
pub mod scenarios;
pub mod support;

// Integration test modules (multi-component tests).
#[cfg(test)]
mod assignment_tests;
