//! Tributary Sample - A sharded service consuming a simulated stream.
//!
//! Pieces used by the `tributary-sample` binary, kept in a library so they
//! can be tested:
//!
//! - [`profile`]: TOML service profile describing the listener and broker
//! - [`processor`]: a processor that logs and counts batches

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod processor;
pub mod profile;

pub use processor::LoggingProcessor;
pub use profile::{ProfileError, ServiceProfile};
