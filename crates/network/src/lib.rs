//! Transport abstraction for the Meridian synchronizer.
//!
//! The synchronizer never touches sockets. It consumes [`NetworkEvent`]s from
//! a channel the host wires up, and produces framed bundles through the
//! [`Network`] trait. Production backends adapt a gossip/streaming substrate;
//! the `test-utils` feature provides an in-memory implementation.

mod traits;

pub use traits::{Network, NetworkError, NetworkEvent, StreamReader, TopicId};

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
