//! Synchronization used by worker tasks of one session.
//!
//! Workers never share buffers; they meet only at collectives. This module
//! provides the abortable rendezvous those collectives are built on.

pub mod barrier;
pub mod comm;

pub use barrier::AbortableBarrier;
pub use comm::{AbortOnPanic, Communicator};
