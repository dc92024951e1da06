//! Error taxonomy shared by the scheduler, the RAN manager and the agent.
//!
//! Boundary failures (bad arguments, duplicate or missing entities) reject the
//! call without mutating state. Hot-path failures never surface as errors: the
//! MAC worker sees "no allocation" and the condition is logged instead.

use thiserror::Error;

/// Failures raised at the slicing subsystem boundaries.
#[derive(Debug, Error)]
pub enum SliceError {
    /// An argument was rejected before any state was touched (zero id, zero
    /// RNTI, out-of-range index).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A slice with this id is already registered.
    #[error("slice {0:#x} already exists")]
    DuplicateSlice(u64),

    /// No slice with this id is registered.
    #[error("slice {0:#x} not found")]
    UnknownSlice(u64),

    /// No user with this RNTI is known to the subsystem.
    #[error("user {0:#06x} not found")]
    UnknownUser(u16),

    /// The user is already a member of the target slice.
    #[error("user {0:#06x} already in slice")]
    DuplicateUser(u16),

    /// A fixed-capacity table (measurement slots, report buffers) is full.
    /// The request is dropped or the report truncated, never queued.
    #[error("capacity exhausted: {0}")]
    Exhausted(&'static str),

    /// A pending HARQ retransmission mask cannot fit in the RBGs owned by
    /// its UE this TTI.
    #[error("HARQ mask {harq:#x} does not fit in owned mask {owned:#x}")]
    HarqMismatch { harq: u32, owned: u32 },

    /// The controller link failed while framing or sending a message.
    #[error("transport: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SliceResult<T> = Result<T, SliceError>;
