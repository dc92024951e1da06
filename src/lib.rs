//! LTE RAN slicing scheduler with a controller-facing telemetry agent.
//!
//! The crate has two halves. The scheduling half partitions a cell's downlink
//! resource-block groups across tenants every millisecond and reconciles the
//! outcome with pending HARQ retransmissions. The agent half reports UE,
//! measurement, PRB and slice state to an external controller over a framed
//! TCP link and applies the slice commands coming back.

pub mod agent;
pub mod config;
pub mod error;
pub mod mac;
pub mod mask;
pub mod proto;
pub mod ran;
pub mod sched;
pub mod threading;
pub mod transport;

pub use agent::{Agent, AgentDispatch, ControlAgent, NoopAgent};
pub use config::AgentConfig;
pub use error::{SliceError, SliceResult};
pub use ran::RanManager;
pub use sched::{DlRanScheduler, SliceId, UlRrScheduler, DEFAULT_SLICE};
