//! Control protocol
//!
//! [`protocol`] holds the frame types and request correlation;
//! [`Query`] is the engine that multiplexes conversation messages and control
//! traffic over a single [`Transport`](crate::Transport).

pub mod protocol;
mod query;

pub use protocol::{
    ControlMessage, ControlOutcome, ControlResponse, InboundControlRequest,
    OutboundControlRequest, ProtocolHandler,
};
pub use query::{Query, QueryConfig, DEFAULT_CONTROL_TIMEOUT};
