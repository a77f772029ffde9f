// src/lib.rs
//! Xexun tracker decoder
//!
//! Decodes Xexun `GPRMC ... imei:` sentences into positions and closes
//! tracker connections after a configurable delay.

pub mod config;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod registry;
pub mod reset;
pub mod server;

// Re-export main types for convenience
pub use error::{Result, XexunError};
pub use protocol::{decode, DecodeError, DeviceId, Position};
pub use registry::{DeviceRegistry, MemoryRegistry};
pub use reset::{CancelPolicy, ChannelEvent, ConnectionReset, Disconnect, ResetPolicy, ResetState};
pub use server::DecoderServer;
