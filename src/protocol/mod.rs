// src/protocol/mod.rs
//! Tracker protocol decoding

pub mod position;
pub mod xexun;

pub use position::{DeviceId, Position};
pub use xexun::{decode, DecodeError};
