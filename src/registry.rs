// src/registry.rs
//! Device lookup by IMEI

use crate::protocol::position::DeviceId;
use std::collections::HashMap;

/// Resolves a tracker IMEI to an internal device identifier.
///
/// Implementations are shared between connection tasks, so lookups must be
/// safe to run concurrently.
pub trait DeviceRegistry: Send + Sync {
    fn find_by_imei(&self, imei: &str) -> Option<DeviceId>;
}

/// Registry backed by a fixed IMEI table
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    devices: HashMap<String, DeviceId>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `devices` table of the config file
    pub fn from_table(table: &HashMap<String, i64>) -> Self {
        Self {
            devices: table
                .iter()
                .map(|(imei, id)| (imei.clone(), DeviceId(*id)))
                .collect(),
        }
    }

    pub fn register(&mut self, imei: &str, id: DeviceId) {
        self.devices.insert(imei.to_string(), id);
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn find_by_imei(&self, imei: &str) -> Option<DeviceId> {
        self.devices.get(imei).copied()
    }
}
