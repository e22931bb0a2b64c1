//! Cellular modem: connection, signal, traffic and the SMS inbox.

use serde_json::Value;
use std::sync::Arc;

use crate::api::types::DongleStatus;
use crate::api::{decode, paths, ApiError};
use crate::sync::poller::{Endpoint, ViewSource};

pub const MODEM_VIEW: &str = "modem";

const ENDPOINTS: &[Endpoint] = &[Endpoint::new("dongle/status", paths::DONGLE_STATUS)];

/// Lit state of the five signal bars for a 0-5 strength
pub fn signal_bars(strength: u8) -> [bool; 5] {
    std::array::from_fn(|i| i < strength as usize)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModemSnapshot {
    pub status: DongleStatus,
}

impl ModemSnapshot {
    /// The modem reported an error instead of status
    pub fn is_unavailable(&self) -> bool {
        self.status.error.is_some()
    }

    pub fn signal_bars(&self) -> [bool; 5] {
        signal_bars(self.status.signal.as_ref().map(|s| s.strength).unwrap_or(0))
    }
}

pub struct ModemView;

impl ViewSource for ModemView {
    type Snapshot = ModemSnapshot;

    fn name(&self) -> &'static str {
        MODEM_VIEW
    }

    fn endpoints(&self) -> &[Endpoint] {
        ENDPOINTS
    }

    fn assemble(
        &self,
        payloads: &[Arc<Value>],
        _previous: Option<&ModemSnapshot>,
    ) -> Result<ModemSnapshot, ApiError> {
        Ok(ModemSnapshot {
            status: decode(paths::DONGLE_STATUS, (*payloads[0]).clone())?,
        })
    }

    fn failure_message(&self, _error: &ApiError) -> Option<String> {
        Some("Failed to fetch dongle status".to_string())
    }
}
