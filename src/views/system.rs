//! System metrics: storage devices and attached USB devices.

use serde_json::Value;
use std::sync::Arc;

use crate::api::types::{DiskMetrics, UsbDevices};
use crate::api::{decode, paths, ApiError};
use crate::sync::poller::{Endpoint, ViewSource};

pub const SYSTEM_VIEW: &str = "system";

const ENDPOINTS: &[Endpoint] = &[
    Endpoint::new("metrics/disk", paths::METRICS_DISK),
    Endpoint::new("usb/devices", paths::USB_DEVICES),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemSnapshot {
    pub disk: DiskMetrics,
    pub usb: UsbDevices,
}

pub struct SystemView;

impl ViewSource for SystemView {
    type Snapshot = SystemSnapshot;

    fn name(&self) -> &'static str {
        SYSTEM_VIEW
    }

    fn endpoints(&self) -> &[Endpoint] {
        ENDPOINTS
    }

    fn assemble(
        &self,
        payloads: &[Arc<Value>],
        _previous: Option<&SystemSnapshot>,
    ) -> Result<SystemSnapshot, ApiError> {
        Ok(SystemSnapshot {
            disk: decode(paths::METRICS_DISK, (*payloads[0]).clone())?,
            usb: decode(paths::USB_DEVICES, (*payloads[1]).clone())?,
        })
    }

    fn failure_message(&self, _error: &ApiError) -> Option<String> {
        Some("Failed to fetch system metrics".to_string())
    }
}
