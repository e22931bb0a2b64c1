//! The dashboard's polled views.
//!
//! Each view names the endpoints it reads and turns one round of payloads
//! into a typed snapshot; polling, coalescing and persistence live in
//! [`crate::sync`].

pub mod containers;
pub mod modem;
pub mod overview;
pub mod system;

pub use containers::{ContainersSnapshot, ContainersView, CONTAINERS_VIEW};
pub use modem::{signal_bars, ModemSnapshot, ModemView, MODEM_VIEW};
pub use overview::{OverviewSnapshot, OverviewView, OVERVIEW_VIEW};
pub use system::{SystemSnapshot, SystemView, SYSTEM_VIEW};
