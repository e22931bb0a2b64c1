//! Mock servers for integration testing
//!
//! Simulates the appliance backend so the sync layer can be exercised end to
//! end without a Pi.

pub mod pi_api;

pub use pi_api::MockPiApi;
