//! FlightOnTime daemon library - exposes modules for testing.

pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod routes;
pub mod server;
