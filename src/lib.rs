//! Bus fleet tracker: polls a vehicle feed, keeps a fleet log and draws the
//! fleet on a map.

pub mod classify;
pub mod config;
pub mod errors;
pub mod feed;
pub mod fleet_log;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod route;
pub mod storage;
