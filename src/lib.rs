//! Trackable thank-you links and QR codes
//!
//! Library exports for the service binary and the integration tests.

pub mod codes;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod location;
pub mod middleware;
pub mod model;
pub mod qr;
pub mod recorder;
pub mod route;
pub mod stats;
pub mod visit;
