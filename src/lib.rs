//! # http-source-controller
//!
//! Binary-side pieces of the controller: configuration, the command
//! handlers, the resync dispatcher and the artifact file server. The
//! reconciliation itself lives in `hsc-reconciler`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod server;

pub use config::ControllerConfig;
pub use controller::Controller;
pub use dispatcher::{BackoffConfig, DispatchConfig, Dispatcher, Schedule};
