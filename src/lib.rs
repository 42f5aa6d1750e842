//! focusguard - Application Blocking Library
//!
//! This library exposes the enforcement core: password vault, durable
//! settings store, process monitor and the controller that ties them
//! together behind a synchronous control surface.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod platform;
pub mod store;
pub mod vault;

pub use controller::EnforcementController;
pub use error::{EnforcementError, Result};
