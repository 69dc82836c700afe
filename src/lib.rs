//! Named OSC-over-UDP endpoints, pattern-based dispatch and a periodic
//! send/process loop.

pub mod config;
pub mod controllers;
pub mod error;
pub mod models;
pub mod services;

pub use error::{ConfigurationError, Error, Result};
