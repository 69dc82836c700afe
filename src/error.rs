// src/error.rs
//
// Error types shared by the registry, dispatcher and message loop.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Startup-time misconfiguration. Always fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("endpoint name already registered: {name}")]
    DuplicateEndpoint { name: String },

    #[error("port {port} is already bound by server endpoint {owner}")]
    PortInUse { port: u16, owner: String },

    #[error("failed to bind {addr} for endpoint {name}: {source}")]
    Bind {
        name: String,
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("could not resolve {host}:{port} for endpoint {name}")]
    Resolve {
        name: String,
        host: String,
        port: u16,
        #[source]
        source: Option<io::Error>,
    },

    #[error("no endpoint registered under the name {name}")]
    UnknownEndpoint { name: String },

    #[error("endpoint {name} is a server and cannot send")]
    NotSendCapable { name: String },
}

/// Main error type for the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("transport error on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        peer: Option<SocketAddr>,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode OSC packet: {0}")]
    Encode(String),

    #[error("invalid OSC address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: &'static str },

    #[error("invalid OSC address pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("type tags {expected:?} do not match arguments {actual:?}")]
    TypeTagMismatch { expected: String, actual: String },

    #[error("invalid argument for {address} at position {index}: {reason}")]
    InvalidArgument {
        address: String,
        index: usize,
        reason: String,
    },

    #[error("failed to read config file: {0}")]
    ConfigFile(#[from] io::Error),

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("transport registry is closed")]
    Closed,
}

impl Error {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
