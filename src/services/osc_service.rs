// src/services/osc_service.rs
//
// The OSC context: transport registry plus dispatcher, created at startup
// and passed to everything that sends or processes.

use tracing::debug;

use crate::controllers::{Dispatcher, Handler};
use crate::error::Result;
use crate::models::{AddressPattern, Message};
use crate::services::transport::{Endpoint, TransportRegistry};
use std::net::SocketAddr;

/// Default cap on datagrams read per processing step.
pub const DEFAULT_MAX_PACKETS_PER_STEP: usize = 64;

pub struct OscService {
    registry: TransportRegistry,
    dispatcher: Dispatcher,
    max_packets_per_step: usize,
}

/// Outcome of one processing step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub received: usize,
    pub handled: usize,
}

impl Default for OscService {
    fn default() -> Self {
        Self::new()
    }
}

impl OscService {
    pub fn new() -> Self {
        Self {
            registry: TransportRegistry::new(),
            dispatcher: Dispatcher::new(),
            max_packets_per_step: DEFAULT_MAX_PACKETS_PER_STEP,
        }
    }

    pub fn with_max_packets_per_step(mut self, limit: usize) -> Self {
        self.max_packets_per_step = limit.max(1);
        self
    }

    pub fn register_client(&mut self, name: &str, host: &str, port: u16) -> Result<SocketAddr> {
        self.registry.register_client(name, host, port)
    }

    pub fn register_server(
        &mut self,
        name: &str,
        bind_host: &str,
        port: u16,
    ) -> Result<SocketAddr> {
        self.registry.register_server(name, bind_host, port)
    }

    pub fn subscribe<H>(&mut self, pattern: AddressPattern, handler: H)
    where
        H: Handler + 'static,
    {
        self.dispatcher.register(pattern, handler);
    }

    pub fn send(&mut self, endpoint: &str, message: &Message) -> Result<usize> {
        self.registry.send(endpoint, message)
    }

    pub fn send_bundle(&mut self, endpoint: &str, messages: &[Message]) -> Result<usize> {
        self.registry
            .send_bundle(endpoint, messages, crate::models::IMMEDIATELY)
    }

    /// Drains whatever has arrived since the last step (bounded) and
    /// dispatches each message synchronously.
    pub fn process(&mut self) -> Result<StepReport> {
        let inbound = self.registry.poll(self.max_packets_per_step)?;

        let mut report = StepReport {
            received: inbound.len(),
            handled: 0,
        };
        for item in &inbound {
            debug!(
                "Received {} on {} from {}",
                item.message.addr, item.endpoint, item.from
            );
            report.handled += self.dispatcher.dispatch(&item.message);
        }
        Ok(report)
    }

    pub fn local_addr(&self, name: &str) -> Result<SocketAddr> {
        self.registry.local_addr(name)
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.registry.endpoints()
    }

    pub fn handler_count(&self) -> usize {
        self.dispatcher.len()
    }

    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Releases sockets and drops handlers. Returns the number of sockets
    /// released; zero on every call after the first.
    pub fn shutdown(&mut self) -> usize {
        self.dispatcher.clear();
        self.registry.close()
    }
}
