// src/config/runtime.rs
//
// Turns a loaded Config into a live OscService and MessageLoop

use std::time::Duration;
use tracing::info;

use super::Config;
use crate::controllers::Handler;
use crate::error::Result;
use crate::models::AddressPattern;
use crate::services::{MessageLoop, OscService, Outgoing};

impl Config {
    /// Registers every configured endpoint and subscribes `handler` to each
    /// dispatch pattern. Registration errors abort startup.
    pub fn build_service<H>(&self, handler: H) -> Result<OscService>
    where
        H: Handler + Clone + 'static,
    {
        let mut service =
            OscService::new().with_max_packets_per_step(self.runtime.max_packets_per_step);

        for server in &self.servers {
            service.register_server(&server.name, &server.host, server.port)?;
        }
        for client in &self.clients {
            service.register_client(&client.name, &client.host, client.port)?;
        }
        for pattern in &self.dispatch.patterns {
            service.subscribe(AddressPattern::parse(pattern)?, handler.clone());
        }

        info!(
            "OSC service ready: {} endpoints, {} handlers",
            service.endpoints().len(),
            service.handler_count()
        );
        Ok(service)
    }

    pub fn schedule(&self) -> Result<Vec<Outgoing>> {
        self.messages.iter().map(|m| m.to_outgoing()).collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.runtime.interval_ms)
    }

    pub fn build_loop<H>(&self, handler: H) -> Result<MessageLoop>
    where
        H: Handler + Clone + 'static,
    {
        let schedule = self.schedule()?;
        let service = self.build_service(handler)?;
        Ok(MessageLoop::new(service, schedule, self.interval()))
    }
}
