// src/services/message_loop.rs
//
// Send the fixed outbound messages, drain inbound traffic after each send,
// sleep, repeat until the shutdown signal is raised.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::models::{Message, Type};
use crate::services::osc_service::OscService;

/// Granularity at which the sleep phase checks for an interrupt.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Terminating,
    Stopped,
}

/// Process-wide interrupt flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal on Ctrl-C (and SIGTERM on unix).
    pub fn install_ctrlc(&self) -> Result<()> {
        let flag = self.0.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
        Ok(())
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Argument source for a published address, polled each time it is due.
pub type ValueSource = Box<dyn FnMut() -> Vec<Type>>;

enum Payload {
    Fixed(Message),
    Published(Publisher),
}

struct Publisher {
    addr: String,
    source: ValueSource,
    interval: Duration,
    last_sent: Option<Instant>,
}

impl Publisher {
    fn due(&self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        }
    }
}

/// One scheduled send to a client endpoint: either a fixed message sent on
/// every tick, or a published address whose arguments are rebuilt from a
/// live source at its own rate.
pub struct Outgoing {
    pub endpoint: String,
    payload: Payload,
}

impl Outgoing {
    pub fn new(endpoint: impl Into<String>, message: Message) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload: Payload::Fixed(message),
        }
    }

    /// Publishes `addr` with whatever `source` returns, at most once per
    /// `interval`. A zero interval publishes on every tick.
    pub fn publish<F>(
        endpoint: impl Into<String>,
        addr: impl Into<String>,
        interval: Duration,
        source: F,
    ) -> Result<Self>
    where
        F: FnMut() -> Vec<Type> + 'static,
    {
        let addr = addr.into();
        // validates the address up front
        Message::new(addr.clone(), vec![])?;
        Ok(Self {
            endpoint: endpoint.into(),
            payload: Payload::Published(Publisher {
                addr,
                source: Box::new(source),
                interval,
                last_sent: None,
            }),
        })
    }

    pub fn addr(&self) -> &str {
        match &self.payload {
            Payload::Fixed(message) => &message.addr,
            Payload::Published(publisher) => &publisher.addr,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self.payload, Payload::Published(_))
    }

    /// The message to send at `now`, or `None` when a publisher is not due.
    fn next_message(&mut self, now: Instant) -> Option<Message> {
        match &mut self.payload {
            Payload::Fixed(message) => Some(message.clone()),
            Payload::Published(publisher) => {
                if !publisher.due(now) {
                    return None;
                }
                publisher.last_sent = Some(now);
                Some(Message {
                    addr: publisher.addr.clone(),
                    args: (publisher.source)(),
                })
            }
        }
    }
}

impl fmt::Debug for Outgoing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Outgoing");
        out.field("endpoint", &self.endpoint);
        match &self.payload {
            Payload::Fixed(message) => out.field("message", message),
            Payload::Published(publisher) => out
                .field("publish", &publisher.addr)
                .field("interval", &publisher.interval),
        };
        out.finish()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub received: usize,
    pub handled: usize,
}

pub struct MessageLoop {
    service: OscService,
    schedule: Vec<Outgoing>,
    interval: Duration,
    state: LoopState,
    sent: usize,
    ticks: usize,
}

impl MessageLoop {
    pub fn new(service: OscService, schedule: Vec<Outgoing>, interval: Duration) -> Self {
        Self {
            service,
            schedule,
            interval,
            state: LoopState::Idle,
            sent: 0,
            ticks: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn service(&self) -> &OscService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut OscService {
        &mut self.service
    }

    /// Total messages sent over the loop's lifetime.
    pub fn sent_count(&self) -> usize {
        self.sent
    }

    pub fn tick_count(&self) -> usize {
        self.ticks
    }

    pub fn start(&mut self) {
        if self.state == LoopState::Idle {
            info!(
                "Message loop running: {} messages every {:?}",
                self.schedule.len(),
                self.interval
            );
            self.state = LoopState::Running;
        }
    }

    /// One pass over the schedule: each send is followed by one processing
    /// step. Publishers that are not yet due are skipped.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.start();
        if self.state != LoopState::Running {
            return Err(Error::Closed);
        }

        let now = Instant::now();
        let mut report = TickReport::default();
        for outgoing in self.schedule.iter_mut() {
            let Some(message) = outgoing.next_message(now) else {
                continue;
            };
            self.service.send(&outgoing.endpoint, &message)?;
            self.sent += 1;
            report.sent += 1;

            let step = self.service.process()?;
            report.received += step.received;
            report.handled += step.handled;
        }
        self.ticks += 1;
        debug!("Tick {}: {:?}", self.ticks, report);
        Ok(report)
    }

    /// Runs until `signal` is raised or a tick fails. Resources are released
    /// before returning either way.
    pub fn run(&mut self, signal: &ShutdownSignal) -> Result<()> {
        self.start();

        let result = loop {
            if signal.is_raised() {
                break Ok(());
            }
            if let Err(e) = self.tick() {
                error!("Message loop failed: {}", e);
                break Err(e);
            }
            if sleep_unless_raised(signal, self.interval) {
                break Ok(());
            }
        };

        if result.is_ok() {
            info!("Interrupt received, shutting down");
        }
        self.shutdown();
        result
    }

    /// `Running -> Terminating -> Stopped`. Returns the number of sockets
    /// released; zero once already stopped.
    pub fn shutdown(&mut self) -> usize {
        if self.state == LoopState::Stopped {
            return 0;
        }
        self.state = LoopState::Terminating;
        let released = self.service.shutdown();
        self.state = LoopState::Stopped;
        released
    }
}

impl Drop for MessageLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleeps for `total`, returning early (with `true`) once `signal` is raised.
fn sleep_unless_raised(signal: &ShutdownSignal, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if signal.is_raised() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
