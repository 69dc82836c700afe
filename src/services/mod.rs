pub mod message_loop;
pub mod osc_service;
pub mod transport;

pub use message_loop::{LoopState, MessageLoop, Outgoing, ShutdownSignal, TickReport, ValueSource};
pub use osc_service::{OscService, StepReport};
pub use transport::{Endpoint, Inbound, Role, TransportRegistry};
