pub mod osc;

pub use osc::{Dispatcher, Handler, MessageLog, PrintHandler};
