// src/controllers/osc.rs
// OSC dispatch: address patterns mapped to handlers

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

use crate::models::{format_args, AddressPattern, Message};

/// Invoked synchronously for every inbound message whose address matches
/// the pattern the handler was registered under.
pub trait Handler {
    fn handle(&mut self, message: &Message);
}

impl<F> Handler for F
where
    F: FnMut(&Message),
{
    fn handle(&mut self, message: &Message) {
        self(message)
    }
}

struct Route {
    pattern: AddressPattern,
    handler: Box<dyn Handler>,
}

#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, pattern: AddressPattern, handler: H)
    where
        H: Handler + 'static,
    {
        debug!("Registered OSC handler for {}", pattern);
        self.routes.push(Route {
            pattern,
            handler: Box::new(handler),
        });
    }

    /// Runs every matching handler in registration order and returns how
    /// many were invoked.
    pub fn dispatch(&mut self, message: &Message) -> usize {
        let mut invoked = 0;
        for route in self.routes.iter_mut() {
            if route.pattern.matches(&message.addr) {
                route.handler.handle(message);
                invoked += 1;
            }
        }
        if invoked == 0 {
            trace!("No handler matched {}", message.addr);
        }
        invoked
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &AddressPattern> {
        self.routes.iter().map(|route| &route.pattern)
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}

/// Prints `<address> <args>` to stdout for every message it sees.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintHandler;

impl PrintHandler {
    pub fn render(message: &Message) -> String {
        format!("{} {}", message.addr, format_args(&message.args))
    }
}

impl Handler for PrintHandler {
    fn handle(&mut self, message: &Message) {
        println!("{}", Self::render(message));
    }
}

/// Latest message per address plus a running count of everything seen.
/// Repeated traffic on one address overwrites in place, so the log stays
/// bounded by the number of distinct addresses. Clones share the same log,
/// so one clone can be registered while another is kept for reading.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    latest: Rc<RefCell<HashMap<String, Message>>>,
    seen: Rc<Cell<usize>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct addresses recorded.
    pub fn len(&self) -> usize {
        self.latest.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.borrow().is_empty()
    }

    /// Messages handled since creation, including overwritten ones.
    pub fn seen(&self) -> usize {
        self.seen.get()
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.latest.borrow().keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn latest(&self, address: &str) -> Option<Message> {
        self.latest.borrow().get(address).cloned()
    }

    /// Drains the recorded messages, sorted by address.
    pub fn take(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self.latest.borrow_mut().drain().map(|(_, m)| m).collect();
        messages.sort_by(|a, b| a.addr.cmp(&b.addr));
        messages
    }
}

impl Handler for MessageLog {
    fn handle(&mut self, message: &Message) {
        self.seen.set(self.seen.get() + 1);
        self.latest
            .borrow_mut()
            .insert(message.addr.clone(), message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Type;

    fn message(addr: &str, args: Vec<Type>) -> Message {
        Message::new(addr, args).unwrap()
    }

    #[test]
    fn test_dispatch_invokes_matching_handlers_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();

        let first = order.clone();
        dispatcher.register(AddressPattern::any(), move |m: &Message| {
            first.borrow_mut().push(format!("any {}", m.addr))
        });
        let second = order.clone();
        dispatcher.register(
            AddressPattern::parse("/lambda").unwrap(),
            move |m: &Message| second.borrow_mut().push(format!("lambda {}", m.addr)),
        );

        assert_eq!(dispatcher.dispatch(&message("/lambda", vec![])), 2);
        assert_eq!(dispatcher.dispatch(&message("/callback", vec![])), 1);
        assert_eq!(
            *order.borrow(),
            vec!["any /lambda", "lambda /lambda", "any /callback"]
        );
    }

    #[test]
    fn test_dispatch_without_match() {
        let log = MessageLog::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(AddressPattern::parse("/*").unwrap(), log.clone());

        assert_eq!(dispatcher.dispatch(&message("/wildcard/abc/test", vec![])), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_message_log_latest() {
        let log = MessageLog::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(AddressPattern::any(), log.clone());

        dispatcher.dispatch(&message("/value", vec![Type::Int(1)]));
        dispatcher.dispatch(&message("/other", vec![Type::Int(2)]));
        dispatcher.dispatch(&message("/value", vec![Type::Int(3)]));

        assert_eq!(log.len(), 2);
        assert_eq!(log.seen(), 3);
        assert_eq!(log.addresses(), vec!["/other", "/value"]);
        assert_eq!(log.latest("/value").unwrap().args, vec![Type::Int(3)]);
        assert!(log.latest("/missing").is_none());

        let drained: Vec<String> = log.take().into_iter().map(|m| m.addr).collect();
        assert_eq!(drained, vec!["/other", "/value"]);
        assert!(log.is_empty());
    }

    #[test]
    fn test_message_log_stays_bounded_under_repeated_traffic() {
        let log = MessageLog::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(AddressPattern::any(), log.clone());

        for i in 0..1000 {
            dispatcher.dispatch(&message("/fader", vec![Type::Int(i)]));
        }

        assert_eq!(log.len(), 1);
        assert_eq!(log.seen(), 1000);
        assert_eq!(log.latest("/fader").unwrap().args, vec![Type::Int(999)]);
    }

    #[test]
    fn test_print_handler_render() {
        let tests = vec![
            (
                message(
                    "/lambda",
                    vec![
                        Type::Int(123),
                        Type::Float(4.5),
                        Type::String("six".to_string()),
                    ],
                ),
                "/lambda (123, 4.5, \"six\")",
            ),
            (message("/ping", vec![Type::Int(42)]), "/ping (42,)"),
            (message("/need/reply", vec![]), "/need/reply ()"),
        ];

        for (msg, expected) in tests {
            assert_eq!(PrintHandler::render(&msg), expected);
        }
    }

    #[test]
    fn test_clear_removes_routes() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(AddressPattern::any(), PrintHandler);
        assert_eq!(dispatcher.len(), 1);

        dispatcher.clear();
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.dispatch(&message("/lambda", vec![])), 0);
    }
}
