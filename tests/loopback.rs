// End-to-end checks over real loopback UDP sockets.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use oscpulse::config::Config;
use oscpulse::controllers::MessageLog;
use oscpulse::models::{AddressPattern, Message, Type};
use oscpulse::services::{LoopState, MessageLoop, OscService, Outgoing, ShutdownSignal};
use oscpulse::{ConfigurationError, Error};

fn process_until_received(service: &mut OscService) -> usize {
    for _ in 0..200 {
        let report = service.process().unwrap();
        if report.received > 0 {
            return report.handled;
        }
        thread::sleep(Duration::from_millis(5));
    }
    0
}

#[test]
fn test_ping_invokes_handler_once() {
    let mut service = OscService::new();
    let local = service.register_server("s1", "127.0.0.1", 0).unwrap();
    service
        .register_client("c1", "127.0.0.1", local.port())
        .unwrap();

    let calls = Rc::new(RefCell::new(Vec::new()));
    let seen = calls.clone();
    service.subscribe(AddressPattern::parse("/*").unwrap(), move |m: &Message| {
        seen.borrow_mut().push((m.addr.clone(), m.args.clone()))
    });

    let ping = Message::with_type_tags("/ping", ",i", vec![Type::Int(42)]).unwrap();
    service.send("c1", &ping).unwrap();

    assert_eq!(process_until_received(&mut service), 1);
    assert_eq!(service.process().unwrap().received, 0);
    assert_eq!(
        *calls.borrow(),
        vec![("/ping".to_string(), vec![Type::Int(42)])]
    );
}

#[test]
fn test_empty_message_arrives_with_empty_args() {
    let mut service = OscService::new();
    let local = service.register_server("s1", "127.0.0.1", 0).unwrap();
    service
        .register_client("c1", "127.0.0.1", local.port())
        .unwrap();
    let log = MessageLog::new();
    service.subscribe(AddressPattern::any(), log.clone());

    let reply = Message::with_type_tags("/need/reply", ",", vec![]).unwrap();
    service.send("c1", &reply).unwrap();

    assert_eq!(process_until_received(&mut service), 1);
    let received = log.latest("/need/reply").unwrap();
    assert!(received.args.is_empty());
    assert_eq!(received.type_tags(), ",");
}

#[test]
fn test_send_to_unregistered_name_is_configuration_error() {
    let mut service = OscService::new();
    service.register_client("c1", "127.0.0.1", 9000).unwrap();
    let message = Message::new("/lambda", vec![]).unwrap();

    let err = service.send("c2", &message).unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::UnknownEndpoint { ref name }) if name == "c2"
    ));
}

#[test]
fn test_demo_schedule_is_received_and_dispatched() {
    let mut config = Config::default();
    config.servers[0].host = "127.0.0.1".to_string();
    config.servers[0].port = 0;
    config.clients.clear();
    config.runtime.interval_ms = 10;

    let log = MessageLog::new();
    let mut service = config.build_service(log.clone()).unwrap();
    let local = service.local_addr("aservername").unwrap();
    service
        .register_client("aclientname", "127.0.0.1", local.port())
        .unwrap();

    let mut message_loop = MessageLoop::new(service, config.schedule().unwrap(), config.interval());
    message_loop.tick().unwrap();

    // late arrivals are picked up by the following steps
    let deadline = Instant::now() + Duration::from_secs(2);
    while log.seen() < 4 && Instant::now() < deadline {
        message_loop.service_mut().process().unwrap();
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(log.seen(), 4);
    assert_eq!(
        log.addresses(),
        vec!["/callback", "/lambda", "/need/reply", "/wildcard/abc/test"]
    );
    assert_eq!(
        log.latest("/lambda").unwrap().args,
        vec![
            Type::Int(123),
            Type::Float(4.5),
            Type::String("six".to_string())
        ]
    );
}

#[test]
fn test_interrupt_during_sleep_stops_sends_and_releases_once() {
    let mut service = OscService::new();
    let local = service.register_server("s1", "127.0.0.1", 0).unwrap();
    service
        .register_client("c1", "127.0.0.1", local.port())
        .unwrap();
    service.subscribe(AddressPattern::any(), MessageLog::new());

    let schedule = vec![
        Outgoing::new("c1", Message::new("/lambda", vec![Type::Int(1)]).unwrap()),
        Outgoing::new("c1", Message::new("/callback", vec![]).unwrap()),
    ];
    // the interrupt lands well inside the first sleep
    let mut message_loop = MessageLoop::new(service, schedule, Duration::from_secs(30));

    let signal = ShutdownSignal::new();
    let remote = signal.clone();
    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        remote.raise();
    });

    let started = Instant::now();
    message_loop.run(&signal).unwrap();
    interrupter.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(message_loop.tick_count(), 1);
    assert_eq!(message_loop.sent_count(), 2);
    assert_eq!(message_loop.state(), LoopState::Stopped);
    assert!(message_loop.service().is_closed());
    assert!(message_loop.service().endpoints().is_empty());

    // already released inside run()
    assert_eq!(message_loop.shutdown(), 0);
    assert!(matches!(message_loop.tick(), Err(Error::Closed)));
    assert_eq!(message_loop.sent_count(), 2);
}
