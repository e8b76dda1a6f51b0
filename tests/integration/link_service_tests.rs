//! Integration tests for the LinkService → scheduler → interpreter pipeline.
//!
//! Each test drives the service through transport events and ticks exactly
//! as the firmware loop does, then asserts on the frames the clients saw.

use std::sync::Arc;

use robolink::adapters::uart_interpreter::UartInterpreter;
use robolink::app::commands::{CommandSource, ParamEncoding};
use robolink::app::events::LinkEvent;
use robolink::app::ports::{CommandInterpreter, TransportEvent};
use robolink::app::service::LinkService;
use robolink::config::LinkConfig;
use robolink::error::TaskFailure;
use robolink::link::registry::ClientId;
use robolink::link::sequencer::DRAIN_TIMEOUT_MS;
use robolink::link::slot::CommandSlot;
use serde_json::json;

use crate::mock_link::{
    EchoInterpreter, ManualRadio, RecordingSink, RecordingTransport, SharedSerial,
};

struct Harness<I = EchoInterpreter> {
    svc: LinkService,
    slot: Arc<CommandSlot>,
    wire: RecordingTransport,
    interp: I,
    sink: RecordingSink,
    radio: ManualRadio,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(LinkConfig::default())
    }

    fn with_config(config: LinkConfig) -> Self {
        Harness::build(config, EchoInterpreter::new())
    }
}

impl<I: CommandInterpreter> Harness<I> {
    fn build(config: LinkConfig, interp: I) -> Self {
        let slot = Arc::new(CommandSlot::new());
        Self {
            svc: LinkService::new(config, Arc::clone(&slot)),
            slot,
            wire: RecordingTransport::new(),
            interp,
            sink: RecordingSink::new(),
            radio: ManualRadio::default(),
        }
    }

    fn event(&mut self, event: TransportEvent, now: u64) {
        self.svc
            .handle_event(event, now, &mut self.wire, &mut self.interp, &mut self.sink);
    }

    fn connect(&mut self, id: ClientId, now: u64) {
        self.event(TransportEvent::Connected(id), now);
    }

    fn disconnect(&mut self, id: ClientId, now: u64) {
        self.event(TransportEvent::Disconnected(id), now);
    }

    fn text(&mut self, id: ClientId, text: &str, now: u64) {
        self.event(
            TransportEvent::Text {
                client_id: id,
                text: text.to_string(),
            },
            now,
        );
    }

    fn command(&mut self, id: ClientId, task_id: &str, commands: &[&str], now: u64) {
        let msg = json!({"type": "command", "taskId": task_id, "commands": commands});
        self.text(id, &msg.to_string(), now);
    }

    fn heartbeat(&mut self, id: ClientId, now: u64) {
        self.text(id, r#"{"type":"heartbeat"}"#, now);
    }

    fn tick(&mut self, now: u64) {
        self.svc.tick(
            now,
            &self.radio,
            &mut self.wire,
            &mut self.interp,
            &mut self.sink,
        );
    }
}

// ── Sequencing ────────────────────────────────────────────────

#[test]
fn command_group_runs_in_order_and_completes() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.command(0, "t1", &["kup", "kbalance", "ksit"], 100);

    for now in [110, 120, 130] {
        h.tick(now);
    }

    let responses = h.wire.responses("t1");
    assert_eq!(
        responses,
        vec![
            json!({"type": "response", "taskId": "t1", "status": "running"}),
            json!({"type": "response", "taskId": "t1", "status": "completed",
                   "results": ["r0", "r1", "r2"]}),
        ]
    );

    let opcodes: Vec<u8> = h.interp.dispatched.iter().map(|c| c.opcode).collect();
    assert_eq!(opcodes, vec![b'k', b'k', b'k']);
    assert_eq!(h.interp.dispatched[2].params, b"sit".to_vec());
    assert!(h.interp.dispatched.iter().all(|c| c.source == CommandSource::Web));
    assert!(h.svc.is_idle());
    assert!(h.slot.is_free());
}

#[test]
fn base64_entries_dispatch_binary_params() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.command(0, "b", &["b64:SQj2"], 10);
    h.tick(20);

    let cmd = &h.interp.dispatched[0];
    assert_eq!(cmd.opcode, b'I');
    assert_eq!(cmd.params, vec![0x08, 0xF6]);
    assert_eq!(cmd.encoding, ParamEncoding::Binary);
    assert_eq!(h.wire.responses("b")[1]["results"], json!(["r0"]));
}

#[test]
fn undecodable_entries_are_skipped_without_results() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.command(0, "t", &["kup", "b64:!!!", "b64:", "ksit"], 10);
    for now in [20, 30, 40] {
        h.tick(now);
    }

    let done = h.wire.responses("t").pop().unwrap();
    assert_eq!(done["status"], "completed");
    assert_eq!(done["results"], json!(["r0", "r1"]));
    assert_eq!(h.interp.dispatched.len(), 2);
    assert_eq!(
        h.sink
            .count(|e| matches!(e, LinkEvent::SubCommandSkipped { .. })),
        2
    );
}

#[test]
fn empty_group_completes_immediately() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.command(0, "e", &[], 10);

    let done = h.wire.responses("e").pop().unwrap();
    assert_eq!(
        done,
        json!({"type": "response", "taskId": "e", "status": "completed", "results": []})
    );
    assert!(h.svc.is_idle());
}

#[test]
fn missing_task_id_gets_generated_one() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.text(0, r#"{"type":"command","commands":["kup"]}"#, 1234);

    let first = h.wire.last_for(0).unwrap();
    assert_eq!(first["status"], "running");
    let id = first["taskId"].as_str().unwrap();
    assert!(id.starts_with("1234_"), "generated id {id}");
}

// ── Single flight ─────────────────────────────────────────────

#[test]
fn second_task_is_rejected_while_one_runs() {
    let mut h = Harness::new();
    h.interp.hold = true;
    h.connect(0, 0);
    h.connect(1, 0);

    h.command(0, "a", &["kup"], 10);
    h.command(1, "b", &["ksit"], 20);

    assert_eq!(
        h.wire.last_for(1).unwrap(),
        json!({"type": "response", "taskId": "b", "status": "error",
               "error": "Previous task is still running"})
    );
    assert_eq!(h.svc.scheduler().current_task().unwrap().id().as_str(), "a");

    // Rejection did not disturb the active task.
    h.interp.hold = false;
    h.tick(30);
    h.tick(40);
    let done = h.wire.responses("a").pop().unwrap();
    assert_eq!(done["status"], "completed");
    assert_eq!(h.interp.dispatched.len(), 1);
}

#[test]
fn next_task_is_admitted_after_completion() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.command(0, "a", &["kup"], 10);
    h.tick(20);
    h.command(0, "b", &["ksit"], 30);
    h.tick(40);

    assert_eq!(h.wire.responses("b").pop().unwrap()["status"], "completed");
}

#[test]
fn duplicate_task_id_is_rejected() {
    let mut h = Harness::new();
    h.interp.hold = true;
    h.connect(0, 0);
    h.command(0, "same", &["kup"], 10);
    h.command(0, "same", &["ksit"], 20);

    let responses = h.wire.responses("same");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1]["status"], "error");
    assert_eq!(h.interp.dispatched.len(), 1);
}

// ── Shared command slot ──────────────────────────────────────

#[test]
fn task_waits_while_local_source_holds_slot() {
    let mut h = Harness::new();
    let voice = h.slot.try_acquire(CommandSource::Voice).unwrap();
    h.connect(0, 0);
    h.command(0, "t", &["kup"], 10);
    h.tick(20);
    assert!(h.interp.dispatched.is_empty());
    assert_eq!(h.wire.responses("t").len(), 1);

    drop(voice);
    h.tick(30);
    h.tick(40);
    assert_eq!(h.interp.dispatched.len(), 1);
    assert_eq!(h.wire.responses("t").pop().unwrap()["status"], "completed");
}

// ── Execution ceiling ─────────────────────────────────────────

#[test]
fn task_exceeding_ceiling_fails() {
    let mut h = Harness::new();
    h.interp.hold = true;
    h.connect(0, 0);
    h.command(0, "slow", &["kup"], 0);

    h.heartbeat(0, 30_000);
    h.tick(45_000);
    assert!(!h.svc.is_idle(), "ceiling is a strict bound");

    h.tick(45_001);
    assert_eq!(
        h.wire.responses("slow").pop().unwrap(),
        json!({"type": "response", "taskId": "slow", "status": "error",
               "error": "execution timeout"})
    );
    assert!(h.svc.is_idle());
    assert!(h.svc.registry().is_connected(0));

    // The abandoned sub-command keeps the slot until its reply shows up.
    assert!(h.svc.scheduler().is_draining());
    assert!(!h.slot.is_free());
    h.interp.hold = false;
    h.tick(45_010);
    assert!(h.slot.is_free());
}

#[test]
fn late_uart_reply_is_not_credited_to_next_task() {
    let serial = SharedSerial::new();
    let mut h = Harness::build(LinkConfig::default(), UartInterpreter::new(serial.clone()));
    h.connect(0, 0);
    h.command(0, "a", &["kslow"], 0);
    h.heartbeat(0, 30_000);
    h.tick(45_001);
    assert_eq!(h.wire.responses("a").pop().unwrap()["error"], "execution timeout");

    h.command(0, "b", &["ksit"], 45_010);
    assert_eq!(serial.frames().len(), 1, "b waits for the abandoned reply");

    serial.deliver(b"A-result\n");
    h.tick(45_020);
    assert_eq!(serial.frames().len(), 2);
    assert_eq!(serial.frames()[1], b"ksit\0".to_vec());

    serial.deliver(b"B-result\n");
    h.tick(45_030);
    let done = h.wire.responses("b").pop().unwrap();
    assert_eq!(done["status"], "completed");
    assert_eq!(done["results"], json!(["B-result"]));
}

#[test]
fn silent_interpreter_frees_slot_after_drain_deadline() {
    let serial = SharedSerial::new();
    let mut h = Harness::build(LinkConfig::default(), UartInterpreter::new(serial.clone()));
    h.connect(0, 0);
    h.command(0, "a", &["kslow"], 0);
    h.heartbeat(0, 30_000);
    h.tick(45_001);

    h.heartbeat(0, 46_000);
    h.tick(45_001 + DRAIN_TIMEOUT_MS);
    assert!(!h.slot.is_free());
    h.tick(45_002 + DRAIN_TIMEOUT_MS);
    assert!(h.slot.is_free());

    // A reply that shows up after the deadline is flushed on the next dispatch.
    serial.deliver(b"A-result\n");
    h.heartbeat(0, 50_010);
    h.command(0, "b", &["ksit"], 50_010);
    serial.deliver(b"B-result\n");
    h.tick(50_020);
    assert_eq!(h.wire.responses("b").pop().unwrap()["results"], json!(["B-result"]));
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn silent_owner_expires_and_task_errors() {
    let mut h = Harness::new();
    h.interp.hold = true;
    h.connect(0, 0);
    h.command(0, "t", &["kup"], 0);

    h.tick(40_001);

    let msgs = h.wire.messages_for(0);
    let n = msgs.len();
    assert_eq!(
        msgs[n - 2],
        json!({"type": "response", "taskId": "t", "status": "error",
               "error": "client disconnected (heartbeat timeout)"})
    );
    assert_eq!(msgs[n - 1], json!({"type": "error", "error": "Heartbeat timeout"}));
    assert_eq!(h.wire.closed, vec![0]);
    assert!(!h.svc.registry().is_connected(0));
    assert!(h.svc.is_idle());
    assert!(h.sink.events.contains(&LinkEvent::TaskFailed {
        task_id: robolink::link::task::TaskId::new("t"),
        reason: TaskFailure::HeartbeatTimeout,
    }));
}

#[test]
fn heartbeat_keeps_client_alive() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.heartbeat(0, 20_000);
    h.tick(40_001);

    assert!(h.svc.registry().is_connected(0));
    assert!(h.wire.closed.is_empty());
    assert_eq!(
        h.wire.messages_for(0)[1],
        json!({"type": "heartbeat", "timestamp": 20_000})
    );
}

#[test]
fn radio_activity_extends_heartbeat_window() {
    let mut h = Harness::new();
    h.radio.busy = true;
    h.connect(0, 0);

    h.tick(50_000);
    assert!(h.svc.registry().is_connected(0));

    h.tick(65_001);
    assert!(!h.svc.registry().is_connected(0));
    assert_eq!(
        h.wire.last_for(0).unwrap(),
        json!({"type": "error", "error": "Heartbeat timeout during radio activity"})
    );
    assert!(h.sink.events.contains(&LinkEvent::ClientExpired {
        client_id: 0,
        radio_busy: true,
    }));
}

// ── Admission ─────────────────────────────────────────────────

#[test]
fn connection_above_cap_is_refused() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.connect(1, 0);
    h.connect(2, 0);

    assert_eq!(
        h.wire.messages_for(2),
        vec![json!({"type": "error", "error": "Max clients reached"})]
    );
    assert_eq!(h.wire.closed, vec![2]);
    assert_eq!(h.svc.registry().len(), 2);
    assert!(!h.svc.registry().is_connected(2));

    // Frames from the refused socket are ignored.
    h.command(2, "x", &["kup"], 10);
    assert!(h.interp.dispatched.is_empty());
}

#[test]
fn slot_frees_after_disconnect() {
    let mut h = Harness::new();
    h.connect(0, 0);
    h.connect(1, 0);
    h.disconnect(0, 10);
    h.connect(2, 20);

    assert_eq!(
        h.wire.messages_for(2),
        vec![json!({"type": "connected", "clientId": "2"})]
    );
}

#[test]
fn reconnect_with_same_id_drops_old_task() {
    let mut h = Harness::new();
    h.interp.hold = true;
    h.connect(0, 0);
    h.connect(1, 0);
    h.command(0, "old", &["kup"], 10);

    // The socket died without a Disconnected; the id comes back on a new one.
    h.connect(0, 20);

    assert!(h.svc.is_idle());
    assert!(h.svc.scheduler().tasks().is_empty());
    assert_eq!(
        h.sink.count(|e| matches!(
            e,
            LinkEvent::TaskFailed { reason: TaskFailure::ClientDisconnected, .. }
        )),
        1
    );
    assert_eq!(h.svc.registry().len(), 2);
    assert!(h.wire.closed.is_empty());
    // Only the running notice reached the old socket; the new one just
    // sees the handshake.
    assert_eq!(h.wire.responses("old").len(), 1);
    assert_eq!(
        h.wire.last_for(0).unwrap(),
        json!({"type": "connected", "clientId": "0"})
    );

    // The new connection starts clean and may submit at once.
    h.interp.hold = false;
    h.command(0, "new", &["ksit"], 30);
    h.tick(40);
    assert_eq!(h.wire.responses("new").pop().unwrap()["status"], "completed");
}

// ── Disconnect ────────────────────────────────────────────────

#[test]
fn disconnect_is_idempotent() {
    let mut h = Harness::new();
    h.interp.hold = true;
    h.connect(0, 0);
    h.command(0, "t", &["kup"], 10);

    h.disconnect(0, 20);
    h.disconnect(0, 30);

    assert_eq!(
        h.sink
            .count(|e| matches!(e, LinkEvent::ClientDisconnected(0))),
        1
    );
    assert_eq!(
        h.sink
            .count(|e| matches!(e, LinkEvent::TaskFailed { .. })),
        1
    );
    assert!(h.svc.is_idle());
    // The owner is gone, so nothing but the running notice reached it.
    assert_eq!(h.wire.responses("t").len(), 1);
}

#[test]
fn other_clients_task_survives_disconnect() {
    let mut h = Harness::new();
    h.interp.hold = true;
    h.connect(0, 0);
    h.connect(1, 0);
    h.command(0, "mine", &["kup"], 10);

    h.disconnect(1, 20);
    assert_eq!(h.svc.scheduler().current_task().unwrap().id().as_str(), "mine");
}

// ── Protocol errors ───────────────────────────────────────────

#[test]
fn protocol_errors_keep_connection_open() {
    let mut h = Harness::new();
    h.connect(0, 0);

    h.text(0, "not json", 10);
    h.text(0, r#"{"type":"dance"}"#, 20);
    h.text(0, r#"{"type":"command","commands":"kup"}"#, 30);

    let errors: Vec<_> = h.wire.messages_for(0)[1..]
        .iter()
        .map(|m| m["error"].clone())
        .collect();
    assert_eq!(
        errors,
        vec![
            json!("Invalid JSON format"),
            json!("Unsupported message type"),
            json!("Malformed command"),
        ]
    );
    assert!(h.wire.closed.is_empty());
    assert!(h.svc.registry().is_connected(0));
    assert_eq!(
        h.sink
            .count(|e| matches!(e, LinkEvent::ProtocolViolation { .. })),
        3
    );
}

#[test]
fn flooding_client_is_rate_limited() {
    let mut h = Harness::with_config(LinkConfig {
        rate_limit_per_sec: 1,
        rate_limit_burst: 2,
        ..LinkConfig::default()
    });
    h.connect(0, 0);
    for i in 0..6 {
        h.heartbeat(0, 100 + i);
    }

    let limited = h
        .wire
        .messages_for(0)
        .iter()
        .filter(|m| m["error"] == "Rate limit exceeded")
        .count();
    assert!(limited >= 3, "only {limited} frames were limited");
    assert!(h.svc.registry().is_connected(0));
}
