//! Link service: the hexagonal core.
//!
//! [`LinkService`] owns the client registry, the heartbeat monitor and the
//! task scheduler, and is the only thing that mutates them.  Transport
//! events go in through [`handle_event`](LinkService::handle_event); time
//! advances through [`tick`](LinkService::tick).  All I/O flows through
//! port traits injected at call sites, so the whole service runs against
//! mocks on the host.
//!
//! ```text
//!  TransportEvent ──▶ ┌──────────────────────────────┐ ──▶ LinkTransport
//!                     │          LinkService          │
//!       RadioPort ──▶ │ Registry · Heartbeat · Sched  │ ──▶ CommandInterpreter
//!                     └──────────────────────────────┘ ──▶ EventSink
//! ```

use log::{debug, info, warn};
use std::sync::Arc;

use crate::config::LinkConfig;
use crate::error::{ProtocolError, TaskFailure};
use crate::link::heartbeat::HeartbeatMonitor;
use crate::link::registry::{ClientId, ClientRegistry};
use crate::link::scheduler::TaskScheduler;
use crate::link::slot::CommandSlot;
use crate::link::task::{Task, TaskId};
use crate::protocol::encoder;
use crate::protocol::{InboundMessage, parse_inbound};

use super::events::LinkEvent;
use super::ports::{CommandInterpreter, EventSink, LinkTransport, RadioPort, TransportEvent};

const HEARTBEAT_TIMEOUT_MSG: &str = "Heartbeat timeout";
const HEARTBEAT_TIMEOUT_RADIO_MSG: &str = "Heartbeat timeout during radio activity";

// ───────────────────────────────────────────────────────────────
// LinkService
// ───────────────────────────────────────────────────────────────

pub struct LinkService {
    config: LinkConfig,
    registry: ClientRegistry,
    heartbeat: HeartbeatMonitor,
    scheduler: TaskScheduler,
    last_radio_log_ms: u64,
}

impl LinkService {
    /// Build the service. `slot` is shared with every other local command source.
    pub fn new(config: LinkConfig, slot: Arc<CommandSlot>) -> Self {
        let registry = ClientRegistry::new(&config);
        let heartbeat = HeartbeatMonitor::new(&config);
        let scheduler = TaskScheduler::new(slot, config.task_execution_timeout_ms.into());
        Self {
            config,
            registry,
            heartbeat,
            scheduler,
            last_radio_log_ms: 0,
        }
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Apply one transport event.
    pub fn handle_event(
        &mut self,
        event: TransportEvent,
        now_ms: u64,
        transport: &mut impl LinkTransport,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        match event {
            TransportEvent::Connected(client_id) => {
                self.on_connect(client_id, now_ms, transport, interpreter, sink);
            }
            TransportEvent::Disconnected(client_id) => {
                self.on_disconnect(client_id, now_ms, interpreter, sink);
            }
            TransportEvent::Text { client_id, text } => {
                self.on_text(client_id, &text, now_ms, transport, interpreter, sink);
            }
        }
        self.flush(transport, &[]);
    }

    /// A CONNECT for an id that is still registered means its `Disconnected`
    /// was lost; the old connection is torn down before the new one is
    /// admitted, so nothing it owned carries over.
    fn on_connect(
        &mut self,
        client_id: ClientId,
        now_ms: u64,
        transport: &mut impl LinkTransport,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        if self.registry.is_connected(client_id) {
            warn!("Link[{}]: reconnect on a live id, dropping old session", client_id);
            self.on_disconnect(client_id, now_ms, interpreter, sink);
            self.flush(transport, &[]);
        }
        match self.registry.on_connect(client_id, now_ms) {
            Ok(()) => {
                send(transport, client_id, encoder::connected(client_id));
                sink.emit(&LinkEvent::ClientConnected(client_id));
            }
            Err(reason) => {
                send(transport, client_id, encoder::error(&reason.to_string()));
                transport.close(client_id);
                sink.emit(&LinkEvent::ClientRejected { client_id, reason });
            }
        }
    }

    fn on_disconnect(
        &mut self,
        client_id: ClientId,
        now_ms: u64,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        if self.registry.on_disconnect(client_id) {
            sink.emit(&LinkEvent::ClientDisconnected(client_id));
        }
        self.scheduler.fail_client(
            client_id,
            TaskFailure::ClientDisconnected,
            now_ms,
            interpreter,
            sink,
        );
    }

    fn on_text(
        &mut self,
        client_id: ClientId,
        text: &str,
        now_ms: u64,
        transport: &mut impl LinkTransport,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        if !self.registry.is_connected(client_id) {
            debug!("Link[{}]: text from unregistered client ignored", client_id);
            return;
        }
        if !self.registry.check_rate_limit(client_id) {
            self.reject(client_id, ProtocolError::RateLimited, transport, sink);
            return;
        }

        match parse_inbound(text) {
            Ok(InboundMessage::Heartbeat) => {
                self.registry.touch(client_id, now_ms);
                send(transport, client_id, encoder::heartbeat_ack(now_ms));
            }
            Ok(InboundMessage::Command { task_id, commands }) => {
                self.registry.touch(client_id, now_ms);
                let id = task_id.map_or_else(|| TaskId::generate(now_ms), TaskId::new);
                let task = Task::new(id.clone(), client_id, commands, now_ms);
                if let Err(reason) = self.scheduler.submit(task, now_ms, interpreter, sink) {
                    send(
                        transport,
                        client_id,
                        encoder::task_rejected(id.as_str(), &reason.to_string()),
                    );
                }
            }
            Err(error) => self.reject(client_id, error, transport, sink),
        }
    }

    fn reject(
        &self,
        client_id: ClientId,
        error: ProtocolError,
        transport: &mut impl LinkTransport,
        sink: &mut impl EventSink,
    ) {
        warn!("Link[{}]: {}", client_id, error);
        send(transport, client_id, encoder::error(&error.to_string()));
        sink.emit(&LinkEvent::ProtocolViolation { client_id, error });
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One pass of the link: heartbeat sweep, task progress, outbound flush.
    pub fn tick(
        &mut self,
        now_ms: u64,
        radio: &impl RadioPort,
        transport: &mut impl LinkTransport,
        interpreter: &mut impl CommandInterpreter,
        sink: &mut impl EventSink,
    ) {
        let radio_busy = radio.is_busy();

        // 1. Liveness sweep
        if let Some(report) = self.heartbeat.poll(now_ms, radio_busy, &mut self.registry) {
            for &client_id in &report.expired {
                self.scheduler.fail_client(
                    client_id,
                    TaskFailure::HeartbeatTimeout,
                    now_ms,
                    interpreter,
                    sink,
                );
                sink.emit(&LinkEvent::ClientExpired {
                    client_id,
                    radio_busy,
                });
            }
            // The expired sockets are still open: deliver their task errors first.
            self.flush(transport, &report.expired);
            let msg = if radio_busy {
                HEARTBEAT_TIMEOUT_RADIO_MSG
            } else {
                HEARTBEAT_TIMEOUT_MSG
            };
            for &client_id in &report.expired {
                send(transport, client_id, encoder::error(msg));
                transport.close(client_id);
            }
        }

        // 2. Task progress + execution ceiling
        self.scheduler.tick(now_ms, interpreter, sink);

        // 3. Outbound status updates
        self.flush(transport, &[]);

        // 4. Radio status
        self.log_radio_status(now_ms, radio_busy);
    }

    /// Deliver queued task updates to owners still able to receive them.
    fn flush(&mut self, transport: &mut impl LinkTransport, closing: &[ClientId]) {
        let registry = &self.registry;
        self.scheduler.drain_updates(|update| {
            let client_id = update.client_id;
            if !registry.is_connected(client_id) && !closing.contains(&client_id) {
                debug!(
                    "Link[{}]: owner gone, dropping {} update for task {}",
                    client_id,
                    update.status.as_str(),
                    update.task_id
                );
                return;
            }
            send(transport, client_id, encoder::task_update(&update));
        });
    }

    fn log_radio_status(&mut self, now_ms: u64, radio_busy: bool) {
        if !radio_busy {
            return;
        }
        let interval = u64::from(self.config.radio_status_log_interval_ms);
        if now_ms.saturating_sub(self.last_radio_log_ms) > interval {
            self.last_radio_log_ms = now_ms;
            info!(
                "Radio: busy, {} client(s) attached, heartbeat timeout {}ms",
                self.registry.len(),
                self.config.effective_heartbeat_timeout_ms(true)
            );
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// `true` when no task is running.
    pub fn is_idle(&self) -> bool {
        !self.scheduler.is_active()
    }
}

fn send(transport: &mut impl LinkTransport, client_id: ClientId, frame: Option<String>) {
    if let Some(text) = frame {
        transport.send_text(client_id, &text);
    }
}
