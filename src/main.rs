//! RoboLink firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiStation   ws_server (httpd)   UartInterpreter   RADIO     │
//! │  NvsConfigStore   LogEventSink     MonotonicClock              │
//! │                                                                │
//! │  ──────────── channels (INBOUND / OUTBOUND) ────────────       │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              LinkService (pure logic)                  │    │
//! │  │  Registry · Heartbeat · Scheduler · Sequencer          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::prelude::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{error, info, warn};

use robolink::adapters::log_sink::LogEventSink;
use robolink::adapters::nvs::NvsConfigStore;
use robolink::adapters::radio::RADIO;
use robolink::adapters::time::MonotonicClock;
use robolink::adapters::uart_interpreter::UartInterpreter;
use robolink::adapters::wifi::WifiStation;
use robolink::adapters::ws_server::{self, SharedSockets};
use robolink::app::service::LinkService;
use robolink::config::{self, LinkConfig};
use robolink::error::Error;
use robolink::link::slot::CommandSlot;
use robolink::pins;
use robolink::transport::channels::{ChannelTransport, try_recv_event};
use robolink::transport::io_task;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RoboLink v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsConfigStore::new()
        .map_err(Error::from)
        .and_then(|store| config::load(&store))
    {
        Ok(cfg) => {
            info!("Config loaded ({} clients, ws port {})", cfg.max_clients, cfg.ws_port);
            cfg
        }
        Err(e) => {
            warn!("NVS config unavailable ({}), using defaults", e);
            LinkConfig::default()
        }
    };

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // SAFETY: the interpreter pins are not claimed anywhere else.
    let (tx, rx) = unsafe {
        (
            AnyIOPin::new(pins::INTERPRETER_UART_TX_GPIO),
            AnyIOPin::new(pins::INTERPRETER_UART_RX_GPIO),
        )
    };
    let uart = UartDriver::new(
        peripherals.uart1,
        tx,
        rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::new().baudrate(Hertz(pins::INTERPRETER_UART_BAUD)),
    )?;
    let mut interpreter = UartInterpreter::new(uart);

    // ── 4. WiFi + WebSocket server ────────────────────────────
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?,
        sysloop,
    )?;
    let mut station = WifiStation::new(wifi);
    let sockets = SharedSockets::new();

    let _server = match station.start() {
        Ok(()) => Some(ws_server::start(config.ws_port, sockets.clone())?),
        Err(e) => {
            error!("WiFi unavailable ({}), WebSocket server not started", e);
            None
        }
    };

    // ── 5. I/O thread ─────────────────────────────────────────
    let _io = io_task::spawn(sockets)?;

    // ── 6. Link service ───────────────────────────────────────
    let slot = Arc::new(CommandSlot::new());
    let mut service = LinkService::new(config.clone(), slot);
    let mut transport = ChannelTransport;
    let mut sink = LogEventSink::new();
    let clock = MonotonicClock::new();
    let interval = Duration::from_millis(config.control_loop_interval_ms.into());

    info!("System ready. Entering link loop.");

    // ── 7. Tick loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();

        while let Some(event) = try_recv_event() {
            service.handle_event(event, now, &mut transport, &mut interpreter, &mut sink);
        }
        service.tick(now, &RADIO, &mut transport, &mut interpreter, &mut sink);

        std::thread::sleep(interval);
    }
}
