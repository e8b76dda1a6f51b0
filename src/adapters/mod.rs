//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter            | Implements         | Connects to                |
//! |--------------------|--------------------|----------------------------|
//! | `log_sink`         | EventSink          | Serial log output          |
//! | `nvs`              | ConfigPort         | NVS / in-memory store      |
//! | `radio`            | RadioPort          | Bluetooth activity flags   |
//! | `uart_interpreter` | CommandInterpreter | Motion controller UART     |
//! | `ws_server`        | SocketWriter       | ESP-IDF httpd WebSocket    |
//! | `time`             |                    | ESP32 system timer         |
//! | `wifi`             |                    | ESP-IDF WiFi STA           |
//! | `task_pin`         |                    | FreeRTOS core affinity     |

pub mod log_sink;
pub mod nvs;
pub mod radio;
pub mod task_pin;
pub mod time;
pub mod uart_interpreter;
pub mod wifi;
pub mod ws_server;
