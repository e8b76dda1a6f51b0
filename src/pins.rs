//! GPIO / peripheral assignments for the controller board.
//!
//! Single source of truth: adapters reference this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Command interpreter link (UART1)
// ---------------------------------------------------------------------------

/// UART TX towards the motion interpreter.
pub const INTERPRETER_UART_TX_GPIO: i32 = 17;
/// UART RX from the motion interpreter.
pub const INTERPRETER_UART_RX_GPIO: i32 = 16;
/// Interpreter link baud rate.
pub const INTERPRETER_UART_BAUD: u32 = 115_200;
