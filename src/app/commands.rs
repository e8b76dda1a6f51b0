//! Outbound device commands.
//!
//! A [`DeviceCommand`] is what the link hands to the external command
//! interpreter: one opcode byte, the parameter bytes, and how the
//! interpreter should read them.

/// Which local party produced a command.
///
/// The interpreter routes its result back to the matching collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandSource {
    /// A WebSocket task sub-command.
    Web = 1,
    /// The voice recognition module.
    Voice = 2,
    /// The USB / UART console.
    Serial = 3,
}

/// How the parameter bytes are terminated for the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEncoding {
    /// ASCII parameters terminated by NUL.
    Text,
    /// Raw signed bytes terminated by `~` (uppercase opcodes).
    Binary,
}

impl ParamEncoding {
    /// Terminator byte the interpreter expects after the parameters.
    pub const fn terminator(self) -> u8 {
        match self {
            Self::Text => b'\0',
            Self::Binary => b'~',
        }
    }

    /// Uppercase ASCII opcodes carry binary parameter arrays.
    pub const fn for_opcode(opcode: u8) -> Self {
        if opcode.is_ascii_uppercase() {
            Self::Binary
        } else {
            Self::Text
        }
    }
}

/// One decoded sub-command, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub opcode: u8,
    pub params: Vec<u8>,
    pub encoding: ParamEncoding,
    pub source: CommandSource,
}

impl DeviceCommand {
    /// Literal `"<opcode><params>"` command; parameters are always text.
    pub fn text(opcode: u8, params: &[u8], source: CommandSource) -> Self {
        Self {
            opcode,
            params: params.to_vec(),
            encoding: ParamEncoding::Text,
            source,
        }
    }

    /// Decoded binary payload; the encoding follows the opcode case.
    pub fn decoded(opcode: u8, params: &[u8], source: CommandSource) -> Self {
        Self {
            opcode,
            params: params.to_vec(),
            encoding: ParamEncoding::for_opcode(opcode),
            source,
        }
    }

    /// Serialise as the interpreter's line format: opcode, params, terminator.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.params.len() + 2);
        out.push(self.opcode);
        out.extend_from_slice(&self.params);
        out.push(self.encoding.terminator());
        out
    }
}
