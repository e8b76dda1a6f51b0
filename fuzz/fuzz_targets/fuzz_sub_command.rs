//! Fuzz target: `decode_sub_command`
//!
//! Feeds arbitrary command-group entries to the sub-command decoder.  It
//! must never panic, and a successful decode always yields a frame the
//! interpreter can take: opcode first, terminator last.
//!
//! cargo fuzz run fuzz_sub_command

#![no_main]

use libfuzzer_sys::fuzz_target;
use robolink::link::sequencer::decode_sub_command;

fuzz_target!(|data: &[u8]| {
    let Ok(entry) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(cmd) = decode_sub_command(entry) {
        let wire = cmd.to_wire();
        assert_eq!(wire.first(), Some(&cmd.opcode));
        assert_eq!(wire.last(), Some(&cmd.encoding.terminator()));
        assert_eq!(wire.len(), cmd.params.len() + 2);
    }
});
