//! Outbound text encoding into the module's stdin channel.

use parking_lot::Mutex;
use tether_channel::{ByteRing, ChannelSet};

/// Encodes command lines and raw keystrokes into the stdin ring.
///
/// Sends report `false` ("not ready") until a channel set is attached, or
/// when the bound module exports no stdin channel; interactive forwarding is
/// simply disabled then.
#[derive(Default)]
pub struct CommandPort {
    stdin: Mutex<Option<ByteRing>>,
}

impl CommandPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts the stdin ring of a freshly bound channel set.
    pub fn attach(&self, channels: &ChannelSet) {
        *self.stdin.lock() = channels.stdin().cloned();
    }

    /// Drops the ring on module teardown.
    pub fn detach(&self) {
        *self.stdin.lock() = None;
    }

    /// True when keystrokes currently have somewhere to go.
    pub fn is_ready(&self) -> bool {
        self.stdin.lock().is_some()
    }

    /// Sends a full command line followed by a line terminator.
    pub fn send_command(&self, line: &str) -> bool {
        let guard = self.stdin.lock();
        let Some(ring) = guard.as_ref() else {
            return false;
        };
        for byte in line.bytes() {
            ring.push_one(byte);
        }
        ring.push_one(b'\n');
        true
    }

    /// Sends one keystroke for character-at-a-time interactive mode.
    pub fn send_key(&self, key: char) -> bool {
        let guard = self.stdin.lock();
        let Some(ring) = guard.as_ref() else {
            return false;
        };
        let mut utf8 = [0u8; 4];
        for &byte in key.encode_utf8(&mut utf8).as_bytes() {
            ring.push_one(byte);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_channel::ChannelSet;
    use tether_mock::MockModule;

    #[test]
    fn not_ready_until_attached() {
        let port = CommandPort::new();
        assert!(!port.is_ready());
        assert!(!port.send_command("version"));
        assert!(!port.send_key('q'));
    }

    #[test]
    fn command_lines_arrive_terminated() {
        let module = MockModule::new(64);
        let set = ChannelSet::bind(&module).expect("bind");
        let port = CommandPort::new();
        port.attach(&set);

        assert!(port.send_command("run"));
        let mut out = [0u8; 8];
        assert_eq!(module.drain_stdin(&mut out), 4);
        assert_eq!(&out[..4], b"run\n");
    }

    #[test]
    fn keys_forward_raw_utf8() {
        let module = MockModule::new(64);
        let set = ChannelSet::bind(&module).expect("bind");
        let port = CommandPort::new();
        port.attach(&set);

        assert!(port.send_key('a'));
        assert!(port.send_key('é'));
        let mut out = [0u8; 8];
        let n = module.drain_stdin(&mut out);
        assert_eq!(&out[..n], "aé".as_bytes());
    }

    #[test]
    fn module_without_stdin_stays_not_ready() {
        let module = MockModule::without_stdin(64);
        let set = ChannelSet::bind(&module).expect("bind");
        let port = CommandPort::new();
        port.attach(&set);

        assert!(!port.is_ready());
        assert!(!port.send_command("run"));
    }

    #[test]
    fn detach_disables_forwarding() {
        let module = MockModule::new(64);
        let set = ChannelSet::bind(&module).expect("bind");
        let port = CommandPort::new();
        port.attach(&set);
        assert!(port.is_ready());

        port.detach();
        assert!(!port.send_command("run"));
    }
}
