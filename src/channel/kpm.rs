//! KPM channel: memory access through the kernel extension's `prctl` hook

use super::protocol::{KpmCommand, Opcode};
use super::MemoryChannel;
use crate::config::ChannelConfig;
use crate::core::types::{Address, ProcessId};
use crate::sys::{prctl, ErrorCode};
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::{debug, info, warn};

/// Delivers one command to the extension.
///
/// Returns the extension's non-negative result or the errno it left behind.
pub trait Transport: Send + Sync {
    fn dispatch(&self, magic: u32, command: &mut KpmCommand) -> Result<usize, i32>;
}

/// The real transport: `syscall(SYS_prctl, magic, &command, 0, 0, 0)`
#[derive(Debug, Default, Clone, Copy)]
pub struct PrctlTransport;

impl Transport for PrctlTransport {
    fn dispatch(&self, magic: u32, command: &mut KpmCommand) -> Result<usize, i32> {
        // SAFETY: every KpmCommand is built by KpmChannel from a buffer that
        // stays borrowed until this call returns.
        unsafe { prctl::kpm_syscall(magic, command as *mut KpmCommand as *mut libc::c_void) }
    }
}

/// Memory channel backed by the KPM kernel extension
pub struct KpmChannel<T: Transport = PrctlTransport> {
    transport: T,
    config: ChannelConfig,
    /// Bound pid, 0 when unbound
    target: AtomicI32,
    last_error: AtomicI32,
}

impl KpmChannel<PrctlTransport> {
    /// Create a channel that issues real system calls
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_transport(PrctlTransport, config)
    }
}

impl<T: Transport> KpmChannel<T> {
    /// Create a channel over a custom transport
    pub fn with_transport(transport: T, config: ChannelConfig) -> Self {
        KpmChannel {
            transport,
            config,
            target: AtomicI32::new(0),
            last_error: AtomicI32::new(0),
        }
    }

    /// Get the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a command, re-sending while the call is interrupted, up to
    /// `max_retries` attempts in total
    fn dispatch(&self, command: &mut KpmCommand) -> Result<usize, i32> {
        let magic = self.config.magic();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.transport.dispatch(magic, command) {
                Err(code) if code == libc::EINTR && attempts < self.config.max_retries => continue,
                outcome => return outcome,
            }
        }
    }

    fn transfer(&self, mut command: KpmCommand, requested: usize) -> usize {
        match self.dispatch(&mut command) {
            Ok(count) => {
                self.last_error.store(0, Ordering::Relaxed);
                count.min(requested)
            }
            Err(code) => {
                self.last_error.store(code, Ordering::Relaxed);
                debug!(
                    op = ?command.opcode(),
                    address = %Address::new(command.addr),
                    len = command.len,
                    error = %ErrorCode::from(code),
                    "KPM transfer failed"
                );
                0
            }
        }
    }
}

impl<T: Transport> MemoryChannel for KpmChannel<T> {
    fn bind(&self, pid: ProcessId) -> bool {
        if pid <= 0 {
            return false;
        }
        self.target.store(pid, Ordering::Release);
        self.last_error.store(0, Ordering::Relaxed);
        info!(
            pid,
            magic = %format!("0x{:X}", self.config.magic()),
            bits = usize::BITS,
            "KPM channel bound"
        );
        true
    }

    fn target(&self) -> Option<ProcessId> {
        match self.target.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Reads an int out of our own stack "from" the probe pid. Whatever the
    /// driver thinks of that request, only the driver answers with one of
    /// the configured present codes.
    fn probe(&self) -> bool {
        let source: i32 = 12345;
        let mut sink = [0u8; 4];
        let mut command = KpmCommand {
            pid: self.config.probe_pid,
            op: Opcode::Read as i32,
            addr: &source as *const i32 as u64,
            len: sink.len() as u64,
            data: sink.as_mut_ptr() as u64,
        };

        match self.dispatch(&mut command) {
            Ok(_) => {
                self.last_error.store(0, Ordering::Relaxed);
                true
            }
            Err(code) => {
                self.last_error.store(code, Ordering::Relaxed);
                if self.config.present_error_codes.contains(&code) {
                    debug!(error = %ErrorCode::from(code), "KPM driver answered probe");
                    true
                } else {
                    warn!(
                        error = %ErrorCode::from(code),
                        magic = %format!("0x{:X}", self.config.magic()),
                        "KPM driver probe failed"
                    );
                    false
                }
            }
        }
    }

    fn read_bytes(&self, address: Address, buffer: &mut [u8]) -> usize {
        let pid = match self.target() {
            Some(pid) => pid,
            None => return 0,
        };
        if buffer.is_empty() {
            return 0;
        }
        let requested = buffer.len();
        self.transfer(KpmCommand::read(pid, address, buffer), requested)
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> usize {
        let pid = match self.target() {
            Some(pid) => pid,
            None => return 0,
        };
        if data.is_empty() {
            return 0;
        }
        self.transfer(KpmCommand::write(pid, address, data), data.len())
    }

    fn last_error(&self) -> i32 {
        self.last_error.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Mutex;

    /// Replays a scripted sequence of results and records every command
    struct ScriptedTransport {
        replies: Mutex<Vec<Result<usize, i32>>>,
        seen: Mutex<Vec<(u32, KpmCommand)>>,
    }

    impl ScriptedTransport {
        fn new(mut replies: Vec<Result<usize, i32>>) -> Self {
            replies.reverse();
            ScriptedTransport {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn dispatch(&self, magic: u32, command: &mut KpmCommand) -> Result<usize, i32> {
            self.seen.lock().unwrap().push((magic, *command));
            self.replies.lock().unwrap().pop().unwrap_or(Err(libc::EINVAL))
        }
    }

    fn channel(replies: Vec<Result<usize, i32>>) -> KpmChannel<ScriptedTransport> {
        KpmChannel::with_transport(ScriptedTransport::new(replies), Config::default().channel)
    }

    #[test]
    fn test_unbound_channel_reads_nothing() {
        let channel = channel(vec![Ok(4)]);
        let mut buffer = [0u8; 4];
        assert_eq!(channel.read_bytes(Address::new(0x1000), &mut buffer), 0);
        assert_eq!(channel.transport().calls(), 0);
        assert!(!channel.bind(0));
        assert!(!channel.bind(-1));
        assert_eq!(channel.target(), None);
    }

    #[test]
    fn test_read_carries_protocol_fields() {
        let channel = channel(vec![Ok(8)]);
        assert!(channel.bind(4321));

        let mut buffer = [0u8; 8];
        assert_eq!(channel.read_bytes(Address::new(0x7ff3b23000), &mut buffer), 8);

        let seen = channel.transport().seen.lock().unwrap();
        let (magic, command) = seen[0];
        assert_eq!(magic, Config::default().channel.magic());
        assert_eq!(command.pid, 4321);
        assert_eq!(command.op, 0);
        assert_eq!(command.addr, 0x7ff3b23000);
        assert_eq!(command.len, 8);
    }

    #[test]
    fn test_write_uses_write_opcode() {
        let channel = channel(vec![Ok(2)]);
        channel.bind(10);
        assert_eq!(channel.write_bytes(Address::new(0x20), &[1, 2]), 2);
        let seen = channel.transport().seen.lock().unwrap();
        assert_eq!(seen[0].1.op, 1);
    }

    #[test]
    fn test_retries_only_on_eintr() {
        let channel = channel(vec![Err(libc::EINTR), Err(libc::EINTR), Ok(4)]);
        channel.bind(10);
        let mut buffer = [0u8; 4];
        assert_eq!(channel.read_bytes(Address::new(0x1000), &mut buffer), 4);
        assert_eq!(channel.transport().calls(), 3);
        assert_eq!(channel.last_error(), 0);

        let channel = channel_with_error(libc::EFAULT);
        channel.bind(10);
        assert_eq!(channel.read_bytes(Address::new(0x1000), &mut buffer), 0);
        assert_eq!(channel.transport().calls(), 1);
        assert_eq!(channel.last_error(), libc::EFAULT);
    }

    fn channel_with_error(code: i32) -> KpmChannel<ScriptedTransport> {
        channel(vec![Err(code)])
    }

    #[test]
    fn test_retry_bound() {
        let mut config = Config::default().channel;
        config.max_retries = 3;
        let transport = ScriptedTransport::new(vec![Err(libc::EINTR); 10]);
        let channel = KpmChannel::with_transport(transport, config);
        channel.bind(10);

        let mut buffer = [0u8; 4];
        assert_eq!(channel.write_bytes(Address::new(0x1000), &buffer), 0);
        assert_eq!(channel.transport().calls(), 3);
        assert_eq!(channel.last_error(), libc::EINTR);
        assert_eq!(channel.read_bytes(Address::new(0x1000), &mut buffer), 0);
    }

    #[test]
    fn test_count_is_clamped_to_request() {
        let channel = channel(vec![Ok(4096)]);
        channel.bind(10);
        let mut buffer = [0u8; 16];
        assert_eq!(channel.read_bytes(Address::new(0x1000), &mut buffer), 16);
    }

    #[test]
    fn test_probe_treats_driver_codes_as_present() {
        for code in [libc::ENOENT, libc::ENXIO] {
            let channel = channel_with_error(code);
            assert!(channel.probe());
            assert_eq!(channel.last_error(), code);
        }

        let channel = channel(vec![Ok(0)]);
        assert!(channel.probe());
    }

    #[test]
    fn test_probe_fails_on_generic_errors() {
        let channel = channel_with_error(libc::EINVAL);
        assert!(!channel.probe());
        assert_eq!(channel.last_error(), libc::EINVAL);
    }

    #[test]
    fn test_probe_targets_probe_pid_not_bound_pid() {
        let channel = channel(vec![Err(libc::ENOENT)]);
        channel.bind(999);
        channel.probe();
        let seen = channel.transport().seen.lock().unwrap();
        assert_eq!(seen[0].1.pid, 1);
        assert_eq!(seen[0].1.len, 4);
    }

    #[test]
    fn test_present_codes_are_configurable() {
        let mut config = Config::default().channel;
        config.present_error_codes = vec![libc::ESRCH];
        let transport = ScriptedTransport::new(vec![Err(libc::ENOENT)]);
        let channel = KpmChannel::with_transport(transport, config.clone());
        assert!(!channel.probe());

        let transport = ScriptedTransport::new(vec![Err(libc::ESRCH)]);
        let channel = KpmChannel::with_transport(transport, config);
        assert!(channel.probe());
    }
}
