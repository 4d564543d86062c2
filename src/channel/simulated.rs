//! In-process stand-in for a target's address space

use super::MemoryChannel;
use crate::core::types::{Address, ProcessId};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A [`MemoryChannel`] over mapped byte segments held in this process.
///
/// Reads and writes behave like the driver's: a transfer that starts in a
/// mapped segment is served up to the end of that segment, anything else
/// fails with `ENXIO`. Individual addresses can be made to fail on demand.
#[derive(Default)]
pub struct SimulatedMemory {
    segments: Mutex<BTreeMap<u64, Vec<u8>>>,
    failing: Mutex<HashSet<u64>>,
    target: AtomicI32,
    last_error: AtomicI32,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl SimulatedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `bytes` at `start`, replacing any segment already starting there
    pub fn map(&self, start: Address, bytes: Vec<u8>) {
        self.lock_segments().insert(start.as_u64(), bytes);
    }

    /// Makes every transfer starting at `address` fail
    pub fn fail_at(&self, address: Address) {
        self.lock_failing().insert(address.as_u64());
    }

    /// Makes the probe report a missing driver
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Relaxed);
    }

    /// Copies bytes out without going through the channel
    pub fn peek(&self, address: Address, len: usize) -> Option<Vec<u8>> {
        let segments = self.lock_segments();
        let (offset, bytes) = Self::locate(&segments, address.as_u64())?;
        bytes.get(offset..offset + len).map(<[u8]>::to_vec)
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn locate(segments: &BTreeMap<u64, Vec<u8>>, address: u64) -> Option<(usize, &Vec<u8>)> {
        let (start, bytes) = segments.range(..=address).next_back()?;
        let offset = (address - start) as usize;
        (offset < bytes.len()).then_some((offset, bytes))
    }

    fn lock_segments(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Vec<u8>>> {
        self.segments.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_failing(&self) -> std::sync::MutexGuard<'_, HashSet<u64>> {
        self.failing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail(&self) -> usize {
        self.last_error.store(libc::ENXIO, Ordering::Relaxed);
        0
    }

    fn is_blocked(&self, address: Address) -> bool {
        self.target().is_none()
            || self.unavailable.load(Ordering::Relaxed)
            || self.lock_failing().contains(&address.as_u64())
    }
}

impl MemoryChannel for SimulatedMemory {
    fn bind(&self, pid: ProcessId) -> bool {
        if pid <= 0 {
            return false;
        }
        self.target.store(pid, Ordering::Release);
        true
    }

    fn target(&self) -> Option<ProcessId> {
        match self.target.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    fn probe(&self) -> bool {
        if self.unavailable.load(Ordering::Relaxed) {
            self.last_error.store(libc::EINVAL, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn read_bytes(&self, address: Address, buffer: &mut [u8]) -> usize {
        if buffer.is_empty() || self.is_blocked(address) {
            return self.fail();
        }
        let segments = self.lock_segments();
        let Some((offset, bytes)) = Self::locate(&segments, address.as_u64()) else {
            return self.fail();
        };

        let count = buffer.len().min(bytes.len() - offset);
        buffer[..count].copy_from_slice(&bytes[offset..offset + count]);
        self.last_error.store(0, Ordering::Relaxed);
        count
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> usize {
        if data.is_empty() || self.is_blocked(address) {
            return self.fail();
        }
        let mut segments = self.lock_segments();
        let Some((start, bytes)) = segments.range_mut(..=address.as_u64()).next_back() else {
            return self.fail();
        };
        let offset = (address.as_u64() - start) as usize;
        if offset >= bytes.len() {
            return self.fail();
        }

        let count = data.len().min(bytes.len() - offset);
        bytes[offset..offset + count].copy_from_slice(&data[..count]);
        self.last_error.store(0, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        count
    }

    fn last_error(&self) -> i32 {
        self.last_error.load(Ordering::Relaxed)
    }
}
