//! Background loop that keeps re-writing frozen values

use crate::channel::MemoryChannel;
use crate::core::types::{Address, FreezeEntry, MemoryResult, Offset, PrimitiveType, ScanResult};
use crate::process::ProcessResolver;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default pause between two write passes, in microseconds
pub const DEFAULT_FREEZE_DELAY_US: u64 = 30_000;

/// Owns the freeze entry set and the loop thread writing it.
///
/// The loop runs until [`stop`](Self::stop) is called or the target can no
/// longer be resolved by name. Entries can be changed while it runs; every
/// pass writes the set as it is at that moment.
pub struct FreezeEngine {
    channel: Arc<dyn MemoryChannel>,
    resolver: ProcessResolver,
    entries: Arc<Mutex<Vec<FreezeEntry>>>,
    running: Arc<AtomicBool>,
    delay_us: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl FreezeEngine {
    pub fn new(channel: Arc<dyn MemoryChannel>, resolver: ProcessResolver) -> Self {
        FreezeEngine {
            channel,
            resolver,
            entries: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            delay_us: Arc::new(AtomicU64::new(DEFAULT_FREEZE_DELAY_US)),
            worker: None,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<FreezeEntry>> {
        lock(&self.entries)
    }

    /// Adds `address + offset`, validating the literal against `value_type`
    pub fn add(
        &self,
        address: Address,
        literal: &str,
        value_type: PrimitiveType,
        offset: Offset,
    ) -> MemoryResult<()> {
        let entry = FreezeEntry::new(address.offset(offset), literal, value_type)?;
        self.lock_entries().push(entry);
        Ok(())
    }

    /// Adds one entry per scan result; returns how many were added
    pub fn add_all(
        &self,
        results: &[ScanResult],
        literal: &str,
        value_type: PrimitiveType,
        offset: Offset,
    ) -> MemoryResult<usize> {
        let new_entries = results
            .iter()
            .map(|result| FreezeEntry::new(result.address.offset(offset), literal, value_type))
            .collect::<MemoryResult<Vec<_>>>()?;

        let count = new_entries.len();
        self.lock_entries().extend(new_entries);
        Ok(count)
    }

    /// Removes every entry at `address`; returns how many were removed
    pub fn remove(&self, address: Address) -> usize {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|entry| entry.address != address);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    /// Snapshot of the current entries
    pub fn entries(&self) -> Vec<FreezeEntry> {
        self.lock_entries().clone()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Sets the pause between passes; a running loop picks it up after its
    /// current sleep
    pub fn set_delay(&self, delay_us: u64) {
        self.delay_us.store(delay_us, Ordering::Relaxed);
    }

    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_us.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the loop for the target called `target_name`.
    ///
    /// Returns false without doing anything if the loop is already running.
    /// A loop that gave up on a vanished target counts as stopped from the
    /// moment it clears the running flag.
    pub fn start(&mut self, target_name: &str) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            return false;
        }
        // A loop that ended on its own may still be unwinding
        self.join_worker();

        let context = FreezeLoop {
            channel: Arc::clone(&self.channel),
            resolver: self.resolver.clone(),
            target_name: target_name.to_string(),
            entries: Arc::clone(&self.entries),
            running: Arc::clone(&self.running),
            delay_us: Arc::clone(&self.delay_us),
        };

        let spawned = thread::Builder::new()
            .name("freeze".to_string())
            .spawn(move || context.run());

        match spawned {
            Ok(handle) => {
                info!(process = target_name, entries = self.len(), "Freeze started");
                self.worker = Some(handle);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to spawn freeze thread");
                self.running.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Stops the loop and waits for it to exit
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if let Some(handle) = self.worker.as_ref() {
            handle.thread().unpark();
        }
        self.join_worker();
        if was_running {
            info!("Freeze stopped");
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Freeze thread panicked");
            }
        }
    }
}

impl Drop for FreezeEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(entries: &Mutex<Vec<FreezeEntry>>) -> MutexGuard<'_, Vec<FreezeEntry>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State moved into the loop thread
struct FreezeLoop {
    channel: Arc<dyn MemoryChannel>,
    resolver: ProcessResolver,
    target_name: String,
    entries: Arc<Mutex<Vec<FreezeEntry>>>,
    running: Arc<AtomicBool>,
    delay_us: Arc<AtomicU64>,
}

impl FreezeLoop {
    fn run(self) {
        while self.running.load(Ordering::Acquire) {
            if self.resolver.resolve(&self.target_name).is_none() {
                info!(process = %self.target_name, "Freeze target is gone, stopping");
                // Last touch of the flag; a new start may own it right after
                let _ = self.running.compare_exchange(
                    true,
                    false,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                return;
            }

            self.write_pass();

            let delay = Duration::from_micros(self.delay_us.load(Ordering::Relaxed));
            thread::park_timeout(delay);
        }
    }

    /// Writes every entry once, holding the entry lock for the whole pass
    fn write_pass(&self) {
        let entries = lock(&self.entries);
        for entry in entries.iter() {
            match entry.value() {
                Ok(value) => {
                    if !self.channel.write_value(entry.address, &value) {
                        debug!(
                            address = %entry.address,
                            errno = self.channel.last_error(),
                            "Freeze write failed"
                        );
                    }
                }
                Err(e) => warn!(error = %e, "Freeze entry has an unparsable value"),
            }
        }
    }
}
