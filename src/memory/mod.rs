//! Memory operations on a target process
//!
//! This module provides:
//! - Region listing and classification from the target's memory map
//! - Typed reading and writing through a [`MemoryChannel`]
//! - Exact and range value scans with iterative refinement
//! - A background freeze loop
//!
//! [`MemoryTool`] ties these together into one session object.

pub mod freeze;
pub mod reader;
pub mod regions;
pub mod scanner;
pub mod writer;

pub use freeze::{FreezeEngine, DEFAULT_FREEZE_DELAY_US};
pub use reader::MemoryReader;
pub use regions::{MemoryRegion, RegionCatalog, RegionCategory};
pub use scanner::{ScanOptions, ScanPredicate, ValueScanner};
pub use writer::MemoryWriter;

use crate::channel::{DriverStatus, KpmChannel, MemoryChannel};
use crate::config::Config;
use crate::core::types::{
    Address, FreezeEntry, MemoryError, MemoryResult, MemoryValue, Offset, PrimitiveType,
    ProcessHandle, ProcessId, ScanResult,
};
use crate::process::ProcessResolver;
use crate::sys::ErrorCode;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

/// A memory editing session against one target at a time.
///
/// Holds the current scan results and the freeze entries. Until
/// [`connect`](Self::connect) succeeds every scan, refinement and write
/// works on an empty set and does nothing.
pub struct MemoryTool {
    channel: Arc<dyn MemoryChannel>,
    resolver: ProcessResolver,
    catalog: RegionCatalog,
    options: ScanOptions,
    search_range: RegionCategory,
    result_limit: usize,
    target: Option<ProcessHandle>,
    results: Vec<ScanResult>,
    freeze: FreezeEngine,
}

impl MemoryTool {
    /// Create a session over an existing channel
    pub fn new(channel: Arc<dyn MemoryChannel>, config: &Config) -> Self {
        let resolver = ProcessResolver::from(&config.process);
        let freeze = FreezeEngine::new(Arc::clone(&channel), resolver.clone());
        freeze.set_delay(config.freeze.delay_us);

        MemoryTool {
            catalog: RegionCatalog::new(config.process.proc_root.clone(), config.scanner.safe_mode),
            options: ScanOptions::from(&config.scanner),
            search_range: config.scanner.search_range,
            result_limit: config.display.result_limit,
            channel,
            resolver,
            target: None,
            results: Vec::new(),
            freeze,
        }
    }

    /// Create a session talking to the KPM driver
    pub fn with_kpm(config: &Config) -> Self {
        Self::new(Arc::new(KpmChannel::new(config.channel.clone())), config)
    }

    pub fn channel(&self) -> &Arc<dyn MemoryChannel> {
        &self.channel
    }

    pub fn resolver(&self) -> &ProcessResolver {
        &self.resolver
    }

    /// Resolves `name` and binds the channel to it.
    ///
    /// Results from a previous target are dropped. On failure the session
    /// is left disconnected.
    pub fn connect(&mut self, name: &str) -> MemoryResult<ProcessId> {
        self.results.clear();
        self.target = None;

        let handle = self.resolver.find(name)?;
        if !self.channel.bind(handle.pid()) {
            return Err(MemoryError::InvalidProcessId(handle.pid()));
        }

        info!(name, pid = handle.pid(), "Connected to target");
        let pid = handle.pid();
        self.target = Some(handle);
        Ok(pid)
    }

    pub fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    /// Pid of the connected target if its name still resolves to it.
    ///
    /// A target that exited, or whose pid now belongs to another process,
    /// disconnects the session and drops its results.
    fn live_target(&mut self) -> Option<ProcessId> {
        let target = self.target.as_ref()?;
        let current = self.resolver.resolve(target.name());
        if current == Some(target.pid()) {
            return Some(target.pid());
        }

        warn!(
            name = target.name(),
            pid = target.pid(),
            current = ?current,
            "Target no longer running, disconnecting"
        );
        self.target = None;
        self.results.clear();
        None
    }

    pub fn target(&self) -> Option<&ProcessHandle> {
        self.target.as_ref()
    }

    pub fn driver_status(&self) -> DriverStatus {
        self.channel.status()
    }

    /// Probes the driver, failing with the errno it left behind when absent
    pub fn require_driver(&self) -> MemoryResult<DriverStatus> {
        let status = self.driver_status();
        if status.available {
            Ok(status)
        } else {
            Err(ErrorCode::from(status.last_error).to_memory_error())
        }
    }

    pub fn search_range(&self) -> RegionCategory {
        self.search_range
    }

    pub fn set_search_range(&mut self, category: RegionCategory) {
        self.search_range = category;
    }

    pub fn safe_mode(&self) -> bool {
        self.options.safe_mode
    }

    /// Throttles scanning and keeps denylisted regions out of every range
    pub fn set_safe_mode(&mut self, enabled: bool) {
        self.options.safe_mode = enabled;
        self.catalog.set_safe_mode(enabled);
    }

    /// Regions of the connected target in the current search range
    pub fn regions(&mut self) -> Vec<MemoryRegion> {
        match self.live_target() {
            Some(pid) => self.catalog.list_regions(pid, self.search_range),
            None => Vec::new(),
        }
    }

    /// Start of the first mapping of `module` in the connected target
    pub fn module_base(&mut self, module: &str) -> Option<Address> {
        let pid = self.live_target()?;
        self.catalog.module_base(pid, module)
    }

    /// Sends `SIGKILL` to the process called `name`
    pub fn kill_process(&self, name: &str) -> MemoryResult<ProcessId> {
        self.resolver.kill_process(name)
    }

    fn scanner(&self) -> ValueScanner<'_> {
        ValueScanner::new(self.channel.as_ref(), self.options.clone())
    }

    fn run_scan(&mut self, predicate: ScanPredicate) -> usize {
        self.results.clear();
        let regions = self.regions();
        if regions.is_empty() {
            return 0;
        }
        let results = self.scanner().scan(&predicate, &regions);
        self.results = results;
        self.results.len()
    }

    /// New scan for an exact value; replaces the result set
    pub fn search(&mut self, value: &str, value_type: PrimitiveType) -> MemoryResult<usize> {
        let value = MemoryValue::parse(value, value_type)?;
        Ok(self.run_scan(ScanPredicate::Exact(value)))
    }

    /// New scan for an inclusive range; replaces the result set
    pub fn range_search(
        &mut self,
        low: &str,
        high: &str,
        value_type: PrimitiveType,
    ) -> MemoryResult<usize> {
        let low = MemoryValue::parse(low, value_type)?;
        let high = MemoryValue::parse(high, value_type)?;
        Ok(self.run_scan(ScanPredicate::between(low, high)))
    }

    fn run_refine(&mut self, predicate: ScanPredicate, offset: Offset) -> usize {
        if self.live_target().is_none() {
            return 0;
        }
        let current = std::mem::take(&mut self.results);
        let refined = self.scanner().refine_with(current, &predicate, offset);
        self.results = refined;
        self.results.len()
    }

    /// Keeps results whose value at `address + offset` equals `value`
    pub fn refine(
        &mut self,
        value: &str,
        offset: Offset,
        value_type: PrimitiveType,
    ) -> MemoryResult<usize> {
        let value = MemoryValue::parse(value, value_type)?;
        Ok(self.run_refine(ScanPredicate::Exact(value), offset))
    }

    /// Keeps results whose value at `address + offset` lies in `[low, high]`
    pub fn refine_range(
        &mut self,
        low: &str,
        high: &str,
        offset: Offset,
        value_type: PrimitiveType,
    ) -> MemoryResult<usize> {
        let low = MemoryValue::parse(low, value_type)?;
        let high = MemoryValue::parse(high, value_type)?;
        Ok(self.run_refine(ScanPredicate::between(low, high), offset))
    }

    /// Writes `value` at `address + offset` for every result; returns how
    /// many writes succeeded
    pub fn write_all(
        &mut self,
        value: &str,
        offset: Offset,
        value_type: PrimitiveType,
    ) -> MemoryResult<usize> {
        let value = MemoryValue::parse(value, value_type)?;
        if self.live_target().is_none() {
            return Ok(0);
        }
        let writer = MemoryWriter::new(self.channel.as_ref());
        let written = writer.write_batch(
            self.results.iter().map(|result| result.address.offset(offset)),
            &value,
        );
        info!(written, total = self.results.len(), "Wrote all results");
        Ok(written)
    }

    /// Writes one value; `Ok(false)` when the write did not land
    pub fn write_address(
        &mut self,
        address: Address,
        value: &str,
        value_type: PrimitiveType,
    ) -> MemoryResult<bool> {
        let value = MemoryValue::parse(value, value_type)?;
        if self.live_target().is_none() {
            return Ok(false);
        }
        match MemoryWriter::new(self.channel.as_ref()).write_value(address, &value) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "Write failed");
                Ok(false)
            }
        }
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Current value at `address` as text, `?` if it cannot be read
    pub fn address_value(&self, address: Address, value_type: PrimitiveType) -> String {
        MemoryReader::new(self.channel.as_ref())
            .read_value(address, value_type)
            .map_or_else(|_| "?".to_string(), |value| value.to_string())
    }

    /// Renders at most `result_limit` results, one per line, with a
    /// trailer when some were left out
    pub fn render_results(&self) -> String {
        let mut out = String::new();
        for result in self.results.iter().take(self.result_limit) {
            let _ = writeln!(
                out,
                "Addr:{} Type:{} Value:{}",
                result.address,
                result.value_type,
                self.address_value(result.address, result.value_type)
            );
        }
        if self.results.len() > self.result_limit {
            let _ = writeln!(
                out,
                "... (Showing first {} of {} results)",
                self.result_limit,
                self.results.len()
            );
        }
        out
    }

    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    pub fn set_result_limit(&mut self, limit: usize) {
        self.result_limit = limit;
    }

    /// Freezes `value` at `address + offset`
    pub fn add_freeze(
        &self,
        address: Address,
        value: &str,
        value_type: PrimitiveType,
        offset: Offset,
    ) -> MemoryResult<()> {
        self.freeze.add(address, value, value_type, offset)
    }

    /// Freezes `value` at `address + offset` for every current result
    pub fn add_freeze_all(
        &self,
        value: &str,
        value_type: PrimitiveType,
        offset: Offset,
    ) -> MemoryResult<usize> {
        self.freeze.add_all(&self.results, value, value_type, offset)
    }

    pub fn remove_freeze(&self, address: Address) -> usize {
        self.freeze.remove(address)
    }

    pub fn clear_freeze(&self) {
        self.freeze.clear();
    }

    pub fn freeze_entries(&self) -> Vec<FreezeEntry> {
        self.freeze.entries()
    }

    pub fn render_freeze_entries(&self) -> String {
        let mut out = String::new();
        for entry in self.freeze.entries() {
            let _ = writeln!(
                out,
                "FreezeAddr:{} Type:{} Value:{}",
                entry.address, entry.value_type, entry.literal
            );
        }
        out
    }

    pub fn set_freeze_delay(&self, delay_us: u64) {
        self.freeze.set_delay(delay_us);
    }

    /// Starts freezing the connected target; `Ok(false)` if already running
    pub fn start_freeze(&mut self) -> MemoryResult<bool> {
        let name = self
            .target
            .as_ref()
            .map(|target| target.name().to_string())
            .ok_or(MemoryError::NotConnected)?;
        Ok(self.freeze.start(&name))
    }

    pub fn stop_freeze(&mut self) {
        self.freeze.stop();
    }

    pub fn is_freezing(&self) -> bool {
        self.freeze.is_running()
    }
}
