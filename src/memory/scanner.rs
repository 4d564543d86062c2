//! Value scanning and result refinement

use crate::channel::MemoryChannel;
use crate::config::ScannerConfig;
use crate::core::types::{Address, MemoryValue, Offset, PrimitiveType, ScanResult};
use crate::memory::regions::MemoryRegion;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// What a candidate value has to satisfy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanPredicate {
    /// Exact IEEE / integer equality
    Exact(MemoryValue),
    /// Inclusive range, `low <= value <= high`
    Between(MemoryValue, MemoryValue),
}

impl ScanPredicate {
    /// Builds a range predicate, swapping the bounds if they arrive reversed
    pub fn between(low: MemoryValue, high: MemoryValue) -> Self {
        if low > high {
            ScanPredicate::Between(high, low)
        } else {
            ScanPredicate::Between(low, high)
        }
    }

    pub fn value_type(&self) -> PrimitiveType {
        match self {
            ScanPredicate::Exact(value) | ScanPredicate::Between(value, _) => {
                value.primitive_type()
            }
        }
    }

    pub fn matches(&self, candidate: &MemoryValue) -> bool {
        match self {
            ScanPredicate::Exact(value) => candidate == value,
            ScanPredicate::Between(low, high) => low <= candidate && candidate <= high,
        }
    }
}

/// Options for memory scanning
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Largest single read, in bytes
    pub chunk_size: usize,
    /// Pause after every chunk
    pub safe_mode: bool,
    pub safe_mode_sleep: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            chunk_size: 128 * 1024,
            safe_mode: false,
            safe_mode_sleep: Duration::from_millis(1),
        }
    }
}

impl From<&ScannerConfig> for ScanOptions {
    fn from(config: &ScannerConfig) -> Self {
        ScanOptions {
            chunk_size: config.chunk_size,
            safe_mode: config.safe_mode,
            safe_mode_sleep: config.safe_mode_sleep(),
        }
    }
}

impl ScanOptions {
    /// Chunk length actually used: a multiple of 4 no smaller than 8, so
    /// chunk boundaries never break stride alignment and always fit a QWORD
    fn effective_chunk(&self) -> usize {
        (self.chunk_size & !3).max(8)
    }
}

/// Scans regions of the bound target for values
pub struct ValueScanner<'a> {
    channel: &'a dyn MemoryChannel,
    options: ScanOptions,
}

impl<'a> ValueScanner<'a> {
    /// Create a new value scanner
    pub fn new(channel: &'a dyn MemoryChannel, options: ScanOptions) -> Self {
        ValueScanner { channel, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Every address in `regions` holding exactly `value`
    pub fn scan_exact(&self, value: MemoryValue, regions: &[MemoryRegion]) -> Vec<ScanResult> {
        self.scan(&ScanPredicate::Exact(value), regions)
    }

    /// Every address in `regions` holding a value in `[low, high]`; the
    /// bounds may be given in either order
    pub fn scan_range(
        &self,
        low: MemoryValue,
        high: MemoryValue,
        regions: &[MemoryRegion],
    ) -> Vec<ScanResult> {
        self.scan(&ScanPredicate::between(low, high), regions)
    }

    /// Scans each region chunk by chunk, in region order
    pub fn scan(&self, predicate: &ScanPredicate, regions: &[MemoryRegion]) -> Vec<ScanResult> {
        let mut results = Vec::new();
        let mut buffer = vec![0u8; self.options.effective_chunk()];

        for region in regions {
            self.scan_region(predicate, region, &mut buffer, &mut results);
        }

        info!(
            regions = regions.len(),
            value_type = %predicate.value_type(),
            results = results.len(),
            "Scan finished"
        );
        results
    }

    fn scan_region(
        &self,
        predicate: &ScanPredicate,
        region: &MemoryRegion,
        buffer: &mut [u8],
        results: &mut Vec<ScanResult>,
    ) {
        let value_type = predicate.value_type();
        let width = value_type.size();
        let stride = value_type.alignment();
        let end = region.end.as_u64();
        let mut cursor = region.start.as_u64();

        while end.saturating_sub(cursor) >= width as u64 {
            let len = (end - cursor).min(buffer.len() as u64) as usize;
            let chunk = &mut buffer[..len];
            let read = self.channel.read_bytes(Address::new(cursor), chunk);

            if read == 0 {
                debug!(
                    address = %Address::new(cursor),
                    len,
                    errno = self.channel.last_error(),
                    "Chunk unreadable, skipping"
                );
            } else if read >= width {
                for offset in (0..=read - width).step_by(stride) {
                    let Some(candidate) = MemoryValue::from_bytes(&chunk[offset..], value_type)
                    else {
                        continue;
                    };
                    if predicate.matches(&candidate) {
                        results.push(ScanResult::new(
                            Address::new(cursor + offset as u64),
                            value_type,
                            region.name.clone(),
                        ));
                    }
                }
            }

            cursor += len as u64;
            if self.options.safe_mode {
                thread::sleep(self.options.safe_mode_sleep);
            }
        }
    }

    /// Keeps the results whose value at `address + offset` satisfies the
    /// predicate. Unreadable entries are dropped; addresses are untouched.
    pub fn refine_with(
        &self,
        results: Vec<ScanResult>,
        predicate: &ScanPredicate,
        offset: Offset,
    ) -> Vec<ScanResult> {
        let value_type = predicate.value_type();
        let before = results.len();
        let kept: Vec<ScanResult> = results
            .into_iter()
            .filter(|result| {
                self.channel
                    .read_value(result.address.offset(offset), value_type)
                    .map_or(false, |value| predicate.matches(&value))
            })
            .collect();

        info!(before, after = kept.len(), offset, "Refined results");
        kept
    }

    /// [`refine_with`](Self::refine_with) for an exact value
    pub fn refine(
        &self,
        results: Vec<ScanResult>,
        value: MemoryValue,
        offset: Offset,
    ) -> Vec<ScanResult> {
        self.refine_with(results, &ScanPredicate::Exact(value), offset)
    }

    /// [`refine_with`](Self::refine_with) for an inclusive range
    pub fn refine_range(
        &self,
        results: Vec<ScanResult>,
        low: MemoryValue,
        high: MemoryValue,
        offset: Offset,
    ) -> Vec<ScanResult> {
        self.refine_with(results, &ScanPredicate::between(low, high), offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SimulatedMemory;
    use crate::memory::regions::parse_line;

    fn region(start: u64, end: u64, name: &str) -> MemoryRegion {
        parse_line(&format!("{start:x}-{end:x} rw-p 00000000 00:00 0 {name}")).unwrap()
    }

    fn options(chunk_size: usize) -> ScanOptions {
        ScanOptions {
            chunk_size,
            ..ScanOptions::default()
        }
    }

    fn memory_with(start: u64, bytes: Vec<u8>) -> SimulatedMemory {
        let memory = SimulatedMemory::new();
        memory.map(Address::new(start), bytes);
        memory.bind(100);
        memory
    }

    #[test]
    fn test_predicate_swaps_range() {
        let predicate = ScanPredicate::between(MemoryValue::I32(10), MemoryValue::I32(1));
        assert_eq!(
            predicate,
            ScanPredicate::Between(MemoryValue::I32(1), MemoryValue::I32(10))
        );
        assert!(predicate.matches(&MemoryValue::I32(1)));
        assert!(predicate.matches(&MemoryValue::I32(10)));
        assert!(!predicate.matches(&MemoryValue::I32(11)));
    }

    #[test]
    fn test_exact_scan_finds_aligned_values() {
        let mut bytes = vec![0u8; 64];
        bytes[8..12].copy_from_slice(&777i32.to_le_bytes());
        bytes[40..44].copy_from_slice(&777i32.to_le_bytes());
        // Unaligned copy is never reported
        bytes[21..25].copy_from_slice(&777i32.to_le_bytes());
        let memory = memory_with(0x1000, bytes);

        let scanner = ValueScanner::new(&memory, options(16));
        let regions = [region(0x1000, 0x1040, "[heap]")];
        let results = scanner.scan_exact(MemoryValue::I32(777), &regions);

        let addresses: Vec<_> = results.iter().map(|r| r.address).collect();
        assert_eq!(addresses, vec![Address::new(0x1008), Address::new(0x1028)]);
        assert!(results.iter().all(|r| r.region_name == "[heap]"));
        assert!(results.iter().all(|r| r.value_type == PrimitiveType::Dword));
    }

    #[test]
    fn test_qword_uses_four_byte_stride() {
        let mut bytes = vec![0u8; 32];
        bytes[4..12].copy_from_slice(&(-9i64).to_le_bytes());
        let memory = memory_with(0x2000, bytes);

        let scanner = ValueScanner::new(&memory, ScanOptions::default());
        let results = scanner.scan_exact(MemoryValue::I64(-9), &[region(0x2000, 0x2020, "")]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].address, Address::new(0x2004));
    }

    #[test]
    fn test_value_at_region_end_is_found() {
        let mut bytes = vec![0u8; 12];
        bytes[8..12].copy_from_slice(&5.0f32.to_le_bytes());
        let memory = memory_with(0x3000, bytes);

        let scanner = ValueScanner::new(&memory, options(8));
        let results = scanner.scan_exact(MemoryValue::F32(5.0), &[region(0x3000, 0x300C, "")]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].address, Address::new(0x3008));
    }

    #[test]
    fn test_unreadable_chunk_is_skipped() {
        let mut bytes = vec![0u8; 32];
        bytes[0..4].copy_from_slice(&1i32.to_le_bytes());
        bytes[16..20].copy_from_slice(&1i32.to_le_bytes());
        let memory = memory_with(0x4000, bytes);
        memory.fail_at(Address::new(0x4000));

        let scanner = ValueScanner::new(&memory, options(16));
        let results = scanner.scan_exact(MemoryValue::I32(1), &[region(0x4000, 0x4020, "")]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].address, Address::new(0x4010));
    }

    #[test]
    fn test_range_scan_is_order_independent() {
        let bytes: Vec<u8> = (0u8..32).collect();
        let memory = memory_with(0x5000, bytes);
        let regions = [region(0x5000, 0x5020, "")];
        let scanner = ValueScanner::new(&memory, ScanOptions::default());

        let forward = scanner.scan_range(MemoryValue::I8(3), MemoryValue::I8(6), &regions);
        let reversed = scanner.scan_range(MemoryValue::I8(6), MemoryValue::I8(3), &regions);
        assert_eq!(forward.len(), 4);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_nan_never_matches() {
        let mut bytes = vec![0u8; 8];
        bytes[..4].copy_from_slice(&f32::NAN.to_le_bytes());
        bytes[4..].copy_from_slice(&(-0.0f32).to_le_bytes());
        let memory = memory_with(0x6000, bytes);
        let scanner = ValueScanner::new(&memory, ScanOptions::default());
        let regions = [region(0x6000, 0x6008, "")];

        assert!(scanner.scan_exact(MemoryValue::F32(f32::NAN), &regions).is_empty());
        let zeros = scanner.scan_exact(MemoryValue::F32(0.0), &regions);
        assert_eq!(zeros.len(), 1);
        assert_eq!(zeros[0].address, Address::new(0x6004));
    }

    #[test]
    fn test_refine_filters_without_moving_addresses() {
        let mut bytes = vec![0u8; 40];
        for (i, value) in [10i32, 20, 10, 30, 10].into_iter().enumerate() {
            bytes[i * 8..i * 8 + 4].copy_from_slice(&1i32.to_le_bytes());
            bytes[i * 8 + 4..i * 8 + 8].copy_from_slice(&value.to_le_bytes());
        }
        let memory = memory_with(0x7000, bytes);
        let scanner = ValueScanner::new(&memory, ScanOptions::default());
        let regions = [region(0x7000, 0x7028, "")];

        let results = scanner.scan_exact(MemoryValue::I32(1), &regions);
        assert_eq!(results.len(), 5);

        memory.fail_at(Address::new(0x7014));
        let refined = scanner.refine(results.clone(), MemoryValue::I32(10), 4);
        let addresses: Vec<_> = refined.iter().map(|r| r.address).collect();
        assert_eq!(addresses, vec![Address::new(0x7000), Address::new(0x7020)]);

        let ranged = scanner.refine_range(results, MemoryValue::I32(25), MemoryValue::I32(15), 4);
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].address, Address::new(0x7008));
    }

    #[test]
    fn test_unaligned_chunk_size_keeps_stride() {
        let mut bytes = vec![0u8; 24];
        bytes[12..16].copy_from_slice(&42i32.to_le_bytes());
        let memory = memory_with(0x8000, bytes);

        let scanner = ValueScanner::new(&memory, options(10));
        let results = scanner.scan_exact(MemoryValue::I32(42), &[region(0x8000, 0x8018, "")]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].address, Address::new(0x800C));
    }
}
