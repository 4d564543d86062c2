//! Memory map parsing

use super::filter::{is_dangerous, RegionCategory};
use super::protection::Permissions;
use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One mapping of the target's address space.
///
/// `end` is exclusive and always greater than `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub start: Address,
    pub end: Address,
    pub permissions: Permissions,
    pub offset: u64,
    pub device: String,
    pub inode: u64,
    /// Backing path or pseudo-name such as `[heap]`; empty for anonymous maps
    pub name: String,
}

impl MemoryRegion {
    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    pub fn is_dangerous(&self) -> bool {
        is_dangerous(&self.name)
    }

    /// The most specific category the name falls into
    pub fn category(&self) -> RegionCategory {
        RegionCategory::classify(&self.name)
    }
}

/// Splits the next whitespace-delimited column off `rest`
fn next_column<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let trimmed = rest.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let (column, tail) = trimmed.split_at(end);
    *rest = tail;
    Some(column)
}

/// Parses one line of a memory map:
/// `start-end perms offset dev inode [name]`.
///
/// The name is everything after the inode column, so paths with spaces
/// survive intact.
pub fn parse_line(line: &str) -> MemoryResult<MemoryRegion> {
    let malformed = || MemoryError::MalformedMapLine(line.to_string());
    let mut rest = line;

    let range = next_column(&mut rest).ok_or_else(malformed)?;
    let permissions = next_column(&mut rest).ok_or_else(malformed)?;
    let offset = next_column(&mut rest).ok_or_else(malformed)?;
    let device = next_column(&mut rest).ok_or_else(malformed)?;
    let inode = next_column(&mut rest).ok_or_else(malformed)?;

    let (start, end) = range.split_once('-').ok_or_else(malformed)?;
    let start = u64::from_str_radix(start, 16).map_err(|_| malformed())?;
    let end = u64::from_str_radix(end, 16).map_err(|_| malformed())?;
    if start >= end {
        return Err(malformed());
    }

    Ok(MemoryRegion {
        start: Address::new(start),
        end: Address::new(end),
        permissions: permissions.parse().map_err(|_| malformed())?,
        offset: u64::from_str_radix(offset, 16).map_err(|_| malformed())?,
        device: device.to_string(),
        inode: inode.parse().map_err(|_| malformed())?,
        name: rest.trim().to_string(),
    })
}

/// Parses every well-formed line of a map, in file order
pub fn parse_maps(contents: &str) -> Vec<MemoryRegion> {
    contents
        .lines()
        .filter_map(|line| parse_line(line).ok())
        .collect()
}

/// Reads `<proc_root>/<pid>/maps` and parses it
pub fn read_maps(proc_root: &Path, pid: ProcessId) -> MemoryResult<Vec<MemoryRegion>> {
    let contents = fs::read_to_string(proc_root.join(pid.to_string()).join("maps"))?;
    Ok(parse_maps(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_line() {
        let region =
            parse_line("7ff3b23000-7ff3b24000 rw-p 00000000 00:00 0          [anon:libc_malloc]")
                .unwrap();
        assert_eq!(region.start, Address::new(0x7ff3b23000));
        assert_eq!(region.end, Address::new(0x7ff3b24000));
        assert_eq!(region.size(), 0x1000);
        assert!(region.permissions.is_read_write());
        assert_eq!(region.device, "00:00");
        assert_eq!(region.name, "[anon:libc_malloc]");
        assert_eq!(region.category(), RegionCategory::CAlloc);
    }

    #[test]
    fn test_parse_anonymous_line() {
        let region = parse_line("12c00000-12e00000 rw-p 00000000 00:00 0").unwrap();
        assert_eq!(region.name, "");
        assert_eq!(region.inode, 0);
        assert_eq!(region.category(), RegionCategory::AAnonymous);
    }

    #[test]
    fn test_parse_keeps_spaces_in_name() {
        let region = parse_line(
            "70000000-70001000 rw-s 0001a000 fd:04 123456 /data/app/com.example game/base.apk",
        )
        .unwrap();
        assert_eq!(region.offset, 0x1a000);
        assert_eq!(region.inode, 123456);
        assert_eq!(region.name, "/data/app/com.example game/base.apk");
    }

    #[test]
    fn test_malformed_lines() {
        for line in [
            "",
            "garbage",
            "1000 rw-p 0 00:00 0",
            "2000-1000 rw-p 0 00:00 0",
            "1000-2000 rw-p 0 00:00",
            "1000-2000 rwzp 0 00:00 0",
            "zz-2000 rw-p 0 00:00 0",
        ] {
            assert!(parse_line(line).is_err(), "{line:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_maps_skips_bad_lines() {
        let maps = "1000-2000 rw-p 0 00:00 0 [heap]\nnot a line\n3000-4000 r--p 0 00:00 0\n";
        let regions = parse_maps(maps);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].name, "[heap]");
        assert_eq!(regions[1].start, Address::new(0x3000));
    }
}
