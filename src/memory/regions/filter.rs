//! Region classification and the dangerous-region denylist

use super::enumerator::MemoryRegion;
use crate::core::types::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name fragments of mappings that crash or flag the target when touched:
/// GPU driver memory, fonts, the zygote image, system libraries and
/// compiled dex code.
pub const DANGEROUS_PATTERNS: [&str; 9] = [
    "kgsl",
    "mali",
    "fonts",
    "app_process",
    "system/lib",
    "system/framework",
    "[guard]",
    ".dex",
    ".oat",
];

/// Whether a region name matches the denylist
pub fn is_dangerous(name: &str) -> bool {
    DANGEROUS_PATTERNS.iter().any(|pattern| name.contains(pattern))
}

/// Search range a scan is limited to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RegionCategory {
    /// Every region outside the denylist
    #[default]
    #[serde(rename = "ALL")]
    All,
    /// GPU (`kgsl-3d0`) mappings
    #[serde(rename = "B_BAD")]
    BBad,
    #[serde(rename = "C_ALLOC")]
    CAlloc,
    #[serde(rename = "C_BSS")]
    CBss,
    #[serde(rename = "C_DATA")]
    CData,
    #[serde(rename = "C_HEAP")]
    CHeap,
    /// Ashmem that is not part of the ART heap
    #[serde(rename = "JAVA_HEAP")]
    JavaHeap,
    /// Mappings with no backing name
    #[serde(rename = "A_ANON")]
    AAnonymous,
    #[serde(rename = "CODE_SYSTEM")]
    CodeSystem,
    #[serde(rename = "STACK")]
    Stack,
    #[serde(rename = "ASHMEM")]
    Ashmem,
}

impl RegionCategory {
    /// All categories, in selector order
    pub const ALL: [RegionCategory; 11] = [
        RegionCategory::All,
        RegionCategory::BBad,
        RegionCategory::CAlloc,
        RegionCategory::CBss,
        RegionCategory::CData,
        RegionCategory::CHeap,
        RegionCategory::JavaHeap,
        RegionCategory::AAnonymous,
        RegionCategory::CodeSystem,
        RegionCategory::Stack,
        RegionCategory::Ashmem,
    ];

    /// Selector label
    pub const fn label(&self) -> &'static str {
        match self {
            RegionCategory::All => "ALL",
            RegionCategory::BBad => "B_BAD",
            RegionCategory::CAlloc => "C_ALLOC",
            RegionCategory::CBss => "C_BSS",
            RegionCategory::CData => "C_DATA",
            RegionCategory::CHeap => "C_HEAP",
            RegionCategory::JavaHeap => "JAVA_HEAP",
            RegionCategory::AAnonymous => "A_ANON",
            RegionCategory::CodeSystem => "CODE_SYSTEM",
            RegionCategory::Stack => "STACK",
            RegionCategory::Ashmem => "ASHMEM",
        }
    }

    /// Looks a category up by its selector index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether a region with this name belongs to the category.
    ///
    /// Only `All` consults the denylist; the other categories are plain
    /// substring tests and may include dangerous regions unless safe mode
    /// filters them out.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            RegionCategory::All => !is_dangerous(name),
            RegionCategory::BBad => name.contains("kgsl-3d0"),
            RegionCategory::CAlloc => name.contains("[anon:libc_malloc]"),
            RegionCategory::CBss => name.contains("[anon:.bss]"),
            RegionCategory::CData => name.contains("/data/app/"),
            RegionCategory::CHeap => name.contains("[heap]"),
            RegionCategory::JavaHeap => name.contains("/dev/ashmem/") && !name.contains("dalvik"),
            RegionCategory::AAnonymous => name.is_empty(),
            RegionCategory::CodeSystem => name.contains("/system"),
            RegionCategory::Stack => name.contains("[stack]"),
            RegionCategory::Ashmem => name.contains("/dev/ashmem/"),
        }
    }

    /// The first specific category that matches `name`, or `All`.
    ///
    /// Used for display only; filtering always goes through [`matches`](Self::matches).
    pub fn classify(name: &str) -> Self {
        const PRECEDENCE: [RegionCategory; 10] = [
            RegionCategory::BBad,
            RegionCategory::CAlloc,
            RegionCategory::CBss,
            RegionCategory::CHeap,
            RegionCategory::Stack,
            RegionCategory::JavaHeap,
            RegionCategory::Ashmem,
            RegionCategory::CData,
            RegionCategory::CodeSystem,
            RegionCategory::AAnonymous,
        ];
        PRECEDENCE
            .into_iter()
            .find(|category| category.matches(name))
            .unwrap_or(RegionCategory::All)
    }
}

impl fmt::Display for RegionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for RegionCategory {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MemoryError::InvalidCategory(s.to_string()))
    }
}

/// Keeps the read-write regions of `category`, in map order.
///
/// With `safe_mode` set, denylisted regions are dropped from every category.
pub fn filter_regions<I>(regions: I, category: RegionCategory, safe_mode: bool) -> Vec<MemoryRegion>
where
    I: IntoIterator<Item = MemoryRegion>,
{
    regions
        .into_iter()
        .filter(|region| region.permissions.is_read_write())
        .filter(|region| !(safe_mode && region.is_dangerous()))
        .filter(|region| category.matches(&region.name))
        .collect()
}
