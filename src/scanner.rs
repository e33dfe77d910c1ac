//! Byte-pattern search over a process's committed read-write memory.

use tracing::debug;

use crate::platform::{MemoryRegion, Platform};

/// Index of the first occurrence of `needle` in `haystack`.
///
/// An empty needle matches at index 0.
pub fn find_pattern(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Walks a process address space one region at a time, in ascending order.
///
/// Enumeration ends when the host stops answering region queries, when a
/// region reports zero size, or at the top of the address space.
pub struct Regions<'a, P: Platform> {
    platform: &'a P,
    process: &'a P::Process,
    cursor: Option<usize>,
}

impl<'a, P: Platform> Regions<'a, P> {
    pub const fn new(platform: &'a P, process: &'a P::Process) -> Self {
        Self {
            platform,
            process,
            cursor: Some(0),
        }
    }
}

impl<P: Platform> Iterator for Regions<'_, P> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        let address = self.cursor?;
        let Some(region) = self.platform.query_region(self.process, address) else {
            self.cursor = None;
            return None;
        };
        self.cursor = region.end().filter(|&end| region.size > 0 && end > address);
        Some(region)
    }
}

/// Absolute address of the first match of `pattern` in the target process.
///
/// Only committed regions with plain read-write protection are read. A region
/// whose read fails is skipped and the scan goes on; scanning stops at the
/// first match.
pub fn scan<P: Platform>(platform: &P, process: &P::Process, pattern: &[u8]) -> Option<usize> {
    let mut inspected = 0usize;
    for region in Regions::new(platform, process) {
        if !region.is_scannable() {
            debug!(base = region.base, size = region.size, "skipping region");
            continue;
        }
        inspected += 1;
        let contents = match platform.read_memory(process, region.base, region.size) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(base = region.base, size = region.size, error = %err, "region read failed, skipping");
                continue;
            }
        };
        if let Some(offset) = find_pattern(&contents, pattern) {
            let address = region.base + offset;
            debug!(address, inspected, "pattern found");
            return Some(address);
        }
    }
    debug!(inspected, pattern_len = pattern.len(), "pattern not found");
    None
}
