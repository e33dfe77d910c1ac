//! Benchmarks for marker scanning.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use notepad_gui::encoding::TextEncoding;
use notepad_gui::platform::fake::{FakePlatform, FakeProcess};
use notepad_gui::platform::{Protection, RegionState};
use notepad_gui::scanner::{find_pattern, scan};

const REGION_SIZE: usize = 4 << 20;

fn marker_bytes() -> Vec<u8> {
    let marker: String = (0..131 * 30)
        .map(|i| char::from(b'A' + (i % 26) as u8))
        .collect();
    TextEncoding::Utf16Le.encode(&marker)
}

fn bench_find_pattern_tail(c: &mut Criterion) {
    let needle = marker_bytes();
    let mut haystack = vec![0u8; REGION_SIZE];
    let start = REGION_SIZE - needle.len();
    haystack[start..].copy_from_slice(&needle);
    c.bench_function("find_pattern_tail", |b| {
        b.iter(|| find_pattern(black_box(&haystack), black_box(&needle)))
    });
}

fn bench_scan_regions(c: &mut Criterion) {
    let needle = marker_bytes();
    let mut heap = vec![0u8; REGION_SIZE];
    heap[0x1000..0x1000 + needle.len()].copy_from_slice(&needle);
    let host = FakePlatform::new()
        .with_region(0x10_0000, REGION_SIZE, RegionState::Committed, Protection::READONLY)
        .with_region_bytes(0x100_0000, heap, RegionState::Committed, Protection::READWRITE);
    let process = FakeProcess { pid: 1 };
    c.bench_function("scan_regions", |b| {
        b.iter(|| scan(&host, &process, black_box(&needle)))
    });
}

criterion_group!(benches, bench_find_pattern_tail, bench_scan_regions);
criterion_main!(benches);
