//! Buffer geometry and the bounds-checked addressing contract.

use serde::Serialize;

use crate::error::{ClientError, Result};

/// Dimensions of the editor buffer, in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BufferSize {
    pub width: usize,
    pub height: usize,
}

impl BufferSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of cells the buffer holds.
    pub const fn cell_count(self) -> usize {
        self.width * self.height
    }

    /// Row-major cell offset of `(x, y)`.
    ///
    /// No validation is done; the caller supplies coordinates already known to
    /// be inside the buffer.
    pub const fn offset(self, x: usize, y: usize) -> usize {
        y * self.width + x
    }
}

/// A cell position. Not self-validating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coordinate {
    pub x: usize,
    pub y: usize,
}

impl Coordinate {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl From<(usize, usize)> for Coordinate {
    fn from((x, y): (usize, usize)) -> Self {
        Self { x, y }
    }
}

impl From<Coordinate> for (usize, usize) {
    fn from(c: Coordinate) -> Self {
        (c.x, c.y)
    }
}

/// Where the editor keeps its character array, as inferred by the handshake.
///
/// Only ever built from a successful discovery and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferDescriptor {
    base_address: usize,
    bytes_per_char: usize,
    size: BufferSize,
}

impl BufferDescriptor {
    /// # Errors
    /// Returns [`ClientError::InvalidConfiguration`] when `base_address` is zero,
    /// `bytes_per_char` is not 1, 2 or 4, or the buffer would end past the top
    /// of the address space.
    pub fn new(base_address: usize, bytes_per_char: usize, size: BufferSize) -> Result<Self> {
        if base_address == 0 {
            return Err(ClientError::InvalidConfiguration(
                "buffer base address must be non-zero".to_string(),
            ));
        }
        if !matches!(bytes_per_char, 1 | 2 | 4) {
            return Err(ClientError::InvalidConfiguration(format!(
                "unsupported cell width of {bytes_per_char} bytes"
            )));
        }
        let end = size
            .width
            .checked_mul(size.height)
            .and_then(|cells| cells.checked_mul(bytes_per_char))
            .and_then(|capacity| base_address.checked_add(capacity));
        if end.is_none() {
            return Err(ClientError::InvalidConfiguration(format!(
                "a {}x{} buffer at {base_address:#x} runs past the address space",
                size.width, size.height
            )));
        }
        Ok(Self {
            base_address,
            bytes_per_char,
            size,
        })
    }

    pub const fn base_address(&self) -> usize {
        self.base_address
    }

    pub const fn bytes_per_char(&self) -> usize {
        self.bytes_per_char
    }

    pub const fn size(&self) -> BufferSize {
        self.size
    }

    /// Total capacity in bytes.
    pub const fn capacity(&self) -> usize {
        self.size.cell_count() * self.bytes_per_char
    }

    /// Check that `len` bytes fit at cell `offset` and resolve the target address.
    ///
    /// # Errors
    /// Returns [`ClientError::Bounds`] when the access would leave the buffer.
    pub fn plan_access(&self, offset: usize, len: usize) -> Result<WriteRequest> {
        let capacity = self.capacity();
        let byte_offset = offset.checked_mul(self.bytes_per_char);
        let end = byte_offset.and_then(|start| start.checked_add(len));
        let address = byte_offset.and_then(|start| self.base_address.checked_add(start));
        match (byte_offset, end, address) {
            (Some(byte_offset), Some(end), Some(address)) if end <= capacity => {
                Ok(WriteRequest {
                    address,
                    byte_offset,
                    len,
                })
            }
            _ => Err(ClientError::Bounds {
                byte_offset: byte_offset.unwrap_or(usize::MAX),
                len,
                capacity,
            }),
        }
    }
}

/// A validated buffer access. Lives for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    /// Absolute address in the target process.
    pub address: usize,
    pub byte_offset: usize,
    pub len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notepad_descriptor() -> BufferDescriptor {
        BufferDescriptor::new(0x1000, 2, BufferSize::new(131, 30)).unwrap()
    }

    #[test]
    fn test_capacity_of_default_notepad_buffer() {
        assert_eq!(notepad_descriptor().capacity(), 7860);
    }

    #[test]
    fn test_offset_is_row_major() {
        let size = BufferSize::new(131, 30);
        assert_eq!(size.offset(5, 0), 5);
        assert_eq!(size.offset(0, 1), 131);
        assert_eq!(size.offset(130, 29), 3929);
    }

    #[test]
    fn test_write_overrunning_capacity_is_rejected() {
        let err = notepad_descriptor().plan_access(3929, 4).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Bounds {
                byte_offset: 7858,
                len: 4,
                capacity: 7860
            }
        ));
    }

    #[test]
    fn test_write_ending_exactly_at_capacity_is_accepted() {
        let req = notepad_descriptor().plan_access(3928, 4).unwrap();
        assert_eq!(req.byte_offset, 7856);
        assert_eq!(req.address, 0x1000 + 7856);
    }

    #[test]
    fn test_huge_offset_does_not_overflow() {
        let err = notepad_descriptor().plan_access(usize::MAX, 2).unwrap_err();
        assert!(matches!(err, ClientError::Bounds { .. }));
    }

    #[test]
    fn test_descriptor_rejects_bad_cell_width() {
        assert!(BufferDescriptor::new(0x1000, 3, BufferSize::new(1, 1)).is_err());
        assert!(BufferDescriptor::new(0, 2, BufferSize::new(1, 1)).is_err());
    }

    #[test]
    fn test_descriptor_rejects_buffer_past_address_space() {
        let err = BufferDescriptor::new(usize::MAX - 1, 2, BufferSize::new(1, 1)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfiguration(_)));
        assert!(BufferDescriptor::new(0x1000, 4, BufferSize::new(usize::MAX, 2)).is_err());
    }

    #[test]
    fn test_descriptor_at_top_of_address_space_plans_last_cell() {
        let desc = BufferDescriptor::new(usize::MAX - 1, 1, BufferSize::new(1, 1)).unwrap();
        let req = desc.plan_access(0, 1).unwrap();
        assert_eq!(req.address, usize::MAX - 1);
        assert!(matches!(
            desc.plan_access(1, 0),
            Ok(WriteRequest { byte_offset: 1, .. })
        ));
        assert!(matches!(desc.plan_access(1, 1), Err(ClientError::Bounds { .. })));
    }

    #[test]
    fn test_coordinate_converts_from_tuple() {
        let c: Coordinate = (4, 2).into();
        assert_eq!(c, Coordinate::new(4, 2));
        assert_eq!(<(usize, usize)>::from(c), (4, 2));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn offset_matches_row_major_formula(
                width in 1..200usize,
                height in 1..100usize,
                seed_x in 0..10_000usize,
                seed_y in 0..10_000usize,
            ) {
                let size = BufferSize::new(width, height);
                let (x, y) = (seed_x % width, seed_y % height);
                let offset = size.offset(x, y);
                prop_assert_eq!(offset, y * width + x);
                prop_assert!(offset < size.cell_count());
            }

            #[test]
            fn access_rejected_iff_past_capacity(
                width in 1..200usize,
                height in 1..50usize,
                bpc in prop::sample::select(vec![1usize, 2, 4]),
                offset in 0..20_000usize,
                len in 0..64usize,
            ) {
                let desc = BufferDescriptor::new(0x10_0000, bpc, BufferSize::new(width, height)).unwrap();
                let fits = offset * bpc + len <= width * height * bpc;
                match desc.plan_access(offset, len) {
                    Ok(req) => {
                        prop_assert!(fits);
                        prop_assert_eq!(req.address, 0x10_0000 + offset * bpc);
                    }
                    Err(ClientError::Bounds { .. }) => prop_assert!(!fits),
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
            }
        }
    }
}
