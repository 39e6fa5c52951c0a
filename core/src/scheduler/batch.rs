//! Fixed-capacity, DMA-aligned staging buffer for one batch

use bytemuck::{Pod, Zeroable};
use splatstorm_shared::PackedSplat;
use splatstorm_shared::constants::DMA_ALIGNMENT;

use super::SchedulerError;

const SPLATS_PER_BLOCK: usize = DMA_ALIGNMENT / std::mem::size_of::<PackedSplat>();

/// One DMA-aligned unit of storage
#[derive(Clone, Copy, Debug)]
#[repr(C, align(128))]
struct DmaBlock([PackedSplat; SPLATS_PER_BLOCK]);

// SAFETY: DmaBlock is #[repr(C)] around an array of Pod splats whose total size
// equals its alignment (checked below), so it has no padding bytes.
unsafe impl Zeroable for DmaBlock {}
unsafe impl Pod for DmaBlock {}

const _: () = assert!(std::mem::size_of::<DmaBlock>() == DMA_ALIGNMENT);
const _: () = assert!(std::mem::align_of::<DmaBlock>() == DMA_ALIGNMENT);

/// Reusable batch buffer.
///
/// Storage is allocated once in [`BatchBuffer::new`]; filling a batch only
/// copies. `max_batch_size` never exceeds the capacity.
#[derive(Debug)]
pub struct BatchBuffer {
    blocks: Vec<DmaBlock>,
    capacity: usize,
    max_batch_size: usize,
}

impl BatchBuffer {
    pub fn new(capacity: usize) -> Result<Self, SchedulerError> {
        let block_count = capacity.div_ceil(SPLATS_PER_BLOCK);
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(block_count)
            .map_err(|_| SchedulerError::BatchAlloc { capacity })?;
        blocks.resize(block_count, DmaBlock::zeroed());

        Ok(Self {
            blocks,
            capacity,
            max_batch_size: capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Clamped to `1..=capacity`. Returns the value actually stored.
    pub fn set_max_batch_size(&mut self, size: usize) -> usize {
        self.max_batch_size = size.clamp(1, self.capacity.max(1));
        self.max_batch_size
    }

    fn splats_mut(&mut self) -> &mut [PackedSplat] {
        let all: &mut [PackedSplat] = bytemuck::cast_slice_mut(&mut self.blocks);
        &mut all[..self.capacity]
    }

    /// Copy `src` into the buffer and return the filled prefix.
    ///
    /// At most `capacity` splats are copied.
    pub fn fill(&mut self, src: &[PackedSplat]) -> &mut [PackedSplat] {
        debug_assert!(src.len() <= self.capacity);
        let len = src.len().min(self.capacity);
        let dst = &mut self.splats_mut()[..len];
        dst.copy_from_slice(&src[..len]);
        dst
    }

    /// Start of the storage, for alignment checks by upload paths
    pub fn as_ptr(&self) -> *const PackedSplat {
        self.blocks.as_ptr().cast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splatstorm_shared::Splat;

    #[test]
    fn test_buffer_is_dma_aligned() {
        let buffer = BatchBuffer::new(256).unwrap();
        assert_eq!(buffer.as_ptr() as usize % DMA_ALIGNMENT, 0);
        assert_eq!(buffer.capacity(), 256);
        assert_eq!(buffer.max_batch_size(), 256);
    }

    #[test]
    fn test_odd_capacity() {
        let mut buffer = BatchBuffer::new(3).unwrap();
        let src = vec![PackedSplat::default(); 3];
        assert_eq!(buffer.fill(&src).len(), 3);
    }

    #[test]
    fn test_fill_copies_without_touching_source() {
        let src: Vec<PackedSplat> = (0..10)
            .map(|i| {
                PackedSplat::from_splat(&Splat {
                    position: [i as f32, 0.0, 0.0],
                    ..Default::default()
                })
            })
            .collect();
        let mut buffer = BatchBuffer::new(16).unwrap();
        let ptr = buffer.as_ptr();

        let batch = buffer.fill(&src[4..]);
        assert_eq!(batch.len(), 6);
        assert_eq!(batch[0].position[0], 4.0);
        batch[0].position[0] = -1.0;
        assert_eq!(src[4].position[0], 4.0);

        // Same storage every time
        buffer.fill(&src[..2]);
        assert_eq!(buffer.as_ptr(), ptr);
    }

    #[test]
    fn test_max_batch_size_is_clamped() {
        let mut buffer = BatchBuffer::new(128).unwrap();
        assert_eq!(buffer.set_max_batch_size(512), 128);
        assert_eq!(buffer.set_max_batch_size(0), 1);
        assert_eq!(buffer.set_max_batch_size(64), 64);
    }
}
