use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use mp_dtype::MatType;
use mp_mat::{Size, element_count};

use crate::DeviceError;

/// Row pitches are rounded up to a multiple of this many values.
pub const PITCH_ALIGN: usize = 32;

#[derive(Debug)]
pub(crate) struct MemoryTracker {
    limit: Option<usize>,
    live: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicU64,
}

impl MemoryTracker {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
        }
    }

    fn reserve(&self, bytes: usize) -> Result<(), DeviceError> {
        let limit = self.limit.unwrap_or(usize::MAX);
        let previous = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                live.checked_add(bytes).filter(|&total| total <= limit)
            })
            .map_err(|live| DeviceError::OutOfMemory {
                requested: bytes,
                live,
                limit,
            })?;
        self.peak.fetch_max(previous + bytes, Ordering::AcqRel);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self, bytes: usize) {
        self.live.fetch_sub(bytes, Ordering::AcqRel);
    }

    pub(crate) fn snapshot(&self) -> (usize, usize, u64) {
        (
            self.live.load(Ordering::Acquire),
            self.peak.load(Ordering::Acquire),
            self.allocations.load(Ordering::Relaxed),
        )
    }
}

/// Matrix resident in device memory, stored as pitched rows.
///
/// Owned by exactly one case; the memory is returned to the device on drop.
#[derive(Debug)]
pub struct DeviceMat {
    size: Size,
    mat_type: MatType,
    pitch: usize,
    storage: Vec<f64>,
    bytes: usize,
    tracker: Arc<MemoryTracker>,
}

impl DeviceMat {
    pub(crate) fn allocate(
        tracker: &Arc<MemoryTracker>,
        size: Size,
        mat_type: MatType,
    ) -> Result<Self, DeviceError> {
        // validates the element count before any pitch arithmetic
        element_count(size, mat_type)?;
        let row_len = size.width * mat_type.channels();
        let pitch = row_len.max(1).div_ceil(PITCH_ALIGN) * PITCH_ALIGN;
        let values = pitch
            .checked_mul(size.height)
            .ok_or(mp_mat::MatError::Overflow)?;
        let bytes = values
            .checked_mul(mat_type.depth().item_size())
            .ok_or(mp_mat::MatError::Overflow)?;
        tracker.reserve(bytes)?;
        Ok(Self {
            size,
            mat_type,
            pitch,
            storage: vec![0.0; values],
            bytes,
            tracker: Arc::clone(tracker),
        })
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    #[must_use]
    pub const fn mat_type(&self) -> MatType {
        self.mat_type
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.size.height
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.size.width
    }

    #[must_use]
    pub const fn channels(&self) -> usize {
        self.mat_type.channels()
    }

    /// Values per stored row, padding included.
    #[must_use]
    pub const fn pitch(&self) -> usize {
        self.pitch
    }

    /// Values per logical row (`cols * channels`).
    #[must_use]
    pub const fn row_len(&self) -> usize {
        self.size.width * self.mat_type.channels()
    }

    /// Logical element count, padding excluded.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.row_len() * self.size.height
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes reserved on the device for this buffer.
    #[must_use]
    pub const fn device_bytes(&self) -> usize {
        self.bytes
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.pitch;
        &self.storage[start..start + self.row_len()]
    }

    /// Value at `(row, col, channel)`; indices must be in bounds.
    #[must_use]
    pub fn value(&self, row: usize, col: usize, channel: usize) -> f64 {
        self.storage[row * self.pitch + col * self.channels() + channel]
    }

    pub(crate) fn storage_mut(&mut self) -> &mut Vec<f64> {
        &mut self.storage
    }
}

impl Drop for DeviceMat {
    fn drop(&mut self) {
        self.tracker.release(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceMat, MemoryTracker, PITCH_ALIGN};
    use crate::DeviceError;
    use mp_dtype::{Depth, MatType};
    use mp_mat::Size;
    use std::sync::Arc;

    #[test]
    fn pitch_is_aligned() {
        let tracker = Arc::new(MemoryTracker::new(None));
        let ty = MatType::new(Depth::U8, 3).expect("type");
        let mat = DeviceMat::allocate(&tracker, Size::new(11, 4), ty).expect("alloc");
        assert_eq!(mat.row_len(), 33);
        assert_eq!(mat.pitch(), 2 * PITCH_ALIGN);
        assert_eq!(mat.device_bytes(), 2 * PITCH_ALIGN * 4);
        assert_eq!(mat.len(), 132);
        assert_eq!(mat.row(3).len(), 33);
    }

    #[test]
    fn empty_matrices_still_get_a_pitch() {
        let tracker = Arc::new(MemoryTracker::new(None));
        let mat = DeviceMat::allocate(&tracker, Size::new(0, 3), MatType::single(Depth::F64))
            .expect("alloc");
        assert_eq!(mat.pitch(), PITCH_ALIGN);
        assert!(mat.is_empty());
    }

    #[test]
    fn tracker_counts_peak() {
        let tracker = Arc::new(MemoryTracker::new(Some(4096)));
        let ty = MatType::single(Depth::U8);
        let a = DeviceMat::allocate(&tracker, Size::new(32, 32), ty).expect("a");
        let b = DeviceMat::allocate(&tracker, Size::new(32, 64), ty).expect("b");
        assert!(matches!(
            DeviceMat::allocate(&tracker, Size::new(32, 64), ty),
            Err(DeviceError::OutOfMemory { .. })
        ));
        drop(a);
        drop(b);
        assert_eq!(tracker.snapshot(), (0, 3072, 2));
    }
}
