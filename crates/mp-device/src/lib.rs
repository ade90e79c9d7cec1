#![forbid(unsafe_code)]

//! Data-parallel accelerator runtime.
//!
//! A [`Device`] owns a dedicated worker pool and a memory tracker. Buffers
//! live in pitched device memory ([`DeviceMat`]) and every operation blocks
//! until its kernel has finished, so results are materialized on return.

mod arithm;
mod layout;
mod linalg;
mod memory;
mod reduce;

use std::sync::Arc;

use mp_core::CoreError;
use mp_dtype::MatType;
use mp_mat::{Mat, MatError, Size};
use rayon::prelude::*;

pub use memory::{DeviceMat, PITCH_ALIGN};

use memory::MemoryTracker;

pub const DEVICE_REASON_CODES: [&str; 4] = [
    "device_core_contract_violation",
    "device_mat_contract_violation",
    "device_out_of_memory",
    "device_pool_unavailable",
];

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    Core(CoreError),
    Mat(MatError),
    OutOfMemory {
        requested: usize,
        live: usize,
        limit: usize,
    },
    Pool(String),
}

impl DeviceError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Core(_) => "device_core_contract_violation",
            Self::Mat(_) => "device_mat_contract_violation",
            Self::OutOfMemory { .. } => "device_out_of_memory",
            Self::Pool(_) => "device_pool_unavailable",
        }
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core(err) => write!(f, "{err}"),
            Self::Mat(err) => write!(f, "matrix error: {err}"),
            Self::OutOfMemory {
                requested,
                live,
                limit,
            } => write!(
                f,
                "device allocation of {requested} bytes failed ({live} of {limit} bytes in use)"
            ),
            Self::Pool(msg) => write!(f, "device worker pool unavailable: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<CoreError> for DeviceError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<MatError> for DeviceError {
    fn from(err: MatError) -> Self {
        Self::Mat(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    /// Worker threads; `0` uses one per available core.
    pub threads: usize,
    /// Upper bound on live device bytes, unlimited when `None`.
    pub memory_limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    pub threads: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
    pub allocations: u64,
}

#[derive(Clone)]
pub struct Device {
    pool: Arc<rayon::ThreadPool>,
    memory: Arc<MemoryTracker>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("threads", &self.pool.current_num_threads())
            .field("memory", &self.memory)
            .finish()
    }
}

impl Device {
    pub fn new(config: DeviceConfig) -> Result<Self, DeviceError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|idx| format!("mp-device-{idx}"))
            .build()
            .map_err(|err| DeviceError::Pool(err.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
            memory: Arc::new(MemoryTracker::new(config.memory_limit)),
        })
    }

    pub fn default_device() -> Result<Self, DeviceError> {
        Self::new(DeviceConfig::default())
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    #[must_use]
    pub fn stats(&self) -> DeviceStats {
        let (live_bytes, peak_bytes, allocations) = self.memory.snapshot();
        DeviceStats {
            threads: self.threads(),
            live_bytes,
            peak_bytes,
            allocations,
        }
    }

    /// Zero-filled device buffer.
    pub fn alloc(&self, size: Size, mat_type: MatType) -> Result<DeviceMat, DeviceError> {
        DeviceMat::allocate(&self.memory, size, mat_type)
    }

    /// Copies a host matrix into a fresh device buffer.
    pub fn upload(&self, host: &Mat) -> Result<DeviceMat, DeviceError> {
        let mut dst = self.alloc(host.size(), host.mat_type())?;
        let row_len = host.row_len();
        self.for_each_row(&mut dst, |r, row| {
            row.copy_from_slice(&host.data()[r * row_len..(r + 1) * row_len]);
        });
        Ok(dst)
    }

    /// Copies a device buffer back into host memory.
    pub fn download(&self, src: &DeviceMat) -> Result<Mat, DeviceError> {
        let mut data = Vec::with_capacity(src.len());
        for r in 0..src.rows() {
            data.extend_from_slice(src.row(r));
        }
        Ok(Mat::new(src.size(), src.mat_type(), data)?)
    }

    /// Runs `kernel(row_index, row_values)` over every row of `dst` on the pool.
    ///
    /// Padding past the row length is never handed to the kernel.
    pub(crate) fn for_each_row<F>(&self, dst: &mut DeviceMat, kernel: F)
    where
        F: Fn(usize, &mut [f64]) + Send + Sync,
    {
        let row_len = dst.row_len();
        let pitch = dst.pitch();
        let rows = dst.rows();
        let storage = dst.storage_mut();
        self.pool.install(|| {
            storage
                .par_chunks_mut(pitch)
                .take(rows)
                .enumerate()
                .for_each(|(r, row)| kernel(r, &mut row[..row_len]));
        });
    }

    /// Maps every row of `src` to a partial result, returned in row order.
    pub(crate) fn row_partials<T, F>(&self, src: &DeviceMat, kernel: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize, &[f64]) -> T + Send + Sync,
    {
        self.pool.install(|| {
            (0..src.rows())
                .into_par_iter()
                .map(|r| kernel(r, src.row(r)))
                .collect()
        })
    }
}

pub(crate) fn check_same_layout(op: &'static str, lhs: &DeviceMat, rhs: &DeviceMat) -> Result<(), DeviceError> {
    if lhs.size() != rhs.size() || lhs.mat_type() != rhs.mat_type() {
        return Err(CoreError::ShapeMismatch {
            op,
            detail: format!(
                "{} {} vs {} {}",
                lhs.size(),
                lhs.mat_type(),
                rhs.size(),
                rhs.mat_type()
            ),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn check_integer(op: &'static str, mat: &DeviceMat) -> Result<(), DeviceError> {
    let depth = mat.mat_type().depth();
    if depth.is_integer() {
        Ok(())
    } else {
        Err(CoreError::UnsupportedDepth { op, depth }.into())
    }
}

pub(crate) fn check_float(op: &'static str, mat: &DeviceMat) -> Result<(), DeviceError> {
    let depth = mat.mat_type().depth();
    if depth.is_float() {
        Ok(())
    } else {
        Err(CoreError::UnsupportedDepth { op, depth }.into())
    }
}

pub(crate) fn check_channels(op: &'static str, mat: &DeviceMat, channels: usize) -> Result<(), DeviceError> {
    if mat.channels() == channels {
        Ok(())
    } else {
        Err(CoreError::UnsupportedChannels {
            op,
            channels: mat.channels(),
        }
        .into())
    }
}

pub(crate) fn check_non_empty(op: &'static str, mat: &DeviceMat) -> Result<(), DeviceError> {
    if mat.is_empty() {
        Err(CoreError::EmptyInput { op }.into())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DEVICE_REASON_CODES, Device, DeviceConfig, DeviceError};
    use mp_dtype::{Depth, MatType};
    use mp_mat::{Mat, Size};

    #[test]
    fn upload_download_round_trip() {
        let device = Device::new(DeviceConfig {
            threads: 2,
            memory_limit: None,
        })
        .expect("device");
        let ty = MatType::new(Depth::S16, 3).expect("type");
        let host = Mat::from_fn(Size::new(7, 5), ty, |i| i as f64 - 50.0).expect("host");
        let dev = device.upload(&host).expect("upload");
        assert!(dev.pitch() >= host.row_len());
        assert_eq!(device.download(&dev).expect("download"), host);
        assert_eq!(device.threads(), 2);
    }

    #[test]
    fn memory_is_tracked_and_released() {
        let device = Device::default_device().expect("device");
        let ty = MatType::single(Depth::F32);
        {
            let _a = device.alloc(Size::new(16, 16), ty).expect("a");
            let stats = device.stats();
            assert!(stats.live_bytes > 0);
            assert_eq!(stats.allocations, 1);
        }
        let stats = device.stats();
        assert_eq!(stats.live_bytes, 0);
        assert!(stats.peak_bytes > 0);
    }

    #[test]
    fn allocation_limit_is_enforced() {
        let device = Device::new(DeviceConfig {
            threads: 1,
            memory_limit: Some(1024),
        })
        .expect("device");
        let err = device
            .alloc(Size::new(640, 480), MatType::single(Depth::U8))
            .expect_err("over limit");
        assert!(matches!(err, DeviceError::OutOfMemory { limit: 1024, .. }));
        assert!(DEVICE_REASON_CODES.contains(&err.reason_code()));
    }
}
