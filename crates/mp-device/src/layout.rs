use mp_core::{CoreError, FlipCode};
use mp_dtype::{Depth, MAX_CHANNELS, MatType};
use mp_mat::{Mat, Size};

use crate::{Device, DeviceError, DeviceMat};

impl Device {
    pub fn merge(&self, planes: &[&DeviceMat]) -> Result<DeviceMat, DeviceError> {
        let Some(first) = planes.first() else {
            return Err(CoreError::EmptyInput { op: "merge" }.into());
        };
        let depth = first.mat_type().depth();
        let mut total = 0usize;
        for plane in planes {
            if plane.size() != first.size() || plane.mat_type().depth() != depth {
                return Err(CoreError::ShapeMismatch {
                    op: "merge",
                    detail: format!(
                        "{} {} vs {} {}",
                        first.size(),
                        first.mat_type(),
                        plane.size(),
                        plane.mat_type()
                    ),
                }
                .into());
            }
            total += plane.channels();
        }
        if total > MAX_CHANNELS {
            return Err(CoreError::UnsupportedChannels {
                op: "merge",
                channels: total,
            }
            .into());
        }
        let dst_type = MatType::new(depth, total).map_err(CoreError::from)?;
        let mut dst = self.alloc(first.size(), dst_type)?;
        self.for_each_row(&mut dst, |r, row| {
            let mut offset = 0;
            for plane in planes {
                let cn = plane.channels();
                for (c, px) in plane.row(r).chunks_exact(cn).enumerate() {
                    let at = c * total + offset;
                    row[at..at + cn].copy_from_slice(px);
                }
                offset += cn;
            }
        });
        Ok(dst)
    }

    pub fn split(&self, src: &DeviceMat) -> Result<Vec<DeviceMat>, DeviceError> {
        let cn = src.channels();
        let plane_type = MatType::single(src.mat_type().depth());
        let mut planes = Vec::with_capacity(cn);
        for ch in 0..cn {
            let mut plane = self.alloc(src.size(), plane_type)?;
            self.for_each_row(&mut plane, |r, row| {
                for (out, &v) in row.iter_mut().zip(src.row(r).iter().skip(ch).step_by(cn)) {
                    *out = v;
                }
            });
            planes.push(plane);
        }
        Ok(planes)
    }

    pub fn transpose(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        let cn = src.channels();
        let mut dst = self.alloc(src.size().transposed(), src.mat_type())?;
        // dst row r is src column r
        self.for_each_row(&mut dst, |r, row| {
            for (c, px) in row.chunks_exact_mut(cn).enumerate() {
                let src_row = src.row(c);
                px.copy_from_slice(&src_row[r * cn..(r + 1) * cn]);
            }
        });
        Ok(dst)
    }

    pub fn flip(&self, src: &DeviceMat, code: FlipCode) -> Result<DeviceMat, DeviceError> {
        let rows = src.rows();
        let cols = src.cols();
        let cn = src.channels();
        let flip_rows = matches!(code, FlipCode::Both | FlipCode::X);
        let flip_cols = matches!(code, FlipCode::Both | FlipCode::Y);
        let mut dst = self.alloc(src.size(), src.mat_type())?;
        self.for_each_row(&mut dst, |r, row| {
            let src_row = src.row(if flip_rows { rows - 1 - r } else { r });
            for (c, px) in row.chunks_exact_mut(cn).enumerate() {
                let sc = if flip_cols { cols - 1 - c } else { c };
                px.copy_from_slice(&src_row[sc * cn..(sc + 1) * cn]);
            }
        });
        Ok(dst)
    }

    /// Table lookup with a host-resident 256-entry table.
    pub fn lut(&self, src: &DeviceMat, table: &Mat) -> Result<DeviceMat, DeviceError> {
        let depth = src.mat_type().depth();
        if depth != Depth::U8 {
            return Err(CoreError::UnsupportedDepth { op: "lut", depth }.into());
        }
        if table.size() != Size::new(256, 1) {
            return Err(CoreError::InvalidArgument {
                op: "lut",
                detail: format!("table must be 256x1, got {}", table.size()),
            }
            .into());
        }
        let cn = src.channels();
        let table_cn = table.channels();
        if table_cn != 1 && table_cn != cn {
            return Err(CoreError::UnsupportedChannels {
                op: "lut",
                channels: table_cn,
            }
            .into());
        }
        let entries = table.data();
        let mut dst = self.alloc(src.size(), src.mat_type().with_depth(table.depth()))?;
        self.for_each_row(&mut dst, |r, row| {
            for (i, (out, &v)) in row.iter_mut().zip(src.row(r)).enumerate() {
                let ch = if table_cn == 1 { 0 } else { i % cn };
                *out = entries[v as usize * table_cn + ch];
            }
        });
        Ok(dst)
    }
}
