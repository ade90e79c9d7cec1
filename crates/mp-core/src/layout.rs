//! Channel packing, transposition, mirroring and table lookup.

use mp_dtype::{Depth, MAX_CHANNELS, MatType};
use mp_mat::{Mat, Size};

use crate::{CoreError, require_non_empty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlipCode {
    /// Around both axes (code `0` rotates by 180 degrees).
    Both,
    /// Around the x axis: rows are reversed.
    X,
    /// Around the y axis: columns are reversed.
    Y,
}

impl FlipCode {
    pub const ALL: [Self; 3] = [Self::Both, Self::X, Self::Y];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Both => "FLIP_BOTH",
            Self::X => "FLIP_X",
            Self::Y => "FLIP_Y",
        }
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Both => -1,
            Self::X => 0,
            Self::Y => 1,
        }
    }

    const fn flips_rows(self) -> bool {
        matches!(self, Self::Both | Self::X)
    }

    const fn flips_cols(self) -> bool {
        matches!(self, Self::Both | Self::Y)
    }
}

impl std::fmt::Display for FlipCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Interleaves the channels of `planes` into one matrix.
pub fn merge(planes: &[Mat]) -> Result<Mat, CoreError> {
    let Some(first) = planes.first() else {
        return Err(CoreError::EmptyInput { op: "merge" });
    };
    let size = first.size();
    let depth = first.depth();
    let mut total = 0usize;
    for plane in planes {
        if plane.size() != size || plane.depth() != depth {
            return Err(CoreError::ShapeMismatch {
                op: "merge",
                detail: format!(
                    "{} {} vs {} {}",
                    size,
                    first.mat_type(),
                    plane.size(),
                    plane.mat_type()
                ),
            });
        }
        total += plane.channels();
    }
    if total > MAX_CHANNELS {
        return Err(CoreError::UnsupportedChannels {
            op: "merge",
            channels: total,
        });
    }
    let dst_type = MatType::new(depth, total)?;
    let pixels = size.area()?;
    let mut data = Vec::with_capacity(pixels * total);
    for px in 0..pixels {
        for plane in planes {
            let cn = plane.channels();
            data.extend_from_slice(&plane.data()[px * cn..(px + 1) * cn]);
        }
    }
    Ok(Mat::new(size, dst_type, data)?)
}

/// One single-channel matrix per source channel.
pub fn split(src: &Mat) -> Result<Vec<Mat>, CoreError> {
    let cn = src.channels();
    let plane_type = MatType::single(src.depth());
    (0..cn)
        .map(|ch| {
            let data = src.data().iter().skip(ch).step_by(cn).copied().collect();
            Mat::new(src.size(), plane_type, data).map_err(CoreError::from)
        })
        .collect()
}

pub fn transpose(src: &Mat) -> Result<Mat, CoreError> {
    let rows = src.rows();
    let cols = src.cols();
    let cn = src.channels();
    let mut data = vec![0.0; src.len()];
    for r in 0..rows {
        let row = src.row(r);
        for c in 0..cols {
            let dst = (c * rows + r) * cn;
            data[dst..dst + cn].copy_from_slice(&row[c * cn..(c + 1) * cn]);
        }
    }
    Ok(Mat::new(src.size().transposed(), src.mat_type(), data)?)
}

pub fn flip(src: &Mat, code: FlipCode) -> Result<Mat, CoreError> {
    let rows = src.rows();
    let cols = src.cols();
    let cn = src.channels();
    let mut data = Vec::with_capacity(src.len());
    for r in 0..rows {
        let src_row = if code.flips_rows() { rows - 1 - r } else { r };
        let row = src.row(src_row);
        for c in 0..cols {
            let src_col = if code.flips_cols() { cols - 1 - c } else { c };
            data.extend_from_slice(&row[src_col * cn..(src_col + 1) * cn]);
        }
    }
    Ok(src.with_data(data)?)
}

/// Maps every `8U` element through a 256-entry table.
///
/// A single-channel table applies to all channels; otherwise the table must
/// carry one channel per source channel. The result takes the table depth.
pub fn lut(src: &Mat, table: &Mat) -> Result<Mat, CoreError> {
    if src.depth() != Depth::U8 {
        return Err(CoreError::UnsupportedDepth {
            op: "lut",
            depth: src.depth(),
        });
    }
    require_non_empty("lut", table)?;
    if table.size() != Size::new(256, 1) {
        return Err(CoreError::InvalidArgument {
            op: "lut",
            detail: format!("table must be 256x1, got {}", table.size()),
        });
    }
    let cn = src.channels();
    let table_cn = table.channels();
    if table_cn != 1 && table_cn != cn {
        return Err(CoreError::UnsupportedChannels {
            op: "lut",
            channels: table_cn,
        });
    }
    let entries = table.data();
    let data = src
        .data()
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let idx = v as usize;
            let ch = if table_cn == 1 { 0 } else { i % cn };
            entries[idx * table_cn + ch]
        })
        .collect();
    Ok(Mat::new(
        src.size(),
        src.mat_type().with_depth(table.depth()),
        data,
    )?)
}

#[cfg(test)]
mod tests {
    use super::{FlipCode, flip, lut, merge, split, transpose};
    use crate::CoreError;
    use mp_dtype::{Depth, MatType};
    use mp_mat::{Mat, Size};

    fn grid(rows: usize, cols: usize, cn: usize) -> Mat {
        let ty = MatType::new(Depth::S32, cn).expect("type");
        Mat::from_fn(Size::new(cols, rows), ty, |i| i as f64).expect("mat")
    }

    #[test]
    fn merge_then_split_restores_planes() {
        let a = grid(2, 3, 1);
        let b = a.with_data(a.data().iter().map(|v| v + 100.0).collect()).expect("b");
        let merged = merge(&[a.clone(), b.clone()]).expect("merge");
        assert_eq!(merged.channels(), 2);
        assert_eq!(&merged.data()[..4], &[0.0, 100.0, 1.0, 101.0]);
        let planes = split(&merged).expect("split");
        assert_eq!(planes, vec![a, b]);
    }

    #[test]
    fn merge_rejects_mismatch_and_overflow() {
        let a = grid(2, 2, 1);
        let b = grid(2, 3, 1);
        assert!(matches!(
            merge(&[a.clone(), b]),
            Err(CoreError::ShapeMismatch { .. })
        ));
        let wide = grid(2, 2, 4);
        assert!(matches!(
            merge(&[wide, a]),
            Err(CoreError::UnsupportedChannels { channels: 5, .. })
        ));
        assert!(matches!(merge(&[]), Err(CoreError::EmptyInput { .. })));
    }

    #[test]
    fn transpose_swaps_axes_and_keeps_channels() {
        let src = grid(2, 3, 2);
        let out = transpose(&src).expect("transpose");
        assert_eq!(out.size(), Size::new(2, 3));
        for r in 0..2 {
            for c in 0..3 {
                for ch in 0..2 {
                    assert_eq!(
                        out.at(c, r, ch).expect("dst"),
                        src.at(r, c, ch).expect("src")
                    );
                }
            }
        }
    }

    #[test]
    fn flip_codes() {
        let src = grid(2, 2, 1);
        assert_eq!(flip(&src, FlipCode::X).expect("x").data(), &[2.0, 3.0, 0.0, 1.0]);
        assert_eq!(flip(&src, FlipCode::Y).expect("y").data(), &[1.0, 0.0, 3.0, 2.0]);
        assert_eq!(flip(&src, FlipCode::Both).expect("both").data(), &[3.0, 2.0, 1.0, 0.0]);
        assert_eq!(FlipCode::Both.code(), -1);
    }

    #[test]
    fn lut_maps_through_table() {
        let table = Mat::from_fn(Size::new(256, 1), MatType::single(Depth::U8), |i| {
            255.0 - i as f64
        })
        .expect("table");
        let src = Mat::new(
            Size::new(3, 1),
            MatType::single(Depth::U8),
            vec![0.0, 10.0, 255.0],
        )
        .expect("src");
        assert_eq!(lut(&src, &table).expect("lut").data(), &[255.0, 245.0, 0.0]);

        let multi = Mat::from_fn(Size::new(256, 1), MatType::new(Depth::U8, 3).expect("type"), |i| {
            (i % 3) as f64
        })
        .expect("table3");
        let src3 = Mat::zeros(Size::new(1, 1), MatType::new(Depth::U8, 3).expect("type")).expect("src3");
        assert_eq!(lut(&src3, &multi).expect("lut3").data(), &[0.0, 1.0, 2.0]);

        let wrong = Mat::zeros(Size::new(1, 1), MatType::single(Depth::F32)).expect("f32");
        assert!(matches!(
            lut(&wrong, &table),
            Err(CoreError::UnsupportedDepth { op: "lut", .. })
        ));
    }
}
