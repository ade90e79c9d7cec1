use mp_core::gemm::{GemmPlan, Operand};
use mp_core::GemmFlags;

use crate::{Device, DeviceError, DeviceMat};

fn pitched(mat: &DeviceMat) -> impl Fn(usize, usize, usize) -> f64 + Sync + '_ {
    move |row, col, ch| mat.value(row, col, ch)
}

impl Device {
    /// `alpha * op(a) * op(b) + beta * op(c)`, one output row per task.
    pub fn gemm(
        &self,
        a: &DeviceMat,
        b: &DeviceMat,
        alpha: f64,
        c: Option<&DeviceMat>,
        beta: f64,
        flags: GemmFlags,
    ) -> Result<DeviceMat, DeviceError> {
        let plan = GemmPlan::new(
            (a.size(), a.mat_type()),
            (b.size(), b.mat_type()),
            c.map(|m| (m.size(), m.mat_type())),
            alpha,
            beta,
            flags,
        )?;
        let mut dst = self.alloc(plan.output_size(), plan.output_type())?;
        let a_at = pitched(a);
        let b_at = pitched(b);
        let c_at = c.map(pitched);
        self.for_each_row(&mut dst, |r, row| {
            plan.compute_row(r, &a_at, &b_at, c_at.as_ref().map(|f| f as Operand<'_>), row);
        });
        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Device, DeviceConfig};
    use mp_core::{GemmFlags, gemm};
    use mp_dtype::{Depth, MatType};
    use mp_mat::{Mat, Size};
    use mp_random::{DeterministicRng, FillPolicy, fill_mat};

    fn random(size: Size, ty: MatType, seed: u64) -> Mat {
        let mut rng = DeterministicRng::new(seed);
        let mut mat = Mat::zeros(size, ty).expect("mat");
        fill_mat(&mut rng, &mut mat, FillPolicy::Warmup).expect("fill");
        mat
    }

    #[test]
    fn gemm_matches_host_for_every_measured_flag() {
        let device = Device::new(DeviceConfig {
            threads: 4,
            memory_limit: None,
        })
        .expect("device");
        for ty in [
            MatType::single(Depth::F32),
            MatType::new(Depth::F32, 2).expect("complex"),
            MatType::single(Depth::F64),
        ] {
            let size = Size::new(9, 9);
            let a = random(size, ty, 1);
            let b = random(size, ty, 2);
            let c = random(size, ty, 3);
            let (da, db, dc) = (
                device.upload(&a).expect("a"),
                device.upload(&b).expect("b"),
                device.upload(&c).expect("c"),
            );
            for flags in GemmFlags::MEASURED {
                let got = device
                    .gemm(&da, &db, 1.0, Some(&dc), 1.0, flags)
                    .expect("device gemm");
                let host = gemm::gemm(&a, &b, 1.0, Some(&c), 1.0, flags).expect("host gemm");
                assert_eq!(device.download(&got).expect("dl"), host, "{ty} {flags}");
            }
        }
    }

    #[test]
    fn rectangular_shapes() {
        let device = Device::default_device().expect("device");
        let ty = MatType::single(Depth::F64);
        let a = random(Size::new(5, 3), ty, 4);
        let b = random(Size::new(3, 5), ty, 5);
        let da = device.upload(&a).expect("a");
        let db = device.upload(&b).expect("b");
        let got = device.gemm(&da, &db, 0.5, None, 0.0, GemmFlags::NONE).expect("gemm");
        assert_eq!(got.size(), Size::new(3, 3));
        let host = gemm::gemm(&a, &b, 0.5, None, 0.0, GemmFlags::NONE).expect("host");
        assert_eq!(device.download(&got).expect("dl"), host);
        assert!(device.gemm(&da, &da, 1.0, None, 0.0, GemmFlags::NONE).is_err());
    }
}
