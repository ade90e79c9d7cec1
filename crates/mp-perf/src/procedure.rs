//! The one comparison routine every catalogue entry goes through.
//!
//! Host runs time the host closure and record an explicit "unchecked"
//! verdict. Device runs upload the inputs outside the cycle, time the device
//! closure, download its outputs and verify each against the reference
//! store.

use mp_core::CoreError;
use mp_device::{Device, DeviceError, DeviceMat};
use mp_mat::{Mat, Point, Scalar};

use crate::case::{CaseContext, CaseError, ExecPath};
use crate::sanity::{SanityValue, Tolerance};

/// Named output and the tolerance it is verified with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Check<'a> {
    pub arg: &'a str,
    pub tolerance: Tolerance,
}

#[must_use]
pub const fn check(arg: &str, tolerance: Tolerance) -> Check<'_> {
    Check { arg, tolerance }
}

/// Device results that can be brought back to the host for verification.
pub trait DeviceOutput {
    fn download(&self, device: &Device) -> Result<Vec<SanityValue>, DeviceError>;
}

impl DeviceOutput for DeviceMat {
    fn download(&self, device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        Ok(vec![SanityValue::Mat(device.download(self)?)])
    }
}

impl DeviceOutput for Vec<DeviceMat> {
    fn download(&self, device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        self.iter()
            .map(|mat| device.download(mat).map(SanityValue::Mat))
            .collect()
    }
}

impl DeviceOutput for (DeviceMat, DeviceMat) {
    fn download(&self, device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        Ok(vec![
            SanityValue::Mat(device.download(&self.0)?),
            SanityValue::Mat(device.download(&self.1)?),
        ])
    }
}

impl DeviceOutput for Scalar {
    fn download(&self, _device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        Ok(vec![(*self).into()])
    }
}

impl DeviceOutput for (Scalar, Scalar) {
    fn download(&self, _device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        Ok(vec![self.0.into(), self.1.into()])
    }
}

impl DeviceOutput for f64 {
    fn download(&self, _device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        Ok(vec![(*self).into()])
    }
}

impl DeviceOutput for usize {
    fn download(&self, _device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        Ok(vec![(*self as f64).into()])
    }
}

/// `(min, max)` as two outputs.
impl DeviceOutput for (f64, f64) {
    fn download(&self, _device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        Ok(vec![self.0.into(), self.1.into()])
    }
}

/// `(min, max, min_loc, max_loc)` as four outputs; locations are `[x, y]`.
impl DeviceOutput for (f64, f64, Point, Point) {
    fn download(&self, _device: &Device) -> Result<Vec<SanityValue>, DeviceError> {
        let (min, max, min_loc, max_loc) = *self;
        Ok(vec![min.into(), max.into(), min_loc.into(), max_loc.into()])
    }
}

/// Runs one parameterized comparison on whichever path the case selected.
pub fn run_comparison<HO, DO, H, D>(
    ctx: &mut CaseContext<'_>,
    inputs: &[&Mat],
    host: H,
    device: D,
    checks: &[Check<'_>],
) -> Result<(), CaseError>
where
    H: FnMut() -> Result<HO, CoreError>,
    D: FnMut(&Device, &[DeviceMat]) -> Result<DO, DeviceError>,
    DO: DeviceOutput,
{
    match ctx.path() {
        ExecPath::Host => {
            ctx.cycle(host)?;
            ctx.sanity_check_nothing();
            Ok(())
        }
        ExecPath::Device => run_on_device(ctx, inputs, device, checks),
    }
}

/// Like [`run_comparison`] for operations the host library lacks.
pub fn run_device_only<DO, D>(
    ctx: &mut CaseContext<'_>,
    inputs: &[&Mat],
    device: D,
    checks: &[Check<'_>],
) -> Result<(), CaseError>
where
    D: FnMut(&Device, &[DeviceMat]) -> Result<DO, DeviceError>,
    DO: DeviceOutput,
{
    ctx.no_host_equivalent()?;
    run_on_device(ctx, inputs, device, checks)
}

fn run_on_device<DO, D>(
    ctx: &mut CaseContext<'_>,
    inputs: &[&Mat],
    mut device: D,
    checks: &[Check<'_>],
) -> Result<(), CaseError>
where
    D: FnMut(&Device, &[DeviceMat]) -> Result<DO, DeviceError>,
    DO: DeviceOutput,
{
    let dev = ctx.device()?;
    let uploaded = inputs
        .iter()
        .map(|mat| dev.upload(mat))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| CaseError::setup("upload failed", err))?;

    let output = ctx.cycle(|| device(dev, &uploaded))?;
    let values = output
        .download(dev)
        .map_err(|err| CaseError::Operation(format!("download failed: {err}")))?;
    if checks.len() > values.len() {
        return Err(CaseError::Setup(format!(
            "{} checks declared for {} outputs",
            checks.len(),
            values.len()
        )));
    }
    for (check, value) in checks.iter().zip(&values) {
        ctx.sanity_check(check.arg, value, check.tolerance)?;
    }
    Ok(())
}
