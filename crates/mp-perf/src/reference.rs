//! Reference artifacts: the recorded outputs device runs are verified against.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::case::CaseError;
use crate::sanity::{SanityValue, Tolerance, check_layout, check_value};

pub const REFERENCE_SCHEMA_VERSION: u8 = 2;

/// Outputs with more elements than this are stored packed.
pub const FULL_STORE_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Compare against stored artifacts; a missing artifact fails the case.
    Verify,
    /// Record current outputs, replacing stored ones.
    Write,
    /// Measure only.
    Off,
}

impl ReferenceMode {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Write => "write",
            Self::Off => "off",
        }
    }

    pub fn parse(token: &str) -> Result<Self, String> {
        match token.trim().to_ascii_lowercase().as_str() {
            "verify" => Ok(Self::Verify),
            "write" => Ok(Self::Write),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown reference mode '{other}' (expected verify|write|off)")),
        }
    }
}

impl std::fmt::Display for ReferenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `f64` that survives JSON: non-finite values are written as `"nan"`,
/// `"inf"` and `"-inf"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredValue(pub f64);

impl Serialize for StoredValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if v.is_nan() {
            serializer.serialize_str("nan")
        } else if v == f64::INFINITY {
            serializer.serialize_str("inf")
        } else if v == f64::NEG_INFINITY {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_f64(v)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRepr {
    Num(f64),
    Token(String),
}

impl<'de> Deserialize<'de> for StoredValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StoredRepr::deserialize(deserializer)? {
            StoredRepr::Num(v) => Ok(Self(v)),
            StoredRepr::Token(token) => match token.as_str() {
                "nan" => Ok(Self(f64::NAN)),
                "inf" => Ok(Self(f64::INFINITY)),
                "-inf" => Ok(Self(f64::NEG_INFINITY)),
                other => Err(serde::de::Error::custom(format!(
                    "invalid stored value '{other}'"
                ))),
            },
        }
    }
}

/// Element width of a packed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackedWidth {
    F32,
    F64,
}

impl PackedWidth {
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Narrowest width that holds every value exactly.
    #[must_use]
    pub fn fitting(values: &[f64]) -> Self {
        let exact = values
            .iter()
            .all(|&v| v.is_nan() || f64::from(v as f32) == v);
        if exact { Self::F32 } else { Self::F64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferencePayload {
    Full {
        values: Vec<StoredValue>,
    },
    /// Every element as little-endian bytes, base64 encoded.
    Packed {
        len: usize,
        width: PackedWidth,
        data_b64: String,
    },
}

impl ReferencePayload {
    #[must_use]
    pub fn capture(value: &SanityValue) -> Self {
        let values = value.values();
        if values.len() <= FULL_STORE_LIMIT {
            return Self::Full {
                values: values.iter().copied().map(StoredValue).collect(),
            };
        }
        let width = PackedWidth::fitting(values);
        let mut bytes = Vec::with_capacity(values.len() * width.bytes());
        for &v in values {
            match width {
                PackedWidth::F32 => bytes.extend_from_slice(&(v as f32).to_le_bytes()),
                PackedWidth::F64 => bytes.extend_from_slice(&v.to_le_bytes()),
            }
        }
        Self::Packed {
            len: values.len(),
            width,
            data_b64: BASE64.encode(bytes),
        }
    }

    /// Number of elements the payload holds.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Full { values } => values.len(),
            Self::Packed { len, .. } => *len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes every stored element.
    pub fn values(&self) -> Result<Vec<f64>, String> {
        match self {
            Self::Full { values } => Ok(values.iter().map(|v| v.0).collect()),
            Self::Packed {
                len,
                width,
                data_b64,
            } => {
                let bytes = BASE64
                    .decode(data_b64)
                    .map_err(|err| format!("base64 decode failed: {err}"))?;
                if bytes.len() != len * width.bytes() {
                    return Err(format!(
                        "packed payload holds {} bytes, expected {} for {len} values",
                        bytes.len(),
                        len * width.bytes()
                    ));
                }
                let values = match width {
                    PackedWidth::F32 => bytes
                        .chunks_exact(4)
                        .map(|c| f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                        .collect(),
                    PackedWidth::F64 => bytes
                        .chunks_exact(8)
                        .map(|c| {
                            f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                        })
                        .collect(),
                };
                Ok(values)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceArtifact {
    pub layout: String,
    pub payload: ReferencePayload,
    pub sha256: String,
}

impl ReferenceArtifact {
    pub fn capture(value: &SanityValue) -> Result<Self, String> {
        let layout = value.layout();
        let payload = ReferencePayload::capture(value);
        let sha256 = payload_digest(&layout, &payload)?;
        Ok(Self {
            layout,
            payload,
            sha256,
        })
    }

    pub fn verify_digest(&self) -> Result<(), String> {
        let digest = payload_digest(&self.layout, &self.payload)?;
        if digest == self.sha256 {
            Ok(())
        } else {
            Err(format!(
                "digest mismatch: recorded {} computed {digest}",
                self.sha256
            ))
        }
    }

    /// Checks `actual` against this artifact: layout first, then every
    /// element.
    pub fn compare(
        &self,
        arg: &str,
        actual: &SanityValue,
        tolerance: Tolerance,
    ) -> Result<(), CaseError> {
        check_layout(arg, &self.layout, actual)?;
        let values = actual.values();
        let expected = self
            .payload
            .values()
            .map_err(|err| CaseError::Reference(format!("artifact for '{arg}': {err}")))?;
        if expected.len() != values.len() {
            return Err(CaseError::Reference(format!(
                "artifact for '{arg}' holds {} values, output has {}",
                expected.len(),
                values.len()
            )));
        }
        for (flat, (&e, &a)) in expected.iter().zip(values).enumerate() {
            check_value(arg, || actual.describe_index(flat), e, a, tolerance)?;
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

fn payload_digest(layout: &str, payload: &ReferencePayload) -> Result<String, String> {
    let raw = serde_json::to_string(payload)
        .map_err(|err| format!("failed serializing reference payload: {err}"))?;
    let mut bytes = Vec::with_capacity(layout.len() + 1 + raw.len());
    bytes.extend_from_slice(layout.as_bytes());
    bytes.push(b'\n');
    bytes.extend_from_slice(raw.as_bytes());
    Ok(sha256_hex(&bytes))
}

/// On-disk layout of one suite's references: instance, then argument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub schema_version: u8,
    pub suite: String,
    pub instances: BTreeMap<String, BTreeMap<String, ReferenceArtifact>>,
}

#[derive(Debug)]
pub struct ReferenceStore {
    path: PathBuf,
    mode: ReferenceMode,
    file: ReferenceFile,
    dirty: bool,
}

impl ReferenceStore {
    #[must_use]
    pub fn suite_path(root: &Path, suite: &str) -> PathBuf {
        root.join(format!("{suite}.json"))
    }

    /// Loads `<root>/<suite>.json` when it exists, verifying every digest.
    pub fn open(root: &Path, suite: &str, mode: ReferenceMode) -> Result<Self, String> {
        let path = Self::suite_path(root, suite);
        let file = if mode != ReferenceMode::Off && path.is_file() {
            let raw = fs::read_to_string(&path)
                .map_err(|err| format!("failed reading {}: {err}", path.display()))?;
            let file: ReferenceFile = serde_json::from_str(&raw)
                .map_err(|err| format!("invalid reference file {}: {err}", path.display()))?;
            if file.schema_version != REFERENCE_SCHEMA_VERSION {
                return Err(format!(
                    "reference file {} has schema_version {}, expected {REFERENCE_SCHEMA_VERSION}",
                    path.display(),
                    file.schema_version
                ));
            }
            for (instance, args) in &file.instances {
                for (arg, artifact) in args {
                    artifact.verify_digest().map_err(|err| {
                        format!("corrupted reference {instance} '{arg}' in {}: {err}", path.display())
                    })?;
                }
            }
            file
        } else {
            ReferenceFile {
                schema_version: REFERENCE_SCHEMA_VERSION,
                suite: suite.to_string(),
                instances: BTreeMap::new(),
            }
        };
        Ok(Self {
            path,
            mode,
            file,
            dirty: false,
        })
    }

    #[must_use]
    pub const fn mode(&self) -> ReferenceMode {
        self.mode
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn artifact(&self, instance: &str, arg: &str) -> Option<&ReferenceArtifact> {
        self.file.instances.get(instance).and_then(|args| args.get(arg))
    }

    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.file.instances.values().map(BTreeMap::len).sum()
    }

    /// Verifies, records or ignores one output depending on the mode.
    pub fn check(
        &mut self,
        instance: &str,
        arg: &str,
        value: &SanityValue,
        tolerance: Tolerance,
    ) -> Result<(), CaseError> {
        match self.mode {
            ReferenceMode::Off => Ok(()),
            ReferenceMode::Write => {
                let artifact = ReferenceArtifact::capture(value).map_err(CaseError::Reference)?;
                self.file
                    .instances
                    .entry(instance.to_string())
                    .or_default()
                    .insert(arg.to_string(), artifact);
                self.dirty = true;
                Ok(())
            }
            ReferenceMode::Verify => match self.artifact(instance, arg) {
                Some(artifact) => artifact.compare(arg, value, tolerance),
                None => Err(CaseError::Reference(format!(
                    "no reference recorded for {instance} argument '{arg}'"
                ))),
            },
        }
    }

    /// Writes the file back when this run recorded anything.
    pub fn save(&mut self) -> Result<bool, String> {
        if !self.dirty {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&self.file)
            .map_err(|err| format!("failed serializing references: {err}"))?;
        fs::write(&self.path, raw)
            .map_err(|err| format!("failed writing {}: {err}", self.path.display()))?;
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FULL_STORE_LIMIT, PackedWidth, ReferenceArtifact, ReferenceMode, ReferencePayload,
        ReferenceStore, StoredValue,
    };
    use crate::case::CaseError;
    use crate::sanity::{SanityFailure, SanityValue, Tolerance};
    use mp_dtype::{Depth, MatType};
    use mp_mat::{Mat, Size};
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!("mp_{name}_{ts}"))
    }

    fn ramp(width: usize, height: usize) -> SanityValue {
        let mat = Mat::from_fn(Size::new(width, height), MatType::single(Depth::F32), |i| i as f64)
            .expect("mat");
        SanityValue::Mat(mat)
    }

    #[test]
    fn non_finite_values_round_trip_through_json() {
        let values = vec![
            StoredValue(1.5),
            StoredValue(f64::NAN),
            StoredValue(f64::INFINITY),
            StoredValue(f64::NEG_INFINITY),
        ];
        let raw = serde_json::to_string(&values).expect("serialize");
        assert_eq!(raw, r#"[1.5,"nan","inf","-inf"]"#);
        let back: Vec<StoredValue> = serde_json::from_str(&raw).expect("parse");
        assert!((back[0].0 - 1.5).abs() < f64::EPSILON);
        assert!(back[1].0.is_nan());
        assert_eq!(back[2].0, f64::INFINITY);
        assert!(serde_json::from_str::<StoredValue>(r#""bogus""#).is_err());
    }

    fn with_values(value: &SanityValue, edit: impl FnOnce(&mut [f64])) -> SanityValue {
        let SanityValue::Mat(mat) = value else {
            panic!("expected a matrix");
        };
        let mut data = mat.data().to_vec();
        edit(&mut data);
        SanityValue::Mat(mat.with_data(data).expect("data"))
    }

    #[test]
    fn large_outputs_are_packed_in_full() {
        let value = ramp(100, 50);
        assert!(value.len() > FULL_STORE_LIMIT);
        let artifact = ReferenceArtifact::capture(&value).expect("capture");
        assert!(matches!(
            artifact.payload,
            ReferencePayload::Packed {
                len: 5000,
                width: PackedWidth::F32,
                ..
            }
        ));
        let stored = artifact.payload.values().expect("decode");
        assert_eq!(stored.len(), 5000);
        assert_eq!(stored.as_slice(), value.values());
        artifact
            .compare("dst", &value, Tolerance::default())
            .expect("self comparison");
    }

    #[test]
    fn interior_corruption_of_a_large_output_is_caught() {
        let value = ramp(100, 50);
        let artifact = ReferenceArtifact::capture(&value).expect("capture");
        let broken = with_values(&value, |data| {
            for v in &mut data[1..60] {
                *v = 100.0;
            }
        });
        let err = artifact
            .compare("dst", &broken, Tolerance::absolute(1e-10))
            .expect_err("corrupted interior");
        assert!(matches!(err, CaseError::Mismatch(SanityFailure::Value { .. })));

        let single = with_values(&value, |data| data[2345] += 0.5);
        assert!(matches!(
            artifact.compare("dst", &single, Tolerance::absolute(1e-10)),
            Err(CaseError::Mismatch(SanityFailure::Value { .. }))
        ));
    }

    #[test]
    fn values_outside_f32_are_packed_wide() {
        assert_eq!(PackedWidth::fitting(&[0.5, 255.0, f64::NAN, f64::INFINITY]), PackedWidth::F32);
        assert_eq!(PackedWidth::fitting(&[0.1]), PackedWidth::F64);

        let mat = Mat::from_fn(Size::new(100, 50), MatType::single(Depth::F64), |i| i as f64 / 3.0)
            .expect("mat");
        let value = SanityValue::Mat(mat);
        let artifact = ReferenceArtifact::capture(&value).expect("capture");
        assert!(matches!(
            artifact.payload,
            ReferencePayload::Packed {
                width: PackedWidth::F64,
                ..
            }
        ));
        artifact
            .compare("dst", &value, Tolerance::absolute(1e-15))
            .expect("exact round trip");
    }

    #[test]
    fn truncated_packed_payload_is_a_reference_error() {
        let mut artifact = ReferenceArtifact::capture(&ramp(100, 50)).expect("capture");
        if let ReferencePayload::Packed { len, .. } = &mut artifact.payload {
            *len += 1;
        }
        assert!(artifact.verify_digest().is_err());
        assert!(matches!(
            artifact.compare("dst", &ramp(100, 50), Tolerance::default()),
            Err(CaseError::Reference(_))
        ));
    }

    #[test]
    fn write_then_verify_through_disk() {
        let root = temp_dir("refs");
        let value = ramp(8, 4);

        let mut writer = ReferenceStore::open(&root, "core", ReferenceMode::Write).expect("open");
        writer
            .check("Core_AddMat::(8x4, 32F)", "dst", &value, Tolerance::default())
            .expect("record");
        assert!(writer.save().expect("save"));

        let mut verifier = ReferenceStore::open(&root, "core", ReferenceMode::Verify).expect("open");
        assert_eq!(verifier.artifact_count(), 1);
        verifier
            .check("Core_AddMat::(8x4, 32F)", "dst", &value, Tolerance::default())
            .expect("verify");
        let missing = verifier
            .check("Core_AddMat::(8x4, 8U)", "dst", &value, Tolerance::default())
            .expect_err("missing");
        assert!(missing.to_string().contains("no reference recorded"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn corrupted_artifact_is_rejected_on_load() {
        let root = temp_dir("refs_corrupt");
        let mut writer = ReferenceStore::open(&root, "core", ReferenceMode::Write).expect("open");
        writer
            .check("case", "dst", &SanityValue::Scalars(vec![1.0, 2.0]), Tolerance::default())
            .expect("record");
        writer.save().expect("save");

        let path = ReferenceStore::suite_path(&root, "core");
        let raw = fs::read_to_string(&path).expect("read");
        fs::write(&path, raw.replacen("2.0", "3.0", 1)).expect("tamper");
        let err = ReferenceStore::open(&root, "core", ReferenceMode::Verify).expect_err("corrupt");
        assert!(err.contains("digest mismatch"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn off_mode_never_touches_disk() {
        let root = temp_dir("refs_off");
        let mut store = ReferenceStore::open(&root, "core", ReferenceMode::Off).expect("open");
        store
            .check("case", "dst", &SanityValue::Scalars(vec![1.0]), Tolerance::default())
            .expect("off");
        assert!(!store.save().expect("save"));
        assert!(!root.exists());
    }

    #[test]
    fn mode_tokens() {
        assert_eq!(ReferenceMode::parse("WRITE").expect("mode"), ReferenceMode::Write);
        assert!(ReferenceMode::parse("maybe").is_err());
    }
}
