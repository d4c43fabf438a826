//! # Circuit Artifact Registry
//!
//! Every published Circom registration circuit with the release that ships
//! its proving artifacts. A full circuit name (see [`crate::naming`])
//! resolves to a download URL here; a name that was never published cannot
//! be proven.

use serde::Serialize;

use crate::error::ZkpError;

/// Base location of circuit releases.
pub const ARTIFACT_BASE_URL: &str =
    "https://storage.googleapis.com/rarimo-store/passport-zk-circuits";

/// Noir registration circuit for national eID cards.
pub const NOIR_EID_CIRCUIT: &str = "registerIdentity_inid_ca";

/// A published circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub name: &'static str,
    pub version: &'static str,
}

impl ArtifactEntry {
    const fn new(name: &'static str, version: &'static str) -> Self {
        Self { name, version }
    }

    /// `<base>/<version>/<name>-download.zip`
    pub fn download_url(&self) -> String {
        format!("{ARTIFACT_BASE_URL}/{}/{}-download.zip", self.version, self.name)
    }
}

const ARTIFACTS: &[ArtifactEntry] = &[
    ArtifactEntry::new("registerIdentity_1_256_3_5_576_248_NA", "v0.2.0"),
    ArtifactEntry::new("registerIdentity_1_256_3_6_576_248_1_2432_5_296", "v0.2.0"),
    ArtifactEntry::new("registerIdentity_2_256_3_6_336_264_21_2448_6_2008", "v0.2.0"),
    ArtifactEntry::new("registerIdentity_21_256_3_7_336_264_21_3072_6_2008", "v0.2.0"),
    ArtifactEntry::new("registerIdentity_1_256_3_6_576_264_1_2448_3_256", "v0.2.1"),
    ArtifactEntry::new("registerIdentity_2_256_3_6_336_248_1_2432_3_256", "v0.2.1"),
    ArtifactEntry::new("registerIdentity_2_256_3_6_576_248_1_2432_3_256", "v0.2.1"),
    ArtifactEntry::new("registerIdentity_11_256_3_3_576_248_1_1184_5_264", "v0.2.2"),
    ArtifactEntry::new("registerIdentity_12_256_3_3_336_232_NA", "v0.2.2"),
    ArtifactEntry::new("registerIdentity_1_256_3_4_336_232_1_1480_5_296", "v0.2.2"),
    ArtifactEntry::new("registerIdentity_1_256_3_4_600_248_1_1496_3_256", "v0.2.8"),
    ArtifactEntry::new("registerIdentity_1_160_3_4_576_200_NA", "v0.2.3"),
    ArtifactEntry::new("registerIdentity_21_256_3_3_336_232_NA", "v0.2.3"),
    ArtifactEntry::new("registerIdentity_24_256_3_4_336_232_NA", "v0.2.3"),
    ArtifactEntry::new("registerIdentity_20_256_3_3_336_224_NA", "v0.2.4"),
    ArtifactEntry::new("registerIdentity_1_256_3_3_576_248_NA", "v0.2.4"),
    ArtifactEntry::new("registerIdentity_1_160_3_3_576_200_NA", "v0.2.4"),
    ArtifactEntry::new("registerIdentity_10_256_3_3_576_248_1_1184_5_264", "v0.2.5"),
    ArtifactEntry::new("registerIdentity_11_256_3_5_576_248_1_1808_4_256", "v0.2.5"),
    ArtifactEntry::new("registerIdentity_21_256_3_3_576_232_NA", "v0.2.5"),
    ArtifactEntry::new("registerIdentity_3_160_3_3_336_200_NA", "v0.2.7-fix"),
    ArtifactEntry::new("registerIdentity_3_160_3_4_576_216_1_1512_3_256", "v0.2.7-fix"),
    ArtifactEntry::new("registerIdentity_2_256_3_6_336_264_1_2448_3_256", "v0.2.7-fix"),
    ArtifactEntry::new("registerIdentity_21_256_3_4_576_232_NA", "v0.2.8"),
    ArtifactEntry::new("registerIdentity_11_256_3_3_576_240_1_864_5_264", "v0.2.8"),
    ArtifactEntry::new("registerIdentity_11_256_3_5_576_248_1_1808_5_296", "v0.2.9"),
    ArtifactEntry::new("registerIdentity_11_256_3_3_336_248_NA", "v0.2.10"),
    ArtifactEntry::new("registerIdentity_14_256_3_4_336_64_1_1480_5_296", "v0.2.10"),
    ArtifactEntry::new("registerIdentity_21_256_3_5_576_232_NA", "v0.2.10"),
    ArtifactEntry::new("registerIdentity_1_256_3_6_336_560_1_2744_4_256", "v0.2.11"),
    ArtifactEntry::new("registerIdentity_1_256_3_6_336_248_1_2744_4_256", "v0.2.11"),
    ArtifactEntry::new("registerIdentity_20_256_3_5_336_72_NA", "v0.2.11"),
    ArtifactEntry::new("registerIdentity_4_160_3_3_336_216_1_1296_3_256", "v0.2.12"),
    ArtifactEntry::new("registerIdentity_15_512_3_3_336_248_NA", "v0.2.12"),
    ArtifactEntry::new("registerIdentity_20_160_3_3_736_200_NA", "v0.2.12"),
    ArtifactEntry::new("registerIdentityLight160", "v0.2.6-light"),
    ArtifactEntry::new("registerIdentityLight224", "v0.2.6-light"),
    ArtifactEntry::new("registerIdentityLight256", "v0.2.6-light"),
    ArtifactEntry::new("registerIdentityLight384", "v0.2.6-light"),
    ArtifactEntry::new("registerIdentityLight512", "v0.2.6-light"),
];

/// All published circuits.
pub fn artifacts() -> &'static [ArtifactEntry] {
    ARTIFACTS
}

pub fn lookup(name: &str) -> Option<&'static ArtifactEntry> {
    ARTIFACTS.iter().find(|a| a.name == name)
}

/// Download URL for `name`, or `CircuitNotFound`.
pub fn resolve(name: &str) -> Result<String, ZkpError> {
    lookup(name)
        .map(ArtifactEntry::download_url)
        .ok_or_else(|| ZkpError::CircuitNotFound(name.to_string()))
}
