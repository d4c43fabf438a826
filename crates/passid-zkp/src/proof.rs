//! # Registration Proofs
//!
//! A registration proof is produced by one of two interchangeable proof
//! systems. [`Proof`] tags which one, so every consumer matches on the
//! system exhaustively instead of probing the payload shape.

use std::fmt;

use num_bigint::BigUint;
use passid_core::digest::serde_hex;
use serde::{Deserialize, Serialize};

use crate::error::ZkpError;

/// Proof system that produced a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofSystem {
    /// Circom circuits proven with Groth16.
    Circom,
    /// Noir circuits (UltraPlonk).
    Noir,
}

impl fmt::Display for ProofSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Circom => "circom",
            Self::Noir => "noir",
        })
    }
}

/// snarkjs-style Groth16 proof with decimal coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

/// Affine Groth16 points as the on-chain verifier takes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Groth16Points {
    pub a: [BigUint; 2],
    pub b: [[BigUint; 2]; 2],
    pub c: [BigUint; 2],
}

fn parse_coord(s: &str) -> Result<BigUint, ZkpError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
        None => BigUint::parse_bytes(s.as_bytes(), 10),
    };
    parsed.ok_or_else(|| ZkpError::MalformedProofPoint(s.to_string()))
}

fn parse_pair(v: &[String], what: &str) -> Result<[BigUint; 2], ZkpError> {
    match v {
        [x, y, ..] => Ok([parse_coord(x)?, parse_coord(y)?]),
        _ => Err(ZkpError::MalformedProofPoint(format!(
            "{what} has {} coordinates",
            v.len()
        ))),
    }
}

impl Groth16Proof {
    /// The `a`, `b`, `c` points. The projective third coordinate that
    /// snarkjs emits is dropped.
    pub fn points(&self) -> Result<Groth16Points, ZkpError> {
        let b = match self.pi_b.as_slice() {
            [b0, b1, ..] => [parse_pair(b0, "pi_b[0]")?, parse_pair(b1, "pi_b[1]")?],
            _ => {
                return Err(ZkpError::MalformedProofPoint(format!(
                    "pi_b has {} rows",
                    self.pi_b.len()
                )))
            }
        };
        Ok(Groth16Points {
            a: parse_pair(&self.pi_a, "pi_a")?,
            b,
            c: parse_pair(&self.pi_c, "pi_c")?,
        })
    }
}

/// A registration proof with its public signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "system", rename_all = "lowercase")]
pub enum Proof {
    Circom {
        proof: Groth16Proof,
        /// Decimal field elements.
        pub_signals: Vec<String>,
    },
    Noir {
        #[serde(with = "serde_hex")]
        proof: Vec<u8>,
        /// `0x`-hex field elements.
        pub_signals: Vec<String>,
    },
}

impl Proof {
    pub fn system(&self) -> ProofSystem {
        match self {
            Self::Circom { .. } => ProofSystem::Circom,
            Self::Noir { .. } => ProofSystem::Noir,
        }
    }

    pub fn public_signals(&self) -> &[String] {
        match self {
            Self::Circom { pub_signals, .. } | Self::Noir { pub_signals, .. } => pub_signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_groth16() -> Groth16Proof {
        Groth16Proof {
            pi_a: vec!["1".into(), "2".into(), "1".into()],
            pi_b: vec![
                vec!["3".into(), "4".into()],
                vec!["5".into(), "6".into()],
                vec!["1".into(), "0".into()],
            ],
            pi_c: vec!["7".into(), "8".into(), "1".into()],
            protocol: Some("groth16".into()),
            curve: Some("bn128".into()),
        }
    }

    #[test]
    fn test_points_drop_projective_coordinate() {
        let pts = sample_groth16().points().unwrap();
        assert_eq!(pts.a, [BigUint::from(1u8), BigUint::from(2u8)]);
        assert_eq!(pts.b[1], [BigUint::from(5u8), BigUint::from(6u8)]);
        assert_eq!(pts.c, [BigUint::from(7u8), BigUint::from(8u8)]);
    }

    #[test]
    fn test_points_reject_garbage() {
        let mut p = sample_groth16();
        p.pi_a = vec!["12x".into(), "1".into()];
        assert!(p.points().is_err());
        let mut p = sample_groth16();
        p.pi_b.truncate(1);
        assert!(p.points().is_err());
    }

    #[test]
    fn test_proof_tag_serialization() {
        let circom = Proof::Circom {
            proof: sample_groth16(),
            pub_signals: vec!["10".into()],
        };
        let json = serde_json::to_value(&circom).unwrap();
        assert_eq!(json["system"], "circom");

        let noir = Proof::Noir {
            proof: vec![0xde, 0xad],
            pub_signals: vec!["0x0a".into()],
        };
        let json = serde_json::to_value(&noir).unwrap();
        assert_eq!(json["system"], "noir");
        assert_eq!(json["proof"], "0xdead");
        let back: Proof = serde_json::from_value(json).unwrap();
        assert_eq!(back.system(), ProofSystem::Noir);
        assert_eq!(back.public_signals(), &["0x0a".to_string()]);
    }
}
