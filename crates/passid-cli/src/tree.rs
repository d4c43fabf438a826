//! # Tree CLI — CSCA certificate tree operations.
//!
//! ```bash
//! # Root of a master list (one hex public key per line):
//! passid tree root masterlist.txt
//!
//! # Inclusion proof for one key:
//! passid tree proof masterlist.txt 0x30820122...
//!
//! # Fold a path and compare with a root:
//! passid tree verify --root 0x.. --leaf 0x.. --path 0x.. --path 0x..
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use passid_core::{decode_hex, Hash32};
use passid_crypto::{fold_path, CertTree};
use serde_json::json;

use crate::{parse_hash, read_to_string};

/// Tree subcommand arguments.
#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(subcommand)]
    pub command: TreeCommand,
}

#[derive(Subcommand, Debug)]
pub enum TreeCommand {
    /// Print the Merkle root of a key list.
    Root {
        /// File with one hex public key per line.
        keys: PathBuf,
    },

    /// Print the inclusion proof of one key as JSON.
    Proof {
        /// File with one hex public key per line.
        keys: PathBuf,
        /// The public key to prove, hex.
        key: String,
    },

    /// Fold a leaf along a path and compare with a root.
    Verify {
        #[arg(long)]
        root: String,
        /// Leaf hash (Keccak-256 of the public key).
        #[arg(long)]
        leaf: String,
        /// Siblings from the leaf upwards. Repeat once per level.
        #[arg(long = "path")]
        path: Vec<String>,
    },
}

/// Execute the tree subcommand.
pub fn run_tree(args: &TreeArgs) -> Result<u8> {
    match &args.command {
        TreeCommand::Root { keys } => {
            let tree = load_tree(keys)?;
            let root = tree.root().context("key list is empty")?;
            tracing::info!(keys = tree.len(), root = %root, "computed certificate tree root");
            println!("{}", root.to_hex());
            Ok(0)
        }
        TreeCommand::Proof { keys, key } => {
            let tree = load_tree(keys)?;
            match proof_json(&tree, key)? {
                Some(proof) => {
                    println!("{}", serde_json::to_string_pretty(&proof)?);
                    Ok(0)
                }
                None => {
                    eprintln!("key is not in {}", keys.display());
                    Ok(1)
                }
            }
        }
        TreeCommand::Verify { root, leaf, path } => {
            if verify_path(root, leaf, path)? {
                println!("valid");
                Ok(0)
            } else {
                println!("invalid");
                Ok(1)
            }
        }
    }
}

/// Parse a key list: one hex key per line, blank lines and `#` comments
/// ignored.
pub fn parse_keys(text: &str) -> Result<Vec<Vec<u8>>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| decode_hex(line).with_context(|| format!("line {n}: invalid hex key")))
        .collect()
}

pub fn load_tree(path: &Path) -> Result<CertTree> {
    let keys = parse_keys(&read_to_string(path)?)?;
    Ok(CertTree::from_public_keys(keys))
}

/// The inclusion proof of `key_hex` as `{root, leaf, siblings}`, or `None`
/// if the key is not a member.
pub fn proof_json(tree: &CertTree, key_hex: &str) -> Result<Option<serde_json::Value>> {
    let key = decode_hex(key_hex).context("invalid hex key")?;
    let Some(root) = tree.root() else {
        bail!("key list is empty");
    };
    Ok(tree.inclusion_proof(&key).map(|proof| {
        json!({
            "root": root.to_hex(),
            "leaf": proof.leaf.to_hex(),
            "siblings": proof.siblings_hex(),
        })
    }))
}

pub fn verify_path(root: &str, leaf: &str, path: &[String]) -> Result<bool> {
    let root = parse_hash("root", root)?;
    let leaf = parse_hash("leaf", leaf)?;
    let siblings = path
        .iter()
        .map(|s| parse_hash("path element", s))
        .collect::<Result<Vec<Hash32>>>()?;
    Ok(fold_path(leaf, &siblings) == root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use passid_core::{encode_hex, keccak256};

    fn keys_file(dir: &tempfile::TempDir, keys: &[&[u8]]) -> PathBuf {
        let mut text = String::from("# test master list\n\n");
        for key in keys {
            text.push_str(&encode_hex(key));
            text.push('\n');
        }
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn parse_keys_skips_comments_and_blank_lines() {
        let keys = parse_keys("# header\n\n0x0102\n  0a0b  \n").unwrap();
        assert_eq!(keys, vec![vec![1, 2], vec![10, 11]]);
    }

    #[test]
    fn parse_keys_reports_line_number() {
        let err = parse_keys("0x01\nzz\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn root_matches_library_tree() {
        let dir = tempfile::tempdir().unwrap();
        let keys: [&[u8]; 3] = [b"csca one", b"csca two", b"csca three"];
        let tree = load_tree(&keys_file(&dir, &keys)).unwrap();
        assert_eq!(tree.root(), CertTree::from_public_keys(keys).root());
    }

    #[test]
    fn proof_verifies_against_root() {
        let dir = tempfile::tempdir().unwrap();
        let keys: [&[u8]; 4] = [b"a", b"b", b"c", b"d"];
        let tree = load_tree(&keys_file(&dir, &keys)).unwrap();

        let proof = proof_json(&tree, &encode_hex(b"c")).unwrap().unwrap();
        assert_eq!(proof["leaf"], keccak256(b"c").to_hex());

        let path: Vec<String> = proof["siblings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap().to_string())
            .collect();
        let root = proof["root"].as_str().unwrap();
        let leaf = proof["leaf"].as_str().unwrap();
        assert!(verify_path(root, leaf, &path).unwrap());
        assert!(!verify_path(root, &keccak256(b"e").to_hex(), &path).unwrap());
    }

    #[test]
    fn proof_of_non_member_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let tree = load_tree(&keys_file(&dir, &[b"a", b"b"])).unwrap();
        assert!(proof_json(&tree, &encode_hex(b"z")).unwrap().is_none());
    }

    #[test]
    fn empty_key_list_has_no_root() {
        let dir = tempfile::tempdir().unwrap();
        let tree = load_tree(&keys_file(&dir, &[])).unwrap();
        assert!(tree.root().is_none());
        assert!(proof_json(&tree, "0x01").is_err());
    }

    #[test]
    fn single_key_root_is_its_leaf() {
        assert!(verify_path(&keccak256(b"k").to_hex(), &keccak256(b"k").to_hex(), &[]).unwrap());
    }
}
