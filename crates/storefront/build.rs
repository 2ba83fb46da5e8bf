//! Build script for the storefront crate.
//!
//! Hashes the static CSS and JS so templates can reference them with a
//! version query that changes whenever their content does. Exposed as
//! `env!("ASSET_VERSION")`.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

const ASSETS: &[&str] = &["static/css/main.css", "static/js/session.js"];

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");

    let mut hasher = Sha256::new();
    for asset in ASSETS {
        let path = Path::new(&manifest_dir).join(asset);
        println!("cargo:rerun-if-changed={}", path.display());
        match fs::read(&path) {
            Ok(content) => hasher.update(&content),
            Err(e) => println!("cargo:warning=Could not read {asset}: {e}"),
        }
    }

    let hash = format!("{:x}", hasher.finalize());
    let short_hash = hash.get(..10).unwrap_or(&hash);
    println!("cargo:rustc-env=ASSET_VERSION={short_hash}");
}
