//! Fingerprints the shop's static assets.
//!
//! Each asset is copied to a `derived/` directory next to it under a name
//! carrying the first eight hex digits of its SHA-256, and the digits are
//! exported as a compile-time variable for the askama filters.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// `(path under static/, stem, extension, env var)`
const ASSETS: &[(&str, &str, &str, &str)] = &[
    ("css", "main", "css", "CSS_HASH"),
    ("js", "cart", "js", "CART_JS_HASH"),
];

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");

    for &(dir, stem, ext, var) in ASSETS {
        fingerprint(&static_dir.join(dir), stem, ext, var);
    }
}

fn fingerprint(dir: &Path, stem: &str, ext: &str, var: &str) {
    let source = dir.join(format!("{stem}.{ext}"));
    println!("cargo:rerun-if-changed={}", source.display());

    let content = match fs::read(&source) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Skipping {}: {e}", source.display());
            println!("cargo:rustc-env={var}=");
            return;
        }
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short = &digest[..8];
    println!("cargo:rustc-env={var}={short}");

    let derived = dir.join("derived");
    fs::create_dir_all(&derived).expect("Failed to create derived asset directory");
    fs::copy(&source, derived.join(format!("{stem}.{short}.{ext}")))
        .expect("Failed to copy fingerprinted asset");
}
