//! Prints the base64 encoding of an image file.
//!
//! Usage: `encode-image [path]`, defaulting to `acne.jpg` in the working directory.

use anyhow::Context;
use drbot::encode_image;

const DEFAULT_IMAGE: &str = "acne.jpg";

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_IMAGE.to_string());

    let encoded = encode_image(&path).with_context(|| format!("failed to encode {path}"))?;
    println!("{encoded}");
    Ok(())
}
