//! VAPID keypair generator
//!
//! Prints a fresh ECDSA P-256 keypair as base64url JSON, ready for the
//! `VAPID_PUBLIC_KEY` / `VAPID_PRIVATE_KEY` environment variables. The
//! public key is the uncompressed point browsers expect from the
//! subscribe call.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::{ensure, Context};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;

fn main() -> anyhow::Result<()> {
    let signing_key = SigningKey::random(&mut OsRng);
    let verifying_key = signing_key.verifying_key();

    let public_point = verifying_key.to_encoded_point(false);
    let public_bytes = public_point.as_bytes();
    ensure!(
        public_bytes.len() == 65 && public_bytes[0] == 0x04,
        "generated public key is not an uncompressed P-256 point"
    );

    let keypair = serde_json::json!({
        "publicKey": URL_SAFE_NO_PAD.encode(public_bytes),
        "privateKey": URL_SAFE_NO_PAD.encode(signing_key.to_bytes()),
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&keypair).context("failed to serialize keypair")?
    );

    Ok(())
}
