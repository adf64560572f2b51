//! File formats for keys, certificates and chains.
//!
//! Private keys are PKCS#8 PEM; certificates and chains are JSON.

use anyhow::{Context, Result};
use ed25519_dalek::SigningKey;
use std::fs;
use std::path::{Path, PathBuf};

use custodia_core::{Certificate, DelegationChain};

pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    use pkcs8::DecodePrivateKey;
    let pem = fs::read_to_string(path)
        .with_context(|| format!("failed to read private key: {}", path.display()))?;
    SigningKey::from_pkcs8_pem(&pem)
        .with_context(|| format!("failed to decode PKCS#8 private key: {}", path.display()))
}

pub fn save_signing_key(path: &Path, key: &SigningKey) -> Result<()> {
    use pkcs8::{EncodePrivateKey, LineEnding};
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key as PKCS#8 PEM")?;
    fs::write(path, pem.as_bytes())
        .with_context(|| format!("failed to write private key: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on: {}", path.display()))?;
    }
    Ok(())
}

pub fn load_certificate(path: &Path) -> Result<Certificate> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read certificate: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse certificate: {}", path.display()))
}

pub fn load_certificates(paths: &[PathBuf]) -> Result<Vec<Certificate>> {
    paths.iter().map(|p| load_certificate(p)).collect()
}

pub fn save_certificate(path: &Path, cert: &Certificate) -> Result<()> {
    let json = serde_json::to_string_pretty(cert).context("failed to serialize certificate")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write certificate: {}", path.display()))
}

pub fn load_chain(path: &Path) -> Result<DelegationChain> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read chain: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse chain: {}", path.display()))
}

pub fn save_chain(path: &Path, chain: &DelegationChain) -> Result<()> {
    let json = serde_json::to_string_pretty(chain).context("failed to serialize chain")?;
    fs::write(path, json).with_context(|| format!("failed to write chain: {}", path.display()))
}
