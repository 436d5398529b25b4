//! PEM armoring of DER-encoded certificates, requests and keys.

use crate::error::{CertMintError, Result};

/// The block labels this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemLabel {
    /// `CERTIFICATE`
    Certificate,
    /// `CERTIFICATE REQUEST` (the legacy `NEW CERTIFICATE REQUEST` is accepted on input).
    CertificateRequest,
    /// `RSA PRIVATE KEY`, a PKCS#1 RSA key.
    RsaPrivateKey,
    /// `PRIVATE KEY`, an unencrypted PKCS#8 key.
    PrivateKey,
}

impl PemLabel {
    /// The label written on the BEGIN/END lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            PemLabel::Certificate => "CERTIFICATE",
            PemLabel::CertificateRequest => "CERTIFICATE REQUEST",
            PemLabel::RsaPrivateKey => "RSA PRIVATE KEY",
            PemLabel::PrivateKey => "PRIVATE KEY",
        }
    }

    /// Parses a label found on a BEGIN line.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CERTIFICATE" => Some(PemLabel::Certificate),
            "CERTIFICATE REQUEST" | "NEW CERTIFICATE REQUEST" => {
                Some(PemLabel::CertificateRequest)
            }
            "RSA PRIVATE KEY" => Some(PemLabel::RsaPrivateKey),
            "PRIVATE KEY" => Some(PemLabel::PrivateKey),
            _ => None,
        }
    }

    /// Returns `true` for either private key label.
    pub fn is_private_key(&self) -> bool {
        matches!(self, PemLabel::RsaPrivateKey | PemLabel::PrivateKey)
    }
}

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
///
/// Lines are wrapped at 64 columns and terminated with `\n`.
pub fn armor(label: PemLabel, der: &[u8]) -> String {
    let pem = pem::Pem::new(label.as_str(), der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Decode every PEM block in `text`, in order of appearance.
///
/// Fails if a block is malformed or carries a label this crate does not handle.
pub fn unarmor_all(text: &str) -> Result<Vec<(PemLabel, Vec<u8>)>> {
    pem::parse_many(text)?
        .into_iter()
        .map(|block| {
            let label = PemLabel::from_tag(block.tag()).ok_or_else(|| {
                CertMintError::DecodeError(format!("unsupported PEM label `{}`", block.tag()))
            })?;
            Ok((label, block.into_contents()))
        })
        .collect()
}

/// Decode the first PEM block in `text`.
pub fn unarmor(text: &str) -> Result<(PemLabel, Vec<u8>)> {
    unarmor_all(text)?
        .into_iter()
        .next()
        .ok_or_else(|| CertMintError::DecodeError("no PEM block found".to_string()))
}

/// Decode the single block in `text` whose label satisfies `accepts`.
///
/// Blocks with other labels, including labels this crate does not handle, are skipped.
/// Zero matching blocks, or more than one, is a `DecodeError`: a file holding two
/// certificates cannot stand in for one.
pub fn unarmor_expecting(
    text: &str,
    accepts: impl Fn(PemLabel) -> bool,
) -> Result<(PemLabel, Vec<u8>)> {
    let mut matching = pem::parse_many(text)?.into_iter().filter_map(|block| {
        let label = PemLabel::from_tag(block.tag()).filter(|l| accepts(*l))?;
        Some((label, block.into_contents()))
    });

    let first = matching
        .next()
        .ok_or_else(|| CertMintError::DecodeError("no matching PEM block found".to_string()))?;
    if matching.next().is_some() {
        return Err(CertMintError::DecodeError(format!(
            "more than one `{}` block found",
            first.0.as_str()
        )));
    }
    Ok(first)
}
