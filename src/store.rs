//! Key generation and the on-disk layout of an authority: a PEM private key file and a
//! PEM certificate file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::authority::CertificateAuthority;
use crate::cert::Certificate;
use crate::error::{CertMintError, Result};
use crate::key::{KeyAlgorithm, KeyPair};

/// Generates a fresh key pair.
///
/// Fails with `KeyGenerationError` if the entropy source or the key library fails, and
/// with `InvalidInput` for an unsupported RSA modulus.
pub fn generate_key_pair(algorithm: KeyAlgorithm) -> Result<KeyPair> {
    let key = KeyPair::generate(algorithm)?;
    debug!(?algorithm, "generated key pair");
    Ok(key)
}

/// Loads an authority from its private key file and certificate file.
///
/// Each path is read once. The key may be PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8
/// (`PRIVATE KEY`). The key must match the certificate, and the certificate must be
/// a CA, before the authority is returned.
pub fn load_authority(
    private_key_path: impl AsRef<Path>,
    public_cert_path: impl AsRef<Path>,
) -> Result<CertificateAuthority> {
    let private_key_path = private_key_path.as_ref();
    let public_cert_path = public_cert_path.as_ref();

    let key_pem = read_pem_file(private_key_path)?;
    let cert_pem = read_pem_file(public_cert_path)?;

    let key = KeyPair::from_pem(&key_pem).map_err(|e| naming_file(private_key_path, e))?;
    let cert = Certificate::from_pem(&cert_pem).map_err(|e| naming_file(public_cert_path, e))?;
    debug!(
        key = %private_key_path.display(),
        cert = %public_cert_path.display(),
        serial = %cert.serial_hex(),
        "loaded authority files"
    );

    CertificateAuthority::new(cert, key)
}

/// Writes `authority` as a private key file and a certificate file.
///
/// Each file is first written to a temporary sibling and then renamed into place. On
/// Unix the key file is readable by its owner only.
pub fn save_authority(
    authority: &CertificateAuthority,
    private_key_path: impl AsRef<Path>,
    public_cert_path: impl AsRef<Path>,
) -> Result<()> {
    let private_key_path = private_key_path.as_ref();
    let public_cert_path = public_cert_path.as_ref();

    write_atomically(private_key_path, authority.key_pem()?.as_bytes(), true)?;
    write_atomically(public_cert_path, authority.cert_pem()?.as_bytes(), false)?;
    debug!(
        key = %private_key_path.display(),
        cert = %public_cert_path.display(),
        "saved authority files"
    );
    Ok(())
}

/// Reads a PEM file, reporting a missing file as `StoreNotFoundError`.
pub(crate) fn read_pem_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CertMintError::StoreNotFoundError(path.to_path_buf()),
        _ => CertMintError::IoError(format!("reading {}: {e}", path.display())),
    })
}

/// Prefixes a decode error with the file it came from.
pub(crate) fn naming_file(path: &Path, err: CertMintError) -> CertMintError {
    match err {
        CertMintError::DecodeError(msg) => {
            CertMintError::DecodeError(format!("{}: {msg}", path.display()))
        }
        other => other,
    }
}

fn write_atomically(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let io_error = |e: io::Error| CertMintError::IoError(format!("writing {}: {e}", path.display()));
    let tmp_path = temporary_sibling(path)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let result = options
        .open(&tmp_path)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result.map_err(io_error)
}

fn temporary_sibling(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        CertMintError::InvalidInput(format!("{} does not name a file", path.display()))
    })?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_pair_rejects_odd_rsa_size() {
        assert!(matches!(
            generate_key_pair(KeyAlgorithm::Rsa { bits: 1000 }),
            Err(CertMintError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_generate_key_pair_matches_algorithm() {
        for algorithm in [
            KeyAlgorithm::EcdsaP256,
            KeyAlgorithm::EcdsaP384,
            KeyAlgorithm::Ed25519,
        ] {
            assert_eq!(generate_key_pair(algorithm).unwrap().algorithm(), algorithm);
        }
    }

    #[test]
    fn test_temporary_sibling() {
        assert_eq!(
            temporary_sibling(Path::new("/etc/pki/ca.key")).unwrap(),
            PathBuf::from("/etc/pki/.ca.key.tmp")
        );
        assert!(temporary_sibling(Path::new("/")).is_err());
    }

    #[test]
    fn test_naming_file_only_touches_decode_errors() {
        let path = Path::new("ca.crt");
        assert_eq!(
            naming_file(path, CertMintError::DecodeError("bad".to_string())).to_string(),
            "Failed to decode data: ca.crt: bad"
        );
        assert!(matches!(
            naming_file(path, CertMintError::KeyMismatchError("x".to_string())),
            CertMintError::KeyMismatchError(_)
        ));
    }
}
