use tracing::{debug, info};
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{ExtendedKeyUsageOption, KeyUsages};
use crate::cert::params::{CertificationRequestInfo, Validity};
use crate::config::AuthorityConfig;
use crate::error::{CertMintError, Result};
use crate::issuer::Issuer;
use crate::key::KeyPair;
use crate::store::generate_key_pair;

/// A CA certificate together with its private key.
///
/// Both halves are always present, the certificate is marked as a CA, and the key
/// matches the certificate's public key. Every constructor enforces this.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    cert: Certificate,
    key: KeyPair,
}

impl CertificateAuthority {
    /// Pairs a CA certificate with its private key.
    ///
    /// Fails with `KeyMismatchError` if `key` is not the key certified by `cert`, and
    /// with `CertificateError` if `cert` is not a CA certificate.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        if cert.public_key()? != key.public_key() {
            return Err(CertMintError::KeyMismatchError(format!(
                "key does not belong to certificate {}",
                cert.subject_name()
            )));
        }
        if !cert.is_ca()? {
            return Err(CertMintError::CertificateError(format!(
                "{} is not a CA certificate",
                cert.subject_name()
            )));
        }
        Ok(Self { cert, key })
    }

    /// Builds an authority from its PEM-encoded private key and certificate.
    pub fn from_pem(key_pem: &str, cert_pem: &str) -> Result<Self> {
        let key = KeyPair::from_pem(key_pem)?;
        let cert = Certificate::from_pem(cert_pem)?;
        Self::new(cert, key)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.cert
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key
    }

    /// The certificate as PEM, ready to be written to a `.crt` file.
    pub fn cert_pem(&self) -> Result<String> {
        self.cert.to_pem()
    }

    /// The private key as PEM, ready to be written to a `.key` file.
    pub fn key_pem(&self) -> Result<String> {
        self.key.to_pem()
    }
}

impl Issuer for CertificateAuthority {
    fn issuer_name(&self) -> Name {
        // The name of the issuer is the subject of the certificate
        self.cert.subject_name().clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn serial_number(&self) -> Option<Vec<u8>> {
        Some(self.cert.serial_number())
    }
}

/// Creates a new self-signed certificate authority.
///
/// The CA certificate has `cA = true`, KeyUsage `digitalSignature | keyCertSign`,
/// ExtendedKeyUsage `clientAuth, serverAuth`, a random serial number, and is valid from
/// now for `config.validity_years` calendar years.
///
/// # Example
/// ```rust,no_run
/// use certmint::authority::create_authority;
/// use certmint::config::AuthorityConfig;
///
/// # fn main() -> certmint::error::Result<()> {
/// let ca = create_authority(&AuthorityConfig::default())?;
/// std::fs::write("ca.crt", ca.cert_pem()?).unwrap();
/// # Ok(())
/// # }
/// ```
pub fn create_authority(config: &AuthorityConfig) -> Result<CertificateAuthority> {
    debug!(algorithm = ?config.key_algorithm, "generating authority key");
    let key = generate_key_pair(config.key_algorithm)?;

    let ca_cert_info = CertificationRequestInfo::builder()
        .subject(config.subject.as_x509_name()?)
        .subject_public_key(key.public_key())
        .is_ca(true)
        .key_usage(KeyUsages::DigitalSignature | KeyUsages::KeyCertSign)
        .usages(vec![
            ExtendedKeyUsageOption::ClientAuth,
            ExtendedKeyUsageOption::ServerAuth,
        ])
        .build();

    let validity = Validity::for_years(config.validity_years)?;
    let cert = Certificate::new_self_signed(&ca_cert_info, &key, validity)?;
    info!(
        subject = %cert.subject_name(),
        serial = %cert.serial_hex(),
        not_after = %cert.not_after(),
        "created certificate authority"
    );

    CertificateAuthority::new(cert, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::DistinguishedName;
    use crate::key::KeyAlgorithm;

    fn test_config() -> AuthorityConfig {
        AuthorityConfig::builder()
            .subject(
                DistinguishedName::builder()
                    .organization("Acme".to_string())
                    .build(),
            )
            .key_algorithm(KeyAlgorithm::EcdsaP256)
            .build()
    }

    #[test]
    fn test_create_authority_profile() {
        let ca = create_authority(&test_config()).unwrap();
        let cert = ca.certificate();

        assert_eq!(cert.issuer_name(), cert.subject_name());
        assert!(cert.is_ca().unwrap());
        assert_eq!(
            cert.key_usage().unwrap().unwrap().0,
            KeyUsages::DigitalSignature | KeyUsages::KeyCertSign
        );
        assert_eq!(
            cert.extended_key_usage().unwrap(),
            vec![
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::ServerAuth
            ]
        );
        assert_eq!(cert.subject().organization.as_deref(), Some("Acme"));
        cert.verify_signed_by(&ca.key_pair().public_key()).unwrap();
    }

    #[test]
    fn test_validity_is_ten_years_by_default() {
        let ca = create_authority(&test_config()).unwrap();
        let validity = ca.certificate().validity();
        assert!(validity.contains(time::OffsetDateTime::now_utc()));
        assert_eq!(validity.not_after.year() - validity.not_before.year(), 10);
    }

    #[test]
    fn test_serials_differ_between_authorities() {
        let first = create_authority(&test_config()).unwrap();
        let second = create_authority(&test_config()).unwrap();
        assert_ne!(
            first.certificate().serial_number(),
            second.certificate().serial_number()
        );
    }

    #[test]
    fn test_new_rejects_foreign_key() {
        let ca = create_authority(&test_config()).unwrap();
        let other = KeyPair::generate_ecdsa_p256();
        assert!(matches!(
            CertificateAuthority::new(ca.certificate().clone(), other),
            Err(CertMintError::KeyMismatchError(_))
        ));
    }

    #[test]
    fn test_pem_round_trip() {
        let ca = create_authority(&test_config()).unwrap();
        let loaded =
            CertificateAuthority::from_pem(&ca.key_pem().unwrap(), &ca.cert_pem().unwrap())
                .unwrap();
        assert_eq!(loaded.certificate(), ca.certificate());
    }
}
