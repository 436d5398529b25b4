pub mod extensions;
pub mod params;

use der::asn1::{Any, AnyRef};
use der::{Decode, Encode, SliceReader};
use extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, SubjectAltName,
    ToAndFromX509Extension,
};
use params::{CertificationRequestInfo, DistinguishedName, SanEntry, Validity};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CertMintError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils::{self, PemLabel};

/// Represents the supported signature algorithms for certificates and requests.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-384 with RSA encryption (PKCS#1 v1.5).
    Sha384WithRSA,
    /// SHA-512 with RSA encryption (PKCS#1 v1.5).
    Sha512WithRSA,
    /// ECDSA on P-256 with SHA-256.
    Sha256WithECDSA,
    /// ECDSA on P-384 with SHA-384.
    Sha384WithECDSA,
    /// EdDSA on Ed25519.
    Ed25519,
}

impl SignatureAlgorithm {
    /// The algorithm a key signs with when nothing else is requested.
    pub fn for_key(key: &KeyPair) -> Self {
        match key {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    /// The algorithm `key` signs with when a signer asked for `requested`.
    ///
    /// RSA keys honour the requested RSA digest. Every other combination falls back to
    /// [`SignatureAlgorithm::for_key`].
    pub fn for_key_preferring(key: &KeyPair, requested: SignatureAlgorithm) -> Self {
        match (key, requested) {
            (
                KeyPair::Rsa { .. },
                SignatureAlgorithm::Sha256WithRSA
                | SignatureAlgorithm::Sha384WithRSA
                | SignatureAlgorithm::Sha512WithRSA,
            ) => requested,
            _ => Self::for_key(key),
        }
    }

    /// Resolves an algorithm identifier found in a certificate or request.
    pub fn from_algorithm_identifier(id: &AlgorithmIdentifierOwned) -> Result<Self> {
        match id.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(Self::Sha256WithRSA),
            const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION => Ok(Self::Sha384WithRSA),
            const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION => Ok(Self::Sha512WithRSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(Self::Sha256WithECDSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(Self::Sha384WithECDSA),
            const_oid::db::rfc8410::ID_ED_25519 => Ok(Self::Ed25519),
            other => Err(CertMintError::DecodeError(format!(
                "Unsupported signature algorithm {other}"
            ))),
        }
    }

    /// Converts the algorithm into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA identifiers carry an explicit NULL parameter, ECDSA and EdDSA identifiers omit
    /// it (RFC 4055, RFC 5758, RFC 8410).
    pub fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        let (oid, parameters) = match self {
            SignatureAlgorithm::Sha256WithRSA => (
                const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                Some(Any::from(AnyRef::NULL)),
            ),
            SignatureAlgorithm::Sha384WithRSA => (
                const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
                Some(Any::from(AnyRef::NULL)),
            ),
            SignatureAlgorithm::Sha512WithRSA => (
                const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
                Some(Any::from(AnyRef::NULL)),
            ),
            SignatureAlgorithm::Sha256WithECDSA => (const_oid::db::rfc5912::ECDSA_WITH_SHA_256, None),
            SignatureAlgorithm::Sha384WithECDSA => (const_oid::db::rfc5912::ECDSA_WITH_SHA_384, None),
            SignatureAlgorithm::Ed25519 => (const_oid::db::rfc8410::ID_ED_25519, None),
        };
        AlgorithmIdentifierOwned { oid, parameters }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        value.algorithm_identifier()
    }
}

/// Represents an X.509 certificate.
///
/// The DER a certificate was parsed from is kept and is what [`Certificate::to_der`]
/// and [`Certificate::to_pem`] return, so a loaded certificate is written out byte for
/// byte as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    inner: CertificateInner,
    der: Vec<u8>,
}

impl Certificate {
    /// Parses a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| CertMintError::DecodeError(format!("certificate: {e}")))?;
        Ok(Self {
            inner,
            der: der.to_vec(),
        })
    }

    /// Wraps a freshly assembled certificate, encoding it once.
    pub(crate) fn from_inner(inner: CertificateInner) -> Result<Self> {
        let der = inner
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;
        Ok(Self { inner, der })
    }

    /// The parsed certificate structure.
    pub fn inner(&self) -> &CertificateInner {
        &self.inner
    }

    /// Parses PEM text holding exactly one `CERTIFICATE` block.
    pub fn from_pem(text: &str) -> Result<Self> {
        let (_, der) = pem_utils::unarmor_expecting(text, |l| l == PemLabel::Certificate)?;
        Self::from_der(&der)
    }

    /// The certificate's DER encoding.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.der.clone())
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::armor(PemLabel::Certificate, &self.der))
    }

    /// The serial number as big-endian bytes.
    pub fn serial_number(&self) -> Vec<u8> {
        self.inner
            .tbs_certificate
            .serial_number
            .as_bytes()
            .to_vec()
    }

    /// The serial number as lowercase hex, for logs.
    pub fn serial_hex(&self) -> String {
        self.serial_number()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// The encoded subject name.
    pub fn subject_name(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    /// The encoded issuer name.
    pub fn issuer_name(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.subject_name())
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.issuer_name())
    }

    /// The validity window.
    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: OffsetDateTime::from(validity.not_before.to_system_time()),
            not_after: OffsetDateTime::from(validity.not_after.to_system_time()),
        }
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.validity().not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.validity().not_after
    }

    /// The subject public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// The algorithm the issuer signed this certificate with.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_algorithm_identifier(&self.inner.signature_algorithm)
    }

    /// Decodes the extension of type `E`, if the certificate carries it.
    pub fn find_extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// Returns `true` if the BasicConstraints extension marks this certificate as a CA.
    pub fn is_ca(&self) -> Result<bool> {
        Ok(self
            .find_extension::<BasicConstraints>()?
            .is_some_and(|bc| bc.is_ca))
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.find_extension::<KeyUsage>()
    }

    pub fn extended_key_usage(&self) -> Result<Vec<ExtendedKeyUsageOption>> {
        Ok(self
            .find_extension::<ExtendedKeyUsage>()?
            .map(|eku| eku.usage)
            .unwrap_or_default())
    }

    pub fn subject_alt_names(&self) -> Result<Vec<SanEntry>> {
        Ok(self
            .find_extension::<SubjectAltName>()?
            .map(|san| san.names)
            .unwrap_or_default())
    }

    /// Verifies this certificate's signature with the issuer's public key.
    ///
    /// Fails with `SignatureVerificationError` if the signature does not verify.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        let tbs = signed_portion(&self.der)?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CertMintError::SignatureVerificationError("signature has unused bits".to_string())
        })?;
        issuer_key.verify(&tbs, signature, &self.signature_algorithm()?)
    }

    /// Creates a new self-signed certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `validity` - The certificate's validity period.
    ///
    /// # Returns
    /// A `Certificate` object whose issuer equals its subject.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.clone(),
            key,
        };
        self_issuer.issue(cert_info, validity)
    }
}

/// The first element of a signed SEQUENCE (a TBSCertificate or a
/// CertificationRequestInfo), exactly as it appears in `der`.
pub(crate) fn signed_portion(der: &[u8]) -> Result<Vec<u8>> {
    let outer = AnyRef::from_der(der)?;
    let mut reader = SliceReader::new(outer.value())?;
    let first = AnyRef::decode(&mut reader)?;
    Ok(first.to_der()?)
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn serial_number(&self) -> Option<Vec<u8>> {
        None
    }
}

/// An issued certificate together with the key pair generated for it.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    /// The certificate as PEM.
    pub fn cert_pem(&self) -> Result<String> {
        self.cert.to_pem()
    }

    /// The private key as PEM.
    pub fn key_pem(&self) -> Result<String> {
        self.key.to_pem()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::KeyUsages;

    fn self_signed(key: &KeyPair) -> Certificate {
        let subject = DistinguishedName::builder()
            .common_name("Acme Device CA".to_string())
            .organization("Acme".to_string())
            .build();
        let cert_info = CertificationRequestInfo::builder()
            .subject(subject.as_x509_name().unwrap())
            .subject_public_key(key.public_key())
            .is_ca(true)
            .key_usage(KeyUsages::KeyCertSign | KeyUsages::DigitalSignature)
            .build();
        Certificate::new_self_signed(&cert_info, key, Validity::for_days(30)).unwrap()
    }

    #[test]
    fn test_self_signed_fields() {
        let key = KeyPair::generate_ecdsa_p256();
        let cert = self_signed(&key);
        assert_eq!(cert.subject_name(), cert.issuer_name());
        assert_eq!(cert.subject().common_name.as_deref(), Some("Acme Device CA"));
        assert!(cert.is_ca().unwrap());
        assert_eq!(cert.public_key().unwrap(), key.public_key());
        assert_eq!(
            cert.signature_algorithm().unwrap(),
            SignatureAlgorithm::Sha256WithECDSA
        );
        cert.verify_signed_by(&key.public_key()).unwrap();
    }

    #[test]
    fn test_pem_round_trip() {
        let key = KeyPair::generate_ed25519();
        let cert = self_signed(&key);
        let parsed = Certificate::from_pem(&cert.to_pem().unwrap()).unwrap();
        assert_eq!(parsed, cert);
    }

    #[test]
    fn test_from_pem_ignores_unrelated_blocks() {
        let key = KeyPair::generate_ecdsa_p256();
        let cert = self_signed(&key);
        let spki = key.as_spki().unwrap().to_der().unwrap();
        let text = format!(
            "{}{}",
            cert.to_pem().unwrap(),
            pem::encode(&pem::Pem::new("PUBLIC KEY", spki))
        );
        assert_eq!(Certificate::from_pem(&text).unwrap(), cert);
    }

    #[test]
    fn test_verify_with_wrong_key_fails() {
        let key = KeyPair::generate_ecdsa_p256();
        let other = KeyPair::generate_ecdsa_p256();
        let cert = self_signed(&key);
        assert!(matches!(
            cert.verify_signed_by(&other.public_key()),
            Err(CertMintError::SignatureVerificationError(_))
        ));
    }

    #[test]
    fn test_rsa_identifier_has_null_parameters() {
        let id = SignatureAlgorithm::Sha256WithRSA.algorithm_identifier();
        assert!(id.to_der().unwrap().ends_with(&[0x05, 0x00]));
        assert!(
            SignatureAlgorithm::Ed25519
                .algorithm_identifier()
                .parameters
                .is_none()
        );
    }

    #[test]
    fn test_for_key_preferring() {
        let rsa = KeyPair::generate_rsa(2048).unwrap();
        let ec = KeyPair::generate_ecdsa_p256();
        assert_eq!(
            SignatureAlgorithm::for_key_preferring(&rsa, SignatureAlgorithm::Sha512WithRSA),
            SignatureAlgorithm::Sha512WithRSA
        );
        assert_eq!(
            SignatureAlgorithm::for_key_preferring(&rsa, SignatureAlgorithm::Sha256WithECDSA),
            SignatureAlgorithm::Sha256WithRSA
        );
        assert_eq!(
            SignatureAlgorithm::for_key_preferring(&ec, SignatureAlgorithm::Sha384WithRSA),
            SignatureAlgorithm::Sha256WithECDSA
        );
    }
}
