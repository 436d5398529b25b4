use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use rand::RngCore;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CertMintError, Result};
use crate::key::PublicKey;

/// Length in bytes of generated serial numbers.
pub const SERIAL_NUMBER_LEN: usize = 16;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The encoded name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The encoded name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    /// Certificate serial number, big-endian and positive
    pub serial_number: Vec<u8>,
    /// Certificate signature algorithm
    pub signature_algorithm: SignatureAlgorithm,
    /// Certificate issuer name
    pub issuer: Name,
    /// Validity window
    pub validity: Validity,
    /// Certificate subject name
    pub subject: Name,
    /// Subject's public key
    pub subject_public_key: PublicKey,
    /// Certificate extensions
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Creates a new `TbsCertificate` with a freshly generated serial number.
    ///
    /// # Arguments
    /// * `issuer` - The name of the certificate issuer.
    /// * `subject` - The name of the certificate subject.
    /// * `subject_public_key` - The public key of the certificate subject.
    /// * `signature_algorithm` - The algorithm used to sign the certificate.
    /// * `validity` - The certificate's validity period.
    /// * `extensions` - Additional X.509 extensions for the certificate.
    pub fn new(
        issuer: Name,
        subject: Name,
        subject_public_key: PublicKey,
        signature_algorithm: SignatureAlgorithm,
        validity: Validity,
        extensions: Vec<ExtensionParam>,
    ) -> Self {
        Self {
            serial_number: random_serial_number(),
            signature_algorithm,
            issuer,
            validity,
            subject,
            subject_public_key,
            extensions,
        }
    }

    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let encoding_error = |e: der::Error| CertMintError::EncodingError(e.to_string());

        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone()).map_err(encoding_error)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let serial_number =
            SerialNumber::new(self.serial_number.as_slice()).map_err(encoding_error)?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.algorithm_identifier(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }
}

/// Generates a random, positive serial number of [`SERIAL_NUMBER_LEN`] bytes.
///
/// The top bit is cleared so the INTEGER stays positive, and the next bit is set so
/// the encoding never needs a leading zero byte.
pub fn random_serial_number() -> Vec<u8> {
    let mut bytes = vec![0u8; SERIAL_NUMBER_LEN];
    rand::rng().fill_bytes(&mut bytes);
    bytes[0] = (bytes[0] & 0x7F) | 0x40;
    bytes
}

/// RFC 5280 4.1.2.5: UTCTime through 2049, GeneralizedTime from 2050 on.
fn to_x509_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let encoding_error = |e: der::Error| CertMintError::EncodingError(e.to_string());
    if instant.year() < 2050 {
        UtcTime::from_system_time(instant.into())
            .map(x509_cert::time::Time::UtcTime)
            .map_err(encoding_error)
    } else {
        GeneralizedTime::from_system_time(instant.into())
            .map(x509_cert::time::Time::GeneralTime)
            .map_err(encoding_error)
    }
}
