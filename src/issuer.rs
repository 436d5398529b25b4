use der::Encode;
use sha1::Sha1;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::AuthorityKeyIdentifier;
use crate::cert::extensions::BasicConstraints;
use crate::cert::extensions::ExtendedKeyUsage;
use crate::cert::extensions::KeyUsage;
use crate::cert::extensions::SubjectAltName;
use crate::cert::extensions::SubjectKeyIdentifier;
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::error::{CertMintError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::{TbsCertificate, random_serial_number};

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the encoded name written into the issuer field of issued certificates.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the serial number of the issuer's own certificate, if it has one yet.
    /// Issued certificates never reuse it.
    fn serial_number(&self) -> Option<Vec<u8>>;

    /// Issues a certificate signed with the issuer's default algorithm.
    ///
    /// # Arguments
    /// * `cert_request` - The certification request information containing details about the certificate to be issued.
    /// * `validity` - The validity window of the new certificate.
    ///
    /// # Returns
    /// A `Certificate` object representing the issued certificate.
    fn issue(&self, cert_request: &CertificationRequestInfo, validity: Validity) -> Result<Certificate> {
        let algorithm = SignatureAlgorithm::for_key(self.signing_key());
        self.issue_with_algorithm(cert_request, validity, algorithm)
    }

    /// Issues a certificate signed with `signature_algorithm`.
    ///
    /// The certificate carries BasicConstraints, Subject and Authority Key Identifiers,
    /// and, when the request asks for them, KeyUsage, ExtendedKeyUsage and
    /// SubjectAltName, followed by the request's own extensions.
    fn issue_with_algorithm(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Certificate> {
        if validity.not_after <= validity.not_before {
            return Err(CertMintError::CertificateError(
                "validity ends before it starts".to_string(),
            ));
        }

        let issuer_key = self.signing_key().public_key();
        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: None,
        };

        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(basic_constraints, true)?,
            ExtensionParam::from_extension(
                SubjectKeyIdentifier(key_identifier(&cert_request.subject_public_key)?),
                false,
            )?,
            ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: key_identifier(&issuer_key)?,
                },
                false,
            )?,
        ];

        if !cert_request.key_usage.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                KeyUsage(cert_request.key_usage),
                true,
            )?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        if !cert_request.subject_alt_names.is_empty() {
            let san = SubjectAltName {
                names: cert_request.subject_alt_names.clone(),
            };
            extensions.push(ExtensionParam::from_extension(san, false)?);
        }

        extensions.extend(cert_request.extensions.iter().cloned());

        let mut tbs_cert = TbsCertificate::new(
            self.issuer_name(),
            cert_request.subject.clone(),
            cert_request.subject_public_key.clone(),
            signature_algorithm,
            validity,
            extensions,
        );
        if let Some(own_serial) = self.serial_number() {
            while tbs_cert.serial_number == own_serial {
                tbs_cert.serial_number = random_serial_number();
            }
        }

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;

        let signature = self
            .signing_key()
            .sign_data(&tbs_der, &signature_algorithm)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.algorithm_identifier(),
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| CertMintError::EncodingError(e.to_string()))?,
        };

        Certificate::from_inner(cert_inner)
    }
}

/// SHA-1 over the subject public key bits, RFC 5280 4.2.1.2 method (1).
pub fn key_identifier(public_key: &PublicKey) -> Result<Vec<u8>> {
    let spki = public_key.to_spki()?;
    Ok(<Sha1 as sha1::Digest>::digest(spki.subject_public_key.raw_bytes()).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages};
    use crate::cert::params::DistinguishedName;

    struct FixedIssuer {
        name: Name,
        key: KeyPair,
        serial: Vec<u8>,
    }

    impl Issuer for FixedIssuer {
        fn issuer_name(&self) -> Name {
            self.name.clone()
        }

        fn signing_key(&self) -> &KeyPair {
            &self.key
        }

        fn serial_number(&self) -> Option<Vec<u8>> {
            Some(self.serial.clone())
        }
    }

    fn fixed_issuer() -> FixedIssuer {
        FixedIssuer {
            name: DistinguishedName::builder()
                .common_name("issuer".to_string())
                .build()
                .as_x509_name()
                .unwrap(),
            key: KeyPair::generate_ecdsa_p256(),
            serial: random_serial_number(),
        }
    }

    fn request_for(key: &KeyPair) -> CertificationRequestInfo {
        CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("subject".to_string())
                    .build()
                    .as_x509_name()
                    .unwrap(),
            )
            .subject_public_key(key.public_key())
            .key_usage(KeyUsages::DigitalSignature.into())
            .usages(vec![ExtendedKeyUsageOption::ClientAuth])
            .build()
    }

    #[test]
    fn test_issue_sets_issuer_and_extensions() {
        let issuer = fixed_issuer();
        let subject_key = KeyPair::generate_ecdsa_p256();
        let cert = issuer
            .issue(&request_for(&subject_key), Validity::for_days(10))
            .unwrap();

        assert_eq!(cert.issuer_name(), &issuer.name);
        assert_ne!(cert.serial_number(), issuer.serial);
        assert!(!cert.is_ca().unwrap());
        assert_eq!(
            cert.key_usage().unwrap().unwrap().0,
            FlagSet::from(KeyUsages::DigitalSignature)
        );
        assert_eq!(
            cert.extended_key_usage().unwrap(),
            vec![ExtendedKeyUsageOption::ClientAuth]
        );
        assert!(cert.subject_alt_names().unwrap().is_empty());

        let aki = cert
            .find_extension::<AuthorityKeyIdentifier>()
            .unwrap()
            .unwrap();
        assert_eq!(
            aki.key_identifier,
            key_identifier(&issuer.key.public_key()).unwrap()
        );
        cert.verify_signed_by(&issuer.key.public_key()).unwrap();
    }

    #[test]
    fn test_issue_rejects_inverted_validity() {
        let issuer = fixed_issuer();
        let subject_key = KeyPair::generate_ecdsa_p256();
        let mut validity = Validity::for_days(10);
        std::mem::swap(&mut validity.not_before, &mut validity.not_after);
        assert!(matches!(
            issuer.issue(&request_for(&subject_key), validity),
            Err(CertMintError::CertificateError(_))
        ));
    }

    #[test]
    fn test_issue_with_foreign_algorithm_fails() {
        let issuer = fixed_issuer();
        let subject_key = KeyPair::generate_ecdsa_p256();
        assert!(matches!(
            issuer.issue_with_algorithm(
                &request_for(&subject_key),
                Validity::for_days(10),
                SignatureAlgorithm::Sha256WithRSA,
            ),
            Err(CertMintError::SigningError(_))
        ));
    }
}
