//! Signing of PKCS#10 certificate signing requests.
//!
//! A request goes through three stages, each of which must succeed before the next
//! one runs: parse, verify the request's self-signature, issue. The resulting chain
//! is assembled in memory and only then handed to the output sink, so a rejected
//! request never produces partial output.
//!
//! # Example
//! ```rust,no_run
//! use certmint::config::CsrSigningConfig;
//! use certmint::csr::sign_csr_file;
//!
//! # fn main() -> certmint::error::Result<()> {
//! let mut out = std::io::stdout();
//! sign_csr_file(
//!     "device.csr",
//!     "ca.crt",
//!     "ca.key",
//!     &CsrSigningConfig::default(),
//!     &mut out,
//! )?;
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::Path;

use der::asn1::BitString;
use der::{Decode, Encode};
use tracing::{debug, info, warn};
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};

use crate::authority::CertificateAuthority;
use crate::cert::extensions::{ExtendedKeyUsageOption, KeyUsages};
use crate::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use crate::cert::{Certificate, SignatureAlgorithm, signed_portion};
use crate::config::CsrSigningConfig;
use crate::error::{CertMintError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils::{self, PemLabel};
use crate::store;

/// A parsed PKCS#10 certificate signing request.
///
/// The DER the request was parsed from is kept so the self-signature is checked
/// against exactly the bytes the requester signed.
#[derive(Debug, Clone)]
pub struct CertificateSigningRequest {
    inner: CertReq,
    der: Vec<u8>,
}

impl CertificateSigningRequest {
    /// Parses a DER-encoded request.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der)
            .map_err(|e| CertMintError::DecodeError(format!("certificate request: {e}")))?;
        Ok(Self {
            inner,
            der: der.to_vec(),
        })
    }

    /// Parses PEM text holding exactly one `CERTIFICATE REQUEST` block.
    pub fn from_pem(text: &str) -> Result<Self> {
        let (_, der) =
            pem_utils::unarmor_expecting(text, |l| l == PemLabel::CertificateRequest)?;
        Self::from_der(&der)
    }

    /// Builds a request for `subject`, self-signed with `key`.
    pub fn generate(subject: &DistinguishedName, key: &KeyPair) -> Result<Self> {
        let algorithm = SignatureAlgorithm::for_key(key);
        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: Default::default(),
        };
        let info_der = info
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;
        let signature = key.sign_data(&info_der, &algorithm)?;

        let request = CertReq {
            info,
            algorithm: algorithm.algorithm_identifier(),
            signature: BitString::from_bytes(&signature)
                .map_err(|e| CertMintError::EncodingError(e.to_string()))?,
        };
        let der = request
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;
        Ok(Self { inner: request, der })
    }

    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        pem_utils::armor(PemLabel::CertificateRequest, &self.der)
    }

    /// The encoded subject name, copied verbatim into the issued certificate.
    pub fn subject_name(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.subject_name())
    }

    /// The public key the requester wants certified.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// The algorithm the requester signed the request with.
    ///
    /// An algorithm this crate cannot verify is reported as a
    /// `SignatureVerificationError`.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_algorithm_identifier(&self.inner.algorithm)
            .map_err(|e| CertMintError::SignatureVerificationError(e.to_string()))
    }

    /// Verifies the request's self-signature with its embedded public key.
    pub fn verify(&self) -> Result<()> {
        let algorithm = self.signature_algorithm()?;
        let public_key = self
            .public_key()
            .map_err(|e| CertMintError::SignatureVerificationError(e.to_string()))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CertMintError::SignatureVerificationError("signature has unused bits".to_string())
        })?;
        public_key.verify(&signed_portion(&self.der)?, signature, &algorithm)
    }
}

/// The output of CSR signing: the issued leaf followed by the authority that signed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificateChain {
    leaf: Certificate,
    authority: Certificate,
}

impl IssuedCertificateChain {
    pub fn leaf(&self) -> &Certificate {
        &self.leaf
    }

    pub fn authority(&self) -> &Certificate {
        &self.authority
    }

    /// Both certificates as concatenated PEM blocks, leaf first.
    pub fn to_pem(&self) -> Result<String> {
        let mut pem = self.leaf.to_pem()?;
        pem.push_str(&self.authority.to_pem()?);
        Ok(pem)
    }

    /// Writes the whole chain to `out` in one write and flushes it.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let pem = self.to_pem()?;
        out.write_all(pem.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| CertMintError::IoError(format!("writing certificate chain: {e}")))
    }
}

/// Verifies `csr` and issues a client certificate for it, signed by `authority`.
///
/// The certificate copies the request's subject and public key, carries KeyUsage
/// `digitalSignature` and ExtendedKeyUsage `clientAuth`, and is valid from now for
/// `config.validity_years` years. An RSA authority signs with the digest the requester
/// used. A leaf outliving its authority is logged but not shortened.
pub fn sign_csr(
    csr: &CertificateSigningRequest,
    authority: &CertificateAuthority,
    config: &CsrSigningConfig,
) -> Result<IssuedCertificateChain> {
    csr.verify()?;
    debug!(subject = %csr.subject_name(), "certificate request signature verified");

    let cert_info = CertificationRequestInfo::builder()
        .subject(csr.subject_name().clone())
        .subject_public_key(csr.public_key()?)
        .key_usage(KeyUsages::DigitalSignature.into())
        .usages(vec![ExtendedKeyUsageOption::ClientAuth])
        .build();

    let validity = Validity::for_years(config.validity_years)?;
    let ca_not_after = authority.certificate().not_after();
    if validity.not_after > ca_not_after {
        warn!(
            not_after = %validity.not_after,
            authority_not_after = %ca_not_after,
            "issued certificate outlives its authority"
        );
    }

    let algorithm =
        SignatureAlgorithm::for_key_preferring(authority.key_pair(), csr.signature_algorithm()?);
    let leaf = authority.issue_with_algorithm(&cert_info, validity, algorithm)?;
    info!(
        subject = %leaf.subject_name(),
        serial = %leaf.serial_hex(),
        not_after = %leaf.not_after(),
        "signed certificate request"
    );

    Ok(IssuedCertificateChain {
        leaf,
        authority: authority.certificate().clone(),
    })
}

/// Parses `csr_pem`, signs it with `authority` and writes the chain to `out`.
///
/// Nothing is written unless every stage succeeds.
pub fn sign_csr_to_writer<W: Write + ?Sized>(
    csr_pem: &str,
    authority: &CertificateAuthority,
    config: &CsrSigningConfig,
    out: &mut W,
) -> Result<()> {
    let csr = CertificateSigningRequest::from_pem(csr_pem)?;
    debug!(subject = %csr.subject_name(), "parsed certificate request");
    sign_csr(&csr, authority, config)?.write_to(out)
}

/// Signs the request stored at `csr_path` with the authority stored at
/// `ca_cert_path`/`ca_key_path` and writes the chain to `out`.
///
/// The authority is loaded from disk on every call.
pub fn sign_csr_file<W: Write + ?Sized>(
    csr_path: impl AsRef<Path>,
    ca_cert_path: impl AsRef<Path>,
    ca_key_path: impl AsRef<Path>,
    config: &CsrSigningConfig,
    out: &mut W,
) -> Result<()> {
    let csr_path = csr_path.as_ref();
    let csr_pem = store::read_pem_file(csr_path)?;
    let csr = CertificateSigningRequest::from_pem(&csr_pem)
        .map_err(|e| store::naming_file(csr_path, e))?;
    debug!(path = %csr_path.display(), subject = %csr.subject_name(), "parsed certificate request");

    let authority = store::load_authority(ca_key_path, ca_cert_path)?;
    sign_csr(&csr, &authority, config)?.write_to(out)
}
