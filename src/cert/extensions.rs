//! The X.509 extensions this crate writes into certificates, and reads back out of them.

use std::net::IpAddr;

use const_oid::AssociatedOid;
use const_oid::db::rfc5912::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use der::asn1::{Ia5String, OctetString};
use der::oid::ObjectIdentifier;
use der::{Decode, Encode};
use x509_cert::ext::pkix;
use x509_cert::ext::pkix::name::GeneralName;

pub use der::flagset::FlagSet;
pub use x509_cert::ext::pkix::KeyUsages;

use super::params::SanEntry;
use crate::error::{CertMintError, Result};

/// An extension with a fixed OID whose `extnValue` can be built and parsed.
///
/// # Example
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
/// use certmint::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// use certmint::cert::params::SanEntry;
///
/// let san = SubjectAltName {
///     names: vec![SanEntry::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST))],
/// };
/// let value = san.to_x509_extension_value().unwrap();
/// assert_eq!(SubjectAltName::from_x509_extension_value(&value).unwrap().names, san.names);
/// ```
pub trait ToAndFromX509Extension {
    /// Identifies the extension in a certificate.
    const OID: ObjectIdentifier;

    /// The DER carried inside the extension's `extnValue` OCTET STRING.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Parses the DER carried inside the extension's `extnValue` OCTET STRING.
    fn from_x509_extension_value(value: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

fn encoding_error(err: der::Error) -> CertMintError {
    CertMintError::EncodingError(err.to_string())
}

/// Identities a certificate is valid for besides its subject name.
///
/// Device certificates carry the IP addresses and DNS names the device is reached
/// at. General names of other kinds are skipped when reading.
#[derive(Debug, Clone, Default)]
pub struct SubjectAltName {
    pub names: Vec<SanEntry>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let general_names = self
            .names
            .iter()
            .map(|entry| match entry {
                SanEntry::Dns(dns) => Ia5String::new(dns)
                    .map(GeneralName::DnsName)
                    .map_err(|e| CertMintError::InvalidInput(format!("DNS name {dns:?}: {e}"))),
                SanEntry::Ip(ip) => {
                    let octets = match ip {
                        IpAddr::V4(v4) => v4.octets().to_vec(),
                        IpAddr::V6(v6) => v6.octets().to_vec(),
                    };
                    OctetString::new(octets)
                        .map(GeneralName::IpAddress)
                        .map_err(encoding_error)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        pkix::SubjectAltName(general_names)
            .to_der()
            .map_err(encoding_error)
    }

    fn from_x509_extension_value(value: &[u8]) -> Result<Self> {
        let mut names = Vec::new();
        for general_name in pkix::SubjectAltName::from_der(value)?.0 {
            match general_name {
                GeneralName::DnsName(dns) => names.push(SanEntry::Dns(dns.to_string())),
                GeneralName::IpAddress(octets) => {
                    names.push(SanEntry::Ip(ip_from_octets(octets.as_bytes())?))
                }
                _ => {}
            }
        }
        Ok(Self { names })
    }
}

fn ip_from_octets(octets: &[u8]) -> Result<IpAddr> {
    match octets.len() {
        4 => Ok(IpAddr::from(<[u8; 4]>::try_from(octets).unwrap_or_default())),
        16 => Ok(IpAddr::from(<[u8; 16]>::try_from(octets).unwrap_or_default())),
        len => Err(CertMintError::DecodeError(format!(
            "IP address of {len} bytes in SubjectAltName"
        ))),
    }
}

/// Whether the subject may act as a CA.
///
/// Always written critical. `max_path_length` limits how many intermediates may
/// follow and is left unset by every issuing operation here.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u32>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let path_len_constraint = match self.max_path_length {
            Some(len) => Some(u8::try_from(len).map_err(|_| {
                CertMintError::InvalidInput(format!("path length {len} above 255"))
            })?),
            None => None,
        };

        pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint,
        }
        .to_der()
        .map_err(encoding_error)
    }

    fn from_x509_extension_value(value: &[u8]) -> Result<Self> {
        let constraints = pkix::BasicConstraints::from_der(value)?;
        Ok(Self {
            is_ca: constraints.ca,
            max_path_length: constraints.path_len_constraint.map(u32::from),
        })
    }
}

/// The cryptographic operations the subject key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <pkix::KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        pkix::KeyUsage(self.0).to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(value: &[u8]) -> Result<Self> {
        Ok(Self(pkix::KeyUsage::from_der(value)?.0))
    }
}

/// The protocols the certificate may authenticate in.
#[derive(Debug, Clone, Default)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let purposes = self.usage.iter().copied().map(ObjectIdentifier::from).collect();
        pkix::ExtendedKeyUsage(purposes)
            .to_der()
            .map_err(encoding_error)
    }

    fn from_x509_extension_value(value: &[u8]) -> Result<Self> {
        let usage = pkix::ExtendedKeyUsage::from_der(value)?
            .0
            .into_iter()
            .map(ExtendedKeyUsageOption::from)
            .collect();
        Ok(Self { usage })
    }
}

/// A key purpose in the ExtendedKeyUsage extension.
///
/// Certificates loaded from disk may name purposes this crate never issues; those are
/// kept as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    /// TLS server authentication.
    ServerAuth,
    /// TLS client authentication.
    ClientAuth,
    Other(ObjectIdentifier),
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::Other(oid) => oid,
        }
    }
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(oid: ObjectIdentifier) -> Self {
        match oid {
            ID_KP_SERVER_AUTH => ExtendedKeyUsageOption::ServerAuth,
            ID_KP_CLIENT_AUTH => ExtendedKeyUsageOption::ClientAuth,
            other => ExtendedKeyUsageOption::Other(other),
        }
    }
}

/// SHA-1 of the subject public key bits (RFC 5280, 4.2.1.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let id = OctetString::new(self.0.as_slice()).map_err(encoding_error)?;
        pkix::SubjectKeyIdentifier(id)
            .to_der()
            .map_err(encoding_error)
    }

    fn from_x509_extension_value(value: &[u8]) -> Result<Self> {
        let ski = pkix::SubjectKeyIdentifier::from_der(value)?;
        Ok(Self(ski.0.into_bytes()))
    }
}

/// Points at the key that signed the certificate, by its key identifier only.
///
/// Issuer name and serial forms are ignored when reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let key_identifier =
            OctetString::new(self.key_identifier.as_slice()).map_err(encoding_error)?;
        pkix::AuthorityKeyIdentifier {
            key_identifier: Some(key_identifier),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        }
        .to_der()
        .map_err(encoding_error)
    }

    fn from_x509_extension_value(value: &[u8]) -> Result<Self> {
        let aki = pkix::AuthorityKeyIdentifier::from_der(value)?;
        Ok(Self {
            key_identifier: aki.key_identifier.map(OctetString::into_bytes).unwrap_or_default(),
        })
    }
}
