//! Configuration values passed explicitly into each issuing operation.
//!
//! Every value has a builder (via `bon`) and a `Default` matching the placeholder
//! behaviour of a fresh deployment.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bon::Builder;

use crate::cert::params::DistinguishedName;
use crate::key::KeyAlgorithm;

/// Parameters for [`create_authority`](crate::authority::create_authority).
///
/// # Fields
/// * `subject` - The CA's identity. Also becomes the issuer of everything it signs.
/// * `key_algorithm` - Key type and strength of the CA key.
/// * `validity_years` - Calendar years from now until the CA expires.
#[derive(Clone, Debug, Builder)]
pub struct AuthorityConfig {
    #[builder(default = DistinguishedName::placeholder())]
    pub subject: DistinguishedName,
    #[builder(default)]
    pub key_algorithm: KeyAlgorithm,
    #[builder(default = 10)]
    pub validity_years: u16,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Parameters for [`issue_leaf`](crate::leaf::issue_leaf).
///
/// # Fields
/// * `subject` - The device identity.
/// * `key_algorithm` - Key type and strength of the generated leaf key.
/// * `ip_addresses` - IP addresses placed in the SubjectAltName extension.
/// * `dns_names` - DNS names placed in the SubjectAltName extension.
/// * `validity_years` - Calendar years from now until the leaf expires, capped by the CA.
#[derive(Clone, Debug, Builder)]
pub struct LeafConfig {
    #[builder(default = DistinguishedName::placeholder())]
    pub subject: DistinguishedName,
    #[builder(default)]
    pub key_algorithm: KeyAlgorithm,
    #[builder(default = vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)])]
    pub ip_addresses: Vec<IpAddr>,
    #[builder(default)]
    pub dns_names: Vec<String>,
    #[builder(default = 2)]
    pub validity_years: u16,
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Parameters for signing a certificate signing request.
#[derive(Clone, Debug, Builder)]
pub struct CsrSigningConfig {
    #[builder(default = 1)]
    pub validity_years: u16,
}

impl Default for CsrSigningConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let authority = AuthorityConfig::default();
        assert_eq!(authority.validity_years, 10);
        assert_eq!(authority.key_algorithm, KeyAlgorithm::Rsa { bits: 4096 });
        assert_eq!(
            authority.subject.organization.as_deref(),
            Some("Company, INC.")
        );

        let leaf = LeafConfig::default();
        assert_eq!(leaf.validity_years, 2);
        assert_eq!(
            leaf.ip_addresses,
            vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST)
            ]
        );

        assert_eq!(CsrSigningConfig::default().validity_years, 1);
    }
}
