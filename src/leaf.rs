use tracing::{info, warn};

use crate::authority::CertificateAuthority;
use crate::cert::CertificateWithPrivateKey;
use crate::cert::extensions::{ExtendedKeyUsageOption, KeyUsages};
use crate::cert::params::{CertificationRequestInfo, SanEntry, Validity};
use crate::config::LeafConfig;
use crate::error::Result;
use crate::issuer::Issuer;
use crate::store::generate_key_pair;

/// Generates a fresh key pair and issues a leaf certificate for it, signed by `authority`.
///
/// The leaf is usable for both TLS client and server authentication, names every IP
/// address and DNS name from `config` in its SubjectAltName, and never outlives the
/// authority: its `notAfter` is capped at the CA's `notAfter`.
pub fn issue_leaf(
    authority: &CertificateAuthority,
    config: &LeafConfig,
) -> Result<CertificateWithPrivateKey> {
    let key = generate_key_pair(config.key_algorithm)?;

    let subject_alt_names = config
        .ip_addresses
        .iter()
        .copied()
        .map(SanEntry::Ip)
        .chain(config.dns_names.iter().cloned().map(SanEntry::Dns))
        .collect();

    let cert_info = CertificationRequestInfo::builder()
        .subject(config.subject.as_x509_name()?)
        .subject_public_key(key.public_key())
        .key_usage(KeyUsages::DigitalSignature.into())
        .usages(vec![
            ExtendedKeyUsageOption::ClientAuth,
            ExtendedKeyUsageOption::ServerAuth,
        ])
        .subject_alt_names(subject_alt_names)
        .build();

    let mut validity = Validity::for_years(config.validity_years)?;
    let ca_not_after = authority.certificate().not_after();
    if validity.clamp_to(ca_not_after) {
        warn!(
            requested_years = config.validity_years,
            not_after = %ca_not_after,
            "leaf validity exceeds the authority, capping at the authority's expiry"
        );
    }

    let cert = authority.issue(&cert_info, validity)?;
    info!(
        subject = %cert.subject_name(),
        serial = %cert.serial_hex(),
        issuer = %cert.issuer_name(),
        "issued leaf certificate"
    );

    Ok(CertificateWithPrivateKey { cert, key })
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::authority::create_authority;
    use crate::cert::extensions::FlagSet;
    use crate::cert::params::DistinguishedName;
    use crate::config::AuthorityConfig;
    use crate::key::KeyAlgorithm;

    fn authority(validity_years: u16) -> CertificateAuthority {
        create_authority(
            &AuthorityConfig::builder()
                .key_algorithm(KeyAlgorithm::EcdsaP256)
                .validity_years(validity_years)
                .build(),
        )
        .unwrap()
    }

    fn leaf_config() -> LeafConfig {
        LeafConfig::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("device-42".to_string())
                    .build(),
            )
            .key_algorithm(KeyAlgorithm::EcdsaP256)
            .dns_names(vec!["device-42.local".to_string()])
            .build()
    }

    #[test]
    fn test_leaf_profile() {
        let ca = authority(10);
        let leaf = issue_leaf(&ca, &leaf_config()).unwrap();
        let cert = &leaf.cert;

        assert_eq!(cert.issuer_name(), ca.certificate().subject_name());
        assert!(!cert.is_ca().unwrap());
        assert_eq!(
            cert.key_usage().unwrap().unwrap().0,
            FlagSet::from(KeyUsages::DigitalSignature)
        );
        assert_eq!(
            cert.extended_key_usage().unwrap(),
            vec![
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::ServerAuth
            ]
        );
        assert_eq!(
            cert.subject_alt_names().unwrap(),
            vec![
                SanEntry::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                SanEntry::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
                SanEntry::Dns("device-42.local".to_string()),
            ]
        );
        assert_eq!(cert.public_key().unwrap(), leaf.key.public_key());
        assert_ne!(cert.serial_number(), ca.certificate().serial_number());
        cert.verify_signed_by(&ca.key_pair().public_key()).unwrap();
    }

    #[test]
    fn test_leaf_is_capped_by_authority() {
        let ca = authority(1);
        let leaf = issue_leaf(&ca, &leaf_config()).unwrap();
        assert_eq!(leaf.cert.not_after(), ca.certificate().not_after());
    }

    #[test]
    fn test_leaf_inside_authority_keeps_requested_validity() {
        let ca = authority(10);
        let leaf = issue_leaf(&ca, &leaf_config()).unwrap();
        let validity = leaf.cert.validity();
        assert_eq!(validity.not_after.year() - validity.not_before.year(), 2);
        assert!(leaf.cert.not_after() < ca.certificate().not_after());
    }
}
