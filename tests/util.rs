#![allow(dead_code)]

use certmint::authority::{CertificateAuthority, create_authority};
use certmint::cert::params::DistinguishedName;
use certmint::config::AuthorityConfig;
use certmint::csr::CertificateSigningRequest;
use certmint::key::{KeyAlgorithm, KeyPair};
use der::asn1::AnyRef;
use der::{Decode, Encode, Reader, SliceReader};

pub fn acme_subject() -> DistinguishedName {
    DistinguishedName::builder()
        .organization("Acme".to_string())
        .country("US".to_string())
        .common_name("Acme Device CA".to_string())
        .build()
}

pub fn device_subject(common_name: &str) -> DistinguishedName {
    DistinguishedName::builder()
        .organization("Acme".to_string())
        .common_name(common_name.to_string())
        .build()
}

/// A P-256 authority: fast to generate and fine wherever key strength does not matter.
pub fn generate_ca() -> CertificateAuthority {
    generate_ca_with(KeyAlgorithm::EcdsaP256)
}

pub fn generate_ca_with(key_algorithm: KeyAlgorithm) -> CertificateAuthority {
    create_authority(
        &AuthorityConfig::builder()
            .subject(acme_subject())
            .key_algorithm(key_algorithm)
            .build(),
    )
    .unwrap()
}

pub fn generate_csr(common_name: &str) -> (CertificateSigningRequest, KeyPair) {
    let key = KeyPair::generate_ecdsa_p256();
    let csr = CertificateSigningRequest::generate(&device_subject(common_name), &key).unwrap();
    (csr, key)
}

/// Returns the PEM of `csr` with one bit of its signature flipped.
pub fn tampered_csr_pem(csr: &CertificateSigningRequest) -> String {
    let mut der = csr.to_der().to_vec();
    let index = der.len() - 5;
    der[index] ^= 0x01;
    certmint::pem_utils::armor(certmint::pem_utils::PemLabel::CertificateRequest, &der)
}

/// Re-encodes a certificate so every non-critical extension spells out
/// `critical BOOLEAN FALSE`, which DER would leave out. The signature is kept, so the
/// result is a valid BER certificate that no longer matches its canonical re-encoding.
pub fn with_explicit_criticality(cert_der: &[u8]) -> Vec<u8> {
    let mut cert = children(cert_der);
    let mut tbs = children(&cert[0]);
    let extensions_field = tbs.last_mut().unwrap();
    assert_eq!(extensions_field[0], 0xA3, "certificate has no extensions");

    let extensions: Vec<u8> = children(&children(extensions_field)[0])
        .into_iter()
        .flat_map(|extension| {
            let mut fields = children(&extension);
            if fields.len() == 2 {
                fields.insert(1, vec![0x01, 0x01, 0x00]);
            }
            tlv(0x30, &fields.concat())
        })
        .collect();
    *extensions_field = tlv(0xA3, &tlv(0x30, &extensions));
    cert[0] = tlv(0x30, &tbs.concat());
    tlv(0x30, &cert.concat())
}

/// The encoded elements inside a constructed TLV.
fn children(der: &[u8]) -> Vec<Vec<u8>> {
    let outer = AnyRef::from_der(der).unwrap();
    let mut reader = SliceReader::new(outer.value()).unwrap();
    let mut elements = Vec::new();
    while !reader.is_finished() {
        elements.push(AnyRef::decode(&mut reader).unwrap().to_der().unwrap());
    }
    elements
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if content.len() < 0x80 {
        out.push(content.len() as u8);
    } else {
        let len = content.len().to_be_bytes();
        let skip = len.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (len.len() - skip) as u8);
        out.extend_from_slice(&len[skip..]);
    }
    out.extend_from_slice(content);
    out
}
