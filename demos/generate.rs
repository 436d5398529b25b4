use certmint::authority::create_authority;
use certmint::cert::params::DistinguishedName;
use certmint::config::{AuthorityConfig, CsrSigningConfig, LeafConfig};
use certmint::csr::{CertificateSigningRequest, sign_csr_to_writer};
use certmint::key::{KeyAlgorithm, KeyPair};
use certmint::leaf::issue_leaf;

fn main() -> certmint::error::Result<()> {
    // Create the CA (use KeyAlgorithm::default() for RSA-4096)
    let ca = create_authority(
        &AuthorityConfig::builder()
            .subject(
                DistinguishedName::builder()
                    .organization("Acme".to_string())
                    .common_name("Acme Device CA".to_string())
                    .build(),
            )
            .key_algorithm(KeyAlgorithm::EcdsaP256)
            .build(),
    )?;
    println!("CA Certificate PEM:\n{}", ca.cert_pem()?);

    // A leaf for the local machine, with a key generated here
    let server = issue_leaf(
        &ca,
        &LeafConfig::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("myserver.local".to_string())
                    .build(),
            )
            .key_algorithm(KeyAlgorithm::EcdsaP256)
            .dns_names(vec!["myserver.local".to_string()])
            .build(),
    )?;
    println!("Server Certificate PEM:\n{}", server.cert_pem()?);

    // A device keeps its key and only sends a request
    let device_key = KeyPair::generate_ed25519();
    let csr = CertificateSigningRequest::generate(
        &DistinguishedName::builder()
            .common_name("device-42".to_string())
            .build(),
        &device_key,
    )?;

    println!("Device chain PEM:");
    sign_csr_to_writer(
        &csr.to_pem(),
        &ca,
        &CsrSigningConfig::default(),
        &mut std::io::stdout(),
    )
}
