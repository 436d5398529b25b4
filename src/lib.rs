//! # certmint - A Minimal Pure Rust PKI Issuance Engine
//!
//! certmint creates a private certificate authority for a fleet of devices and issues the
//! certificates those devices use for mutual TLS. It is built entirely on RustCrypto
//! libraries, without dependencies on ring or openssl (except for testing).
//!
//! ## What It Does
//!
//! - **Authorities**: create a self-signed CA and persist it as a `.key`/`.crt` pair
//! - **Leaf certificates**: issue client/server certificates with a freshly generated key
//! - **CSR signing**: verify a PKCS#10 request and emit the signed leaf followed by the CA
//!   certificate, ready to be installed on the requesting device
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048, 3072, and 4096-bit keys (the default is 4096)
//! - **ECDSA**: P-256 and P-384 curves
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! ## Quick Start
//!
//! ### Creating an Authority and a Leaf Certificate
//!
//! ```rust,no_run
//! use certmint::{
//!     authority::create_authority,
//!     cert::params::DistinguishedName,
//!     config::{AuthorityConfig, LeafConfig},
//!     leaf::issue_leaf,
//!     store::save_authority,
//! };
//!
//! # fn main() -> Result<(), certmint::error::CertMintError> {
//! let ca = create_authority(
//!     &AuthorityConfig::builder()
//!         .subject(DistinguishedName::builder().organization("Acme".to_string()).build())
//!         .build(),
//! )?;
//! save_authority(&ca, "ca.key", "ca.crt")?;
//!
//! let leaf = issue_leaf(
//!     &ca,
//!     &LeafConfig::builder()
//!         .subject(DistinguishedName::builder().common_name("device-42".to_string()).build())
//!         .build(),
//! )?;
//! println!("{}", leaf.cert_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Signing a Certificate Signing Request
//!
//! ```rust,no_run
//! use certmint::{config::CsrSigningConfig, csr::sign_csr_file};
//!
//! # fn main() -> Result<(), certmint::error::CertMintError> {
//! let mut chain = Vec::new();
//! sign_csr_file("device.csr", "ca.crt", "ca.key", &CsrSigningConfig::default(), &mut chain)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::Result`]. Failures are reported before anything is
//! written:
//!
//! ```rust,no_run
//! use certmint::{error::CertMintError, store::load_authority};
//!
//! match load_authority("ca.key", "ca.crt") {
//!     Ok(ca) => println!("loaded {}", ca.certificate().subject_name()),
//!     Err(CertMintError::StoreNotFoundError(path)) => println!("missing {}", path.display()),
//!     Err(CertMintError::KeyMismatchError(msg)) => println!("wrong key: {msg}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Logging
//!
//! Events are emitted through `tracing`. The crate installs no subscriber.
//!
//! ## Module Organization
//!
//! - [`authority`]: Creating and holding a certificate authority
//! - [`leaf`]: Issuing leaf certificates with generated keys
//! - [`csr`]: Parsing, verifying and signing certificate signing requests
//! - [`store`]: Key generation and the authority's files
//! - [`config`]: Parameters for each operation
//! - [`key`]: Key pairs, public keys, signing and verification
//! - [`cert`]: Certificates, names, validity and extensions
//! - [`issuer`]: The signing core shared by every issuing operation
//! - [`pem_utils`]: PEM armor and unarmor
//! - [`tbs_certificate`]: Low-level certificate structure
//! - [`error`]: Error type

pub mod authority;
pub mod cert;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod leaf;
pub mod pem_utils;
pub mod store;
pub mod tbs_certificate;
