use std::fmt;

use const_oid::ObjectIdentifier;
use der::Encode;
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{CertMintError, Result};
use crate::pem_utils::{self, PemLabel};

/// RSA moduli accepted for generation.
pub const SUPPORTED_RSA_BITS: [usize; 3] = [2048, 3072, 4096];

/// The algorithm and strength used when generating a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa { bits: usize },
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        KeyAlgorithm::Rsa { bits: 4096 }
    }
}

/// Supported key types for certificate operations.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a key pair for the given algorithm.
    pub fn generate(algorithm: KeyAlgorithm) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Rsa { bits } => Self::generate_rsa(bits),
            KeyAlgorithm::EcdsaP256 => Ok(Self::generate_ecdsa_p256()),
            KeyAlgorithm::EcdsaP384 => Ok(Self::generate_ecdsa_p384()),
            KeyAlgorithm::Ed25519 => Ok(Self::generate_ed25519()),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        if !SUPPORTED_RSA_BITS.contains(&bits) {
            return Err(CertMintError::InvalidInput(format!(
                "unsupported RSA key size {bits}"
            )));
        }
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertMintError::KeyGenerationError(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let signing_key = P256SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let signing_key = P384SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut rand_core::OsRng);
        KeyPair::Ed25519 { signing_key }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa { public, .. } => KeyAlgorithm::Rsa {
                bits: rsa::traits::PublicKeyParts::size(public) * 8,
            },
            KeyPair::EcdsaP256 { .. } => KeyAlgorithm::EcdsaP256,
            KeyPair::EcdsaP384 { .. } => KeyAlgorithm::EcdsaP384,
            KeyPair::Ed25519 { .. } => KeyAlgorithm::Ed25519,
        }
    }

    /// Returns the public half of this key pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// The SubjectPublicKeyInfo of the public half, as embedded in certificates.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Signs `data` with this key using `algorithm`.
    ///
    /// ECDSA signatures are returned DER-encoded, as X.509 and PKCS#10 carry them.
    /// Fails with `SigningError` when `algorithm` does not belong to this key type.
    pub fn sign_data(&self, data: &[u8], algorithm: &SignatureAlgorithm) -> Result<Vec<u8>> {
        let signing_error = |e: rsa::signature::Error| CertMintError::SigningError(e.to_string());
        match (self, algorithm) {
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha256WithRSA) => {
                let signing_key = RsaSigningKey::<Sha256>::new(private.as_ref().clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha384WithRSA) => {
                let signing_key = RsaSigningKey::<Sha384>::new(private.as_ref().clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha512WithRSA) => {
                let signing_key = RsaSigningKey::<Sha512>::new(private.as_ref().clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::EcdsaP256 { signing_key, .. }, SignatureAlgorithm::Sha256WithECDSA) => {
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::EcdsaP384 { signing_key, .. }, SignatureAlgorithm::Sha384WithECDSA) => {
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::Ed25519 { signing_key }, SignatureAlgorithm::Ed25519) => {
                let signature = signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_bytes().to_vec())
            }
            (key, algorithm) => Err(CertMintError::SigningError(format!(
                "{:?} key cannot produce {algorithm:?} signatures",
                key.algorithm()
            ))),
        }
    }

    /// Encodes the private key as PEM.
    ///
    /// RSA keys are written as PKCS#1 `RSA PRIVATE KEY`, every other type as PKCS#8
    /// `PRIVATE KEY`.
    pub fn to_pem(&self) -> Result<String> {
        let encoding_error = |e: String| CertMintError::EncodingError(e);
        let (label, document) = match self {
            KeyPair::Rsa { private, .. } => (
                PemLabel::RsaPrivateKey,
                private
                    .to_pkcs1_der()
                    .map_err(|e| encoding_error(e.to_string()))?,
            ),
            KeyPair::EcdsaP256 { signing_key, .. } => (
                PemLabel::PrivateKey,
                signing_key
                    .to_pkcs8_der()
                    .map_err(|e| encoding_error(e.to_string()))?,
            ),
            KeyPair::EcdsaP384 { signing_key, .. } => (
                PemLabel::PrivateKey,
                signing_key
                    .to_pkcs8_der()
                    .map_err(|e| encoding_error(e.to_string()))?,
            ),
            KeyPair::Ed25519 { signing_key } => (
                PemLabel::PrivateKey,
                signing_key
                    .to_pkcs8_der()
                    .map_err(|e| encoding_error(e.to_string()))?,
            ),
        };
        Ok(pem_utils::armor(label, document.as_bytes()))
    }

    /// Imports a private key from PEM text holding exactly one private key block.
    pub fn from_pem(text: &str) -> Result<Self> {
        let (label, der) = pem_utils::unarmor_expecting(text, |l| l.is_private_key())?;
        Self::import_from_der(label, &der)
    }

    /// Imports a private key from DER, interpreted according to `label`.
    pub fn import_from_der(label: PemLabel, der: &[u8]) -> Result<Self> {
        let decode_error = |e: String| CertMintError::DecodeError(format!("private key: {e}"));
        match label {
            PemLabel::RsaPrivateKey => {
                let private =
                    RsaPrivateKey::from_pkcs1_der(der).map_err(|e| decode_error(e.to_string()))?;
                Ok(Self::from_rsa(private))
            }
            PemLabel::PrivateKey => {
                let info =
                    pkcs8::PrivateKeyInfo::try_from(der).map_err(|e| decode_error(e.to_string()))?;
                match info.algorithm.oid {
                    const_oid::db::rfc5912::RSA_ENCRYPTION => {
                        let private = RsaPrivateKey::from_pkcs8_der(der)
                            .map_err(|e| decode_error(e.to_string()))?;
                        Ok(Self::from_rsa(private))
                    }
                    const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                        let curve = info
                            .algorithm
                            .parameters_oid()
                            .map_err(|e| decode_error(e.to_string()))?;
                        match curve {
                            const_oid::db::rfc5912::SECP_256_R_1 => {
                                let signing_key = P256SigningKey::from_pkcs8_der(der)
                                    .map_err(|e| decode_error(e.to_string()))?;
                                let verifying_key = *signing_key.verifying_key();
                                Ok(KeyPair::EcdsaP256 {
                                    signing_key,
                                    verifying_key,
                                })
                            }
                            const_oid::db::rfc5912::SECP_384_R_1 => {
                                let signing_key = P384SigningKey::from_pkcs8_der(der)
                                    .map_err(|e| decode_error(e.to_string()))?;
                                let verifying_key = *signing_key.verifying_key();
                                Ok(KeyPair::EcdsaP384 {
                                    signing_key,
                                    verifying_key,
                                })
                            }
                            other => Err(decode_error(format!("unsupported curve {other}"))),
                        }
                    }
                    const_oid::db::rfc8410::ID_ED_25519 => {
                        let signing_key = Ed25519SigningKey::from_pkcs8_der(der)
                            .map_err(|e| decode_error(e.to_string()))?;
                        Ok(KeyPair::Ed25519 { signing_key })
                    }
                    other => Err(decode_error(format!("unsupported key algorithm {other}"))),
                }
            }
            other => Err(decode_error(format!(
                "`{}` block does not hold a private key",
                other.as_str()
            ))),
        }
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }
}

/// The public half of a [`KeyPair`], or a key taken from a certificate or request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// Parses the key out of a certificate's or request's SubjectPublicKeyInfo.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let decode_error = |e: String| CertMintError::DecodeError(format!("public key: {e}"));
        match spki.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                let der = spki.to_der()?;
                RsaPublicKey::from_public_key_der(&der)
                    .map(PublicKey::Rsa)
                    .map_err(|e| decode_error(e.to_string()))
            }
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let curve: ObjectIdentifier = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| decode_error("EC key without curve parameter".to_string()))?
                    .decode_as()?;
                let der = spki.to_der()?;
                match curve {
                    const_oid::db::rfc5912::SECP_256_R_1 => {
                        P256VerifyingKey::from_public_key_der(&der)
                            .map(PublicKey::EcdsaP256)
                            .map_err(|e| decode_error(e.to_string()))
                    }
                    const_oid::db::rfc5912::SECP_384_R_1 => {
                        P384VerifyingKey::from_public_key_der(&der)
                            .map(PublicKey::EcdsaP384)
                            .map_err(|e| decode_error(e.to_string()))
                    }
                    other => Err(decode_error(format!("unsupported curve {other}"))),
                }
            }
            const_oid::db::rfc8410::ID_ED_25519 => {
                let bytes: [u8; 32] = spki
                    .subject_public_key
                    .raw_bytes()
                    .try_into()
                    .map_err(|_| decode_error("Ed25519 key must be 32 bytes".to_string()))?;
                Ed25519VerifyingKey::from_bytes(&bytes)
                    .map(PublicKey::Ed25519)
                    .map_err(|e| decode_error(e.to_string()))
            }
            other => Err(decode_error(format!("unsupported key algorithm {other}"))),
        }
    }

    /// Encodes the key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let encoding_error = |e: x509_cert::spki::Error| CertMintError::EncodingError(e.to_string());
        match self {
            PublicKey::Rsa(public) => {
                SubjectPublicKeyInfoOwned::from_key(public.clone()).map_err(encoding_error)
            }
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key).map_err(encoding_error)
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key).map_err(encoding_error)
            }
            PublicKey::Ed25519(verifying_key) => Ok(SubjectPublicKeyInfoOwned {
                algorithm: x509_cert::spki::AlgorithmIdentifierOwned {
                    oid: const_oid::db::rfc8410::ID_ED_25519,
                    parameters: None,
                },
                subject_public_key: der::asn1::BitString::from_bytes(&verifying_key.to_bytes())
                    .map_err(|e| CertMintError::EncodingError(e.to_string()))?,
            }),
        }
    }

    /// Verifies `signature` over `message`, made with `algorithm`.
    ///
    /// Any failure, including an algorithm that does not fit this key type, is a
    /// `SignatureVerificationError`.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        algorithm: &SignatureAlgorithm,
    ) -> Result<()> {
        let invalid = |e: String| CertMintError::SignatureVerificationError(e);
        match (self, algorithm) {
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha256WithRSA) => {
                let signature = RsaSignature::try_from(signature).map_err(|e| invalid(e.to_string()))?;
                RsaVerifyingKey::<Sha256>::new(public.clone())
                    .verify(message, &signature)
                    .map_err(|e| invalid(e.to_string()))
            }
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha384WithRSA) => {
                let signature = RsaSignature::try_from(signature).map_err(|e| invalid(e.to_string()))?;
                RsaVerifyingKey::<Sha384>::new(public.clone())
                    .verify(message, &signature)
                    .map_err(|e| invalid(e.to_string()))
            }
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha512WithRSA) => {
                let signature = RsaSignature::try_from(signature).map_err(|e| invalid(e.to_string()))?;
                RsaVerifyingKey::<Sha512>::new(public.clone())
                    .verify(message, &signature)
                    .map_err(|e| invalid(e.to_string()))
            }
            (PublicKey::EcdsaP256(verifying_key), SignatureAlgorithm::Sha256WithECDSA) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|e| invalid(e.to_string()))?;
                verifying_key
                    .verify(message, &signature)
                    .map_err(|e| invalid(e.to_string()))
            }
            (PublicKey::EcdsaP384(verifying_key), SignatureAlgorithm::Sha384WithECDSA) => {
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|e| invalid(e.to_string()))?;
                verifying_key
                    .verify(message, &signature)
                    .map_err(|e| invalid(e.to_string()))
            }
            (PublicKey::Ed25519(verifying_key), SignatureAlgorithm::Ed25519) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|e| invalid(e.to_string()))?;
                verifying_key
                    .verify_strict(message, &signature)
                    .map_err(|e| invalid(e.to_string()))
            }
            (_, algorithm) => Err(invalid(format!(
                "{algorithm:?} signatures do not apply to this key type"
            ))),
        }
    }
}
