//! HMAC signing and verification over canonicalized payloads.
//!
//! Everything here is a pure function of its inputs. Verification fails closed:
//! a missing or empty secret, or a signature that does not decode, is a mismatch.

pub mod paytr;

use crate::errors::ServiceError;
use base64::{engine::general_purpose, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

pub use paytr::{PaytrSigner, TokenSignature};

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// Ordered key→value pairs. The canonical form is the concatenation of the values
/// in insertion order; keys only document what went in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedFields {
    fields: Vec<(&'static str, String)>,
}

impl SignedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub fn canonical(&self) -> String {
        self.fields.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }
}

fn non_empty(secret: Option<&str>) -> Option<&str> {
    secret.filter(|s| !s.is_empty())
}

/// HMAC-SHA256 over the canonical fields, base64 encoded.
pub fn sign(fields: &SignedFields, secret: &str) -> Result<String, ServiceError> {
    if secret.is_empty() {
        return Err(ServiceError::ConfigurationError(
            "signing secret is empty".to_string(),
        ));
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("hmac key rejected: {}", e)))?;
    mac.update(fields.canonical().as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a base64 HMAC-SHA256 signature.
pub fn verify(fields: &SignedFields, secret: Option<&str>, signature: &str) -> bool {
    let Some(secret) = non_empty(secret) else {
        return false;
    };
    let Ok(provided) = general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(fields.canonical().as_bytes());
    mac.verify_slice(&provided).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEncoding {
    Hex,
    Base64,
}

/// Signature scheme of a JSON-webhook provider: HMAC over the raw body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookScheme {
    pub algorithm: HashAlgorithm,
    pub encoding: DigestEncoding,
}

impl WebhookScheme {
    pub const fn new(algorithm: HashAlgorithm, encoding: DigestEncoding) -> Self {
        Self {
            algorithm,
            encoding,
        }
    }

    fn digest(&self, payload: &[u8], secret: &str) -> Option<Vec<u8>> {
        match self.algorithm {
            HashAlgorithm::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
                mac.update(payload);
                Some(mac.finalize().into_bytes().to_vec())
            }
            HashAlgorithm::Sha1 => {
                let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
                mac.update(payload);
                Some(mac.finalize().into_bytes().to_vec())
            }
        }
    }

    fn decode(&self, signature: &str) -> Option<Vec<u8>> {
        let signature = signature.trim();
        match self.encoding {
            DigestEncoding::Hex => hex::decode(signature.to_ascii_lowercase()).ok(),
            DigestEncoding::Base64 => general_purpose::STANDARD.decode(signature).ok(),
        }
    }

    pub fn sign(&self, payload: &[u8], secret: &str) -> Result<String, ServiceError> {
        if secret.is_empty() {
            return Err(ServiceError::ConfigurationError(
                "webhook secret is empty".to_string(),
            ));
        }
        let digest = self
            .digest(payload, secret)
            .ok_or_else(|| ServiceError::InternalError("hmac key rejected".to_string()))?;
        Ok(match self.encoding {
            DigestEncoding::Hex => hex::encode(digest),
            DigestEncoding::Base64 => general_purpose::STANDARD.encode(digest),
        })
    }

    pub fn verify(&self, payload: &[u8], secret: Option<&str>, signature: &str) -> bool {
        let Some(secret) = non_empty(secret) else {
            return false;
        };
        let Some(provided) = self.decode(signature) else {
            return false;
        };
        match self.algorithm {
            HashAlgorithm::Sha256 => HmacSha256::new_from_slice(secret.as_bytes())
                .map(|mut mac| {
                    mac.update(payload);
                    mac.verify_slice(&provided).is_ok()
                })
                .unwrap_or(false),
            HashAlgorithm::Sha1 => HmacSha1::new_from_slice(secret.as_bytes())
                .map(|mut mac| {
                    mac.update(payload);
                    mac.verify_slice(&provided).is_ok()
                })
                .unwrap_or(false),
        }
    }
}
