//! Ledger identity and signature primitives.
//!
//! Accounts are ed25519 public keys. A signature travels "decorated" with a
//! 4-byte hint (the last bytes of the signer's public key) so the receiver can
//! find the probable signer without trying every key.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConstellationError, ConstellationResult};

/// Length of a signature hint in bytes.
pub const HINT_LEN: usize = 4;

/// Length of an ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Implements hex `Display`/`FromStr`/serde for a fixed-size byte newtype.
macro_rules! impl_hex_newtype {
    ($name:ident, $len:expr) => {
        impl $name {
            /// Wrap raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = ConstellationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s.trim())?;
                let bytes: [u8; $len] = bytes.try_into().map_err(|v: Vec<u8>| {
                    ConstellationError::InvalidInput(format!(
                        "{} must be {} bytes, got {}",
                        stringify!($name),
                        $len,
                        v.len()
                    ))
                })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Account address: an ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId([u8; 32]);

/// Short identifier derived from a public key (its last four bytes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureHint([u8; HINT_LEN]);

/// Hash of a transaction under a given network; the payload every signer signs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHash([u8; 32]);

impl_hex_newtype!(AccountId, 32);
impl_hex_newtype!(SignatureHint, HINT_LEN);
impl_hex_newtype!(TxHash, 32);

impl AccountId {
    /// Signature hint for this key.
    pub fn hint(&self) -> SignatureHint {
        let mut hint = [0u8; HINT_LEN];
        hint.copy_from_slice(&self.0[32 - HINT_LEN..]);
        SignatureHint(hint)
    }

    /// Verify an ed25519 signature over `message` with this account's key.
    ///
    /// Returns `false` for keys that are not valid curve points and for
    /// malformed signatures.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}

/// A signature together with the hint of the key that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct DecoratedSignature {
    pub hint: SignatureHint,
    pub signature: Vec<u8>,
}

impl DecoratedSignature {
    /// Encode as base64 of `hint || signature`.
    pub fn to_base64(&self) -> String {
        let mut raw = Vec::with_capacity(HINT_LEN + self.signature.len());
        raw.extend_from_slice(self.hint.as_bytes());
        raw.extend_from_slice(&self.signature);
        BASE64.encode(raw)
    }

    /// Decode from base64 of `hint || signature`.
    pub fn from_base64(encoded: &str) -> ConstellationResult<Self> {
        let raw = BASE64.decode(encoded.trim())?;
        if raw.len() != HINT_LEN + SIGNATURE_LEN {
            return Err(ConstellationError::InvalidInput(format!(
                "Decorated signature must be {} bytes, got {}",
                HINT_LEN + SIGNATURE_LEN,
                raw.len()
            )));
        }

        let mut hint = [0u8; HINT_LEN];
        hint.copy_from_slice(&raw[..HINT_LEN]);
        Ok(Self {
            hint: SignatureHint(hint),
            signature: raw[HINT_LEN..].to_vec(),
        })
    }
}

impl fmt::Debug for DecoratedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratedSignature")
            .field("hint", &self.hint)
            .field("signature", &hex::encode(&self.signature))
            .finish()
    }
}

impl Serialize for DecoratedSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for DecoratedSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// An ed25519 key pair able to sign transaction hashes.
///
/// The service itself never holds keys; this type exists for clients and tests.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Build a key pair from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Build a key pair from a hex-encoded 32-byte secret seed.
    pub fn from_secret_hex(secret: &str) -> ConstellationResult<Self> {
        let bytes = hex::decode(secret.trim())?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            ConstellationError::InvalidInput("Secret seed must be 32 bytes".to_string())
        })?;
        Ok(Self::from_seed(seed))
    }

    /// The account (public key) of this key pair.
    pub fn account_id(&self) -> AccountId {
        AccountId(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a transaction hash, attaching the signature hint.
    pub fn sign_decorated(&self, hash: &TxHash) -> DecoratedSignature {
        let signature = self.signing_key.sign(hash.as_bytes());
        DecoratedSignature {
            hint: self.account_id().hint(),
            signature: signature.to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("account_id", &self.account_id())
            .finish_non_exhaustive()
    }
}
