//! BLS key and signature types.
//!
//! Thin fixed-size byte wrappers around `blst` (min_pk scheme: 48-byte
//! compressed public keys on G1, 96-byte signatures on G2), so that wire
//! payloads stay plain-old-data. Helpers cover the single-signer and
//! aggregate same-message cases used by the handshake.

use crate::Hash;
use sbor::prelude::*;
use std::fmt;

/// Domain separation tag for the BLS POP ciphersuite.
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed BLS12-381 G1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
#[sbor(transparent)]
pub struct PublicKey(pub [u8; 48]);

/// Compressed BLS12-381 G2 signature.
#[derive(Clone, Copy, PartialEq, Eq, BasicSbor)]
#[sbor(transparent)]
pub struct Signature(pub [u8; 96]);

/// A BLS12-381 secret key scalar.
pub struct SecretKey(blst::min_pk::SecretKey);

/// A validator signing key: secret scalar plus cached public key.
pub struct ValidatorKey {
    secret: SecretKey,
    public: PublicKey,
}

impl SecretKey {
    /// Generate a new random secret key.
    pub fn generate() -> Self {
        let mut ikm = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut ikm);
        Self::from_seed(&ikm)
    }

    /// Derive a secret key from a 32-byte seed (deterministic, for tests).
    ///
    /// Uses blst's `key_gen` which hashes the seed to a valid scalar.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let sk = blst::min_pk::SecretKey::key_gen(seed, &[]).expect("key_gen should not fail");
        Self(sk)
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.sk_to_pk().compress())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message, DST, &[]).compress())
    }
}

impl PublicKey {
    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(pk) = blst::min_pk::PublicKey::uncompress(&self.0) else {
            return false;
        };
        let Ok(sig) = blst::min_pk::Signature::uncompress(&signature.0) else {
            return false;
        };
        sig.verify(true, message, DST, &[], &pk, true) == blst::BLST_ERROR::BLST_SUCCESS
    }
}

impl Signature {
    /// A zero/placeholder signature for testing.
    pub fn zero() -> Self {
        Self([0u8; 96])
    }
}

impl ValidatorKey {
    /// Wrap a secret key, caching its public key.
    pub fn new(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Generate a fresh random validator key.
    pub fn generate() -> Self {
        Self::new(SecretKey::generate())
    }

    /// The validator's public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// The address derived from the public key.
    pub fn address(&self) -> crate::Address {
        crate::Address::from_public_key(&self.public)
    }

    /// Sign a message with the underlying secret key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.secret.sign(message)
    }
}

/// Aggregate multiple signatures into one.
///
/// Returns `None` for an empty slice or if any signature fails to decompress.
pub fn aggregate_signatures(signatures: &[Signature]) -> Option<Signature> {
    if signatures.is_empty() {
        return None;
    }

    let mut parsed = Vec::with_capacity(signatures.len());
    for sig in signatures {
        parsed.push(blst::min_pk::Signature::uncompress(&sig.0).ok()?);
    }
    let refs: Vec<&blst::min_pk::Signature> = parsed.iter().collect();

    let agg = blst::min_pk::AggregateSignature::aggregate(&refs, false).ok()?;
    Some(Signature(agg.to_signature().compress()))
}

/// Verify an aggregate signature over a single message.
///
/// All public keys must have signed the SAME message. This is the handshake
/// case: one aggregated signature from all of a node's validator keys.
pub fn verify_aggregate(message: &[u8], signature: &Signature, pubkeys: &[PublicKey]) -> bool {
    if pubkeys.is_empty() {
        return false;
    }

    let mut parsed = Vec::with_capacity(pubkeys.len());
    for pk in pubkeys {
        match blst::min_pk::PublicKey::uncompress(&pk.0) {
            Ok(p) => parsed.push(p),
            Err(_) => return false,
        }
    }
    let refs: Vec<&blst::min_pk::PublicKey> = parsed.iter().collect();

    let Ok(agg_pk) = blst::min_pk::AggregatePublicKey::aggregate(&refs, false) else {
        return false;
    };
    let Ok(sig) = blst::min_pk::Signature::uncompress(&signature.0) else {
        return false;
    };

    sig.verify(true, message, DST, &[], &agg_pk.to_public_key(), true)
        == blst::BLST_ERROR::BLST_SUCCESS
}

/// A 21-byte account/validator address. First byte is a type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct Address(pub [u8; 21]);

impl Address {
    /// Address type tag for validator addresses.
    pub const TAG_VALIDATOR: u8 = 0x01;

    /// Derive a validator address from a BLS public key.
    ///
    /// Tag byte followed by the first 20 bytes of the Blake3 hash of the
    /// compressed public key.
    pub fn from_public_key(pk: &PublicKey) -> Self {
        let digest = Hash::from_bytes(&pk.0);
        let mut out = [0u8; 21];
        out[0] = Self::TAG_VALIDATOR;
        out[1..].copy_from_slice(&digest.as_bytes()[..20]);
        Self(out)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.0[..6]))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..6]))
    }
}
