//! Authenticated, optionally encrypted value encoding.
//!
//! # Format
//!
//! ```text
//! payload = base64url( [nonce (12 bytes)][AES-GCM ciphertext] )   // or plain JSON
//! value   = base64url( "{timestamp}|{payload}|{HMAC-SHA256(name|timestamp|payload)}" )
//! ```
//!
//! The session name is both MAC'd and used as AES-GCM associated data, so a
//! value minted for one cookie name never decodes under another.
//!
//! # Key rotation
//!
//! A [`KeyRing`] encodes with its first [`KeyPair`] and decodes with each
//! pair in turn. Prepend the new pair and keep the old ones until every
//! value they signed has expired.

use crate::constants::{DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_ENCODED_LENGTH};
use crate::environment::{Clock, SystemClock};
use crate::error::{Result, SessionError};
use crate::providers::{IdentifierCodec, ValueCodec};
use crate::state::SessionValues;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes128Gcm, Aes256Gcm,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// AES-GCM nonce length (96 bits) for both key sizes.
const NONCE_LEN: usize = 12;

/// A hash key for signing plus an optional block key for encryption.
///
/// Block keys must be 16 bytes (AES-128-GCM) or 32 bytes (AES-256-GCM).
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    hash_key: Vec<u8>,
    block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// Create a key pair.
    #[must_use]
    pub fn new(hash_key: impl Into<Vec<u8>>, block_key: Option<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key,
        }
    }

    /// Signing-only key pair; values are authenticated but readable.
    #[must_use]
    pub fn signing(hash_key: impl Into<Vec<u8>>) -> Self {
        Self::new(hash_key, None)
    }

    /// Signing and encryption key pair.
    #[must_use]
    pub fn encrypting(hash_key: impl Into<Vec<u8>>, block_key: impl Into<Vec<u8>>) -> Self {
        Self::new(hash_key, Some(block_key.into()))
    }

    /// Group a flat key list two at a time: hash key, then block key.
    ///
    /// A trailing hash key without a partner, or an empty block key,
    /// yields a signing-only pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use lease_sessions::KeyPair;
    ///
    /// let keys: [&[u8]; 3] = [b"new-hash", b"0123456789abcdef", b"old-hash"];
    /// let pairs = KeyPair::from_pairs(&keys);
    /// assert_eq!(pairs.len(), 2);
    /// assert!(pairs[0].encrypts());
    /// assert!(!pairs[1].encrypts());
    /// ```
    #[must_use]
    pub fn from_pairs(keys: &[&[u8]]) -> Vec<Self> {
        keys.chunks(2)
            .map(|chunk| {
                let block_key = chunk
                    .get(1)
                    .filter(|key| !key.is_empty())
                    .map(|key| key.to_vec());
                Self::new(chunk[0].to_vec(), block_key)
            })
            .collect()
    }

    /// Whether this pair encrypts as well as signs.
    #[must_use]
    pub const fn encrypts(&self) -> bool {
        self.block_key.is_some()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &"<redacted>")
            .field("block_key", &self.block_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// AES-GCM cipher sized by the block key.
enum BlockCipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl BlockCipher {
    fn new(key: &[u8]) -> Result<Self> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(|c| Self::Aes128(Box::new(c)))
                .map_err(|e| SessionError::Config(format!("Invalid AES-128 block key: {e}"))),
            32 => Aes256Gcm::new_from_slice(key)
                .map(|c| Self::Aes256(Box::new(c)))
                .map_err(|e| SessionError::Config(format!("Invalid AES-256 block key: {e}"))),
            n => Err(SessionError::Config(format!(
                "Block key must be 16 or 32 bytes, got {n}"
            ))),
        }
    }

    fn encrypt(&self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Aes128(cipher) => seal(cipher.as_ref(), aad, plaintext),
            Self::Aes256(cipher) => seal(cipher.as_ref(), aad, plaintext),
        }
    }

    fn decrypt(&self, aad: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Aes128(cipher) => open(cipher.as_ref(), aad, data),
            Self::Aes256(cipher) => open(cipher.as_ref(), aad, data),
        }
    }
}

/// Encrypt with a random nonce. Output: `[nonce][ciphertext]`.
fn seal<C: Aead + AeadCore>(cipher: &C, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = C::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| SessionError::Encoding(format!("Encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open<C: Aead + AeadCore>(cipher: &C, aad: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(SessionError::Authentication(
            "Encrypted value shorter than nonce".to_string(),
        ));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = aes_gcm::aead::Nonce::<C>::clone_from_slice(nonce_bytes);

    cipher
        .decrypt(&nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| SessionError::Authentication("Decryption failed".to_string()))
}

/// Codec for a single key pair.
pub struct SecureCookie {
    hash_key: Vec<u8>,
    cipher: Option<BlockCipher>,
    /// Seconds; values stamped earlier than `now - max_age` are rejected.
    /// Zero or below disables the check.
    max_age: AtomicI64,
    /// Zero disables the length check.
    max_length: usize,
    clock: Arc<dyn Clock>,
}

impl SecureCookie {
    /// Create a codec from a key pair.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the hash key is empty or the block
    /// key has an unsupported length.
    pub fn new(pair: &KeyPair) -> Result<Self> {
        if pair.hash_key.is_empty() {
            return Err(SessionError::Config("Hash key must not be empty".to_string()));
        }
        let cipher = pair.block_key.as_deref().map(BlockCipher::new).transpose()?;

        Ok(Self {
            hash_key: pair.hash_key.clone(),
            cipher,
            max_age: AtomicI64::new(DEFAULT_MAX_AGE_SECS),
            max_length: DEFAULT_MAX_ENCODED_LENGTH,
            clock: Arc::new(SystemClock),
        })
    }

    /// Read time from `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the maximum encoded length; zero means unlimited.
    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Current max age in seconds.
    #[must_use]
    pub fn max_age(&self) -> i64 {
        self.max_age.load(Ordering::Relaxed)
    }

    /// Change the max age; safe while other tasks are decoding.
    pub fn set_max_age(&self, seconds: i64) {
        self.max_age.store(seconds, Ordering::Relaxed);
    }

    /// Serialize, optionally encrypt, timestamp and sign `value`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encoding` if serialization or encryption
    /// fails, or the result exceeds the maximum length.
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|e| SessionError::Encoding(format!("Failed to serialize value: {e}")))?;

        let body = match &self.cipher {
            Some(cipher) => cipher.encrypt(name.as_bytes(), &plaintext)?,
            None => plaintext,
        };
        let body = URL_SAFE_NO_PAD.encode(body);
        let timestamp = self.clock.now().timestamp().to_string();
        let tag = self.mac(name, &timestamp, body.as_bytes())?.finalize().into_bytes();

        let mut raw = Vec::with_capacity(timestamp.len() + body.len() + tag.len() + 2);
        raw.extend_from_slice(timestamp.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(body.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(&tag);

        let encoded = URL_SAFE_NO_PAD.encode(raw);
        if self.max_length > 0 && encoded.len() > self.max_length {
            return Err(SessionError::Encoding(format!(
                "Encoded value is {} bytes, limit is {}",
                encoded.len(),
                self.max_length
            )));
        }
        Ok(encoded)
    }

    /// Verify, check age, optionally decrypt and deserialize `value`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Authentication` if the value is malformed,
    /// fails MAC or decryption, or is older than the max age, and
    /// `SessionError::Encoding` if the verified payload does not
    /// deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> Result<T> {
        if self.max_length > 0 && value.len() > self.max_length {
            return Err(SessionError::Authentication("Value is too long".to_string()));
        }
        let raw = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| SessionError::Authentication("Value is not valid base64".to_string()))?;

        // The tag is raw bytes and may contain '|', so split at most twice.
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(body), Some(tag)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::Authentication("Value is malformed".to_string()));
        };

        let timestamp = std::str::from_utf8(timestamp)
            .map_err(|_| SessionError::Authentication("Invalid timestamp".to_string()))?;
        self.mac(name, timestamp, body)?
            .verify_slice(tag)
            .map_err(|_| SessionError::Authentication("Signature mismatch".to_string()))?;

        let issued: i64 = timestamp
            .parse()
            .map_err(|_| SessionError::Authentication("Invalid timestamp".to_string()))?;
        let max_age = self.max_age();
        if max_age > 0 && issued < self.clock.now().timestamp() - max_age {
            return Err(SessionError::Authentication("Value has expired".to_string()));
        }

        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| SessionError::Authentication("Payload is not valid base64".to_string()))?;
        let plaintext = match &self.cipher {
            Some(cipher) => cipher.decrypt(name.as_bytes(), &body)?,
            None => body,
        };

        serde_json::from_slice(&plaintext)
            .map_err(|e| SessionError::Encoding(format!("Failed to deserialize value: {e}")))
    }

    fn mac(&self, name: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hash_key)
            .map_err(|e| SessionError::Config(format!("Invalid hash key: {e}")))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.as_bytes());
        mac.update(b"|");
        mac.update(body);
        Ok(mac)
    }
}

impl fmt::Debug for SecureCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCookie")
            .field("encrypts", &self.cipher.is_some())
            .field("max_age", &self.max_age())
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

/// Ordered set of codecs supporting key rotation.
#[derive(Debug)]
pub struct KeyRing {
    codecs: Vec<SecureCookie>,
}

impl KeyRing {
    /// Build a codec per key pair, in order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if `pairs` is empty or any pair is
    /// invalid.
    pub fn new(pairs: &[KeyPair]) -> Result<Self> {
        let codecs = pairs
            .iter()
            .map(SecureCookie::new)
            .collect::<Result<Vec<_>>>()?;
        Self::from_codecs(codecs)
    }

    /// Wrap already-built codecs.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if `codecs` is empty.
    pub fn from_codecs(codecs: Vec<SecureCookie>) -> Result<Self> {
        if codecs.is_empty() {
            return Err(SessionError::Config(
                "At least one key pair is required".to_string(),
            ));
        }
        Ok(Self { codecs })
    }

    /// Point every codec at `clock`.
    #[must_use]
    pub fn with_clock(self, clock: &Arc<dyn Clock>) -> Self {
        Self {
            codecs: self
                .codecs
                .into_iter()
                .map(|codec| codec.with_clock(Arc::clone(clock)))
                .collect(),
        }
    }

    /// Set the maximum encoded length on every codec; zero means unlimited.
    #[must_use]
    pub fn with_max_length(self, max_length: usize) -> Self {
        Self {
            codecs: self
                .codecs
                .into_iter()
                .map(|codec| codec.with_max_length(max_length))
                .collect(),
        }
    }

    /// Encode with the first (newest) key pair.
    ///
    /// # Errors
    ///
    /// See [`SecureCookie::encode`].
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String> {
        self.codecs
            .first()
            .ok_or_else(|| SessionError::Config("Key ring is empty".to_string()))?
            .encode(name, value)
    }

    /// Decode with each key pair in order until one verifies.
    ///
    /// A value that verifies but fails to deserialize is returned as an
    /// error straight away; older keys would not change that outcome.
    ///
    /// # Errors
    ///
    /// Returns the last `SessionError::Authentication` if no pair verifies.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> Result<T> {
        let mut last_error = None;
        for codec in &self.codecs {
            match codec.decode(name, value) {
                Ok(decoded) => return Ok(decoded),
                Err(e) if e.is_authentication_failure() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| SessionError::Authentication("Key ring is empty".to_string())))
    }

    /// Propagate a max age to every codec.
    pub fn set_max_age(&self, seconds: i64) {
        self.propagate_max_age(seconds);
    }

    fn propagate_max_age(&self, seconds: i64) {
        for codec in &self.codecs {
            codec.set_max_age(seconds);
        }
    }
}

impl IdentifierCodec for KeyRing {
    fn encode_id(&self, name: &str, id: &str) -> Result<String> {
        self.encode(name, id)
    }

    fn decode_id(&self, name: &str, value: &str) -> Result<String> {
        self.decode(name, value)
    }

    fn set_max_age(&self, seconds: i64) {
        self.propagate_max_age(seconds);
    }
}

impl ValueCodec for KeyRing {
    fn encode_values(&self, name: &str, values: &SessionValues) -> Result<String> {
        self.encode(name, values)
    }

    fn decode_values(&self, name: &str, encoded: &str) -> Result<SessionValues> {
        self.decode(name, encoded)
    }

    fn set_max_age(&self, seconds: i64) {
        self.propagate_max_age(seconds);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::FixedClock;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn signing_ring(hash_key: &[u8]) -> KeyRing {
        KeyRing::new(&[KeyPair::signing(hash_key)]).unwrap()
    }

    fn encrypting_ring(hash_key: &[u8], block_key: &[u8]) -> KeyRing {
        KeyRing::new(&[KeyPair::encrypting(hash_key, block_key)]).unwrap()
    }

    #[test]
    fn test_signed_value_decodes() {
        let ring = signing_ring(b"secret");
        let encoded = ring.encode("_session", "abc123").unwrap();
        let decoded: String = ring.decode("_session", &encoded).unwrap();
        assert_eq!(decoded, "abc123");
    }

    #[test]
    fn test_encrypted_value_hides_plaintext() {
        let ring = encrypting_ring(b"secret", &[7u8; 32]);
        let encoded = ring.encode("_session", "very-visible-id").unwrap();

        let raw = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
        let raw = String::from_utf8_lossy(&raw);
        assert!(!raw.contains("very-visible-id"));

        let decoded: String = ring.decode("_session", &encoded).unwrap();
        assert_eq!(decoded, "very-visible-id");
    }

    #[test]
    fn test_aes128_block_key_accepted() {
        let ring = encrypting_ring(b"secret", &[1u8; 16]);
        let encoded = ring.encode("n", &42_u32).unwrap();
        assert_eq!(ring.decode::<u32>("n", &encoded).unwrap(), 42);
    }

    #[test]
    fn test_invalid_block_key_rejected() {
        let result = KeyRing::new(&[KeyPair::encrypting(b"secret", vec![0u8; 20])]);
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_empty_key_ring_rejected() {
        assert!(matches!(KeyRing::new(&[]), Err(SessionError::Config(_))));
        assert!(matches!(
            KeyRing::new(&[KeyPair::signing(Vec::new())]),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_name_is_bound_to_value() {
        let ring = encrypting_ring(b"secret", &[7u8; 32]);
        let encoded = ring.encode("_session", "abc").unwrap();

        let result = ring.decode::<String>("_other", &encoded);
        assert!(matches!(result, Err(SessionError::Authentication(_))));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let encoded = signing_ring(b"key-a").encode("s", "id").unwrap();
        let result = signing_ring(b"key-b").decode::<String>("s", &encoded);
        assert!(matches!(result, Err(SessionError::Authentication(_))));
    }

    #[test]
    fn test_rotation_decodes_with_older_pair() {
        let old = KeyPair::encrypting(b"hash-a", [1u8; 32]);
        let new = KeyPair::encrypting(b"hash-b", [2u8; 32]);

        let encoded = KeyRing::new(&[old.clone()]).unwrap().encode("s", "id").unwrap();
        let rotated = KeyRing::new(&[new.clone(), old]).unwrap();
        assert_eq!(rotated.decode::<String>("s", &encoded).unwrap(), "id");

        // New encodings use the first pair only.
        let fresh = rotated.encode("s", "id2").unwrap();
        let new_only = KeyRing::new(&[new]).unwrap();
        assert_eq!(new_only.decode::<String>("s", &fresh).unwrap(), "id2");
    }

    #[test]
    fn test_expired_value_rejected() {
        let clock = FixedClock::new(Utc::now());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let ring = signing_ring(b"secret").with_clock(&shared);
        ring.set_max_age(60);

        let encoded = ring.encode("s", "id").unwrap();
        clock.advance(Duration::seconds(59));
        assert!(ring.decode::<String>("s", &encoded).is_ok());

        clock.advance(Duration::seconds(2));
        let result = ring.decode::<String>("s", &encoded);
        assert_eq!(
            result,
            Err(SessionError::Authentication("Value has expired".to_string()))
        );

        // Zero disables the age check.
        ring.set_max_age(0);
        assert!(ring.decode::<String>("s", &encoded).is_ok());
    }

    #[test]
    fn test_oversized_value_rejected() {
        let ring = signing_ring(b"secret").with_max_length(64);
        let result = ring.encode("s", &"x".repeat(200));
        assert!(matches!(result, Err(SessionError::Encoding(_))));

        let unlimited = signing_ring(b"secret").with_max_length(0);
        let encoded = unlimited.encode("s", &"x".repeat(200)).unwrap();
        let result = ring.decode::<String>("s", &encoded);
        assert!(matches!(result, Err(SessionError::Authentication(_))));
    }

    #[test]
    fn test_verified_but_wrong_type_is_encoding_error() {
        let ring = signing_ring(b"secret");
        let encoded = ring.encode("s", "not-a-number").unwrap();
        let result = ring.decode::<u64>("s", &encoded);
        assert!(matches!(result, Err(SessionError::Encoding(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let ring = signing_ring(b"secret");
        for value in ["", "!!!", "bm90LWEtY29va2ll", "fHx8"] {
            assert!(
                matches!(
                    ring.decode::<String>("s", value),
                    Err(SessionError::Authentication(_))
                ),
                "accepted {value:?}"
            );
        }
    }

    #[test]
    fn test_key_pair_debug_redacts() {
        let pair = KeyPair::encrypting(b"super-secret", [9u8; 32]);
        let debug = format!("{pair:?}");
        assert!(!debug.contains("super"));
        assert!(debug.contains("redacted"));
    }

    proptest! {
        #[test]
        fn prop_any_byte_flip_is_rejected(index in any::<prop::sample::Index>(), bit in 0u8..8) {
            let ring = encrypting_ring(b"secret", &[3u8; 32]);
            let encoded = ring.encode("_session", "session-id").unwrap();

            let mut raw = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
            let i = index.index(raw.len());
            raw[i] ^= 1 << bit;
            let tampered = URL_SAFE_NO_PAD.encode(&raw);

            prop_assert!(ring.decode::<String>("_session", &tampered).is_err());
        }

        #[test]
        fn prop_string_maps_survive_encoding(
            values in prop::collection::hash_map("[a-z]{1,8}", ".{0,16}", 0..8)
        ) {
            let ring = encrypting_ring(b"secret", &[5u8; 16]).with_max_length(0);
            let values: SessionValues = values
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();

            let encoded = ring.encode_values("s", &values).unwrap();
            prop_assert_eq!(ring.decode_values("s", &encoded).unwrap(), values);
        }
    }
}
