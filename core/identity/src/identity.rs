//! User and device identity key pairs.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;
use uuid::Uuid;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use quillvault_common::Result;
use quillvault_crypto::{subkey::VaultKeyDeriver, VaultKey};

/// Raw Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Fingerprint truncation: 160 bits gives strong collision resistance
/// for manual verification.
const FINGERPRINT_BYTES: usize = 20;

fn fingerprint_of(signing_pub: &[u8; 32], exchange_pub: &[u8; 32]) -> String {
    let mut hasher = Blake2b::<U32>::new();
    Digest::update(&mut hasher, signing_pub);
    Digest::update(&mut hasher, exchange_pub);
    let digest = hasher.finalize();

    let hex = hex::encode(&digest[..FINGERPRINT_BYTES]);
    hex.as_bytes()
        .chunks(4)
        .map(|c| String::from_utf8_lossy(c).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn key_hash_of(exchange_pub: &[u8; 32]) -> String {
    let mut hasher = Blake2b::<U32>::new();
    Digest::update(&mut hasher, exchange_pub);
    hex::encode(hasher.finalize())
}

/// A user's long-term identity: Ed25519 signing pair + X25519 exchange
/// pair, both derived deterministically from the vault key.
pub struct UserIdentity {
    signing: SigningKey,
    exchange: StaticSecret,
}

impl UserIdentity {
    /// Derive the identity from a vault key.
    ///
    /// Both pairs are seed-derived, so the same vault key always
    /// reproduces the same identity. Seeds are zeroized after the key
    /// pairs are constructed.
    pub fn derive(vault_key: &VaultKey) -> Result<Self> {
        let deriver = VaultKeyDeriver::new(vault_key);

        let signing_seed = Zeroizing::new(deriver.signing_identity_seed()?);
        let mut exchange_seed = deriver.encryption_identity_seed()?;

        let signing = SigningKey::from_bytes(&signing_seed);
        let exchange = StaticSecret::from(exchange_seed);
        exchange_seed.zeroize();

        Ok(Self { signing, exchange })
    }

    /// Ed25519 verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// X25519 public key, the recipient address for key wrapping.
    pub fn exchange_public(&self) -> X25519Public {
        X25519Public::from(&self.exchange)
    }

    /// X25519 secret key, needed to unwrap shares addressed to us.
    pub fn exchange_secret(&self) -> &StaticSecret {
        &self.exchange
    }

    /// Human-readable fingerprint over both public keys, hex in groups
    /// of four for manual comparison.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(
            &self.verifying_key().to_bytes(),
            self.exchange_public().as_bytes(),
        )
    }

    /// Full hash of the exchange public key; addresses this identity as
    /// a share recipient.
    pub fn key_hash(&self) -> String {
        key_hash_of(self.exchange_public().as_bytes())
    }

    /// Sign arbitrary bytes; returns a raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserIdentity({})", self.fingerprint())
    }
}

/// Verify a signature made by any Ed25519 public key.
///
/// Returns false (never an error) on malformed keys, malformed
/// signatures, or verification failure.
pub fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying.verify(message, &signature).is_ok()
}

/// A device's identity: random key pairs, not recoverable from any
/// password. Secret halves are handed to a `SecureKeystore`.
pub struct DeviceIdentity {
    device_id: String,
    name: String,
    signing: SigningKey,
    exchange: StaticSecret,
}

impl DeviceIdentity {
    /// Generate a fresh device identity.
    pub fn generate(name: impl Into<String>) -> Self {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        let exchange = StaticSecret::random_from_rng(rand::rngs::OsRng);

        Self {
            device_id: Uuid::new_v4().to_string(),
            name: name.into(),
            signing,
            exchange,
        }
    }

    /// Reconstruct from keystore material produced by `secret_bytes`.
    pub fn from_parts(
        device_id: impl Into<String>,
        name: impl Into<String>,
        secret: &[u8; 64],
    ) -> Self {
        let mut signing_seed = [0u8; 32];
        let mut exchange_seed = [0u8; 32];
        signing_seed.copy_from_slice(&secret[..32]);
        exchange_seed.copy_from_slice(&secret[32..]);

        let identity = Self {
            device_id: device_id.into(),
            name: name.into(),
            signing: SigningKey::from_bytes(&signing_seed),
            exchange: StaticSecret::from(exchange_seed),
        };
        signing_seed.zeroize();
        exchange_seed.zeroize();
        identity
    }

    /// Secret halves for the keystore: signing seed || exchange seed.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 64]> {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.signing.to_bytes());
        out[32..].copy_from_slice(&self.exchange.to_bytes());
        Zeroizing::new(out)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ed25519 verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// X25519 public key.
    pub fn exchange_public(&self) -> X25519Public {
        X25519Public::from(&self.exchange)
    }

    /// Fingerprint over both public keys.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(
            &self.verifying_key().to_bytes(),
            self.exchange_public().as_bytes(),
        )
    }

    /// Sign arbitrary bytes with the device signing key.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceIdentity({}, {})", self.device_id, self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillvault_crypto::KEY_LENGTH;

    fn vault_key(byte: u8) -> VaultKey {
        VaultKey::from_bytes([byte; KEY_LENGTH])
    }

    #[test]
    fn test_user_identity_deterministic() {
        let vk = vault_key(1);

        let id1 = UserIdentity::derive(&vk).unwrap();
        let id2 = UserIdentity::derive(&vk).unwrap();

        assert_eq!(id1.verifying_key(), id2.verifying_key());
        assert_eq!(
            id1.exchange_public().as_bytes(),
            id2.exchange_public().as_bytes()
        );
        assert_eq!(id1.fingerprint(), id2.fingerprint());
    }

    #[test]
    fn test_different_vault_keys_different_identities() {
        let id1 = UserIdentity::derive(&vault_key(1)).unwrap();
        let id2 = UserIdentity::derive(&vault_key(2)).unwrap();

        assert_ne!(id1.verifying_key(), id2.verifying_key());
        assert_ne!(id1.key_hash(), id2.key_hash());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let identity = UserIdentity::derive(&vault_key(1)).unwrap();
        let message = b"note revision 42";

        let signature = identity.sign(message);

        assert!(verify(
            message,
            &signature,
            &identity.verifying_key().to_bytes()
        ));
        assert!(!verify(
            b"note revision 43",
            &signature,
            &identity.verifying_key().to_bytes()
        ));
    }

    #[test]
    fn test_verify_malformed_input_returns_false() {
        let identity = UserIdentity::derive(&vault_key(1)).unwrap();
        let signature = identity.sign(b"msg");
        let public = identity.verifying_key().to_bytes();

        assert!(!verify(b"msg", &signature[..10], &public));
        assert!(!verify(b"msg", &signature, &public[..10]));
        assert!(!verify(b"msg", &[0u8; SIGNATURE_LENGTH], &[0xFFu8; 32]));
    }

    #[test]
    fn test_fingerprint_format() {
        let identity = UserIdentity::derive(&vault_key(1)).unwrap();
        let fp = identity.fingerprint();

        // 20 bytes = 40 hex chars in groups of 4
        let groups: Vec<&str> = fp.split(' ').collect();
        assert_eq!(groups.len(), 10);
        assert!(groups.iter().all(|g| g.len() == 4));
    }

    #[test]
    fn test_device_identity_random() {
        let dev1 = DeviceIdentity::generate("laptop");
        let dev2 = DeviceIdentity::generate("laptop");

        assert_ne!(dev1.device_id(), dev2.device_id());
        assert_ne!(dev1.verifying_key(), dev2.verifying_key());
    }

    #[test]
    fn test_device_identity_keystore_roundtrip() {
        let device = DeviceIdentity::generate("phone");
        let secret = device.secret_bytes();

        let restored = DeviceIdentity::from_parts(device.device_id(), device.name(), &secret);

        assert_eq!(device.verifying_key(), restored.verifying_key());
        assert_eq!(
            device.exchange_public().as_bytes(),
            restored.exchange_public().as_bytes()
        );

        let signature = restored.sign(b"challenge");
        assert!(verify(
            b"challenge",
            &signature,
            &device.verifying_key().to_bytes()
        ));
    }
}
