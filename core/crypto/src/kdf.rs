//! Master key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. The same
//! password, salt and parameters always yield the same key; unlocking
//! an existing workspace depends on this.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::keys::{MasterUnlockKey, Salt, KEY_LENGTH};
use quillvault_common::{Error, Result};

/// Minimum acceptable Argon2id memory cost in KiB (8 MiB).
///
/// Derivation requests below this floor fail with `WeakParameters`
/// rather than silently producing a key that is cheap to brute-force.
pub const MIN_MEMORY_COST: u32 = 8192;

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create parameters suitable for sensitive data.
    ///
    /// Higher security parameters that may take several seconds.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144, // 256 MiB
            time_cost: 4,
            parallelism: 4,
        }
    }

    /// Create moderate parameters for mobile devices.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive the master unlock key from a password and salt using Argon2id.
///
/// # Preconditions
/// - `password` must not be empty
/// - `params.memory_cost` must be at or above `MIN_MEMORY_COST`
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - `WeakParameters` if memory cost is below the safety floor
/// - `InvalidInput` if password is empty
///
/// # Security
/// - Password is not stored or logged
/// - CPU-bound; callers should offload to a blocking task
pub fn derive_master_key(
    password: &[u8],
    salt: &Salt,
    params: &KdfParams,
) -> Result<MasterUnlockKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    if params.memory_cost < MIN_MEMORY_COST {
        return Err(Error::WeakParameters {
            memory_kib: params.memory_cost,
            floor_kib: MIN_MEMORY_COST,
        });
    }

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(MasterUnlockKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_master_key_deterministic() {
        let password = b"correct-horse-battery-staple";
        let salt = Salt::from_bytes([42u8; 32]);
        let params = KdfParams::moderate();

        let key1 = derive_master_key(password, &salt, &params).unwrap();
        let key2 = derive_master_key(password, &salt, &params).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_master_key_different_salt() {
        let password = b"correct-horse-battery-staple";
        let salt1 = Salt::from_bytes([1u8; 32]);
        let salt2 = Salt::from_bytes([2u8; 32]);
        let params = KdfParams::moderate();

        let key1 = derive_master_key(password, &salt1, &params).unwrap();
        let key2 = derive_master_key(password, &salt2, &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_master_key_different_password() {
        let salt = Salt::from_bytes([42u8; 32]);
        let params = KdfParams::moderate();

        let key1 = derive_master_key(b"password1", &salt, &params).unwrap();
        let key2 = derive_master_key(b"password2", &salt, &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_fails() {
        let salt = Salt::generate();
        let params = KdfParams::moderate();

        assert!(derive_master_key(b"", &salt, &params).is_err());
    }

    #[test]
    fn test_weak_memory_cost_rejected() {
        let salt = Salt::generate();
        let params = KdfParams {
            memory_cost: 1024, // 1 MiB, below floor
            time_cost: 3,
            parallelism: 1,
        };

        match derive_master_key(b"password", &salt, &params) {
            Err(Error::WeakParameters { memory_kib, floor_kib }) => {
                assert_eq!(memory_kib, 1024);
                assert_eq!(floor_kib, MIN_MEMORY_COST);
            }
            other => panic!("expected WeakParameters, got {:?}", other.map(|_| ())),
        }
    }
}
