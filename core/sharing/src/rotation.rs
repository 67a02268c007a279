//! Revocation via scope-key rotation.

use chrono::{DateTime, Utc};
use tracing::info;
use x25519_dalek::PublicKey as X25519Public;

use crate::share::Share;
use crate::wrap::ScopeKey;
use quillvault_common::Result;
use quillvault_identity::UserIdentity;

/// Result of a rotation: the fresh scope key and the re-issued shares.
pub struct RotationOutcome {
    pub new_scope_key: ScopeKey,
    pub new_shares: Vec<Share>,
}

/// Rotate a scope key to revoke one recipient.
///
/// Generates a fresh random scope key and re-wraps it for every share
/// that is still usable at `now` and does not belong to the revoked
/// recipient; each new share keeps the old share's type, resource, role
/// and expiry. The revoked recipient receives no new share.
///
/// This provides forward secrecy for content encrypted after rotation
/// only: old-key ciphertext already held by the revoked recipient is not
/// retroactively re-encrypted.
pub fn rotate(
    shares: &[Share],
    revoked_recipient_hash: &str,
    sharer: &UserIdentity,
    now: DateTime<Utc>,
) -> Result<RotationOutcome> {
    let new_scope_key = ScopeKey::generate();
    let mut new_shares = Vec::new();

    for share in shares {
        if !share.is_usable_at(now) {
            continue;
        }
        if share.recipient_key_hash == revoked_recipient_hash {
            continue;
        }

        let recipient_public = X25519Public::from(share.wrapped_key.recipient_public_key);
        let new_share = Share::create(
            share.share_type,
            share.resource_id.clone(),
            share.role,
            &new_scope_key,
            sharer,
            &recipient_public,
            share.recipient_key_hash.clone(),
            share.expires_at,
        )?;
        new_shares.push(new_share);
    }

    info!(
        revoked = %revoked_recipient_hash,
        reissued = new_shares.len(),
        "Scope key rotated"
    );

    Ok(RotationOutcome {
        new_scope_key,
        new_shares,
    })
}

/// Wrap an existing scope key for one additional recipient without
/// rotating; used when extending access rather than revoking it.
pub fn extend(
    scope_key: &ScopeKey,
    template: &Share,
    sharer: &UserIdentity,
    recipient_public: &X25519Public,
    recipient_key_hash: &str,
) -> Result<Share> {
    Share::create(
        template.share_type,
        template.resource_id.clone(),
        template.role,
        scope_key,
        sharer,
        recipient_public,
        recipient_key_hash,
        template.expires_at,
    )
}
