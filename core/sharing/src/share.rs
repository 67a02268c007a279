//! Share records and their lifecycle.
//!
//! State machine per share: `Active -> Revoked` (terminal) and
//! `Active -> Expired` (terminal, time-based, checked at use time, not
//! proactively). No other transitions exist; a revoked or expired share
//! is permanently unusable and never reused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use x25519_dalek::PublicKey as X25519Public;

use crate::wrap::{unwrap_key, wrap_key, ScopeKey, WrappedKey};
use quillvault_common::{Error, Result};
use quillvault_identity::UserIdentity;

/// What kind of resource a share grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareType {
    Note,
    Notebook,
}

/// What the recipient may do with the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareRole {
    Viewer,
    Editor,
}

/// A grant of one scope key to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    pub share_id: String,
    pub share_type: ShareType,
    pub resource_id: String,
    pub role: ShareRole,
    /// Key hash of the identity that created the share.
    pub sharer_key_hash: String,
    /// Key hash of the identity the scope key is wrapped for.
    pub recipient_key_hash: String,
    pub wrapped_key: WrappedKey,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Share {
    /// Create a share by wrapping `scope_key` for a recipient.
    pub fn create(
        share_type: ShareType,
        resource_id: impl Into<String>,
        role: ShareRole,
        scope_key: &ScopeKey,
        sharer: &UserIdentity,
        recipient_public: &X25519Public,
        recipient_key_hash: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let wrapped_key = wrap_key(scope_key, recipient_public)?;
        let share = Self {
            share_id: Uuid::new_v4().to_string(),
            share_type,
            resource_id: resource_id.into(),
            role,
            sharer_key_hash: sharer.key_hash(),
            recipient_key_hash: recipient_key_hash.into(),
            wrapped_key,
            created_at: Utc::now(),
            expires_at,
            is_active: true,
        };
        info!(share = %share.share_id, resource = %share.resource_id, "Share created");
        Ok(share)
    }

    /// Whether the share has passed its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    /// Whether the share can still be used at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    /// Revoke the share. Terminal; the record is kept for audit but is
    /// permanently unusable.
    pub fn revoke(&mut self) {
        self.is_active = false;
        info!(share = %self.share_id, "Share revoked");
    }

    /// Unwrap the scope key for the given identity.
    ///
    /// # Errors
    /// - `RevokedShare` if the share was revoked
    /// - `ExpiredShare` if the share expired before `now`
    /// - `WrongRecipient` if `identity` is not who the share was
    ///   wrapped for; checked before any decrypt is attempted
    /// - `AuthenticationFailure` if the envelope fails to open
    pub fn unwrap_for(&self, identity: &UserIdentity, now: DateTime<Utc>) -> Result<ScopeKey> {
        if !self.is_active {
            return Err(Error::RevokedShare);
        }
        if self.is_expired_at(now) {
            return Err(Error::ExpiredShare);
        }
        if identity.key_hash() != self.recipient_key_hash {
            return Err(Error::WrongRecipient);
        }
        unwrap_key(&self.wrapped_key, identity.exchange_secret())
    }
}
