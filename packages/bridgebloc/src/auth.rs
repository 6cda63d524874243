//! Authorization Manager
//!
//! Produces and caches the signed credential the relay backend uses to tie a
//! conversion to a wallet. Signing prompts the user, so a cached credential is
//! reused for as long as it belongs to the connected address.
//!
//! The cache is process-scoped state with explicit `get`/`set`/`clear`, backed by
//! a [`CredentialStore`] so it survives restarts.

use alloy::primitives::Address;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::TransferError;
use crate::redact::Redacted;
use crate::types::Authorization;
use crate::wallet::Wallet;

/// Versioned challenge signed to prove wallet ownership
pub const CHALLENGE_MESSAGE: &str =
    "Message: Welcome to BridgeBloc!\nURI: https://bridgebloc.vercel.app";

/// A cached credential is reusable only for the address that signed it
pub fn is_already_signed(cached: Option<&Authorization>, wallet_address: Address) -> bool {
    cached.is_some_and(|auth| auth.address == wallet_address && !auth.signature.is_empty())
}

// ============================================================================
// Credential Storage
// ============================================================================

/// Persisted `{address, signature}` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub address: String,
    pub signature: String,
}

impl From<&Authorization> for CredentialRecord {
    fn from(auth: &Authorization) -> Self {
        Self {
            address: auth.address.to_string(),
            signature: auth.signature.clone(),
        }
    }
}

impl CredentialRecord {
    /// Parse into an [`Authorization`]; `None` for empty or malformed records
    pub fn to_authorization(&self) -> Option<Authorization> {
        if self.signature.is_empty() {
            return None;
        }
        let address: Address = self.address.parse().ok()?;
        Some(Authorization::new(address, self.signature.clone()))
    }
}

/// Durable storage for the single cached credential
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<CredentialRecord>>;
    fn save(&self, record: &CredentialRecord) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Volatile store, for tests and one-shot sessions
#[derive(Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<CredentialRecord>> {
        Ok(self
            .record
            .lock()
            .map_err(|_| eyre::eyre!("credential store poisoned"))?
            .clone())
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        *self
            .record
            .lock()
            .map_err(|_| eyre::eyre!("credential store poisoned"))? = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .record
            .lock()
            .map_err(|_| eyre::eyre!("credential store poisoned"))? = None;
        Ok(())
    }
}

/// JSON file store
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<CredentialRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Failed to read {}", self.path.display()))?;
        let record = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("Malformed credential file {}", self.path.display()))?;
        Ok(Some(record))
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string(record)?;
        std::fs::write(&self.path, raw)
            .wrap_err_with(|| format!("Failed to write {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .wrap_err_with(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

// ============================================================================
// Authorization Manager
// ============================================================================

pub struct AuthorizationManager {
    wallet: Arc<dyn Wallet>,
    store: Arc<dyn CredentialStore>,
    cached: Mutex<Option<Authorization>>,
}

impl AuthorizationManager {
    /// Create a manager, loading any persisted credential
    pub fn new(wallet: Arc<dyn Wallet>, store: Arc<dyn CredentialStore>) -> Self {
        let cached = match store.load() {
            Ok(record) => record.and_then(|r| r.to_authorization()),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached authorization");
                None
            }
        };
        if let Some(auth) = &cached {
            debug!(address = %auth.address, "Loaded cached authorization");
        }

        Self {
            wallet,
            store,
            cached: Mutex::new(cached),
        }
    }

    /// Current cached credential, if any
    pub fn cached(&self) -> Option<Authorization> {
        self.cached.lock().ok().and_then(|c| c.clone())
    }

    /// Replace the cached credential and persist it
    pub fn set(&self, auth: Authorization) {
        if let Err(e) = self.store.save(&CredentialRecord::from(&auth)) {
            warn!(error = %e, "Failed to persist authorization; keeping it in memory");
        }
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(auth);
        }
    }

    /// Drop the cached credential from memory and storage
    pub fn clear(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted authorization");
        }
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }

    /// Re-sync with storage after the connected address changed.
    ///
    /// Keeps a stored credential that belongs to `address`, clears anything else.
    pub fn on_wallet_changed(&self, address: Option<Address>) {
        let stored = self
            .store
            .load()
            .ok()
            .flatten()
            .and_then(|r| r.to_authorization());

        let next = match (stored, address) {
            (Some(auth), Some(address)) if auth.address == address => Some(auth),
            _ => None,
        };

        if let Ok(mut cached) = self.cached.lock() {
            if next.is_none() && cached.is_some() {
                info!(address = ?address, "Wallet changed; cached authorization invalidated");
            }
            *cached = next;
        }
    }

    /// Return the cached credential for `wallet_address`, or sign a new one.
    pub async fn get_or_create_authorization(
        &self,
        wallet_address: Address,
    ) -> Result<Authorization, TransferError> {
        let cached = self.cached();
        if is_already_signed(cached.as_ref(), wallet_address) {
            if let Some(auth) = cached {
                debug!(address = %wallet_address, "Reusing cached authorization");
                return Ok(auth);
            }
        }

        if cached.is_some() {
            debug!(address = %wallet_address, "Cached authorization belongs to another address");
        }

        info!(address = %wallet_address, "Requesting authorization signature");
        let signature = self
            .wallet
            .sign_message(CHALLENGE_MESSAGE)
            .await
            .map_err(|e| {
                warn!(error = %e, "Authorization signing failed");
                TransferError::SigningRejected
            })?;

        let auth = Authorization::new(wallet_address, signature);
        debug!(
            address = %wallet_address,
            signature = %Redacted(&auth.signature),
            "Authorization created"
        );
        self.set(auth.clone());
        Ok(auth)
    }
}
