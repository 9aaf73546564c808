//! Session credential lifecycle.
//!
//! Every change to the credential goes through [`SessionAuthenticator`].
//! Two counters keep late results from undoing newer decisions:
//!
//! - `login_epoch` moves on logout and on abandonment of a pending login.
//!   A login commits only if the epoch it started under is still current.
//! - `credential_version` moves on every credential change. A 401 clears the
//!   session only if the credential it was sent with is still the active one,
//!   so concurrent failures clear it once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::broadcast;
use ton_cell::Address;
use ton_crypto::Ed25519Keypair;
use tracing::{debug, info, warn};

use crate::api::{AuthApi, VerifyRequest};
use crate::backend::SigningBackend;
use crate::error::{AuthError, AuthResult};
use crate::proof::{TonProof, sign_proof};
use crate::storage::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const WALLET_ADDRESS_KEY: &str = "wallet_address";

const EVENT_CAPACITY: usize = 16;

/// Bearer token issued for a verified wallet address.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub address: Address,
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &"<redacted>")
            .field("address", &self.address.to_raw())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(Address),
    LoggedOut,
    /// The backend rejected the credential.
    Expired,
}

pub struct SessionAuthenticator {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn KeyValueStore>,
    proof_domain: String,
    credential: Mutex<Option<SessionCredential>>,
    login_epoch: AtomicU64,
    credential_version: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
    backend: Mutex<Option<Arc<SigningBackend>>>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionAuthenticator {
    /// Build an authenticator whose initial state comes from `store`.
    ///
    /// A session is restored only when both keys are present, the token is
    /// not empty and the address parses. Anything less is treated as logged
    /// out and the leftover entries are removed.
    pub async fn restore(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn KeyValueStore>,
        proof_domain: impl Into<String>,
    ) -> AuthResult<Self> {
        let token = store.get(ACCESS_TOKEN_KEY).await?;
        let address = store.get(WALLET_ADDRESS_KEY).await?;

        let credential = match (&token, &address) {
            (Some(token), Some(address)) if !token.is_empty() => match Address::parse(address) {
                Ok(address) => Some(SessionCredential {
                    token: token.clone(),
                    address,
                }),
                Err(e) => {
                    warn!(error = %e, "Stored wallet address is invalid");
                    None
                }
            },
            _ => None,
        };

        match &credential {
            Some(credential) => {
                info!(address = %credential.address, "Restored session");
            }
            None if token.is_some() || address.is_some() => {
                debug!("Removing incomplete stored session");
                store.remove(ACCESS_TOKEN_KEY).await?;
                store.remove(WALLET_ADDRESS_KEY).await?;
            }
            None => {}
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            api,
            store,
            proof_domain: proof_domain.into(),
            credential: Mutex::new(credential),
            login_epoch: AtomicU64::new(0),
            credential_version: AtomicU64::new(0),
            write_lock: tokio::sync::Mutex::new(()),
            backend: Mutex::new(None),
            events,
        })
    }

    pub fn credential(&self) -> Option<SessionCredential> {
        lock(&self.credential).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.credential).is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Backend whose external connection is dropped on logout.
    pub fn set_backend(&self, backend: Option<Arc<SigningBackend>>) {
        *lock(&self.backend) = backend;
    }

    /// Install `backend`, returning the one it replaces.
    pub fn replace_backend(&self, backend: Arc<SigningBackend>) -> Option<Arc<SigningBackend>> {
        lock(&self.backend).replace(backend)
    }

    pub fn backend(&self) -> Option<Arc<SigningBackend>> {
        lock(&self.backend).clone()
    }

    /// Make any login still in flight fail with [`AuthError::Superseded`].
    pub fn abandon_pending(&self) {
        self.login_epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Sign a fresh nonce with a local key and exchange it for a credential.
    pub async fn login_with_signature(
        &self,
        address: &Address,
        public_key: &[u8; 32],
        keypair: &Ed25519Keypair,
    ) -> AuthResult<SessionCredential> {
        if keypair.public_key_bytes() != public_key {
            return Err(AuthError::KeyMismatch);
        }
        let epoch = self.login_epoch.load(Ordering::SeqCst);

        let nonce = self.api.request_nonce().await.map_err(|e| {
            warn!(error = %e, "Nonce request failed");
            AuthError::NonceUnavailable(e.to_string())
        })?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let proof = sign_proof(keypair, address, &self.proof_domain, timestamp, nonce.as_str());
        let request = VerifyRequest {
            address: address.to_raw(),
            public_key: hex::encode(public_key),
            nonce: nonce.to_string(),
            signature: proof.signature,
            timestamp: Some(timestamp),
            domain: Some(proof.domain.value),
        };

        debug!(address = %address, "Verifying local signature");
        let token = self
            .api
            .verify_signature(&request)
            .await
            .map_err(AuthError::from_verification)?;

        self.commit(
            epoch,
            SessionCredential {
                token,
                address: *address,
            },
        )
        .await
    }

    /// Exchange a wallet-produced proof for a credential.
    pub async fn login_with_external_proof(
        &self,
        address: &Address,
        public_key: &str,
        proof: &TonProof,
    ) -> AuthResult<SessionCredential> {
        let epoch = self.login_epoch.load(Ordering::SeqCst);
        let request = VerifyRequest {
            address: address.to_raw(),
            public_key: public_key.to_string(),
            nonce: proof.payload.clone(),
            signature: proof.signature.clone(),
            timestamp: Some(proof.timestamp),
            domain: Some(proof.domain.value.clone()),
        };

        debug!(address = %address, "Verifying wallet proof");
        let token = self
            .api
            .verify_ton_connect(&request)
            .await
            .map_err(AuthError::from_verification)?;

        self.commit(
            epoch,
            SessionCredential {
                token,
                address: *address,
            },
        )
        .await
    }

    /// The only path that installs a credential.
    async fn commit(&self, epoch: u64, credential: SessionCredential) -> AuthResult<SessionCredential> {
        let _write = self.write_lock.lock().await;
        if self.login_epoch.load(Ordering::SeqCst) != epoch {
            debug!(address = %credential.address, "Discarding superseded login");
            return Err(AuthError::Superseded);
        }

        self.store.set(ACCESS_TOKEN_KEY, &credential.token).await?;
        self.store
            .set(WALLET_ADDRESS_KEY, &credential.address.to_raw())
            .await?;

        {
            let mut current = lock(&self.credential);
            *current = Some(credential.clone());
            self.credential_version.fetch_add(1, Ordering::SeqCst);
        }

        info!(address = %credential.address, "Logged in");
        let _ = self.events.send(SessionEvent::LoggedIn(credential.address));
        Ok(credential)
    }

    /// Clear the credential everywhere and release the backend's external
    /// connection.
    pub async fn logout(&self) -> AuthResult<()> {
        self.abandon_pending();
        let _write = self.write_lock.lock().await;
        self.clear(SessionEvent::LoggedOut).await
    }

    async fn clear(&self, event: SessionEvent) -> AuthResult<()> {
        {
            let mut current = lock(&self.credential);
            *current = None;
            self.credential_version.fetch_add(1, Ordering::SeqCst);
        }

        let removed_token = self.store.remove(ACCESS_TOKEN_KEY).await;
        let removed_address = self.store.remove(WALLET_ADDRESS_KEY).await;

        if let Some(backend) = self.backend() {
            backend.release().await;
        }

        info!(?event, "Session cleared");
        let _ = self.events.send(event);
        removed_token?;
        removed_address?;
        Ok(())
    }

    /// Drop the session after a 401, unless it already changed since
    /// `version` was observed. Returns whether this call cleared it.
    async fn invalidate(&self, version: u64) -> bool {
        let _write = self.write_lock.lock().await;
        if self.credential_version.load(Ordering::SeqCst) != version {
            return false;
        }
        self.abandon_pending();
        if let Err(e) = self.clear(SessionEvent::Expired).await {
            warn!(error = %e, "Failed to remove expired session from storage");
        }
        true
    }

    /// `GET` an authenticated endpoint with the current bearer token.
    pub async fn authorized_get(&self, path: &str) -> AuthResult<Value> {
        self.authorized_request(path, None).await
    }

    /// `POST` a JSON body to an authenticated endpoint.
    pub async fn authorized_post(&self, path: &str, body: &Value) -> AuthResult<Value> {
        self.authorized_request(path, Some(body)).await
    }

    /// Call an authenticated endpoint, as a `POST` when `body` is given.
    ///
    /// A 401 clears the session once, however many calls observed it with
    /// the same credential.
    pub async fn authorized_request(&self, path: &str, body: Option<&Value>) -> AuthResult<Value> {
        let (token, version) = {
            let current = lock(&self.credential);
            let credential = current.as_ref().ok_or(AuthError::NotAuthenticated)?;
            (
                credential.token.clone(),
                self.credential_version.load(Ordering::SeqCst),
            )
        };

        let response = match body {
            Some(body) => self.api.post(path, &token, body).await,
            None => self.api.get(path, &token).await,
        };
        match response {
            Ok(value) => Ok(value),
            Err(e) if e.is_unauthorized() => {
                if self.invalidate(version).await {
                    warn!(path, "Credential rejected, session cleared");
                }
                Err(AuthError::Unauthorized)
            }
            Err(e) => Err(AuthError::from_request(e)),
        }
    }
}

impl fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("credential", &self.credential())
            .field("proof_domain", &self.proof_domain)
            .finish_non_exhaustive()
    }
}
