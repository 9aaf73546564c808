//! `ton_proof` negotiation with an external wallet.
//!
//! ```text
//! Idle -> RequestingChallenge -> AwaitingWalletProof -> Verifying -> Authenticated
//!   ^__________________________ cancel ________________________________|
//! ```
//!
//! Every negotiation runs under a generation number. [`ProofNegotiator::start`]
//! and [`ProofNegotiator::cancel`] move the generation, and a suspended step
//! re-checks it before touching state, so a response that belongs to an
//! older negotiation is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::config::Network;
use crate::connector::{ConnectRequestParameters, WalletConnector, WalletEvent, parse_connection};
use crate::error::{AuthError, AuthResult};
use crate::proof::Nonce;
use crate::session::{SessionAuthenticator, SessionCredential};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    RequestingChallenge,
    AwaitingWalletProof { nonce: Nonce },
    Verifying,
    Authenticated(SessionCredential),
}

pub struct ProofNegotiator {
    api: Arc<dyn AuthApi>,
    session: Arc<SessionAuthenticator>,
    connector: Arc<dyn WalletConnector>,
    network: Network,
    generation: AtomicU64,
    state: watch::Sender<NegotiationState>,
}

impl ProofNegotiator {
    pub fn new(
        api: Arc<dyn AuthApi>,
        session: Arc<SessionAuthenticator>,
        connector: Arc<dyn WalletConnector>,
        network: Network,
    ) -> Self {
        let (state, _) = watch::channel(NegotiationState::Idle);
        Self {
            api,
            session,
            connector,
            network,
            generation: AtomicU64::new(0),
            state,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<NegotiationState> {
        self.state.subscribe()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply `update` only if `generation` is still current. The check and
    /// the update happen under the state lock, so they cannot interleave
    /// with [`ProofNegotiator::cancel`].
    fn apply_if_current<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut NegotiationState),
    {
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            update(state);
            true
        })
    }

    /// Abandon any negotiation in progress and return to `Idle`.
    ///
    /// Does not wait for in-flight requests; their results are discarded
    /// when they arrive.
    pub fn cancel(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.connector.set_connect_request_parameters(None);
            self.session.abandon_pending();
            if *state != NegotiationState::Idle {
                debug!(from = ?state, "Negotiation cancelled");
            }
            *state = NegotiationState::Idle;
        });
    }

    /// Start a new negotiation: fetch a nonce and hand it to the wallet
    /// connection.
    pub async fn start(&self) -> AuthResult<Nonce> {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.session.abandon_pending();
            self.connector
                .set_connect_request_parameters(Some(ConnectRequestParameters::Loading));
            *state = NegotiationState::RequestingChallenge;
        });
        debug!(generation, network = %self.network, "Requesting proof challenge");

        match self.api.request_nonce().await {
            Ok(nonce) => {
                let applied = self.apply_if_current(generation, |state| {
                    self.connector
                        .set_connect_request_parameters(Some(ConnectRequestParameters::Ready {
                            ton_proof: nonce.to_string(),
                        }));
                    *state = NegotiationState::AwaitingWalletProof {
                        nonce: nonce.clone(),
                    };
                });
                if !applied {
                    debug!(generation, "Dropping nonce of a cancelled negotiation");
                    return Err(AuthError::Cancelled);
                }
                Ok(nonce)
            }
            Err(e) => {
                let applied = self.apply_if_current(generation, |state| {
                    self.connector.set_connect_request_parameters(None);
                    *state = NegotiationState::Idle;
                });
                if !applied {
                    return Err(AuthError::Cancelled);
                }
                warn!(error = %e, "Challenge request failed");
                Err(AuthError::NonceUnavailable(e.to_string()))
            }
        }
    }

    /// React to the wallet connection changing.
    ///
    /// Returns the new credential when a connection completes the
    /// negotiation, `None` for events that need no login.
    pub async fn handle_wallet_event(
        &self,
        event: WalletEvent,
    ) -> AuthResult<Option<SessionCredential>> {
        match event {
            WalletEvent::Connected(connection) => self.handle_connection(&connection).await,
            WalletEvent::Disconnected => {
                self.cancel();
                if self.session.is_authenticated() {
                    self.session.logout().await?;
                }
                Ok(None)
            }
        }
    }

    async fn handle_connection(
        &self,
        connection: &serde_json::Value,
    ) -> AuthResult<Option<SessionCredential>> {
        let generation = self.generation.load(Ordering::SeqCst);
        let NegotiationState::AwaitingWalletProof { nonce } = self.state() else {
            debug!("Wallet connected outside a negotiation");
            return Ok(None);
        };

        let wallet = parse_connection(connection)?;
        if wallet.proof.payload != nonce.as_str() {
            return Err(AuthError::StructuralProof(
                "proof answers a different challenge".into(),
            ));
        }
        if Network::from_chain_id(&wallet.account.chain) != Some(self.network) {
            return Err(AuthError::StructuralProof(format!(
                "wallet is on chain {}, expected {}",
                wallet.account.chain,
                self.network.chain_id()
            )));
        }
        let address = wallet.account.parsed_address()?;
        let public_key = wallet
            .account
            .public_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AuthError::StructuralProof("missing account.publicKey".into()))?;

        let started = self.apply_if_current(generation, |state| {
            *state = NegotiationState::Verifying;
        });
        if !started {
            return Err(AuthError::Cancelled);
        }

        let result = self
            .session
            .login_with_external_proof(&address, &public_key, &wallet.proof)
            .await;

        match result {
            Ok(credential) => {
                let applied = self.apply_if_current(generation, |state| {
                    self.connector.set_connect_request_parameters(None);
                    *state = NegotiationState::Authenticated(credential.clone());
                });
                if applied {
                    info!(address = %address, "Wallet proof accepted");
                }
                Ok(Some(credential))
            }
            Err(e) => {
                self.apply_if_current(generation, |state| {
                    self.connector.set_connect_request_parameters(None);
                    *state = NegotiationState::Idle;
                });
                warn!(error = %e, "Wallet proof verification failed");
                Err(e)
            }
        }
    }

    /// Feed the connector's events into this negotiator until the returned
    /// handle is dropped.
    pub fn attach(self: &Arc<Self>) -> Subscription {
        let events = self.connector.subscribe();
        let handle = tokio::spawn(forward_events(Arc::downgrade(self), events));
        Subscription { handle }
    }
}

async fn forward_events(
    negotiator: Weak<ProofNegotiator>,
    mut events: broadcast::Receiver<WalletEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(negotiator) = negotiator.upgrade() else {
                    break;
                };
                if let Err(e) = negotiator.handle_wallet_event(event).await {
                    warn!(error = %e, "Wallet event rejected");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Wallet events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Registration of a negotiator on a wallet event stream.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl std::fmt::Debug for ProofNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofNegotiator")
            .field("network", &self.network)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
