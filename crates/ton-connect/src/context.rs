//! Application-owned wiring of the session, negotiation and transfer layers.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::api::{AuthApi, HttpAuthApi};
use crate::backend::{ExternalWalletBackend, LocalKeyBackend, SigningBackend};
use crate::chain::{ChainClient, ToncenterClient};
use crate::config::ConnectConfig;
use crate::connector::WalletConnector;
use crate::error::{AuthError, AuthResult, BackendResult, ConnectError, ConnectResult};
use crate::negotiator::{ProofNegotiator, Subscription};
use crate::session::{SessionAuthenticator, SessionCredential};
use crate::storage::{FileStore, KeyValueStore};
use crate::transfer::{TransferOrchestrator, TransferRequest, TransferResult};

/// Everything one dashboard session needs, created once by the application.
pub struct SessionContext {
    config: ConnectConfig,
    chain: Arc<dyn ChainClient>,
    connector: Arc<dyn WalletConnector>,
    session: Arc<SessionAuthenticator>,
    negotiator: Arc<ProofNegotiator>,
    orchestrator: TransferOrchestrator,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionContext {
    /// Wire the layers together, restoring any stored session.
    pub async fn new(
        config: ConnectConfig,
        api: Arc<dyn AuthApi>,
        chain: Arc<dyn ChainClient>,
        connector: Arc<dyn WalletConnector>,
        store: Arc<dyn KeyValueStore>,
    ) -> ConnectResult<Self> {
        config.validate()?;
        let session = Arc::new(
            SessionAuthenticator::restore(api.clone(), store, config.proof_domain.clone()).await?,
        );
        let negotiator = Arc::new(ProofNegotiator::new(
            api,
            session.clone(),
            connector.clone(),
            config.network,
        ));
        let orchestrator = TransferOrchestrator::new(config.transfer_policy());

        Ok(Self {
            config,
            chain,
            connector,
            session,
            negotiator,
            orchestrator,
            subscription: Mutex::new(None),
        })
    }

    /// Build with the HTTP backend client, toncenter and a file store.
    pub async fn from_config(
        config: ConnectConfig,
        connector: Arc<dyn WalletConnector>,
    ) -> ConnectResult<Self> {
        let api = HttpAuthApi::new(config.api_base_url.clone(), config.request_timeout())
            .map_err(|e| ConnectError::Config {
                name: "api_base_url",
                reason: e.to_string(),
            })?;
        let chain = ToncenterClient::new(
            config.chain_endpoint(),
            config.chain_api_key.clone(),
            config.request_timeout(),
        )
        .map_err(|e| ConnectError::Config {
            name: "chain_endpoint",
            reason: e.to_string(),
        })?;
        let store = FileStore::new(&config.storage_dir).await?;

        info!(network = %config.network, api = %config.api_base_url, "Session context created");
        Self::new(config, Arc::new(api), Arc::new(chain), connector, Arc::new(store)).await
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionAuthenticator> {
        &self.session
    }

    pub fn negotiator(&self) -> &Arc<ProofNegotiator> {
        &self.negotiator
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    /// Start forwarding wallet events to the negotiator. Calling it again
    /// replaces the previous registration.
    pub fn attach_wallet_events(&self) {
        let subscription = self.negotiator.attach();
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);
    }

    pub fn detach_wallet_events(&self) {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn active_backend(&self) -> Option<Arc<SigningBackend>> {
        self.session.backend()
    }

    /// Make `backend` the only active one, releasing whatever it replaces.
    async fn install_backend(&self, backend: Arc<SigningBackend>) {
        if let Some(previous) = self.session.replace_backend(backend) {
            previous.release().await;
        }
    }

    /// Sign through the connected wallet app from now on.
    pub async fn use_external_wallet(&self) -> Arc<SigningBackend> {
        let backend = Arc::new(SigningBackend::External(ExternalWalletBackend::new(
            self.connector.clone(),
            self.chain.clone(),
            self.config.network,
            self.config.validity(),
        )));
        self.install_backend(backend.clone()).await;
        backend
    }

    /// Sign with a key derived from `phrase` from now on.
    pub async fn use_local_key(&self, phrase: &str) -> BackendResult<Arc<SigningBackend>> {
        let local = LocalKeyBackend::from_mnemonic(phrase, self.chain.clone(), self.config.validity())?;
        info!(address = %local.address(), "Using local signing key");
        let backend = Arc::new(SigningBackend::Local(local));
        self.install_backend(backend.clone()).await;
        Ok(backend)
    }

    /// Log in by signing a challenge with the active local key.
    pub async fn login_local(&self) -> AuthResult<SessionCredential> {
        let backend = self.active_backend().ok_or(AuthError::NoLocalKey)?;
        let SigningBackend::Local(local) = backend.as_ref() else {
            return Err(AuthError::NoLocalKey);
        };
        self.session
            .login_with_signature(&local.address(), local.public_key(), local.keypair())
            .await
    }

    /// Run a transfer through the active backend.
    pub async fn transfer(&self, request: &TransferRequest) -> TransferResult {
        match self.active_backend() {
            Some(backend) => self.orchestrator.execute(request, &backend).await,
            None => TransferResult::Failure {
                error_message: "No wallet selected".to_string(),
            },
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("network", &self.config.network)
            .field("session", &self.session)
            .field("negotiator", &self.negotiator)
            .finish_non_exhaustive()
    }
}
