use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use decisioning_artifact::{ArtifactStore, Subscription};
use decisioning_core::delivery::{MboxRequest, ViewRequest};
use decisioning_core::{
    messages, DecisioningArtifact, DeliveryRequest, DeliveryResponse,
    SUPPORTED_ARTIFACT_MAJOR_VERSION,
};

use crate::config::EngineConfig;
use crate::context::create_decisioning_context;
use crate::error::{EngineError, Result};
use crate::notifications::NotificationDispatcher;
use crate::request::valid_delivery_request;
use crate::resolver::resolve;

/// Lifecycle of a [`DecisioningEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Arguments of one decision call.
#[derive(Clone, Debug, Default)]
pub struct GetOffersOptions {
    pub request: Option<DeliveryRequest>,
    /// Edge cluster hint, echoed on notifications.
    pub location_hint: Option<String>,
    /// Links notifications of several calls.
    pub session_id: Option<String>,
}

impl GetOffersOptions {
    pub fn new(request: DeliveryRequest) -> Self {
        Self {
            request: Some(request),
            ..Default::default()
        }
    }

    pub fn with_location_hint(mut self, hint: impl Into<String>) -> Self {
        self.location_hint = Some(hint.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Targets of a request that local decisioning cannot serve.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDependency {
    pub remote_needed: bool,
    pub remote_mboxes: Vec<String>,
    pub remote_views: Vec<String>,
}

/// Local decisioning facade: owns the artifact store and answers decision
/// requests against its current snapshot.
///
/// `get_offers` never blocks on the network. Notification delivery runs in
/// the background and its outcome never reaches the caller.
pub struct DecisioningEngine {
    config: EngineConfig,
    state: RwLock<EngineState>,
    store: RwLock<Option<ArtifactStore>>,
    subscription: Mutex<Option<Subscription>>,
    dispatcher: NotificationDispatcher,
}

impl DecisioningEngine {
    /// Build an engine without touching the network.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let dispatcher = NotificationDispatcher::new(
            config.notification_sender.clone(),
            config.settings.notifications.max_in_flight,
            config.notification_timeout(),
        );
        Ok(Self {
            config,
            state: RwLock::new(EngineState::Uninitialized),
            store: RwLock::new(None),
            subscription: Mutex::new(None),
            dispatcher,
        })
    }

    /// Build and initialize. Fails when the first artifact cannot be obtained.
    pub async fn start(config: EngineConfig) -> Result<Self> {
        let engine = Self::new(config)?;
        engine.initialize().await?;
        Ok(engine)
    }

    /// Obtain the first artifact and start background polling.
    ///
    /// On failure the engine returns to `Uninitialized` and may be
    /// initialized again.
    #[instrument(skip(self), fields(client = %self.config.settings.client))]
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                EngineState::Ready => return Ok(()),
                EngineState::Stopped => return Err(EngineError::Stopped),
                EngineState::Initializing => {
                    debug!("initialization already in progress");
                    return Err(EngineError::ArtifactUnavailable);
                }
                EngineState::Uninitialized => *state = EngineState::Initializing,
            }
        }

        let store = match self.open_store().await {
            Ok(store) => store,
            Err(e) => {
                let mut state = self.state.write();
                if *state == EngineState::Initializing {
                    *state = EngineState::Uninitialized;
                }
                warn!(error = %e, "decisioning engine initialization failed");
                return Err(e);
            }
        };

        if let Some(artifact) = store.artifact() {
            log_artifact(&artifact);
        }
        let subscription = store.subscribe(|artifact| log_artifact(artifact));

        let mut state = self.state.write();
        if *state == EngineState::Stopped {
            // Stopped while the first fetch was in flight.
            store.stop_polling();
            subscription.unsubscribe();
        } else {
            *state = EngineState::Ready;
            info!(polling = store.is_polling(), "decisioning engine ready");
        }
        *self.subscription.lock() = Some(subscription);
        *self.store.write() = Some(store);
        Ok(())
    }

    async fn open_store(&self) -> Result<ArtifactStore> {
        let store_config = self.config.store_config()?;
        Ok(ArtifactStore::initialize(store_config).await?)
    }

    /// Decide offers for one request against the current artifact.
    #[instrument(skip_all, fields(client = %self.config.settings.client))]
    pub async fn get_offers(&self, options: GetOffersOptions) -> Result<DeliveryResponse> {
        match self.state() {
            EngineState::Ready => {}
            EngineState::Stopped => return Err(EngineError::Stopped),
            EngineState::Uninitialized | EngineState::Initializing => {
                return Err(EngineError::ArtifactUnavailable)
            }
        }

        let artifact = self
            .get_raw_artifact()
            .ok_or(EngineError::ArtifactUnavailable)?;
        if !artifact.is_supported() {
            return Err(EngineError::VersionUnsupported {
                version: artifact.version.clone(),
                supported: SUPPORTED_ARTIFACT_MAJOR_VERSION,
            });
        }

        let request =
            valid_delivery_request(options.request.as_ref(), options.location_hint.as_deref())?;
        let context =
            create_decisioning_context(&request.request, &self.config.settings.default_locale)?;

        let resolution = resolve(
            &self.config.settings.client,
            &request,
            &context,
            &artifact,
            options.session_id.as_deref(),
        );
        debug!(
            request_id = %resolution.response.request_id,
            artifact_version = %artifact.version,
            notifications = resolution.notifications.len(),
            "decision resolved locally"
        );
        self.dispatcher.dispatch(resolution.notifications);
        Ok(resolution.response)
    }

    /// Current artifact snapshot. Retained after `stop_polling`.
    pub fn get_raw_artifact(&self) -> Option<Arc<DecisioningArtifact>> {
        self.store.read().as_ref().and_then(ArtifactStore::artifact)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// Targets of `request` that need the remote decision service.
    ///
    /// Without an artifact every requested target is remote.
    pub fn remote_dependency(&self, request: &DeliveryRequest) -> RemoteDependency {
        let artifact = self.get_raw_artifact();
        let is_remote_mbox =
            |name: &str| artifact.as_ref().map_or(true, |a| a.is_remote_mbox(name));
        let is_remote_view =
            |name: &str| artifact.as_ref().map_or(true, |a| a.is_remote_view(name));

        let mut remote_mboxes: Vec<String> = Vec::new();
        for name in requested_mboxes(request) {
            if is_remote_mbox(name) && !remote_mboxes.iter().any(|m| m == name) {
                remote_mboxes.push(name.to_string());
            }
        }
        let mut remote_views: Vec<String> = Vec::new();
        for name in requested_views(request) {
            if is_remote_view(name) && !remote_views.iter().any(|v| v == name) {
                remote_views.push(name.to_string());
            }
        }

        RemoteDependency {
            remote_needed: !remote_mboxes.is_empty() || !remote_views.is_empty(),
            remote_mboxes,
            remote_views,
        }
    }

    pub fn has_remote_dependency(&self, request: &DeliveryRequest) -> bool {
        self.remote_dependency(request).remote_needed
    }

    /// Stop background polling. The last artifact stays readable through
    /// [`get_raw_artifact`](Self::get_raw_artifact); decision calls fail.
    pub fn stop_polling(&self) {
        {
            let mut state = self.state.write();
            if *state == EngineState::Stopped {
                return;
            }
            *state = EngineState::Stopped;
        }
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        if let Some(store) = self.store.read().as_ref() {
            store.stop_polling();
        }
        info!("decisioning engine stopped");
    }

    /// Wait for queued notification deliveries. Returns `false` on timeout.
    pub async fn drain_notifications(&self, timeout: Duration) -> bool {
        self.dispatcher.drain(timeout).await
    }
}

fn log_artifact(artifact: &DecisioningArtifact) {
    if artifact.is_supported() {
        debug!(version = %artifact.version, "engine serving artifact");
    } else {
        warn!(
            version = %artifact.version,
            "{}",
            messages::artifact_version_unsupported(
                &artifact.version,
                SUPPORTED_ARTIFACT_MAJOR_VERSION
            )
        );
    }
}

fn requested_mboxes(request: &DeliveryRequest) -> impl Iterator<Item = &str> {
    let prefetch = request.prefetch.as_ref().and_then(|p| p.mboxes.as_deref());
    let execute = request.execute.as_ref().and_then(|e| e.mboxes.as_deref());
    prefetch
        .into_iter()
        .chain(execute)
        .flatten()
        .map(|mbox: &MboxRequest| mbox.name.as_str())
}

fn requested_views(request: &DeliveryRequest) -> impl Iterator<Item = &str> {
    request
        .prefetch
        .as_ref()
        .and_then(|p| p.views.as_deref())
        .into_iter()
        .flatten()
        .filter_map(|view: &ViewRequest| view.name.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use decisioning_artifact::mock::{MockFetcher, MockResponse};
    use decisioning_core::delivery::{DeliveryContext, PrefetchRequest};
    use decisioning_core::FetchError;
    use serde_json::json;

    fn payload(version: &str) -> serde_json::Value {
        json!({
            "version": version,
            "meta": {"remoteMboxes": ["server-side"], "remoteViews": ["checkout"]},
            "rules": {"mboxes": {"hero": [{
                "condition": true,
                "consequence": {"options": [{"type": "html", "content": "hi", "eventToken": "t"}]},
                "meta": {"activityId": 1, "experienceId": 0}
            }]}}
        })
    }

    fn config(version: &str) -> EngineConfig {
        EngineConfig::new("acme", "org@AdobeOrg").with_artifact_payload(payload(version))
    }

    fn request(mboxes: &[&str], views: &[&str]) -> DeliveryRequest {
        DeliveryRequest {
            context: Some(DeliveryContext::default()),
            prefetch: Some(PrefetchRequest {
                mboxes: Some(
                    mboxes
                        .iter()
                        .enumerate()
                        .map(|(i, n)| MboxRequest::new(*n, i as i32))
                        .collect(),
                ),
                views: Some(
                    views
                        .iter()
                        .map(|n| ViewRequest {
                            name: Some((*n).to_string()),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn new_rejects_missing_organization() {
        let err = DecisioningEngine::new(EngineConfig::new("acme", "")).err().unwrap();
        assert_eq!(err.to_string(), "Organization Id is required");
    }

    #[tokio::test]
    async fn lifecycle_from_uninitialized_to_stopped() {
        let engine = DecisioningEngine::new(config("1.0.0")).unwrap();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        let err = engine
            .get_offers(GetOffersOptions::new(request(&["hero"], &[])))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ArtifactUnavailable));

        engine.initialize().await.unwrap();
        assert!(engine.is_ready());
        engine.initialize().await.unwrap();

        engine.stop_polling();
        engine.stop_polling();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(engine.get_raw_artifact().is_some());
        let err = engine
            .get_offers(GetOffersOptions::new(request(&["hero"], &[])))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Stopped));
        assert!(matches!(
            engine.initialize().await,
            Err(EngineError::Stopped)
        ));
    }

    #[tokio::test]
    async fn unsupported_major_version_is_rejected_per_call() {
        let engine = DecisioningEngine::start(config("2.0.0")).await.unwrap();
        let err = engine
            .get_offers(GetOffersOptions::new(request(&["hero"], &[])))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::VersionUnsupported { ref version, supported: 1 } if version == "2.0.0"
        ));

        let engine = DecisioningEngine::start(config("1.4.2")).await.unwrap();
        let response = engine
            .get_offers(GetOffersOptions::new(request(&["hero"], &[])))
            .await
            .unwrap();
        assert_eq!(response.prefetch.unwrap().mboxes[0].options.len(), 1);
    }

    #[tokio::test]
    async fn failed_initialize_returns_to_uninitialized() {
        let fetcher = Arc::new(MockFetcher::new(vec![
            MockResponse::Error(FetchError::Network("refused".into())),
            MockResponse::version("1.0.0"),
        ]));
        let mut config = EngineConfig::new("acme", "org")
            .with_artifact_location("https://cdn.test/rules.json")
            .with_polling_interval(0)
            .with_fetcher(fetcher.clone());
        config.settings.retry.max_retries = 0;

        let engine = DecisioningEngine::new(config).unwrap();
        let err = engine.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::Initialization(FetchError::Exhausted { .. })));
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.get_raw_artifact().is_none());

        engine.initialize().await.unwrap();
        assert!(engine.is_ready());
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn per_call_errors_do_not_change_state() {
        let engine = DecisioningEngine::start(config("1")).await.unwrap();

        let err = engine.get_offers(GetOffersOptions::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Request object is required");

        let mut no_context = request(&["hero"], &[]);
        no_context.context = None;
        let err = engine
            .get_offers(GetOffersOptions::new(no_context))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ContextUndefined));

        assert!(engine.is_ready());
        assert!(engine
            .get_offers(GetOffersOptions::new(request(&["hero"], &[])))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn remote_dependency_lists_remote_targets() {
        let engine = DecisioningEngine::new(config("1.0.0")).unwrap();
        let req = request(&["hero", "server-side"], &["home", "checkout"]);

        let before = engine.remote_dependency(&req);
        assert_eq!(before.remote_mboxes, vec!["hero", "server-side"]);
        assert_eq!(before.remote_views, vec!["home", "checkout"]);

        engine.initialize().await.unwrap();
        let after = engine.remote_dependency(&req);
        assert!(after.remote_needed);
        assert_eq!(after.remote_mboxes, vec!["server-side"]);
        assert_eq!(after.remote_views, vec!["checkout"]);
        assert!(!engine.has_remote_dependency(&request(&["hero"], &["home"])));
    }

    #[test]
    fn state_display() {
        assert_eq!(EngineState::Ready.to_string(), "ready");
        assert_eq!(EngineState::Initializing.to_string(), "initializing");
    }
}
