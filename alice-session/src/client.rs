//! High-level client.
//!
//! Wraps one [`SessionEngine`] so it can be shared between tasks. Only one
//! question may be in flight; a concurrent [`AliceClient::ask`] fails with
//! [`SessionError::SessionBusy`] instead of interleaving with the running one.
//! Snapshots and `close` only wait for the engine; they never make `ask` busy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alice_common::config::Config;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::envelope::{DeviceProfile, EnvelopeBuilder};
use crate::error::{SessionError, SessionResult};
use crate::identity::IdGenerator;
use crate::session::{EngineOptions, Phase, SessionEngine, SessionEvent};
use crate::transport::{Connector, WsConnector};
use crate::version::resolve_client_version;

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub device_id: String,
    pub sequence_number: u64,
    pub last_request_id: Option<String>,
    pub client_version: String,
    pub language: String,
    pub phase: Phase,
    pub connected: bool,
}

/// Cloneable handle to one gateway conversation.
#[derive(Clone)]
pub struct AliceClient {
    engine: Arc<Mutex<SessionEngine>>,
    in_flight: Arc<AtomicBool>,
    events: broadcast::Sender<SessionEvent>,
}

/// Marks a question or connect as running until dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn claim(flag: &'a AtomicBool) -> SessionResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| SessionError::SessionBusy)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AliceClient {
    /// Resolve the client version and prepare a WebSocket session.
    pub async fn from_config(config: &Config) -> Self {
        let client_version = resolve_client_version(&config.client).await;
        let connector = WsConnector::new(config.gateway.url.clone(), config.gateway.connect_timeout());
        Self::with_connector(config, client_version, Box::new(connector), IdGenerator::from_entropy())
    }

    /// Build a client over any connector.
    pub fn with_connector(
        config: &Config,
        client_version: impl Into<String>,
        connector: Box<dyn Connector>,
        ids: IdGenerator,
    ) -> Self {
        let mut builder = EnvelopeBuilder::new(
            DeviceProfile::web_desktop(config.client.timezone.clone()),
            config.client.prev_request_id,
            ids,
        );
        let state = builder.new_session(config.client.language.clone(), client_version);
        let engine = SessionEngine::new(connector, builder, state, EngineOptions::from_config(config));
        Self::from_engine(engine)
    }

    pub fn from_engine(engine: SessionEngine) -> Self {
        let events = engine.event_sender();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            in_flight: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Open the gateway connection eagerly.
    pub async fn connect(&self, cancel: &CancellationToken) -> SessionResult<()> {
        let _running = InFlight::claim(&self.in_flight)?;
        self.engine.lock().await.connect(cancel).await
    }

    /// Ask a question and wait for the whole answer.
    ///
    /// Fails with [`SessionError::SessionBusy`] only while another `ask` or
    /// `connect` runs; an overlapping `info` or `close` is waited for.
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> SessionResult<String> {
        let _running = InFlight::claim(&self.in_flight)?;
        self.engine.lock().await.submit(question, cancel).await
    }

    /// Receive session events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the session; waits for an in-flight question to finish.
    pub async fn info(&self) -> SessionInfo {
        let engine = self.engine.lock().await;
        let state = engine.state();
        SessionInfo {
            device_id: state.device_id().to_string(),
            sequence_number: state.sequence_number(),
            last_request_id: state.last_request_id().map(str::to_string),
            client_version: state.client_version().to_string(),
            language: state.language().to_string(),
            phase: engine.phase(),
            connected: engine.is_connected(),
        }
    }

    /// Close the gateway connection.
    pub async fn close(&self) {
        self.engine.lock().await.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DuplexChannel;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Unreachable;

    #[async_trait]
    impl Connector for Unreachable {
        async fn connect(&self) -> SessionResult<Box<dyn DuplexChannel>> {
            Err(SessionError::Transport("unreachable".into()))
        }
    }

    fn client() -> AliceClient {
        AliceClient::with_connector(
            &Config::default(),
            "1.0.0-test",
            Box::new(Unreachable),
            IdGenerator::seeded(1),
        )
    }

    #[tokio::test]
    async fn test_ask_waits_for_snapshot_instead_of_reporting_busy() {
        let client = client();
        let held = client.engine.lock().await;

        let asker = client.clone();
        let ask = tokio::spawn(async move { asker.ask("q", &CancellationToken::new()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!ask.is_finished());
        drop(held);

        let err = ask.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_in_flight_flag_is_released_after_failure() {
        let client = client();
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let err = client.ask("q", &cancel).await.unwrap_err();
            assert!(matches!(err, SessionError::Transport(_)));
        }
        assert!(!client.in_flight.load(Ordering::Acquire));
    }

    #[test]
    fn test_second_claim_is_busy() {
        let flag = AtomicBool::new(false);
        let first = InFlight::claim(&flag).unwrap();
        assert!(matches!(InFlight::claim(&flag), Err(SessionError::SessionBusy)));
        drop(first);
        assert!(InFlight::claim(&flag).is_ok());
    }
}
