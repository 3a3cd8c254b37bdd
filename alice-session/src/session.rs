//! Session engine.
//!
//! Drives one conversation over one [`DuplexChannel`] at a time:
//!
//! ```text
//! Idle → Sending → AwaitingReply → Accumulating ─┬→ Idle            (final part)
//!          ↑                                     ├→ Sending         (continuation)
//!          └──────────── Reconnecting ←──────────┘                  (teardown)
//! ```
//!
//! A teardown reply discards the partial answer, replaces the channel and
//! re-submits the original question, at most `max_teardown_retries` times.
//! Session identity (device id, sequence number) survives reconnects.

use std::time::Duration;

use alice_common::config::Config;
use alice_common::util::log_preview;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::envelope::{Envelope, EnvelopeBuilder, SessionState};
use crate::error::{SessionError, SessionResult};
use crate::reply::{self, FragmentShape, Reply};
use crate::transport::{Connector, DuplexChannel, Incoming};

const EVENT_CAPACITY: usize = 64;
const LOG_PREVIEW_CHARS: usize = 80;

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    AwaitingReply,
    Accumulating,
    Reconnecting,
}

/// Notifications published while the engine runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    MessageReceived(String),
    Closed(Option<String>),
    Teardown { attempt: u32 },
}

/// Tunables of the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub reply_timeout: Duration,
    pub max_teardown_retries: u32,
    pub synchronize_state: bool,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reply_timeout: config.gateway.reply_timeout(),
            max_teardown_retries: config.gateway.max_teardown_retries,
            synchronize_state: config.client.synchronize_state,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

enum Outcome {
    Answer(String),
    Teardown,
}

/// Owns session state and the gateway channel.
pub struct SessionEngine {
    connector: Box<dyn Connector>,
    channel: Option<Box<dyn DuplexChannel>>,
    builder: EnvelopeBuilder,
    state: SessionState,
    options: EngineOptions,
    phase: Phase,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionEngine {
    /// Create an engine. The channel is opened lazily on first use.
    pub fn new(
        connector: Box<dyn Connector>,
        builder: EnvelopeBuilder,
        state: SessionState,
        options: EngineOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connector,
            channel: None,
            builder,
            state,
            options,
            phase: Phase::Idle,
            events,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    /// Open the channel now instead of on the first question.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> SessionResult<()> {
        self.ensure_connected(cancel).await
    }

    /// Close the channel. The session can still be used; the next question reconnects.
    pub async fn close(&mut self) {
        self.discard_channel().await;
        self.state.close_answer();
        self.phase = Phase::Idle;
    }

    /// Ask a question and return the complete answer.
    pub async fn submit(&mut self, question: &str, cancel: &CancellationToken) -> SessionResult<String> {
        if question.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "question must not be empty".into(),
            ));
        }

        if self.phase != Phase::Idle {
            // A previous submit was dropped mid-flight; its reply may still be in the pipe.
            tracing::warn!(phase = ?self.phase, "Gateway: previous question abandoned, resetting transport");
            self.discard_channel().await;
            self.finish();
        }

        tracing::info!(
            question = %log_preview(question, LOG_PREVIEW_CHARS),
            "Gateway: submitting question"
        );

        let mut teardowns = 0u32;
        loop {
            let outcome = self.run_answer(question, cancel).await;
            match outcome {
                Ok(Outcome::Answer(answer)) => {
                    self.finish();
                    tracing::info!(chars = answer.chars().count(), "Gateway: answer complete");
                    return Ok(answer);
                }
                Ok(Outcome::Teardown) => {
                    teardowns += 1;
                    self.state.close_answer();
                    self.phase = Phase::Reconnecting;
                    let _ = self.events.send(SessionEvent::Teardown { attempt: teardowns });

                    if teardowns > self.options.max_teardown_retries {
                        tracing::warn!(attempts = teardowns, "Gateway: teardown retry budget exhausted");
                        self.discard_channel().await;
                        self.finish();
                        return Err(SessionError::Teardown { attempts: teardowns });
                    }

                    tracing::warn!(attempt = teardowns, "Gateway: teardown received, reconnecting");
                    if let Err(e) = self.reconnect(cancel).await {
                        self.finish();
                        return Err(match e {
                            SessionError::Cancelled => SessionError::Cancelled,
                            other => SessionError::Reconnect(Box::new(other)),
                        });
                    }
                }
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            }
        }
    }

    async fn run_answer(&mut self, question: &str, cancel: &CancellationToken) -> SessionResult<Outcome> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        self.ensure_connected(cancel).await?;

        let mut answer = String::new();
        let mut envelope = self.builder.build_initial(&mut self.state, question)?;

        loop {
            self.phase = Phase::Sending;
            self.send(&envelope).await?;

            self.phase = Phase::AwaitingReply;
            let document = self.await_reply(cancel).await?;

            self.phase = Phase::Accumulating;
            let part = match reply::parse(&document)? {
                Reply::Teardown => return Ok(Outcome::Teardown),
                Reply::Part(part) => part,
            };

            tracing::debug!(
                shape = ?part.shape,
                is_final = part.is_final,
                next_delay_ms = part.next_delay_ms,
                "Gateway: reply received"
            );
            if part.shape == FragmentShape::Unrecognized {
                tracing::warn!(
                    document = %log_preview(&document, 500),
                    "Gateway: reply matched no known answer shape"
                );
            }

            if let Some(fragment) = part.fragment {
                answer.push_str(&fragment);
            }
            if part.is_final {
                return Ok(Outcome::Answer(answer));
            }

            if part.next_delay_ms > 0 {
                delay(Duration::from_millis(part.next_delay_ms), cancel).await?;
            }
            envelope = self.builder.build_continuation(&mut self.state)?;
        }
    }

    async fn send(&mut self, envelope: &Envelope) -> SessionResult<()> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| SessionError::Transport("not connected".into()))?;

        tracing::debug!(
            kind = ?envelope.kind(),
            seq = envelope.seq_number(),
            request_id = envelope.request_id().unwrap_or("-"),
            "Gateway: sending envelope"
        );

        if let Err(e) = channel.send_text(envelope.to_text()).await {
            self.discard_channel().await;
            return Err(e);
        }
        Ok(())
    }

    async fn await_reply(&mut self, cancel: &CancellationToken) -> SessionResult<String> {
        let timeout = self.options.reply_timeout;
        let received = {
            let channel = self
                .channel
                .as_mut()
                .ok_or_else(|| SessionError::Transport("not connected".into()))?;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SessionError::Cancelled),
                res = tokio::time::timeout(timeout, channel.recv_text()) => match res {
                    Ok(incoming) => incoming,
                    Err(_) => Err(SessionError::Transport(format!(
                        "no reply within {}s",
                        timeout.as_secs()
                    ))),
                },
            }
        };

        match received {
            Ok(Incoming::Text(text)) => {
                let _ = self.events.send(SessionEvent::MessageReceived(text.clone()));
                Ok(text)
            }
            Ok(Incoming::Closed { reason }) => {
                tracing::warn!(reason = ?reason, "Gateway: connection closed while awaiting reply");
                self.channel = None;
                let _ = self.events.send(SessionEvent::Closed(reason.clone()));
                Err(SessionError::Transport(format!(
                    "connection closed by gateway{}",
                    reason.map(|r| format!(": {r}")).unwrap_or_default()
                )))
            }
            Err(e) => {
                // The reply may still arrive later; never let it pair with the next request.
                self.discard_channel().await;
                Err(e)
            }
        }
    }

    async fn ensure_connected(&mut self, cancel: &CancellationToken) -> SessionResult<()> {
        if self.channel.is_some() {
            return Ok(());
        }

        let channel = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            res = self.connector.connect() => res?,
        };
        self.channel = Some(channel);
        tracing::info!(device_id = %self.state.device_id(), "Gateway: connected");
        let _ = self.events.send(SessionEvent::Connected);

        if self.options.synchronize_state {
            // No reply is read; an acknowledging gateway would desync the reply pairing.
            let envelope = self.builder.build_synchronize_state(&mut self.state);
            self.send(&envelope).await?;
        }
        Ok(())
    }

    async fn reconnect(&mut self, cancel: &CancellationToken) -> SessionResult<()> {
        self.discard_channel().await;
        self.ensure_connected(cancel).await
    }

    async fn discard_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                tracing::warn!(error = %e, "Gateway: error while closing channel");
            }
            let _ = self.events.send(SessionEvent::Closed(None));
        }
    }

    fn finish(&mut self) {
        self.state.close_answer();
        self.phase = Phase::Idle;
    }
}

/// Wait before asking for the next part. Cancellation keeps the channel.
async fn delay(duration: Duration, cancel: &CancellationToken) -> SessionResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
