//! Scripted in-memory gateway used by the engine tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alice_common::config::PrevRequestIdMode;
use alice_session::{
    Connector, DeviceProfile, DuplexChannel, EngineOptions, EnvelopeBuilder, IdGenerator, Incoming,
    SessionEngine, SessionError, SessionResult,
};
use async_trait::async_trait;
use serde_json::{json, Value};

/// What the gateway does when the client waits for a reply.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Close(Option<String>),
    /// Never answer.
    Hang,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    sent: Vec<(usize, Value)>,
    connects: usize,
    closes: usize,
    failing_connects: usize,
    failing_sends: usize,
}

/// Shared handle to the scripted gateway.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    pub fn new(steps: Vec<Step>) -> Self {
        let gw = Self::default();
        gw.inner.lock().unwrap().steps = steps.into();
        gw
    }

    pub fn push(&self, step: Step) {
        self.inner.lock().unwrap().steps.push_back(step);
    }

    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(ScriptedConnector { gw: self.clone() })
    }

    /// Every envelope sent so far, in order.
    pub fn sent(&self) -> Vec<Value> {
        self.inner.lock().unwrap().sent.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Connection number (1-based) each envelope went out on.
    pub fn sent_connections(&self) -> Vec<usize> {
        self.inner.lock().unwrap().sent.iter().map(|(c, _)| *c).collect()
    }

    pub fn connects(&self) -> usize {
        self.inner.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    pub fn fail_next_connects(&self, n: usize) {
        self.inner.lock().unwrap().failing_connects = n;
    }

    /// The next `n` sends fail as if the socket broke.
    pub fn fail_next_sends(&self, n: usize) {
        self.inner.lock().unwrap().failing_sends = n;
    }
}

struct ScriptedConnector {
    gw: ScriptedGateway,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> SessionResult<Box<dyn DuplexChannel>> {
        let mut script = self.gw.inner.lock().unwrap();
        if script.failing_connects > 0 {
            script.failing_connects -= 1;
            return Err(SessionError::Transport("connection refused".into()));
        }
        script.connects += 1;
        Ok(Box::new(ScriptedChannel {
            gw: self.gw.clone(),
            connection: script.connects,
        }))
    }
}

struct ScriptedChannel {
    gw: ScriptedGateway,
    connection: usize,
}

#[async_trait]
impl DuplexChannel for ScriptedChannel {
    async fn send_text(&mut self, text: String) -> SessionResult<()> {
        let value: Value = serde_json::from_str(&text).expect("client sends JSON");
        let mut script = self.gw.inner.lock().unwrap();
        if script.failing_sends > 0 {
            script.failing_sends -= 1;
            return Err(SessionError::Transport("broken pipe".into()));
        }
        script.sent.push((self.connection, value));
        Ok(())
    }

    async fn recv_text(&mut self) -> SessionResult<Incoming> {
        let step = self.gw.inner.lock().unwrap().steps.pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(Incoming::Text(text)),
            Some(Step::Close(reason)) => Ok(Incoming::Closed { reason }),
            Some(Step::Hang) | None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> SessionResult<()> {
        self.gw.inner.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub fn options() -> EngineOptions {
    EngineOptions {
        reply_timeout: Duration::from_secs(5),
        max_teardown_retries: 1,
        synchronize_state: false,
    }
}

pub fn engine(gw: &ScriptedGateway, options: EngineOptions) -> SessionEngine {
    let mut builder = EnvelopeBuilder::new(
        DeviceProfile::default(),
        PrevRequestIdMode::Synthetic,
        IdGenerator::seeded(7),
    );
    let state = builder.new_session("ru-RU", "1.0.0-test");
    SessionEngine::new(gw.connector(), builder, state, options)
}

/// Reply carrying text on the directive payload.
pub fn text_reply(text: &str, is_end: Option<bool>, prefetch_after_ms: Option<u64>) -> String {
    let mut payload = json!({ "text": text });
    if let Some(end) = is_end {
        payload["is_end"] = json!(end);
    }
    if let Some(ms) = prefetch_after_ms {
        payload["prefetch_after_ms"] = json!(ms);
    }
    json!({ "directive": { "header": { "name": "VinsResponse" }, "payload": payload } }).to_string()
}

pub fn goaway() -> String {
    json!({ "directive": { "header": { "name": "GoAway" }, "payload": {} } }).to_string()
}

pub fn event_type(envelope: &Value) -> &str {
    envelope["event"]["payload"]["request"]["event"]["type"]
        .as_str()
        .unwrap_or("")
}

pub fn request_id(envelope: &Value) -> &str {
    envelope["event"]["payload"]["header"]["request_id"]
        .as_str()
        .unwrap_or("")
}
