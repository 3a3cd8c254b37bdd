//! Outgoing request documents.
//!
//! Every envelope carries the same device/feature descriptor block; only the
//! header ids, timestamps and the `request.event` differ between an initial
//! question and a continuation.

use alice_common::config::PrevRequestIdMode;
use serde_json::{json, Value};

use crate::error::{SessionError, SessionResult};
use crate::identity::IdGenerator;

/// Experiment toggles the web desktop client advertises.
pub const EXPERIMENTS: &[&str] = &[
    "set_symbols_per_second=200",
    "stroka_yabro",
    "search_use_cloud_ui",
    "weather_use_cloud_ui",
    "enable_open_link_and_cloud_ui",
    "hw_onboarding_enable_greetings",
    "remove_feedback_suggests",
    "shopping_list",
    "enable_external_skills_for_webdesktop_and_webtouch",
    "send_show_view_directive_on_supports_show_view_layer_content_interface",
    "use_app_host_pure_Dialogovo_scenario",
    "div2cards_in_external_skills_for_web_standalone",
];

/// Features the web desktop client claims to support.
pub const SUPPORTED_FEATURES: &[&str] = &[
    "open_link",
    "server_action",
    "cloud_ui",
    "cloud_first_screen_div",
    "cloud_ui_filling",
    "show_promo",
    "show_view_layer_content",
    "reminders_and_todos",
    "div2_cards",
    "print_text_in_message_view",
    "supports_print_text_in_message_view",
    "player_pause_directive",
    "supports_rich_json_cards_in_fullscreen_mode_in_skills",
];

/// Server action that asks the gateway for the next part of an answer.
pub const CONTINUATION_ACTION: &str = "@@mm_stack_engine_get_next";

/// Static client descriptor shared by every envelope.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub app_id: &'static str,
    pub platform: &'static str,
    pub os_version: &'static str,
    pub dialog_id: &'static str,
    pub dialog_type: u8,
    pub format: &'static str,
    pub mime: &'static str,
    pub topic: &'static str,
    pub timezone: String,
    pub experiments: &'static [&'static str],
    pub supported_features: &'static [&'static str],
}

impl DeviceProfile {
    /// Descriptor of the browser desktop client.
    pub fn web_desktop(timezone: impl Into<String>) -> Self {
        Self {
            app_id: "ru.yandex.webdesktop",
            platform: "windows",
            os_version: "mozilla/5.0 (windows nt 10.0; win64; x64) applewebkit/537.36 (khtml, like gecko) chrome/116.0.0.0 safari/537.36 opr/102.0.0.0",
            dialog_id: "b7c42cab-db61-46ba-871a-b10a6ecf3e0d",
            dialog_type: 1,
            format: "audio/ogg;codecs=opus",
            mime: "audio/webm;codecs=opus",
            topic: "desktopgeneral",
            timezone: timezone.into(),
            experiments: EXPERIMENTS,
            supported_features: SUPPORTED_FEATURES,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::web_desktop("Europe/Moscow")
    }
}

/// Mutable protocol state of one conversation.
#[derive(Debug, Clone)]
pub struct SessionState {
    device_id: String,
    sequence_number: u64,
    last_request_id: Option<String>,
    continuation_anchor: Option<String>,
    answer_open: bool,
    language: String,
    client_version: String,
}

impl SessionState {
    pub fn new(
        device_id: impl Into<String>,
        language: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            sequence_number: 1,
            last_request_id: None,
            continuation_anchor: None,
            answer_open: false,
            language: language.into(),
            client_version: client_version.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Sequence number the next envelope will carry.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn last_request_id(&self) -> Option<&str> {
        self.last_request_id.as_deref()
    }

    pub fn continuation_anchor(&self) -> Option<&str> {
        self.continuation_anchor.as_deref()
    }

    /// Whether an answer is in progress and may be continued.
    pub fn answer_open(&self) -> bool {
        self.answer_open
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn client_version(&self) -> &str {
        &self.client_version
    }

    /// Mark the current answer as finished or abandoned.
    pub fn close_answer(&mut self) {
        self.answer_open = false;
    }
}

/// Envelope variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    SynchronizeState,
    Initial,
    Continuation,
}

/// A fully built request document.
#[derive(Debug, Clone)]
pub struct Envelope {
    kind: EnvelopeKind,
    message_id: String,
    request_id: Option<String>,
    seq_number: u64,
    body: Value,
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Request id of a dialog envelope; `None` for the handshake.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn seq_number(&self) -> u64 {
        self.seq_number
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Serialized wire text.
    pub fn to_text(&self) -> String {
        self.body.to_string()
    }
}

/// Builds envelopes from session state.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    profile: DeviceProfile,
    prev_request_id: PrevRequestIdMode,
    ids: IdGenerator,
}

impl EnvelopeBuilder {
    pub fn new(profile: DeviceProfile, prev_request_id: PrevRequestIdMode, ids: IdGenerator) -> Self {
        Self {
            profile,
            prev_request_id,
            ids,
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn prev_request_id_mode(&self) -> PrevRequestIdMode {
        self.prev_request_id
    }

    /// Start a session with a freshly generated device id.
    pub fn new_session(
        &mut self,
        language: impl Into<String>,
        client_version: impl Into<String>,
    ) -> SessionState {
        SessionState::new(self.ids.new_numeric_id(), language, client_version)
    }

    /// Handshake sent right after connecting.
    pub fn build_synchronize_state(&mut self, session: &mut SessionState) -> Envelope {
        let message_id = self.ids.new_opaque_id();
        let seq_number = session.sequence_number;
        let body = json!({
            "event": {
                "header": {
                    "namespace": "System",
                    "name": "SynchronizeState",
                    "messageId": message_id,
                    "seqNumber": seq_number,
                },
                "payload": {
                    "auth_token": self.ids.new_opaque_id(),
                    "uuid": session.device_id,
                    "vins": {
                        "application": {
                            "app_id": self.profile.app_id,
                            "platform": self.profile.platform,
                        }
                    }
                }
            }
        });

        session.sequence_number += 1;
        Envelope {
            kind: EnvelopeKind::SynchronizeState,
            message_id,
            request_id: None,
            seq_number,
            body,
        }
    }

    /// First envelope of a new question.
    pub fn build_initial(&mut self, session: &mut SessionState, question: &str) -> SessionResult<Envelope> {
        if question.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "question must not be empty".into(),
            ));
        }

        let prev_req_id = match self.prev_request_id {
            PrevRequestIdMode::Synthetic => Value::String(self.ids.new_opaque_id()),
            PrevRequestIdMode::Null => Value::Null,
        };
        let request_id = self.ids.new_opaque_id();
        let request = json!({
            "event": {
                "type": "text_input",
                "text": question,
            },
            "voice_session": false,
            "experiments": self.profile.experiments,
            "additional_options": self.additional_options(),
        });

        let envelope = self.dialog_envelope(
            EnvelopeKind::Initial,
            session,
            prev_req_id,
            request_id.clone(),
            request,
        );

        session.last_request_id = Some(request_id);
        session.continuation_anchor = None;
        session.answer_open = true;
        session.sequence_number += 1;
        Ok(envelope)
    }

    /// Ask the gateway for the next part of the current answer.
    pub fn build_continuation(&mut self, session: &mut SessionState) -> SessionResult<Envelope> {
        if !session.answer_open {
            return Err(SessionError::InvalidState(
                "continuation requested without an open answer".into(),
            ));
        }
        let Some(previous) = session.last_request_id.clone() else {
            return Err(SessionError::InvalidState(
                "continuation requested before any question was sent".into(),
            ));
        };

        let anchor = session
            .continuation_anchor
            .get_or_insert_with(|| previous.clone())
            .clone();
        let request_id = self.ids.new_opaque_id();
        let request = json!({
            "event": {
                "type": "server_action",
                "name": CONTINUATION_ACTION,
                "payload": {
                    "@recovery_params": {},
                    "@request_id": previous,
                    "stack_session_id": anchor,
                    "@scenario_name": "Dialogovo",
                    "stack_product_scenario_name": "dialogovo",
                }
            },
            "voice_session": false,
            "experiments": self.profile.experiments,
            "additional_options": self.additional_options(),
        });

        let envelope = self.dialog_envelope(
            EnvelopeKind::Continuation,
            session,
            Value::String(previous),
            request_id.clone(),
            request,
        );

        session.last_request_id = Some(request_id);
        session.sequence_number += 1;
        Ok(envelope)
    }

    fn additional_options(&self) -> Value {
        json!({
            "bass_options": { "screen_scale_factor": 1 },
            "supported_features": self.profile.supported_features,
            "unsupported_features": [],
        })
    }

    fn dialog_envelope(
        &mut self,
        kind: EnvelopeKind,
        session: &SessionState,
        prev_req_id: Value,
        request_id: String,
        request: Value,
    ) -> Envelope {
        let message_id = self.ids.new_opaque_id();
        let now = chrono::Local::now();
        let body = json!({
            "event": {
                "header": {
                    "namespace": "Vins",
                    "name": "TextInput",
                    "messageId": message_id,
                    "seqNumber": session.sequence_number,
                },
                "payload": {
                    "application": {
                        "app_id": self.profile.app_id,
                        "app_version": session.client_version,
                        "platform": self.profile.platform,
                        "os_version": self.profile.os_version,
                        "uuid": session.device_id,
                        "lang": session.language,
                        "client_time": now.format("%Y%m%dT%H%M%S").to_string(),
                        "timezone": self.profile.timezone,
                        "timestamp": now.timestamp().to_string(),
                    },
                    "header": {
                        "prev_req_id": prev_req_id,
                        "sequence_number": null,
                        "request_id": request_id,
                        "dialog_id": self.profile.dialog_id,
                        "dialog_type": self.profile.dialog_type,
                    },
                    "request": request,
                    "format": self.profile.format,
                    "mime": self.profile.mime,
                    "topic": self.profile.topic,
                }
            }
        });

        Envelope {
            kind,
            message_id,
            request_id: Some(request_id),
            seq_number: session.sequence_number,
            body,
        }
    }
}
