//! Event Types and Envelope Classification
//!
//! Every frame the robot pushes over the `pubsub` socket is a JSON document of
//! the form `{ "eventName": ..., "message": ... }`. The `message` payload has no
//! explicit discriminant; its shape is recognised by field presence:
//!
//! 1. a plain string is a *simple* event,
//! 2. an object with a `message` key is a *message* event,
//! 3. an object with an `action` key is an *action* event.
//!
//! The checks run in that order and the first match wins. Raw JSON is decoded
//! into a [`RawEnvelope`] and immediately turned into a typed [`EventEnvelope`]
//! by [`classify`], so untyped payloads never leave this module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Marker the robot's skill runtime puts in front of `misty.Debug` output.
pub const DEBUG_MARKER: &str = "Debug =>";

/// Event name used by the robot for skill lifecycle notifications.
pub const SKILL_STATE_EVENT: &str = "SkillSystemStateChange";

/// Lifecycle action reported once a skill has finished running.
pub const STOPPED_ACTION: &str = "Stopped";

// --- Event Types ---

/// A sensor or lifecycle category the robot can publish.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    ActuatorPosition,
    ArTagDetection,
    AudioPlayComplete,
    BatteryCharge,
    BumpSensor,
    ChargerPoseMessage,
    CriticalStatusMessage,
    DriveEncoders,
    FaceRecognition,
    FaceTraining,
    HaltCommand,
    HazardNotification,
    #[serde(rename = "IMU")]
    Imu,
    KeyPhraseRecognized,
    LocomotionCommand,
    ObjectDetection,
    #[serde(rename = "PRUMessage")]
    PruMessage,
    SelfState,
    SerialMessage,
    SkillData,
    SkillSystemStateChange,
    SlamStatus,
    SourceTrackDataMessage,
    SourceFocusConfigMessage,
    TextToSpeechComplete,
    TimeOfFlight,
    TouchSensor,
    VoiceRecord,
    WorldState,
}

impl EventType {
    /// Every event type, in the order the robot documents them.
    pub const ALL: [EventType; 29] = [
        EventType::ActuatorPosition,
        EventType::ArTagDetection,
        EventType::AudioPlayComplete,
        EventType::BatteryCharge,
        EventType::BumpSensor,
        EventType::ChargerPoseMessage,
        EventType::CriticalStatusMessage,
        EventType::DriveEncoders,
        EventType::FaceRecognition,
        EventType::FaceTraining,
        EventType::HaltCommand,
        EventType::HazardNotification,
        EventType::Imu,
        EventType::KeyPhraseRecognized,
        EventType::LocomotionCommand,
        EventType::ObjectDetection,
        EventType::PruMessage,
        EventType::SelfState,
        EventType::SerialMessage,
        EventType::SkillData,
        EventType::SkillSystemStateChange,
        EventType::SlamStatus,
        EventType::SourceTrackDataMessage,
        EventType::SourceFocusConfigMessage,
        EventType::TextToSpeechComplete,
        EventType::TimeOfFlight,
        EventType::TouchSensor,
        EventType::VoiceRecord,
        EventType::WorldState,
    ];

    /// The name used on the wire, both as the subscription `Type` and as the
    /// default `EventName` label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ActuatorPosition => "ActuatorPosition",
            EventType::ArTagDetection => "ArTagDetection",
            EventType::AudioPlayComplete => "AudioPlayComplete",
            EventType::BatteryCharge => "BatteryCharge",
            EventType::BumpSensor => "BumpSensor",
            EventType::ChargerPoseMessage => "ChargerPoseMessage",
            EventType::CriticalStatusMessage => "CriticalStatusMessage",
            EventType::DriveEncoders => "DriveEncoders",
            EventType::FaceRecognition => "FaceRecognition",
            EventType::FaceTraining => "FaceTraining",
            EventType::HaltCommand => "HaltCommand",
            EventType::HazardNotification => "HazardNotification",
            EventType::Imu => "IMU",
            EventType::KeyPhraseRecognized => "KeyPhraseRecognized",
            EventType::LocomotionCommand => "LocomotionCommand",
            EventType::ObjectDetection => "ObjectDetection",
            EventType::PruMessage => "PRUMessage",
            EventType::SelfState => "SelfState",
            EventType::SerialMessage => "SerialMessage",
            EventType::SkillData => "SkillData",
            EventType::SkillSystemStateChange => "SkillSystemStateChange",
            EventType::SlamStatus => "SlamStatus",
            EventType::SourceTrackDataMessage => "SourceTrackDataMessage",
            EventType::SourceFocusConfigMessage => "SourceFocusConfigMessage",
            EventType::TextToSpeechComplete => "TextToSpeechComplete",
            EventType::TimeOfFlight => "TimeOfFlight",
            EventType::TouchSensor => "TouchSensor",
            EventType::VoiceRecord => "VoiceRecord",
            EventType::WorldState => "WorldState",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known [`EventType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

// --- Raw Envelope and Classifier ---

/// An inbound frame as decoded from JSON, before its payload is classified.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    pub event_name: String,
    #[serde(default)]
    pub message: Value,
}

/// Returns true if the payload is itself a string.
pub fn is_simple_event(raw: &RawEnvelope) -> bool {
    raw.message.is_string()
}

/// Returns true if the payload is an object carrying a `message` field.
pub fn is_message_event(raw: &RawEnvelope) -> bool {
    raw.message
        .as_object()
        .is_some_and(|obj| obj.contains_key("message"))
}

/// Returns true if the payload is an object carrying an `action` field.
pub fn is_action_event(raw: &RawEnvelope) -> bool {
    raw.message
        .as_object()
        .is_some_and(|obj| obj.contains_key("action"))
}

/// Failure to recognise an inbound envelope as one of the three known shapes.
///
/// Shape failures keep the frame as received so callers can still surface it.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error(
        "Event '{}' has a payload that matches no known shape: {}",
        .frame.event_name,
        .frame.message
    )]
    UnknownShape { frame: RawEnvelope },
    #[error("Event '{}' looks like a {kind} event but is malformed: {source}", .frame.event_name)]
    Malformed {
        frame: RawEnvelope,
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Frame is not a valid event envelope: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClassificationError {
    /// The offending frame, when it was at least a well-formed envelope.
    pub fn frame(&self) -> Option<&RawEnvelope> {
        match self {
            ClassificationError::UnknownShape { frame }
            | ClassificationError::Malformed { frame, .. } => Some(frame),
            ClassificationError::Decode(_) => None,
        }
    }
}

/// Turns an untyped envelope into its typed form.
///
/// The shape checks run in a fixed order (simple, message, action) and the
/// first match decides the variant. A payload that satisfies none of them is
/// reported as [`ClassificationError::UnknownShape`].
pub fn classify(raw: RawEnvelope) -> Result<EventEnvelope, ClassificationError> {
    let payload = if is_simple_event(&raw) {
        Payload::Simple(raw.message.as_str().unwrap_or_default().to_string())
    } else if is_message_event(&raw) {
        Payload::Message(parse_shape(&raw, "message")?)
    } else if is_action_event(&raw) {
        Payload::Action(parse_shape(&raw, "action")?)
    } else {
        return Err(ClassificationError::UnknownShape { frame: raw });
    };

    Ok(EventEnvelope {
        event_name: raw.event_name,
        message: payload,
        raw: raw.message,
    })
}

fn parse_shape<T: serde::de::DeserializeOwned>(
    raw: &RawEnvelope,
    kind: &'static str,
) -> Result<T, ClassificationError> {
    T::deserialize(&raw.message).map_err(|source| ClassificationError::Malformed {
        frame: raw.clone(),
        kind,
        source,
    })
}

/// Decodes a text frame and classifies it in one step.
pub fn decode_envelope(text: &str) -> Result<EventEnvelope, ClassificationError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    classify(raw)
}

// --- Typed Envelope ---

/// Payload of a message event, e.g. `misty.Debug` output from a running skill.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MessagePayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Lifecycle notifications may carry an `action` next to `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Payload of an action event, e.g. a skill lifecycle change.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ActionPayload {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// The three payload shapes the robot sends.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Payload {
    Simple(String),
    Message(MessagePayload),
    Action(ActionPayload),
}

/// A classified inbound event.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// The label chosen at subscription time.
    pub event_name: String,
    pub message: Payload,
    /// The payload exactly as received, including fields the typed shapes
    /// do not model.
    #[serde(skip)]
    pub raw: Value,
}

impl EventEnvelope {
    /// The lifecycle action carried by this event, whatever its shape.
    pub fn action(&self) -> Option<&str> {
        match &self.message {
            Payload::Action(a) => Some(&a.action),
            Payload::Message(m) => m.action.as_deref(),
            Payload::Simple(_) => None,
        }
    }

    /// Rebuilds the frame as the robot sent it.
    pub fn raw_frame(&self) -> RawEnvelope {
        RawEnvelope {
            event_name: self.event_name.clone(),
            message: self.raw.clone(),
        }
    }

    /// True for the lifecycle notification sent when a skill stops.
    pub fn is_skill_stopped(&self) -> bool {
        self.event_name == SKILL_STATE_EVENT && self.action() == Some(STOPPED_ACTION)
    }

    /// A human-readable line for this event's payload.
    ///
    /// Message events that carry debug output show their `data` instead of the
    /// message text.
    pub fn render(&self) -> String {
        match &self.message {
            Payload::Simple(text) => text.clone(),
            Payload::Message(m) => match &m.data {
                Some(data) if !data.is_null() && m.message.contains(DEBUG_MARKER) => match data {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
                _ => m.message.clone(),
            },
            Payload::Action(a) => a.action.clone(),
        }
    }
}
