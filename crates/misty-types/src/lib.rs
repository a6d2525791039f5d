//! Shared wire types for the Misty robot API.
//!
//! This crate holds the data structures exchanged with the robot, both over the
//! REST interface and the `pubsub` WebSocket:
//!
//! - `events`: event categories, inbound envelopes and the payload classifier.
//! - `control`: outbound subscription control frames.
//! - `robot`: REST request and response bodies (skills, LED, speech, hazards).

pub mod control;
pub mod events;
pub mod robot;

pub use control::ControlFrame;
pub use events::{
    ActionPayload, ClassificationError, EventEnvelope, EventType, MessagePayload, Payload,
    RawEnvelope, UnknownEventType,
};
pub use robot::{HazardSettings, LedColor, Skill, SkillUpload, SpeechParams};
