//! Outbound control frames for the `pubsub` socket.

use crate::events::EventType;
use serde::Serialize;

/// A subscription control message sent to the robot.
///
/// Subscriptions are keyed by `EventName`; this client always uses the event
/// type's own name as the label.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "Operation", rename_all = "lowercase")]
pub enum ControlFrame {
    #[serde(rename_all = "PascalCase")]
    Subscribe {
        #[serde(rename = "Type")]
        event_type: EventType,
        event_name: String,
        /// Always serialized as `null`: the full payload is requested.
        return_property: Option<String>,
    },
    #[serde(rename_all = "PascalCase")]
    Unsubscribe { event_name: String },
}

impl ControlFrame {
    pub fn subscribe(event_type: EventType) -> Self {
        ControlFrame::Subscribe {
            event_type,
            event_name: event_type.as_str().to_string(),
            return_property: None,
        }
    }

    pub fn unsubscribe(event_type: EventType) -> Self {
        ControlFrame::Unsubscribe {
            event_name: event_type.as_str().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
