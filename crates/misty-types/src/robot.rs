//! REST Data Types
//!
//! Request and response bodies for the robot's `/api` endpoints. Only the
//! fields this client reads are typed; anything else the robot reports on a
//! skill is kept in `extra` so verbose listings stay complete.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A skill installed on the robot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    pub unique_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub timeout_in_seconds: i64,
    #[serde(default)]
    pub startup_rules: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The robot's current hazard system thresholds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HazardSettings {
    pub bump_sensors: Vec<BumpSensorSetting>,
    pub tilt_hazard_threshold: Option<f64>,
    pub time_of_flight_sensors: Vec<TimeOfFlightSetting>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BumpSensorSetting {
    pub enabled: bool,
    pub sensor_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfFlightSetting {
    pub sensor_name: String,
    pub threshold: f64,
}

/// An RGB color for the chest LED.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl LedColor {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Parameters for the onboard text-to-speech engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechParams {
    pub flush: bool,
    pub text: String,
    pub speech_rate: f64,
    pub pitch: f64,
}

/// A packaged skill ready to be uploaded as a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillUpload {
    /// File name sent with the `File` part, e.g. `look-around.zip`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub immediately_apply: bool,
    pub overwrite_existing: bool,
}
