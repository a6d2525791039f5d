//! Robot REST Client
//!
//! Thin request/response wrappers over the robot's `http://<host>/api`
//! endpoints. The `RobotApi` trait is the seam the orchestrator and the CLI
//! talk to, so the HTTP implementation can be swapped for a mock in tests.

use async_trait::async_trait;
use misty_types::{HazardSettings, LedColor, Skill, SkillUpload, SpeechParams};
use reqwest::{Client, Method, RequestBuilder, StatusCode, multipart};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

/// Errors returned by the REST layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to '{path}' failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Robot returned {status} for '{path}': {body}")]
    Status {
        path: String,
        status: StatusCode,
        body: String,
    },
    #[error("Unexpected response body from '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Builds the REST base URL for a robot address such as `192.168.1.20`.
pub fn api_url(address: &str) -> String {
    format!("http://{}/api", address)
}

/// The robot's REST operations used by this client.
///
/// Operations documented as returning "the response body" hand back the whole
/// JSON document; the others unwrap the robot's `{ "result": ... }` wrapper.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RobotApi: Send + Sync {
    /// Lists installed skills, or only the running ones.
    async fn skills(&self, running: bool) -> Result<Vec<Skill>, ApiError>;

    /// Starts a skill by unique id. Returns the response body; does not wait
    /// for the skill to finish.
    async fn start_skill(&self, skill_id: &str) -> Result<Value, ApiError>;

    /// Cancels a running skill. Returns the response body.
    async fn cancel_skill(&self, skill_id: &str) -> Result<Value, ApiError>;

    /// Removes an installed skill. Returns the response body.
    async fn remove_skill(&self, skill_id: &str) -> Result<Value, ApiError>;

    async fn change_led(&self, color: LedColor) -> Result<Value, ApiError>;

    async fn speak(&self, params: SpeechParams) -> Result<Value, ApiError>;

    /// Sets the default volume (0-100) for sounds and speech.
    async fn set_volume(&self, volume: u8) -> Result<Value, ApiError>;

    async fn device_info(&self) -> Result<Value, ApiError>;

    async fn hazard_settings(&self) -> Result<HazardSettings, ApiError>;

    /// Reboots the robot's core and sensory services.
    async fn restart(&self) -> Result<Value, ApiError>;

    /// Uploads a packaged skill as a multipart form.
    async fn upload_skill(&self, upload: SkillUpload) -> Result<Value, ApiError>;
}

#[derive(serde::Deserialize)]
struct Wrapped<T> {
    result: T,
}

/// `RobotApi` over plain HTTP using `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpRobotApi {
    client: Client,
    base_url: String,
}

impl HttpRobotApi {
    /// Creates a client for the robot at `address` (host or host:port).
    pub fn new(address: &str) -> Self {
        Self::with_base_url(api_url(address))
    }

    /// Creates a client against an explicit base URL, e.g. a test server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
    }

    async fn execute(&self, path: &str, request: RequestBuilder) -> Result<Value, ApiError> {
        debug!(%path, "Sending robot API request.");
        let response = request.send().await.map_err(|source| ApiError::Http {
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|source| ApiError::Http {
            path: path.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn get_result<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.execute(path, self.request(Method::GET, path)).await?;
        let wrapped: Wrapped<T> =
            serde_json::from_value(body).map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            })?;
        Ok(wrapped.result)
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let request = self.request(Method::POST, path).json(body);
        self.execute(path, request).await
    }
}

#[async_trait]
impl RobotApi for HttpRobotApi {
    async fn skills(&self, running: bool) -> Result<Vec<Skill>, ApiError> {
        let path = if running { "skills/running" } else { "skills" };
        self.get_result(path).await
    }

    async fn start_skill(&self, skill_id: &str) -> Result<Value, ApiError> {
        self.post_json("skills/start", &json!({ "Skill": skill_id }))
            .await
    }

    async fn cancel_skill(&self, skill_id: &str) -> Result<Value, ApiError> {
        self.post_json("skills/cancel", &json!({ "Skill": skill_id }))
            .await
    }

    async fn remove_skill(&self, skill_id: &str) -> Result<Value, ApiError> {
        let request = self
            .request(Method::DELETE, "skills")
            .query(&[("Skill", skill_id)]);
        self.execute("skills", request).await
    }

    async fn change_led(&self, color: LedColor) -> Result<Value, ApiError> {
        self.post_json("led", &color).await
    }

    async fn speak(&self, params: SpeechParams) -> Result<Value, ApiError> {
        self.post_json("tts/speak", &params).await
    }

    async fn set_volume(&self, volume: u8) -> Result<Value, ApiError> {
        self.post_json("audio/volume", &json!({ "Volume": volume }))
            .await
    }

    async fn device_info(&self) -> Result<Value, ApiError> {
        self.get_result("device").await
    }

    async fn hazard_settings(&self) -> Result<HazardSettings, ApiError> {
        self.get_result("hazards/settings").await
    }

    async fn restart(&self) -> Result<Value, ApiError> {
        self.post_json("reboot", &json!({ "Core": true, "SensoryServices": true }))
            .await
    }

    async fn upload_skill(&self, upload: SkillUpload) -> Result<Value, ApiError> {
        let file = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str("application/zip")
            .map_err(|source| ApiError::Http {
                path: "skills".to_string(),
                source,
            })?;
        let form = multipart::Form::new()
            .part("File", file)
            .text("ImmediatelyApply", upload.immediately_apply.to_string())
            .text("OverwriteExisting", upload.overwrite_existing.to_string());

        let request = self.request(Method::POST, "skills").multipart(form);
        self.execute("skills", request).await
    }
}
