//! Robot-facing logic shared by the command-line tools.
//!
//! `api` wraps the robot's REST surface, `skills` resolves skill names to
//! ids, and `session` runs skills and event streams over the `pubsub` socket.

pub mod api;
pub mod error;
pub mod session;
pub mod skills;

pub use api::{ApiError, HttpRobotApi, RobotApi};
pub use error::SessionError;
pub use session::{
    Connector, EventSource, RunOrchestrator, SKILL_WATCH, SessionEvent, SessionOutcome,
    WsConnector, run_session,
};
pub use skills::{find_skill_id, resolve_skill_id};
