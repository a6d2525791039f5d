//! Command Surface
//!
//! The `mc` argument grammar and one handler per subcommand. Handlers write
//! their results to the `App`'s output (stdout in the binary) and return the
//! process exit code; diagnostics go through `tracing` to stderr.

use crate::{bundle::build_bundle, color::parse_color, config::Config};
use anyhow::Context;
use clap::{Parser, Subcommand};
use misty_core::{
    Connector, HttpRobotApi, RobotApi, RunOrchestrator, SessionError, SessionEvent,
    SessionOutcome, WsConnector, find_skill_id,
};
use misty_types::{EventType, SpeechParams};
use serde_json::{Map, Value};
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{error, info, warn};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
/// `run` saw the event stream close before the skill reported `Stopped`.
pub const EXIT_STREAM_CLOSED: u8 = 2;
pub const EXIT_INTERRUPTED: u8 = 130;

/// mc - control a Misty robot from the command line
#[derive(Debug, Parser)]
#[command(name = "mc", version, about)]
pub struct Cli {
    /// Robot address (host or host:port); overrides MISTY_ADDRESS
    #[arg(long, global = true)]
    pub address: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Control the LED
    Led {
        /// A color for the LED (e.g. '255,0,0' or 'red')
        color: String,
    },

    /// Speak
    Say {
        /// A string of text to speak
        text: String,

        #[arg(short, long, default_value_t = 1.0)]
        rate: f64,

        #[arg(short, long, default_value_t = 1.0)]
        pitch: f64,
    },

    /// Set the default volume
    Volume {
        /// A value between 0 and 100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        value: u8,
    },

    /// Get information about the robot
    Info {
        /// Only show device info keys starting with this prefix
        key: Option<String>,
    },

    /// Deploy a skill from the skills directory
    Deploy {
        /// A skill name, like 'look-around'
        name: String,
    },

    /// Remove a skill
    Remove {
        /// A skill name, like 'look-around'
        name: String,
    },

    /// Run a previously deployed skill and stream its output until it stops
    Run {
        /// A skill name, like 'look-around'
        name: String,
    },

    /// Cancel a running skill
    Cancel {
        /// A skill name, like 'look-around'
        name: String,
    },

    /// List skills
    Skills {
        /// Show all info
        #[arg(short, long)]
        verbose: bool,

        /// Only list running skills
        #[arg(short, long)]
        running: bool,
    },

    /// Generate a new unique ID
    #[command(alias = "uniqueId")]
    UniqueId,

    /// Show a live event stream for the given events
    Stream {
        /// One or more event types, like 'BumpSensor'
        #[arg(required = true, num_args = 1..)]
        events: Vec<EventType>,
    },

    /// Restart the robot
    Restart,

    /// Show hazard settings
    Hazards,
}

impl Commands {
    /// Whether the command talks to the robot at all.
    pub fn needs_robot(&self) -> bool {
        !matches!(self, Commands::UniqueId)
    }
}

/// Runs a parsed command line against the configured robot, writing to
/// stdout and treating `Ctrl+C` as cancellation.
pub async fn dispatch(cli: Cli, config: Config) -> anyhow::Result<u8> {
    let mut stdout = io::stdout();
    if !cli.command.needs_robot() {
        write_unique_id(&mut stdout)?;
        return Ok(EXIT_OK);
    }

    let address = config.require_address()?;
    info!(%address, "Using robot.");
    let mut app = App::new(
        HttpRobotApi::new(address),
        WsConnector::new(address),
        config.skills_path.clone(),
        stdout,
    );
    app.execute(cli.command, ctrl_c()).await
}

/// Resolves on `Ctrl+C`. If the handler cannot be installed, never resolves.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler.");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C.");
}

fn write_unique_id(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", uuid::Uuid::new_v4())
}

fn write_json(out: &mut impl Write, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    writeln!(out, "{}", text)?;
    Ok(())
}

/// Keeps the keys of a device info object that start with `prefix`.
pub fn filter_info(info: &Value, prefix: &str) -> Map<String, Value> {
    info.as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Command handlers bound to one robot and one output.
pub struct App<A, C, W> {
    orchestrator: RunOrchestrator<A, C>,
    skills_path: PathBuf,
    out: W,
}

impl<A, C, W> App<A, C, W>
where
    A: RobotApi,
    C: Connector,
    W: Write,
{
    pub fn new(api: A, connector: C, skills_path: PathBuf, out: W) -> Self {
        Self {
            orchestrator: RunOrchestrator::new(api, connector),
            skills_path,
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    fn api(&self) -> &A {
        self.orchestrator.api()
    }

    /// Runs one command. `cancel` is only watched by `run` and `stream`.
    pub async fn execute<Cn>(&mut self, command: Commands, cancel: Cn) -> anyhow::Result<u8>
    where
        Cn: Future<Output = ()>,
    {
        match command {
            Commands::Led { color } => self.led(&color).await,
            Commands::Say { text, rate, pitch } => {
                self.api()
                    .speak(SpeechParams {
                        flush: false,
                        text,
                        speech_rate: rate,
                        pitch,
                    })
                    .await?;
                Ok(EXIT_OK)
            }
            Commands::Volume { value } => {
                self.api().set_volume(value).await?;
                Ok(EXIT_OK)
            }
            Commands::Info { key } => self.info(key.as_deref()).await,
            Commands::Deploy { name } => self.deploy(&name).await,
            Commands::Remove { name } => self.remove(&name).await,
            Commands::Run { name } => self.run(&name, cancel).await,
            Commands::Cancel { name } => self.cancel(&name).await,
            Commands::Skills { verbose, running } => self.skills(verbose, running).await,
            Commands::UniqueId => {
                write_unique_id(&mut self.out)?;
                Ok(EXIT_OK)
            }
            Commands::Stream { events } => self.stream(&events, cancel).await,
            Commands::Restart => {
                let result = self.api().restart().await?;
                write_json(&mut self.out, &result)?;
                Ok(EXIT_OK)
            }
            Commands::Hazards => {
                let settings = self.api().hazard_settings().await?;
                write_json(&mut self.out, &settings)?;
                Ok(EXIT_OK)
            }
        }
    }

    async fn led(&mut self, color: &str) -> anyhow::Result<u8> {
        match parse_color(color) {
            Some(led) => {
                self.api().change_led(led).await?;
            }
            None => warn!(%color, "Unrecognised color; leaving the LED unchanged."),
        }
        Ok(EXIT_OK)
    }

    async fn info(&mut self, key: Option<&str>) -> anyhow::Result<u8> {
        let info = self.api().device_info().await?;
        match key {
            Some(prefix) => {
                let matching = filter_info(&info, prefix);
                if !matching.is_empty() {
                    write_json(&mut self.out, &matching)?;
                }
            }
            None => write_json(&mut self.out, &info)?,
        }
        Ok(EXIT_OK)
    }

    async fn deploy(&mut self, name: &str) -> anyhow::Result<u8> {
        let upload = build_bundle(&self.skills_path, name)
            .with_context(|| format!("Failed to bundle skill '{}'", name))?;
        let result = self.api().upload_skill(upload).await?;
        write_json(&mut self.out, &result)?;
        Ok(EXIT_OK)
    }

    async fn remove(&mut self, name: &str) -> anyhow::Result<u8> {
        let Some(skill_id) = find_skill_id(self.api(), name).await? else {
            return self.unknown_skill(name);
        };
        let result = self.api().remove_skill(&skill_id).await?;
        write_json(&mut self.out, &result)?;
        Ok(EXIT_OK)
    }

    async fn cancel(&mut self, name: &str) -> anyhow::Result<u8> {
        let Some(skill_id) = find_skill_id(self.api(), name).await? else {
            return self.unknown_skill(name);
        };
        let result = self.api().cancel_skill(&skill_id).await?;
        write_json(&mut self.out, &result)?;
        Ok(EXIT_OK)
    }

    async fn skills(&mut self, verbose: bool, running: bool) -> anyhow::Result<u8> {
        let skills = self.api().skills(running).await?;
        if verbose {
            write_json(&mut self.out, &skills)?;
        } else {
            for skill in &skills {
                writeln!(self.out, "{}", skill.name)?;
            }
        }
        Ok(EXIT_OK)
    }

    async fn run<Cn>(&mut self, name: &str, cancel: Cn) -> anyhow::Result<u8>
    where
        Cn: Future<Output = ()>,
    {
        let out = &mut self.out;
        let mut written: io::Result<()> = Ok(());
        let outcome = self
            .orchestrator
            .run_skill(
                name,
                |event| {
                    if written.is_err() {
                        return;
                    }
                    written = match event {
                        SessionEvent::Started(body) => serde_json::to_string_pretty(body)
                            .map_err(io::Error::other)
                            .and_then(|text| writeln!(out, "{}", text)),
                        SessionEvent::Event(envelope) => {
                            writeln!(out, "[{}] {}", envelope.event_name, envelope.render())
                        }
                        SessionEvent::Unclassified(err) => match err.frame() {
                            Some(frame) => writeln!(out, "[{}] {}", frame.event_name, frame.message),
                            None => Ok(()),
                        },
                    };
                },
                cancel,
            )
            .await;
        written?;

        match outcome {
            Ok(SessionOutcome::Stopped) => Ok(EXIT_OK),
            Ok(SessionOutcome::StreamClosed) => Ok(EXIT_STREAM_CLOSED),
            Ok(SessionOutcome::Cancelled) => Ok(EXIT_INTERRUPTED),
            Err(SessionError::SkillNotFound(_)) => self.unknown_skill(name),
            Err(e) => Err(e).with_context(|| format!("Failed to run skill '{}'", name)),
        }
    }

    async fn stream<Cn>(&mut self, events: &[EventType], cancel: Cn) -> anyhow::Result<u8>
    where
        Cn: Future<Output = ()>,
    {
        let out = &mut self.out;
        let mut written: io::Result<()> = Ok(());
        let outcome = self
            .orchestrator
            .stream_events(
                events,
                |event| {
                    if written.is_err() {
                        return;
                    }
                    // Frames are printed as received, classified or not.
                    let frame = match event {
                        SessionEvent::Event(envelope) => envelope.raw_frame(),
                        SessionEvent::Unclassified(err) => match err.frame() {
                            Some(frame) => frame.clone(),
                            None => return,
                        },
                        SessionEvent::Started(_) => return,
                    };
                    written = serde_json::to_string(&frame)
                        .map_err(io::Error::other)
                        .and_then(|text| writeln!(out, "{}", text));
                },
                cancel,
            )
            .await;
        written?;

        match outcome.context("Event stream failed")? {
            SessionOutcome::Cancelled => Ok(EXIT_INTERRUPTED),
            SessionOutcome::Stopped | SessionOutcome::StreamClosed => Ok(EXIT_OK),
        }
    }

    fn unknown_skill(&mut self, name: &str) -> anyhow::Result<u8> {
        writeln!(self.out, "{}", SessionError::SkillNotFound(name.to_string()))?;
        Ok(EXIT_FAILURE)
    }
}
