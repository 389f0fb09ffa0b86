//! Command-line arguments and their merge into the configuration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use taskwatch::{ConfigError, TaskwatchConfig};

#[derive(Parser, Debug)]
#[command(name = "taskwatch")]
#[command(about = "Launch, resume and poll long-running server tasks", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file (YAML or JSON)
    #[arg(long, global = true, env = "TASKWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Prefix for relative task URLs
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// CSRF token sent on launches
    #[arg(long, global = true)]
    pub csrf_token: Option<String>,

    /// Cookie header to forward (a csrftoken cookie supplies the CSRF token)
    #[arg(long, global = true)]
    pub cookie: Option<String>,

    /// Poll preset: analysis, upload, or one defined in the config file
    #[arg(long, global = true)]
    pub preset: Option<String>,

    /// Delay between status checks, in milliseconds
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Give up after this many status checks
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Per-request timeout, in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the task already known at URL, if any
    Status {
        /// Task endpoint
        url: String,
    },

    /// Start a task and print its id
    Launch {
        /// Task endpoint
        url: String,
        /// JSON request body (default: {})
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Poll a task until it finishes
    Poll {
        /// Task endpoint
        url: String,
        /// Task id returned at launch
        task_id: String,
    },

    /// Follow an existing task, or launch one, and wait for the result
    Run {
        /// Task endpoint
        url: String,
        /// JSON request body (default: {})
        #[arg(short, long)]
        body: Option<String>,
        /// Launch even if a task already exists
        #[arg(long)]
        fresh: bool,
    },
}

impl Commands {
    pub fn url(&self) -> &str {
        match self {
            Commands::Status { url }
            | Commands::Launch { url, .. }
            | Commands::Poll { url, .. }
            | Commands::Run { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl GlobalArgs {
    /// File, preset and environment configuration with flags applied on top.
    pub fn load_config(&self) -> Result<TaskwatchConfig, ConfigError> {
        let config =
            TaskwatchConfig::load_with_preset(self.config.as_deref(), self.preset.as_deref())?;
        self.apply(config)
    }

    /// Apply connection and polling flags. `--preset` is resolved while
    /// loading, so it is not applied here.

    pub fn apply(&self, mut config: TaskwatchConfig) -> Result<TaskwatchConfig, ConfigError> {
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if let Some(token) = &self.csrf_token {
            config.csrf_token = Some(token.clone());
        }
        if let Some(cookie) = &self.cookie {
            config.cookie = Some(cookie.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }

        if let Some(ms) = self.interval_ms {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_attempts {
            config.poll.max_attempts = Some(max);
        }

        config.validate()?;
        Ok(config)
    }
}
