//! # taskwatch
//!
//! Client side of the long-running task protocol used by the ML web
//! application: start a server-side task, find out whether one already
//! exists, and poll it until the server reports a terminal status.
//!
//! Every endpoint answers with the same JSON envelope:
//!
//! ```json
//! {"status": "pending|running|completed|failed|unknown",
//!  "task_id": "...", "message": "...", "error": "...", "result": {}}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskwatch::{HttpTransport, PollConfig, TaskMonitor, TaskwatchConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TaskwatchConfig::load(None)?;
//! let transport = HttpTransport::new(config.client_config())?;
//! let url = config.resolve_url("/ml_app/api/datasets/42/audit/")?;
//!
//! let monitor = TaskMonitor::new(transport, url, PollConfig::analysis());
//! let handle = monitor.launch(None).await?;
//! let result = monitor.poll(&handle).await?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`monitor`]: check, launch and poll, plus the observer-driven flows
//! - [`envelope`]: envelope decoding and validation
//! - [`session`]: per-session lifecycle
//! - [`transport`]: the request seam and its HTTP implementation
//! - [`config`]: polling presets and layered client configuration
//! - [`slot`]: guard against double launches
//! - [`report`] and [`audit`]: presenting errors and audit results

pub mod audit;
pub mod config;
pub mod envelope;
pub mod error;
pub mod monitor;
pub mod report;
pub mod session;
pub mod slot;
pub mod task;
pub mod testing;
pub mod transport;

pub use audit::AuditReport;
pub use config::{PollConfig, TaskwatchConfig};
pub use envelope::StandardizedResponse;
pub use error::{ConfigError, ErrorDetails, ErrorKind, Result, TaskError};
pub use monitor::{ExistingStatus, TaskMonitor, TaskObserver};
pub use session::{PollSession, SessionState};
pub use slot::{SlotGuard, TaskSlot};
pub use task::{TaskHandle, TaskInfo, TaskStatus};
pub use transport::{HttpTransport, Transport};
