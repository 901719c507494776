//! Batch processing pipeline.
//!
//! Sequences table location and cell recognition over a batch of images,
//! reports stage and progress changes, and supports cancellation.

pub mod cancel;
pub mod config;
pub mod progress;
pub mod runner;
pub mod session;
pub mod state;

pub use config::{get_config, init_config, load_config, AppConfig};
pub use progress::LogSink;
pub use runner::start_processing;
pub use session::{BatchOptions, RunOutcome, RunReport, SourceImage};
pub use state::StepStatus;
