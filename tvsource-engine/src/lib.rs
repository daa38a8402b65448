//! tvsource-engine: source/signal state engine for TV middleware.
//!
//! The engine decides which input source drives the display pipeline,
//! sequences the hardware collaborators through a source switch, tracks
//! the selected source's signal state and coordinates channel scans.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tvsource_engine::database::Database;
//! use tvsource_engine::{Devices, EngineConfig, LogObserver, SourceEngine};
//! use tvsource_protocol::SourceInput;
//!
//! let db = Arc::new(Database::open_in_memory()?);
//! let engine = SourceEngine::new(Devices::null(db.clone(), db), EngineConfig::default());
//! engine.set_observer(Some(Arc::new(LogObserver)));
//!
//! engine.open()?;
//! engine.switch_source(SourceInput::Hdmi1, SourceInput::Hdmi1)?;
//! engine.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod database;
pub mod device;
pub mod engine;
pub mod event;
pub mod logging;
pub mod observer;
pub mod queue;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, ConfigFile, DemuxMode, EngineConfig};
pub use device::{DeviceError, Devices, NullDevice};
pub use engine::{Action, PipelineFlags, SourceEngine};
pub use event::{DetectorEvent, EngineEvent};
pub use observer::{EngineObserver, LogObserver};
pub use queue::{EventQueue, EventSender};
