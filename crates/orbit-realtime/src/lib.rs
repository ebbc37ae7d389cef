//! orbit-realtime: Real-time render pipeline
//!
//! The engine is split into two handles:
//! - [`SpatController`] for the control thread (topology, configuration,
//!   source positions, meters)
//! - [`AudioRenderer`] for the audio callback
//!
//! They share a reconfiguration mutex that the audio side only ever
//! try-locks, plus lock-free [`exchange`] slots for gains and peaks.

pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod processor;
pub mod state;

pub use config::{AudioConfig, SourceAudioConfig, SpeakerAudioConfig};
pub use engine::{EngineSettings, SpatController, SpatEngine};
pub use error::{EngineError, EngineResult};
pub use exchange::{ExchangeReader, ExchangeWriter, exchange_slot};
pub use processor::{AudioRenderer, BlockOutcome, EngineStats, StatsSnapshot};
pub use state::{AudioState, SpatGains};
