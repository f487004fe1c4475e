//! LapLens: lap and sector reconstruction plus driver scoring for GR Cup
//! telemetry.
//!
//! ```text
//! raw rows -> normalizer -> segmenter -> sectors -> aggregator -> story
//! ```
//!
//! Everything runs as a batch over one finished session. Configuration is
//! built once and passed by reference; nothing keeps state between calls.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod normalizer;
pub mod sectors;
pub mod segmenter;
pub mod session;
pub mod stats;
pub mod story;
pub mod vehicle;

pub use config::{AnalysisConfig, SectorRange, Thresholds, WindowScope};
pub use error::{Degradation, LapLensError};
pub use model::{Channel, Derived, LapRecord, SectorRecord, TelemetryRow, ERRONEOUS_LAP_NUMBER};
pub use session::{load_rows, ProcessedSession, SessionProcessor};
pub use story::{Story, StoryGenerator};
