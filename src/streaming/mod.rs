//! Streaming utterance pipeline.
//!
//! ```text
//! ┌────────────┐    ┌───────────┐    ┌────────────┐    ┌──────────┐    ┌─────────┐
//! │  Session   │───▶│ Segmenter │───▶│ Normalizer │───▶│ Governor │───▶│ Emitter │───▶ Client
//! │  (frames)  │    │  (pauses) │    │ (16k mono) │    │ (adapter)│    │ (order) │
//! └────────────┘    └───────────┘    └────────────┘    └──────────┘    └─────────┘
//!                                                           ▲
//!                                          shared by all ───┘
//!                                             sessions
//! ```

pub mod governor;
pub mod pipeline;
pub mod segmenter;
pub mod session;

pub use governor::ConcurrencyGovernor;
pub use pipeline::UtterancePipeline;
pub use segmenter::{SegmenterConfig, SegmenterState, UtteranceSegmenter};
pub use session::{
    ConnectionEvent, SessionId, SessionInfo, SessionManager, SessionSummary, TranslatedAudio,
};
