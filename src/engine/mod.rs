// Transcode engine, independent of the command-line front end

pub mod cancel;
pub mod core;
pub mod duration;
pub mod hardware;
pub mod probe;
pub mod queue;
pub mod runner;
pub mod validate;
pub mod worker;

pub use cancel::CancelToken;
pub use self::core::*;
pub use duration::{DetectedDuration, DurationResolver};
pub use hardware::{CapabilityProbe, EncoderCapabilities, Vendor, VideoEncoder, select_encoder};
pub use queue::Queue;
pub use runner::{ProcessRunner, RunOutcome};
pub use worker::{QueueOrchestrator, RunEvent, RunSettings, RunSummary};
