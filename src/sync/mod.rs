pub mod cancel;
pub mod clock;
pub mod pacing;
pub mod scheduler;

pub use cancel::CancelToken;
pub use clock::PlaybackClock;
pub use pacing::{FrameDecision, FramePacer};
pub use scheduler::{SchedulerContext, SchedulerHandle};
