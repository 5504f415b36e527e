pub mod events;
pub mod frame_queue;
pub mod launcher;
pub mod player;
pub mod presentation;
mod seek;
mod session;

pub use events::PlayerEvent;
pub use frame_queue::FrameQueue;
pub use player::Player;
pub use presentation::{FrameSink, NullSink, PlayerState};
