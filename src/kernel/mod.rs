//! Playback kernel: plan building, the sequence state machine and the
//! serialized session that drives a media engine with it.

pub mod cancel;
pub mod event;
pub mod heartbeat;
pub mod plan;
pub mod reactor;
pub mod registry;
pub mod scheduler;
pub mod segment;
pub mod sequence;
pub mod telemetry;
pub mod time;
