//! Media Engine Adapter: a thin layer over a platform player.

pub mod adapter;
pub mod backend;
pub mod simulated;
