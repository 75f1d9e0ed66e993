pub mod classifier;
pub mod commands;
pub mod events;
pub mod lifecycle;
pub mod reconciler;
pub mod sequencer;
