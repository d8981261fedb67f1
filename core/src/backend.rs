pub mod navigator;
pub mod timers;
