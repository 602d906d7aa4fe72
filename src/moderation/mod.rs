pub mod archiver;
pub mod commands;
pub mod evaluator;
pub mod reaper;
pub mod reconciler;
pub mod scheduler;
