pub mod aggregate;
pub mod collector;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod task;
