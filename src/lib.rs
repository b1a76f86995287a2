pub mod clock;
pub mod config;
pub mod engine;
pub mod history;
pub mod schedule;
pub mod settlement;
pub mod store;
pub mod types;
