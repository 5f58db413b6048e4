pub mod artifacts;
pub mod cli;
pub mod compose;
pub mod config;
pub mod core;
pub mod diff;
pub mod engine;
pub mod exit;
pub mod filter;
pub mod github;
pub mod logs;
pub mod resolve;
pub mod runner_id;
pub mod tracker;
pub mod ui;
