pub mod config;
pub mod engine;
pub mod errors;
pub mod harness_config;
pub mod lifecycle;
pub mod logging;
pub mod process;
pub mod report;
pub mod ui;
pub mod verify;
