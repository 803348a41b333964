pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod input;
pub mod logging;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod orchestrator;
