pub mod ai;
pub mod artifact;
pub mod build;
pub mod errors;
pub mod generation;
pub mod genforge_config;
pub mod prompts;
pub mod quality;
pub mod sandbox;
pub mod ui;
