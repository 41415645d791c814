pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod models;
pub mod output;
pub mod state;
pub mod totalizer;
