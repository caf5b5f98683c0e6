pub mod activity;
pub mod config;
pub mod runner;
pub mod utils;
