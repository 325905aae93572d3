pub mod bot;
pub mod cli;
pub mod config;
pub mod error;
pub mod registry;
pub mod tools;
