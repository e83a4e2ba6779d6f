pub mod adapter;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod eth;
pub mod gallery;
pub mod panel;
pub mod path;
pub mod transport;
