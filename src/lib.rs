pub mod cli;
pub mod config;
pub mod data;
pub mod export;
pub mod map;
pub mod palette;
pub mod resolve;
pub mod server;
pub mod session;
pub mod settings;
