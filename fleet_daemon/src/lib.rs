mod fabric;
mod utils;

pub mod cli;
pub mod client_handler;
pub mod config;
pub mod daemon;
pub mod managers;
pub mod storage;
pub mod tls;
