pub mod config;
pub mod constants;
pub mod error;
mod fanin;
pub mod http;
pub mod logger;
pub mod network;
pub mod parse;
pub mod provider;
pub mod setup;
