pub mod config;
pub mod counter;
pub mod frame;
pub mod pose;
pub mod server;
