pub mod config;
pub mod door;
pub mod error;
pub mod timer;
