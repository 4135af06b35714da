pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod preset;
pub mod session;
pub mod stats;
