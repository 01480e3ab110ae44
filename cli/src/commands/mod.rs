pub mod config;
pub mod fetch;
pub mod launch;
pub mod status;
pub mod wait;
