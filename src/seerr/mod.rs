pub mod client;
pub mod config;
pub mod discover;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod media;
pub mod session;
pub mod upstream;
