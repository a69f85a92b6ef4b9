//! # accountlink
//!
//! Social login for a web application: redirects visitors to OAuth identity
//! providers and decides, on callback, whether to log in, register or link
//! a connected account.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod repositories;
pub mod resolver;
pub mod server;
pub mod session;
pub mod telemetry;
pub use migration;
