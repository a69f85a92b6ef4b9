//! # Data Models
//!
//! This module contains the SeaORM entities and shared response types used
//! throughout the accountlink service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod connected_account;
pub mod session;
pub mod user;

pub use connected_account::Entity as ConnectedAccount;
pub use session::Entity as Session;
pub use user::Entity as User;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "accountlink".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
