//! HTTP API handlers for msgdesk-review

pub mod auth;
pub mod buildinfo;
pub mod export;
pub mod filter;
pub mod health;
pub mod label;
pub mod messages;
pub mod views;

pub use auth::{auth_middleware, login, register, AuthenticatedUser};
pub use buildinfo::get_build_info;
pub use export::export_relevant;
pub use filter::{filter_messages, get_page};
pub use health::health_routes;
pub use label::label_message;
pub use messages::{get_channels, get_messages, get_overview};
