pub mod auth;
pub mod client;
pub mod session;

pub use auth::{authenticate, AuthResponse, Authenticator, Credentials, AUTH_URL};
pub use client::{build_tree, TreeItem, UserData, WorkflowyClient};
pub use session::{SessionConfig, SESSION_CONFIG_PATH};
