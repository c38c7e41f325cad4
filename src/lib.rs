pub mod error;
pub mod workflowy;

pub use error::{Error, Result};
pub use workflowy::{
    authenticate, AuthResponse, Authenticator, Credentials, SessionConfig, TreeItem,
    WorkflowyClient,
};
