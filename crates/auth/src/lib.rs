//! whispr-auth – credential verification, sessions, and permission resolution
//!
//! - `password`: PBKDF2-SHA256 hashing (§3)
//! - `session`: in-memory session store with a one-session-per-user rule (§3)
//! - `permission_service`: three-valued Allow/Deny/Neutral resolution (§4.5)
//! - `service`: account provisioning and login/logout

pub mod error;
pub mod password;
pub mod permission_service;
pub mod service;
pub mod session;

pub use error::{AuthError, AuthResult};
pub use password::{hash_password, verify_password};
pub use permission_service::PermissionService;
pub use service::AuthService;
pub use session::{Session, SessionStore};
