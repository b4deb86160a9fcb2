//! KSM client utilities: sub-modules.

pub mod types;
pub mod core;
pub mod uri;
pub mod encoding;
pub mod password;
pub mod config;
pub mod permissions;
pub mod storage;

// Re-export top-level items for convenience.
pub use types::*;
pub use self::core::{decode_secret, get_totp_code, get_totp_code_at};
pub use uri::parse_otpauth_uri;
pub use password::{generate_password, PasswordPolicy};
pub use config::ModeConfig;
pub use permissions::{platform_enforcer, FilePermissionEnforcer, ModeCheck};
pub use storage::{FileKeyValueStorage, InMemoryKeyValueStorage, KeyValueStorage};
