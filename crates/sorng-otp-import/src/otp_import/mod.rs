//! OTP import crate: sub-modules.

pub mod types;
pub mod error;
pub mod key;
pub mod crypto;
pub mod schema;
pub mod uri;
pub mod core;
pub mod pipeline;

// Re-export top-level items for convenience.
pub use types::*;
pub use error::{OtpError, OtpErrorKind, OtpResult};
pub use key::{validate_key, SecretKey};
pub use schema::{EntryDecoder, EntrySchema};
pub use pipeline::{RecoveryConfig, RecoveryPipeline};
