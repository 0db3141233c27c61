//! # satchel-auth: authentication gate for the Satchel media gateway
//!
//! One call, one classified outcome: [`AuthGate::authorize`] checks the API
//! key syntactically, resolves the caller through an injected
//! [`Authenticator`], and rejects the zero identity. Identity state and
//! credential cryptography live in the identity subsystem, not here.

mod api_key;
mod error;
mod gate;

pub use api_key::{encode_key, ApiKeyScheme, API_KEY_LEN, API_KEY_VERSION};
pub use error::{AuthError, AuthResult};
pub use gate::{AuthGate, AuthOutcome, AuthRequest, Authenticator, UserId};
