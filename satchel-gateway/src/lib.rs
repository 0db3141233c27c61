//! HTTP media gateway: upload and download of large binary attachments
//! over an axum router, backed by a pluggable [`satchel_media::MediaHandler`]
//! and fronted by a [`satchel_auth::AuthGate`].
//!
//! Every control response is one JSON [`Envelope`]; successful downloads
//! stream the raw blob with range and conditional-request support.

mod config;
mod content;
mod envelope;
mod error;
mod handlers;
mod routes;
mod sniff;
mod state;

pub use config::GatewayConfig;
pub use content::serve_content;
pub use envelope::{Ctrl, Envelope};
pub use error::GatewayError;
pub use handlers::{download, upload, upload_not_allowed, API_KEY_HEADER, SESSION_PARAM};
pub use routes::{media_router, SERVE_PATH, UPLOAD_PATH};
pub use sniff::{detect_content_type, SNIFF_LEN};
pub use state::GatewayState;
