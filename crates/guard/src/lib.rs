//! aegis_guard
//!
//! Two independent boundary checks used by tool execution: containing
//! filesystem paths to a base directory (`path`), and keeping outbound HTTP
//! requests off private network ranges (`ssrf`).

pub mod path;
pub mod ssrf;

pub use path::{sanitize_media_path, sanitize_path, validate_path, MediaPathOptions, PathGuardError};
pub use ssrf::{is_private_ip, is_url_safe, SsrfGuardError};
