//! Small helpers shared by the command layer.
//!
//! - **URL validation**: accept only absolute http(s) feed URLs
//! - **Text processing**: width-aware truncation and control-character
//!   stripping for terminal output

mod text;
mod url_validator;

pub use text::{strip_control_chars, truncate_with_ellipsis};
pub use url_validator::{validate_feed_url, UrlValidationError};
