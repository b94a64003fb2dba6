//! Utility functions shared by the relay pipeline.
//!
//! - **Text sanitizing**: turn feed-controlled text into a single safe chat line
//! - **URL validation**: check the configured feed base URL before any request
//!
//! # Examples
//!
//! ```
//! use feedrelay::util::{sanitize_line, validate_base_url};
//!
//! assert_eq!(sanitize_line("Breaking\nnews\x07"), "Breaking news");
//! assert!(validate_base_url("https://www.reddit.com").is_ok());
//! ```

mod text;
mod url_validator;

pub use text::{sanitize_line, strip_control_chars};
pub use url_validator::{validate_base_url, UrlValidationError};
