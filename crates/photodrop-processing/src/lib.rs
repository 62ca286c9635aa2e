//! Photodrop Processing Library
//!
//! Content authentication of uploaded images and the buffered file type that carries
//! an upload through the pipeline.

pub mod upload;
pub mod validator;

pub use upload::types::{ParsedFile, TempBuffer};
pub use validator::{ContentAuthenticator, ContentRejection, Verdict};
