//! Request-side image handling.
//!
//! - **decode**: turn upload bytes into an RGB image, off the async executor

pub mod decode;

pub use decode::{DecodedImage, ImageDecoder};
