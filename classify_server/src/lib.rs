//! Static image recognition front-end.
//!
//! Accepts an uploaded image, delegates classification to an external
//! service and reports the best label with its confidence.
pub mod classifier;
pub mod endpoints;
pub mod preview;
