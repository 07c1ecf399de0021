//! # FolioFlow Core
//!
//! Data models and pure logic for FolioFlow wallet analysis.
//!
//! This crate holds everything that does not perform I/O: the records passed
//! between flow steps, the error taxonomy, the payment-gate state machine and
//! the renderer that turns a backend analysis into a view model.

pub mod error;
pub mod models;
pub mod payment;
pub mod render;

pub use error::*;
pub use models::*;
pub use payment::*;
pub use render::*;
