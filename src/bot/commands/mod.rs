//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Admin balance commands
pub mod admin;

/// General utility commands
pub mod general;

/// Shop commands: listing, buying, balance and inventory
pub mod shop;

// Export commands
pub use admin::*;
pub use general::*;
pub use shop::*;
