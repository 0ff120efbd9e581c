//! Commonly used items for convenient importing.
//!
//! ```rust
//! use softcheck::prelude::*;
//!
//! fn check_name(name: &str) -> Result<(), AssertionError> {
//!     ensure!(!name.is_empty(), "name must not be empty");
//!     ensure!(name.len() <= 8, "name {name:?} is too long");
//!     Ok(())
//! }
//!
//! let error = assert_softly(|| {
//!     with_clue(|| "first user", || check_name(""))?;
//!     with_clue(|| "second user", || check_name("bartholomew"))
//! })
//! .unwrap_err();
//! assert_eq!(error.failures().len(), 2);
//! ```

pub use crate::{
    AssertionError, CollectionMode, ErrorCollector, Failure, assert_softly, context, ensure,
    failure, with_clue, with_mode,
};
