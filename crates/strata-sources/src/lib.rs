//! # strata-sources
//!
//! Where migrations come from. A [`Source`] turns some storage into a
//! validated [`MigrationSet`](strata_core::MigrationSet):
//!
//! - [`FileSource`] reads a directory of `.sql` files.
//! - [`EmbeddedSource`] reads files compiled into the binary.

pub mod embedded;
pub mod file;
pub mod source;

pub use embedded::EmbeddedSource;
pub use file::FileSource;
pub use source::{is_migration_file, migration_from_file, parse_file_name, ParsedName, Source};
