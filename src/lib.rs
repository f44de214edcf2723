//! Read, write, diff, and merge Flattened Device Trees (DTB/DTS).
//!
//! The binary (DTB) and textual (DTS) forms both round-trip through a
//! single in-memory [`Tree`]: an ordered tree of [`Node`]s carrying typed
//! [`Property`] values. `/incbin/` payloads are resolved through an
//! injectable [`IncBinLoader`] rather than hitting the filesystem directly,
//! so parsing can run entirely in memory.
//!
//! This crate does not interpret device-tree semantics — the meaning of
//! properties like `reg` or `compatible` is left to callers — nor does it
//! support the `/plugin/` overlay syntax or `/bits/` explicit-width arrays;
//! both are recognized and rejected with [`Error::Unsupported`].

mod diff;
mod dtb;
mod dts;
mod error;
mod header;
mod node;
mod property;
mod strings;
mod tree;

pub use diff::diff;
pub use dts::loader::{FsLoader, IncBinLoader};
pub use error::Error;
pub use header::Header;
pub use node::{Item, Node};
pub use property::Property;
pub use tree::{parse_dtb, parse_dts, parse_dts_with_loader, ItemKind, Tree};
