//! Error types shared across the DTB codec, the DTS codec, and the tree
//! operations.

use std::fmt;

/// Errors produced by any fallible entry point of this crate.
///
/// Parsing (`parse_dts`/`parse_dtb`), emission (`to_dtb`), and tree
/// mutation can all fail; `exist_node`/`exist_property` are the only call
/// sites that swallow [`Error::NotFound`] and turn it into a `bool`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The DTB header's magic number did not match `0xd00dfeed`.
    #[error("bad magic number: expected 0xd00dfeed, found {found:#010x}")]
    BadMagic {
        /// The magic number actually found.
        found: u32,
    },

    /// The DTB header declared a version outside the supported `2..=17` range.
    #[error("unsupported devicetree version: {0}")]
    UnsupportedVersion(u32),

    /// A read ran past the end of the input while decoding a DTB.
    #[error("truncated devicetree blob: {0}")]
    Truncated(&'static str),

    /// An unrecognized tag was encountered in the structure block.
    #[error("unknown structure block tag: {0:#x}")]
    UnknownTag(u32),

    /// The DTS text could not be parsed.
    #[error("DTS syntax error: {0}")]
    SyntaxError(String),

    /// A recognized-but-unsupported DTS directive was used (`/plugin/`, `/bits/`).
    #[error("unsupported DTS directive: {0}")]
    Unsupported(&'static str),

    /// A path or name lookup failed during a mutation.
    #[error("not found: {0}")]
    NotFound(String),

    /// A malformed argument was supplied (bad path syntax, missing version on emit, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Propagated from the external `/incbin/` file loader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a [`Error::NotFound`] for a missing node or property name.
    pub(crate) fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Builds an [`Error::InvalidArgument`].
    pub(crate) fn invalid_argument(what: impl fmt::Display) -> Self {
        Self::InvalidArgument(what.to_string())
    }

    /// Builds a [`Error::SyntaxError`].
    pub(crate) fn syntax(what: impl fmt::Display) -> Self {
        Self::SyntaxError(what.to_string())
    }
}
