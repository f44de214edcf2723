//! Typed property values (spec §4.C).
//!
//! A DTB erases the type of a property's payload; [`Property::from_raw`]
//! recovers it with a deterministic heuristic, documented on that function,
//! which is itself part of this crate's public contract (spec §9).

use crate::error::Error;
use crate::strings::StringPool;

/// A single devicetree property: a name plus a typed payload.
///
/// All five variants carry `name` (ASCII, no embedded NUL). Equality and
/// cloning are structural/deep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    /// A valueless property, e.g. `interrupt-controller;`.
    Empty {
        /// Property name.
        name: String,
    },
    /// A property whose value is an array of big-endian 32-bit cells.
    Words {
        /// Property name.
        name: String,
        /// Cell values, in order.
        values: Vec<u32>,
    },
    /// A property whose value is an opaque byte array.
    Bytes {
        /// Property name.
        name: String,
        /// Raw bytes, in order.
        values: Vec<u8>,
    },
    /// A property whose value is a list of NUL-separated UTF-8 strings.
    Strings {
        /// Property name.
        name: String,
        /// Strings, in order; none contain an embedded NUL.
        values: Vec<String>,
    },
    /// A property whose value was loaded from an external file via `/incbin/`.
    IncBin {
        /// Property name.
        name: String,
        /// The raw bytes read from the referenced file.
        data: Vec<u8>,
        /// The basename of the file the bytes were loaded from.
        source: String,
    },
}

impl Property {
    /// This property's name.
    pub fn name(&self) -> &str {
        match self {
            Self::Empty { name }
            | Self::Words { name, .. }
            | Self::Bytes { name, .. }
            | Self::Strings { name, .. }
            | Self::IncBin { name, .. } => name,
        }
    }

    /// Renders this property as a DTS statement, indented `indent` levels
    /// (each level is the caller's chosen number of spaces, already baked
    /// into `indent`).
    pub fn to_dts(&self, indent: &str) -> String {
        match self {
            Self::Empty { name } => format!("{indent}{name};\n"),
            Self::Words { name, values } => {
                let cells = values
                    .iter()
                    .map(|v| format!("{v:#x}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{indent}{name} = <{cells}>;\n")
            }
            Self::Bytes { name, values } => {
                let bytes = values
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{indent}{name} = [{bytes}];\n")
            }
            Self::Strings { name, values } => {
                let strings = values
                    .iter()
                    .map(|s| format!("\"{s}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{indent}{name} = {strings};\n")
            }
            Self::IncBin { name, source, .. } => {
                format!("{indent}{name} = /incbin/(\"{source}\");\n")
            }
        }
    }

    /// The raw payload bytes this property would occupy in a DTB's
    /// structure block (everything after the `FDT_PROP` header).
    pub fn to_dtb_raw(&self) -> Vec<u8> {
        match self {
            Self::Empty { .. } => Vec::new(),
            Self::Words { values, .. } => values.iter().flat_map(|v| v.to_be_bytes()).collect(),
            Self::Bytes { values, .. } => values.clone(),
            Self::Strings { values, .. } => {
                let mut out = Vec::new();
                for s in values {
                    out.extend_from_slice(s.as_bytes());
                    out.push(0);
                }
                out
            }
            Self::IncBin { data, .. } => data.clone(),
        }
    }

    /// Interns this property's name into `pool`, returning the offset to
    /// use as its `nameoff` in the emitted `FDT_PROP` header.
    pub(crate) fn intern_name(&self, pool: &mut StringPool) -> u32 {
        pool.intern(self.name())
    }

    /// Recovers a typed [`Property`] from a raw `(name, payload)` pair read
    /// out of a DTB structure block.
    ///
    /// The heuristic, in order:
    /// 1. An empty payload decodes as [`Property::Empty`].
    /// 2. A payload whose length is a positive multiple of 4, and which
    ///    would *not* parse as `Strings` below, decodes as
    ///    [`Property::Words`] when none of its bytes, read as a sequence
    ///    of NUL-terminated strings, fail the printable-ASCII check (i.e.
    ///    the bytes look like they are *not* text).
    /// 3. A payload consisting entirely of printable ASCII bytes, ending in
    ///    at least one NUL, decodes as [`Property::Strings`].
    /// 4. Everything else decodes as [`Property::Bytes`].
    ///
    /// This ordering matches spec §4.C: size-zero first, then the
    /// multiple-of-4-and-non-printable check for `Words`, then the
    /// printable-and-NUL-terminated check for `Strings`, with `Bytes` as
    /// the fallback.
    pub fn from_raw(name: &str, payload: &[u8]) -> Self {
        let name = name.to_owned();

        if payload.is_empty() {
            return Self::Empty { name };
        }

        let looks_like_strings = is_printable_nul_terminated(payload);

        if !looks_like_strings && payload.len() % 4 == 0 {
            let values = payload
                .chunks_exact(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            return Self::Words { name, values };
        }

        if looks_like_strings {
            if let Some(values) = split_nul_strings(payload) {
                return Self::Strings { name, values };
            }
        }

        Self::Bytes {
            name,
            values: payload.to_vec(),
        }
    }
}

/// Returns whether `payload` consists solely of printable (or whitespace)
/// ASCII bytes, interspersed with NUL terminators, and ends with a NUL.
fn is_printable_nul_terminated(payload: &[u8]) -> bool {
    if payload.last() != Some(&0) {
        return false;
    }
    payload
        .iter()
        .all(|&b| b == 0 || (0x20..0x7f).contains(&b) || b == b'\t' || b == b'\n')
}

/// Splits a NUL-terminated run of strings into a list, failing if any
/// chunk is not valid UTF-8.
fn split_nul_strings(payload: &[u8]) -> Option<Vec<String>> {
    let without_trailing_nul = &payload[..payload.len() - 1];
    without_trailing_nul
        .split(|&b| b == 0)
        .map(|chunk| std::str::from_utf8(chunk).ok().map(str::to_owned))
        .collect()
}

/// Parses a DTS `<...>` word-array body into a list of `u32` cells.
///
/// Each token's base is chosen the way the DTS grammar specifies: `0x`/`0X`
/// for hex, `0b`/`0B` for binary, a leading `0` (with more digits) for
/// octal, otherwise decimal.
pub(crate) fn parse_word_list(body: &str) -> Result<Vec<u32>, Error> {
    body.split_whitespace().map(parse_cell).collect()
}

/// Parses a single DTS integer cell token.
fn parse_cell(token: &str) -> Result<u32, Error> {
    let (radix, digits) = if let Some(rest) = token.strip_prefix("0x").or(token.strip_prefix("0X"))
    {
        (16, rest)
    } else if let Some(rest) = token.strip_prefix("0b").or(token.strip_prefix("0B")) {
        (2, rest)
    } else if token.len() > 1 && token.starts_with('0') {
        (8, &token[1..])
    } else {
        (10, token)
    };
    u32::from_str_radix(digits, radix)
        .map_err(|_| Error::syntax(format!("invalid integer cell: {token:?}")))
}

/// Parses a DTS `[...]` byte-array body into a list of bytes.
pub(crate) fn parse_byte_list(body: &str) -> Result<Vec<u8>, Error> {
    body.split_whitespace()
        .map(|tok| {
            u8::from_str_radix(tok, 16)
                .map_err(|_| Error::syntax(format!("invalid hex byte: {tok:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_empty_property() {
        assert_eq!(
            Property::from_raw("foo", &[]),
            Property::Empty { name: "foo".into() }
        );
    }

    #[test]
    fn string_heuristic_s3() {
        let payload = b"hello\0world\0";
        let prop = Property::from_raw("compatible", payload);
        assert_eq!(
            prop,
            Property::Strings {
                name: "compatible".into(),
                values: vec!["hello".into(), "world".into()],
            }
        );
        assert_eq!(prop.to_dtb_raw(), payload);
    }

    #[test]
    fn bytes_heuristic_s4() {
        let payload = [0xDEu8, 0xAD];
        assert_eq!(
            Property::from_raw("foo", &payload),
            Property::Bytes {
                name: "foo".into(),
                values: vec![0xDE, 0xAD],
            }
        );
    }

    #[test]
    fn words_heuristic_s2() {
        let payload = [0u8, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3];
        assert_eq!(
            Property::from_raw("bar", &payload),
            Property::Words {
                name: "bar".into(),
                values: vec![1, 2, 3],
            }
        );
    }

    #[test]
    fn empty_renders_bare_name() {
        let prop = Property::Empty { name: "foo".into() };
        assert_eq!(prop.to_dts(""), "foo;\n");
    }

    #[test]
    fn words_render_hex_cells() {
        let prop = Property::Words {
            name: "bar".into(),
            values: vec![1, 2, 3],
        };
        assert_eq!(prop.to_dts(""), "bar = <0x1 0x2 0x3>;\n");
    }

    #[test]
    fn parses_word_list_bases() {
        assert_eq!(
            parse_word_list("0x10 0b101 010 9").unwrap(),
            vec![0x10, 0b101, 0o10, 9]
        );
    }
}
