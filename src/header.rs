//! The fixed-layout DTB header (spec §4.A).
//!
//! The on-disk header grows with `version`: 28 bytes for version 1, 32 for
//! version 2 (adds `boot_cpuid_phys`), 36 for version 3 (adds
//! `size_dt_strings`), 40 for version 17 (adds `size_dt_struct`) — the
//! complete ten-field `fdt_header`. This crate only emits version 16+
//! blobs, so [`Header::encode`] always writes the full 40-byte form;
//! [`Header::decode`] honors whatever length the declared version implies.

use crate::error::Error;

/// Value that must appear in the first four bytes of a DTB.
pub const MAGIC: u32 = 0xd00d_feed;

/// Lowest devicetree version this crate will decode.
const MIN_VERSION: u32 = 2;
/// Highest devicetree version this crate will decode.
const MAX_VERSION: u32 = 17;

/// The fixed preamble of a devicetree blob.
///
/// `version` is absent for a [`crate::Tree`] built from scratch that has
/// never been parsed from, or emitted to, a DTB. `boot_cpuid_phys` is only
/// meaningful once `version >= 2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Total size in bytes of the devicetree blob, including this header.
    pub total_size: u32,
    /// Byte offset of the structure block from the start of the header.
    pub off_dt_struct: u32,
    /// Byte offset of the strings block from the start of the header.
    pub off_dt_strings: u32,
    /// Byte offset of the memory reservation block from the start of the header.
    pub off_mem_rsvmap: u32,
    /// Devicetree structure version, or `None` if this tree was never parsed/emitted.
    pub version: Option<u32>,
    /// Lowest version this tree is backwards compatible with.
    pub last_comp_version: u32,
    /// Physical ID of the boot CPU.
    pub boot_cpuid_phys: u32,
    /// Byte length of the strings block.
    pub size_dt_strings: u32,
    /// Byte length of the structure block.
    pub size_dt_struct: u32,
}

impl Header {
    /// The length, in bytes, of the header as it would be emitted: the
    /// complete ten-field `fdt_header` (magic through `size_dt_struct`).
    pub const ENCODED_LEN: usize = 40;

    /// Decodes a header starting at `offset` in `data`.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self, Error> {
        let read_u32 = |at: usize| -> Result<u32, Error> {
            data.get(at..at + 4)
                .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or(Error::Truncated("header"))
        };

        let magic = read_u32(offset)?;
        if magic != MAGIC {
            return Err(Error::BadMagic { found: magic });
        }
        let total_size = read_u32(offset + 4)?;
        let off_dt_struct = read_u32(offset + 8)?;
        let off_dt_strings = read_u32(offset + 12)?;
        let off_mem_rsvmap = read_u32(offset + 16)?;
        let version = read_u32(offset + 20)?;
        let last_comp_version = read_u32(offset + 24)?;

        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        let boot_cpuid_phys = if version >= 2 { read_u32(offset + 28)? } else { 0 };
        let size_dt_strings = if version >= 3 { read_u32(offset + 32)? } else { 0 };
        let size_dt_struct = if version >= 17 { read_u32(offset + 36)? } else { 0 };

        let header = Self {
            total_size,
            off_dt_struct,
            off_dt_strings,
            off_mem_rsvmap,
            version: Some(version),
            last_comp_version,
            boot_cpuid_phys,
            size_dt_strings,
            size_dt_struct,
        };

        // The memory reservation block can't start before the header it
        // follows ends; a smaller offset means the declared header length
        // and `off_mem_rsvmap` disagree about where the header ends.
        if (off_mem_rsvmap as usize) < header.header_size()? {
            return Err(Error::Truncated(
                "off_mem_rsvmap precedes the end of the header",
            ));
        }

        Ok(header)
    }

    /// The byte length of the header this instance decodes to/from, given its `version`.
    pub fn header_size(&self) -> Result<usize, Error> {
        let version = self.version.ok_or_else(|| {
            Error::invalid_argument("header version must be set before computing its size")
        })?;
        Ok(if version < 2 {
            28
        } else if version < 3 {
            32
        } else if version < 17 {
            36
        } else {
            40
        })
    }

    /// Encodes this header. `version` must already be set.
    ///
    /// The encoder always writes the full 40-byte, version-17 layout (the
    /// complete ten-field `fdt_header`; emission always targets version >=
    /// 16 per spec §4.F) — the shorter legacy layouts only matter on
    /// decode.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let version = self
            .version
            .ok_or_else(|| Error::invalid_argument("cannot emit a header with no version set"))?;
        if self.last_comp_version > version {
            return Err(Error::invalid_argument(
                "last_comp_version must not exceed version",
            ));
        }

        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.total_size.to_be_bytes());
        out.extend_from_slice(&self.off_dt_struct.to_be_bytes());
        out.extend_from_slice(&self.off_dt_strings.to_be_bytes());
        out.extend_from_slice(&self.off_mem_rsvmap.to_be_bytes());
        out.extend_from_slice(&version.to_be_bytes());
        out.extend_from_slice(&self.last_comp_version.to_be_bytes());
        out.extend_from_slice(&self.boot_cpuid_phys.to_be_bytes());
        out.extend_from_slice(&self.size_dt_strings.to_be_bytes());
        out.extend_from_slice(&self.size_dt_struct.to_be_bytes());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_version_17_header() {
        let header = Header {
            total_size: 100,
            off_dt_struct: 56,
            off_dt_strings: 90,
            off_mem_rsvmap: 40,
            version: Some(17),
            last_comp_version: 16,
            boot_cpuid_phys: 0,
            size_dt_strings: 10,
            size_dt_struct: 34,
        };
        let encoded = header.encode().unwrap();
        assert_eq!(encoded.len(), Header::ENCODED_LEN);
        let decoded = Header::decode(&encoded, 0).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; 40];
        assert!(matches!(
            Header::decode(&bytes, 0),
            Err(Error::BadMagic { found: 0 })
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = vec![0u8; 40];
        bytes[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        bytes[20..24].copy_from_slice(&1u32.to_be_bytes());
        assert!(matches!(
            Header::decode(&bytes, 0),
            Err(Error::UnsupportedVersion(1))
        ));

        let mut bytes = vec![0u8; 40];
        bytes[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        bytes[20..24].copy_from_slice(&18u32.to_be_bytes());
        assert!(matches!(
            Header::decode(&bytes, 0),
            Err(Error::UnsupportedVersion(18))
        ));
    }

    #[test]
    fn encode_requires_version() {
        let header = Header::default();
        assert!(header.encode().is_err());
    }

    #[test]
    fn rejects_off_mem_rsvmap_that_overlaps_the_header() {
        let mut bytes = vec![0u8; 40];
        bytes[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        bytes[16..20].copy_from_slice(&4u32.to_be_bytes()); // off_mem_rsvmap
        bytes[20..24].copy_from_slice(&17u32.to_be_bytes()); // version
        assert!(matches!(Header::decode(&bytes, 0), Err(Error::Truncated(_))));
    }
}
