//! Walks the structure block of a DTB into a [`Tree`] (spec §4.E).

use super::{align4, tag};
use crate::error::Error;
use crate::header::Header;
use crate::node::Node;
use crate::property::Property;
use crate::strings::read_cstr;
use crate::tree::Tree;

/// A frame of an in-progress node, tracked on a parser-local stack.
///
/// Mirrors the way the reference parser keeps parallel `names`/`children`/
/// `properties` stacks while walking the tagged stream: rather than
/// storing a parent pointer on [`Node`] itself, ancestry only exists here,
/// transiently, for the duration of the parse.
struct Frame {
    node: Node,
}

/// Parses a devicetree blob starting at `offset` in `data`.
pub(crate) fn decode(data: &[u8], offset: usize) -> Result<Tree, Error> {
    let header = Header::decode(data, offset)?;
    let version = header.version.expect("decode always sets version");

    let reservations = read_reservations(data, offset + header.off_mem_rsvmap as usize)?;
    let root = read_structure(data, offset, &header, version)?;

    Ok(Tree {
        header,
        reservations,
        root,
    })
}

/// Reads `(address, size)` pairs until the `(0, 0)` terminator.
fn read_reservations(data: &[u8], mut index: usize) -> Result<Vec<(u64, u64)>, Error> {
    let mut out = Vec::new();
    loop {
        let address = read_u64(data, index)?;
        let size = read_u64(data, index + 8)?;
        index += 16;
        if address == 0 && size == 0 {
            break;
        }
        out.push((address, size));
    }
    Ok(out)
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, Error> {
    data.get(at..at + 8)
        .map(|b| u64::from_be_bytes(b.try_into().unwrap()))
        .ok_or(Error::Truncated("memory reservation block"))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, Error> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes(b.try_into().unwrap()))
        .ok_or(Error::Truncated("structure block"))
}

/// Walks the tagged structure block, returning the root node.
fn read_structure(
    data: &[u8],
    offset: usize,
    header: &Header,
    version: u32,
) -> Result<Node, Error> {
    let strings_base = offset + header.off_dt_strings as usize;
    let mut index = offset + header.off_dt_struct as usize;
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let tok = read_u32(data, index)?;
        index += 4;

        match tok {
            tag::BEGIN_NODE => {
                let name_start = index;
                let name = read_cstr(data, name_start)?;
                let name = if name.is_empty() { "/" } else { name };
                let consumed = name.len() + 1;
                index = name_start + align4(consumed);
                stack.push(Frame {
                    node: Node::new(name),
                });
            }
            tag::END_NODE => {
                let frame = stack.pop().ok_or(Error::Truncated("unmatched FDT_END_NODE"))?;
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(frame.node),
                    None => root = Some(frame.node),
                }
            }
            tag::PROP => {
                let len = read_u32(data, index)? as usize;
                let nameoff = read_u32(data, index + 4)? as usize;
                let mut payload_start = index + 8;

                // Pre-v16 alignment quirk: payloads of at least 8 bytes are
                // aligned up to an 8-byte boundary.
                if version < 16 && len >= 8 {
                    payload_start = (payload_start + 7) & !7;
                }

                let payload = data
                    .get(payload_start..payload_start + len)
                    .ok_or(Error::Truncated("property payload"))?;
                let name = read_cstr(data, strings_base + nameoff)?;
                let prop = Property::from_raw(name, payload);

                index = align4(payload_start + len);

                let frame = stack
                    .last_mut()
                    .ok_or(Error::Truncated("property outside of any node"))?;
                frame.node.append(prop);
            }
            tag::NOP => {}
            tag::END => {
                return root.ok_or(Error::Truncated("structure block had no root node"));
            }
            other => return Err(Error::UnknownTag(other)),
        }
    }
}
