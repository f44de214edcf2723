//! Line-oriented DTS parser (spec §4.G).

use super::loader::IncBinLoader;
use crate::error::Error;
use crate::header::Header;
use crate::node::Node;
use crate::property::Property;
use crate::tree::Tree;

/// Parses DTS source text, resolving `/incbin/` references through `loader`.
pub(crate) fn parse_with_loader(text: &str, loader: &dyn IncBinLoader) -> Result<Tree, Error> {
    let (version, last_comp_version, boot_cpuid_phys) = extract_version_hints(text);
    let stripped = strip_comments(text);
    let mut cursor = Cursor {
        text: &stripped,
        pos: 0,
        loader,
    };

    cursor.skip_ws();
    cursor.eat_literal("/dts-v1/");
    cursor.skip_ws();
    cursor.eat_char(';');

    let mut reservations = Vec::new();
    loop {
        cursor.skip_ws();
        if !cursor.eat_literal("/memreserve/") {
            break;
        }
        cursor.skip_ws();
        let address = cursor.parse_number()?;
        cursor.skip_ws();
        let size = cursor.parse_number()?;
        cursor.skip_ws();
        cursor.expect_char(';')?;
        reservations.push((address, size));
    }

    cursor.skip_ws();
    let root_name = cursor
        .read_token()
        .ok_or_else(|| Error::syntax("expected a root node"))?
        .to_owned();
    if root_name == "/plugin/" {
        return Err(Error::Unsupported("/plugin/"));
    }
    let root = cursor.parse_node(&root_name)?;

    let header = Header {
        version,
        last_comp_version: last_comp_version.unwrap_or(0),
        boot_cpuid_phys: boot_cpuid_phys.unwrap_or(0),
        ..Header::default()
    };

    Ok(Tree {
        header,
        reservations,
        root,
    })
}

/// Strips `// ...` and `/* ... */` comments, leaving string-literal
/// contents untouched. Newlines outside of comments are preserved.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut in_string = false;

    while i < text.len() {
        let rest = &text[i..];
        let c = rest.chars().next().expect("i < text.len()");

        if in_string {
            out.push(c);
            if c == '"' {
                in_string = false;
            }
            i += c.len_utf8();
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }

        if rest.starts_with("//") {
            match rest.find('\n') {
                Some(nl) => i += nl,
                None => i = text.len(),
            }
            continue;
        }

        if rest.starts_with("/*") {
            match rest[2..].find("*/") {
                Some(end) => i += 2 + end + 2,
                None => i = text.len(),
            }
            continue;
        }

        out.push(c);
        i += c.len_utf8();
    }

    out
}

/// Scans raw (un-stripped) source for the version-hint comments that are
/// the only way header metadata survives in DTS text (spec §4.G step 2).
fn extract_version_hints(text: &str) -> (Option<u32>, Option<u32>, Option<u32>) {
    let mut version = None;
    let mut last_comp_version = None;
    let mut boot_cpuid_phys = None;

    for line in text.lines() {
        let Some(comment) = line.trim().strip_prefix("//") else {
            continue;
        };
        let comment = comment.trim();
        if let Some(value) = comment.strip_prefix("version:") {
            version = parse_hint(value.trim());
        } else if let Some(value) = comment.strip_prefix("last_comp_version:") {
            last_comp_version = parse_hint(value.trim());
        } else if let Some(value) = comment.strip_prefix("boot_cpuid_phys:") {
            boot_cpuid_phys = parse_hint(value.trim());
        }
    }

    (version, last_comp_version, boot_cpuid_phys)
}

fn parse_hint(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Returns whether `c` may appear in a bare node/property name or
/// directive token (`/memreserve/`, `/incbin/`, addressed names like
/// `cpu@0`, and so on).
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.,+@/#".contains(c)
}

/// A byte-offset cursor over already comment-stripped DTS text.
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    loader: &'a dyn IncBinLoader,
}

impl<'a> Cursor<'a> {
    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn eat_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, c: char) -> Result<(), Error> {
        if self.eat_char(c) {
            Ok(())
        } else {
            Err(Error::syntax(format!("expected {c:?}")))
        }
    }

    fn eat_literal(&mut self, literal: &str) -> bool {
        if self.text[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn read_token(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_name_char(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        (self.pos > start).then(|| &self.text[start..self.pos])
    }

    fn read_until(&mut self, end: char) -> Result<&'a str, Error> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == end {
                let body = &self.text[start..self.pos];
                self.pos += c.len_utf8();
                return Ok(body);
            }
            self.pos += c.len_utf8();
        }
        Err(Error::syntax(format!("unterminated value, expected {end:?}")))
    }

    fn parse_quoted_string(&mut self) -> Result<String, Error> {
        self.expect_char('"')?;
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '"' {
                let s = self.text[start..self.pos].to_owned();
                self.pos += 1;
                return Ok(s);
            }
            self.pos += c.len_utf8();
        }
        Err(Error::syntax("unterminated string literal"))
    }

    fn parse_string_list(&mut self) -> Result<Vec<String>, Error> {
        let mut out = Vec::new();
        loop {
            out.push(self.parse_quoted_string()?);
            self.skip_ws();
            if self.eat_char(',') {
                self.skip_ws();
                continue;
            }
            break;
        }
        Ok(out)
    }

    fn parse_number(&mut self) -> Result<u64, Error> {
        self.skip_ws();
        let token = self
            .read_token()
            .ok_or_else(|| Error::syntax("expected a number"))?;
        parse_u64_cell(token)
    }

    /// Parses one node body. The opening `{` has not yet been consumed.
    fn parse_node(&mut self, name: &str) -> Result<Node, Error> {
        self.skip_ws();
        self.expect_char('{')?;

        let mut node = Node::new(name);
        loop {
            self.skip_ws();
            if self.eat_char('}') {
                self.skip_ws();
                self.expect_char(';')?;
                return Ok(node);
            }
            if self.peek_char().is_none() {
                return Err(Error::syntax("unexpected end of input inside node body"));
            }

            let ident = self
                .read_token()
                .ok_or_else(|| Error::syntax("expected a node or property name"))?
                .to_owned();

            if ident == "/plugin/" {
                return Err(Error::Unsupported("/plugin/"));
            }
            if ident == "/bits/" {
                return Err(Error::Unsupported("/bits/"));
            }

            self.skip_ws();
            if self.peek_char() == Some('{') {
                let child = self.parse_node(&ident)?;
                node.append(child);
            } else if self.eat_char('=') {
                let prop = self.parse_property_value(&ident)?;
                node.append(prop);
            } else if self.eat_char(';') {
                node.append(Property::Empty { name: ident });
            } else {
                return Err(Error::syntax(format!("unexpected token after {ident:?}")));
            }
        }
    }

    fn parse_property_value(&mut self, name: &str) -> Result<Property, Error> {
        self.skip_ws();

        if self.eat_char('<') {
            let body = self.read_until('>')?;
            self.skip_ws();
            self.expect_char(';')?;
            let values = crate::property::parse_word_list(body)?;
            return Ok(Property::Words {
                name: name.to_owned(),
                values,
            });
        }

        if self.eat_char('[') {
            let body = self.read_until(']')?;
            self.skip_ws();
            self.expect_char(';')?;
            let values = crate::property::parse_byte_list(body)?;
            return Ok(Property::Bytes {
                name: name.to_owned(),
                values,
            });
        }

        if self.peek_char() == Some('"') {
            let values = self.parse_string_list()?;
            self.skip_ws();
            self.expect_char(';')?;
            return Ok(Property::Strings {
                name: name.to_owned(),
                values,
            });
        }

        if self.eat_literal("/incbin/") {
            return self.parse_incbin(name);
        }

        if self.eat_literal("/bits/") {
            return Err(Error::Unsupported("/bits/"));
        }

        Err(Error::syntax(format!(
            "unrecognized property value syntax for {name:?}"
        )))
    }

    fn parse_incbin(&mut self, name: &str) -> Result<Property, Error> {
        self.skip_ws();
        self.expect_char('(')?;
        self.skip_ws();
        let path = self.parse_quoted_string()?;
        self.skip_ws();

        let mut offset = 0u64;
        let mut length = 0u64;
        if self.eat_char(',') {
            self.skip_ws();
            offset = self.parse_number()?;
            self.skip_ws();
            if self.eat_char(',') {
                self.skip_ws();
                length = self.parse_number()?;
                self.skip_ws();
            }
        }

        self.expect_char(')')?;
        self.skip_ws();
        self.expect_char(';')?;

        let data = self.loader.load(&path, offset, length)?;
        let source = std::path::Path::new(&path)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());

        Ok(Property::IncBin {
            name: name.to_owned(),
            data,
            source,
        })
    }
}

/// Parses a single DTS integer token into a `u64`, using the same
/// base-detection rules as 32-bit cells (spec §4.G).
fn parse_u64_cell(token: &str) -> Result<u64, Error> {
    let (radix, digits) = if let Some(rest) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = token.strip_prefix("0b").or_else(|| token.strip_prefix("0B")) {
        (2, rest)
    } else if token.len() > 1 && token.starts_with('0') {
        (8, &token[1..])
    } else {
        (10, token)
    };
    u64::from_str_radix(digits, radix).map_err(|_| Error::syntax(format!("invalid integer: {token:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dts::loader::FsLoader;

    fn no_loader() -> FsLoader {
        FsLoader::new(".")
    }

    #[test]
    fn parses_a_word_property_s2() {
        let tree = parse_with_loader("/dts-v1/;\n/ { foo { bar = <0x1 0x2 0x3>; }; };", &no_loader()).unwrap();
        let foo = tree.root.get_subnode("foo").unwrap();
        assert_eq!(
            foo.get_property("bar"),
            Some(&Property::Words {
                name: "bar".into(),
                values: vec![1, 2, 3],
            })
        );
    }

    #[test]
    fn parses_memory_reservation_s5() {
        let tree = parse_with_loader("/dts-v1/;\n/memreserve/ 0x10000000 0x200000;\n/ { };", &no_loader()).unwrap();
        assert_eq!(tree.reservations, vec![(0x10000000, 0x200000)]);
    }

    #[test]
    fn rejects_plugin_directive() {
        let result = parse_with_loader("/dts-v1/;\n/plugin/;\n/ { };", &no_loader());
        assert!(matches!(result, Err(Error::Unsupported("/plugin/"))));
    }

    #[test]
    fn rejects_bits_directive() {
        let result = parse_with_loader("/dts-v1/;\n/ { foo { x = /bits/ 8 <0x1 0x2>; }; };", &no_loader());
        assert!(matches!(result, Err(Error::Unsupported("/bits/"))));
    }

    #[test]
    fn strips_line_and_block_comments() {
        let tree = parse_with_loader(
            "/dts-v1/;\n/* a block\ncomment */\n/ { // trailing\n  x; };",
            &no_loader(),
        )
        .unwrap();
        assert!(tree.root.get_property("x").is_some());
    }

    #[test]
    fn reads_version_hints_from_comments() {
        let tree = parse_with_loader(
            "/dts-v1/;\n// version: 17\n// last_comp_version: 16\n// boot_cpuid_phys: 0x1\n/ { };",
            &no_loader(),
        )
        .unwrap();
        assert_eq!(tree.header.version, Some(17));
        assert_eq!(tree.header.last_comp_version, 16);
        assert_eq!(tree.header.boot_cpuid_phys, 1);
    }

    #[test]
    fn incbin_goes_through_the_injected_loader() {
        struct StubLoader;
        impl IncBinLoader for StubLoader {
            fn load(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, Error> {
                assert_eq!(path, "fw.bin");
                assert_eq!(offset, 0);
                assert_eq!(length, 0);
                Ok(vec![1, 2, 3])
            }
        }

        let tree = parse_with_loader(
            "/dts-v1/;\n/ { foo { blob = /incbin/(\"fw.bin\"); }; };",
            &StubLoader,
        )
        .unwrap();
        let foo = tree.root.get_subnode("foo").unwrap();
        assert_eq!(
            foo.get_property("blob"),
            Some(&Property::IncBin {
                name: "blob".into(),
                data: vec![1, 2, 3],
                source: "fw.bin".into(),
            })
        );
    }
}
