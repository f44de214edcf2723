//! The textual (DTS) codec: the parser (spec §4.G) and printer (spec §4.H).

pub mod loader;
mod parser;
mod printer;

use crate::error::Error;
use crate::tree::Tree;
use loader::IncBinLoader;

/// Parses DTS source text, resolving `/incbin/` references through `loader`.
pub(crate) fn parse_with_loader(text: &str, loader: &dyn IncBinLoader) -> Result<Tree, Error> {
    parser::parse_with_loader(text, loader)
}

/// Renders `tree` as DTS text, indenting `tabsize` spaces per nesting level.
pub(crate) fn print(tree: &Tree, tabsize: usize) -> String {
    printer::print(tree, tabsize)
}
