//! Renders a [`Tree`] back to DTS text (spec §4.H).

use crate::node::Node;
use crate::tree::Tree;

/// Renders `tree` as DTS text, indenting `tabsize` spaces per nesting level.
///
/// Version metadata (present only when the tree's header has a version set)
/// survives solely as line comments, since DTS has no native syntax for it;
/// [`super::parser`] recognizes that exact comment form on the way back in.
pub(crate) fn print(tree: &Tree, tabsize: usize) -> String {
    let mut out = String::new();
    out.push_str("/dts-v1/;\n");

    if let Some(version) = tree.header.version {
        out.push_str(&format!("// version: {version}\n"));
        out.push_str(&format!(
            "// last_comp_version: {}\n",
            tree.header.last_comp_version
        ));
        out.push_str(&format!(
            "// boot_cpuid_phys: {:#x}\n",
            tree.header.boot_cpuid_phys
        ));
    }

    for (address, size) in &tree.reservations {
        out.push_str(&format!("/memreserve/ {address:#x} {size:#x};\n"));
    }

    print_node(&tree.root, 0, tabsize, &mut out);
    out
}

fn print_node(node: &Node, depth: usize, tabsize: usize, out: &mut String) {
    let indent = " ".repeat(depth * tabsize);
    let child_indent = " ".repeat((depth + 1) * tabsize);

    out.push_str(&indent);
    out.push_str(&node.name);
    out.push_str(" {\n");

    for prop in &node.props {
        out.push_str(&prop.to_dts(&child_indent));
    }
    for child in &node.children {
        print_node(child, depth + 1, tabsize, out);
    }

    out.push_str(&indent);
    out.push_str("};\n");
}
