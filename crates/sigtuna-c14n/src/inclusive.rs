#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0, whole-document form.
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - Drops the XML declaration and DOCTYPE
//! - Outputs namespace declarations sorted by prefix (default first),
//!   suppressing declarations already in force on an ancestor
//! - Outputs attributes sorted by (namespace-URI, local-name), attributes
//!   without a namespace first
//! - Escapes text, attribute values, and PI data per C14N rules
//! - Optionally preserves or strips comments

use crate::escape;
use sigtuna_core::Error;
use std::collections::BTreeMap;

/// Canonicalize a complete document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    process_node(doc.root(), with_comments, &mut output, &BTreeMap::new())?;
    Ok(output)
}

fn process_node(
    node: roxmltree::Node<'_, '_>,
    with_comments: bool,
    output: &mut Vec<u8>,
    inherited_ns: &BTreeMap<String, String>,
) -> Result<(), Error> {
    match node.node_type() {
        roxmltree::NodeType::Root => {
            for child in node.children() {
                process_node(child, with_comments, output, inherited_ns)?;
            }
        }
        roxmltree::NodeType::Element => {
            process_element(node, with_comments, output, inherited_ns)?;
        }
        roxmltree::NodeType::Text => {
            let text = node.text().unwrap_or("");
            output.extend_from_slice(escape::escape_text(text).as_bytes());
        }
        roxmltree::NodeType::Comment => {
            if with_comments {
                render_misc(node, output, |out| {
                    out.extend_from_slice(b"<!--");
                    out.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    out.extend_from_slice(b"-->");
                });
            }
        }
        roxmltree::NodeType::PI => {
            render_misc(node, output, |out| {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(node.tag_name().name().as_bytes());
                if let Some(value) = node.text() {
                    if !value.is_empty() {
                        out.push(b' ');
                        out.extend_from_slice(escape::escape_pi(value).as_bytes());
                    }
                }
                out.extend_from_slice(b"?>");
            });
        }
    }
    Ok(())
}

/// Render a comment or PI, inserting the document-level newlines C14N
/// requires around nodes that are siblings of the document element.
fn render_misc(
    node: roxmltree::Node<'_, '_>,
    output: &mut Vec<u8>,
    body: impl FnOnce(&mut Vec<u8>),
) {
    let parent_is_root = node
        .parent()
        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }
    body(output);
    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }
}

fn process_element(
    node: roxmltree::Node<'_, '_>,
    with_comments: bool,
    output: &mut Vec<u8>,
    inherited_ns: &BTreeMap<String, String>,
) -> Result<(), Error> {
    // All namespaces in force at this element; declarations already
    // inherited from an ancestor are not re-emitted.
    let current_ns = collect_inscope_namespaces(&node);

    let mut ns_decls: Vec<(&String, &String)> = current_ns
        .iter()
        .filter(|(prefix, uri)| {
            prefix.as_str() != "xml" && inherited_ns.get(*prefix) != Some(*uri)
        })
        .collect();
    // Default namespace (empty prefix) sorts first, then by prefix.
    ns_decls.sort_by(|a, b| {
        (!a.0.is_empty(), a.0.as_str()).cmp(&(!b.0.is_empty(), b.0.as_str()))
    });

    // Attributes sorted by (has-namespace, namespace URI, local name).
    let mut attrs: Vec<roxmltree::Attribute<'_, '_>> = node.attributes().collect();
    attrs.sort_by(|a, b| {
        let ka = (a.namespace().is_some(), a.namespace().unwrap_or(""), a.name());
        let kb = (b.namespace().is_some(), b.namespace().unwrap_or(""), b.name());
        ka.cmp(&kb)
    });

    let elem_name = qualified_element_name(&node);

    output.push(b'<');
    output.extend_from_slice(elem_name.as_bytes());
    for (prefix, uri) in &ns_decls {
        if prefix.is_empty() {
            output.extend_from_slice(
                format!(" xmlns=\"{}\"", escape::escape_attr(uri)).as_bytes(),
            );
        } else {
            output.extend_from_slice(
                format!(" xmlns:{}=\"{}\"", prefix, escape::escape_attr(uri)).as_bytes(),
            );
        }
    }
    for attr in &attrs {
        output.extend_from_slice(
            format!(
                " {}=\"{}\"",
                qualified_attr_name(&node, attr),
                escape::escape_attr(attr.value())
            )
            .as_bytes(),
        );
    }
    output.push(b'>');

    let mut child_ns = inherited_ns.clone();
    for (prefix, uri) in &current_ns {
        if prefix != "xml" {
            child_ns.insert(prefix.clone(), uri.clone());
        }
    }
    for child in node.children() {
        process_node(child, with_comments, output, &child_ns)?;
    }

    output.extend_from_slice(b"</");
    output.extend_from_slice(elem_name.as_bytes());
    output.push(b'>');
    Ok(())
}

/// Collect all in-scope namespaces for an element.
///
/// Walks up the ancestor chain collecting declarations, with closer
/// declarations overriding more distant ones; an empty-URI declaration
/// undeclares the default namespace.
fn collect_inscope_namespaces(node: &roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut ns_stack: Vec<BTreeMap<String, String>> = Vec::new();

    let mut current = Some(*node);
    while let Some(n) = current {
        if n.is_element() {
            let mut level = BTreeMap::new();
            for ns in n.namespaces() {
                level.insert(ns.name().unwrap_or("").to_owned(), ns.uri().to_owned());
            }
            ns_stack.push(level);
        }
        current = n.parent();
    }

    let mut result = BTreeMap::new();
    for level in ns_stack.into_iter().rev() {
        for (prefix, uri) in level {
            if uri.is_empty() {
                result.remove(&prefix);
            } else {
                result.insert(prefix, uri);
            }
        }
    }
    result
}

/// Get the qualified element name (prefix:local or just local).
fn qualified_element_name(node: &roxmltree::Node<'_, '_>) -> String {
    match node.tag_name().namespace().and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) => format!("{}:{}", prefix, node.tag_name().name()),
        None => node.tag_name().name().to_owned(),
    }
}

/// Get the qualified attribute name.
fn qualified_attr_name(node: &roxmltree::Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> String {
    if attr.namespace() == Some(sigtuna_core::ns::XML) {
        return format!("xml:{}", attr.name());
    }
    match attr.namespace().and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) => format!("{}:{}", prefix, attr.name()),
        None => attr.name().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, false).unwrap()).unwrap()
    }

    #[test]
    fn attributes_sorted_by_local_name() {
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn namespace_declarations_rendered_sorted() {
        let out = c14n(r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child/></root>"#);
        assert_eq!(
            out,
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn default_namespace_sorts_before_prefixed() {
        let out = c14n(r#"<root xmlns:z="http://z" xmlns="http://d"/>"#);
        assert_eq!(out, r#"<root xmlns="http://d" xmlns:z="http://z"></root>"#);
    }

    #[test]
    fn inherited_declaration_not_repeated() {
        let out = c14n(r#"<r xmlns:a="http://a"><a:c xmlns:a="http://a"/></r>"#);
        assert_eq!(out, r#"<r xmlns:a="http://a"><a:c></a:c></r>"#);
    }

    #[test]
    fn text_escaping_preserved() {
        assert_eq!(
            c14n(r#"<root>a &amp; b &lt; c</root>"#),
            "<root>a &amp; b &lt; c</root>"
        );
    }

    #[test]
    fn comments_stripped_without_comments_mode() {
        assert_eq!(c14n("<r><!-- hidden --></r>"), "<r></r>");
    }

    #[test]
    fn comments_kept_with_comments_mode() {
        let doc = roxmltree::Document::parse("<r><!--x--></r>").unwrap();
        let out = String::from_utf8(canonicalize(&doc, true).unwrap()).unwrap();
        assert_eq!(out, "<r><!--x--></r>");
    }

    #[test]
    fn empty_elements_expanded() {
        assert_eq!(c14n("<r><e/></r>"), "<r><e></e></r>");
    }
}
