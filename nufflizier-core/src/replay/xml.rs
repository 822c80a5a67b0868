//! Element navigation over a parsed XML tree.
//!
//! Replay documents mix attributes and leaf elements for the same field, so
//! lookups here treat both the same way.

use roxmltree::Node;

/// First child element with the given tag name.
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|candidate| candidate.is_element() && candidate.tag_name().name() == name)
}

/// Every child element with the given tag name, in document order.
pub fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |candidate| candidate.is_element() && candidate.tag_name().name() == name)
}

/// Child elements of any name.
pub fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

/// Follow a path of first-matching children.
pub fn at_path<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    path.iter().try_fold(node, |current, segment| child(current, segment))
}

/// Follow a path where the final segment may repeat, returning every match.
pub fn all_at_path<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Vec<Node<'a, 'input>> {
    let Some((last, parents)) = path.split_last() else {
        return Vec::new();
    };
    at_path(node, parents)
        .map(|parent| children_named(parent, last).collect())
        .unwrap_or_default()
}

/// Elements below `node` (not `node` itself) with the given tag name.
pub fn descendants_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants().filter(move |candidate| {
        *candidate != node && candidate.is_element() && candidate.tag_name().name() == name
    })
}

pub fn is_leaf(node: Node<'_, '_>) -> bool {
    !node.children().any(|candidate| candidate.is_element())
}

/// Trimmed, non-empty text of a leaf element.
pub fn leaf_text(node: Node<'_, '_>) -> Option<String> {
    if !is_leaf(node) {
        return None;
    }
    let text: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|text| text.text())
        .collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Value of an attribute or leaf child element named `name`.
pub fn field(node: Node<'_, '_>, name: &str) -> Option<String> {
    if let Some(value) = node.attribute(name) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    child(node, name).and_then(leaf_text)
}

/// First present field among several candidate names.
pub fn first_field(node: Node<'_, '_>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| field(node, name))
}

/// Value of a leaf reached by a child path, e.g. `Data/TeamId`.
pub fn field_at(node: Node<'_, '_>, path: &[&str]) -> Option<String> {
    let (last, parents) = path.split_last()?;
    at_path(node, parents).and_then(|parent| field(parent, last))
}

pub fn parse_int(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    trimmed.parse::<i32>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|parsed| parsed.is_finite() && parsed.fract() == 0.0)
            .and_then(|parsed| num_traits::cast::cast::<f64, i32>(parsed))
    })
}

pub fn int_field(node: Node<'_, '_>, name: &str) -> Option<i32> {
    field(node, name).as_deref().and_then(parse_int)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn navigates_paths_and_fields() {
        let doc = Document::parse(
            r#"<Root version="3"><A><B><C>x</C><C>y</C></B></A><N> 42 </N><Empty></Empty></Root>"#,
        )
        .unwrap();
        let root = doc.root_element();
        assert_eq!(field(root, "version").as_deref(), Some("3"));
        assert_eq!(int_field(root, "N"), Some(42));
        assert_eq!(field(root, "Empty"), None);
        assert_eq!(field_at(root, &["A", "B", "C"]).as_deref(), Some("x"));
        let all: Vec<_> = all_at_path(root, &["A", "B", "C"])
            .into_iter()
            .filter_map(leaf_text)
            .collect();
        assert_eq!(all, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(descendants_named(root, "C").count(), 2);
        assert!(field(root, "A").is_none());
    }

    #[test]
    fn parse_int_accepts_integral_floats() {
        assert_eq!(parse_int("7"), Some(7));
        assert_eq!(parse_int("-1"), Some(-1));
        assert_eq!(parse_int("3.0"), Some(3));
        assert_eq!(parse_int("3.5"), None);
        assert_eq!(parse_int("abc"), None);
    }
}
