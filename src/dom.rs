use kuchiki::NodeRef;
use kuchiki::iter::NodeIterator as _;
use kuchiki::traits::TendrilSink as _;

pub fn parse(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

/// Descendants of `node` (not `node` itself) matching `selector`, in document order.
pub fn select_all(node: &NodeRef, selector: &str) -> anyhow::Result<Vec<NodeRef>> {
    let matches = node
        .descendants()
        .select(selector)
        .map_err(|()| anyhow::anyhow!("invalid selector {selector:?}"))?;
    Ok(matches.map(|m| m.as_node().clone()).collect())
}

pub fn select_first(node: &NodeRef, selector: &str) -> anyhow::Result<Option<NodeRef>> {
    let mut matches = node
        .descendants()
        .select(selector)
        .map_err(|()| anyhow::anyhow!("invalid selector {selector:?}"))?;
    Ok(matches.next().map(|m| m.as_node().clone()))
}

pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    element.attributes.borrow().get(name).map(|v| v.to_string())
}

pub fn has_attr(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .is_some_and(|e| e.attributes.borrow().contains(name))
}

/// Every descendant text node trimmed, empty pieces dropped, the rest concatenated.
pub fn stripped_text(node: &NodeRef) -> String {
    let mut out = String::new();
    for text in node.descendants().text_nodes() {
        let value = text.borrow();
        let piece = value.trim();
        if !piece.is_empty() {
            out.push_str(piece);
        }
    }
    out
}

/// Visible text with whitespace runs collapsed, the way a reader would see it.
pub fn normalized_text(node: &NodeRef) -> String {
    node.text_contents()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_inside(node: &NodeRef, ancestor: &NodeRef) -> bool {
    node.ancestors().any(|a| &a == ancestor)
}

pub fn next_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    node.following_siblings()
        .elements()
        .next()
        .map(|e| e.as_node().clone())
}

/// Raw contents of every text node below `node`, in document order.
pub fn text_nodes(node: &NodeRef) -> Vec<String> {
    node.descendants()
        .text_nodes()
        .map(|t| t.borrow().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripped_text_joins_trimmed_pieces() {
        let doc = parse("<div><span> Hello </span>\n<b>world </b><i>  </i></div>");
        let div = select_first(&doc, "div").unwrap().unwrap();
        assert_eq!(stripped_text(&div), "Helloworld");
    }

    #[test]
    fn select_excludes_the_node_itself() {
        let doc = parse(r#"<div class="x" id="outer"><div class="x" id="inner"></div></div>"#);
        let outer = select_first(&doc, "#outer").unwrap().unwrap();
        let found = select_all(&outer, ".x").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(attr(&found[0], "id").as_deref(), Some("inner"));
    }
}
