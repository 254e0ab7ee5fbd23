//! Serialization of document trees back to XML text.

use crate::{Document, NodeId, NodeKind};
use quick_xml::escape::{escape, partial_escape};
use std::fmt;

impl Document {
    /// Serialize the subtree at `id`, the node itself included.
    pub fn to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serialize the children of `id`.
    pub fn inner_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, &mut out);
        }
        out
    }

    /// The node as an empty element carrying its attributes, e.g.
    /// `<clause id="a_b"/>`. Text nodes are returned escaped.
    ///
    /// Diagnostics use this to point at a node without dumping its content.
    pub fn describe(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Text(text) => partial_escape(text).into_owned(),
            NodeKind::Element(element) => {
                let mut out = String::new();
                self.write_start_tag(&element.name, id, &mut out);
                out.pop();
                out.push_str("/>");
                out
            }
        }
    }

    fn write_start_tag(&self, name: &str, id: NodeId, out: &mut String) {
        out.push('<');
        out.push_str(name);
        if let Some(attributes) = self.attributes(id) {
            for (key, value) in attributes {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape(value.as_str()));
                out.push('"');
            }
        }
        out.push('>');
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeKind::Element(element) => {
                self.write_start_tag(&element.name, id, out);
                let children = self.children(id);
                if children.is_empty() {
                    out.pop();
                    out.push_str("/>");
                    return;
                }
                for child in children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml(self.root()))
    }
}

#[cfg(test)]
mod tests {
    use crate::parse;

    #[test]
    fn test_round_trip_preserves_text() {
        let input = r#"<doc a="x &amp; y"><p>a &lt; b <em>c</em></p><br/></doc>"#;
        let doc = parse(input).unwrap();
        assert_eq!(doc.to_string(), input);
    }

    #[test]
    fn test_describe_is_empty_element() {
        let doc = parse(r#"<clause id="a_b" type="x"><p>body</p></clause>"#).unwrap();
        assert_eq!(doc.describe(doc.root()), r#"<clause id="a_b" type="x"/>"#);
    }

    #[test]
    fn test_inner_xml() {
        let doc = parse("<li><ref id=\"r\">[ISO 1]</ref>, <em>T</em></li>").unwrap();
        assert_eq!(
            doc.inner_xml(doc.root()),
            "<ref id=\"r\">[ISO 1]</ref>, <em>T</em>"
        );
    }

    #[test]
    fn test_fragment_serialization_snapshot() {
        let mut doc = parse("<references/>").unwrap();
        let nodes = doc
            .parse_fragment("<bibitem id=\"iso1\" type=\"standard\"><docnumber>1</docnumber></bibitem>")
            .unwrap();
        let root = doc.root();
        for node in nodes {
            doc.append_child(root, node);
        }
        insta::assert_snapshot!(
            doc.to_string(),
            @r#"<references><bibitem id="iso1" type="standard"><docnumber>1</docnumber></bibitem></references>"#
        );
    }

    #[test]
    fn test_attribute_quotes_escaped() {
        let mut doc = parse("<a/>").unwrap();
        let root = doc.root();
        doc.set_attr(root, "title", "say \"hi\"");
        assert_eq!(doc.to_string(), "<a title=\"say &quot;hi&quot;\"/>");
    }
}
