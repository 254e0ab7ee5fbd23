//! XML parser that builds arena [`Document`] trees.

use crate::{Document, Error, NodeId, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};

/// Parse XML from a string into a [`Document`].
///
/// Comments, processing instructions, the XML declaration and DOCTYPE are
/// dropped. Text, including whitespace between elements, is kept verbatim so
/// that serializing the result reproduces mixed content faithfully.
///
/// # Example
///
/// ```rust
/// use standoc_xml::parse;
///
/// let doc = parse("<root><child/></root>").unwrap();
/// assert_eq!(doc.name(doc.root()), Some("root"));
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed or has other than one root element.
pub fn parse(content: &str) -> Result<Document> {
    let mut doc = Document::empty();
    let root = XmlParser::new(content, &mut doc, None).parse()?;
    let root = root.ok_or(Error::EmptyDocument)?;
    doc.set_root(root);
    Ok(doc)
}

impl Document {
    /// Parse a markup fragment into this document's arena.
    ///
    /// The fragment may hold any number of top-level elements and text runs.
    /// The new nodes are returned detached, in order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use standoc_xml::Document;
    ///
    /// let mut doc = Document::new("root");
    /// let nodes = doc.parse_fragment("<em>Standard</em> text").unwrap();
    /// assert_eq!(nodes.len(), 2);
    /// assert_eq!(doc.name(nodes[0]), Some("em"));
    /// ```
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        let holder = self.create_element("fragment");
        XmlParser::new(markup, self, Some(holder)).parse()?;
        let nodes = self.children(holder).to_vec();
        self.clear_children(holder);
        Ok(nodes)
    }
}

/// Internal parser state.
struct XmlParser<'a> {
    reader: Reader<&'a [u8]>,

    doc: &'a mut Document,

    /// Element receiving top-level content in fragment mode.
    holder: Option<NodeId>,

    /// Open elements, innermost last.
    stack: Vec<NodeId>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str, doc: &'a mut Document, holder: Option<NodeId>) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            doc,
            holder,
            stack: Vec::new(),
        }
    }

    /// Run the event loop. Returns the root element in document mode.
    fn parse(&mut self) -> Result<Option<NodeId>> {
        let mut root: Option<NodeId> = None;

        loop {
            let event_start = self.reader.buffer_position();

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = self.open_element(&e)?;
                    self.attach(element, &mut root)?;
                    self.stack.push(element);
                }
                Ok(Event::End(e)) => {
                    let found = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    let open = self.stack.pop().ok_or_else(|| Error::InvalidStructure {
                        message: format!("Unexpected closing tag </{}>", found),
                    })?;
                    let expected = self.doc.name(open).unwrap_or_default().to_string();
                    if expected != found {
                        return Err(Error::MismatchedEndTag {
                            expected,
                            found,
                            position: Some(event_start),
                        });
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = self.open_element(&e)?;
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Text(e)) => {
                    let text = self.unescape(&e, event_start)?;
                    self.push_text(text)?;
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    self.push_text(text)?;
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        if let Some(open) = self.stack.last() {
            return Err(Error::UnexpectedEof {
                expected: format!(
                    "closing tag </{}>",
                    self.doc.name(*open).unwrap_or_default()
                ),
            });
        }

        Ok(root)
    }

    fn open_element(&mut self, e: &BytesStart<'_>) -> Result<NodeId> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let element = self.doc.create_element(name);

        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
                message: format!("Invalid attribute value: {}", err),
                position: None,
            })?;
            self.doc.set_attr(element, key, value.into_owned());
        }

        Ok(element)
    }

    fn attach(&mut self, node: NodeId, root: &mut Option<NodeId>) -> Result<()> {
        if let Some(parent) = self.stack.last().copied().or(self.holder) {
            self.doc.append_child(parent, node);
            return Ok(());
        }
        if root.is_some() {
            return Err(Error::MultipleRoots);
        }
        *root = Some(node);
        Ok(())
    }

    fn unescape(&self, e: &BytesText<'_>, event_start: u64) -> Result<String> {
        e.unescape()
            .map(|t| t.into_owned())
            .map_err(|err| Error::XmlSyntax {
                message: format!("Invalid text content: {}", err),
                position: Some(event_start),
            })
    }

    fn push_text(&mut self, text: String) -> Result<()> {
        match self.stack.last().copied().or(self.holder) {
            Some(parent) => {
                // Adjacent runs (text next to CDATA) are merged into one node.
                if let Some(last) = self.doc.children(parent).last().copied() {
                    if let Some(existing) = self.doc.text(last) {
                        let merged = format!("{}{}", existing, text);
                        self.doc.set_text(last, merged);
                        return Ok(());
                    }
                }
                let node = self.doc.create_text(text);
                self.doc.append_child(parent, node);
                Ok(())
            }
            None if text.trim().is_empty() => Ok(()),
            None => Err(Error::InvalidStructure {
                message: format!("Text outside the root element: {:?}", text.trim()),
            }),
        }
    }
}
