use std::borrow::Cow;
use std::io::{Read, Write};
use xml::attribute::{Attribute, OwnedAttribute};
use xml::name::OwnedName;
use xml::namespace::Namespace;
use xml::reader::{EventReader, ParserConfig, XmlEvent as ReadEvent};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent as WriteEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { name: String, data: Option<String> },
}

/// One XML element with its qualified name, attributes and namespace scope.
///
/// Names keep their prefixes (`xsi:noNamespaceSchemaLocation`), and
/// attributes keep document order, so a parse/write cycle reproduces the
/// header every analysis module expects.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: OwnedName,
    pub attributes: Vec<OwnedAttribute>,
    pub namespace: Namespace,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(local_name: &str) -> Self {
        Self {
            name: OwnedName::local(local_name),
            attributes: Vec::new(),
            namespace: Namespace::empty(),
            children: Vec::new(),
        }
    }

    pub fn with_text(local_name: &str, text: impl Into<String>) -> Self {
        let mut element = Self::new(local_name);
        element.children.push(Node::Text(text.into()));
        element
    }

    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Looks an attribute up by `name` or `prefix:name`.
    pub fn attribute(&self, qualified: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| name_matches(&attr.name, qualified))
            .map(|attr| attr.value.as_str())
    }

    pub fn set_attribute(&mut self, local_name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|attr| name_matches(&attr.name, local_name))
        {
            Some(attr) => attr.value = value,
            None => self
                .attributes
                .push(OwnedAttribute::new(OwnedName::local(local_name), value)),
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(child) => Some(child),
            _ => None,
        })
    }

    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements()
            .find(|child| child.local_name() == local_name)
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Concatenated text and CDATA content, trimmed.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(s) | Node::CData(s) = node {
                text.push_str(s);
            }
        }
        text.trim().to_string()
    }

    /// Replaces all text content with `text`, keeping child elements.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children
            .retain(|node| !matches!(node, Node::Text(_) | Node::CData(_)));
        self.children.push(Node::Text(text.into()));
    }

    /// Reads the root element. `Ok(None)` for a document without one.
    pub fn parse<R: Read>(source: R) -> Result<Option<Element>, xml::reader::Error> {
        let config = ParserConfig::new().ignore_comments(false);
        let mut reader = EventReader::new_with_config(source, config);
        let mut open: Vec<Element> = Vec::new();

        loop {
            let node = match reader.next()? {
                ReadEvent::StartElement {
                    name,
                    attributes,
                    namespace,
                } => {
                    open.push(Element {
                        name,
                        attributes,
                        namespace,
                        children: Vec::new(),
                    });
                    continue;
                }
                ReadEvent::EndElement { .. } => {
                    let Some(done) = open.pop() else { continue };
                    if open.is_empty() {
                        return Ok(Some(done));
                    }
                    Node::Element(done)
                }
                ReadEvent::Characters(s) => Node::Text(s),
                ReadEvent::CData(s) => Node::CData(s),
                ReadEvent::Comment(s) => Node::Comment(s),
                ReadEvent::ProcessingInstruction { name, data } => {
                    Node::ProcessingInstruction { name, data }
                }
                ReadEvent::Whitespace(_) | ReadEvent::StartDocument { .. } => continue,
                ReadEvent::EndDocument => return Ok(None),
            };
            // Comments and instructions outside the root are not kept.
            if let Some(parent) = open.last_mut() {
                parent.children.push(node);
            }
        }
    }

    pub fn write<W: Write>(&self, sink: W, config: EmitterConfig) -> Result<(), xml::writer::Error> {
        let mut writer = config.create_writer(sink);
        self.emit(&mut writer)
    }

    fn emit<W: Write>(&self, writer: &mut EventWriter<W>) -> Result<(), xml::writer::Error> {
        let attributes: Vec<Attribute<'_>> =
            self.attributes.iter().map(OwnedAttribute::borrow).collect();
        writer.write(WriteEvent::StartElement {
            name: self.name.borrow(),
            attributes: Cow::Owned(attributes),
            namespace: Cow::Borrowed(&self.namespace),
        })?;
        for node in &self.children {
            match node {
                Node::Element(child) => child.emit(writer)?,
                Node::Text(text) => writer.write(WriteEvent::Characters(text))?,
                Node::CData(text) => writer.write(WriteEvent::CData(text))?,
                Node::Comment(text) => writer.write(WriteEvent::Comment(text))?,
                Node::ProcessingInstruction { name, data } => {
                    writer.write(WriteEvent::ProcessingInstruction {
                        name,
                        data: data.as_deref(),
                    })?
                }
            }
        }
        writer.write(WriteEvent::EndElement {
            name: Some(self.name.borrow()),
        })
    }
}

fn name_matches(name: &OwnedName, qualified: &str) -> bool {
    match qualified.split_once(':') {
        Some((prefix, local)) => {
            name.prefix.as_deref() == Some(prefix) && name.local_name == local
        }
        None => name.prefix.is_none() && name.local_name == qualified,
    }
}
