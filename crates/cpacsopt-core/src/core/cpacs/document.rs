use super::CpacsError;
use super::element::{Element, Node};
use super::xpath::{Predicate, Segment, XPath};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use xml::writer::EmitterConfig;

/// An in-memory CPACS document.
///
/// Reads are forgiving about surrounding whitespace; writes replace the text
/// content of the addressed element and create any missing ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct CpacsDocument {
    root: Element,
}

impl CpacsDocument {
    pub fn parse_str(content: &str) -> Result<Self, CpacsError> {
        Self::read(content.as_bytes(), "<memory>")
    }

    pub fn open(path: &Path) -> Result<Self, CpacsError> {
        let file = File::open(path).map_err(|e| CpacsError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::read(BufReader::new(file), &path.to_string_lossy())
    }

    fn read<R: Read>(source: R, origin: &str) -> Result<Self, CpacsError> {
        let root = Element::parse(source)
            .map_err(|e| CpacsError::Parse {
                path: origin.to_string(),
                source: e,
            })?
            .ok_or_else(|| CpacsError::NoRoot {
                path: origin.to_string(),
            })?;
        Ok(Self { root })
    }

    pub fn save(&self, path: &Path) -> Result<(), CpacsError> {
        let file = File::create(path).map_err(|e| CpacsError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        self.root
            .write(BufWriter::new(file), Self::emitter_config())?;
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String, CpacsError> {
        let mut buffer = Vec::new();
        self.root.write(&mut buffer, Self::emitter_config())?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn exists(&self, xpath: &str) -> Result<bool, CpacsError> {
        Ok(self.element(xpath)?.is_some())
    }

    pub fn element(&self, xpath: &str) -> Result<Option<&Element>, CpacsError> {
        let path = self.checked_path(xpath)?;
        let mut current = &self.root;
        for segment in path.descendants() {
            match child_position(current, segment) {
                Some(pos) => current = element_at(current, pos),
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Every element matching the last segment under the (first) parent match.
    pub fn elements(&self, xpath: &str) -> Result<Vec<&Element>, CpacsError> {
        let path = self.checked_path(xpath)?;
        let Some((last, parents)) = path.descendants().split_last() else {
            return Ok(vec![&self.root]);
        };

        let mut current = &self.root;
        for segment in parents {
            match child_position(current, segment) {
                Some(pos) => current = element_at(current, pos),
                None => return Ok(Vec::new()),
            }
        }

        Ok(current
            .child_elements()
            .filter(|child| matches_segment(child, last, None))
            .collect())
    }

    pub fn get_text(&self, xpath: &str) -> Result<Option<String>, CpacsError> {
        Ok(self.element(xpath)?.map(Element::text))
    }

    /// Reads a number; `Ok(None)` when the element does not exist.
    pub fn get_f64(&self, xpath: &str) -> Result<Option<f64>, CpacsError> {
        match self.get_text(xpath)? {
            None => Ok(None),
            Some(text) => text
                .parse::<f64>()
                .map(Some)
                .map_err(|_| CpacsError::NotANumber {
                    xpath: xpath.to_string(),
                    value: text,
                }),
        }
    }

    pub fn set_text(&mut self, xpath: &str, text: &str) -> Result<(), CpacsError> {
        let path = self.checked_path(xpath)?;
        ensure_path(&mut self.root, path.descendants(), &path)?.set_text(text);
        Ok(())
    }

    pub fn set_f64(&mut self, xpath: &str, value: f64) -> Result<(), CpacsError> {
        self.set_text(xpath, &value.to_string())
    }

    /// Returns the element at `xpath`, creating it (and its ancestors) if needed.
    pub fn ensure_element(&mut self, xpath: &str) -> Result<&mut Element, CpacsError> {
        let path = self.checked_path(xpath)?;
        ensure_path(&mut self.root, path.descendants(), &path)
    }

    pub fn element_mut(&mut self, xpath: &str) -> Result<Option<&mut Element>, CpacsError> {
        let path = self.checked_path(xpath)?;
        let mut current = &mut self.root;
        for segment in path.descendants() {
            match child_position(current, segment) {
                Some(pos) => current = element_at_mut(current, pos),
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Removes the addressed element. Returns whether anything was removed.
    pub fn remove(&mut self, xpath: &str) -> Result<bool, CpacsError> {
        let path = self.checked_path(xpath)?;
        let Some((last, parents)) = path.descendants().split_last() else {
            return Err(CpacsError::Unwritable {
                xpath: xpath.to_string(),
                reason: "the document root cannot be removed".to_string(),
            });
        };

        let mut current = &mut self.root;
        for segment in parents {
            match child_position(current, segment) {
                Some(pos) => current = element_at_mut(current, pos),
                None => return Ok(false),
            }
        }
        match child_position(current, last) {
            Some(pos) => {
                current.children.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn checked_path(&self, xpath: &str) -> Result<XPath, CpacsError> {
        let path = XPath::parse(xpath)?;
        if !matches_segment(&self.root, path.root(), Some(1)) {
            return Err(CpacsError::RootMismatch {
                xpath: xpath.to_string(),
                root: self.root.local_name().to_string(),
            });
        }
        Ok(path)
    }

    fn emitter_config() -> EmitterConfig {
        EmitterConfig::new().perform_indent(true)
    }
}

fn matches_segment(element: &Element, segment: &Segment, position: Option<usize>) -> bool {
    if element.local_name() != segment.name {
        return false;
    }
    match &segment.predicate {
        None => true,
        Some(Predicate::Index(n)) => position.is_none_or(|p| p == *n),
        Some(Predicate::Attribute { name, value }) => element.attribute(name) == Some(value.as_str()),
    }
}

fn child_position(parent: &Element, segment: &Segment) -> Option<usize> {
    let mut same_name = 0;
    for (i, node) in parent.children.iter().enumerate() {
        if let Node::Element(child) = node {
            if child.local_name() != segment.name {
                continue;
            }
            same_name += 1;
            if matches_segment(child, segment, Some(same_name)) {
                return Some(i);
            }
        }
    }
    None
}

fn element_at(parent: &Element, pos: usize) -> &Element {
    match &parent.children[pos] {
        Node::Element(child) => child,
        _ => unreachable!("child_position only returns element nodes"),
    }
}

fn element_at_mut(parent: &mut Element, pos: usize) -> &mut Element {
    match &mut parent.children[pos] {
        Node::Element(child) => child,
        _ => unreachable!("child_position only returns element nodes"),
    }
}

fn ensure_path<'a>(
    root: &'a mut Element,
    segments: &[Segment],
    full_path: &XPath,
) -> Result<&'a mut Element, CpacsError> {
    let mut current = root;
    for segment in segments {
        let pos = match child_position(current, segment) {
            Some(pos) => pos,
            None => {
                let child = new_element_for(current, segment, full_path)?;
                current.push_child(child);
                current.children.len() - 1
            }
        };
        current = element_at_mut(current, pos);
    }
    Ok(current)
}

fn new_element_for(
    parent: &Element,
    segment: &Segment,
    full_path: &XPath,
) -> Result<Element, CpacsError> {
    let mut element = Element::new(&segment.name);
    match &segment.predicate {
        None => {}
        Some(Predicate::Attribute { name, value }) => {
            element.set_attribute(name, value.clone());
        }
        Some(Predicate::Index(n)) => {
            let existing = parent
                .child_elements()
                .filter(|e| e.local_name() == segment.name)
                .count();
            if *n != existing + 1 {
                return Err(CpacsError::Unwritable {
                    xpath: full_path.to_string(),
                    reason: format!(
                        "<{}> has {} sibling(s), index {} would leave a gap",
                        segment.name, existing, n
                    ),
                });
            }
        }
    }
    Ok(element)
}
