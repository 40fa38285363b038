use super::CpacsError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// 1-based position among siblings sharing the same element name.
    Index(usize),
    Attribute { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub predicate: Option<Predicate>,
}

/// An absolute, XPath-like location inside a CPACS document.
///
/// Only the subset used by CPACS tool declarations is understood: element
/// names separated by `/`, optionally followed by a positional index
/// (`wing[2]`) or an attribute filter (`aeroMap[@uID="map_1"]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    raw: String,
    segments: Vec<Segment>,
}

impl XPath {
    pub fn parse(raw: &str) -> Result<Self, CpacsError> {
        let invalid = |reason: &str| CpacsError::InvalidPath {
            xpath: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('/')
            .ok_or_else(|| invalid("path must be absolute"))?;
        if body.is_empty() {
            return Err(invalid("path has no elements"));
        }

        let segments = split_segments(body)
            .into_iter()
            .map(|part| parse_segment(part).map_err(|reason| invalid(&reason)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn root(&self) -> &Segment {
        &self.segments[0]
    }

    /// Segments below the document root.
    pub fn descendants(&self) -> &[Segment] {
        &self.segments[1..]
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// Splits on '/' outside of predicate brackets, so attribute values may contain slashes.
fn split_segments(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn parse_segment(part: &str) -> Result<Segment, String> {
    if part.is_empty() {
        return Err("empty path segment".to_string());
    }

    let Some(open) = part.find('[') else {
        validate_name(part)?;
        return Ok(Segment {
            name: part.to_string(),
            predicate: None,
        });
    };

    let name = &part[..open];
    validate_name(name)?;
    let inner = part[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| format!("unterminated predicate in '{}'", part))?;

    let predicate = if let Some(attr) = inner.strip_prefix('@') {
        let (attr_name, value) = attr
            .split_once('=')
            .ok_or_else(|| format!("attribute predicate '{}' has no value", inner))?;
        let value = value.trim();
        let unquoted = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .ok_or_else(|| format!("attribute value in '{}' must be quoted", inner))?;
        Predicate::Attribute {
            name: attr_name.trim().to_string(),
            value: unquoted.to_string(),
        }
    } else {
        let index: usize = inner
            .trim()
            .parse()
            .map_err(|_| format!("invalid index '{}'", inner))?;
        if index == 0 {
            return Err("indices are 1-based".to_string());
        }
        Predicate::Index(index)
    };

    Ok(Segment {
        name: name.to_string(),
        predicate: Some(predicate),
    })
}

fn validate_name(name: &str) -> Result<(), String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if valid {
        Ok(())
    } else {
        Err(format!("invalid element name '{}'", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_path_splits_every_element() {
        let path = XPath::parse("/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed").unwrap();
        let names: Vec<_> = path.segments().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["cpacs", "toolspecific", "CEASIOMpy", "ranges", "cruiseSpeed"]
        );
        assert!(path.segments().iter().all(|s| s.predicate.is_none()));
        assert_eq!(path.root().name, "cpacs");
        assert_eq!(path.descendants().len(), 4);
    }

    #[test]
    fn parse_index_predicate() {
        let path = XPath::parse("/cpacs/vehicles/wings/wing[2]/name").unwrap();
        assert_eq!(path.segments()[3].name, "wing");
        assert_eq!(path.segments()[3].predicate, Some(Predicate::Index(2)));
    }

    #[test]
    fn parse_attribute_predicate_allows_slashes_in_value() {
        let path = XPath::parse("/cpacs/aeroMap[@uID=\"a/b\"]/cl").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(
            path.segments()[1].predicate,
            Some(Predicate::Attribute {
                name: "uID".to_string(),
                value: "a/b".to_string()
            })
        );
    }

    #[test]
    fn parse_rejects_relative_and_malformed_paths() {
        assert!(matches!(
            XPath::parse("cpacs/header"),
            Err(CpacsError::InvalidPath { .. })
        ));
        assert!(XPath::parse("/").is_err());
        assert!(XPath::parse("/cpacs//header").is_err());
        assert!(XPath::parse("/cpacs/wing[0]").is_err());
        assert!(XPath::parse("/cpacs/wing[x]").is_err());
        assert!(XPath::parse("/cpacs/wing[@uID=x]").is_err());
        assert!(XPath::parse("/cpacs/wing[1").is_err());
    }

    #[test]
    fn display_returns_trimmed_source() {
        let path = XPath::parse("  /cpacs/header  ").unwrap();
        assert_eq!(path.to_string(), "/cpacs/header");
        assert_eq!(path.as_str(), "/cpacs/header");
    }
}
