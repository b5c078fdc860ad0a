//! Minimal path-tracking walker over `quick-xml` events.
//!
//! Both `.nuspec` documents and MSBuild project files only need "which
//! element am I in, and what are its attributes / text". Element and
//! attribute names are reported as lowercased local names (namespace
//! prefixes dropped) because MSBuild treats them case-insensitively.

use crate::error::{ResolverError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

#[derive(Debug)]
pub(crate) enum XmlEvent {
    /// An opening or self-closing element; `path` ends with its own name.
    Element {
        path: Vec<String>,
        attributes: HashMap<String, String>,
    },
    /// Text content; `path` ends with the enclosing element's name.
    Text { path: Vec<String>, text: String },
    /// A closing tag (also reported for self-closing elements).
    End { path: Vec<String> },
}

pub(crate) struct XmlWalker<'a> {
    document: &'a str,
    reader: Reader<&'a [u8]>,
    stack: Vec<String>,
    pending_end: Option<Vec<String>>,
}

impl<'a> XmlWalker<'a> {
    pub(crate) fn new(document: &'a str, xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        Self {
            document,
            reader,
            stack: Vec::new(),
            pending_end: None,
        }
    }

    /// Returns the next interesting event, or `None` at end of document.
    pub(crate) fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(path) = self.pending_end.take() {
            return Ok(Some(XmlEvent::End { path }));
        }

        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| ResolverError::xml(self.document, e))?;

            match event {
                Event::Start(element) => {
                    let attributes = self.attributes(&element)?;
                    self.stack.push(local_name(element.local_name().as_ref()));
                    return Ok(Some(XmlEvent::Element {
                        path: self.stack.clone(),
                        attributes,
                    }));
                }
                Event::Empty(element) => {
                    let attributes = self.attributes(&element)?;
                    let mut path = self.stack.clone();
                    path.push(local_name(element.local_name().as_ref()));
                    self.pending_end = Some(path.clone());
                    return Ok(Some(XmlEvent::Element { path, attributes }));
                }
                Event::End(_) => {
                    let path = self.stack.clone();
                    self.stack.pop();
                    return Ok(Some(XmlEvent::End { path }));
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| ResolverError::xml(self.document, e))?;
                    if text.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(XmlEvent::Text {
                        path: self.stack.clone(),
                        text: text.into_owned(),
                    }));
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if text.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(XmlEvent::Text {
                        path: self.stack.clone(),
                        text,
                    }));
                }
                Event::Eof => {
                    if let Some(open) = self.stack.last() {
                        return Err(ResolverError::xml(
                            self.document,
                            format!("unexpected end of document inside <{}>", open),
                        ));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn attributes(&self, element: &BytesStart<'_>) -> Result<HashMap<String, String>> {
        let mut attributes = HashMap::new();
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|e| ResolverError::xml(self.document, e))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| ResolverError::xml(self.document, e))?;
            attributes.insert(
                local_name(attribute.key.local_name().as_ref()),
                value.into_owned(),
            );
        }
        Ok(attributes)
    }
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_ascii_lowercase()
}
