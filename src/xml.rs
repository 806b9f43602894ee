//! Decodes XML text into the generic [`Element`] tree.
//!
//! This is plumbing: it performs no schema checks and keeps names exactly as
//! written. Callers decide how a decoding failure is reported (a malformed
//! request document versus a malformed embedded filter).

use crate::document::Element;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed XML at byte {position}: {message}")]
pub struct XmlError {
    pub position: usize,
    pub message: String,
}

impl XmlError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Deepest element nesting a document may use.
pub const MAX_DEPTH: usize = 1024;

pub fn parse_document(text: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::new(position, "elements nested too deeply"));
                }
                stack.push(open_element(&start, position)?);
            }
            Ok(Event::Empty(start)) => {
                let element = open_element(&start, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::new(position, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::Text(content)) => {
                let value = content
                    .unescape()
                    .map_err(|err| XmlError::new(position, err.to_string()))?;
                append_text(&mut stack, &value, position)?;
            }
            Ok(Event::CData(content)) => {
                let value = String::from_utf8_lossy(&content.into_inner()).into_owned();
                append_text(&mut stack, &value, position)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(XmlError::new(position, err.to_string())),
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::new(
            text.len(),
            format!("element '{}' is not closed", open.name),
        ));
    }
    root.ok_or_else(|| XmlError::new(0, "document has no root element"))
}

fn open_element(start: &BytesStart<'_>, position: usize) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| XmlError::new(position, err.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| XmlError::new(position, err.to_string()))?
            .into_owned();
        if key == "xmlns" {
            element.namespaces.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.namespaces.insert(prefix.to_string(), value);
        } else {
            element.attributes.insert(key, value);
        }
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: usize,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::new(position, "more than one root element")),
    }
    Ok(())
}

fn append_text(stack: &mut [Element], value: &str, position: usize) -> Result<(), XmlError> {
    let current = stack
        .last_mut()
        .ok_or_else(|| XmlError::new(position, "text outside the root element"))?;
    match &mut current.text {
        Some(existing) => existing.push_str(value),
        None => current.text = Some(value.to_string()),
    }
    Ok(())
}
