//! Forward-only XML event stream
//!
//! A thin layer over `quick-xml` that:
//! - decodes element names and attributes into owned strings
//! - reports empty elements as a start immediately followed by an end
//! - tracks the names of the currently open elements

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

/// A start tag with its decoded attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: impl Into<String>, attrs: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Attribute value, if present
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, or "" when absent
    pub fn attr_or_empty(&self, key: &str) -> &str {
        self.attr(key).unwrap_or("")
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    fn from_start(start: &BytesStart) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();

        for attr in start.attributes().with_checks(false) {
            let attr = attr.with_context(|| format!("Malformed attribute on <{}>", name))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attrs.push((key, value));
        }

        Ok(Self { name, attrs })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    Start(Element),
    End(String),
    Text(String),
}

pub struct XmlStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open: Vec<String>,
    pending_end: bool,
}

impl<R: BufRead> XmlStream<R> {
    pub fn new(source: R) -> Self {
        let reader = Reader::from_reader(source);
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            open: Vec::new(),
            pending_end: false,
        }
    }

    /// Read the next event, `None` at end of document
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if self.pending_end {
            self.pending_end = false;
            if let Some(name) = self.open.pop() {
                return Ok(Some(XmlEvent::End(name)));
            }
        }

        loop {
            self.buf.clear();
            let position = self.reader.buffer_position();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| format!("XML syntax error near byte {}", position))?;

            match event {
                Event::Start(start) => {
                    let element = Element::from_start(&start)?;
                    self.open.push(element.name.clone());
                    return Ok(Some(XmlEvent::Start(element)));
                }
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    self.open.push(element.name.clone());
                    self.pending_end = true;
                    return Ok(Some(XmlEvent::Start(element)));
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    self.open.pop();
                    return Ok(Some(XmlEvent::End(name)));
                }
                Event::Text(text) => {
                    let value = match text.unescape() {
                        Ok(v) => v.into_owned(),
                        Err(_) => String::from_utf8_lossy(&text).into_owned(),
                    };
                    return Ok(Some(XmlEvent::Text(value)));
                }
                Event::CData(data) => {
                    return Ok(Some(XmlEvent::Text(
                        String::from_utf8_lossy(&data).into_owned(),
                    )));
                }
                Event::Eof => {
                    if let Some(open) = self.open.last() {
                        bail!("Document ended inside <{}>", open);
                    }
                    return Ok(None);
                }
                _ => continue,
            }
        }
    }

    /// Number of currently open elements (including one just started)
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Name of the element enclosing the most recently started one
    pub fn parent_name(&self) -> Option<&str> {
        let len = self.open.len();
        if len < 2 {
            return None;
        }
        self.open.get(len - 2).map(|s| s.as_str())
    }

    /// Whether any open element (excluding the current one) has this name
    pub fn within(&self, name: &str) -> bool {
        let len = self.open.len();
        self.open[..len.saturating_sub(1)].iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Vec<XmlEvent> {
        let mut stream = XmlStream::new(xml.as_bytes());
        let mut events = Vec::new();
        while let Some(event) = stream.next_event().unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_empty_element_is_start_and_end() {
        let events = collect(r#"<a><b x="1"/></a>"#);
        assert_eq!(
            events,
            vec![
                XmlEvent::Start(Element::new("a", &[])),
                XmlEvent::Start(Element::new("b", &[("x", "1")])),
                XmlEvent::End("b".into()),
                XmlEvent::End("a".into()),
            ]
        );
    }

    #[test]
    fn test_attribute_and_text_unescape() {
        let events = collect(r#"<t name="A &amp; B">x &lt; y</t>"#);
        match &events[0] {
            XmlEvent::Start(e) => assert_eq!(e.attr("name"), Some("A & B")),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events[1], XmlEvent::Text("x < y".into()));
    }

    #[test]
    fn test_parent_tracking() {
        let mut stream = XmlStream::new(r#"<macro><properties><cargo/></properties></macro>"#.as_bytes());
        let mut seen = false;
        while let Some(event) = stream.next_event().unwrap() {
            if let XmlEvent::Start(e) = event {
                if e.is("cargo") {
                    assert_eq!(stream.parent_name(), Some("properties"));
                    assert!(stream.within("macro"));
                    assert_eq!(stream.depth(), 3);
                    seen = true;
                }
            }
        }
        assert!(seen);
    }

    #[test]
    fn test_mismatched_end_is_error() {
        let mut stream = XmlStream::new("<a><b></a>".as_bytes());
        let mut result = Ok(None);
        for _ in 0..5 {
            result = stream.next_event();
            if result.is_err() {
                break;
            }
        }
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_document_is_error() {
        let mut stream = XmlStream::new("<a><b/>".as_bytes());
        let mut events = 0;
        let result = loop {
            match stream.next_event() {
                Ok(Some(_)) => events += 1,
                other => break other,
            }
        };
        assert_eq!(events, 3);
        assert!(result.is_err());
    }
}
