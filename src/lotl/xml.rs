//! Streaming access to trusted-list documents.
//!
//! The quick-xml reader is turned into [`ParseEvent`]s which are dispatched
//! to an [`XmlTagHandler`]. Handlers keep their own small state (element path,
//! text buffer) and see local names only, since trusted lists use varying
//! namespace prefixes.

pub mod country_handler;
pub mod default_handler;
pub mod pivots_handler;
pub mod pointers_handler;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::errors::LotlResult;

pub use country_handler::CountryServiceHandler;
pub use default_handler::DefaultCertificateHandler;
pub use pivots_handler::PivotsHandler;
pub use pointers_handler::PointersHandler;

/// Attributes of a start tag, keyed by local name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlAttributes(Vec<(String, String)>);

impl XmlAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent<'a> {
    StartElement {
        name: &'a str,
        attributes: &'a XmlAttributes,
    },
    Characters(&'a str),
    EndElement {
        name: &'a str,
    },
}

pub trait XmlTagHandler {
    fn start_element(&mut self, name: &str, attributes: &XmlAttributes);
    fn end_element(&mut self, name: &str);
    fn characters(&mut self, text: &str);
}

pub fn dispatch(handler: &mut dyn XmlTagHandler, event: ParseEvent<'_>) {
    match event {
        ParseEvent::StartElement { name, attributes } => handler.start_element(name, attributes),
        ParseEvent::Characters(text) => handler.characters(text),
        ParseEvent::EndElement { name } => handler.end_element(name),
    }
}

/// Stream `xml` through `handler`.
pub fn parse(xml: &[u8], handler: &mut dyn XmlTagHandler) -> LotlResult<()> {
    let xml = xml.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml);
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                let attributes = attributes(&e)?;
                dispatch(
                    handler,
                    ParseEvent::StartElement {
                        name: &name,
                        attributes: &attributes,
                    },
                );
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                dispatch(handler, ParseEvent::EndElement { name: &name });
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                dispatch(handler, ParseEvent::Characters(&text));
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                dispatch(handler, ParseEvent::Characters(&text));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart) -> LotlResult<XmlAttributes> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        attributes.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(XmlAttributes(attributes))
}

/// Element path and text buffer shared by the handlers.
#[derive(Debug, Default)]
pub(crate) struct ElementState {
    path: Vec<String>,
    text: String,
}

impl ElementState {
    pub(crate) fn start(&mut self, name: &str) {
        self.path.push(name.to_string());
        self.text.clear();
    }

    /// Close the current element, returning its trimmed text.
    pub(crate) fn end(&mut self) -> String {
        self.path.pop();
        let text = self.text.trim().to_string();
        self.text.clear();
        text
    }

    pub(crate) fn characters(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub(crate) fn parent(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    pub(crate) fn within(&self, name: &str) -> bool {
        self.path.iter().any(|element| element == name)
    }
}
