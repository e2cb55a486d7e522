use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::Cursor;

use super::constants::{SIGNATURE_ELEMENT, XMLDSIG_NAMESPACE};
use super::error::{Result, XmlSignatureError};

/// Namespace declarations in scope while streaming through a document.
#[derive(Debug, Default)]
pub struct NamespaceScope {
    stack: Vec<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self {
            stack: vec![BTreeMap::new()],
        }
    }

    /// Enter an element, applying the declarations it carries.
    pub fn push(&mut self, e: &BytesStart) -> Result<()> {
        let mut scope = self.current().clone();
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            let key = attr.key.as_ref();
            let prefix = if key == b"xmlns" {
                Vec::new()
            } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                prefix.to_vec()
            } else {
                continue;
            };
            if attr.value.is_empty() {
                scope.remove(&prefix);
            } else {
                scope.insert(prefix, attr.value.to_vec());
            }
        }
        self.stack.push(scope);
        Ok(())
    }

    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    pub fn current(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        // The root scope is never popped
        &self.stack[self.stack.len() - 1]
    }

    /// Namespace URI bound to the prefix of a qualified name.
    pub fn resolve(&self, qname: &[u8]) -> Option<&[u8]> {
        let prefix = match qname.iter().position(|&b| b == b':') {
            Some(pos) => &qname[..pos],
            None => &[][..],
        };
        self.current().get(prefix).map(Vec::as_slice)
    }
}

/// Extract element by ID attribute (`Id`, `ID` or `id`)
pub fn extract_element_by_id(xml: &str, id: &str) -> Result<String> {
    extract_with_predicate(xml, |e, _| {
        e.attributes().filter_map(|a| a.ok()).any(|attr| {
            let key = attr.key.local_name();
            matches!(key.as_ref(), b"Id" | b"ID" | b"id")
                && attr.unescape_value().ok().as_deref() == Some(id)
        })
    })?
    .ok_or_else(|| XmlSignatureError::Xml(format!("Element with Id='{id}' not found")))
}

/// Extract the first element with the given local name
pub fn extract_element(xml: &str, name: &str) -> Result<String> {
    let target = name.as_bytes();
    extract_with_predicate(xml, |e, _| e.local_name().as_ref() == target)?
        .ok_or_else(|| XmlSignatureError::Xml(format!("Element '{name}' not found")))
}

/// Extract the first XML-DSig `Signature` element
pub fn extract_signature(xml: &str) -> Result<String> {
    extract_with_predicate(xml, is_dsig_signature)?
        .ok_or_else(|| XmlSignatureError::Xml("No XML signature found in document".into()))
}

fn is_dsig_signature(e: &BytesStart, scope: &NamespaceScope) -> bool {
    e.local_name().as_ref() == SIGNATURE_ELEMENT.as_bytes()
        && scope.resolve(e.name().as_ref()) == Some(XMLDSIG_NAMESPACE.as_bytes())
}

/// Extract a subtree by predicate.
///
/// Namespace declarations inherited from ancestors are copied onto the
/// extracted element so that it stays well-formed and canonicalizes to the
/// same bytes as it would in place. The predicate sees the scope including
/// the candidate's own declarations.
fn extract_with_predicate<F>(xml: &str, mut predicate: F) -> Result<Option<String>>
where
    F: FnMut(&BytesStart, &NamespaceScope) -> bool,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut scope = NamespaceScope::new();
    let mut depth = 0;
    let mut capturing = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if capturing {
                    depth += 1;
                    writer.write_event(Event::Start(e.to_owned()))?;
                } else {
                    let inherited = scope.current().clone();
                    scope.push(&e)?;
                    if predicate(&e, &scope) {
                        capturing = true;
                        depth = 1;
                        let element = with_inherited_namespaces(&e, &inherited)?;
                        writer.write_event(Event::Start(element))?;
                    }
                }
            }
            Ok(Event::End(e)) => {
                if capturing {
                    writer.write_event(Event::End(e.to_owned()))?;
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                } else {
                    scope.pop();
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => {
                if capturing {
                    writer.write_event(e)?;
                }
            }
            Err(e) => return Err(XmlSignatureError::Xml(e.to_string())),
        }
        buf.clear();
    }

    if !capturing {
        return Ok(None);
    }
    Ok(Some(String::from_utf8(writer.into_inner().into_inner())?))
}

fn with_inherited_namespaces(
    e: &BytesStart,
    inherited: &BTreeMap<Vec<u8>, Vec<u8>>,
) -> Result<BytesStart<'static>> {
    let mut element = e.to_owned();
    for (prefix, uri) in inherited {
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", std::str::from_utf8(prefix)?)
        };
        let declared_locally = e
            .attributes()
            .with_checks(false)
            .filter_map(|a| a.ok())
            .any(|attr| attr.key.as_ref() == key.as_bytes());
        if !declared_locally {
            element.push_attribute((key.as_str(), std::str::from_utf8(uri)?));
        }
    }
    Ok(element)
}

/// Apply the enveloped-signature transform: drop the first XML-DSig
/// `Signature` element and everything below it.
pub fn remove_enveloped_signature(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut scope = NamespaceScope::new();
    let mut skip_depth = 0usize;
    let mut removed = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                } else {
                    scope.push(&e)?;
                    if !removed && is_dsig_signature(&e, &scope) {
                        removed = true;
                        skip_depth = 1;
                        scope.pop();
                    } else {
                        writer.write_event(Event::Start(e))?;
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if skip_depth == 0 {
                    scope.push(&e)?;
                    let is_signature = !removed && is_dsig_signature(&e, &scope);
                    scope.pop();
                    if is_signature {
                        removed = true;
                    } else {
                        writer.write_event(Event::Empty(e))?;
                    }
                }
            }
            Ok(Event::End(e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else {
                    scope.pop();
                    writer.write_event(Event::End(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => {
                if skip_depth == 0 {
                    writer.write_event(e)?;
                }
            }
            Err(e) => return Err(XmlSignatureError::Xml(e.to_string())),
        }
        buf.clear();
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}
