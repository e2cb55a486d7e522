use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Write};
use std::str;

use super::constants::*;
use super::error::{Result, XmlSignatureError};

type NamespaceMap = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0 / 1.1, renders every namespace in scope
    Inclusive,
    /// Exclusive XML Canonicalization, renders only visibly utilized namespaces
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C14nMethod {
    pub mode: C14nMode,
    pub with_comments: bool,
}

impl C14nMethod {
    pub const INCLUSIVE: C14nMethod = C14nMethod {
        mode: C14nMode::Inclusive,
        with_comments: false,
    };
    pub const EXCLUSIVE: C14nMethod = C14nMethod {
        mode: C14nMode::Exclusive,
        with_comments: false,
    };

    /// Map a CanonicalizationMethod or Transform algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (mode, with_comments) = match uri {
            INCLUSIVE_C14N | INCLUSIVE_C14N_11 => (C14nMode::Inclusive, false),
            INCLUSIVE_C14N_WITH_COMMENTS | INCLUSIVE_C14N_11_WITH_COMMENTS => {
                (C14nMode::Inclusive, true)
            }
            EXCLUSIVE_C14N => (C14nMode::Exclusive, false),
            EXCLUSIVE_C14N_WITH_COMMENTS => (C14nMode::Exclusive, true),
            _ => return None,
        };
        Some(Self {
            mode,
            with_comments,
        })
    }
}

/// Canonicalize a document or an extracted subtree.
///
/// `inclusive_ns` is the exclusive canonicalization PrefixList and is
/// ignored in inclusive mode.
pub fn canonicalize(
    xml: impl AsRef<str>,
    method: C14nMethod,
    inclusive_ns: Option<&[&str]>,
) -> Result<String> {
    let mut reader = Reader::from_str(xml.as_ref());
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut depth = 0usize;

    // Stack of declared namespace maps
    let mut ns_declared_stack = vec![NamespaceMap::new()];
    // Stack of rendered namespace maps
    let mut ns_rendered_stack = vec![NamespaceMap::new()];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                handle_start(
                    &mut writer,
                    &e,
                    method.mode,
                    &mut ns_declared_stack,
                    &mut ns_rendered_stack,
                    inclusive_ns,
                )?;
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e))?;
                ns_declared_stack.pop();
                ns_rendered_stack.pop();
            }
            // Character content outside the document element is not part of the canonical form
            Ok(Event::Text(e)) if depth > 0 => {
                let raw = e.into_inner();
                let normalized = normalize_line_endings(&raw);
                let text = quick_xml::escape::unescape(str::from_utf8(&normalized)?)?;
                let esc = escape_text_value(text.as_bytes())?;
                writer.write_event(Event::Text(BytesText::from_escaped(esc)))?;
            }
            Ok(Event::CData(e)) if depth > 0 => {
                // CDATA is normalized to text content
                let v = e.into_inner();
                let normalized = normalize_line_endings(&v);
                let esc = escape_text_value(&normalized)?;
                writer.write_event(Event::Text(BytesText::from_escaped(esc)))?;
            }
            Ok(Event::Comment(e)) if method.with_comments && depth > 0 => {
                writer.get_mut().write_all(b"<!--")?;
                writer.get_mut().write_all(&normalize_line_endings(&e))?;
                writer.get_mut().write_all(b"-->")?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(XmlSignatureError::Xml(e.to_string())),
        }
        buf.clear();
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Normalize line endings to LF as per C14N spec
fn normalize_line_endings(text: &[u8]) -> Cow<'_, [u8]> {
    if !text.contains(&b'\r') {
        return Cow::Borrowed(text);
    }

    let mut result = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] == b'\r' {
            // CRLF and lone CR both become LF
            result.push(b'\n');
            i += if text.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
        } else {
            result.push(text[i]);
            i += 1;
        }
    }
    Cow::Owned(result)
}

/// Escape attribute value per C14N rules.
fn escape_attr_value(v: &[u8]) -> Result<String> {
    let s = str::from_utf8(v)?;
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Escape text node value per C14N rules.
fn escape_text_value(v: &[u8]) -> Result<String> {
    let s = str::from_utf8(v)?;
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

fn prefix_of(qname: &[u8]) -> Option<&[u8]> {
    qname
        .iter()
        .position(|&b| b == b':')
        .map(|pos| &qname[..pos])
}

/// Handle a Start tag event: writes the start tag with canonicalized attributes & namespaces.
fn handle_start<W: Write>(
    writer: &mut Writer<W>,
    e: &BytesStart,
    mode: C14nMode,
    ns_declared_stack: &mut Vec<NamespaceMap>,
    ns_rendered_stack: &mut Vec<NamespaceMap>,
    inclusive_namespaces: Option<&[&str]>,
) -> Result<()> {
    let parent_declared = ns_declared_stack.last().cloned().unwrap_or_default();
    let ns_rendered = ns_rendered_stack.last().cloned().unwrap_or_default();
    let mut current_declared = parent_declared;

    // Separate namespace declarations vs regular attributes
    let mut regular_attrs = vec![];
    let mut local_ns_decls = vec![];

    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"xmlns" {
            local_ns_decls.push((vec![], attr.value.to_vec()));
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            local_ns_decls.push((prefix.to_vec(), attr.value.to_vec()));
        } else {
            let unescaped_value = attr.unescape_value()?;
            regular_attrs.push((key.to_vec(), unescaped_value.into_owned().into_bytes()));
        }
    }

    for (prefix, uri) in &local_ns_decls {
        if uri.is_empty() {
            current_declared.remove(prefix);
        } else {
            current_declared.insert(prefix.clone(), uri.clone());
        }
    }

    let name = e.name();
    let name_bytes = name.as_ref();

    let mut render_ns: Vec<(Vec<u8>, Vec<u8>)> = match mode {
        C14nMode::Inclusive => current_declared
            .iter()
            .filter(|(prefix, uri)| {
                prefix.as_slice() != b"xml" && ns_rendered.get(*prefix) != Some(*uri)
            })
            .map(|(prefix, uri)| (prefix.clone(), uri.clone()))
            .collect(),
        C14nMode::Exclusive => {
            let mut visibly_utilized = BTreeSet::new();
            visibly_utilized.insert(prefix_of(name_bytes).unwrap_or_default().to_vec());

            for (key_bytes, _) in &regular_attrs {
                if let Some(prefix) = prefix_of(key_bytes) {
                    // xml: prefix is never rendered as it's implicitly bound
                    if prefix != b"xml" {
                        visibly_utilized.insert(prefix.to_vec());
                    }
                }
            }

            if let Some(prefixes) = inclusive_namespaces {
                for prefix_str in prefixes {
                    let prefix = if *prefix_str == "#default" {
                        &b""[..]
                    } else {
                        prefix_str.as_bytes()
                    };
                    if current_declared.contains_key(prefix) {
                        visibly_utilized.insert(prefix.to_vec());
                    }
                }
            }

            visibly_utilized
                .into_iter()
                .filter(|prefix| prefix.as_slice() != b"xml")
                .filter_map(|prefix| {
                    let current_uri = current_declared.get(&prefix)?;
                    let already_rendered = ns_rendered.get(&prefix) == Some(current_uri);
                    (!already_rendered).then(|| (prefix, current_uri.clone()))
                })
                .collect()
        }
    };

    // Undeclare a default namespace an ancestor rendered but which is no longer in scope
    let default_in_scope = current_declared.contains_key(&b""[..]);
    let default_rendered = ns_rendered.get(&b""[..]).is_some_and(|uri| !uri.is_empty());
    let default_utilized = mode == C14nMode::Inclusive || prefix_of(name_bytes).is_none();
    if !default_in_scope && default_rendered && default_utilized {
        render_ns.push((vec![], vec![]));
    }

    // Sort namespace declarations by prefix lexical order
    render_ns.sort_by(|a, b| a.0.cmp(&b.0));

    let name_str = str::from_utf8(name_bytes)?;
    let mut tag_start = format!("<{name_str}");

    for (prefix, uri) in &render_ns {
        if prefix.is_empty() {
            tag_start.push_str(" xmlns=\"");
        } else {
            let p = str::from_utf8(prefix)?;
            tag_start.push_str(&format!(" xmlns:{p}=\""));
        }
        tag_start.push_str(&escape_attr_value(uri)?);
        tag_start.push('"');
    }

    // Attributes sorted by (namespace URI, local name), unqualified first
    let mut attr_info = vec![];
    for (key_bytes, value_bytes) in &regular_attrs {
        let (ns_uri, local_name) = match prefix_of(key_bytes) {
            Some(prefix) => {
                let local = key_bytes[prefix.len() + 1..].to_vec();
                let uri = if prefix == b"xml" {
                    XML_NAMESPACE.as_bytes().to_vec()
                } else {
                    current_declared.get(prefix).cloned().unwrap_or_default()
                };
                (uri, local)
            }
            None => (vec![], key_bytes.clone()),
        };
        attr_info.push((ns_uri, local_name, key_bytes, value_bytes));
    }
    attr_info.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    for (_, _, key_bytes, value_bytes) in &attr_info {
        tag_start.push(' ');
        tag_start.push_str(str::from_utf8(key_bytes)?);
        tag_start.push_str("=\"");
        tag_start.push_str(&escape_attr_value(value_bytes)?);
        tag_start.push('"');
    }

    tag_start.push('>');
    writer.get_mut().write_all(tag_start.as_bytes())?;

    ns_declared_stack.push(current_declared);

    let mut new_rendered = ns_rendered;
    for (prefix, uri) in render_ns {
        new_rendered.insert(prefix, uri);
    }
    ns_rendered_stack.push(new_rendered);
    Ok(())
}
