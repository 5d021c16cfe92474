//! Lenient HTML fragment parsing and serialization.
//!
//! This is the `innerHTML` surface of the document: it accepts whatever
//! markup a page or an editor hands it and never fails. Unclosed elements
//! are closed at the end of input; stray end tags are ignored.

use crate::document::Document;
use crate::node::{is_raw_text_element, is_void_element, NodeData, NodeId};

/// Elements whose text is serialized without escaping
const UNESCAPED_TEXT_ELEMENTS: &[&str] = &["script", "style"];

struct StartTag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
}

/// Parse markup into detached nodes owned by `doc`, returning the top-level nodes.
pub(crate) fn parse_fragment(doc: &mut Document, source: &str) -> Vec<NodeId> {
    let mut roots = Vec::new();
    let mut open: Vec<NodeId> = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];

        if let Some(comment) = rest.strip_prefix("<!--") {
            let (content, consumed) = match comment.find("-->") {
                Some(end) => (&comment[..end], end + 7),
                None => (comment, rest.len()),
            };
            let node = doc.create_comment(content);
            push_node(doc, &mut roots, &open, node);
            pos += consumed;
        } else if rest.starts_with("</") {
            let close = rest.find('>');
            let name = rest[2..close.unwrap_or(rest.len())]
                .trim()
                .to_ascii_lowercase();
            if let Some(depth) = open
                .iter()
                .rposition(|id| doc.tag_name(*id) == Some(name.as_str()))
            {
                open.truncate(depth);
            }
            pos += close.map(|i| i + 1).unwrap_or(rest.len());
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            // doctype and processing instructions
            pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
        } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (tag, consumed) = parse_start_tag(rest);
            pos += consumed;

            let node = doc.create_element(&tag.name);
            for (name, value) in tag.attributes {
                doc.push_attribute(node, name, value);
            }
            push_node(doc, &mut roots, &open, node);

            if tag.self_closing || is_void_element(&tag.name) {
                continue;
            }

            if is_raw_text_element(&tag.name) {
                let content_end = find_end_tag(&source[pos..], &tag.name);
                let raw = &source[pos..pos + content_end];
                if !raw.is_empty() {
                    let content = if UNESCAPED_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                        raw.to_string()
                    } else {
                        decode_entities(raw)
                    };
                    let text = doc.create_text(content);
                    doc.attach(node, text);
                }
                pos += content_end;
            } else {
                open.push(node);
            }
        } else {
            let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
            let end = rest[skip..]
                .find('<')
                .map(|i| i + skip)
                .unwrap_or(rest.len());
            let node = doc.create_text(decode_entities(&rest[..end]));
            push_node(doc, &mut roots, &open, node);
            pos += end;
        }
    }

    roots
}

fn push_node(doc: &mut Document, roots: &mut Vec<NodeId>, open: &[NodeId], node: NodeId) {
    match open.last() {
        Some(parent) => doc.attach(*parent, node),
        None => roots.push(node),
    }
}

fn parse_start_tag(rest: &str) -> (StartTag, usize) {
    let bytes = rest.as_bytes();
    let len = bytes.len();
    let is_space = |b: u8| b.is_ascii_whitespace();

    let mut i = 1;
    while i < len && !is_space(bytes[i]) && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let name = rest[1..i].to_ascii_lowercase();

    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while i < len && is_space(bytes[i]) {
            i += 1;
        }
        if i >= len {
            break;
        }

        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                i += 1;
                if i < len && bytes[i] == b'>' {
                    self_closing = true;
                    i += 1;
                    break;
                }
            }
            _ => {
                let name_start = i;
                while i < len && !is_space(bytes[i]) && !matches!(bytes[i], b'=' | b'>' | b'/') {
                    i += 1;
                }
                let attr_name = rest[name_start..i].to_ascii_lowercase();

                while i < len && is_space(bytes[i]) {
                    i += 1;
                }

                let mut value = String::new();
                if i < len && bytes[i] == b'=' {
                    i += 1;
                    while i < len && is_space(bytes[i]) {
                        i += 1;
                    }
                    if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
                        let quote = bytes[i];
                        i += 1;
                        let value_start = i;
                        while i < len && bytes[i] != quote {
                            i += 1;
                        }
                        value = decode_entities(&rest[value_start..i]);
                        if i < len {
                            i += 1;
                        }
                    } else {
                        let value_start = i;
                        while i < len && !is_space(bytes[i]) && bytes[i] != b'>' {
                            i += 1;
                        }
                        value = decode_entities(&rest[value_start..i]);
                    }
                }

                if !attr_name.is_empty() && !attributes.iter().any(|(n, _)| *n == attr_name) {
                    attributes.push((attr_name, value));
                }
            }
        }
    }

    (
        StartTag {
            name,
            attributes,
            self_closing,
        },
        i,
    )
}

/// Byte offset of the `</tag` that closes a raw-text element, or the end of input.
fn find_end_tag(rest: &str, tag: &str) -> usize {
    rest.to_ascii_lowercase()
        .find(&format!("</{}", tag))
        .unwrap_or(rest.len())
}

pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

pub(crate) fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn serialize_children(doc: &Document, id: NodeId, out: &mut String) {
    let unescaped = doc
        .tag_name(id)
        .is_some_and(|tag| UNESCAPED_TEXT_ELEMENTS.contains(&tag));

    for child in doc.children(id) {
        match doc.data(*child) {
            Some(NodeData::Text { content }) if unescaped => out.push_str(content),
            _ => serialize_node(doc, *child, out),
        }
    }
}

pub(crate) fn serialize_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.data(id) {
        Some(NodeData::Element(element)) => {
            out.push('<');
            out.push_str(&element.tag);
            for attr in &element.attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_attribute(&attr.value, out);
                out.push('"');
            }
            out.push('>');

            if is_void_element(&element.tag) {
                return;
            }

            serialize_children(doc, id, out);
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
        Some(NodeData::Text { content }) => escape_text(content, out),
        Some(NodeData::Comment { content }) => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
        Some(NodeData::Document) => serialize_children(doc, id, out),
        None => {}
    }
}
