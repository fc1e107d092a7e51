//! Exclusive XML canonicalization.
//!
//! Implements the exclusive canonical form of a subtree: empty elements are
//! expanded, attributes are double-quoted and sorted by namespace URI then
//! local name, character data is re-escaped, and a namespace declaration is
//! emitted only on the element that visibly uses its prefix, unless an
//! output ancestor already declared it.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Part of a document to canonicalize.
///
/// The enveloped signature is the first `ds:Signature` child of the document
/// element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Subtree {
    /// The document element with the enveloped signature left out.
    Enveloped,
    /// The `SignedInfo` of the enveloped signature, in the namespace context
    /// of the whole document.
    SignedInfo,
}

/// Exclusive canonicalization settings.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExclusiveC14n {
    with_comments: bool,
    inclusive_prefixes: Vec<String>,
}

impl ExclusiveC14n {
    pub(crate) fn new(with_comments: bool) -> Self {
        Self {
            with_comments,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Treats the prefixes of an `InclusiveNamespaces` `PrefixList` the way
    /// inclusive canonicalization would. `#default` names the default
    /// namespace.
    pub(crate) fn with_prefix_list(mut self, prefix_list: Option<&str>) -> Self {
        self.inclusive_prefixes = prefix_list
            .unwrap_or_default()
            .split_whitespace()
            .map(|prefix| if prefix == "#default" { String::new() } else { prefix.to_string() })
            .collect();
        self
    }

    /// Canonicalizes `subtree` of `xml`.
    pub(crate) fn canonicalize(&self, xml: &str, subtree: Subtree) -> SamlResult<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut walker = Walker::new(self, subtree);
        loop {
            match reader.read_event()? {
                Event::Start(e) => walker.open(&e, false)?,
                Event::Empty(e) => walker.open(&e, true)?,
                Event::End(e) => walker.close(std::str::from_utf8(e.name().as_ref()).map_err(invalid)?),
                Event::Text(e) => {
                    let raw = std::str::from_utf8(&e).map_err(invalid)?;
                    let normalized = normalize_newlines(raw);
                    let text = quick_xml::escape::unescape(&normalized).map_err(invalid)?;
                    walker.text(&text);
                }
                Event::CData(e) => {
                    let raw = std::str::from_utf8(&e).map_err(invalid)?;
                    walker.text(&normalize_newlines(raw));
                }
                Event::Comment(e) if self.with_comments => {
                    let raw = std::str::from_utf8(&e).map_err(invalid)?;
                    walker.raw("<!--", &normalize_newlines(raw), "-->");
                }
                Event::PI(e) => {
                    let raw = std::str::from_utf8(&e).map_err(invalid)?;
                    walker.raw("<?", raw, "?>");
                }
                Event::DocType(_) => {
                    return Err(SamlError::SignatureInvalid(
                        "DOCTYPE declarations are not allowed".to_string(),
                    ))
                }
                Event::Eof => break,
                _ => {}
            }
        }
        walker.finish(subtree)
    }
}

struct Walker<'c> {
    settings: &'c ExclusiveC14n,
    subtree: Subtree,
    out: String,
    depth: usize,
    /// Namespaces in scope, per open element.
    in_scope: Vec<BTreeMap<String, String>>,
    /// Namespaces already rendered by output ancestors, per open element.
    rendered: Vec<BTreeMap<String, String>>,
    /// Depth at which the selected subtree opened.
    output_from: Option<usize>,
    /// Depth at which the left-out signature opened.
    skip_from: Option<usize>,
    signature_seen: bool,
    signature_open: bool,
    done: bool,
}

struct Attribute {
    qname: String,
    namespace: String,
    local: String,
    value: String,
}

impl<'c> Walker<'c> {
    fn new(settings: &'c ExclusiveC14n, subtree: Subtree) -> Self {
        Self {
            settings,
            subtree,
            out: String::new(),
            depth: 0,
            in_scope: Vec::new(),
            rendered: Vec::new(),
            output_from: None,
            skip_from: None,
            signature_seen: false,
            signature_open: false,
            done: false,
        }
    }

    const fn emitting(&self) -> bool {
        self.output_from.is_some() && self.skip_from.is_none()
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> SamlResult<()> {
        let qname = std::str::from_utf8(e.name().as_ref()).map_err(invalid)?.to_string();
        let (prefix, local) = split_qname(&qname);

        let mut scope = self.in_scope.last().cloned().unwrap_or_default();
        let mut plain = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(invalid)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(invalid)?;
            let raw = std::str::from_utf8(&attr.value).map_err(invalid)?;
            let value = quick_xml::escape::unescape(&normalize_attribute(raw))
                .map_err(invalid)?
                .into_owned();
            if key == "xmlns" {
                scope.insert(String::new(), value);
            } else if let Some(declared) = key.strip_prefix("xmlns:") {
                scope.insert(declared.to_string(), value);
            } else {
                plain.push((key.to_string(), value));
            }
        }
        let element_ns = namespace_of(&scope, prefix);

        let parent_rendered = self.rendered.last().cloned().unwrap_or_default();
        let is_dsig = |name: &str| local == name && element_ns == XMLDSIG_NS;
        let opens_signature = self.depth == 1 && !self.signature_seen && is_dsig("Signature");
        let selected = !self.done
            && self.output_from.is_none()
            && match self.subtree {
                Subtree::Enveloped => self.depth == 0,
                Subtree::SignedInfo => {
                    self.depth == 2 && self.signature_open && is_dsig("SignedInfo")
                }
            };
        let left_out = opens_signature && self.subtree == Subtree::Enveloped;

        if opens_signature {
            self.signature_seen = true;
            self.signature_open = !empty;
        }
        if selected {
            self.output_from = Some(self.depth);
        }
        if left_out {
            self.skip_from = Some(self.depth);
        }

        let rendered = if self.emitting() {
            self.write_element(&qname, prefix, &scope, plain, parent_rendered, empty)?
        } else {
            parent_rendered
        };

        if empty {
            if left_out {
                self.skip_from = None;
            }
            if selected {
                self.output_from = None;
                self.done = true;
            }
        } else {
            self.in_scope.push(scope);
            self.rendered.push(rendered);
            self.depth += 1;
        }
        Ok(())
    }

    fn write_element(
        &mut self,
        qname: &str,
        prefix: &str,
        scope: &BTreeMap<String, String>,
        plain: Vec<(String, String)>,
        mut rendered: BTreeMap<String, String>,
        empty: bool,
    ) -> SamlResult<BTreeMap<String, String>> {
        let mut attributes = Vec::with_capacity(plain.len());
        let mut visible = BTreeSet::from([prefix.to_string()]);
        for (key, value) in plain {
            let (attr_prefix, attr_local) = split_qname(&key);
            let namespace = match attr_prefix {
                "" => String::new(),
                "xml" => XML_NS.to_string(),
                bound => {
                    visible.insert(bound.to_string());
                    scope
                        .get(bound)
                        .cloned()
                        .ok_or_else(|| unbound(bound))?
                }
            };
            attributes.push(Attribute {
                local: attr_local.to_string(),
                qname: key,
                namespace,
                value,
            });
        }
        attributes.sort_by(|a, b| (&a.namespace, &a.local).cmp(&(&b.namespace, &b.local)));

        let mut declarations = BTreeMap::new();
        for candidate in &visible {
            if candidate == "xml" {
                continue;
            }
            let namespace = scope.get(candidate).map_or("", String::as_str);
            if !candidate.is_empty() && namespace.is_empty() {
                return Err(unbound(candidate));
            }
            declare(&mut declarations, &mut rendered, candidate, namespace);
        }
        for candidate in &self.settings.inclusive_prefixes {
            if visible.contains(candidate) {
                continue;
            }
            if let Some(namespace) = scope.get(candidate) {
                declare(&mut declarations, &mut rendered, candidate, namespace);
            }
        }

        self.out.push('<');
        self.out.push_str(qname);
        for (declared, namespace) in &declarations {
            if declared.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                self.out.push_str(" xmlns:");
                self.out.push_str(declared);
                self.out.push_str("=\"");
            }
            self.out.push_str(&escape_attribute(namespace));
            self.out.push('"');
        }
        for attribute in &attributes {
            self.out.push(' ');
            self.out.push_str(&attribute.qname);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attribute(&attribute.value));
            self.out.push('"');
        }
        self.out.push('>');
        if empty {
            self.out.push_str("</");
            self.out.push_str(qname);
            self.out.push('>');
        }
        Ok(rendered)
    }

    fn close(&mut self, qname: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.in_scope.pop();
        self.rendered.pop();
        if self.depth == 1 {
            self.signature_open = false;
        }

        if self.skip_from == Some(self.depth) {
            self.skip_from = None;
            return;
        }
        if self.emitting() {
            self.out.push_str("</");
            self.out.push_str(qname);
            self.out.push('>');
        }
        if self.output_from == Some(self.depth) {
            self.output_from = None;
            self.done = true;
        }
    }

    fn text(&mut self, text: &str) {
        if self.emitting() {
            self.out.push_str(&escape_text(text));
        }
    }

    fn raw(&mut self, open: &str, content: &str, close: &str) {
        if self.emitting() {
            self.out.push_str(open);
            self.out.push_str(content);
            self.out.push_str(close);
        }
    }

    fn finish(self, subtree: Subtree) -> SamlResult<String> {
        if !self.done {
            return Err(SamlError::SignatureInvalid(match subtree {
                Subtree::Enveloped => "document has no complete root element".to_string(),
                Subtree::SignedInfo => "No SignedInfo found".to_string(),
            }));
        }
        Ok(self.out)
    }
}

/// Declares `prefix` unless an output ancestor already rendered the same
/// binding. An unprefixed element outside any default namespace only
/// declares `xmlns=""` when an ancestor rendered a default namespace.
fn declare(
    declarations: &mut BTreeMap<String, String>,
    rendered: &mut BTreeMap<String, String>,
    prefix: &str,
    namespace: &str,
) {
    let current = rendered.get(prefix).map_or("", String::as_str);
    if current != namespace {
        declarations.insert(prefix.to_string(), namespace.to_string());
        rendered.insert(prefix.to_string(), namespace.to_string());
    }
}

fn split_qname(qname: &str) -> (&str, &str) {
    qname.split_once(':').unwrap_or(("", qname))
}

fn namespace_of<'a>(scope: &'a BTreeMap<String, String>, prefix: &str) -> &'a str {
    if prefix == "xml" {
        return XML_NS;
    }
    scope.get(prefix).map_or("", String::as_str)
}

fn normalize_newlines(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Attribute-value normalization: literal whitespace becomes a space.
fn normalize_attribute(raw: &str) -> String {
    raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ")
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#xD;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' => escaped.push_str("&#x9;"),
            '\n' => escaped.push_str("&#xA;"),
            '\r' => escaped.push_str("&#xD;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unbound(prefix: &str) -> SamlError {
    SamlError::SignatureInvalid(format!("namespace prefix {prefix} is not bound"))
}

fn invalid(err: impl std::fmt::Display) -> SamlError {
    SamlError::SignatureInvalid(format!("cannot canonicalize document: {err}"))
}
