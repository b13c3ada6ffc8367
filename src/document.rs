//! Format preserving YAML document.
//!
//! The document keeps the original source text next to a node tree built from the parser's
//! marked events. Every scalar remembers where it starts in the source, so a changed value can
//! be spliced back into the text without re-emitting anything else: comments, key order,
//! indentation and quoting stay byte-identical.

use std::fmt;
use std::iter;
use std::ops::Range;
use thiserror::Error;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, ScanError, TScalarStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// Literal (`|`) or folded (`>`) block scalar.
    Block,
}

impl From<TScalarStyle> for ScalarStyle {
    fn from(style: TScalarStyle) -> Self {
        match style {
            TScalarStyle::Plain => ScalarStyle::Plain,
            TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
            TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
            _ => ScalarStyle::Block,
        }
    }
}

/// Handle to a scalar owned by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarId(usize);

#[derive(Debug)]
pub enum Node {
    Scalar(ScalarId),
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
    Alias,
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
            Node::Alias => "alias",
        }
    }
}

#[derive(Debug)]
struct Scalar {
    value: String,
    style: ScalarStyle,
    // byte offset of the first character of the scalar, including an opening quote
    start: usize,
    replacement: Option<(Range<usize>, String)>,
}

#[derive(Debug, Error)]
#[error("scalar cannot be rewritten in place: {0}")]
pub struct NotEditable(&'static str);

#[derive(Debug)]
pub struct Document {
    source: String,
    root: Option<Node>,
    scalars: Vec<Scalar>,
}

impl Document {
    /// Parses the first YAML document in `source`.
    pub fn parse(source: &str) -> Result<Self, ScanError> {
        let mut builder = TreeBuilder::new(source);
        Parser::new(source.chars()).load(&mut builder, false)?;

        Ok(Self {
            source: source.to_owned(),
            root: builder.root,
            scalars: builder.scalars,
        })
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Current value of a scalar, reflecting any edit made through [`Document::set_value`].
    pub fn value(&self, id: ScalarId) -> &str {
        &self.scalars[id.0].value
    }

    /// Looks up `key` in mapping entries, comparing against scalar keys only.
    pub fn entry<'n>(&self, entries: &'n [(Node, Node)], key: &str) -> Option<&'n Node> {
        entries.iter().find_map(|(k, v)| match k {
            Node::Scalar(id) if self.value(*id) == key => Some(v),
            _ => None,
        })
    }

    pub fn is_modified(&self) -> bool {
        self.scalars.iter().any(|s| s.replacement.is_some())
    }

    /// Replaces the value of a scalar, keeping its quoting style where the new value allows it.
    pub fn set_value(&mut self, id: ScalarId, value: String) -> Result<(), NotEditable> {
        let span = self.source_span(id)?;
        let scalar = &mut self.scalars[id.0];
        let rendered = render(&value, scalar.style);
        scalar.replacement = Some((span, rendered));
        scalar.value = value;
        Ok(())
    }

    fn source_span(&self, id: ScalarId) -> Result<Range<usize>, NotEditable> {
        let scalar = &self.scalars[id.0];
        let rest = &self.source[scalar.start..];

        let len = match scalar.style {
            ScalarStyle::Block => return Err(NotEditable("block scalar")),
            ScalarStyle::Plain => {
                if scalar.value.is_empty() {
                    return Err(NotEditable("empty plain scalar"));
                }
                if !rest.starts_with(scalar.value.as_str()) {
                    return Err(NotEditable("plain scalar spans multiple lines"));
                }
                scalar.value.len()
            }
            ScalarStyle::SingleQuoted => {
                quoted_len(rest, b'\'').ok_or(NotEditable("unterminated single-quoted scalar"))?
            }
            ScalarStyle::DoubleQuoted => {
                quoted_len(rest, b'"').ok_or(NotEditable("unterminated double-quoted scalar"))?
            }
        };

        Ok(scalar.start..scalar.start + len)
    }
}

/// Serializes the document: the original source with every edited scalar spliced in.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut replacements: Vec<_> = self
            .scalars
            .iter()
            .filter_map(|s| s.replacement.as_ref())
            .collect();
        replacements.sort_by_key(|(span, _)| span.start);

        let mut cursor = 0;
        for (span, text) in replacements {
            f.write_str(&self.source[cursor..span.start])?;
            f.write_str(text)?;
            cursor = span.end;
        }
        f.write_str(&self.source[cursor..])
    }
}

/// Length in bytes of a quoted scalar at the start of `text`, quotes included.
fn quoted_len(text: &str, quote: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&quote) {
        return None;
    }

    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b'\'' if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn render(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::Plain if !needs_quotes(value) => value.to_owned(),
        ScalarStyle::SingleQuoted if !value.contains('\n') => {
            format!("'{}'", value.replace('\'', "''"))
        }
        _ => {
            let mut out = String::with_capacity(value.len() + 2);
            out.push('"');
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
    }
}

fn needs_quotes(value: &str) -> bool {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
        '`',
    ];

    value.is_empty()
        || value.starts_with(INDICATORS)
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.ends_with(':')
        || value.contains(": ")
        || value.contains(" #")
        || value.contains(['\n', '\t'])
}

enum Frame {
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>, Option<Node>),
}

struct TreeBuilder {
    // byte offset of every char index, plus the end of the source
    offsets: Vec<usize>,
    stack: Vec<Frame>,
    scalars: Vec<Scalar>,
    root: Option<Node>,
}

impl TreeBuilder {
    fn new(source: &str) -> Self {
        Self {
            offsets: source
                .char_indices()
                .map(|(i, _)| i)
                .chain(iter::once(source.len()))
                .collect(),
            stack: Vec::new(),
            scalars: Vec::new(),
            root: None,
        }
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Frame::Sequence(items)) => items.push(node),
            Some(Frame::Mapping(entries, pending_key)) => match pending_key.take() {
                Some(key) => entries.push((key, node)),
                None => *pending_key = Some(node),
            },
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        match ev {
            Event::Scalar(value, style, ..) => {
                let id = ScalarId(self.scalars.len());
                let start = self
                    .offsets
                    .get(mark.index())
                    .copied()
                    .unwrap_or(self.offsets.len() - 1);
                self.scalars.push(Scalar {
                    value,
                    style: style.into(),
                    start,
                    replacement: None,
                });
                self.push(Node::Scalar(id));
            }
            Event::Alias(..) => self.push(Node::Alias),
            Event::SequenceStart(..) => self.stack.push(Frame::Sequence(Vec::new())),
            Event::MappingStart(..) => self.stack.push(Frame::Mapping(Vec::new(), None)),
            Event::SequenceEnd => {
                if let Some(Frame::Sequence(items)) = self.stack.pop() {
                    self.push(Node::Sequence(items));
                }
            }
            Event::MappingEnd => {
                if let Some(Frame::Mapping(entries, _)) = self.stack.pop() {
                    self.push(Node::Mapping(entries));
                }
            }
            _ => {}
        }
    }
}
