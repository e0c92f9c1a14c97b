//! N-Triples ingestion for Dassie (boundary adapter).
//!
//! The LCSH subject dump (`authoritiessubjects.nt.skos`) is a multi-gigabyte
//! N-Triples file. This crate turns it into a single-pass stream of
//! [`Triple`] values:
//!
//! - Parsing is delegated to **Sophia**'s N-Triples parser.
//! - Each statement is converted and handed to the caller's sink as soon as
//!   it is parsed; nothing is buffered, so memory stays flat.
//! - The stream is consumed once. Callers that need a second pass reopen
//!   the file.

use sophia::api::source::{StreamError, TripleSource as _};
use sophia::api::triple::Triple as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

// ============================================================================
// Triple model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Iri(String),
    BlankNode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Object {
    Node(Node),
    Literal(Literal),
}

/// One subject-predicate-object statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Node,
    pub predicate: String,
    pub object: Object,
}

impl Node {
    pub fn as_str(&self) -> &str {
        match self {
            Node::Iri(iri) => iri.as_str(),
            Node::BlankNode(bn) => bn.as_str(),
        }
    }
}

impl Object {
    /// Literal lexical form, or the IRI / blank node label.
    pub fn text(&self) -> &str {
        match self {
            Object::Node(node) => node.as_str(),
            Object::Literal(lit) => lit.lexical.as_str(),
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Object::Node(Node::Iri(iri)) => Some(iri.as_str()),
            _ => None,
        }
    }
}

impl Triple {
    /// `<subject> <predicate> <object>`.
    pub fn iri(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: Node::Iri(subject.to_string()),
            predicate: predicate.to_string(),
            object: Object::Node(Node::Iri(object.to_string())),
        }
    }

    /// `<subject> <predicate> "lexical"@lang`.
    pub fn literal(subject: &str, predicate: &str, lexical: &str, language: Option<&str>) -> Self {
        Self {
            subject: Node::Iri(subject.to_string()),
            predicate: predicate.to_string(),
            object: Object::Literal(Literal {
                lexical: lexical.to_string(),
                datatype: None,
                language: language.map(str::to_string),
            }),
        }
    }

    pub fn subject_iri(&self) -> Option<&str> {
        match &self.subject {
            Node::Iri(iri) => Some(iri.as_str()),
            Node::BlankNode(_) => None,
        }
    }
}

/// Trailing path segment of an IRI: `http://id.loc.gov/authorities/subjects/sh85098119`
/// → `sh85098119`.
pub fn local_id(iri: &str) -> &str {
    iri.rsplit('/').next().unwrap_or(iri)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse N-Triples: {0}")]
    Parse(String),

    #[error("unsupported RDF term: {0}")]
    Term(String),

    /// Error returned by the caller's sink; the stream stopped there.
    #[error(transparent)]
    Sink(anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
enum SinkError {
    #[error("{0}")]
    Term(String),
    #[error(transparent)]
    Sink(anyhow::Error),
}

// ============================================================================
// Term display parsing
// ============================================================================

fn unescape_rdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a term from its N-Triples display form (`<iri>`, `_:b0`,
/// `"text"@en`, `"1"^^<xsd:int>`).
fn parse_term_display(term: &str) -> Result<Object, String> {
    let s = term.trim();

    if let Some(rest) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Ok(Object::Node(Node::Iri(rest.to_string())));
    }

    if let Some(rest) = s.strip_prefix("_:") {
        return Ok(Object::Node(Node::BlankNode(rest.to_string())));
    }

    if s.starts_with('"') {
        let mut end_quote = None;
        let mut escaped = false;
        for (i, ch) in s.char_indices().skip(1) {
            if ch == '"' && !escaped {
                end_quote = Some(i);
                break;
            }
            escaped = ch == '\\' && !escaped;
        }
        let Some(end) = end_quote else {
            return Err(format!("literal is missing its closing quote: {s}"));
        };

        let lexical = unescape_rdf_string(&s[1..end]);
        let rest = s[end + 1..].trim();

        let mut language = None;
        let mut datatype = None;
        if let Some(lang) = rest.strip_prefix('@') {
            language = Some(lang.to_string());
        } else if let Some(dt) = rest.strip_prefix("^^") {
            let dt = dt.trim();
            let dt = dt
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or(dt);
            if !dt.is_empty() {
                datatype = Some(dt.to_string());
            }
        }

        return Ok(Object::Literal(Literal {
            lexical,
            datatype,
            language,
        }));
    }

    Err(s.to_string())
}

fn parse_node_display(term: &str) -> Result<Node, String> {
    match parse_term_display(term)? {
        Object::Node(node) => Ok(node),
        Object::Literal(_) => Err(format!("expected IRI or blank node, got literal {term}")),
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// Stream every statement of an N-Triples document into `sink`.
///
/// Returns the number of triples delivered. The first sink error stops the
/// stream and comes back as [`IngestError::Sink`], unchanged.
pub fn for_each_ntriple<R, F>(reader: R, mut sink: F) -> Result<u64, IngestError>
where
    R: BufRead,
    F: FnMut(Triple) -> anyhow::Result<()>,
{
    let mut delivered = 0u64;
    let mut parser = sophia::turtle::parser::nt::parse_bufread(reader);
    let result = parser.try_for_each_triple(|t| -> Result<(), SinkError> {
        let subject = parse_node_display(&t.s().to_string()).map_err(SinkError::Term)?;
        let Node::Iri(predicate) =
            parse_node_display(&t.p().to_string()).map_err(SinkError::Term)?
        else {
            return Ok(());
        };
        let object = parse_term_display(&t.o().to_string()).map_err(SinkError::Term)?;
        sink(Triple {
            subject,
            predicate,
            object,
        })
        .map_err(SinkError::Sink)?;
        delivered += 1;
        Ok(())
    });

    match result {
        Ok(()) => Ok(delivered),
        Err(StreamError::SourceError(e)) => Err(IngestError::Parse(e.to_string())),
        Err(StreamError::SinkError(SinkError::Term(t))) => Err(IngestError::Term(t)),
        Err(StreamError::SinkError(SinkError::Sink(e))) => Err(IngestError::Sink(e)),
    }
}

/// A single-pass supply of triples.
pub trait TripleSource {
    /// Hand every triple to `sink` once, in source order.
    fn for_each_triple(
        self,
        sink: &mut dyn FnMut(Triple) -> anyhow::Result<()>,
    ) -> Result<u64, IngestError>;
}

/// N-Triples text read from any buffered reader.
pub struct NTriples<R>(pub R);

impl NTriples<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        Ok(NTriples(open_ntriples(path)?))
    }
}

impl<R: BufRead> TripleSource for NTriples<R> {
    fn for_each_triple(
        self,
        sink: &mut dyn FnMut(Triple) -> anyhow::Result<()>,
    ) -> Result<u64, IngestError> {
        for_each_ntriple(self.0, sink)
    }
}

impl TripleSource for Vec<Triple> {
    fn for_each_triple(
        self,
        sink: &mut dyn FnMut(Triple) -> anyhow::Result<()>,
    ) -> Result<u64, IngestError> {
        let mut delivered = 0u64;
        for triple in self {
            sink(triple).map_err(IngestError::Sink)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

/// Open an N-Triples file for [`for_each_ntriple`].
pub fn open_ntriples(path: &Path) -> Result<BufReader<File>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufReader::with_capacity(1 << 20, file))
}

/// Collect all triples of a small in-memory document.
pub fn read_triples(text: &str) -> Result<Vec<Triple>, IngestError> {
    let mut out = Vec::new();
    for_each_ntriple(text.as_bytes(), |t| {
        out.push(t);
        Ok(())
    })?;
    Ok(out)
}
