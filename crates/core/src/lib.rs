//! Namespace-agnostic XML search.
//!
//! Files are read into a token stream ([`reader`]), optionally stripped of
//! namespaces ([`normalizer`]), loaded into a queryable [`document`] and
//! searched with a path query extended by `matches()` and `lower-case()`
//! ([`functions`]). [`FindXml`] drives the pipeline over file patterns and
//! writes [`report`]s to an [`OutputSink`].

pub mod document;
pub mod error;
pub mod functions;
pub mod normalizer;
pub mod reader;
pub mod report;
pub mod search;
pub mod serialize;
pub mod token;

pub use document::{XmlDocument, XmlNode};
pub use error::{FindXmlError, FindXmlResult};
pub use functions::{FunctionDescriptor, FunctionValue, ReturnKind, XPath20Functions};
pub use normalizer::NamespaceNormalizer;
pub use reader::XmlTokenReader;
pub use report::{MatchRecord, OutputSink, Reporter, WriterSink};
pub use search::{FindSettings, FindXml, enumerate_files, resolve_file_pattern};
pub use token::{Position, Token, TokenKind, TokenSource};

#[cfg(test)]
use tempfile as _;
