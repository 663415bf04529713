//! Error type shared by the findxml pipeline.
//!
//! Every failure below the per-file boundary of [`crate::FindXml`] is a
//! [`FindXmlError`]; the orchestrator turns it into a report line using
//! [`FindXmlError::category`] and its `Display` message.

use crate::token::Position;
use findxml_xpath::ErrorCode;
use findxml_xpath::runtime::ErrorKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FindXmlError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),
    #[error("{message}{}", position_suffix(*position))]
    Malformed { message: String, position: Position },
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("{0}")]
    Query(#[from] findxml_xpath::Error),
    #[error("{0}")]
    Pattern(#[from] glob::PatternError),
    #[error("{0}")]
    Enumerate(#[from] glob::GlobError),
    #[error("could not find a part of the path '{}'", .0.display())]
    SearchDirectory(PathBuf),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

fn position_suffix(position: Position) -> String {
    match position {
        Position::Known { line, column } => format!(", line {line}, position {column}."),
        Position::Unknown => String::new(),
    }
}

impl FindXmlError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn malformed(message: impl Into<String>, position: Position) -> Self {
        Self::Malformed { message: message.into(), position }
    }

    /// Short class name used in `ERROR processing ...` report lines.
    pub fn category(&self) -> &'static str {
        match self {
            FindXmlError::Io { .. } => "IoError",
            FindXmlError::Xml(_) | FindXmlError::Malformed { .. } => "XmlError",
            FindXmlError::Unsupported(_) => "UnsupportedOperation",
            FindXmlError::Query(e) => {
                if e.kind == ErrorKind::Static && e.code_enum() == ErrorCode::XPTY0004 {
                    "InvalidFunctionArgumentType"
                } else {
                    "XPathError"
                }
            }
            FindXmlError::Pattern(_) => "PatternError",
            FindXmlError::Enumerate(_) => "GlobError",
            FindXmlError::SearchDirectory(_) => "DirectoryNotFound",
            FindXmlError::Output(_) => "OutputError",
        }
    }
}

pub type FindXmlResult<T> = Result<T, FindXmlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_carries_position() {
        let e = FindXmlError::malformed("unexpected end of file", Position::Known { line: 3, column: 7 });
        assert_eq!(e.to_string(), "unexpected end of file, line 3, position 7.");
        assert_eq!(e.category(), "XmlError");
    }

    #[test]
    fn argument_type_errors_have_their_own_category() {
        let e: FindXmlError =
            findxml_xpath::Error::static_code(findxml_xpath::ErrorCode::XPTY0004, "incorrect argument type").into();
        assert_eq!(e.category(), "InvalidFunctionArgumentType");
    }
}
