//! Per-file search pipeline.
//!
//! For every file a pattern expands to: open a token reader, optionally wrap
//! it in a [`NamespaceNormalizer`], load the document, compile and bind the
//! query with [`XPath20Functions`], and report the selected nodes in document
//! order. A failure inside one file becomes an error line on the sink and the
//! batch moves on.

use crate::document::{XmlDocument, XmlNode};
use crate::error::{FindXmlError, FindXmlResult};
use crate::functions::XPath20Functions;
use crate::normalizer::NamespaceNormalizer;
use crate::reader::XmlTokenReader;
use crate::report::{MatchRecord, OutputSink, Reporter};
use crate::token::TokenSource;
use findxml_xpath::compile_xpath;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindSettings {
    /// Path query every file is searched with.
    pub query: String,
    /// Also search the subdirectories of each pattern's directory.
    pub search_subtree: bool,
    /// Report one line with the file name per matching file.
    pub show_file_names_only: bool,
    /// Strip namespaces before querying, so plain names match namespaced documents.
    pub ignore_namespaces: bool,
}

impl Default for FindSettings {
    fn default() -> Self {
        Self { query: String::new(), search_subtree: false, show_file_names_only: false, ignore_namespaces: true }
    }
}

impl FindSettings {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }
}

pub struct FindXml {
    settings: FindSettings,
    functions: XPath20Functions,
    reporter: Reporter,
}

impl FindXml {
    pub fn new(settings: FindSettings) -> Self {
        let reporter = Reporter::new(settings.show_file_names_only);
        Self { settings, functions: XPath20Functions::new(), reporter }
    }

    pub fn settings(&self) -> &FindSettings {
        &self.settings
    }

    /// Searches every pattern relative to the process working directory.
    pub fn find_in_files<I, P>(&self, patterns: I, sink: &mut dyn OutputSink) -> FindXmlResult<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let cwd = std::env::current_dir().map_err(|e| FindXmlError::io(".", e))?;
        self.find_in_files_from(&cwd, patterns, sink)
    }

    /// Searches every pattern, relative patterns resolved against `cwd`. Only
    /// sink failures abort the batch.
    pub fn find_in_files_from<I, P>(&self, cwd: &Path, patterns: I, sink: &mut dyn OutputSink) -> FindXmlResult<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match self.find_in_file(cwd, pattern, sink) {
                Err(FindXmlError::Output(e)) => return Err(FindXmlError::Output(e)),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "skipping file pattern");
                    write(sink, &format!("ERROR processing pattern {pattern}: {}: {e}", e.category()))?;
                }
                Ok(()) => {}
            }
        }
        Ok(())
    }

    /// Searches the files one pattern expands to. Errors returned here concern
    /// the pattern itself; per-file errors are written to `sink`.
    pub fn find_in_file(&self, cwd: &Path, pattern: &str, sink: &mut dyn OutputSink) -> FindXmlResult<()> {
        let (directory, glob) = resolve_file_pattern(pattern, cwd);
        let files = enumerate_files(&directory, &glob, self.settings.search_subtree)?;
        tracing::debug!(pattern, directory = %directory.display(), files = files.len(), "expanded file pattern");

        for file in files {
            let label = report_label(&file, &directory);
            match self.search_path(&file) {
                Ok(nodes) => {
                    tracing::debug!(file = %file.display(), matches = nodes.len(), "searched file");
                    for node in &nodes {
                        self.reporter.report(&MatchRecord::new(&label, node), sink).map_err(FindXmlError::Output)?;
                        if self.settings.show_file_names_only {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "failed to search file");
                    write(sink, &format!("ERROR processing file {}: {}: {e}", file.display(), e.category()))?;
                }
            }
        }
        Ok(())
    }

    fn search_path(&self, path: &Path) -> FindXmlResult<Vec<XmlNode>> {
        self.find_in_source(XmlTokenReader::open(path)?)
    }

    /// Runs the query over a token source; the source is closed before returning.
    pub fn find_in_source<S: TokenSource>(&self, source: S) -> FindXmlResult<Vec<XmlNode>> {
        let document = if self.settings.ignore_namespaces {
            load_and_close(NamespaceNormalizer::new(source))?
        } else {
            load_and_close(source)?
        };
        self.select(&document)
    }

    pub fn find_in_str(&self, xml: &str) -> FindXmlResult<Vec<XmlNode>> {
        self.find_in_source(XmlTokenReader::from_str(xml)?)
    }

    /// Compiles the query, binds the extension functions and selects from the document node.
    pub fn select(&self, document: &XmlDocument) -> FindXmlResult<Vec<XmlNode>> {
        let expression = compile_xpath(&self.settings.query)?;
        let bound = expression.bind::<XmlNode>(&self.functions)?;
        Ok(bound.select(&document.root())?)
    }
}

fn load_and_close<S: TokenSource>(mut source: S) -> FindXmlResult<XmlDocument> {
    let document = XmlDocument::load(&mut source);
    source.close();
    document
}

fn write(sink: &mut dyn OutputSink, line: &str) -> FindXmlResult<()> {
    sink.write_line(line).map_err(FindXmlError::Output)
}

/// Splits a file pattern into the directory to search and the file-name glob.
///
/// Absolute patterns keep their own directory; relative ones are joined to `cwd` first.
pub fn resolve_file_pattern(pattern: &str, cwd: &Path) -> (PathBuf, String) {
    let path = Path::new(pattern);
    let full = if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) };
    let glob = full.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let directory = full.parent().map_or_else(|| full.clone(), Path::to_path_buf);
    (directory, glob)
}

/// Files in `directory` (and below it when `recursive`) whose names match `glob`,
/// in the order the `glob` crate walks them. Overlapping patterns are not de-duplicated.
pub fn enumerate_files(directory: &Path, glob: &str, recursive: bool) -> FindXmlResult<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(FindXmlError::SearchDirectory(directory.to_path_buf()));
    }
    let base = glob::Pattern::escape(&directory.to_string_lossy());
    let sep = std::path::MAIN_SEPARATOR;
    let pattern = if recursive { format!("{base}{sep}**{sep}{glob}") } else { format!("{base}{sep}{glob}") };
    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

fn report_label(file: &Path, directory: &Path) -> String {
    match file.strip_prefix(directory) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.display().to_string(),
        _ => file.display().to_string(),
    }
}
