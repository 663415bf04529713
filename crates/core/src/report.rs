//! Match reports and the line sink they are written to.

use crate::document::XmlNode;
use crate::token::Position;
use std::io::{self, Write};

/// Destination of report and error lines.
pub trait OutputSink {
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

impl OutputSink for Vec<String> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }
}

/// Line sink over any [`io::Write`], typically locked stdout.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")
    }
}

/// One query result on its way to the sink.
#[derive(Debug, Clone)]
pub struct MatchRecord<'a> {
    pub label: &'a str,
    pub node: &'a XmlNode,
    pub position: Position,
}

impl<'a> MatchRecord<'a> {
    pub fn new(label: &'a str, node: &'a XmlNode) -> Self {
        Self { label, node, position: node.position() }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    file_names_only: bool,
}

impl Reporter {
    pub fn new(file_names_only: bool) -> Self {
        Self { file_names_only }
    }

    /// Lines for one match: the label alone in file-names mode, otherwise
    /// `label(@line)`, the serialized node indented as in its source, and a blank line.
    pub fn render(&self, record: &MatchRecord<'_>) -> Vec<String> {
        if self.file_names_only {
            return vec![record.label.to_string()];
        }
        let header = match record.position.line() {
            Some(line) => format!("{}(@{line})", record.label),
            None => record.label.to_string(),
        };
        // The column points at the element name, one past the '<'.
        let indent = record.position.column().filter(|c| *c > 1).map_or(0, |c| c - 2);
        let body = format!("{}{}", " ".repeat(indent), record.node.outer_xml());
        vec![header, body, String::new()]
    }

    pub fn report(&self, record: &MatchRecord<'_>, sink: &mut dyn OutputSink) -> io::Result<()> {
        for line in self.render(record) {
            sink.write_line(&line)?;
        }
        Ok(())
    }
}
