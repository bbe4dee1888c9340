use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use super::record::CompilationRecord;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Iterates the records of one JSONL artifact.
///
/// Blank lines are skipped. Line numbers in errors start at 1.
pub struct ArtifactReader<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl ArtifactReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> ArtifactReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for ArtifactReader<R> {
    type Item = Result<CompilationRecord, ArtifactError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&line).map_err(|source| ArtifactError::Malformed {
                    line: self.line,
                    source,
                }),
            );
        }
    }
}

/// Read every record of an artifact, failing on the first bad line.
pub fn read_artifact(path: impl AsRef<Path>) -> Result<Vec<CompilationRecord>, ArtifactError> {
    ArtifactReader::open(path)?.collect()
}

/// Record counts of an artifact, by outcome and by target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub records: usize,
    pub calls: usize,
    pub outcomes: BTreeMap<&'static str, usize>,
    pub targets: BTreeMap<&'static str, usize>,
}

impl ArtifactSummary {
    pub fn add(&mut self, record: &CompilationRecord) {
        self.records += 1;
        self.calls += record.calls.len();
        *self.outcomes.entry(record.outcome.as_str()).or_default() += 1;
        *self.targets.entry(record.target.as_str()).or_default() += 1;
    }
}

impl<'a> FromIterator<&'a CompilationRecord> for ArtifactSummary {
    fn from_iter<I: IntoIterator<Item = &'a CompilationRecord>>(iter: I) -> Self {
        let mut summary = Self::default();
        for record in iter {
            summary.add(record);
        }
        summary
    }
}

impl fmt::Display for ArtifactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "records: {}", self.records)?;
        writeln!(f, "calls:   {}", self.calls)?;
        for (outcome, count) in &self.outcomes {
            writeln!(f, "  {outcome:<8} {count}")?;
        }
        for (target, count) in &self.targets {
            writeln!(f, "  target {target:<8} {count}")?;
        }
        Ok(())
    }
}
