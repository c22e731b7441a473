//! Per-face outcome log for batch renders.
//!
//! A render keeps going when one face fails. Every face adds an entry here
//! and the caller decides afterwards whether the run failed as a whole.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Fail,
}

impl Severity {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "ok",
            Self::Warning => "warning",
            Self::Fail => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorEntry {
    pub severity: Severity,
    /// Mesh face the entry is about, if any.
    pub face: Option<usize>,
    pub message: String,
}

/// Ordered list of render messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return the number of entries including it.
    pub fn add(
        &mut self,
        severity: Severity,
        face: Option<usize>,
        message: impl Into<String>,
    ) -> usize {
        self.entries.push(ErrorEntry {
            severity,
            face,
            message: message.into(),
        });
        self.entries.len()
    }

    pub fn info(&mut self, face: Option<usize>, message: impl Into<String>) -> usize {
        self.add(Severity::Info, face, message)
    }

    pub fn warn(&mut self, face: Option<usize>, message: impl Into<String>) -> usize {
        self.add(Severity::Warning, face, message)
    }

    pub fn fail(&mut self, face: Option<usize>, message: impl Into<String>) -> usize {
        self.add(Severity::Fail, face, message)
    }

    /// True when any entry is a failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Fail)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.iter()
    }

    pub fn extend(&mut self, other: ErrorLog) {
        self.entries.extend(other.entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.face {
            Some(face) => write!(f, "{}: face {face}: {}", self.severity.label(), self.message),
            None => write!(f, "{}: {}", self.severity.label(), self.message),
        }
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a ErrorEntry;
    type IntoIter = std::slice::Iter<'a, ErrorEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_counts_entries() {
        let mut log = ErrorLog::new();
        assert!(log.is_empty());
        assert_eq!(log.info(Some(0), "rendered"), 1);
        assert_eq!(log.warn(None, "no sphere"), 2);
        assert_eq!(log.len(), 2);
        assert!(!log.is_failed());
        log.fail(Some(3), "degenerate");
        assert!(log.is_failed());
        assert_eq!(log.count(Severity::Warning), 1);
    }

    #[test]
    fn test_display_one_line_per_entry() {
        let mut log = ErrorLog::new();
        log.info(Some(2), "rendered 10x10");
        log.fail(None, "layout not written");
        assert_eq!(
            log.to_string(),
            "ok: face 2: rendered 10x10\nerror: layout not written\n"
        );
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut a = ErrorLog::new();
        a.info(Some(0), "a");
        let mut b = ErrorLog::new();
        b.fail(Some(1), "b");
        a.extend(b);
        let faces: Vec<_> = a.iter().map(|e| e.face).collect();
        assert_eq!(faces, vec![Some(0), Some(1)]);
    }
}
