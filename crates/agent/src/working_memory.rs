//! Working memory — the loop's one-iteration-deep buffer of raw outputs.
//!
//! Holds the raw results of the immediately preceding iteration (tool
//! payloads, or the text the model just produced) so a later tool call —
//! artifact creation — can retrieve content without round-tripping it
//! through the model's context window.
//!
//! Invariant: replaced wholesale at the start of each new iteration,
//! never merged or appended across iterations.

use serde_json::Value;

/// Transient, loop-scoped buffer of the previous iteration's raw outputs.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    entries: Vec<Value>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer with a new iteration's raw outputs.
    pub fn replace(&mut self, entries: Vec<Value>) {
        self.entries = entries;
    }

    /// Replace the buffer with a single text entry (a text-only iteration).
    pub fn replace_with_text(&mut self, text: &str) {
        self.entries = vec![Value::String(text.to_string())];
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    /// Render the buffer as one content string for the artifact handoff.
    ///
    /// String entries are joined with a blank line; non-string entries are
    /// JSON-serialized. Returns `None` when the buffer is empty.
    pub fn splice_content(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|entry| match entry {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let memory = WorkingMemory::new();
        assert!(memory.is_empty());
        assert!(memory.splice_content().is_none());
    }

    #[test]
    fn replace_is_wholesale() {
        let mut memory = WorkingMemory::new();
        memory.replace(vec![Value::String("first".into())]);
        memory.replace(vec![Value::String("second".into())]);

        assert_eq!(memory.entries().len(), 1);
        assert_eq!(memory.splice_content().unwrap(), "second");
    }

    #[test]
    fn splice_joins_strings_with_blank_line() {
        let mut memory = WorkingMemory::new();
        memory.replace(vec![
            Value::String("paragraph one".into()),
            Value::String("paragraph two".into()),
        ]);
        assert_eq!(
            memory.splice_content().unwrap(),
            "paragraph one\n\nparagraph two"
        );
    }

    #[test]
    fn splice_serializes_non_string_entries() {
        let mut memory = WorkingMemory::new();
        memory.replace(vec![serde_json::json!({"filename": "notes.txt"})]);
        let spliced = memory.splice_content().unwrap();
        assert!(spliced.contains(r#""filename":"notes.txt""#));
    }

    #[test]
    fn replace_with_text_holds_single_entry() {
        let mut memory = WorkingMemory::new();
        memory.replace(vec![Value::Bool(true), Value::Bool(false)]);
        memory.replace_with_text("the summary");

        assert_eq!(memory.entries().len(), 1);
        assert_eq!(memory.splice_content().unwrap(), "the summary");
    }
}
