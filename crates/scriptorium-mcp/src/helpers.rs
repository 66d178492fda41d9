//! Response text formatting for tool results.

use std::path::Path;

use scriptorium_editor::{SelectionSnapshot, TextSnapshot};

/// Label used for a document that has never been opened or saved.
pub const UNTITLED: &str = "untitled";

pub fn format_path(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => UNTITLED.to_string(),
    }
}

/// Header block plus the full content, separated by `---`.
pub fn format_text(snapshot: &TextSnapshot) -> String {
    let path = match &snapshot.path {
        Some(path) => path.display().to_string(),
        None => "(untitled)".to_string(),
    };
    format!(
        "File: {path}\nModified: {}\nLength: {} chars\n---\n{}",
        snapshot.dirty, snapshot.length, snapshot.content
    )
}

pub fn format_selection(selection: &SelectionSnapshot) -> String {
    if selection.length == 0 {
        return "No text is currently selected.".to_string();
    }
    format!(
        "Selection start: {}\nSelection length: {}\n---\n{}",
        selection.start, selection.length, selection.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_untitled_document() {
        assert_eq!(format_path(None), "untitled");

        let text = format_text(&TextSnapshot {
            path: None,
            dirty: false,
            length: 0,
            content: String::new(),
        });
        assert_eq!(text, "File: (untitled)\nModified: false\nLength: 0 chars\n---\n");
    }

    #[test]
    fn test_text_with_path() {
        let text = format_text(&TextSnapshot {
            path: Some(PathBuf::from("/tmp/a.txt")),
            dirty: true,
            length: 5,
            content: "hello".into(),
        });
        assert!(text.starts_with("File: /tmp/a.txt\nModified: true\nLength: 5 chars\n"));
        assert!(text.ends_with("---\nhello"));
    }

    #[test]
    fn test_empty_selection_is_not_an_error_text() {
        let none = format_selection(&SelectionSnapshot { start: 3, length: 0, text: String::new() });
        assert_eq!(none, "No text is currently selected.");

        let some = format_selection(&SelectionSnapshot { start: 1, length: 2, text: "el".into() });
        assert_eq!(some, "Selection start: 1\nSelection length: 2\n---\nel");
    }
}
