//! Turns a raw input stream into the ordered documents it contains.

use regex::bytes::Regex;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::debug;

/// `# Source: <path>` at the head of a fragment, optionally after a separator line
static SOURCE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:---\r?\n)?# Source: ([^\n]*)").expect("source marker pattern is valid")
});

/// A `---` line, each side terminated by either line break style
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n---\r?\n").expect("separator pattern is valid"));

/// One candidate document and the file it is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<'a> {
    pub content: Cow<'a, [u8]>,
    pub file_name: String,
}

impl Document<'_> {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Deserialize)]
struct ListContainer {
    items: Option<Vec<serde_yaml::Value>>,
}

/// Split `input` into documents.
///
/// Empty input yields a single empty document. A `List`-style container with
/// at least one entry under `items` is expanded into one document per item.
/// Otherwise the text is split on `---` lines, keeping empty fragments so
/// every position in the stream gets a slot.
pub fn split<'a>(input: &'a [u8], file_name: &str) -> Vec<Document<'a>> {
    if input.is_empty() {
        return vec![Document {
            content: Cow::Borrowed(input),
            file_name: file_name.to_string(),
        }];
    }

    if let Some(items) = expand_list(input) {
        debug!(file = file_name, items = items.len(), "expanding list container");
        return items
            .into_iter()
            .map(|content| Document {
                content: Cow::Owned(content),
                file_name: file_name.to_string(),
            })
            .collect();
    }

    let mut current_file = file_name.to_string();

    SEPARATOR
        .split(input)
        .map(|fragment| {
            if let Some(source) = source_marker(fragment) {
                current_file = source;
            }
            Document {
                content: Cow::Borrowed(fragment),
                file_name: current_file.clone(),
            }
        })
        .collect()
}

fn expand_list(input: &[u8]) -> Option<Vec<Vec<u8>>> {
    let container: ListContainer = serde_yaml::from_slice(input).ok()?;
    let items = container.items.filter(|items| !items.is_empty())?;

    items
        .iter()
        .map(|item| serde_yaml::to_string(item).ok().map(String::into_bytes))
        .collect()
}

fn source_marker(fragment: &[u8]) -> Option<String> {
    let captures = SOURCE_MARKER.captures(fragment)?;
    let path = String::from_utf8_lossy(&captures[1]);
    Some(path.trim_end_matches('\r').to_string())
}
