//! Novel loading and chapter splitting.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::StageResult;

/// Chapter title (the heading line) to chapter text (heading included).
pub type Chapters = BTreeMap<String, String>;

/// Read a UTF-8 novel file and split it into chapters.
pub async fn load_novel(path: &Path) -> StageResult<Chapters> {
    let content = tokio::fs::read_to_string(path).await?;
    let chapters = split_chapters(&content);
    info!(
        path = %path.display(),
        chapters = chapters.len(),
        "Loaded novel"
    );
    Ok(chapters)
}

/// Split text on lines that start with `第<n>章`.
///
/// Each chapter runs from its heading to the next heading or end of text,
/// trimmed. Text before the first heading is dropped. When a title repeats,
/// the later chapter wins.
pub fn split_chapters(content: &str) -> Chapters {
    static HEADING_RE: OnceLock<Regex> = OnceLock::new();
    let re = HEADING_RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t\x{3000}]*第\d+章[^\n]*").expect("chapter heading regex should compile")
    });

    let headings: Vec<_> = re.find_iter(content).collect();
    let mut chapters = Chapters::new();
    for (i, heading) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(content.len());
        let title = heading.as_str().trim().to_string();
        let text = content[heading.start()..end].trim().to_string();
        debug!(title = %title, chars = text.chars().count(), "Found chapter");
        chapters.insert(title, text);
    }
    chapters
}
