use serde::Serialize;

use crate::crawler::Page;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// A bounded-length slice of a page's Markdown, paired with the page it
/// came from. This is the unit emitted on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub text: String,
    pub url: String,
    pub title: String,
}

/// Split a page's Markdown into fixed-size chunks labelled with its URL and
/// title.
pub fn chunk_page(page: &Page, size: usize) -> Vec<Chunk> {
    split_fixed(&page.markdown, size)
        .into_iter()
        .map(|text| Chunk {
            text,
            url: page.url.clone(),
            title: page.title.clone(),
        })
        .collect()
}

/// Split text into non-overlapping slices of at most `size` characters.
/// Each slice is trimmed of surrounding whitespace; empty results are
/// dropped. Boundaries are character counts, not bytes, so multi-byte
/// UTF-8 never splits mid-codepoint.
pub fn split_fixed(text: &str, size: usize) -> Vec<String> {
    if size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .filter_map(|window| {
            let slice: String = window.iter().collect();
            let trimmed = slice.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}
