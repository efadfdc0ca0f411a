//! Bounded-size text chunking for translation.
//!
//! Paragraph-first: whole paragraphs are packed up to the target size. A
//! paragraph longer than the target is split on sentence boundaries and the
//! sentences packed instead. A single sentence longer than the target
//! becomes its own oversized chunk — a chunk never ends mid-sentence.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::Page;

/// One translation unit, tied to its originating page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u32,
    pub page: u32,
    pub text: String,
}

pub struct Chunker {
    target_chars: usize,
    sentence_re: Regex,
}

impl Chunker {
    pub fn new(target_chars: usize) -> Self {
        // A sentence runs to the next terminator (Latin or CJK) plus
        // trailing whitespace, or to the end of the text.
        let sentence_re = Regex::new(r"[^.!?。！？]*[.!?。！？]+\s*|[^.!?。！？]+$")
            .expect("sentence boundary pattern is valid");
        Self {
            target_chars,
            sentence_re,
        }
    }

    /// Splits every page's text, assigning globally increasing chunk
    /// indices. Pages without text contribute no chunks.
    pub fn split_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text) {
                chunks.push(Chunk {
                    index: chunks.len() as u32,
                    page: page.number,
                    text,
                });
            }
        }
        chunks
    }

    /// Splits one text into bounded chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in paragraphs {
            if paragraph.len() > self.target_chars {
                // Oversized paragraph: flush what we have and fall back to
                // sentence packing.
                flush(&mut chunks, &mut current);
                self.pack_sentences(paragraph, &mut chunks);
                continue;
            }

            if !current.is_empty() && current.len() + 2 + paragraph.len() > self.target_chars {
                flush(&mut chunks, &mut current);
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }

        flush(&mut chunks, &mut current);
        chunks
    }

    fn pack_sentences(&self, paragraph: &str, chunks: &mut Vec<String>) {
        let mut current = String::new();
        for sentence in self.sentence_re.find_iter(paragraph) {
            let sentence = sentence.as_str().trim();
            if sentence.is_empty() {
                continue;
            }
            if !current.is_empty() && current.len() + 1 + sentence.len() > self.target_chars {
                flush(chunks, &mut current);
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
        flush(chunks, &mut current);
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}
