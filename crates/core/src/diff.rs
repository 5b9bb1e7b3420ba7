// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sentence-level diff between two drafts of the same task.
//!
//! Sentences are compared case-insensitively and aligned with a longest
//! common subsequence. The result is an ordered list of chunks suitable for
//! highlighting what changed between redrafts.

use serde::{Deserialize, Serialize};

/// How a sentence changed between drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Same,
    Added,
    Removed,
}

/// One sentence of diff output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub value: String,
}

impl DiffChunk {
    fn new(kind: ChangeKind, value: &str) -> Self {
        DiffChunk {
            kind,
            value: value.to_string(),
        }
    }
}

/// Sentence counts per change kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub same: usize,
    pub added: usize,
    pub removed: usize,
}

impl DiffSummary {
    pub fn from_chunks(chunks: &[DiffChunk]) -> Self {
        chunks.iter().fold(DiffSummary::default(), |mut acc, chunk| {
            match chunk.kind {
                ChangeKind::Same => acc.same += 1,
                ChangeKind::Added => acc.added += 1,
                ChangeKind::Removed => acc.removed += 1,
            }
            acc
        })
    }

    /// True when the drafts contain the same sentences.
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Splits text into trimmed, non-empty sentences.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or end of
/// text, or at a line break.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |&(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, sentence: &'a str) {
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

/// Compares two drafts sentence by sentence.
///
/// Returns `None` when there is no previous draft to compare against.
pub fn diff_sentences(previous: &str, current: &str) -> Option<Vec<DiffChunk>> {
    if previous.trim().is_empty() {
        return None;
    }

    let old = split_sentences(previous);
    let new = split_sentences(current);
    let old_keys: Vec<String> = old.iter().map(|s| s.to_lowercase()).collect();
    let new_keys: Vec<String> = new.iter().map(|s| s.to_lowercase()).collect();

    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let (n, m) = (old.len(), new.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old_keys[i] == new_keys[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut chunks = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old_keys[i] == new_keys[j] {
            chunks.push(DiffChunk::new(ChangeKind::Same, new[j]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            chunks.push(DiffChunk::new(ChangeKind::Removed, old[i]));
            i += 1;
        } else {
            chunks.push(DiffChunk::new(ChangeKind::Added, new[j]));
            j += 1;
        }
    }
    chunks.extend(old[i..].iter().map(|s| DiffChunk::new(ChangeKind::Removed, s)));
    chunks.extend(new[j..].iter().map(|s| DiffChunk::new(ChangeKind::Added, s)));

    Some(chunks)
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
