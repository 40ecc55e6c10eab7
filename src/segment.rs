//! Sentence-boundary segmentation of narration text.
//!
//! Text is split into clauses at sentence terminators and clauses are greedily packed into
//! segments of at most `max_len` characters. A clause is never split: a single clause longer
//! than `max_len` becomes its own oversized segment.

/// Default maximum segment length in characters.
pub const DEFAULT_MAX_SEGMENT_LEN: usize = 300;

const TERMINATORS: [char; 4] = ['.', '!', '?', '…'];
const CLOSERS: [char; 6] = ['"', '\'', ')', '”', '’', '»'];

/// One speakable chunk of the source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// 0-based position in the narration.
    pub index: usize,
    /// Whitespace-normalized text, one or more whole clauses joined by single spaces.
    pub text: String,
}

impl Segment {
    /// Length in characters (Unicode scalar values).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into whitespace-normalized clauses.
///
/// A clause ends after a run of terminators (`.`, `!`, `?`, `…`) and any closing quotes or
/// brackets, but only when followed by whitespace or the end of input, so `3.5` stays whole.
/// Trailing text without a terminator forms the final clause.
pub fn split_clauses(text: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if !TERMINATORS.contains(&c) {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if TERMINATORS.contains(&next) || CLOSERS.contains(&next) {
                current.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let at_boundary = chars.peek().is_none_or(|next| next.is_whitespace());
        if at_boundary {
            push_clause(&mut clauses, &current);
            current.clear();
        }
    }
    push_clause(&mut clauses, &current);
    clauses
}

fn push_clause(out: &mut Vec<String>, raw: &str) {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        out.push(normalized);
    }
}

/// Greedily pack the clauses of `text` into segments of at most `max_len` characters.
///
/// Returns an empty vector for empty or whitespace-only input; callers treat that as "nothing
/// to synthesize".
pub fn segment(text: &str, max_len: usize) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for clause in split_clauses(text) {
        let clause_len = clause.chars().count();
        if buf.is_empty() {
            buf = clause;
            buf_len = clause_len;
            continue;
        }
        if buf_len + 1 + clause_len > max_len {
            out.push(Segment {
                index: out.len(),
                text: std::mem::take(&mut buf),
            });
            buf = clause;
            buf_len = clause_len;
        } else {
            buf.push(' ');
            buf.push_str(&clause);
            buf_len += 1 + clause_len;
        }
    }

    if !buf.is_empty() {
        out.push(Segment {
            index: out.len(),
            text: buf,
        });
    }

    tracing::debug!(segments = out.len(), max_len, "segmented narration text");
    out
}

#[cfg(test)]
#[path = "../tests/unit/segment.rs"]
mod tests;
