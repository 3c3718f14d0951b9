//! Code Chunker (C12): splits a file's bytes into non-overlapping,
//! content-addressed chunks classified as code, comment, or docstring.

use sha2::{Digest, Sha256};

/// Chunk size policy, in bytes.
pub const LOW: usize = 200;
pub const HIGH: usize = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Code,
    Comment,
    Docstring,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CodeChunk {
    pub chunk_id: String,
    pub kind: ChunkKind,
    pub content: String,
    pub start: usize,
    pub end: usize,
    pub line_start: usize,
    pub line_end: usize,
}

/// `SHA-256(normalized content)`, normalization = strip trailing
/// whitespace on every line.
fn chunk_id(content: &str) -> String {
    let normalized: String = content
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

fn classify(lines: &[&str]) -> ChunkKind {
    if lines.is_empty() {
        return ChunkKind::Code;
    }
    let first = lines[0].trim();
    if first.starts_with("/**") || first.starts_with(r#"""""#) || first.starts_with("///") {
        return ChunkKind::Docstring;
    }
    let comment_lines = lines.iter().filter(|l| is_comment_line(l.trim())).count();
    if comment_lines * 2 >= lines.len() {
        ChunkKind::Comment
    } else {
        ChunkKind::Code
    }
}

/// Split `content` into non-overlapping chunks of `[LOW, HIGH]` bytes,
/// never splitting inside a multi-byte UTF-8 character and never
/// splitting a line in half — chunk boundaries land on line breaks
/// whenever the policy allows it.
pub fn chunk_file(content: &str) -> Vec<CodeChunk> {
    if content.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut byte_cursor = 0usize;
    let mut line_cursor = 1usize;
    let bytes = content.as_bytes();
    let total = bytes.len();

    while byte_cursor < total {
        let mut end = (byte_cursor + HIGH).min(total);
        // Never split inside a multi-byte char.
        while end < total && !content.is_char_boundary(end) {
            end -= 1;
        }
        // Prefer to end on a line boundary once we're past LOW bytes.
        if end < total {
            if let Some(newline_offset) = content[byte_cursor..end].rfind('\n') {
                let candidate = byte_cursor + newline_offset + 1;
                if candidate - byte_cursor >= LOW {
                    end = candidate;
                }
            }
        }

        let slice = &content[byte_cursor..end];
        let lines: Vec<&str> = slice.lines().collect();
        let line_count = lines.len().max(1);
        let kind = classify(&lines);

        chunks.push(CodeChunk {
            chunk_id: chunk_id(slice),
            kind,
            content: slice.to_string(),
            start: byte_cursor,
            end,
            line_start: line_cursor,
            line_end: line_cursor + line_count - 1,
        });

        line_cursor += line_count;
        byte_cursor = end;
    }

    chunks
}
