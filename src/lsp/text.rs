use crate::lang::span::{LineIndex, Span};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tower_lsp_server::lsp_types::{Position, Range, Uri};
use tower_lsp_server::UriExt;

pub fn url_to_path(uri: &Uri) -> Option<PathBuf> {
    uri.to_file_path().map(|cow: Cow<'_, Path>| match cow {
        Cow::Owned(path) => path,
        Cow::Borrowed(path) => path.to_path_buf(),
    })
}

/// LSP position of a byte offset. The line index does the boundary
/// bookkeeping; its 1-based char-counted coordinates map straight onto
/// the zero-based LSP ones.
pub fn offset_to_position(text: &str, offset: usize) -> Position {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let (line, col) = LineIndex::new(text).position(text, offset);
    Position::new(line - 1, col - 1)
}

/// Byte offset of an LSP position; the character component counts chars.
/// Positions past the end of a line clamp to the end of that line, past
/// the last line to the end of the text.
pub fn position_to_offset(text: &str, position: Position) -> usize {
    let index = LineIndex::new(text);
    let Some(line_start) = index.line_start(position.line.saturating_add(1)) else {
        return text.len();
    };
    let line_end = index
        .line_start(position.line.saturating_add(2))
        .unwrap_or(text.len());
    let mut remaining = position.character as usize;
    for (idx, _) in text[line_start..line_end].char_indices() {
        if remaining == 0 {
            return line_start + idx;
        }
        remaining -= 1;
    }
    line_end
}

pub fn span_to_range(text: &str, span: Span) -> Range {
    let len = text.len();
    Range {
        start: offset_to_position(text, span.start.min(len)),
        end: offset_to_position(text, span.end.min(len)),
    }
}

/// External tools report 1-based lines and a 1-based `[start, end)` column
/// span; LSP wants both zero-based.
pub fn pos_to_range(line: u32, span: (u32, u32)) -> Range {
    Range {
        start: Position {
            line: line.saturating_sub(1),
            character: span.0.saturating_sub(1),
        },
        end: Position {
            line: line.saturating_sub(1),
            character: span.1.saturating_sub(1),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_position_round_trip() {
        let text = "package demo\n\nvar n int = 3\n";
        for (line, character) in [(0, 0), (0, 7), (2, 4), (2, 13)] {
            let pos = Position::new(line, character);
            let offset = position_to_offset(text, pos);
            assert_eq!(offset_to_position(text, offset), pos);
        }
    }

    #[test]
    fn multibyte_characters_count_once() {
        let text = "héllo\n";
        let offset = position_to_offset(text, Position::new(0, 2));
        // 'h' is 1 byte, 'é' is 2: the third column starts at byte 3.
        assert_eq!(offset, 3);
        assert_eq!(offset_to_position(text, offset), Position::new(0, 2));
    }

    #[test]
    fn positions_clamp_to_line_and_text_ends() {
        let text = "ab\ncd\n";
        // Character past the line content stops at its newline.
        assert_eq!(position_to_offset(text, Position::new(0, 99)), 3);
        // A line past the end of the file maps to the text length.
        assert_eq!(position_to_offset(text, Position::new(9, 0)), text.len());
    }

    #[test]
    fn tool_coordinates_shift_to_zero_based() {
        let range = pos_to_range(3, (5, 9));
        assert_eq!(range.start, Position::new(2, 4));
        assert_eq!(range.end, Position::new(2, 8));
    }
}
