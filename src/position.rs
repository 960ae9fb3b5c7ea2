//! The single authority for converting between the wire protocol's
//! zero-indexed `(line, character)` positions and the one-indexed positions
//! our own parser produces internally.
//!
//! Every other module that needs to cross this boundary goes through
//! [`to_lsp`]/[`from_lsp`] rather than adding or subtracting 1 inline.

use tower_lsp::lsp_types::{Position as LspPosition, Range as LspRange};

/// A one-indexed source position, as produced by [`crate::parser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// An ordered pair of one-indexed positions, `start <= end` in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start <= end, "range start must precede end");
        Self { start, end }
    }

    /// A zero-width range at `position`.
    pub fn point(position: Position) -> Self {
        Self { start: position, end: position }
    }
}

/// Converts a one-indexed internal position to the wire's zero-indexed form.
pub fn to_lsp(pos: Position) -> LspPosition {
    LspPosition {
        line: pos.line.saturating_sub(1),
        character: pos.column.saturating_sub(1),
    }
}

/// Converts a zero-indexed wire position to our one-indexed internal form.
pub fn from_lsp(pos: LspPosition) -> Position {
    Position { line: pos.line + 1, column: pos.character + 1 }
}

pub fn range_to_lsp(range: Range) -> LspRange {
    LspRange { start: to_lsp(range.start), end: to_lsp(range.end) }
}

pub fn range_from_lsp(range: LspRange) -> Range {
    Range { start: from_lsp(range.start), end: from_lsp(range.end) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_wire_form() {
        let internal = Position::new(3, 7);
        let wire = to_lsp(internal);
        assert_eq!(wire.line, 2);
        assert_eq!(wire.character, 6);
        assert_eq!(from_lsp(wire), internal);
    }

    #[test]
    fn first_character_of_document_is_one_one_internally() {
        let wire = LspPosition { line: 0, character: 0 };
        assert_eq!(from_lsp(wire), Position::new(1, 1));
    }
}
