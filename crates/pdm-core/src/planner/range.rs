//! Piece sizes, offsets and HTTP Range header values.

use crate::store::UNKNOWN_SIZE;

/// Byte range of one piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceRange {
    pub start: i64,
    /// Length in bytes, or `UNKNOWN_SIZE` when the piece runs to end of stream.
    pub size: i64,
}

impl PieceRange {
    /// Range for piece `index` of a download of `total` bytes split `num_pieces` ways.
    pub fn of(total: i64, num_pieces: u32, index: u32) -> Self {
        PieceRange {
            start: piece_start_pos(total, num_pieces, index),
            size: piece_size(total, num_pieces, index),
        }
    }

    /// Inclusive last byte; `None` for an empty or unknown-size piece.
    pub fn end(&self) -> Option<i64> {
        (self.size > 0).then(|| self.start + self.size - 1)
    }

    /// Length in bytes, or `UNKNOWN_SIZE`.
    pub fn len(&self) -> i64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_unknown(&self) -> bool {
        self.size < 0
    }
}

/// Size of piece `index`: `total / n` for every piece but the last, which
/// absorbs the remainder. Unknown totals yield `UNKNOWN_SIZE` (single piece).
pub fn piece_size(total: i64, num_pieces: u32, index: u32) -> i64 {
    if total < 0 {
        return UNKNOWN_SIZE;
    }
    let n = num_pieces.max(1) as i64;
    let base = total / n;
    if index as i64 == n - 1 {
        base + total % n
    } else {
        base
    }
}

/// First byte offset of piece `index`: `index * (total / n)`.
pub fn piece_start_pos(total: i64, num_pieces: u32, index: u32) -> i64 {
    if total <= 0 {
        return 0;
    }
    let n = num_pieces.max(1) as i64;
    index as i64 * (total / n)
}

/// HTTP Range header value for resuming at `from` up to `end` (inclusive).
/// An unknown end yields the open form `bytes=from-`.
pub fn range_header_value(from: i64, end: i64) -> String {
    if end < 0 {
        format!("bytes={}-", from)
    } else {
        format!("bytes={}-{}", from, end)
    }
}
