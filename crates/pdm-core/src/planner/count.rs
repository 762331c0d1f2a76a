//! Piece count selection.

/// Lower bound on pieces per download.
pub const MIN_PIECES: u32 = 1;
/// Upper bound on pieces per download.
pub const MAX_PIECES: u32 = 256;

/// Chooses the number of pieces for a download.
///
/// - No range support or unknown/zero size: exactly one piece.
/// - `requested > 0` (user choice): honoured, clamped to `[MIN_PIECES, MAX_PIECES]`.
/// - Otherwise: one piece per `piece_size_target` bytes, capped by `max_pieces`.
///
/// The result never exceeds `total` so no piece is empty.
pub fn choose_piece_count(
    total: i64,
    partial_support: bool,
    requested: u32,
    max_pieces: u32,
    piece_size_target: u64,
) -> u32 {
    if !partial_support || total <= 0 {
        return 1;
    }
    let n = if requested > 0 {
        requested.clamp(MIN_PIECES, MAX_PIECES)
    } else {
        let cap = max_pieces.clamp(MIN_PIECES, MAX_PIECES) as u64;
        let by_size = (total as u64) / piece_size_target.max(1);
        by_size.clamp(MIN_PIECES as u64, cap) as u32
    };
    (n as i64).min(total) as u32
}
