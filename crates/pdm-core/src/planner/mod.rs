//! Piece planning and range math.
//!
//! Chooses how many pieces a download gets and computes each piece's byte
//! range. The arithmetic here fixes the on-disk layout of a download, so a
//! resumed run must compute exactly the same offsets as the first one.

mod count;
mod range;

pub use count::{choose_piece_count, MAX_PIECES, MIN_PIECES};
pub use range::{piece_size, piece_start_pos, range_header_value, PieceRange};
