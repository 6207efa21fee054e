use crate::engine::Board;

/// Lower end of the interval every leaf evaluation must stay inside.
pub const V_MIN: f64 = 0.0;
/// Upper end of the interval; the chance-node bound assumes no leaf exceeds it.
pub const V_MAX: f64 = 1.0;

const EMPTY_WEIGHT: f64 = 0.6;
const MAX_TILE_WEIGHT: f64 = 0.4;

/// Static evaluation bounded to `[V_MIN, V_MAX]`.
///
/// Weighted sum of the empty-cell ratio and the largest exponent over 16.
/// An empty board scores 0.6; a full board of 2s scores 0.025.
///
/// ```
/// use bepp_2048::engine::Board;
/// use bepp_2048::expectimax::bounded_eval;
/// let b = Board::from_exponents([2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
/// assert!((bounded_eval(b) - 0.6125).abs() < 1e-12);
/// ```
#[inline]
pub fn bounded_eval(board: Board) -> f64 {
    let empty_ratio = board.count_empty() as f64 / 16.0;
    let max_ratio = board.max_exponent() as f64 / 16.0;
    EMPTY_WEIGHT * empty_ratio + MAX_TILE_WEIGHT * max_ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_stays_in_bounds() {
        let extremes = [
            Board::EMPTY,
            Board::from_raw(u64::MAX),
            Board::from_raw(0x1111_1111_1111_1111),
            Board::EMPTY.with_tile(7, 15),
        ];
        for b in extremes {
            let v = bounded_eval(b);
            assert!((V_MIN..=V_MAX).contains(&v), "{v} out of range for {b:?}");
        }
    }

    #[test]
    fn it_weights_empty_cells_and_max_tile() {
        assert!((bounded_eval(Board::EMPTY) - 0.6).abs() < 1e-12);
        let full_of_twos = Board::from_raw(0x1111_1111_1111_1111);
        assert!((bounded_eval(full_of_twos) - 0.025).abs() < 1e-12);
        let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!((bounded_eval(b) - (0.6 * 14.0 / 16.0 + 0.4 / 16.0)).abs() < 1e-12);
    }
}
