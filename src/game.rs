//! A single game of 2048: board, cumulative score and terminal flags.

use rand::Rng;

use crate::engine::{Board, Move, ParseMoveError};

/// Exponent of the winning tile (2048).
pub const WIN_EXPONENT: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Game {
    board: Board,
    score: u64,
    over: bool,
    won: bool,
}

impl Game {
    /// New game with two random tiles on distinct cells.
    ///
    /// ```
    /// use bepp_2048::game::Game;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let g = Game::new(&mut StdRng::seed_from_u64(7));
    /// assert_eq!(g.board().count_empty(), 14);
    /// assert_eq!(g.score(), 0);
    /// ```
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let board = Board::EMPTY.with_random_tile(rng).with_random_tile(rng);
        Self::from_board(board)
    }

    /// Resume from an arbitrary position with a zero score.
    pub fn from_board(board: Board) -> Self {
        let mut game = Self { board, score: 0, over: false, won: false };
        game.refresh_flags();
        game
    }

    #[inline]
    pub fn board(&self) -> Board {
        self.board
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.score
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.over
    }

    #[inline]
    pub fn is_won(&self) -> bool {
        self.won
    }

    /// Move-predictor input for the current board.
    #[inline]
    pub fn features(&self) -> [u32; 17] {
        self.board.features()
    }

    /// Slide the board in `dir`, returning `(moved, score_gain)`.
    ///
    /// A tile is spawned only when the board changed and `spawn` is set. A
    /// move that changes nothing leaves score and flags untouched.
    pub fn play<R: Rng + ?Sized>(&mut self, dir: Move, spawn: bool, rng: &mut R) -> (bool, u64) {
        let out = self.board.apply(dir);
        if !out.moved {
            return (false, 0);
        }
        self.board = if spawn { out.board.with_random_tile(rng) } else { out.board };
        self.score += out.score_gain;
        self.refresh_flags();
        (true, out.score_gain)
    }

    /// Like [`Self::play`] but takes a direction token such as `"left"`.
    ///
    /// Unknown tokens are rejected before the board is touched.
    pub fn play_str<R: Rng + ?Sized>(
        &mut self,
        token: &str,
        spawn: bool,
        rng: &mut R,
    ) -> Result<(bool, u64), ParseMoveError> {
        let dir: Move = token.parse()?;
        Ok(self.play(dir, spawn, rng))
    }

    fn refresh_flags(&mut self) {
        if self.board.max_exponent() >= WIN_EXPONENT {
            self.won = true;
            self.over = true;
        } else if !self.board.can_move() {
            self.over = true;
        }
    }
}
