use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All directions, in the fixed order used by the search engines.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Lowercase token for this direction (`"up"`, `"down"`, `"left"`, `"right"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        }
    }

    /// Position of this direction inside [`Move::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Move::Up => 0,
            Move::Down => 1,
            Move::Left => 2,
            Move::Right => 3,
        }
    }

    /// Inverse of [`Move::index`].
    #[inline]
    pub fn from_index(idx: usize) -> Option<Move> {
        Move::ALL.get(idx).copied()
    }

    #[inline]
    pub fn is_vertical(self) -> bool {
        matches!(self, Move::Up | Move::Down)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a direction token is not one of `up`, `down`, `left`, `right`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown direction {0:?} (expected up, down, left or right)")]
pub struct ParseMoveError(pub String);

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Move::Up),
            "down" => Ok(Move::Down),
            "left" => Ok(Move::Left),
            "right" => Ok(Move::Right),
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit rows

/// Highest exponent a nibble can hold (tile 32768).
pub const MAX_EXPONENT: u8 = 15;

type BoardRaw = u64;
type Row = u16;
type Score = u64;

/// Precomputed results of sliding every possible 16-bit row.
///
/// Built once per process and read-only afterwards, so any number of
/// searches can share it without locking.
pub struct RowTables {
    row_left: Box<[Row]>,
    row_right: Box<[Row]>,
    row_score: Box<[u32]>,
}

impl RowTables {
    /// Compute all three tables. Prefer [`row_tables`], which builds them once.
    pub fn build() -> Self {
        // Allocate on the heap to avoid large stack frames
        let mut row_left = vec![0 as Row; LINE_TABLE_SIZE];
        let mut row_right = vec![0 as Row; LINE_TABLE_SIZE];
        let mut row_score = vec![0u32; LINE_TABLE_SIZE];

        for val in 0..LINE_TABLE_SIZE {
            let row = val as Row;
            let (left, score) = merge_row_left(row);
            row_left[val] = left;
            row_score[val] = score;
            row_right[val] = reverse_row(merge_row_left(reverse_row(row)).0);
        }

        RowTables {
            row_left: row_left.into_boxed_slice(),
            row_right: row_right.into_boxed_slice(),
            row_score: row_score.into_boxed_slice(),
        }
    }

    /// Row after compressing and merging toward nibble 0.
    #[inline]
    pub fn left(&self, row: Row) -> Row {
        lookup(&self.row_left, row)
    }

    /// Mirror image of [`RowTables::left`].
    #[inline]
    pub fn right(&self, row: Row) -> Row {
        lookup(&self.row_right, row)
    }

    /// Score gained by merging `row` (sum of 2^exponent over created tiles).
    #[inline]
    pub fn score(&self, row: Row) -> u32 {
        lookup(&self.row_score, row)
    }
}

#[inline(always)]
fn lookup<T: Copy>(table: &[T], idx: Row) -> T {
    debug_assert_eq!(table.len(), LINE_TABLE_SIZE);
    // Every table holds exactly one entry per possible u16.
    unsafe { *table.get_unchecked(idx as usize) }
}

static ROW_TABLES: OnceLock<RowTables> = OnceLock::new();

/// Initialize the row tables. Safe to call multiple times; board operations
/// also initialize them lazily on first use.
pub fn new() {
    let _ = row_tables();
}

/// Shared, process-wide row tables.
#[inline(always)]
pub fn row_tables() -> &'static RowTables {
    ROW_TABLES.get_or_init(RowTables::build)
}

/// Compress a row toward nibble 0 and merge each equal adjacent pair once.
fn merge_row_left(row: Row) -> (Row, u32) {
    let mut tiles = [0 as Row; 4];
    let mut len = 0;
    for i in 0..4 {
        let tile = (row >> (4 * i)) & 0xf;
        if tile != 0 {
            tiles[len] = tile;
            len += 1;
        }
    }

    let mut merged = [0 as Row; 4];
    let mut score = 0u32;
    let mut write = 0;
    let mut i = 0;
    while i < len {
        if i + 1 < len && tiles[i] == tiles[i + 1] {
            let exponent = tiles[i] + 1;
            score += 1 << exponent;
            // Two 32768 tiles saturate instead of overflowing the nibble
            merged[write] = exponent.min(MAX_EXPONENT as Row);
            i += 2;
        } else {
            merged[write] = tiles[i];
            i += 1;
        }
        write += 1;
    }

    let packed = merged[0] | (merged[1] << 4) | (merged[2] << 8) | (merged[3] << 12);
    (packed, score)
}

/// Reverse the nibble order of a row.
#[inline]
pub fn reverse_row(row: Row) -> Row {
    (row >> 12) | ((row >> 4) & 0x00f0) | ((row << 4) & 0x0f00) | (row << 12)
}

// Credit to Nneonneo
/// Swap rows and columns of a packed board.
#[inline]
pub fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

#[inline(always)]
fn extract_row(board: BoardRaw, row_idx: usize) -> Row {
    ((board >> (16 * row_idx)) & 0xffff) as Row
}

/// Result of sliding a board in one direction, without spawning a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub board: Board,
    pub score_gain: Score,
    pub moved: bool,
}

/// Packed 4x4 2048 board as 16 4-bit exponents in a `u64`.
///
/// Cell `i` (row-major, `0..16`) lives in bits `4*i..4*i+4`, so row `r`
/// occupies bits `16*r..16*r+16` with column 0 in its lowest nibble.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self {
        Board(raw)
    }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw {
        self.0
    }

    /// The raw packed `u64`, used for hashing and for external consumers.
    #[inline]
    pub fn raw(&self) -> BoardRaw {
        self.0
    }

    /// Build a board from 16 row-major exponents. Values above 15 are masked.
    ///
    /// ```
    /// use bepp_2048::engine::Board;
    /// let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn from_exponents(exponents: [u8; 16]) -> Self {
        let raw = exponents
            .iter()
            .enumerate()
            .fold(0u64, |acc, (idx, &e)| acc | (((e & 0xf) as u64) << (4 * idx)));
        Board(raw)
    }

    /// The 16 row-major exponents.
    pub fn exponents(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = self.exponent(idx);
        }
        out
    }

    /// Exponent stored at row-major index `idx` (0 when empty).
    #[inline]
    pub fn exponent(self, idx: usize) -> u8 {
        ((self.0 >> (4 * idx)) & 0xf) as u8
    }

    /// Tile value at `idx`: 0 when empty, otherwise 2^exponent.
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        match self.exponent(idx) {
            0 => 0,
            e => 1 << e,
        }
    }

    /// Return a copy with the cell at `idx` set to `exponent`.
    #[inline]
    pub fn with_tile(self, idx: usize, exponent: u8) -> Self {
        let shift = 4 * idx;
        Board((self.0 & !(0xf << shift)) | (((exponent & 0xf) as u64) << shift))
    }

    /// Slide/merge tiles in `dir`, reporting the score gained and whether anything changed.
    ///
    /// ```
    /// use bepp_2048::engine::{Board, Move};
    /// let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// let out = b.apply(Move::Left);
    /// assert!(out.moved);
    /// assert_eq!(out.score_gain, 4);
    /// assert_eq!(out.board.exponent(0), 2);
    /// ```
    #[inline]
    pub fn apply(self, dir: Move) -> MoveOutcome {
        let tables = row_tables();
        let vertical = dir.is_vertical();
        let src = if vertical { transpose(self.0) } else { self.0 };
        let mut res = 0u64;
        let mut score_gain: Score = 0;
        for row_idx in 0..4 {
            let row = extract_row(src, row_idx);
            let new_row = match dir {
                Move::Left | Move::Up => tables.left(row),
                Move::Right | Move::Down => tables.right(row),
            };
            score_gain += tables.score(row) as Score;
            res |= (new_row as u64) << (16 * row_idx);
        }
        let moved = res != src;
        let board = if vertical { transpose(res) } else { res };
        MoveOutcome { board: Board(board), score_gain, moved }
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    #[inline]
    pub fn shift(self, dir: Move) -> Self {
        self.apply(dir).board
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot.
    ///
    /// A full board is returned unchanged.
    ///
    /// ```
    /// use bepp_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        spawn_tile(self, rng)
    }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        let out = self.apply(dir);
        if out.moved {
            out.board.with_random_tile(rng)
        } else {
            self
        }
    }

    /// True if some direction would change the board: an empty cell or two
    /// equal neighbours exist.
    #[inline]
    pub fn can_move(self) -> bool {
        self.count_empty() > 0 || has_adjacent_pair(self.0) || has_adjacent_pair(transpose(self.0))
    }

    /// Return true if no legal moves remain.
    #[inline]
    pub fn is_game_over(self) -> bool {
        !self.can_move()
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 {
        16 - count_non_empty(self.0)
    }

    /// Row-major indices of the empty cells.
    pub fn empty_cells(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |&idx| self.exponent(idx) == 0)
    }

    /// Largest exponent on the board (0 for an empty board).
    pub fn max_exponent(self) -> u8 {
        (0..16).map(|idx| self.exponent(idx)).max().unwrap_or(0)
    }

    /// Return the highest tile value (e.g., 2048) present on the board, 0 if empty.
    #[inline]
    pub fn highest_tile(self) -> u32 {
        match self.max_exponent() {
            0 => 0,
            e => 1 << e,
        }
    }

    /// Move-predictor input: `[empty_count, tile_value_0, ..., tile_value_15]`.
    ///
    /// ```
    /// use bepp_2048::engine::Board;
    /// let b = Board::from_exponents([1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 11]);
    /// let f = b.features();
    /// assert_eq!(f[0], 14);
    /// assert_eq!(f[1], 2);
    /// assert_eq!(f[16], 2048);
    /// ```
    pub fn features(self) -> [u32; 17] {
        let mut out = [0u32; 17];
        out[0] = self.count_empty();
        for idx in 0..16 {
            out[idx + 1] = self.tile_value(idx);
        }
        out
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = "+-------".repeat(4) + "+";
        writeln!(f, "{sep}")?;
        for row in 0..4 {
            f.write_str("|")?;
            for col in 0..4 {
                match self.tile_value(row * 4 + col) {
                    0 => write!(f, "{:>7}|", ".")?,
                    v => write!(f, "{v:>7}|")?,
                }
            }
            writeln!(f)?;
            writeln!(f, "{sep}")?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board {
    fn from(v: BoardRaw) -> Self {
        Board::from_raw(v)
    }
}

impl From<Board> for BoardRaw {
    fn from(b: Board) -> Self {
        b.into_raw()
    }
}

/// Place a 2 (exponent 1, 90%) or 4 (exponent 2, 10%) on a uniformly chosen empty cell.
pub fn spawn_tile<R: Rng + ?Sized>(board: Board, rng: &mut R) -> Board {
    let empty = board.count_empty() as usize;
    if empty == 0 {
        return board;
    }
    let pick = rng.gen_range(0..empty);
    match board.empty_cells().nth(pick) {
        Some(idx) => board.with_tile(idx, generate_random_tile(rng)),
        None => board,
    }
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    if rng.gen_range(0..10) < 9 {
        1
    } else {
        2
    }
}

fn has_adjacent_pair(raw: BoardRaw) -> bool {
    (0..4).any(|row_idx| {
        let row = extract_row(raw, row_idx);
        (0..3).any(|col| {
            let a = (row >> (4 * col)) & 0xf;
            let b = (row >> (4 * (col + 1))) & 0xf;
            a == b
        })
    })
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(raw: BoardRaw) -> u32 {
    let mut x = raw;
    x |= x >> 1;
    x |= x >> 2;
    x &= 0x1111111111111111;
    x.count_ones()
}
