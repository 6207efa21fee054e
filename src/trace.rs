//! Per-move game records and their checksummed binary encoding.
//!
//! Each record pairs the move that was played with a cheap reference search
//! of the same position, which is what a move-predictor is trained on.
//!
//! Layout (little-endian):
//! `magic "B2T1" | version | endian | count u32 | meta_len u16 |
//! postcard(TraceMeta) | count * record | crc32c u32`
//! where each record is
//! `game_id u64 | move_index u32 | score u64 | snapshot u64 | max_tile u32 |
//! empty u8 | chosen u8 | reference u8 | reference_value f64`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{Board, Move};
use crate::expectimax::{bounded_eval, Bepp};
use crate::game::Game;

const MAGIC: &[u8; 4] = b"B2T1";
const VERSION: u8 = 2;
const ENDIAN_LE: u8 = 0;

// 4 magic + 1 version + 1 endian + 4 count + 2 meta_len
const HEADER_LEN: usize = 4 + 1 + 1 + 4 + 2;
const RECORD_LEN: usize = 8 + 4 + 8 + 8 + 4 + 1 + 1 + 1 + 8;

/// Depth and budget of the reference search attached to every record.
pub const REFERENCE_DEPTH: u32 = 2;
pub const REFERENCE_BUDGET: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMeta {
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub engine: Option<String>,
}

impl TraceMeta {
    pub fn started_now(engine: Option<String>) -> Self {
        Self { start_unix_s: now_unix_seconds(), elapsed_s: 0.0, engine }
    }
}

/// One played move.
///
/// `score` is the cumulative score before the move; `snapshot` is the board
/// right after it, before the new tile spawns, and `max_tile`/`empty_count`
/// describe that snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRecord {
    pub game_id: u64,
    pub move_index: u32,
    pub score: u64,
    pub snapshot: Board,
    pub max_tile: u32,
    pub empty_count: u8,
    pub chosen: Move,
    pub reference_move: Move,
    pub reference_value: f64,
}

impl MoveRecord {
    /// Build the record for playing `chosen` in `game`'s current position.
    ///
    /// Runs a [`REFERENCE_DEPTH`] search on the pre-move board with
    /// `reference` and stores the [`bounded_eval`] of that board.
    pub fn capture(reference: &mut Bepp, game_id: u64, move_index: u32, game: &Game, chosen: Move) -> Self {
        let board = game.board();
        let reference_move = reference.best_move(board, REFERENCE_DEPTH, REFERENCE_BUDGET);
        let snapshot = board.shift(chosen);
        MoveRecord {
            game_id,
            move_index,
            score: game.score(),
            snapshot,
            max_tile: snapshot.highest_tile(),
            empty_count: snapshot.count_empty() as u8,
            chosen,
            reference_move,
            reference_value: bounded_eval(board),
        }
    }

    /// Move-predictor input for the snapshot.
    #[inline]
    pub fn features(&self) -> [u32; 17] {
        self.snapshot.features()
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.game_id.to_le_bytes());
        buf.extend_from_slice(&self.move_index.to_le_bytes());
        buf.extend_from_slice(&self.score.to_le_bytes());
        buf.extend_from_slice(&self.snapshot.raw().to_le_bytes());
        buf.extend_from_slice(&self.max_tile.to_le_bytes());
        buf.push(self.empty_count);
        buf.push(self.chosen.index() as u8);
        buf.push(self.reference_move.index() as u8);
        buf.extend_from_slice(&self.reference_value.to_bits().to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, TraceError> {
        let mut r = Reader::new(bytes);
        Ok(MoveRecord {
            game_id: r.u64()?,
            move_index: r.u32()?,
            score: r.u64()?,
            snapshot: Board::from_raw(r.u64()?),
            max_tile: r.u32()?,
            empty_count: r.u8()?,
            chosen: r.direction()?,
            reference_move: r.direction()?,
            reference_value: f64::from_bits(r.u64()?),
        })
    }
}

/// Sink for per-move records.
pub trait MoveLog {
    fn record(&mut self, record: MoveRecord);
}

/// In-memory trace: a header plus every recorded move, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLog {
    pub meta: TraceMeta,
    pub records: Vec<MoveRecord>,
}

impl MoveLog for TraceLog {
    fn record(&mut self, record: MoveRecord) {
        self.records.push(record);
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("unsupported endianness")]
    Endianness,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
    #[error("trace header encoding error: {0}")]
    Meta(#[from] postcard::Error),
    #[error("trace header is {0} bytes, at most 65535 fit")]
    MetaTooLong(usize),
}

impl TraceLog {
    pub fn new(meta: TraceMeta) -> Self {
        Self { meta, records: Vec::new() }
    }

    /// Append all of `other`'s records, e.g. when merging per-game logs.
    pub fn extend(&mut self, other: TraceLog) {
        self.records.extend(other.records);
    }

    pub fn encode(&self) -> Result<Vec<u8>, TraceError> {
        let meta_bytes = postcard::to_allocvec(&self.meta)?;
        let meta_len = u16::try_from(meta_bytes.len()).map_err(|_| TraceError::MetaTooLong(meta_bytes.len()))?;
        let count = u32::try_from(self.records.len()).map_err(|_| TraceError::Malformed)?;

        let mut buf = Vec::with_capacity(HEADER_LEN + meta_bytes.len() + self.records.len() * RECORD_LEN + 4);
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.push(ENDIAN_LE);
        buf.extend_from_slice(&count.to_le_bytes());
        buf.extend_from_slice(&meta_len.to_le_bytes());
        buf.extend_from_slice(&meta_bytes);
        for rec in &self.records {
            rec.encode_into(&mut buf);
        }

        let checksum = crc32c::crc32c(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), TraceError> {
        let data = self.encode()?;
        let mut f = fs::File::create(path)?;
        f.write_all(&data)?;
        Ok(())
    }
}

pub fn parse_trace_bytes(bytes: &[u8]) -> Result<TraceLog, TraceError> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(TraceError::Malformed);
    }

    // Checksum first so the field reads below only see intact data.
    let (content, trailer) = bytes.split_at(bytes.len() - 4);
    let file_crc = Reader::new(trailer).u32()?;
    if file_crc != crc32c::crc32c(content) {
        return Err(TraceError::Checksum);
    }

    if &content[..4] != MAGIC || content[4] != VERSION {
        return Err(TraceError::MagicOrVersion);
    }
    if content[5] != ENDIAN_LE {
        return Err(TraceError::Endianness);
    }

    let mut r = Reader::new(&content[6..]);
    let count = r.u32()? as usize;
    let meta_len = r.u16()? as usize;
    let meta: TraceMeta = postcard::from_bytes(r.take(meta_len)?)?;

    let body_len = count.checked_mul(RECORD_LEN).ok_or(TraceError::Malformed)?;
    let body = r.take(body_len)?;
    if !r.is_empty() {
        return Err(TraceError::Malformed);
    }
    let records = body.chunks_exact(RECORD_LEN).map(MoveRecord::decode).collect::<Result<Vec<_>, _>>()?;

    Ok(TraceLog { meta, records })
}

pub fn parse_trace_file<P: AsRef<Path>>(path: P) -> Result<TraceLog, TraceError> {
    let data = fs::read(path)?;
    parse_trace_bytes(&data)
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Bounds-checked little-endian cursor.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TraceError> {
        if self.bytes.len() < n {
            return Err(TraceError::Malformed);
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TraceError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, TraceError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, TraceError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, TraceError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, TraceError> {
        self.array().map(u64::from_le_bytes)
    }

    fn direction(&mut self) -> Result<Move, TraceError> {
        let idx = self.u8()?;
        Move::from_index(idx as usize).ok_or(TraceError::Malformed)
    }
}
