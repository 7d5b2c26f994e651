//! Meld validation and scoring.
//!
//! A meld is a run (consecutive numbers, one color) or a group (one number,
//! distinct colors). Jokers substitute freely, which makes run validation a
//! small search: every candidate start number that could absorb the jokers is
//! tried in ascending order.
//!
//! Scoring reuses the exact resolution that validation found. There is one
//! resolver, [`resolve_run`], and both [`is_valid_run`] and [`set_value`] go
//! through it, so a joker can never be worth one number during validation and
//! another during scoring.

use crate::tile::{Color, Tile, TileKind, MAX_NUMBER};
use serde::{Deserialize, Serialize};

/// Minimum tiles in a playable meld.
pub const MIN_MELD_SIZE: usize = 3;

/// A meld on the board: an ordered sequence of tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meld {
    pub tiles: Vec<Tile>,
}

impl Meld {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// How the jokers in a run were resolved: the run covers
/// `start ..= start + len - 1` in `color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResolution {
    pub color: Color,
    pub start: u8,
    pub len: u8,
}

impl RunResolution {
    pub fn end(&self) -> u8 {
        self.start + self.len - 1
    }

    /// Sum of the resolved sequence, jokers included at their resolved value.
    pub fn value(&self) -> u32 {
        let start = self.start as u32;
        let end = self.end() as u32;
        (start + end) * (end - start + 1) / 2
    }
}

/// Resolve a candidate run, or `None` if the tiles cannot form one.
///
/// All non-joker tiles must share a color; an all-joker sequence is rejected
/// because nothing anchors it to a start number. Candidate starts are searched
/// from `max(1, lowest - jokers)` upward and the first window that contains
/// every number within [1, 13] wins. Order-insensitive.
pub fn resolve_run(tiles: &[Tile]) -> Option<RunResolution> {
    if tiles.len() < MIN_MELD_SIZE {
        return None;
    }

    let mut color: Option<Color> = None;
    let mut nums: Vec<u8> = Vec::with_capacity(tiles.len());
    let mut jokers: u8 = 0;

    for tile in tiles {
        match tile.kind {
            TileKind::Joker => jokers += 1,
            TileKind::Numbered { color: c, number } => {
                match color {
                    None => color = Some(c),
                    Some(existing) if existing != c => return None,
                    Some(_) => {}
                }
                nums.push(number);
            }
        }
    }

    let color = color?;
    nums.sort_unstable();
    if nums.windows(2).any(|w| w[0] == w[1]) {
        // A duplicate number can never fit in one consecutive window.
        return None;
    }

    let len = tiles.len() as u8;
    let lowest = nums[0];
    let highest = nums[nums.len() - 1];

    if jokers == 0 {
        if highest - lowest + 1 == len {
            return Some(RunResolution {
                color,
                start: lowest,
                len,
            });
        }
        return None;
    }

    let min_start = lowest.saturating_sub(jokers).max(1);
    for start in min_start..=lowest {
        let end = start + len - 1;
        if end > MAX_NUMBER {
            continue;
        }
        if highest > end {
            continue;
        }
        // Every number sits inside [start, end] and numbers are distinct, so
        // the gap count is exactly len - nums.len() == jokers.
        return Some(RunResolution { color, start, len });
    }

    None
}

/// Run legality. Delegates entirely to [`resolve_run`].
pub fn is_valid_run(tiles: &[Tile]) -> bool {
    resolve_run(tiles).is_some()
}

/// Group legality: 3-4 tiles of one number in distinct colors, jokers
/// standing in for missing colors. An all-joker group of 3 or 4 is accepted
/// (unlike runs, no anchor is needed to pick a number later).
pub fn is_valid_group(tiles: &[Tile]) -> bool {
    if !(MIN_MELD_SIZE..=4).contains(&tiles.len()) {
        return false;
    }

    let mut jokers: usize = 0;
    let mut number: Option<u8> = None;
    let mut colors_used: u8 = 0;

    for tile in tiles {
        match tile.kind {
            TileKind::Joker => jokers += 1,
            TileKind::Numbered { color, number: n } => {
                match number {
                    None => number = Some(n),
                    Some(existing) if existing != n => return false,
                    Some(_) => {}
                }
                if colors_used & color.bit() != 0 {
                    return false;
                }
                colors_used |= color.bit();
            }
        }
    }

    match number {
        None => true, // all jokers, size already constrained to 3-4
        Some(_) => {
            let used = colors_used.count_ones() as usize;
            4 - used >= jokers
        }
    }
}

/// A meld is playable when it has at least 3 tiles and is a run or a group.
pub fn is_valid_set(tiles: &[Tile]) -> bool {
    tiles.len() >= MIN_MELD_SIZE && (is_valid_run(tiles) || is_valid_group(tiles))
}

/// Point value of a valid meld, or `None` if the tiles are not a valid set.
///
/// Runs are scored from the same resolution validation found; groups score
/// the shared number times the tile count, jokers inheriting that number.
/// An all-joker group has no anchor number and scores 0.
pub fn set_value(tiles: &[Tile]) -> Option<u32> {
    if tiles.len() < MIN_MELD_SIZE {
        return None;
    }

    if let Some(resolution) = resolve_run(tiles) {
        return Some(resolution.value());
    }

    if is_valid_group(tiles) {
        let number = tiles.iter().find_map(|t| t.number()).unwrap_or(0);
        return Some(number as u32 * tiles.len() as u32);
    }

    None
}
