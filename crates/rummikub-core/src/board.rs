//! The shared board: an ordered list of melds plus snapshot support.
//!
//! A deep copy of the board is taken at the start of every turn. The snapshot
//! is what strict validation, undo and timeout recovery all diff against.

use crate::meld::{is_valid_set, Meld, MIN_MELD_SIZE};
use crate::tile::{Tile, TileId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Index of a meld on the board.
pub type SetIndex = usize;

/// Validation mode for the working board.
///
/// During a turn the player may leave 1-2 tile fragments lying around while
/// rearranging (`Lenient`); committing the turn requires every meld to be a
/// complete valid set (`Strict`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub melds: Vec<Meld>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every tile currently on the board.
    pub fn tile_ids(&self) -> HashSet<TileId> {
        self.melds
            .iter()
            .flat_map(|m| m.tiles.iter().map(|t| t.id))
            .collect()
    }

    /// All tiles on the board, in meld order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.melds.iter().flat_map(|m| m.tiles.iter())
    }

    /// Check every meld, returning the index of the first offender.
    pub fn validate(&self, mode: ValidationMode) -> Result<(), SetIndex> {
        for (index, meld) in self.melds.iter().enumerate() {
            let ok = match mode {
                ValidationMode::Strict => is_valid_set(&meld.tiles),
                // Fragments below meld size are tolerated mid-turn; anything
                // meld-sized must already be legal.
                ValidationMode::Lenient => {
                    meld.len() < MIN_MELD_SIZE || is_valid_set(&meld.tiles)
                }
            };
            if !ok {
                return Err(index);
            }
        }
        Ok(())
    }

    /// Deep copy for the turn-start snapshot.
    pub fn snapshot(&self) -> Board {
        self.clone()
    }

    /// Tiles present here but absent from `other`, by id.
    pub fn tiles_not_in(&self, other: &Board) -> Vec<Tile> {
        let other_ids = other.tile_ids();
        self.tiles()
            .filter(|t| !other_ids.contains(&t.id))
            .copied()
            .collect()
    }
}
