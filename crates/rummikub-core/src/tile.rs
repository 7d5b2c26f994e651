//! Tiles and the 106-tile deck.
//!
//! A tile is either numbered (color + number) or a joker — never partially
//! specified. The tagged union makes the half-initialized joker states that
//! plagued earlier implementations unrepresentable.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Identifies a single physical tile. Ids are assigned once when the deck is
/// built and follow the tile everywhere (deck, hands, board melds).
pub type TileId = u8;

/// Seat index of a player within a game (0-3).
pub type PlayerId = u8;

/// Highest tile number in a standard set.
pub const MAX_NUMBER: u8 = 13;

/// Pip value of a joker when counting a losing hand.
pub const JOKER_PIP_VALUE: u32 = 30;

/// The four tile colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Blue,
    Yellow,
    Black,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Yellow, Color::Black];

    /// Bit for color-set bookkeeping in group validation.
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// What a tile is: a colored number or a joker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    Numbered { color: Color, number: u8 },
    Joker,
}

/// A single tile with its stable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub kind: TileKind,
}

impl Tile {
    pub fn numbered(id: TileId, color: Color, number: u8) -> Self {
        debug_assert!((1..=MAX_NUMBER).contains(&number));
        Self {
            id,
            kind: TileKind::Numbered { color, number },
        }
    }

    pub fn joker(id: TileId) -> Self {
        Self {
            id,
            kind: TileKind::Joker,
        }
    }

    pub fn is_joker(&self) -> bool {
        matches!(self.kind, TileKind::Joker)
    }

    pub fn number(&self) -> Option<u8> {
        match self.kind {
            TileKind::Numbered { number, .. } => Some(number),
            TileKind::Joker => None,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self.kind {
            TileKind::Numbered { color, .. } => Some(color),
            TileKind::Joker => None,
        }
    }

    /// Value of this tile when left in a losing hand at game end.
    pub fn pip_value(&self) -> u32 {
        match self.kind {
            TileKind::Numbered { number, .. } => number as u32,
            TileKind::Joker => JOKER_PIP_VALUE,
        }
    }
}

/// The draw pile. Built once per game, shrinks as tiles are dealt or drawn,
/// never replenished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    tiles: Vec<Tile>,
}

impl Deck {
    /// Build the standard 106-tile deck: two copies of each (color, number)
    /// across 4 colors x 13 numbers, plus two jokers. Unshuffled.
    pub fn standard() -> Self {
        let mut tiles = Vec::with_capacity(106);
        let mut next_id: TileId = 0;

        for _copy in 0..2 {
            for color in Color::ALL {
                for number in 1..=MAX_NUMBER {
                    tiles.push(Tile::numbered(next_id, color, number));
                    next_id += 1;
                }
            }
        }
        tiles.push(Tile::joker(next_id));
        tiles.push(Tile::joker(next_id + 1));

        Self { tiles }
    }

    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.tiles.shuffle(rng);
    }

    /// Take the top tile, or `None` when the deck is exhausted.
    pub fn draw(&mut self) -> Option<Tile> {
        self.tiles.pop()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}
