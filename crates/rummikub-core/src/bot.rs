//! Heuristic move search for bot seats.
//!
//! The strategist is invoked once per scheduled bot turn and returns exactly
//! one action. Search runs in tiers, falling through when a tier finds
//! nothing:
//!
//! 1. complete melds from the hand (runs with joker bridging, groups,
//!    brute-force 3-4 tile scan), picked by difficulty
//! 2. extend an existing board meld by one tile
//! 3. aggressive joker plays after three forced draws in a row
//! 4. draw a tile

use crate::actions::GameAction;
use crate::game::{GameState, INITIAL_PLAY_MINIMUM};
use crate::meld::{is_valid_group, is_valid_set, resolve_run, set_value};
use crate::tile::{Color, PlayerId, Tile, TileId, MAX_NUMBER};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Forced draws before the aggressive tier kicks in.
const AGGRESSIVE_DRAW_THRESHOLD: u32 = 3;

/// Bot difficulty level, expressed as which candidate meld gets picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotDifficulty {
    /// Random among the 3 lowest-value candidates
    Easy,
    /// Random among the top 2 by value
    Medium,
    /// The single highest-value candidate
    Hard,
}

/// A playable meld found in the hand.
#[derive(Debug, Clone)]
struct Candidate {
    tile_ids: Vec<TileId>,
    value: u32,
}

/// A bot seat's decision engine.
pub struct Bot {
    pub player_id: PlayerId,
    pub difficulty: BotDifficulty,
    rng: StdRng,
}

impl Bot {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Decide this turn's single action: a play if any tier finds one,
    /// otherwise a draw.
    pub fn choose_action(&mut self, game: &GameState) -> GameAction {
        let player = match game.get_player(self.player_id) {
            Some(p) => p,
            None => return GameAction::DrawTile,
        };

        // Tier 1: complete melds from the hand.
        let mut candidates = enumerate_hand_melds(&player.hand);
        if !player.has_played_initial {
            candidates.retain(|c| c.value >= INITIAL_PLAY_MINIMUM);
        }
        if let Some(pick) = self.pick_candidate(candidates) {
            return GameAction::PlaySet {
                tile_ids: pick.tile_ids,
                set_index: None,
            };
        }

        // Tier 2: extend a board meld by one tile.
        if player.has_played_initial {
            if let Some((tile_id, set_index)) = find_extension(game, &player.hand) {
                return GameAction::PlaySet {
                    tile_ids: vec![tile_id],
                    set_index: Some(set_index),
                };
            }
        }

        // Tier 3: aggressive joker plays after repeated forced draws.
        if player.consecutive_draws >= AGGRESSIVE_DRAW_THRESHOLD {
            if let Some(action) = self.aggressive_play(game) {
                return action;
            }
        }

        // Tier 4: nothing playable.
        GameAction::DrawTile
    }

    /// Apply the difficulty policy to a candidate list.
    fn pick_candidate(&mut self, mut candidates: Vec<Candidate>) -> Option<Candidate> {
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by_key(|c| c.value);

        match self.difficulty {
            BotDifficulty::Easy => {
                let pool = &candidates[..candidates.len().min(3)];
                pool.choose(&mut self.rng).cloned()
            }
            BotDifficulty::Medium => {
                let start = candidates.len().saturating_sub(2);
                let pool = &candidates[start..];
                pool.choose(&mut self.rng).cloned()
            }
            BotDifficulty::Hard => candidates.pop(),
        }
    }

    /// Escalated search once the bot has been stuck drawing: spend jokers.
    fn aggressive_play(&mut self, game: &GameState) -> Option<GameAction> {
        let player = game.get_player(self.player_id)?;
        let jokers: Vec<Tile> = player.hand.iter().filter(|t| t.is_joker()).copied().collect();
        if jokers.is_empty() {
            return None;
        }
        let needs_initial = !player.has_played_initial;

        // Prefer parking a joker on an existing meld.
        if !needs_initial {
            for (index, meld) in game.board.melds.iter().enumerate() {
                let mut candidate = meld.tiles.clone();
                candidate.push(jokers[0]);
                if is_valid_set(&candidate) {
                    return Some(GameAction::PlaySet {
                        tile_ids: vec![jokers[0].id],
                        set_index: Some(index),
                    });
                }
            }
        }

        let clears_minimum = |tiles: &[Tile]| -> bool {
            !needs_initial || set_value(tiles).unwrap_or(0) >= INITIAL_PLAY_MINIMUM
        };

        // Hand pairs one joker away from a meld: same color two apart, or
        // same number in different colors.
        let numbered: Vec<Tile> = player.hand.iter().filter(|t| !t.is_joker()).copied().collect();
        for (i, &a) in numbered.iter().enumerate() {
            for &b in &numbered[i + 1..] {
                let bridged_run = a.color() == b.color()
                    && a.number()
                        .zip(b.number())
                        .is_some_and(|(x, y)| x.abs_diff(y) == 2);
                let split_group = a.number() == b.number() && a.color() != b.color();
                if !bridged_run && !split_group {
                    continue;
                }
                let tiles = [a, b, jokers[0]];
                if is_valid_set(&tiles) && clears_minimum(&tiles) {
                    return Some(GameAction::PlaySet {
                        tile_ids: vec![a.id, b.id, jokers[0].id],
                        set_index: None,
                    });
                }
            }
        }

        // Last resort: burn both jokers around a single tile.
        if jokers.len() >= 2 {
            for &tile in &numbered {
                let tiles = [tile, jokers[0], jokers[1]];
                if is_valid_set(&tiles) && clears_minimum(&tiles) {
                    return Some(GameAction::PlaySet {
                        tile_ids: vec![tile.id, jokers[0].id, jokers[1].id],
                        set_index: None,
                    });
                }
            }
        }

        None
    }
}

/// Enumerate every distinct playable meld in a hand: per-color runs with
/// joker bridging, per-number groups, and a brute-force scan over all 3- and
/// 4-tile combinations. Deduplicated by tile-id set.
fn enumerate_hand_melds(hand: &[Tile]) -> Vec<Candidate> {
    let mut seen: HashSet<Vec<TileId>> = HashSet::new();
    let mut candidates = Vec::new();

    let mut push = |tiles: &[Tile]| {
        if let Some(value) = set_value(tiles) {
            let mut key: Vec<TileId> = tiles.iter().map(|t| t.id).collect();
            key.sort_unstable();
            if seen.insert(key.clone()) {
                candidates.push(Candidate {
                    tile_ids: tiles.iter().map(|t| t.id).collect(),
                    value,
                });
            }
        }
    };

    let jokers: Vec<Tile> = hand.iter().filter(|t| t.is_joker()).copied().collect();
    let numbered: Vec<Tile> = hand.iter().filter(|t| !t.is_joker()).copied().collect();

    // Per-color runs, bridging gaps with jokers as they come up.
    for color in Color::ALL {
        let mut by_number: BTreeMap<u8, Tile> = BTreeMap::new();
        for &tile in &numbered {
            if tile.color() == Some(color) {
                by_number.entry(tile.number().unwrap_or(0)).or_insert(tile);
            }
        }

        for (&start, &first) in &by_number {
            let mut sequence = vec![first];
            let mut jokers_used = 0;
            let mut next = start + 1;
            while next <= MAX_NUMBER {
                if let Some(&tile) = by_number.get(&next) {
                    sequence.push(tile);
                } else if jokers_used < jokers.len() {
                    sequence.push(jokers[jokers_used]);
                    jokers_used += 1;
                } else {
                    break;
                }
                if sequence.len() >= 3 {
                    push(&sequence);
                }
                next += 1;
            }
        }
    }

    // Per-number groups: distinct colors, topped up with jokers.
    for number in 1..=MAX_NUMBER {
        let mut by_color: BTreeMap<u8, Tile> = BTreeMap::new();
        for &tile in &numbered {
            if tile.number() == Some(number) {
                by_color.entry(tile.color().map_or(0, |c| c as u8)).or_insert(tile);
            }
        }
        let distinct: Vec<Tile> = by_color.into_values().collect();
        for take_jokers in 0..=jokers.len().min(2) {
            let mut tiles = distinct.clone();
            tiles.extend_from_slice(&jokers[..take_jokers]);
            if tiles.len() >= 3 {
                push(&tiles[..tiles.len().min(4)]);
            }
        }
    }

    // Brute force over all 3- and 4-tile combinations.
    let n = hand.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let trio = [hand[i], hand[j], hand[k]];
                push(&trio);
                for l in (k + 1)..n {
                    let quad = [hand[i], hand[j], hand[k], hand[l]];
                    push(&quad);
                }
            }
        }
    }

    candidates
}

/// Find one hand tile that legally extends a board meld: a non-joker
/// appended or prepended to a run, or any tile added to a group of three.
fn find_extension(game: &GameState, hand: &[Tile]) -> Option<(TileId, usize)> {
    for (index, meld) in game.board.melds.iter().enumerate() {
        if let Some(run) = resolve_run(&meld.tiles) {
            for tile in hand.iter().filter(|t| !t.is_joker()) {
                if tile.color() != Some(run.color) {
                    continue;
                }
                let number = tile.number().unwrap_or(0);
                let extends_low = run.start > 1 && number == run.start - 1;
                let extends_high = run.end() < MAX_NUMBER && number == run.end() + 1;
                if extends_low || extends_high {
                    return Some((tile.id, index));
                }
            }
        } else if is_valid_group(&meld.tiles) && meld.len() < 4 {
            for tile in hand {
                let mut candidate = meld.tiles.clone();
                candidate.push(*tile);
                if is_valid_group(&candidate) {
                    return Some((tile.id, index));
                }
            }
        }
    }
    None
}
