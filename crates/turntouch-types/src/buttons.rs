//! Button-state decoding for the Turn Touch notify characteristic.
//!
//! The remote pushes a status byte whenever the set of held buttons changes.
//! A button is reported as held via a **0** bit (active-low); only the low
//! four bits carry direction state. Press and release events are derived by
//! comparing the decoded mask against the previous snapshot.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// One of the four directional buttons on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
    North,
    East,
    West,
    South,
}

impl Direction {
    /// All directions, in the order events are emitted.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::West,
        Direction::South,
    ];

    /// The bit assigned to this direction in the decoded status mask.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Direction::North => 1 << 0,
            Direction::East => 1 << 1,
            Direction::West => 1 << 2,
            Direction::South => 1 << 3,
        }
    }

    /// Lowercase name, suitable for topic segments and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::West => "west",
            Direction::South => "south",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of directions, backed by the same bit layout as [`ButtonState`].
///
/// Iteration yields directions in the fixed north, east, west, south order
/// regardless of insertion order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    /// The empty set.
    pub const EMPTY: DirectionSet = DirectionSet(0);

    /// Build a set from a raw status mask; bits above the low four are dropped.
    #[must_use]
    pub const fn from_bits(mask: u8) -> Self {
        Self(mask & 0x0F)
    }

    /// The raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether `direction` is in the set.
    #[must_use]
    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Add a direction to the set.
    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of directions in the set.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate in the fixed north, east, west, south order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl fmt::Debug for DirectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for direction in self.iter() {
            set.entry(&format_args!("{direction}"));
        }
        set.finish()
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for direction in iter {
            set.insert(direction);
        }
        set
    }
}

/// Snapshot of which buttons are held, one bit per direction, active-high
/// after decoding.
///
/// A session stores the snapshot from the previous notification so edges can
/// be derived; the `Default` value means "no buttons held".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState(u8);

impl ButtonState {
    /// The all-released state.
    pub const RELEASED: ButtonState = ButtonState(0);

    /// The raw (decoded, active-high) mask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Directions currently held in this snapshot.
    #[must_use]
    pub const fn held(self) -> DirectionSet {
        DirectionSet::from_bits(self.0)
    }
}

/// Result of decoding one button-status payload against the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonChange {
    /// Directions held after this notification.
    pub held: DirectionSet,
    /// Directions that transitioned released -> held.
    pub newly_pressed: DirectionSet,
    /// Directions that transitioned held -> released.
    pub newly_released: DirectionSet,
    /// Snapshot to store as `previous` for the next decode.
    pub state: ButtonState,
}

/// Decode a button-status payload.
///
/// Only the low byte is significant; legacy firmware appends a second byte
/// carrying hold patterns, which the edge model ignores. A repeated identical
/// payload decodes to empty `newly_pressed` / `newly_released` sets.
///
/// Fails with [`ParseError::InvalidPayload`] on an empty payload.
pub fn decode_buttons(payload: &[u8], previous: ButtonState) -> ParseResult<ButtonChange> {
    let low = *payload
        .first()
        .ok_or_else(|| ParseError::invalid_payload("button status payload is empty"))?;

    // Active-low on the wire: invert, then keep the four direction bits.
    let mask = !low & 0x0F;
    let prev = previous.bits();

    Ok(ButtonChange {
        held: DirectionSet::from_bits(mask),
        newly_pressed: DirectionSet::from_bits(mask & !prev),
        newly_released: DirectionSet::from_bits(prev & !mask),
        state: ButtonState(mask),
    })
}
