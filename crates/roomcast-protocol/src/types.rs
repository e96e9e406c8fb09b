//! Core protocol types: identifiers and the player model.
//!
//! Three identifiers show up everywhere and are easy to mix up, so each
//! one gets its own newtype:
//!
//! - [`PlayerId`] — names one *physical connection's* player. Regenerated
//!   every time a browser connects.
//! - [`SessionId`] — a durable token the browser keeps in local storage.
//!   It survives a dropped connection; the `PlayerId` does not.
//! - [`RoomCode`] — the short human-shareable name of a room.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a player on one specific connection.
///
/// `#[serde(transparent)]` makes this serialize as a bare JSON string,
/// which is what browsers expect in `player.id` and `playerId`.
///
/// `Default` is the empty id; inbound `update_stats` payloads omit `id`
/// and the server stamps the sender's own id over it.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Generates a fresh random id: 32 lowercase hex chars (128 bits).
    pub fn random() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable client-held session token.
///
/// The hub never generates these; the browser does, and presents the same
/// value on every reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the empty token, which means "no session".
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A room's shareable code, e.g. `"AB23CD"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Characters a generated code may contain. `I`, `O`, `0` and `1` are
    /// left out because they are easy to misread when shared aloud.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Length of a generated code.
    pub const LEN: usize = 6;

    /// Draws a random code from [`Self::ALPHABET`].
    ///
    /// Uniqueness is the registry's job; this only draws.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let code = (0..Self::LEN)
            .map(|_| {
                let i = rng.random_range(0..Self::ALPHABET.len());
                char::from(Self::ALPHABET[i])
            })
            .collect();
        Self(code)
    }

    /// Normalizes user input: surrounding whitespace trimmed, letters
    /// upper-cased. Codes are always generated upper-case, so a typed
    /// `"ab23cd"` still finds room `"AB23CD"`.
    pub fn normalized(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomCode {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Stat enums
// ---------------------------------------------------------------------------

/// `#[serde(rename_all = "lowercase")]` matches the browser's string
/// values: `"male"`, `"female"`. Anything else fails to decode and is
/// reported to the sender as malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Race {
    #[default]
    Human,
    Elf,
    Dwarf,
    Halfling,
}

/// A player's class. `"none"` on the wire is [`Class::Classless`], named
/// so it never reads like `Option::None` in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    #[default]
    #[serde(rename = "none")]
    Classless,
    Warrior,
    Wizard,
    Thief,
    Cleric,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One player's published state.
///
/// Field names follow the browser's camelCase (`gearBonus`). `class` is a
/// Rust keyword, hence `class_` renamed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Owner's per-connection id. Omitted by clients on `update_stats`.
    #[serde(default)]
    pub id: PlayerId,
    pub name: String,
    pub level: i32,
    pub gear_bonus: i32,
    pub gender: Gender,
    pub race: Race,
    #[serde(rename = "class")]
    pub class_: Class,
}

impl Player {
    /// Level every fresh player starts at.
    pub const STARTING_LEVEL: i32 = 1;

    /// A freshly joined player: level 1, no gear, default gender, race and
    /// class.
    pub fn starting(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            level: Self::STARTING_LEVEL,
            gear_bonus: 0,
            gender: Gender::default(),
            race: Race::default(),
            class_: Class::default(),
        }
    }

    /// Combat strength. Always derived from level and gear, never stored,
    /// so a client cannot claim an inconsistent value. Both inputs come
    /// straight off the wire, so the sum saturates at the `i32` bounds.
    pub fn power(&self) -> i32 {
        self.level.saturating_add(self.gear_bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_random_is_32_hex_chars() {
        let id = PlayerId::random();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_player_id_random_values_differ() {
        assert_ne!(PlayerId::random(), PlayerId::random());
    }

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_room_code_random_uses_unambiguous_alphabet() {
        for _ in 0..200 {
            let code = RoomCode::random();
            assert_eq!(code.as_str().len(), RoomCode::LEN);
            assert!(
                code.as_str().bytes().all(|b| RoomCode::ALPHABET.contains(&b)),
                "unexpected character in {code}"
            );
            assert!(!code.as_str().contains(['I', 'O', '0', '1']));
        }
    }

    #[test]
    fn test_room_code_normalized_trims_and_uppercases() {
        assert_eq!(RoomCode::normalized("  ab23cd "), RoomCode::from("AB23CD"));
    }

    #[test]
    fn test_player_starting_stats() {
        let p = Player::starting(PlayerId::from("p1"), "Alice");
        assert_eq!(p.level, 1);
        assert_eq!(p.gear_bonus, 0);
        assert_eq!(p.gender, Gender::Male);
        assert_eq!(p.race, Race::Human);
        assert_eq!(p.class_, Class::Classless);
        assert_eq!(p.power(), 1);
    }

    #[test]
    fn test_player_power_is_level_plus_gear() {
        let mut p = Player::starting(PlayerId::from("p1"), "Alice");
        p.level = 4;
        p.gear_bonus = 7;
        assert_eq!(p.power(), 11);
    }

    #[test]
    fn test_player_power_saturates_on_extreme_wire_values() {
        let json = r#"{
            "name": "Max", "level": 2147483647, "gearBonus": 1,
            "gender": "male", "race": "dwarf", "class": "warrior"
        }"#;
        let mut p: Player = serde_json::from_str(json).unwrap();
        assert_eq!(p.power(), i32::MAX);

        p.level = i32::MIN;
        p.gear_bonus = -1;
        assert_eq!(p.power(), i32::MIN);
    }

    #[test]
    fn test_player_json_shape_matches_browser() {
        let p = Player::starting(PlayerId::from("p1"), "Alice");
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": "p1",
                "name": "Alice",
                "level": 1,
                "gearBonus": 0,
                "gender": "male",
                "race": "human",
                "class": "none",
            })
        );
        assert!(json.get("power").is_none(), "power is never transmitted");
    }

    #[test]
    fn test_player_decodes_without_id() {
        let json = r#"{
            "name": "Bob", "level": 3, "gearBonus": 2,
            "gender": "female", "race": "elf", "class": "wizard"
        }"#;
        let p: Player = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, PlayerId::default());
        assert_eq!(p.class_, Class::Wizard);
        assert_eq!(p.race, Race::Elf);
        assert_eq!(p.gender, Gender::Female);
    }

    #[test]
    fn test_player_unknown_race_is_rejected() {
        let json = r#"{
            "name": "Bob", "level": 3, "gearBonus": 2,
            "gender": "male", "race": "orc", "class": "none"
        }"#;
        assert!(serde_json::from_str::<Player>(json).is_err());
    }
}
