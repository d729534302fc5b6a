//! Value source: the engine's only view of the live client

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::PlayerSession;

/// Reads current values from the client.
///
/// Implementations must be cheap to query; the snapshot builder calls them
/// once per tracked field every tick.
pub trait ValueSource: Send + Sync {
    /// The logged-in player, or `None` unless the client is fully logged in
    fn active_session(&self) -> Option<PlayerSession>;

    /// Raw value of a varp
    fn varp(&self, id: i32) -> Option<i32>;

    /// Bit layout of a varbit, if the client knows it
    fn varbit_composition(&self, id: i32) -> Option<VarbitComposition>;

    /// Real (unboosted) level of a skill
    fn skill_level(&self, skill: Skill) -> Option<i32>;
}

/// Location of a varbit inside its backing varp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarbitComposition {
    /// Backing varp id
    pub index: i32,
    /// Least significant bit
    pub lsb: u32,
    /// Most significant bit
    pub msb: u32,
}

impl VarbitComposition {
    pub fn new(index: i32, lsb: u32, msb: u32) -> Self {
        Self { index, lsb, msb }
    }

    /// Extract this varbit's bits from the backing varp value
    pub fn extract(&self, raw: i32) -> i32 {
        let width = self.msb.saturating_sub(self.lsb) + 1;
        let mask = if width >= 32 {
            u32::MAX
        } else {
            (1u32 << width) - 1
        };
        let shifted = (raw as u32).checked_shr(self.lsb).unwrap_or(0);
        (shifted & mask) as i32
    }
}

/// Derived fields recorded with every snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Attack,
    Defence,
    Strength,
    Hitpoints,
    Ranged,
    Prayer,
    Magic,
    Cooking,
    Woodcutting,
    Fletching,
    Fishing,
    Firemaking,
    Crafting,
    Smithing,
    Mining,
    Herblore,
    Agility,
    Thieving,
    Slayer,
    Farming,
    Runecraft,
    Hunter,
    Construction,
}

impl Skill {
    pub const ALL: [Skill; 23] = [
        Skill::Attack,
        Skill::Defence,
        Skill::Strength,
        Skill::Hitpoints,
        Skill::Ranged,
        Skill::Prayer,
        Skill::Magic,
        Skill::Cooking,
        Skill::Woodcutting,
        Skill::Fletching,
        Skill::Fishing,
        Skill::Firemaking,
        Skill::Crafting,
        Skill::Smithing,
        Skill::Mining,
        Skill::Herblore,
        Skill::Agility,
        Skill::Thieving,
        Skill::Slayer,
        Skill::Farming,
        Skill::Runecraft,
        Skill::Hunter,
        Skill::Construction,
    ];

    /// Display name, used as the `level` key
    pub fn name(self) -> &'static str {
        match self {
            Skill::Attack => "Attack",
            Skill::Defence => "Defence",
            Skill::Strength => "Strength",
            Skill::Hitpoints => "Hitpoints",
            Skill::Ranged => "Ranged",
            Skill::Prayer => "Prayer",
            Skill::Magic => "Magic",
            Skill::Cooking => "Cooking",
            Skill::Woodcutting => "Woodcutting",
            Skill::Fletching => "Fletching",
            Skill::Fishing => "Fishing",
            Skill::Firemaking => "Firemaking",
            Skill::Crafting => "Crafting",
            Skill::Smithing => "Smithing",
            Skill::Mining => "Mining",
            Skill::Herblore => "Herblore",
            Skill::Agility => "Agility",
            Skill::Thieving => "Thieving",
            Skill::Slayer => "Slayer",
            Skill::Farming => "Farming",
            Skill::Runecraft => "Runecraft",
            Skill::Hunter => "Hunter",
            Skill::Construction => "Construction",
        }
    }

    pub fn from_name(name: &str) -> Option<Skill> {
        Skill::ALL
            .iter()
            .copied()
            .find(|skill| skill.name().eq_ignore_ascii_case(name))
    }
}

/// In-memory client state.
///
/// Deserializes from JSON such as
/// `{"session": {...}, "varps": {"101": 5}, "varbits": {"4": {"index": 101, "lsb": 0, "msb": 3}}, "levels": {"Attack": 99}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticValueSource {
    pub session: Option<PlayerSession>,
    pub varps: HashMap<i32, i32>,
    pub varbits: HashMap<i32, VarbitComposition>,
    pub levels: HashMap<String, i32>,
}

impl StaticValueSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: PlayerSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_varp(mut self, id: i32, value: i32) -> Self {
        self.varps.insert(id, value);
        self
    }

    pub fn with_varbit(mut self, id: i32, composition: VarbitComposition) -> Self {
        self.varbits.insert(id, composition);
        self
    }

    pub fn with_level(mut self, skill: Skill, level: i32) -> Self {
        self.levels.insert(skill.name().to_string(), level);
        self
    }

    pub fn set_varp(&mut self, id: i32, value: i32) {
        self.varps.insert(id, value);
    }

    pub fn set_level(&mut self, skill: Skill, level: i32) {
        self.levels.insert(skill.name().to_string(), level);
    }

    pub fn logout(&mut self) {
        self.session = None;
    }
}

impl ValueSource for StaticValueSource {
    fn active_session(&self) -> Option<PlayerSession> {
        self.session.clone()
    }

    fn varp(&self, id: i32) -> Option<i32> {
        self.varps.get(&id).copied()
    }

    fn varbit_composition(&self, id: i32) -> Option<VarbitComposition> {
        self.varbits.get(&id).copied()
    }

    fn skill_level(&self, skill: Skill) -> Option<i32> {
        self.levels.get(skill.name()).copied()
    }
}
