//! Creature module
//!
//! Defines the creature data model:
//! - Element types and per-element resistance tables
//! - Immutable catalog templates (loaded from the legacy JSON format)
//! - Owned creature instances with their own level, experience and HP

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combat;

/// Elemental type of a creature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ElementType {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl ElementType {
    /// Get all element types
    pub fn all() -> &'static [ElementType] {
        &[
            ElementType::Normal,
            ElementType::Fire,
            ElementType::Water,
            ElementType::Electric,
            ElementType::Grass,
            ElementType::Ice,
            ElementType::Fighting,
            ElementType::Poison,
            ElementType::Ground,
            ElementType::Flying,
            ElementType::Psychic,
            ElementType::Bug,
            ElementType::Rock,
            ElementType::Ghost,
            ElementType::Dragon,
            ElementType::Dark,
            ElementType::Steel,
            ElementType::Fairy,
        ]
    }

    /// Get the element name
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Normal => "Normal",
            ElementType::Fire => "Fire",
            ElementType::Water => "Water",
            ElementType::Electric => "Electric",
            ElementType::Grass => "Grass",
            ElementType::Ice => "Ice",
            ElementType::Fighting => "Fighting",
            ElementType::Poison => "Poison",
            ElementType::Ground => "Ground",
            ElementType::Flying => "Flying",
            ElementType::Psychic => "Psychic",
            ElementType::Bug => "Bug",
            ElementType::Rock => "Rock",
            ElementType::Ghost => "Ghost",
            ElementType::Dragon => "Dragon",
            ElementType::Dark => "Dark",
            ElementType::Steel => "Steel",
            ElementType::Fairy => "Fairy",
        }
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ElementType::all()
            .iter()
            .copied()
            .find(|element| element.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown element type: {}", trimmed))
    }
}

impl TryFrom<String> for ElementType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElementType> for String {
    fn from(element: ElementType) -> Self {
        element.name().to_string()
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base battle statistics of a creature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    #[serde(rename = "HP")]
    pub hp: u32,
    #[serde(rename = "ATK")]
    pub attack: u32,
    #[serde(rename = "DEF")]
    pub defense: u32,
    #[serde(rename = "Sp.Atk")]
    pub special_attack: u32,
    #[serde(rename = "Sp.Def")]
    pub special_defense: u32,
    #[serde(rename = "Speed")]
    pub speed: u32,
}

/// Resistance multipliers a creature applies to incoming elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeDefenses(HashMap<ElementType, f32>);

impl TypeDefenses {
    /// Create an empty table (every element counts as 1.0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the multiplier for an element
    pub fn with(mut self, element: ElementType, multiplier: f32) -> Self {
        self.0.insert(element, multiplier);
        self
    }

    /// Multiplier applied to attacks of the given element
    pub fn multiplier(&self, element: ElementType) -> f32 {
        self.0.get(&element).copied().unwrap_or(1.0)
    }
}

/// Legacy on-disk layout of a catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTemplate {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Level", default = "default_level")]
    level: u32,
    #[serde(rename = "Exp", default)]
    experience: u32,
    #[serde(rename = "types", default)]
    types: Vec<ElementType>,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    link: Option<String>,
    #[serde(rename = "Poke-Information")]
    info: RawInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawInfo {
    #[serde(flatten)]
    stats: BaseStats,
    #[serde(rename = "Type-Defenses", default)]
    defenses: TypeDefenses,
}

fn default_level() -> u32 {
    1
}

/// Immutable creature definition from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTemplate", into = "RawTemplate")]
pub struct CreatureTemplate {
    /// Catalog identifier (e.g. `#0001`)
    pub id: String,
    /// Display name
    pub name: String,
    /// Catalog level
    pub level: u32,
    /// Catalog experience
    pub experience: u32,
    /// Elemental types, in catalog order
    pub types: Vec<ElementType>,
    /// Optional reference link
    pub link: Option<String>,
    /// Base statistics
    pub stats: BaseStats,
    /// Resistance table
    pub defenses: TypeDefenses,
}

impl From<RawTemplate> for CreatureTemplate {
    fn from(raw: RawTemplate) -> Self {
        Self {
            id: raw.id.trim().to_string(),
            name: raw.name.replace('\n', "").trim().to_string(),
            level: raw.level,
            experience: raw.experience,
            types: raw.types,
            link: raw.link,
            stats: raw.info.stats,
            defenses: raw.info.defenses,
        }
    }
}

impl From<CreatureTemplate> for RawTemplate {
    fn from(template: CreatureTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name,
            level: template.level,
            experience: template.experience,
            types: template.types,
            link: template.link,
            info: RawInfo {
                stats: template.stats,
                defenses: template.defenses,
            },
        }
    }
}

impl CreatureTemplate {
    /// Create a new template with default stats
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level: 1,
            experience: 0,
            types: Vec::new(),
            link: None,
            stats: BaseStats::default(),
            defenses: TypeDefenses::new(),
        }
    }

    // Builder methods

    /// Set base stats
    pub fn stats(mut self, stats: BaseStats) -> Self {
        self.stats = stats;
        self
    }

    /// Set elemental types
    pub fn types(mut self, types: Vec<ElementType>) -> Self {
        self.types = types;
        self
    }

    /// Set the resistance table
    pub fn defenses(mut self, defenses: TypeDefenses) -> Self {
        self.defenses = defenses;
        self
    }

    /// Set catalog experience
    pub fn experience(mut self, experience: u32) -> Self {
        self.experience = experience;
        self
    }

    /// Instantiate this template for a player at the given level
    pub fn instantiate(&self, level: u32) -> CreatureInstance {
        CreatureInstance::new(self.clone(), level)
    }
}

/// A creature owned by a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureInstance {
    /// Unique instance identifier
    #[serde(default = "Uuid::new_v4")]
    pub uid: Uuid,
    /// Catalog data this instance was created from
    pub template: CreatureTemplate,
    /// Current level
    pub level: u32,
    /// Accumulated experience
    pub experience: u32,
    /// Current hit points, within `[0, template.stats.hp]`
    pub current_hp: u32,
}

impl CreatureInstance {
    /// Create a new instance at full health
    pub fn new(template: CreatureTemplate, level: u32) -> Self {
        Self {
            uid: Uuid::new_v4(),
            level: level.max(1),
            experience: template.experience,
            current_hp: template.stats.hp,
            template,
        }
    }

    /// Catalog identifier
    pub fn id(&self) -> &str {
        &self.template.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Base statistics
    pub fn stats(&self) -> &BaseStats {
        &self.template.stats
    }

    /// Maximum hit points
    pub fn max_hp(&self) -> u32 {
        self.template.stats.hp
    }

    /// Whether this creature has fainted
    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    /// Subtract damage, flooring HP at zero. Returns the remaining HP.
    pub fn apply_damage(&mut self, damage: u32) -> u32 {
        self.current_hp = self.current_hp.saturating_sub(damage).min(self.max_hp());
        self.current_hp
    }

    /// Restore to full health
    pub fn heal(&mut self) {
        self.current_hp = self.max_hp();
    }

    /// Add experience, advancing at most one level.
    ///
    /// Returns `(old_level, new_level)` when a level was gained.
    pub fn gain_experience(&mut self, amount: u32) -> Option<(u32, u32)> {
        self.experience = self.experience.saturating_add(amount);
        if self.level < u32::MAX && self.experience >= combat::level_up_threshold(self.level) {
            let old_level = self.level;
            self.level += 1;
            Some((old_level, self.level))
        } else {
            None
        }
    }
}
