//! Combat rules
//!
//! Pure functions shared by the battle engine:
//! - Physical and special damage formulas
//! - Type resistance lookup
//! - Level-up thresholds and post-battle experience distribution

use rand::Rng;

use crate::game::creature::CreatureInstance;

/// Smallest damage any attack can deal
pub const MIN_DAMAGE: f64 = 1.0;

/// Fraction of the defender's defense stat subtracted from the attack stat
pub const DEFENSE_FACTOR: f64 = 0.5;

/// Kind of damage applied by an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    Physical,
    Special,
}

impl AttackKind {
    /// Get a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            AttackKind::Physical => "normal",
            AttackKind::Special => "special",
        }
    }
}

/// Both candidate damage values for one attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRoll {
    pub physical: u32,
    pub special: u32,
}

impl DamageRoll {
    /// Compute both damage values for `attacker` hitting `defender`
    pub fn compute(attacker: &CreatureInstance, defender: &CreatureInstance) -> Self {
        Self {
            physical: physical_damage(attacker, defender),
            special: special_damage(attacker, defender),
        }
    }

    /// Pick one of the two values with equal probability
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> (AttackKind, u32) {
        if rng.gen_bool(0.5) {
            (AttackKind::Special, self.special)
        } else {
            (AttackKind::Physical, self.physical)
        }
    }

    /// Damage value for a given attack kind
    pub fn damage(&self, kind: AttackKind) -> u32 {
        match kind {
            AttackKind::Physical => self.physical,
            AttackKind::Special => self.special,
        }
    }
}

/// Truncates toward zero after clamping to the minimum
fn finalize(raw: f64) -> u32 {
    raw.max(MIN_DAMAGE) as u32
}

/// `max(1, attack - 0.5 * defense)`
pub fn physical_damage(attacker: &CreatureInstance, defender: &CreatureInstance) -> u32 {
    let raw = attacker.stats().attack as f64
        - defender.stats().defense as f64 * DEFENSE_FACTOR;
    finalize(raw)
}

/// `max(1, special_attack * resistance - 0.5 * special_defense)`
pub fn special_damage(attacker: &CreatureInstance, defender: &CreatureInstance) -> u32 {
    let resistance = resistance(attacker, defender) as f64;
    let raw = attacker.stats().special_attack as f64 * resistance
        - defender.stats().special_defense as f64 * DEFENSE_FACTOR;
    finalize(raw)
}

/// Strongest multiplier the defender applies to any of the attacker's types.
///
/// Never below 1.0: types the defender resists do not weaken the attack.
pub fn resistance(attacker: &CreatureInstance, defender: &CreatureInstance) -> f32 {
    attacker
        .template
        .types
        .iter()
        .map(|element| defender.template.defenses.multiplier(*element))
        .fold(1.0_f32, f32::max)
}

/// Experience needed at `level` to advance to the next level
pub fn level_up_threshold(level: u32) -> u32 {
    let level = u128::from(level);
    let next = (level + 1).pow(3);
    let threshold = if level <= 1 { next } else { next - level.pow(3) };
    u32::try_from(threshold).unwrap_or(u32::MAX)
}

/// A level gained during experience distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUp {
    pub name: String,
    pub old_level: u32,
    pub new_level: u32,
}

/// Outcome of distributing experience to a winning team
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperienceReport {
    /// Sum of experience over the losing team
    pub total: u32,
    /// Experience granted to each winning creature
    pub per_creature: u32,
    /// Creatures that advanced a level
    pub level_ups: Vec<LevelUp>,
}

/// Award the losing team's experience to the winning team.
///
/// Each winner gets `total / winners.len()` (integer division) and may gain
/// at most one level.
pub fn distribute_experience(
    winners: &mut [CreatureInstance],
    losers: &[CreatureInstance],
) -> ExperienceReport {
    let total = losers
        .iter()
        .fold(0u32, |acc, c| acc.saturating_add(c.experience));
    if winners.is_empty() {
        return ExperienceReport {
            total,
            ..Default::default()
        };
    }

    let per_creature = total / winners.len() as u32;
    let level_ups = winners
        .iter_mut()
        .filter_map(|creature| {
            creature
                .gain_experience(per_creature)
                .map(|(old_level, new_level)| LevelUp {
                    name: creature.name().to_string(),
                    old_level,
                    new_level,
                })
        })
        .collect();

    ExperienceReport {
        total,
        per_creature,
        level_ups,
    }
}
