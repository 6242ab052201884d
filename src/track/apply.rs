//! Event applier: forwards parsed events and signals to the creature
//! roster.
//!
//! Nothing here returns an error. A batch must survive any single bad
//! line or missing creature, so every failure path is a debug log and a
//! skip (unresolved targets, unmapped crit locations, ambiguous status
//! names).

use tracing::debug;

use crate::event::{CombatEvent, StatusAction, UcsKind, UcsSignal};
use crate::settings::Settings;
use crate::track::registry::{BodyPart, CreatureRegistry};

/// Applies completed events and immediate signals against the roster.
pub struct EventApplier<'a> {
    registry: &'a dyn CreatureRegistry,
    settings: &'a dyn Settings,
}

impl<'a> EventApplier<'a> {
    pub fn new(registry: &'a dyn CreatureRegistry, settings: &'a dyn Settings) -> Self {
        Self { registry, settings }
    }

    /// Apply one completed event: damage totals, wounds, fatal crits.
    pub fn persist(&self, event: &CombatEvent) {
        let Some(creature) = self.registry.lookup(event.target.id) else {
            debug!(
                target_id = event.target.id,
                attack = %event.attack,
                "event target not in roster, dropping"
            );
            return;
        };

        let mut total: u64 = 0;
        for &amount in &event.damages {
            creature.add_damage(amount);
            total += u64::from(amount);
        }

        for crit in &event.crits {
            if self.settings.track_wounds() {
                match crit.wound_rank {
                    Some(rank) if rank > 0 => match canonical_location(&crit.location) {
                        Some(part) => creature.add_injury(part, rank),
                        None => {
                            debug!(location = %crit.location, "unmapped crit location, skipping wound");
                        }
                    },
                    _ => {}
                }
            }
            // Fatal crits are instant death, recorded even with no wound.
            if crit.fatal {
                creature.mark_fatal_crit();
            }
        }

        if self.settings.debug_enabled() {
            debug!(
                target_id = event.target.id,
                attack = %event.attack,
                hits = event.damages.len(),
                total_damage = total,
                crits = event.crits.len(),
                "event persisted"
            );
        }
    }

    /// Apply a UCS signal. Only `TierUp` may fall back to the current
    /// combat target; everything else needs an explicit id.
    pub fn apply_ucs(&self, signal: &UcsSignal, current_target: Option<u64>) {
        let id = match signal.kind {
            UcsKind::TierUp => signal.target_id.or(current_target),
            _ => signal.target_id,
        };
        let Some(id) = id else {
            debug!(kind = ?signal.kind, "UCS signal with no target, dropping");
            return;
        };
        let Some(creature) = self.registry.lookup(id) else {
            debug!(kind = ?signal.kind, target_id = id, "UCS target not in roster, dropping");
            return;
        };
        match signal.kind {
            UcsKind::Position => {
                if let Some(value) = signal.value {
                    creature.set_ucs_position(value);
                }
            }
            UcsKind::TierUp => {
                if let Some(value) = signal.value {
                    creature.set_ucs_tierup(value);
                }
            }
            UcsKind::SmiteOn => creature.smite(),
            UcsKind::SmiteOff => creature.clear_smote(),
        }
    }

    /// Apply a status change, by exact id when known, otherwise by a
    /// case-insensitive substring match over roster names. An ambiguous
    /// name (two or more candidates) is dropped, never guessed.
    pub fn apply_status(
        &self,
        status: &str,
        name: Option<&str>,
        id: Option<u64>,
        action: StatusAction,
    ) {
        let creature = match (id, name) {
            (Some(id), _) => {
                let found = self.registry.lookup(id);
                if found.is_none() {
                    debug!(target_id = id, %status, "status target not in roster, dropping");
                }
                found
            }
            (None, Some(name)) => {
                let needle = name.to_lowercase();
                let mut candidates = self
                    .registry
                    .creatures()
                    .into_iter()
                    .filter(|c| c.name().to_lowercase().contains(&needle));
                match (candidates.next(), candidates.next()) {
                    (Some(only), None) => Some(only),
                    (Some(_), Some(_)) => {
                        debug!(%name, %status, "ambiguous status target, dropping");
                        None
                    }
                    (None, _) => {
                        debug!(%name, %status, "no roster match for status target");
                        None
                    }
                }
            }
            (None, None) => None,
        };
        let Some(creature) = creature else {
            return;
        };
        match action {
            StatusAction::Add => creature.add_status(status),
            StatusAction::Remove => creature.remove_status(status),
        }
    }
}

/// Fold a free-text crit location into the canonical body-part vocabulary:
/// lowercase, strip everything but letters, then match known names and
/// common abbreviations ("l.arm", "larm", "nsys", ...).
pub fn canonical_location(raw: &str) -> Option<BodyPart> {
    let folded: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let part = match folded.as_str() {
        "head" => BodyPart::Head,
        "neck" => BodyPart::Neck,
        "chest" => BodyPart::Chest,
        "abdomen" | "stomach" => BodyPart::Abdomen,
        "back" => BodyPart::Back,
        "leftarm" | "larm" => BodyPart::LeftArm,
        "rightarm" | "rarm" => BodyPart::RightArm,
        "lefthand" | "lhand" => BodyPart::LeftHand,
        "righthand" | "rhand" => BodyPart::RightHand,
        "leftleg" | "lleg" => BodyPart::LeftLeg,
        "rightleg" | "rleg" => BodyPart::RightLeg,
        "lefteye" | "leye" => BodyPart::LeftEye,
        "righteye" | "reye" => BodyPart::RightEye,
        "nerves" | "nervoussystem" | "nsys" => BodyPart::Nerves,
        _ => return None,
    };
    Some(part)
}
