//! Line classification: raw feed line -> structured combat fact.
//!
//! The event state machine only depends on the [LineClassifier] trait; the
//! stock feed format ships with [StockClassifier]. Every method is a pure
//! function of the line text, so the machine is free to ask several
//! questions about the same line (status, UCS, attack, damage) without
//! worrying about ordering or side effects.

use regex::Regex;

use crate::event::{AttackStart, CriticalHit, StatusAction, StatusChange, UcsKind, UcsSignal};
use crate::parse::markup::extract_target;

/// Per-line classification questions the event state machine asks.
///
/// A `None` answer is an expected miss, not an error. Implementations must
/// be idempotent per line and side-effect free.
pub trait LineClassifier: Send + Sync {
    fn attack_start(&self, line: &str) -> Option<AttackStart>;
    fn damage_amount(&self, line: &str) -> Option<u32>;
    fn status_change(&self, line: &str) -> Option<StatusChange>;
    fn ucs_signal(&self, line: &str) -> Option<UcsSignal>;
    fn critical_hit(&self, line: &str) -> Option<CriticalHit>;
}

/// Regex classifier for the stock feed format.
///
/// Recognized shapes (markup stripped before matching where noted):
/// - attack:   `You launch a quickstrike at <b><a ...>a kobold</a></b>!`
/// - damage:   `... and hit for 15 points of damage!`
/// - crit:     `** Slash to the left arm! Crit rank 5, wound rank 2. **`
///             (optional trailing `A killing blow!` marks a fatal crit)
/// - status:   `A scarred kobold is stunned!` / `... is no longer stunned.`
/// - UCS:      position, tier-up, and smite lines (see the patterns below)
pub struct StockClassifier {
    attack: Regex,
    damage: Regex,
    crit: Regex,
    status_add: Regex,
    status_remove: Regex,
    ucs_position: Regex,
    ucs_tier_up: Regex,
    ucs_smite_on: Regex,
    ucs_smite_off: Regex,
    tag: Regex,
}

impl StockClassifier {
    pub fn new() -> Self {
        Self {
            attack: Regex::new(r"^You launch (?:a|an) (?P<name>[a-z][a-z -]*?) at (?P<rest>.+)!$")
                .expect("attack pattern"),
            damage: Regex::new(r"\.\.\. and hit for (?P<amount>\d+) points? of damage!")
                .expect("damage pattern"),
            crit: Regex::new(
                r"^\s*\*\* (?P<hit>[A-Z][a-z]+) (?:to|through) the (?P<loc>[a-z. ]+?)! Crit rank (?P<rank>\d+)(?:, wound rank (?P<wound>\d+))?\.(?P<fatal> A killing blow!)? \*\*$",
            )
            .expect("crit pattern"),
            status_add: Regex::new(r"^(?P<who>[A-Z].*?) is (?:now )?(?P<status>[a-z]+)[.!]$")
                .expect("status add pattern"),
            status_remove: Regex::new(r"^(?P<who>[A-Z].*?) is no longer (?P<status>[a-z]+)[.!]$")
                .expect("status remove pattern"),
            ucs_position: Regex::new(r"^You are in (?:a |an )?(?P<pos>poor|decent|good|excellent) position")
                .expect("position pattern"),
            ucs_tier_up: Regex::new(r"You seize the advantage(?: against (?P<rest>.+?))?, moving to tier (?P<tier>\d+)!")
                .expect("tier-up pattern"),
            ucs_smite_on: Regex::new(r"^Divine power surges through your strikes!")
                .expect("smite-on pattern"),
            ucs_smite_off: Regex::new(r"^The divine surge fades\.")
                .expect("smite-off pattern"),
            tag: Regex::new(r"<[^>]+>").expect("tag pattern"),
        }
    }

    /// Drop markup tags so display text matches the prose patterns.
    fn strip_tags(&self, line: &str) -> String {
        self.tag.replace_all(line, "").into_owned()
    }
}

impl Default for StockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn position_value(pos: &str) -> u32 {
    match pos {
        "poor" => 0,
        "decent" => 1,
        "good" => 2,
        _ => 3,
    }
}

impl LineClassifier for StockClassifier {
    fn attack_start(&self, line: &str) -> Option<AttackStart> {
        let plain = self.strip_tags(line);
        let caps = self.attack.captures(&plain)?;
        Some(AttackStart {
            name: caps["name"].to_string(),
            target: extract_target(line),
        })
    }

    fn damage_amount(&self, line: &str) -> Option<u32> {
        let caps = self.damage.captures(line)?;
        caps["amount"].parse().ok()
    }

    fn status_change(&self, line: &str) -> Option<StatusChange> {
        let plain = self.strip_tags(line);
        // "no longer" also matches the add pattern, so check removal first.
        if let Some(caps) = self.status_remove.captures(&plain) {
            return Some(StatusChange {
                status: caps["status"].to_string(),
                action: StatusAction::Remove,
                target_name: Some(caps["who"].to_string()),
            });
        }
        let caps = self.status_add.captures(&plain)?;
        Some(StatusChange {
            status: caps["status"].to_string(),
            action: StatusAction::Add,
            target_name: Some(caps["who"].to_string()),
        })
    }

    fn ucs_signal(&self, line: &str) -> Option<UcsSignal> {
        let target_id = extract_target(line).map(|t| t.id);
        let plain = self.strip_tags(line);
        if let Some(caps) = self.ucs_position.captures(&plain) {
            return Some(UcsSignal {
                kind: UcsKind::Position,
                value: Some(position_value(&caps["pos"])),
                target_id,
            });
        }
        if let Some(caps) = self.ucs_tier_up.captures(&plain) {
            return Some(UcsSignal {
                kind: UcsKind::TierUp,
                value: caps["tier"].parse().ok(),
                target_id,
            });
        }
        if self.ucs_smite_on.is_match(&plain) {
            return Some(UcsSignal {
                kind: UcsKind::SmiteOn,
                value: None,
                target_id,
            });
        }
        if self.ucs_smite_off.is_match(&plain) {
            return Some(UcsSignal {
                kind: UcsKind::SmiteOff,
                value: None,
                target_id,
            });
        }
        None
    }

    fn critical_hit(&self, line: &str) -> Option<CriticalHit> {
        let caps = self.crit.captures(line)?;
        let wound_rank = caps
            .name("wound")
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|&w| w > 0);
        Some(CriticalHit {
            hit_type: caps["hit"].to_string(),
            location: caps["loc"].trim().to_string(),
            rank: caps["rank"].parse().ok()?,
            wound_rank,
            fatal: caps.name("fatal").is_some(),
        })
    }
}
