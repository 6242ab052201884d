//! Combat event data model shared by the parser, applier, and dispatcher.
//!
//! Events are reconstructed per batch from the raw feed; nothing here
//! outlives the batch that produced it except what the applier forwards to
//! the creature roster.

use serde::{Deserialize, Serialize};

/// Identity of a combat target lifted from emphasized link markup.
///
/// An id of 0 means "not yet known" (the feed only ever assigns positive
/// ids); events created from an attack line with no embedded target start
/// out with an unknown target until the first emphasized link appears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentity {
    pub id: u64,
    pub noun: String,
    pub name: String,
}

impl TargetIdentity {
    pub fn new(id: u64, noun: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            noun: noun.into(),
            name: name.into(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.id != 0
    }
}

/// One critical-hit description attached to a damage roll.
///
/// `wound_rank` of `None` (or 0 in the raw feed) means the crit left no
/// lasting wound; that is independent of `fatal`, which marks an
/// instant-kill crit and can be true with no wound at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalHit {
    pub hit_type: String,
    pub location: String,
    pub rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wound_rank: Option<u32>,
    #[serde(default)]
    pub fatal: bool,
}

/// A completed (or in-progress) attack against a single target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    pub attack: String,
    pub target: TargetIdentity,
    pub damages: Vec<u32>,
    pub crits: Vec<CriticalHit>,
    pub statuses: Vec<String>,
}

impl CombatEvent {
    pub fn new(attack: impl Into<String>, target: TargetIdentity) -> Self {
        Self {
            attack: attack.into(),
            target,
            ..Self::default()
        }
    }

    /// Flush condition at a target switch: statuses count.
    pub fn worth_keeping_on_switch(&self) -> bool {
        !self.damages.is_empty() || !self.crits.is_empty() || !self.statuses.is_empty()
    }

    /// Flush condition at an implicit attack end: statuses alone do not count.
    ///
    /// Deliberately different from [worth_keeping_on_switch](Self::worth_keeping_on_switch);
    /// the end-of-batch flush is looser still (target only). See DESIGN.md.
    pub fn worth_keeping_on_attack_end(&self) -> bool {
        !self.damages.is_empty() || !self.crits.is_empty()
    }
}

/// Whether a status is being gained or shed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusAction {
    Add,
    Remove,
}

/// A classified status-change line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: String,
    pub action: StatusAction,
    /// Bare display name from the line, used only when no markup id exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
}

/// A classified attack-start line. The target is present only when the
/// attack phrasing itself embeds emphasized target markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStart {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetIdentity>,
}

/// Kind of UCS (positional/tier/smite) signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UcsKind {
    Position,
    TierUp,
    SmiteOn,
    SmiteOff,
}

/// A UCS subsystem signal, applied immediately on detection rather than
/// collected into a [CombatEvent].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UcsSignal {
    pub kind: UcsKind,
    pub value: Option<u32>,
    pub target_id: Option<u64>,
}

/// Serialize a batch of parsed events as pretty JSON (replay/debug export).
pub fn serialize_events_json(events: &[CombatEvent]) -> Result<String, String> {
    serde_json::to_string_pretty(events).map_err(|e| e.to_string())
}
