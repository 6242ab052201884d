//! Creature roster: shared per-creature combat state mutated by the
//! pipeline workers.
//!
//! Each creature guards its own state with a private mutex, so two workers
//! hitting different creatures never contend and two workers hitting the
//! same creature interleave mutations safely (though in unspecified order;
//! cross-chunk ordering is the host's concern, see DESIGN.md).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

/// Canonical wound locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    Head,
    Neck,
    Chest,
    Abdomen,
    Back,
    LeftArm,
    RightArm,
    LeftHand,
    RightHand,
    LeftLeg,
    RightLeg,
    LeftEye,
    RightEye,
    Nerves,
}

/// Mutable combat state for one creature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatureState {
    pub total_damage: u64,
    /// Highest wound rank recorded per location.
    pub wounds: BTreeMap<BodyPart, u32>,
    pub statuses: HashSet<String>,
    pub fatal_crit: bool,
    pub ucs_position: Option<u32>,
    pub ucs_tier: Option<u32>,
    pub smote: bool,
}

/// One creature known to the roster. Identity is immutable; combat state
/// lives behind a per-creature lock.
#[derive(Debug)]
pub struct Creature {
    id: u64,
    name: String,
    state: Mutex<CreatureState>,
}

impl Creature {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: Mutex::new(CreatureState::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the current combat state.
    pub fn state(&self) -> CreatureState {
        self.lock().clone()
    }

    pub fn add_damage(&self, amount: u32) {
        self.lock().total_damage += u64::from(amount);
    }

    /// Record a wound; an existing higher rank at the location wins.
    pub fn add_injury(&self, part: BodyPart, rank: u32) {
        let mut state = self.lock();
        let entry = state.wounds.entry(part).or_insert(0);
        *entry = (*entry).max(rank);
    }

    pub fn mark_fatal_crit(&self) {
        self.lock().fatal_crit = true;
    }

    pub fn add_status(&self, status: &str) {
        self.lock().statuses.insert(status.to_string());
    }

    pub fn remove_status(&self, status: &str) {
        self.lock().statuses.remove(status);
    }

    pub fn set_ucs_position(&self, value: u32) {
        self.lock().ucs_position = Some(value);
    }

    pub fn set_ucs_tierup(&self, value: u32) {
        self.lock().ucs_tier = Some(value);
    }

    pub fn smite(&self) {
        self.lock().smote = true;
    }

    pub fn clear_smote(&self) {
        self.lock().smote = false;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CreatureState> {
        // A poisoned creature lock means a worker panicked mid-mutation;
        // the state itself is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lookup surface the applier depends on.
pub trait CreatureRegistry: Send + Sync {
    fn lookup(&self, id: u64) -> Option<Arc<Creature>>;
    fn creatures(&self) -> Vec<Arc<Creature>>;
}

/// In-memory roster keyed by creature id.
#[derive(Debug, Default)]
pub struct CreatureRoster {
    creatures: RwLock<HashMap<u64, Arc<Creature>>>,
}

impl CreatureRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a creature, returning its handle. Re-adding an id replaces the
    /// previous entry.
    pub fn add(&self, id: u64, name: impl Into<String>) -> Arc<Creature> {
        let creature = Arc::new(Creature::new(id, name));
        self.write().insert(id, Arc::clone(&creature));
        creature
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Creature>> {
        self.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u64, Arc<Creature>>> {
        self.creatures.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u64, Arc<Creature>>> {
        self.creatures.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CreatureRegistry for CreatureRoster {
    fn lookup(&self, id: u64) -> Option<Arc<Creature>> {
        self.read().get(&id).cloned()
    }

    fn creatures(&self) -> Vec<Arc<Creature>> {
        self.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_accumulates() {
        let c = Creature::new(1, "a kobold");
        c.add_damage(10);
        c.add_damage(5);
        assert_eq!(c.state().total_damage, 15);
    }

    #[test]
    fn injury_keeps_highest_rank_per_location() {
        let c = Creature::new(1, "a kobold");
        c.add_injury(BodyPart::LeftArm, 2);
        c.add_injury(BodyPart::LeftArm, 1);
        c.add_injury(BodyPart::Head, 3);
        let state = c.state();
        assert_eq!(state.wounds.get(&BodyPart::LeftArm), Some(&2));
        assert_eq!(state.wounds.get(&BodyPart::Head), Some(&3));
    }

    #[test]
    fn statuses_add_and_remove() {
        let c = Creature::new(1, "a kobold");
        c.add_status("stunned");
        assert!(c.state().statuses.contains("stunned"));
        c.remove_status("stunned");
        assert!(!c.state().statuses.contains("stunned"));
    }

    #[test]
    fn roster_lookup_and_replacement() {
        let roster = CreatureRoster::new();
        roster.add(7, "an orc");
        assert_eq!(roster.lookup(7).map(|c| c.name().to_string()), Some("an orc".into()));
        assert!(roster.lookup(8).is_none());
        roster.add(7, "a bigger orc");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.lookup(7).unwrap().name(), "a bigger orc");
    }
}
