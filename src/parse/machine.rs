//! Event state machine: one ordered batch of feed lines in, completed
//! combat events out.
//!
//! The machine is re-entrant per batch and keeps no state across batches;
//! an attack whose damage lines land in a different batch is parsed as two
//! incomplete fragments (chunk boundaries are the host's problem, see
//! DESIGN.md). Status and UCS lines are applied immediately through the
//! applier while damage/crit lines accumulate on the open event.

use tracing::debug;

use crate::event::{CombatEvent, CriticalHit};
use crate::parse::classify::LineClassifier;
use crate::parse::markup::extract_target;
use crate::settings::Settings;
use crate::track::apply::EventApplier;

/// How many lines past a damage line we search for its crit description.
const CRIT_LOOKAHEAD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    SeekingAttack,
    SeekingDamage,
}

/// Drives one batch of lines through the two-state parse.
pub struct EventParser<'a> {
    classifier: &'a dyn LineClassifier,
    applier: &'a EventApplier<'a>,
    settings: &'a dyn Settings,
}

impl<'a> EventParser<'a> {
    pub fn new(
        classifier: &'a dyn LineClassifier,
        applier: &'a EventApplier<'a>,
        settings: &'a dyn Settings,
    ) -> Self {
        Self {
            classifier,
            applier,
            settings,
        }
    }

    /// Parse a batch of lines into completed combat events.
    ///
    /// Line order drives event boundaries; every flushed event has already
    /// had its statuses/UCS side effects applied, but damage and crit
    /// persistence is left to the caller.
    pub fn parse(&self, lines: &[String]) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        let mut state = ParseState::SeekingAttack;
        let mut current: Option<CombatEvent> = None;

        let mut i = 0;
        // Set when an implicit attack end re-processes the same line under
        // SeekingAttack rules; the status/UCS/switch checks must not run a
        // second time for that line.
        let mut redo = false;
        while i < lines.len() {
            let line = &lines[i];
            if line.trim().is_empty() {
                i += 1;
                continue;
            }

            if !redo {
                self.check_status(line, current.as_mut());
                self.check_ucs(line, current.as_ref());
                self.check_target_switch(line, state, &mut current, &mut events);
            }
            redo = false;

            match state {
                ParseState::SeekingAttack => {
                    if let Some(attack) = self.classifier.attack_start(line) {
                        if let Some(prev) = current.take() {
                            if prev.target.is_known() && prev.worth_keeping_on_switch() {
                                events.push(prev);
                            }
                        }
                        current = Some(CombatEvent::new(
                            attack.name,
                            attack.target.unwrap_or_default(),
                        ));
                        state = ParseState::SeekingDamage;
                    }
                }
                ParseState::SeekingDamage => {
                    if let Some(amount) = self.classifier.damage_amount(line) {
                        if let Some(ev) = current.as_mut() {
                            ev.damages.push(amount);
                            if self.settings.track_wounds() {
                                if let Some(crit) = self.lookahead_crit(lines, i) {
                                    ev.crits.push(crit);
                                }
                            }
                        }
                    }
                    // An attack line while damage-seeking means the previous
                    // attack ended without any explicit marker.
                    if self.classifier.attack_start(line).is_some() {
                        if let Some(prev) = current.take() {
                            if prev.worth_keeping_on_attack_end() {
                                events.push(prev);
                            }
                        }
                        state = ParseState::SeekingAttack;
                        redo = true;
                        continue;
                    }
                }
            }
            i += 1;
        }

        // End of batch: a known target is enough to keep the open event.
        if let Some(last) = current {
            if last.target.is_known() {
                events.push(last);
            }
        }
        events
    }

    /// Rule 1: status lines apply immediately, attack open or not.
    fn check_status(&self, line: &str, current: Option<&mut CombatEvent>) {
        if !self.settings.track_statuses() {
            return;
        }
        let Some(change) = self.classifier.status_change(line) else {
            return;
        };
        if let Some(target) = extract_target(line) {
            self.applier
                .apply_status(&change.status, None, Some(target.id), change.action);
        } else if let Some(name) = change.target_name.as_deref() {
            self.applier
                .apply_status(&change.status, Some(name), None, change.action);
        } else {
            debug!(status = %change.status, "status line with no resolvable target");
        }
        if let Some(ev) = current {
            ev.statuses.push(change.status);
        }
    }

    /// Rule 2: UCS lines apply immediately, independent of attack state.
    fn check_ucs(&self, line: &str, current: Option<&CombatEvent>) {
        if !self.settings.track_ucs() {
            return;
        }
        if let Some(signal) = self.classifier.ucs_signal(line) {
            let current_target = current
                .map(|ev| ev.target.id)
                .filter(|&id| id != 0);
            self.applier.apply_ucs(&signal, current_target);
        }
    }

    /// Rule 3: once an attack is open, a differently-id'd emphasized link
    /// splits the event (one volley, one event per struck target).
    fn check_target_switch(
        &self,
        line: &str,
        state: ParseState,
        current: &mut Option<CombatEvent>,
        events: &mut Vec<CombatEvent>,
    ) {
        if state == ParseState::SeekingAttack {
            return;
        }
        let Some(found) = extract_target(line) else {
            return;
        };
        let Some(ev) = current.as_mut() else {
            return;
        };
        if !ev.target.is_known() {
            // First-target assignment, not a switch.
            ev.target = found;
            return;
        }
        if ev.target.id == found.id {
            return;
        }
        let attack = ev.attack.clone();
        let prev = std::mem::replace(ev, CombatEvent::new(attack, found));
        if prev.worth_keeping_on_switch() {
            events.push(prev);
        }
    }

    /// Scan up to [CRIT_LOOKAHEAD] lines past a damage line for its crit
    /// description, stopping at the next damage line (that damage belongs
    /// to a different hit). At most one crit is taken.
    fn lookahead_crit(&self, lines: &[String], damage_idx: usize) -> Option<CriticalHit> {
        let window = lines
            .iter()
            .skip(damage_idx + 1)
            .take(CRIT_LOOKAHEAD);
        for line in window {
            if self.classifier.damage_amount(line).is_some() {
                return None;
            }
            if let Some(crit) = self.classifier.critical_hit(line) {
                return Some(crit);
            }
        }
        None
    }
}
