//! fray: combat event extraction for semi-structured game-feed text.
//!
//! A bounded-lookahead state machine turns ordered batches of feed lines
//! into discrete combat events (attacks, damage, crits, statuses, UCS
//! signals) and applies them to per-creature state, driven at scale by a
//! fixed-capacity dispatcher. See DESIGN.md for the concurrency and
//! chunk-boundary contract.

pub mod dispatch;
pub mod event;
pub mod parse;
pub mod settings;
pub mod track;

pub use dispatch::{
    run_pipeline, ChunkDispatcher, DispatcherStats, WorkerStats, WorkerToken, DEFAULT_CAPACITY,
};
pub use event::{
    serialize_events_json, AttackStart, CombatEvent, CriticalHit, StatusAction, StatusChange,
    TargetIdentity, UcsKind, UcsSignal,
};
pub use parse::{extract_target, EventParser, LineClassifier, StockClassifier};
pub use settings::{Settings, SettingsSnapshot, TrackerSettings};
pub use track::{
    canonical_location, BodyPart, Creature, CreatureRegistry, CreatureRoster, CreatureState,
    EventApplier,
};
