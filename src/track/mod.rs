pub mod apply;
pub mod registry;

pub use apply::{canonical_location, EventApplier};
pub use registry::{BodyPart, Creature, CreatureRegistry, CreatureRoster, CreatureState};
