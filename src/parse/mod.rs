pub mod classify;
pub mod machine;
pub mod markup;

pub use classify::{LineClassifier, StockClassifier};
pub use machine::EventParser;
pub use markup::extract_target;
