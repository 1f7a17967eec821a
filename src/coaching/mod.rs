//! Coaching trigger engine
//!
//! Scans newly processed transcript text (interim and final) against
//! configured keyword mappings and built-in rules, firing each annotation
//! at most once per session.

mod engine;
mod mappings;

pub use engine::{CoachingEngine, CoachingTip, TipKind};
pub use mappings::{ContentMapping, ImportMode, MappingPack, PACK_TYPE};
