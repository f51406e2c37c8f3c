//! Schedule trees: construction, transformation, and candidate collection.

pub mod build;
pub mod simd;
pub mod tile;
pub mod tree;

pub use build::{arrange_fissioned, arrange_fused, build_multiband};
pub use simd::collect_vectorization_candidates;
pub use tile::tile_band;
pub use tree::{BandMember, Schedule, ScheduleNode};
