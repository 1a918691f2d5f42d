#![allow(clippy::too_many_arguments)]

pub mod als;
pub mod artifact;
pub mod common;
pub mod config;
pub mod errors;
pub mod evaluate;
pub mod recommend;
pub mod scorer;
pub mod serialization;
pub mod source;
pub mod sparse;
pub mod store;
pub mod train;

#[cfg(feature = "python")]
mod python;

pub use crate::common::{Mode, Recommendation, RecommendationItem, Target, TrainReport};
pub use crate::config::Settings;
pub use crate::errors::{RecError, RecResult};
pub use crate::recommend::Recommender;
pub use crate::source::{InteractionSource, OrderLog};
pub use crate::store::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};
pub use crate::train::Trainer;
