pub mod assets;
pub mod config;
pub mod driver;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use assets::{EngineRegistry, ModelAssets, ModelSlot};
pub use config::Config;
pub use driver::LineDriver;
pub use error::{EngineError, Result};
pub use services::{
    DiversitySampler, EmotionTuner, NeighborIndex, RecommendationOrchestrator, ScoreEngine,
    UncertaintyEstimator, WarmStartProjector,
};
