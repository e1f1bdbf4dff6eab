pub mod diversity;
pub mod emotion;
pub mod neighbors;
pub mod orchestrator;
pub mod projection;
pub mod scoring;
pub mod uncertainty;

pub use diversity::DiversitySampler;
pub use emotion::EmotionTuner;
pub use neighbors::NeighborIndex;
pub use orchestrator::{EngineContext, RecommendationOrchestrator};
pub use projection::WarmStartProjector;
pub use scoring::ScoreEngine;
pub use uncertainty::UncertaintyEstimator;
