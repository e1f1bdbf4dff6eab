use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recommender_service::assets::format::{write_bincode, write_compressed, write_csv};
use recommender_service::assets::loader::{
    BASELINE_FILE, EMOTIONS_FILE, HISTORY_FILE, MODEL_FILE, POPULARITY_FILE, USER_INDEX_FILE,
    USER_INDEX_MAP_FILE,
};
use recommender_service::assets::{
    BootstrapEnsemble, EmotionColumns, FactorModel, HistoryColumns, ItemBaselineScore,
    ItemPopularity, ModelKind, UserIdMap, EMOTION_WIDTH,
};
use recommender_service::config::{ModelsConfig, TuningConfig};
use recommender_service::models::{
    BaselineSource, ContinuousEmotion, DistanceNorm, DiversityAlgorithm, EmotionInput, EmotionTag, ItemId,
    Rating, RatingInput, RecommendationOutput, RecommendationRequest, RequestParams, StrategyKind,
};
use recommender_service::services::neighbors::{AngularIndex, HnswParams};
use recommender_service::{EngineError, EngineRegistry, LineDriver, ModelSlot, RecommendationOrchestrator};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const N_ITEMS: usize = 30;
const N_USERS: usize = 40;
const DIM: usize = 3;
const LIMIT: usize = 5;

fn item_id(row: usize) -> ItemId {
    100 + row as ItemId
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
}

fn user_ids() -> Vec<String> {
    (0..N_USERS).map(|u| format!("user-{}", u)).collect()
}

fn popularity() -> Vec<ItemPopularity> {
    (0..N_ITEMS)
        .map(|row| ItemPopularity {
            item: item_id(row),
            count: 5 + (row as u64 * 7) % 60,
            rank_popular: (N_ITEMS - row) as u64,
            rank_quality: row as u64 + 1,
        })
        .collect()
}

fn baseline() -> Vec<ItemBaselineScore> {
    (0..N_ITEMS)
        .map(|row| ItemBaselineScore {
            item: item_id(row),
            ave_score: 2.0 + (row % 5) as f64 * 0.6,
            ave_discounted_score: 1.5 + (row % 7) as f64 * 0.4,
        })
        .collect()
}

/// Every user rates roughly half the catalog.
fn history() -> HistoryColumns {
    let mut columns = HistoryColumns {
        users: user_ids(),
        offsets: vec![0],
        items: Vec::new(),
        ratings: Vec::new(),
    };
    for u in 0..N_USERS {
        for row in 0..N_ITEMS {
            if (u * 7 + row * 3) % 2 == 0 {
                columns.items.push(item_id(row));
                columns.ratings.push(1.0 + ((u + row) % 5) as f64);
            }
        }
        columns.offsets.push(columns.items.len() as u64);
    }
    columns
}

fn write_common(folder: &Path, model: &FactorModel) {
    std::fs::create_dir_all(folder).unwrap();
    write_bincode(&folder.join(MODEL_FILE), model).unwrap();
    write_csv(&folder.join(POPULARITY_FILE), &popularity()).unwrap();
    write_csv(&folder.join(BASELINE_FILE), &baseline()).unwrap();
}

fn write_implicit(folder: &Path, rng: &mut StdRng) {
    let item_factors = random_matrix(rng, N_ITEMS, DIM);
    let user_factors = random_matrix(rng, N_USERS, DIM);
    let model = FactorModel {
        kind: ModelKind::Implicit {
            weight: 1.0,
            regularization: 0.1,
        },
        item_ids: (0..N_ITEMS).map(item_id).collect(),
        item_factors: item_factors.clone(),
        user_ids: user_ids(),
        user_factors: Some(user_factors.clone()),
    };
    write_common(folder, &model);
    write_compressed(&folder.join(HISTORY_FILE), &history()).unwrap();

    // persisted index for this slot, the biased slot builds its own
    let index = AngularIndex::build(user_factors.view(), HnswParams::default());
    write_bincode(&folder.join(USER_INDEX_FILE), &index).unwrap();
    write_csv(
        &folder.join(USER_INDEX_MAP_FILE),
        &UserIdMap::from_user_ids(&user_ids()).to_rows(),
    )
    .unwrap();

    for i in 1..=3 {
        let noise = random_matrix(rng, N_ITEMS, DIM) * 0.2;
        let resampled = FactorModel {
            kind: model.kind.clone(),
            item_ids: model.item_ids.clone(),
            item_factors: &item_factors + &noise,
            user_ids: vec![],
            user_factors: None,
        };
        write_bincode(&BootstrapEnsemble::model_path(folder, i), &resampled).unwrap();
    }
}

fn write_biased(folder: &Path, rng: &mut StdRng) {
    let model = FactorModel {
        kind: ModelKind::Biased {
            regularization: 0.1,
            damping: 5.0,
            global_mean: 3.5,
            item_biases: (0..N_ITEMS).map(|_| rng.gen_range(-0.5..0.5)).collect(),
        },
        item_ids: (0..N_ITEMS).map(item_id).collect(),
        item_factors: random_matrix(rng, N_ITEMS, DIM),
        user_ids: user_ids(),
        user_factors: Some(random_matrix(rng, N_USERS, DIM)),
    };
    write_common(folder, &model);
    write_compressed(&folder.join(HISTORY_FILE), &history()).unwrap();
}

fn write_emotion(folder: &Path, rng: &mut StdRng) {
    let model = FactorModel {
        kind: ModelKind::Implicit {
            weight: 1.0,
            regularization: 0.1,
        },
        item_ids: (0..N_ITEMS).map(item_id).collect(),
        item_factors: random_matrix(rng, N_ITEMS, DIM),
        user_ids: vec![],
        user_factors: None,
    };
    write_common(folder, &model);
    let emotions = EmotionColumns {
        items: (0..N_ITEMS).map(item_id).collect(),
        values: (0..N_ITEMS * EMOTION_WIDTH).map(|_| rng.gen_range(0.0..1.0)).collect(),
    };
    write_compressed(&folder.join(EMOTIONS_FILE), &emotions).unwrap();
}

fn models_config(dir: &Path) -> ModelsConfig {
    ModelsConfig {
        models_dir: dir.to_path_buf(),
        ..ModelsConfig::default()
    }
}

fn tuning() -> TuningConfig {
    TuningConfig {
        controversial_neighbors: 10,
        community_search_neighbors: 20,
        advisor_count: 3,
        advisor_pool_size: 15,
        viz_min_rating_count: 5,
        viz_init_sample_size: 12,
        viz_neighbors: 20,
        emotion_item_pool_size: 20,
        emotion_sampling_size: 10,
        ..TuningConfig::default()
    }
}

fn write_all_assets(with_emotions: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    let config = models_config(dir.path());
    let mut rng = StdRng::seed_from_u64(7);
    write_implicit(&dir.path().join(&config.implicit_folder), &mut rng);
    write_biased(&dir.path().join(&config.biased_folder), &mut rng);
    if with_emotions {
        write_emotion(&dir.path().join(&config.emotion_folder), &mut rng);
    }
    dir
}

fn engine(dir: &Path, cache_capacity: usize) -> RecommendationOrchestrator {
    let registry = EngineRegistry::load(&models_config(dir), &tuning());
    RecommendationOrchestrator::new(Arc::new(registry), tuning(), cache_capacity)
}

fn ratings() -> RatingInput {
    RatingInput::new(vec![
        Rating { item_id: 100, rating: 5.0 },
        Rating { item_id: 101, rating: 4.0 },
        Rating { item_id: 102, rating: 4.5 },
        Rating { item_id: 103, rating: 2.0 },
    ])
}

fn request(kind: StrategyKind) -> RecommendationRequest {
    RecommendationRequest::new("newcomer", ratings(), kind).with_limit(LIMIT)
}

fn rated() -> HashSet<ItemId> {
    ratings().rated_items()
}

fn assert_item_list(output: &RecommendationOutput, expect_full: bool) -> Vec<ItemId> {
    let RecommendationOutput::Items(items) = output else {
        panic!("expected an item list, got {:?}", output);
    };
    assert!(items.len() <= LIMIT);
    if expect_full {
        assert_eq!(items.len(), LIMIT);
    }
    let unique: HashSet<&ItemId> = items.iter().collect();
    assert_eq!(unique.len(), items.len());
    assert!(items.iter().all(|item| !rated().contains(item)));
    items.clone()
}

#[test]
fn test_all_slots_load() {
    let dir = write_all_assets(true);
    let registry = EngineRegistry::load(&models_config(dir.path()), &tuning());
    assert_eq!(registry.available(), ModelSlot::ALL.to_vec());
}

#[test]
fn test_implicit_item_strategies() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);

    for kind in [StrategyKind::TopN, StrategyKind::Hate, StrategyKind::Hip] {
        let output = engine.recommend(&request(kind)).unwrap();
        assert_item_list(&output, true);
    }

    let no_clue = engine.recommend(&request(StrategyKind::NoClue)).unwrap();
    assert_item_list(&no_clue, true);

    let controversial = engine.recommend(&request(StrategyKind::Controversial)).unwrap();
    assert_item_list(&controversial, true);
}

#[test]
fn test_hip_prefers_less_exposed_items() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);
    let counts: std::collections::HashMap<ItemId, u64> =
        popularity().into_iter().map(|p| (p.item, p.count)).collect();

    let output = engine.recommend(&request(StrategyKind::Hip)).unwrap();
    let items = assert_item_list(&output, true);
    let item_counts: Vec<u64> = items.iter().map(|item| counts[item]).collect();
    assert!(item_counts.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_community_advisors() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);

    let output = engine.recommend(&request(StrategyKind::PreferenceCommunity)).unwrap();
    let RecommendationOutput::Advisors(advisors) = output else {
        panic!("expected advisors");
    };
    assert_eq!(advisors.len(), 3);
    for (id, profile) in &advisors {
        assert_eq!(id, &profile.neighbor_user_id);
        assert!(id.starts_with("user-"));
        assert_eq!(profile.top_profile_items.len(), LIMIT);
        let pick = profile.sampled_recommendation.expect("advisor pick");
        assert!(!rated().contains(&pick));
    }
}

#[test]
fn test_preference_visualizations() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);

    let baseline = engine.recommend(&request(StrategyKind::PreferenceVizBaseline)).unwrap();
    let RecommendationOutput::Preferences(items) = baseline else {
        panic!("expected preference items");
    };
    assert_eq!(items.len(), LIMIT);
    assert!(items.iter().all(|p| p.user_label == -1 && p.community_label == -1 && p.cluster == -1));
    assert!(items.windows(2).all(|w| w[0].user_score >= w[1].user_score));

    for kind in [StrategyKind::PreferenceVizDiverse, StrategyKind::PreferenceVizReference] {
        let output = engine.recommend(&request(kind)).unwrap();
        let RecommendationOutput::Preferences(items) = output else {
            panic!("expected preference items");
        };
        assert!(!items.is_empty());
        assert!(items.len() <= LIMIT);
        for item in &items {
            assert!((1.0..=5.0).contains(&item.user_score));
            assert!((1.0..=5.0).contains(&item.community_score));
            assert!(item.user_label == 0 || item.user_label == 1);
            assert!(!rated().contains(&item.item_id));
        }
    }
}

#[test]
fn test_viz_diverse_algorithms_and_baselines() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);

    let algorithms = [
        DiversityAlgorithm::Fishnet,
        DiversityAlgorithm::SingleLinkage,
        DiversityAlgorithm::StratifiedSingleLinkage,
        DiversityAlgorithm::FishnetSingleLinkage,
        DiversityAlgorithm::ConvexHull,
        DiversityAlgorithm::Random,
        DiversityAlgorithm::Top,
    ];
    for algorithm in algorithms {
        let req = request(StrategyKind::PreferenceVizDiverse).with_params(RequestParams {
            algorithm: Some(algorithm),
            ..RequestParams::default()
        });
        let output = engine.recommend(&req).unwrap();
        assert!(!output.is_empty(), "{:?} returned nothing", algorithm);
        if algorithm != DiversityAlgorithm::ConvexHull {
            assert!(output.len() <= LIMIT);
        }
    }

    for source in [BaselineSource::NeighborObserved, BaselineSource::NeighborPredicted] {
        let req = request(StrategyKind::PreferenceVizDiverse).with_params(RequestParams {
            baseline: Some(source),
            ..RequestParams::default()
        });
        let output = engine.recommend(&req).unwrap();
        assert!(output.len() <= LIMIT);
    }
}

#[test]
fn test_random_sampling_is_repeatable() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);
    let req = request(StrategyKind::PreferenceVizDiverse).with_params(RequestParams {
        algorithm: Some(DiversityAlgorithm::Random),
        ..RequestParams::default()
    });

    assert_eq!(engine.recommend(&req).unwrap(), engine.recommend(&req).unwrap());
}

#[test]
fn test_emotion_strategies() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);

    for kind in [
        StrategyKind::EmotionTopN,
        StrategyKind::EmotionDiverseN,
        StrategyKind::EmotionTunedTopN,
        StrategyKind::EmotionTunedDiverseN,
    ] {
        let output = engine.recommend(&request(kind)).unwrap();
        assert_item_list(&output, true);
    }

    let tuned = request(StrategyKind::EmotionTunedTopN).with_params(RequestParams {
        emotion_input: Some(EmotionInput::Continuous(vec![
            ContinuousEmotion {
                emotion: EmotionTag::Joy,
                weight: 0.4,
            },
            ContinuousEmotion {
                emotion: EmotionTag::Fear,
                weight: -0.3,
            },
        ])),
        ..RequestParams::default()
    });
    assert_item_list(&engine.recommend(&tuned).unwrap(), true);

    let sqrt_cityblock = request(StrategyKind::EmotionTunedDiverseN).with_params(RequestParams {
        distance_method: Some(DistanceNorm::SqrtL1),
        ..tuned.params.clone()
    });
    assert_item_list(&engine.recommend(&sqrt_cityblock).unwrap(), true);

    let duplicated = request(StrategyKind::EmotionTunedTopN).with_params(RequestParams {
        emotion_input: Some(EmotionInput::Continuous(vec![
            ContinuousEmotion {
                emotion: EmotionTag::Joy,
                weight: 0.4,
            },
            ContinuousEmotion {
                emotion: EmotionTag::Joy,
                weight: 0.1,
            },
        ])),
        ..RequestParams::default()
    });
    assert!(matches!(
        engine.recommend(&duplicated),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn test_missing_emotion_folder_only_disables_emotion_slot() {
    let dir = write_all_assets(false);
    let engine = engine(dir.path(), 0);

    assert!(matches!(
        engine.recommend(&request(StrategyKind::EmotionTopN)),
        Err(EngineError::ServiceUnavailable(_))
    ));
    assert!(engine.recommend(&request(StrategyKind::TopN)).is_ok());
}

#[test]
fn test_unknown_strategy() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);
    let mut req = request(StrategyKind::TopN);
    req.strategy = "most_popular".to_string();

    assert!(matches!(engine.recommend(&req), Err(EngineError::UnknownStrategy(_))));
}

#[test]
fn test_unknown_items_give_empty_output() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 0);
    let req = RecommendationRequest::new(
        "newcomer",
        RatingInput::new(vec![Rating { item_id: 9999, rating: 4.0 }]),
        StrategyKind::PreferenceCommunity,
    );

    let output = engine.recommend(&req).unwrap();
    assert_eq!(output, RecommendationOutput::empty_for(StrategyKind::PreferenceCommunity));
}

#[test]
fn test_repeated_request_served_from_cache() {
    let dir = write_all_assets(true);
    let engine = engine(dir.path(), 16);

    let first = engine.recommend(&request(StrategyKind::TopN)).unwrap();
    let second = engine.recommend(&request(StrategyKind::TopN)).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.cached_results(), 1);

    engine.recommend(&request(StrategyKind::Hate)).unwrap();
    assert_eq!(engine.cached_results(), 2);
}

#[tokio::test]
async fn test_line_driver_round_trip() {
    let dir = write_all_assets(true);
    let driver = LineDriver::new(Arc::new(engine(dir.path(), 0)));
    let line = r#"{"request_id":"r-1","user_id":"newcomer","ratings":[{"item_id":100,"rating":5.0},{"item_id":104,"rating":3.0}],"strategy":"top_n","limit":3}"#;

    let reply: serde_json::Value = serde_json::from_str(&driver.handle_line(line).await).unwrap();
    assert_eq!(reply["request_id"], "r-1");
    assert_eq!(reply["result"]["response_type"], "items");
    assert_eq!(reply["result"]["items"].as_array().map(Vec::len), Some(3));
}
