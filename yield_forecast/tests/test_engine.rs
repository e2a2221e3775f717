use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use yield_forecast::data::add_months;
use yield_forecast::engine::artifact_namespace;
use yield_forecast::synthetic::{seasonal_observations, SeriesShape};
use yield_forecast::{
    Algorithm, ArtifactStore, Catalog, Dataset, ForecastEngine, ForecastError, GridMode,
    MemoryObjectBackend, ModelSelector, ObjectBackend, SqliteCatalog,
};

struct Fixture {
    _cache: TempDir,
    backend: Arc<MemoryObjectBackend>,
    engine: ForecastEngine,
}

fn date(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

async fn fixture() -> Fixture {
    let cache = tempfile::tempdir().unwrap();
    let backend = Arc::new(MemoryObjectBackend::new());
    let store = ArtifactStore::connect(backend.clone(), "algorithm", cache.path())
        .await
        .unwrap();
    let engine = ForecastEngine::new(Arc::new(SqliteCatalog::in_memory().unwrap()), store);

    // 36 months, January 2020 through December 2022
    let mut rows = seasonal_observations("Mango", date(2020, 1), 36, SeriesShape::default(), 11).unwrap();
    rows.extend(
        seasonal_observations(
            "Rice",
            date(2021, 1),
            12,
            SeriesShape {
                base: 40.0,
                ..SeriesShape::default()
            },
            12,
        )
        .unwrap(),
    );
    engine.import(&rows).await.unwrap();

    Fixture {
        _cache: cache,
        backend,
        engine,
    }
}

fn object_name(algorithm: Algorithm, category: &str, id: &str) -> String {
    format!("{}/{}", artifact_namespace(algorithm, category), id)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_train_then_forecast_full_year() {
    let fx = fixture().await;

    let metadata = fx
        .engine
        .train(Algorithm::Sarima, "Mango", Some("analyst"))
        .await
        .unwrap();
    assert_eq!(metadata.last_period, date(2022, 12));
    assert_eq!(metadata.category, "Mango");
    assert!(fx.backend.contains("algorithm", &object_name(Algorithm::Sarima, "Mango", &metadata.id)));

    let result = fx
        .engine
        .predict(Algorithm::Sarima, "Mango", false, Some("analyst"))
        .await
        .unwrap();

    assert_eq!(result.artifact_id, metadata.id);
    assert_eq!(result.last_period, date(2022, 12));
    assert_eq!(result.forecast.len(), 12);
    for (i, period) in result.forecast.periods().iter().enumerate() {
        assert_eq!(*period, add_months(date(2023, 1), i as i32).unwrap());
    }
    assert_eq!(result.reference.first_period(), Some(date(2022, 1)));
    assert_eq!(result.reference.len(), 12);
    assert!(!result.validation.is_empty());
    assert!(result.validation.last_period() <= Some(date(2022, 12)));

    assert_eq!(result.intervals.len(), 12);
    for (interval, point) in result.intervals.iter().zip(result.forecast.points()) {
        assert_eq!(interval.period, point.period);
        assert!(interval.lower <= point.value && point.value <= interval.upper);
    }
    let accuracy = result.accuracy.unwrap();
    assert_eq!(accuracy.count, result.validation.len());
    assert_eq!(result.rows().len(), 12 + result.validation.len() + 12);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_month_decomposition() {
    let fx = fixture().await;
    fx.engine
        .train(Algorithm::Decomposition, "Mango", None)
        .await
        .unwrap();

    let result = fx
        .engine
        .predict(Algorithm::Decomposition, "Mango", true, None)
        .await
        .unwrap();

    assert_eq!(result.forecast.periods(), vec![date(2023, 1)]);
    assert_eq!(result.reference.periods(), vec![date(2022, 1)]);
    assert_eq!(result.validation.len(), 36);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_short_category_is_gap_filled_to_global_range() {
    let fx = fixture().await;

    // Rice only has 2021; the first year is zero-filled
    let metadata = fx
        .engine
        .train(Algorithm::Decomposition, "Rice", None)
        .await
        .unwrap();
    assert_eq!(metadata.last_period, date(2022, 12));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_predict_before_train_is_not_trained() {
    let fx = fixture().await;

    let err = fx
        .engine
        .predict(Algorithm::Sarima, "Mango", false, None)
        .await
        .unwrap_err();
    assert!(err.is_not_trained(), "{:?}", err);
    assert!(!err.is_artifact_unavailable());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deleted_metadata_is_not_trained() {
    let fx = fixture().await;
    let metadata = fx.engine.train(Algorithm::Sarima, "Mango", None).await.unwrap();

    fx.engine.catalog().delete_artifact(&metadata.id).await.unwrap();

    let err = fx
        .engine
        .predict(Algorithm::Sarima, "Mango", false, None)
        .await
        .unwrap_err();
    assert!(err.is_not_trained(), "{:?}", err);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deleted_blob_is_artifact_unavailable() {
    let fx = fixture().await;
    let metadata = fx.engine.train(Algorithm::Sarima, "Mango", None).await.unwrap();

    assert!(fx
        .backend
        .remove_object("algorithm", &object_name(Algorithm::Sarima, "Mango", &metadata.id))
        .await
        .unwrap());

    match fx.engine.predict(Algorithm::Sarima, "Mango", false, None).await {
        Err(ForecastError::ArtifactUnavailable { artifact_id, .. }) => {
            assert_eq!(artifact_id, metadata.id)
        }
        other => panic!("expected ArtifactUnavailable, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_corrupt_blob_is_artifact_unavailable() {
    let fx = fixture().await;
    let metadata = fx
        .engine
        .train(Algorithm::Decomposition, "Mango", None)
        .await
        .unwrap();

    fx.engine
        .store()
        .put(
            &artifact_namespace(Algorithm::Decomposition, "Mango"),
            &metadata.id,
            b"not a model".to_vec(),
        )
        .await
        .unwrap();

    let err = fx
        .engine
        .predict(Algorithm::Decomposition, "Mango", false, None)
        .await
        .unwrap_err();
    assert!(err.is_artifact_unavailable(), "{:?}", err);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retraining_evicts_previous_artifact() {
    let fx = fixture().await;

    let first = fx.engine.train(Algorithm::Sarima, "Mango", None).await.unwrap();
    fx.engine
        .train(Algorithm::Decomposition, "Mango", None)
        .await
        .unwrap();
    let second = fx.engine.train(Algorithm::Sarima, "Mango", None).await.unwrap();

    assert_ne!(first.id, second.id);
    let live = fx.engine.check(Algorithm::Sarima, "Mango").await.unwrap();
    assert_eq!(live, Some(second.clone()));
    assert_eq!(
        fx.engine
            .catalog()
            .find_artifacts(Algorithm::Sarima, "Mango")
            .await
            .unwrap()
            .len(),
        1
    );

    // One blob per (algorithm, category) pair
    assert_eq!(fx.backend.len(), 2);
    assert!(!fx
        .backend
        .contains("algorithm", &object_name(Algorithm::Sarima, "Mango", &first.id)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_eviction_tolerates_missing_blob() {
    let fx = fixture().await;
    let first = fx.engine.train(Algorithm::Sarima, "Mango", None).await.unwrap();
    fx.backend
        .remove_object("algorithm", &object_name(Algorithm::Sarima, "Mango", &first.id))
        .await
        .unwrap();

    let second = fx.engine.train(Algorithm::Sarima, "Mango", None).await.unwrap();
    assert!(fx
        .engine
        .predict(Algorithm::Sarima, "Mango", false, None)
        .await
        .is_ok());
    assert_eq!(fx.engine.check(Algorithm::Sarima, "Mango").await.unwrap(), Some(second));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_category_is_aggregation_empty() {
    let fx = fixture().await;

    let err = fx
        .engine
        .train(Algorithm::Sarima, "Wheat", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::AggregationEmpty(ref c) if c == "Wheat"));
    assert!(fx.backend.is_empty());
    assert_eq!(fx.engine.check(Algorithm::Sarima, "Wheat").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_leaves_nothing_behind() {
    let fx = fixture().await;
    let engine = fx
        .engine
        .clone()
        .with_selector(ModelSelector::new(GridMode::Full))
        .with_train_timeout(Some(Duration::from_millis(1)));

    let err = engine.train(Algorithm::Sarima, "Mango", None).await.unwrap_err();
    assert!(matches!(err, ForecastError::TrainingTimedOut(_)), "{:?}", err);
    assert!(fx.backend.is_empty());
    assert_eq!(engine.check(Algorithm::Sarima, "Mango").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dataset_views() {
    let fx = fixture().await;

    match fx.engine.dataset(Some("Rice"), false).await.unwrap() {
        Dataset::Daily(rows) => {
            assert_eq!(rows.len(), 12 * SeriesShape::default().samples_per_month);
            assert!(rows.iter().all(|r| r.category == "Rice" && r.uid.is_some()));
        }
        other => panic!("expected daily rows, got {:?}", other),
    }

    match fx.engine.dataset(Some("Rice"), true).await.unwrap() {
        Dataset::Monthly(rows) => {
            assert_eq!(rows.len(), 12);
            assert_eq!(rows[0].period, date(2021, 1));
        }
        other => panic!("expected monthly rows, got {:?}", other),
    }

    assert!(fx.engine.dataset(Some("Wheat"), true).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_closed_engine_fails() {
    let fx = fixture().await;
    fx.engine.close().await.unwrap();

    assert!(matches!(
        fx.engine.train(Algorithm::Sarima, "Mango", None).await,
        Err(ForecastError::Catalog(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unaddressable_category_fails_before_fitting() {
    let fx = fixture().await;
    // Full grid with a tight deadline: reaching the fit would time out instead
    let engine = fx
        .engine
        .clone()
        .with_selector(ModelSelector::new(GridMode::Full))
        .with_train_timeout(Some(Duration::from_millis(1)));

    for category in [".", "Mango/../Rice", "Mango//Rice"] {
        let rows = seasonal_observations(category, date(2020, 1), 36, SeriesShape::default(), 3)
            .unwrap();
        engine.import(&rows).await.unwrap();

        let err = engine
            .train(Algorithm::Sarima, category, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ForecastError::InvalidResource(_)),
            "{}: {:?}",
            category,
            err
        );
    }
    assert!(fx.backend.is_empty());
}
