use chrono::NaiveDate;
use tempfile::tempdir;
use yield_forecast::{
    Algorithm, ArtifactMetadata, Catalog, ForecastError, ObservationRow, SqliteCatalog,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn metadata(id: &str, category: &str, last: NaiveDate) -> ArtifactMetadata {
    ArtifactMetadata {
        id: id.to_string(),
        algorithm: Algorithm::Sarima,
        category: category.to_string(),
        last_period: last,
    }
}

#[tokio::test]
async fn test_observations_round_trip() {
    let catalog = SqliteCatalog::in_memory().unwrap();
    let rows = vec![
        ObservationRow::new(date(2023, 2, 1), "Mango", 3.0),
        ObservationRow::new(date(2023, 1, 15), "Mango", 5.5),
        ObservationRow::new(date(2023, 1, 20), "Rice", 1.0),
    ];

    let ids = catalog.insert_observations(&rows).await.unwrap();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let stored = catalog.observations(None).await.unwrap();
    assert_eq!(stored.len(), 3);
    // Ordered by date
    assert_eq!(stored[0].date, date(2023, 1, 15));
    assert_eq!(stored[0].uid, Some(ids[1]));
    assert_eq!(stored[0].value, 5.5);
    assert_eq!(stored[2].category, "Mango");
}

#[tokio::test]
async fn test_prefix_matching_is_literal() {
    let catalog = SqliteCatalog::in_memory().unwrap();
    let rows = vec![
        ObservationRow::new(date(2023, 1, 1), "Mango", 1.0),
        ObservationRow::new(date(2023, 1, 1), "Mango Ataulfo", 1.0),
        ObservationRow::new(date(2023, 1, 1), "Maize", 1.0),
        ObservationRow::new(date(2023, 1, 1), "M_x", 1.0),
        ObservationRow::new(date(2023, 1, 1), "Mox", 1.0),
    ];
    catalog.insert_observations(&rows).await.unwrap();

    let mango = catalog.observations(Some("Mango")).await.unwrap();
    assert_eq!(mango.len(), 2);

    let underscore = catalog.observations(Some("M_")).await.unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].category, "M_x");

    let injected = catalog.observations(Some("x' OR '1'='1")).await.unwrap();
    assert!(injected.is_empty());
}

#[tokio::test]
async fn test_artifact_metadata_lifecycle() {
    let catalog = SqliteCatalog::in_memory().unwrap();
    catalog
        .insert_artifact(&metadata("old", "Mango", date(2022, 12, 1)))
        .await
        .unwrap();
    catalog
        .insert_artifact(&metadata("new", "Mango", date(2023, 6, 1)))
        .await
        .unwrap();
    catalog
        .insert_artifact(&metadata("other", "Mango Ataulfo", date(2023, 6, 1)))
        .await
        .unwrap();

    let found = catalog.find_artifacts(Algorithm::Sarima, "Mango").await.unwrap();
    let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
    assert_eq!(found[0].last_period, date(2023, 6, 1));

    assert!(catalog
        .find_artifacts(Algorithm::Decomposition, "Mango")
        .await
        .unwrap()
        .is_empty());

    assert!(catalog.delete_artifact("old").await.unwrap());
    assert!(!catalog.delete_artifact("old").await.unwrap());
    assert_eq!(
        catalog.find_artifacts(Algorithm::Sarima, "Mango").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_duplicate_artifact_id_is_rejected() {
    let catalog = SqliteCatalog::in_memory().unwrap();
    let meta = metadata("same", "Mango", date(2023, 1, 1));
    catalog.insert_artifact(&meta).await.unwrap();

    assert!(matches!(
        catalog.insert_artifact(&meta).await,
        Err(ForecastError::Catalog(_))
    ));
}

#[tokio::test]
async fn test_file_catalog_persists_and_closes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("yieldcast.db");

    let catalog = SqliteCatalog::open(&path).unwrap();
    catalog
        .insert_observations(&[ObservationRow::new(date(2023, 1, 1), "Rice", 2.0)])
        .await
        .unwrap();
    catalog.close().await.unwrap();

    assert!(matches!(
        catalog.observations(None).await,
        Err(ForecastError::Catalog(_))
    ));
    // Closing twice is harmless
    catalog.close().await.unwrap();

    let reopened = SqliteCatalog::open(&path).unwrap();
    assert_eq!(reopened.observations(Some("Rice")).await.unwrap().len(), 1);
}
