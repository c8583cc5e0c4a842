// Integration tests for the compx recommendation pipeline
use chrono::{Duration, Utc};
use compx::prelude::*;
use compx::{train, Error};
use compx_engine::EmbeddingIndex;

fn property(address: &str, gla: f64, lat: f64) -> Property {
    Property {
        address: address.to_string(),
        gla,
        lot_size: 5000.0,
        bedrooms: 3.0,
        bathrooms: 2.0,
        year_built: 2000,
        latitude: lat,
        longitude: -76.48,
        ..Default::default()
    }
}

fn subject() -> SubjectProperty {
    SubjectProperty {
        property: property("100 King St", 2000.0, 44.23),
        appraisal_date: Some(Utc::now()),
        estimated_value: Some(400_000.0),
    }
}

fn candidate(id: &str, address: &str, gla: f64, lat: f64, days: i64) -> CandidateProperty {
    CandidateProperty {
        id: id.to_string(),
        property: property(address, gla, lat),
        sale_date: Some(Utc::now() - Duration::days(days)),
        sale_price: Some(400_000.0),
    }
}

#[test]
fn test_identical_property_is_perfect_match() {
    let engine = CompEngine::default();
    let twin = candidate("twin", "1 Twin St", 2000.0, 44.23, 0);

    let recs = engine
        .recommend(&subject(), &[twin], &RankingParams::strict())
        .unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].rank, 1);
    assert!((recs[0].similarity_score - 100.0).abs() < 1e-9);
    assert!(recs[0].distance_miles < 1e-9);
    assert_eq!(recs[0].days_since_sale, 0);
    assert!(recs[0].adjustments.total().abs() < 1e-9);
}

#[test]
fn test_distance_bound_excludes_remote_sales() {
    let engine = CompEngine::default();
    // ~7.3 degrees of latitude is roughly 500 miles.
    let remote = candidate("remote", "1 Far Rd", 2000.0, 44.23 + 7.3, 10);
    let near = candidate("near", "2 Near St", 2000.0, 44.23, 10);

    let recs = engine
        .recommend(&subject(), &[remote, near], &RankingParams::strict())
        .unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].candidate.id, "near");
}

#[test]
fn test_empty_candidate_pool_is_empty_result() {
    let engine = CompEngine::default();
    let recs = engine
        .recommend(&subject(), &[], &RankingParams::strict())
        .unwrap();
    assert!(recs.is_empty());
}

#[test]
fn test_recommendations_carry_explanations_and_adjustments() {
    let engine = CompEngine::default();
    let close = candidate("c1", "1 Elm St", 1850.0, 44.232, 45);

    let recs = engine
        .recommend(&subject(), &[close], &RankingParams::strict())
        .unwrap();

    let rec = &recs[0];
    assert_eq!(rec.explanations.len(), 5);
    let weight_total: f64 = rec.explanations.iter().map(|e| e.weight).sum();
    assert!((weight_total - 1.0).abs() < 1e-9);
    // Candidate is 150 sq ft smaller at $50/sq ft.
    assert!((rec.adjustments.gla - (-7500.0)).abs() < 1e-9);
    assert!(!rec.reasoning.is_empty());
}

#[test]
fn test_trained_engine_end_to_end() {
    let now = Utc::now();
    let appraisals: Vec<HistoricalAppraisal> = (0..12)
        .map(|i| HistoricalAppraisal {
            id: format!("a{i}"),
            subject: subject(),
            candidates: vec![
                candidate("good", &format!("{i} Twin St"), 2000.0, 44.23, 15),
                CandidateProperty {
                    id: "bad".to_string(),
                    property: property(&format!("{i} Far Rd"), 700.0, 44.9),
                    sale_date: Some(now - Duration::days(300)),
                    sale_price: Some(130_000.0),
                },
            ],
            selected_comp_ids: vec!["good".to_string()],
        })
        .collect();
    let (bundle, metrics) = train(&appraisals).unwrap();
    assert!(metrics.accuracy > 0.8);

    let engine = CompEngine::default();
    engine.install_model(bundle).unwrap();
    assert!(engine.status().model_ready);

    let recs = engine
        .recommend(
            &subject(),
            &[
                candidate("twin", "1 Twin St", 2005.0, 44.23, 10),
                candidate("meh", "2 Other St", 1500.0, 44.25, 80),
            ],
            &RankingParams::strict(),
        )
        .unwrap();

    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].candidate.id, "twin");
}

#[test]
fn test_index_search_requires_built_index() {
    let engine = CompEngine::default();
    assert!(matches!(
        engine.search_index(&subject(), 3),
        Err(Error::NotReady(_))
    ));
}

#[test]
fn test_index_persistence_roundtrip() {
    let corpus: Vec<CandidateProperty> = (0..15)
        .map(|i| {
            let mut c = candidate(
                &format!("c{i}"),
                &format!("{i} Elm St"),
                1600.0 + i as f64 * 60.0,
                44.23,
                20,
            );
            c.sale_price = Some(320_000.0 + i as f64 * 12_000.0);
            c
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::new(dir.path());
    store.save(&EmbeddingIndex::build(&corpus).unwrap()).unwrap();

    let engine = CompEngine::default();
    engine
        .install_index(store.load().unwrap().unwrap())
        .unwrap();
    assert!(engine.status().index_ready);
    assert_eq!(engine.status().indexed_candidates, 15);

    let recs = engine.search_index(&subject(), 3).unwrap();
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0].explanations[0].factor, "Embedding Similarity");
}

#[tokio::test]
async fn test_initialize_engine_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let engine = compx::initialize_engine(dir.path()).await.unwrap();
    let status = engine.status();
    assert!(!status.model_ready);
    assert!(!status.index_ready);

    // Cold engine still ranks via the rule-based path.
    let recs = engine
        .recommend(
            &subject(),
            &[candidate("c", "1 Elm St", 1900.0, 44.23, 10)],
            &RankingParams::strict(),
        )
        .unwrap();
    assert_eq!(recs.len(), 1);
}

#[tokio::test]
async fn test_initialize_engine_loads_persisted_artifacts() {
    let corpus: Vec<CandidateProperty> = (0..10)
        .map(|i| candidate(&format!("c{i}"), &format!("{i} Oak St"), 1800.0 + i as f64 * 40.0, 44.23, 25))
        .collect();

    let dir = tempfile::tempdir().unwrap();
    IndexStore::new(dir.path())
        .save(&EmbeddingIndex::build(&corpus).unwrap())
        .unwrap();

    let engine = compx::initialize_engine(dir.path()).await.unwrap();
    assert!(engine.status().index_ready);
    assert_eq!(engine.status().indexed_candidates, 10);
}
