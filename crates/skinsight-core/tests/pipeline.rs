use image::{GrayImage, Luma};
use skinsight_core::classifier::ClassifierError;
use skinsight_core::features::FeatureError;
use skinsight_core::{
    build_routine, extract_features, generate_synthetic_dataset, AnalysisError, BoundingBox,
    BudgetRange, Catalog, Concern, EngineConfig, FaceRegion, ForestParams, Product,
    ProductCategory, ProductRecommender, SkinAdvisor, SkinType, SkinTypeClassifier, UserProfile,
};

/// Two faces side by side; the left one is darker.
fn two_faces() -> GrayImage {
    GrayImage::from_fn(200, 100, |x, y| {
        let base: u8 = if x < 100 { 90 } else { 170 };
        let col = x % 100;
        let eye = (30..36).contains(&y) && ((20..35).contains(&col) || (65..80).contains(&col));
        let mouth = (70..75).contains(&y) && (35..65).contains(&col);
        if eye || mouth {
            Luma([base / 3])
        } else {
            Luma([base])
        }
    })
}

fn detections() -> Vec<BoundingBox> {
    vec![
        BoundingBox::new(0.0, 0.0, 100.0, 100.0),
        BoundingBox::new(100.0, 0.0, 100.0, 100.0),
    ]
}

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.skin_type_model.trees = 12;
    config.condition_model.trees = 12;
    config.synthetic.samples = 600;
    config
}

fn profile() -> UserProfile {
    UserProfile::new(27, [Concern::Acne], BudgetRange::new(5.0, 30.0).unwrap()).unwrap()
}

#[test]
fn test_features_are_finite_and_complete() {
    let image = two_faces();
    let region = FaceRegion::from_detections(detections()).unwrap();
    let fv = extract_features(&image, &region).unwrap();
    assert_eq!(fv.as_slice().len(), 18);
    assert!(fv.as_slice().iter().all(|v| v.is_finite()));
}

#[test]
fn test_multiple_faces_use_first() {
    let image = two_faces();
    let region = FaceRegion::from_detections(detections()).unwrap();
    assert_eq!(region.face_count, 2);

    let first_only = FaceRegion::single(detections().remove(0));
    assert_eq!(
        extract_features(&image, &region).unwrap(),
        extract_features(&image, &first_only).unwrap()
    );
}

#[test]
fn test_no_detections() {
    assert_eq!(
        FaceRegion::from_detections(Vec::new()),
        Err(FeatureError::NoFaceDetected)
    );

    let image = two_faces();
    let empty = FaceRegion {
        bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        face_count: 0,
    };
    assert_eq!(extract_features(&image, &empty), Err(FeatureError::NoFaceDetected));
}

#[test]
fn test_classify_before_training() {
    let clf = SkinTypeClassifier::default();
    let (fv, _) = generate_synthetic_dataset(4, Some(1))[0];
    assert_eq!(
        clf.predict(fv.as_slice()).unwrap_err(),
        ClassifierError::ModelNotTrained
    );
}

#[test]
fn test_synthetic_training_is_reproducible() {
    let data = generate_synthetic_dataset(400, Some(21));
    assert_eq!(data, generate_synthetic_dataset(400, Some(21)));

    let params = ForestParams {
        trees: 10,
        ..ForestParams::default()
    };
    let a = SkinTypeClassifier::new(params);
    let b = SkinTypeClassifier::new(params);
    let ra = a.train_dataset(&data).unwrap();
    let rb = b.train_dataset(&data).unwrap();
    assert_eq!(ra, rb);

    let image = two_faces();
    let region = FaceRegion::from_detections(detections()).unwrap();
    let fv = extract_features(&image, &region).unwrap();
    assert_eq!(
        a.predict_vector(&fv).unwrap().probabilities,
        b.predict_vector(&fv).unwrap().probabilities
    );
}

#[test]
fn test_oily_only_cleanser_yields_no_cleanser_step_for_dry() {
    let product = |name: &str, category, skin_types: &[SkinType]| Product {
        name: name.to_string(),
        brand: "Test".to_string(),
        category,
        price: 12.0,
        rating: 4.5,
        skin_types: skin_types.iter().copied().collect(),
        ingredients: Vec::new(),
        benefits: vec!["acne".to_string()],
        age_range: None,
    };
    let catalog = Catalog::new(vec![
        product("Oily Gel", ProductCategory::Cleanser, &[SkinType::Oily]),
        product("Dry Balm", ProductCategory::Moisturizer, &[SkinType::Dry]),
        product("Daily SPF", ProductCategory::Sunscreen, &[SkinType::Dry, SkinType::Oily]),
    ])
    .unwrap();

    let recs = ProductRecommender::default().recommend(SkinType::Dry, &profile(), &catalog);
    assert!(recs.get(ProductCategory::Cleanser).is_empty());

    let routine = build_routine(&recs);
    assert!(routine.steps().all(|s| s.category != ProductCategory::Cleanser));
    let morning: Vec<usize> = routine.morning.iter().map(|s| s.position).collect();
    assert_eq!(morning, [4, 5]);
}

#[test]
fn test_end_to_end_with_builtin_catalog() {
    let advisor = SkinAdvisor::new(&test_config());
    let summary = advisor.auto_train().unwrap();
    assert!(summary.skin_type.accuracy > 0.5, "{summary:?}");

    let image = two_faces();
    let region = FaceRegion::from_detections(detections()).unwrap();
    let report = advisor
        .analyze(&image, &region, &profile(), Catalog::builtin())
        .unwrap();

    assert_eq!(report.face_count, 2);
    assert!(report.concerns.contains(&Concern::Acne));
    let label = report.skin_type.label;
    for ranked in report.recommendations.by_category.values() {
        assert!(ranked.len() <= 3);
        assert!(ranked.iter().all(|s| s.product.suits(label)));
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
    for step in report.routine.steps() {
        assert_eq!(
            report.recommendations.top(step.category).map(|p| p.name.as_str()),
            Some(step.product.name.as_str())
        );
    }
}

#[test]
fn test_untrained_analysis_fails_cleanly() {
    let advisor = SkinAdvisor::default();
    let image = two_faces();
    let region = FaceRegion::from_detections(detections()).unwrap();
    assert!(matches!(
        advisor.analyze(&image, &region, &profile(), Catalog::builtin()),
        Err(AnalysisError::Classifier(ClassifierError::ModelNotTrained))
    ));
}
