use anyhow::Result;
use serde::Serialize;
use skinsight_core::advisor::TrainingSummary;
use skinsight_core::classifier::TrainingReport;
use skinsight_core::routine::RoutineStep;
use skinsight_core::{FeatureVector, Product, ProductCategory, SkinReport};

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_report(report: &SkinReport<'_>) {
    let skin = &report.skin_type;
    println!(
        "Skin type: {} ({:.0}% confidence)",
        skin.label,
        skin.confidence * 100.0
    );
    println!("  {}", report.description);

    let probabilities: Vec<String> = skin
        .probabilities
        .iter()
        .map(|(label, p)| format!("{label} {p:.2}"))
        .collect();
    println!("  probabilities: {}", probabilities.join(", "));

    if let Some(condition) = &report.condition {
        println!(
            "Condition: {} ({:.0}%)",
            condition.label,
            condition.confidence * 100.0
        );
    }
    if report.face_count > 1 {
        println!("Note: {} faces detected, analyzed the first", report.face_count);
    }

    println!("\nCare tips:");
    for tip in report.care_tips {
        println!("  - {tip}");
    }

    println!("\nRecommendations:");
    for category in ProductCategory::ALL {
        let ranked = report.recommendations.get(category);
        if ranked.is_empty() {
            continue;
        }
        println!("  {category}:");
        for (i, scored) in ranked.iter().enumerate() {
            println!(
                "    {}. {}  score {:.3}",
                i + 1,
                describe(scored.product),
                scored.score
            );
        }
        if let Some(alternatives) = report.alternatives.get(&category) {
            let names: Vec<&str> = alternatives.iter().map(|p| p.name.as_str()).collect();
            println!("    alternatives: {}", names.join(", "));
        }
    }

    print_steps("Morning routine", &report.routine.morning);
    print_steps("Evening routine", &report.routine.evening);

    println!("\nEstimated cost: {:.2}", report.estimated_cost);
    println!("\n{}", report.explanation);
}

fn print_steps(title: &str, steps: &[RoutineStep<'_>]) {
    println!("\n{title}:");
    if steps.is_empty() {
        println!("  (no steps)");
    }
    for step in steps {
        println!(
            "  {}. {:<11} {}",
            step.position,
            step.category.as_str(),
            describe(step.product)
        );
        println!("     {}", step.usage);
    }
}

pub fn print_features(features: &FeatureVector) {
    for (index, value) in features.named() {
        let group = format!("{:?}", index.group()).to_lowercase();
        println!(
            "{:>2}  {:<20} {:<10} {:.4}",
            index.index(),
            index.name(),
            group,
            value
        );
    }
}

pub fn print_training(summary: &TrainingSummary) {
    print_model("skin type", &summary.skin_type);
    print_model("condition", &summary.condition);
}

fn print_model(name: &str, report: &TrainingReport) {
    println!(
        "{name:<10} accuracy {:.3}  ({} train / {} held out, {} trees)",
        report.accuracy, report.train_samples, report.validation_samples, report.trees
    );
}

pub fn print_products(products: &[&Product]) {
    if products.is_empty() {
        println!("No matching products");
        return;
    }
    for product in products {
        let types: Vec<String> = product
            .skin_types
            .iter()
            .map(|t| t.to_string().to_lowercase())
            .collect();
        println!(
            "{:<11} {}  [{}]",
            product.category.as_str(),
            describe(product),
            types.join(", ")
        );
    }
}

fn describe(product: &Product) -> String {
    format!(
        "{} ({}) {:.2}, rated {:.1}",
        product.name, product.brand, product.price, product.rating
    )
}
