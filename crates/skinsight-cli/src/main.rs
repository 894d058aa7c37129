use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use skinsight_core::advisor::ModelBundle;
use skinsight_core::synthetic::SyntheticDataGenerator;
use skinsight_core::{
    BoundingBox, BudgetRange, Concern, FaceRegion, ProductCategory, SkinAdvisor, SkinType,
    UserProfile,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::Config;

#[derive(Parser)]
#[command(name = "skinsight", about = "Skin-type analysis and skincare recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the face comes from: explicit boxes or a detector output file.
#[derive(Args)]
struct FaceArgs {
    /// Face bounding box as x,y,width,height (repeatable; the first is analyzed)
    #[arg(long = "face", value_parser = parse_face)]
    faces: Vec<BoundingBox>,
    /// JSON file with the detector's bounding boxes
    #[arg(long, conflicts_with = "faces")]
    detections: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a face image and recommend a skincare routine
    Analyze {
        /// Image file (any format the image crate reads)
        image: PathBuf,
        #[command(flatten)]
        face: FaceArgs,
        /// Age in years (1-120)
        #[arg(long, default_value_t = 25)]
        age: u32,
        /// Skin concern (repeatable): acne, aging, dryness, sensitivity,
        /// oiliness, pigmentation, large-pores
        #[arg(long = "concern")]
        concerns: Vec<Concern>,
        /// Lowest acceptable price per product
        #[arg(long, default_value_t = 0.0)]
        budget_min: f64,
        /// Highest acceptable price per product
        #[arg(long, default_value_t = 50.0)]
        budget_max: f64,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the feature vector for a face
    Features {
        image: PathBuf,
        #[command(flatten)]
        face: FaceArgs,
        #[arg(long)]
        json: bool,
    },
    /// Train both models on synthetic data and save them
    Train {
        /// Synthetic sample count
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Model bundle path (default: SKINSIGHT_MODEL_PATH)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a synthetic dataset as JSON
    Dataset {
        #[arg(long, default_value_t = 100)]
        samples: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List catalog products
    Catalog {
        #[arg(long)]
        skin_type: Option<SkinType>,
        #[arg(long)]
        category: Option<ProductCategory>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Analyze {
            image,
            face,
            age,
            concerns,
            budget_min,
            budget_max,
            json,
        } => {
            let engine = config.engine_config()?;
            let catalog = config.catalog()?;
            let budget = BudgetRange::new(budget_min, budget_max)?;
            let profile = UserProfile::new(age, concerns, budget)?;

            let gray = load_gray(&image)?;
            let region = face_region(face)?;

            let advisor = SkinAdvisor::new(&engine);
            load_models(&advisor, &config.model_path)?;

            let report = advisor.analyze(&gray, &region, &profile, &catalog)?;
            if json {
                output::print_json(&report)?;
            } else {
                output::print_report(&report);
            }
        }
        Commands::Features { image, face, json } => {
            let gray = load_gray(&image)?;
            let region = face_region(face)?;
            let features = SkinAdvisor::default().features(&gray, &region)?;
            if json {
                let named: Vec<_> = features.named().collect();
                output::print_json(&named)?;
            } else {
                output::print_features(&features);
            }
        }
        Commands::Train {
            samples,
            seed,
            output: bundle_path,
        } => {
            config.training_samples = samples.or(config.training_samples);
            config.seed = seed.or(config.seed);
            let engine = config.engine_config()?;

            let advisor = SkinAdvisor::new(&engine);
            let summary = advisor.auto_train()?;
            output::print_training(&summary);

            let path = bundle_path.unwrap_or(config.model_path);
            if let Some(bundle) = advisor.bundle() {
                save_bundle(&bundle, &path)?;
                println!("Saved models to {}", path.display());
            }
        }
        Commands::Dataset { samples, seed } => {
            let dataset = SyntheticDataGenerator::default().generate(samples, seed);
            output::print_json(&dataset)?;
        }
        Commands::Catalog {
            skin_type,
            category,
            json,
        } => {
            let catalog = config.catalog()?;
            let products: Vec<_> = catalog
                .products()
                .iter()
                .filter(|p| skin_type.map_or(true, |t| p.suits(t)))
                .filter(|p| category.map_or(true, |c| p.category == c))
                .collect();
            if json {
                output::print_json(&products)?;
            } else {
                output::print_products(&products);
            }
        }
    }

    Ok(())
}

fn parse_face(s: &str) -> Result<BoundingBox, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("bad face box {s:?}: {e}"))?;
    match parts[..] {
        [x, y, w, h] if w > 0.0 && h > 0.0 => Ok(BoundingBox::new(x, y, w, h)),
        [_, _, _, _] => Err(format!("face box {s:?} must have positive width and height")),
        _ => Err(format!("face box {s:?} must be x,y,width,height")),
    }
}

fn face_region(args: FaceArgs) -> Result<FaceRegion> {
    let detections = match args.detections {
        Some(path) => {
            let src = std::fs::read_to_string(&path)
                .with_context(|| format!("reading detections {}", path.display()))?;
            serde_json::from_str::<Vec<BoundingBox>>(&src)
                .with_context(|| format!("parsing detections {}", path.display()))?
        }
        None => args.faces,
    };
    Ok(FaceRegion::from_detections(detections)?)
}

fn load_gray(path: &Path) -> Result<image::GrayImage> {
    let image = image::open(path).with_context(|| format!("opening image {}", path.display()))?;
    Ok(image.to_luma8())
}

/// Install saved models if present, otherwise train on synthetic data.
fn load_models(advisor: &SkinAdvisor, path: &Path) -> Result<()> {
    if path.exists() {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("reading model bundle {}", path.display()))?;
        let bundle: ModelBundle = serde_json::from_str(&src)
            .with_context(|| format!("parsing model bundle {}", path.display()))?;
        advisor.install_bundle(bundle)?;
        tracing::info!(path = %path.display(), "models loaded");
    } else {
        tracing::info!(path = %path.display(), "no saved models; training on synthetic data");
        let summary = advisor.auto_train()?;
        tracing::info!(
            skin_type_accuracy = summary.skin_type.accuracy,
            condition_accuracy = summary.condition.accuracy,
            "models trained"
        );
    }
    Ok(())
}

fn save_bundle(bundle: &ModelBundle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string(bundle)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_face() {
        let bbox = parse_face("10, 20,30,40").unwrap();
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (10.0, 20.0, 30.0, 40.0));
        assert!(parse_face("1,2,3").is_err());
        assert!(parse_face("1,2,0,4").is_err());
        assert!(parse_face("a,b,c,d").is_err());
    }

    #[test]
    fn test_face_region_requires_a_face() {
        let empty = FaceArgs {
            faces: Vec::new(),
            detections: None,
        };
        assert!(face_region(empty).is_err());

        let two = FaceArgs {
            faces: vec![
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(20.0, 0.0, 10.0, 10.0),
            ],
            detections: None,
        };
        let region = face_region(two).unwrap();
        assert_eq!(region.face_count, 2);
        assert_eq!(region.bbox.x, 0.0);
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "skinsight", "analyze", "face.png", "--face", "0,0,64,64", "--concern", "acne",
            "--concern", "large-pores", "--budget-max", "30",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze { face, concerns, budget_max, .. } => {
                assert_eq!(face.faces.len(), 1);
                assert_eq!(concerns, [Concern::Acne, Concern::LargePores]);
                assert_eq!(budget_max, 30.0);
            }
            _ => panic!("expected analyze"),
        }
    }
}
