use crate::features::FeatureError;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::str::FromStr;

/// Number of positions in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 18;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    #[serde(default)]
    pub landmarks: Option<[(f32, f32); 5]>,
}

fn default_confidence() -> f32 {
    1.0
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: [(f32, f32); 5]) -> Self {
        self.landmarks = Some(landmarks);
        self
    }
}

/// The face chosen for analysis, plus how many faces the detector reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub bbox: BoundingBox,
    pub face_count: usize,
}

impl FaceRegion {
    /// Build a region from detector output, keeping the first detection.
    ///
    /// Fails with [`FeatureError::NoFaceDetected`] when the detector found
    /// nothing.
    pub fn from_detections(detections: Vec<BoundingBox>) -> Result<Self, FeatureError> {
        let face_count = detections.len();
        let bbox = detections
            .into_iter()
            .next()
            .ok_or(FeatureError::NoFaceDetected)?;
        if face_count > 1 {
            tracing::debug!(
                ignored = face_count - 1,
                "multiple faces detected; using the first"
            );
        }
        Ok(Self { bbox, face_count })
    }

    /// A single known face region (count = 1).
    pub fn single(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            face_count: 1,
        }
    }
}

/// Coarse grouping of feature positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    Symmetry,
    Proportion,
    Texture,
}

/// Semantic meaning of every [`FeatureVector`] position.
///
/// The discriminant is the position in the vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureIndex {
    /// Whole-face left/right mirror agreement, 1.0 = perfectly symmetric.
    GlobalSymmetry = 0,
    EyeBandSymmetry = 1,
    NoseBandSymmetry = 2,
    MouthBandSymmetry = 3,
    /// Face region width / height.
    AspectRatio = 4,
    /// Vertical eye line position / face height.
    EyeLine = 5,
    NoseLine = 6,
    MouthLine = 7,
    /// Distance between eye centres / face width.
    InterocularRatio = 8,
    /// Mouth corner-to-corner extent / face width.
    MouthWidthRatio = 9,
    /// 1 / (1 + var(gradient magnitude) / 1024).
    Smoothness = 10,
    /// Intensity std-dev / 127.5.
    Contrast = 11,
    /// Mean intensity / 255.
    Brightness = 12,
    /// Intensity variance / 127.5².
    Variance = 13,
    /// Laplacian variance / 1000, saturating at 1.
    LaplacianEnergy = 14,
    /// Fraction of pixels darker than mean - std.
    DarkSpotRatio = 15,
    /// Fraction of pixels brighter than 200 (specular shine).
    ShineRatio = 16,
    /// Mean gradient magnitude / 255, saturating at 1.
    TextureComplexity = 17,
}

impl FeatureIndex {
    pub const ALL: [FeatureIndex; FEATURE_COUNT] = [
        Self::GlobalSymmetry,
        Self::EyeBandSymmetry,
        Self::NoseBandSymmetry,
        Self::MouthBandSymmetry,
        Self::AspectRatio,
        Self::EyeLine,
        Self::NoseLine,
        Self::MouthLine,
        Self::InterocularRatio,
        Self::MouthWidthRatio,
        Self::Smoothness,
        Self::Contrast,
        Self::Brightness,
        Self::Variance,
        Self::LaplacianEnergy,
        Self::DarkSpotRatio,
        Self::ShineRatio,
        Self::TextureComplexity,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GlobalSymmetry => "global_symmetry",
            Self::EyeBandSymmetry => "eye_band_symmetry",
            Self::NoseBandSymmetry => "nose_band_symmetry",
            Self::MouthBandSymmetry => "mouth_band_symmetry",
            Self::AspectRatio => "aspect_ratio",
            Self::EyeLine => "eye_line",
            Self::NoseLine => "nose_line",
            Self::MouthLine => "mouth_line",
            Self::InterocularRatio => "interocular_ratio",
            Self::MouthWidthRatio => "mouth_width_ratio",
            Self::Smoothness => "smoothness",
            Self::Contrast => "contrast",
            Self::Brightness => "brightness",
            Self::Variance => "variance",
            Self::LaplacianEnergy => "laplacian_energy",
            Self::DarkSpotRatio => "dark_spot_ratio",
            Self::ShineRatio => "shine_ratio",
            Self::TextureComplexity => "texture_complexity",
        }
    }

    pub fn group(self) -> FeatureGroup {
        match self.index() {
            0..=3 => FeatureGroup::Symmetry,
            4..=9 => FeatureGroup::Proportion,
            _ => FeatureGroup::Texture,
        }
    }

    /// Range synthetic samples are clipped to. The extractor does not clamp
    /// proportion ratios, so real measurements may fall outside it.
    pub fn valid_range(self) -> (f32, f32) {
        match self.group() {
            FeatureGroup::Symmetry | FeatureGroup::Texture => (0.0, 1.0),
            FeatureGroup::Proportion => (0.0, 2.0),
        }
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-length face descriptor. Every value is finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    /// Validate and copy a raw slice. Returns `None` on wrong length or
    /// any non-finite value.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let array: [f32; FEATURE_COUNT] = values.try_into().ok()?;
        Self::from_array(array)
    }

    pub fn from_array(values: [f32; FEATURE_COUNT]) -> Option<Self> {
        Self::try_from_array(values).ok()
    }

    /// Like [`FeatureVector::from_array`], naming the first non-finite position.
    pub fn try_from_array(values: [f32; FEATURE_COUNT]) -> Result<Self, FeatureIndex> {
        match FeatureIndex::ALL
            .into_iter()
            .find(|f| !values[f.index()].is_finite())
        {
            Some(feature) => Err(feature),
            None => Ok(Self(values)),
        }
    }

    pub fn get(&self, index: FeatureIndex) -> f32 {
        self.0[index.index()]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// (feature, value) pairs in position order.
    pub fn named(&self) -> impl Iterator<Item = (FeatureIndex, f32)> + '_ {
        FeatureIndex::ALL.iter().map(move |&idx| (idx, self.0[idx.index()]))
    }
}

impl std::ops::Index<usize> for FeatureVector {
    type Output = f32;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

/// A closed label set with stable integer codes `0..ALL.len()`.
pub trait Label:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static
{
    /// Every label, ordered by code.
    const ALL: &'static [Self];

    fn code(self) -> usize;

    fn from_code(code: usize) -> Option<Self> {
        Self::ALL.get(code).copied()
    }
}

/// Skin type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinType {
    Dry = 0,
    Oily = 1,
    Combination = 2,
    Sensitive = 3,
}

impl Label for SkinType {
    const ALL: &'static [Self] = &[Self::Dry, Self::Oily, Self::Combination, Self::Sensitive];

    fn code(self) -> usize {
        self as usize
    }
}

impl SkinType {
    pub fn description(self) -> &'static str {
        match self {
            Self::Dry => "Lacks moisture; often feels tight, flakes, and shows fine lines early.",
            Self::Oily => "Produces excess sebum; looks shiny and is prone to breakouts.",
            Self::Combination => {
                "Oily through the T-zone (forehead, nose, chin) and drier on the cheeks."
            }
            Self::Sensitive => {
                "Reacts easily with redness, itching or stinging to products and weather."
            }
        }
    }

    pub fn care_tips(self) -> &'static [&'static str] {
        match self {
            Self::Dry => &[
                "Use a rich moisturizer formulated for dry skin",
                "Avoid washing your face too many times a day",
                "Look for hyaluronic acid and ceramides",
                "Apply a hydrating mask two to three times a week",
                "Avoid products containing drying alcohol",
            ],
            Self::Oily => &[
                "Use a gentle cleanser that does not strip the skin",
                "Choose a lightweight, non-comedogenic moisturizer",
                "Avoid heavy oil-based products",
                "Look for salicylic acid or niacinamide",
                "Use a clay mask once or twice a week",
            ],
            Self::Combination => &[
                "Treat each zone with the products it needs",
                "Control oil on the T-zone",
                "Hydrate the cheeks",
                "Use a light moisturizer all over",
                "Multi-mask by zone",
            ],
            Self::Sensitive => &[
                "Choose fragrance-free, non-irritating products",
                "Avoid added fragrance and essential oils",
                "Patch-test new products before use",
                "Prefer mineral sunscreen filters",
                "Avoid harsh physical exfoliation",
            ],
        }
    }
}

impl fmt::Display for SkinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dry => "Dry",
            Self::Oily => "Oily",
            Self::Combination => "Combination",
            Self::Sensitive => "Sensitive",
        })
    }
}

impl FromStr for SkinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dry" => Ok(Self::Dry),
            "oily" => Ok(Self::Oily),
            "combination" => Ok(Self::Combination),
            "sensitive" => Ok(Self::Sensitive),
            other => Err(format!("unknown skin type: {other}")),
        }
    }
}

/// Visible skin condition, predicted alongside the skin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinCondition {
    Normal = 0,
    Acne = 1,
    Pigmentation = 2,
    LargePores = 3,
}

impl Label for SkinCondition {
    const ALL: &'static [Self] = &[Self::Normal, Self::Acne, Self::Pigmentation, Self::LargePores];

    fn code(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SkinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "Normal",
            Self::Acne => "Acne",
            Self::Pigmentation => "Pigmentation",
            Self::LargePores => "Large pores",
        })
    }
}

/// Probability per label. Always sums to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities<L: Label> {
    values: Vec<f64>,
    _label: PhantomData<L>,
}

impl<L: Label> ClassProbabilities<L> {
    /// Normalize a per-code weight vector. A zero (or missing) total yields
    /// the uniform distribution.
    pub fn from_weights(weights: &[f64]) -> Self {
        let n = L::ALL.len();
        let mut values: Vec<f64> = (0..n)
            .map(|i| weights.get(i).copied().unwrap_or(0.0).max(0.0))
            .collect();
        let total: f64 = values.iter().sum();
        if total > 0.0 && total.is_finite() {
            for v in &mut values {
                *v /= total;
            }
        } else {
            values.iter_mut().for_each(|v| *v = 1.0 / n as f64);
        }
        Self {
            values,
            _label: PhantomData,
        }
    }

    pub fn get(&self, label: L) -> f64 {
        self.values[label.code()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (L, f64)> + '_ {
        L::ALL.iter().map(move |&l| (l, self.values[l.code()]))
    }

    /// Highest-probability label; ties go to the lowest code.
    pub fn argmax(&self) -> L {
        let mut best = 0;
        for (i, &v) in self.values.iter().enumerate() {
            if v > self.values[best] {
                best = i;
            }
        }
        L::ALL[best]
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

impl<L: Label> Serialize for ClassProbabilities<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Result of classifying one feature vector.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction<L: Label> {
    pub label: L,
    pub code: usize,
    /// Probability of the predicted label.
    pub confidence: f64,
    pub probabilities: ClassProbabilities<L>,
}

impl<L: Label> Prediction<L> {
    pub fn from_probabilities(probabilities: ClassProbabilities<L>) -> Self {
        let label = probabilities.argmax();
        Self {
            label,
            code: label.code(),
            confidence: probabilities.get(label),
            probabilities,
        }
    }
}
