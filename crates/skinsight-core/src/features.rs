//! Geometry and texture feature extraction over a detected face region.
//!
//! Produces the 18-position [`FeatureVector`] described by [`FeatureIndex`]:
//! mirror-symmetry scores, facial proportion ratios, and texture statistics.
//! Everything is computed on the grayscale face crop only, never the full frame.

use crate::types::{BoundingBox, FaceRegion, FeatureIndex, FeatureVector, FEATURE_COUNT};
use image::GrayImage;
use std::ops::Range;
use thiserror::Error;

// --- Named constants ---
const MIN_REGION_SIDE: usize = 8;
const SHINE_THRESHOLD: f32 = 200.0;
const GRADIENT_VARIANCE_SCALE: f64 = 1024.0;
const LAPLACIAN_VARIANCE_SCALE: f64 = 1000.0;
const HALF_RANGE: f64 = 127.5;

// Horizontal bands as fractions of face height.
const EYE_BAND: (f32, f32) = (0.20, 0.45);
const NOSE_BAND: (f32, f32) = (0.45, 0.65);
const MOUTH_BAND: (f32, f32) = (0.65, 0.85);

// Search windows for landmark proxies when the detector gives no landmarks.
const EYE_ROW_SEARCH: (f32, f32) = (0.20, 0.55);
const MOUTH_ROW_SEARCH: (f32, f32) = (0.60, 0.90);
const LEFT_EYE_COL_SEARCH: (f32, f32) = (0.10, 0.50);
const RIGHT_EYE_COL_SEARCH: (f32, f32) = (0.50, 0.90);
const MOUTH_COL_SEARCH: (f32, f32) = (0.15, 0.85);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("face region too small after clipping to the image: {width}x{height}")]
    RegionTooSmall { width: usize, height: usize },
    #[error("feature {0} is not finite")]
    NonFiniteFeature(FeatureIndex),
}

/// Grayscale face crop in row-major order.
struct Roi {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
    origin_y: f32,
}

impl Roi {
    /// Clip `bbox` to the image and copy the covered pixels.
    fn crop(image: &GrayImage, bbox: &BoundingBox) -> Result<Self, FeatureError> {
        let (iw, ih) = image.dimensions();

        let x0 = bbox.x.max(0.0).floor();
        let y0 = bbox.y.max(0.0).floor();
        let x1 = (bbox.x + bbox.width).min(iw as f32).ceil();
        let y1 = (bbox.y + bbox.height).min(ih as f32).ceil();

        let width = if x1 > x0 { (x1 - x0) as usize } else { 0 };
        let height = if y1 > y0 { (y1 - y0) as usize } else { 0 };

        if width < MIN_REGION_SIDE || height < MIN_REGION_SIDE {
            return Err(FeatureError::RegionTooSmall { width, height });
        }

        let (ox, oy) = (x0 as u32, y0 as u32);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height as u32 {
            for x in 0..width as u32 {
                pixels.push(image.get_pixel(ox + x, oy + y).0[0] as f32);
            }
        }

        Ok(Self {
            width,
            height,
            pixels,
            origin_y: y0,
        })
    }

    fn at(&self, x: usize, y: usize) -> f32 {
        self.pixels[y * self.width + x]
    }

    fn row_means(&self) -> Vec<f32> {
        self.pixels
            .chunks_exact(self.width)
            .map(|row| row.iter().sum::<f32>() / self.width as f32)
            .collect()
    }

    fn column_means(&self, rows: Range<usize>) -> Vec<f32> {
        let n = rows.len().max(1) as f32;
        (0..self.width)
            .map(|x| rows.clone().map(|y| self.at(x, y)).sum::<f32>() / n)
            .collect()
    }
}

/// Extract the feature vector for the face in `region`.
///
/// Fails with [`FeatureError::NoFaceDetected`] when the detector reported
/// no faces, and with [`FeatureError::NonFiniteFeature`] when landmarks put
/// a value out of `f32` range. The result is deterministic for a given image
/// and region.
pub fn extract_features(
    image: &GrayImage,
    region: &FaceRegion,
) -> Result<FeatureVector, FeatureError> {
    if region.face_count == 0 {
        return Err(FeatureError::NoFaceDetected);
    }

    let roi = Roi::crop(image, &region.bbox)?;

    let mut values = [0.0f32; FEATURE_COUNT];

    let h = roi.height;
    values[FeatureIndex::GlobalSymmetry.index()] = mirror_symmetry(&roi, 0..h);
    values[FeatureIndex::EyeBandSymmetry.index()] = mirror_symmetry(&roi, band(h, EYE_BAND));
    values[FeatureIndex::NoseBandSymmetry.index()] = mirror_symmetry(&roi, band(h, NOSE_BAND));
    values[FeatureIndex::MouthBandSymmetry.index()] =
        mirror_symmetry(&roi, band(h, MOUTH_BAND));

    let proportions = match region.bbox.landmarks.as_ref() {
        Some(landmarks) => landmark_proportions(&roi, landmarks),
        None => proxy_proportions(&roi),
    };
    values[FeatureIndex::AspectRatio.index()..=FeatureIndex::MouthWidthRatio.index()]
        .copy_from_slice(&proportions);

    let texture = texture_statistics(&roi);
    values[FeatureIndex::Smoothness.index()..].copy_from_slice(&texture);

    tracing::debug!(
        width = roi.width,
        height = roi.height,
        landmarks = region.bbox.landmarks.is_some(),
        "extracted face features"
    );

    // Detector landmarks far outside the frame can overflow the distances.
    FeatureVector::try_from_array(values).map_err(FeatureError::NonFiniteFeature)
}

/// Row range covering `[lo, hi)` of `len`, never empty.
fn band(len: usize, (lo, hi): (f32, f32)) -> Range<usize> {
    let start = ((lo * len as f32).floor() as usize).min(len - 1);
    let end = ((hi * len as f32).ceil() as usize).min(len).max(start + 1);
    start..end
}

fn argmin(values: &[f32], range: Range<usize>) -> usize {
    range
        .clone()
        .fold(range.start, |best, i| if values[i] < values[best] { i } else { best })
}

fn argmax(values: &[f32], range: Range<usize>) -> usize {
    range
        .clone()
        .fold(range.start, |best, i| if values[i] > values[best] { i } else { best })
}

/// Compare each row's left half against its mirrored right half.
///
/// Returns 1 - mean |left - mirrored right| / 255: 1.0 for a perfect mirror
/// image, decreasing as the halves diverge.
fn mirror_symmetry(roi: &Roi, rows: Range<usize>) -> f32 {
    let half = roi.width / 2;
    let mut diff = 0.0f64;
    let mut n = 0usize;

    for y in rows {
        for i in 0..half {
            let left = roi.at(i, y);
            let right = roi.at(roi.width - 1 - i, y);
            diff += (left - right).abs() as f64;
            n += 1;
        }
    }

    if n == 0 {
        return 1.0;
    }
    (1.0 - diff / (n as f64 * 255.0)) as f32
}

/// Proportions from detector landmarks, relative to the clipped crop.
fn landmark_proportions(roi: &Roi, landmarks: &[(f32, f32); 5]) -> [f32; 6] {
    let w = roi.width as f32;
    let h = roi.height as f32;
    let [left_eye, right_eye, nose, left_mouth, right_mouth] = *landmarks;

    let eye_y = (left_eye.1 + right_eye.1) / 2.0 - roi.origin_y;
    let nose_y = nose.1 - roi.origin_y;
    let mouth_y = (left_mouth.1 + right_mouth.1) / 2.0 - roi.origin_y;

    [
        w / h,
        eye_y / h,
        nose_y / h,
        mouth_y / h,
        distance(left_eye, right_eye) / w,
        distance(left_mouth, right_mouth) / w,
    ]
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Proportions from intensity profiles: eyes and mouth are the darkest
/// rows in their search windows, the nose tip the brightest row between.
fn proxy_proportions(roi: &Roi) -> [f32; 6] {
    let w = roi.width;
    let h = roi.height;
    let rows = roi.row_means();

    let eye_row = argmin(&rows, band(h, EYE_ROW_SEARCH));
    let mouth_row = argmin(&rows, band(h, MOUTH_ROW_SEARCH));
    let nose_row = if mouth_row > eye_row + 1 {
        argmax(&rows, eye_row + 1..mouth_row)
    } else {
        (eye_row + mouth_row) / 2
    };

    let reach = (h / 20).max(1);
    let around = |row: usize| row.saturating_sub(reach)..(row + reach + 1).min(h);

    let eye_cols = roi.column_means(around(eye_row));
    let left_eye = argmin(&eye_cols, band(w, LEFT_EYE_COL_SEARCH));
    let right_eye = argmin(&eye_cols, band(w, RIGHT_EYE_COL_SEARCH));

    let mouth_cols = roi.column_means(around(mouth_row));
    let mouth_width = dark_extent(&mouth_cols, band(w, MOUTH_COL_SEARCH));

    let line = |row: usize| (row as f32 + 0.5) / h as f32;

    [
        w as f32 / h as f32,
        line(eye_row),
        line(nose_row),
        line(mouth_row),
        right_eye.abs_diff(left_eye) as f32 / w as f32,
        mouth_width as f32 / w as f32,
    ]
}

/// Span (in columns) between the first and last column darker than
/// mean - std/2 within `range`. Zero for a flat profile.
fn dark_extent(cols: &[f32], range: Range<usize>) -> usize {
    let (mean, var) = mean_var(range.clone().map(|i| cols[i]));
    let std = var.sqrt();
    if std <= f64::EPSILON {
        return 0;
    }
    let threshold = (mean - 0.5 * std) as f32;

    let mut dark = range.filter(|&i| cols[i] < threshold);
    match dark.next() {
        Some(first) => dark.last().unwrap_or(first) - first + 1,
        None => 0,
    }
}

/// Mean and population variance.
fn mean_var(values: impl Iterator<Item = f32>) -> (f64, f64) {
    let mut n = 0usize;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for v in values {
        let v = v as f64;
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    (mean, var)
}

/// Texture statistics in [`FeatureIndex`] order from `Smoothness` on.
fn texture_statistics(roi: &Roi) -> [f32; 8] {
    let (mean, var) = mean_var(roi.pixels.iter().copied());
    let std = var.sqrt();

    let mut magnitudes = Vec::with_capacity(roi.pixels.len());
    let mut laplacians = Vec::with_capacity(roi.pixels.len());
    for y in 1..roi.height - 1 {
        for x in 1..roi.width - 1 {
            let p = |dx: isize, dy: isize| {
                roi.at((x as isize + dx) as usize, (y as isize + dy) as usize)
            };
            let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            magnitudes.push((gx * gx + gy * gy).sqrt());
            laplacians.push(p(-1, 0) + p(1, 0) + p(0, -1) + p(0, 1) - 4.0 * p(0, 0));
        }
    }

    let (grad_mean, grad_var) = mean_var(magnitudes.into_iter());
    let (_, lap_var) = mean_var(laplacians.into_iter());

    let n = roi.pixels.len() as f64;
    let dark_spots = if std > 0.0 {
        let cutoff = (mean - std) as f32;
        roi.pixels.iter().filter(|&&p| p < cutoff).count() as f64 / n
    } else {
        0.0
    };
    let shine = roi.pixels.iter().filter(|&&p| p > SHINE_THRESHOLD).count() as f64 / n;

    [
        (1.0 / (1.0 + grad_var / GRADIENT_VARIANCE_SCALE)) as f32,
        (std / HALF_RANGE) as f32,
        (mean / 255.0) as f32,
        (var / (HALF_RANGE * HALF_RANGE)) as f32,
        (lap_var / LAPLACIAN_VARIANCE_SCALE).min(1.0) as f32,
        dark_spots as f32,
        shine as f32,
        (grad_mean / 255.0).min(1.0) as f32,
    ]
}
