//! Local pixel heuristics that decide whether a photo plausibly shows hair
//! and scalp before anything is sent to the vision model.

use image::imageops::FilterType;
use image::RgbImage;
use serde::Serialize;
use tracing::debug;

const SAMPLE_SIZE: u32 = 224;

const MIN_SKIN_RATIO: f64 = 0.15;
const MIN_HAIR_RATIO: f64 = 0.10;
const MIN_BRIGHTNESS: f64 = 30.0;
const MAX_BRIGHTNESS: f64 = 220.0;
const MIN_COLOR_VARIANCE: f64 = 500.0;

/// Inclusive RGB box for one family of skin tones.
struct ToneRange {
    r: (u8, u8),
    g: (u8, u8),
    b: (u8, u8),
}

const SKIN_TONES: [ToneRange; 4] = [
    // light
    ToneRange {
        r: (180, 255),
        g: (140, 220),
        b: (120, 200),
    },
    // medium
    ToneRange {
        r: (120, 200),
        g: (90, 160),
        b: (70, 140),
    },
    // darker
    ToneRange {
        r: (60, 140),
        g: (40, 100),
        b: (20, 80),
    },
    // olive
    ToneRange {
        r: (140, 200),
        g: (120, 180),
        b: (80, 140),
    },
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageCharacteristics {
    pub skin_tone_ratio: f64,
    pub hair_like_ratio: f64,
    pub average_brightness: f64,
    pub color_variance: f64,
    pub total_pixels: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScreeningResult {
    pub is_valid: bool,
    pub confidence: f64,
    pub hair_coverage: u8,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ImageCharacteristics>,
}

impl ScreeningResult {
    fn undecodable() -> Self {
        Self {
            is_valid: false,
            confidence: 0.0,
            hair_coverage: 0,
            reason: "Failed to load image. Please try a different file.".to_string(),
            details: None,
        }
    }

    /// Result for callers that opted out of screening.
    pub fn skipped() -> Self {
        Self {
            is_valid: true,
            confidence: 0.0,
            hair_coverage: 0,
            reason: "Screening skipped by request.".to_string(),
            details: None,
        }
    }
}

/// Decodes an image and resizes it to the 224x224 analysis sample.
pub fn decode_sample(bytes: &[u8]) -> Option<RgbImage> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("Could not decode image: {}", e);
            return None;
        }
    };

    let rgb = decoded.to_rgb8();
    if rgb.dimensions() == (SAMPLE_SIZE, SAMPLE_SIZE) {
        Some(rgb)
    } else {
        Some(image::imageops::resize(
            &rgb,
            SAMPLE_SIZE,
            SAMPLE_SIZE,
            FilterType::Triangle,
        ))
    }
}

/// Decodes the image and runs the scalp heuristics on a 224x224 sample.
pub fn screen_image(bytes: &[u8]) -> ScreeningResult {
    match decode_sample(bytes) {
        Some(sample) => screen_pixels(&sample),
        None => ScreeningResult::undecodable(),
    }
}

pub fn screen_pixels(image: &RgbImage) -> ScreeningResult {
    let analysis = analyze_pixels(image);

    let is_valid = analysis.skin_tone_ratio > MIN_SKIN_RATIO
        && analysis.hair_like_ratio > MIN_HAIR_RATIO
        && analysis.average_brightness > MIN_BRIGHTNESS
        && analysis.average_brightness < MAX_BRIGHTNESS
        && analysis.color_variance > MIN_COLOR_VARIANCE;

    let reason = if is_valid {
        "Valid hair/scalp image detected with good quality."
    } else if analysis.skin_tone_ratio < MIN_SKIN_RATIO {
        "No skin/scalp detected in image. Please ensure scalp is visible."
    } else if analysis.hair_like_ratio < MIN_HAIR_RATIO {
        "Insufficient hair/scalp coverage. Please capture more of the scalp area."
    } else if analysis.average_brightness <= MIN_BRIGHTNESS {
        "Image too dark. Please ensure good lighting conditions."
    } else if analysis.average_brightness >= MAX_BRIGHTNESS {
        "Image overexposed. Please reduce lighting or avoid flash."
    } else {
        "Image quality insufficient for analysis. Please try a clearer photo."
    };

    let coverage = ((analysis.skin_tone_ratio + analysis.hair_like_ratio) * 100.0).clamp(10.0, 95.0);

    debug!(
        "Screening: skin={:.3} hair={:.3} brightness={:.1} variance={:.1} valid={}",
        analysis.skin_tone_ratio,
        analysis.hair_like_ratio,
        analysis.average_brightness,
        analysis.color_variance,
        is_valid
    );

    ScreeningResult {
        is_valid,
        confidence: confidence_score(&analysis),
        hair_coverage: coverage.floor() as u8,
        reason: reason.to_string(),
        details: Some(analysis),
    }
}

pub fn analyze_pixels(image: &RgbImage) -> ImageCharacteristics {
    let mut skin = 0u64;
    let mut hair = 0u64;
    let mut brightness_sum = 0.0;
    let mut variance_sum = 0.0;
    let total = u64::from(image.width()) * u64::from(image.height());

    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        let brightness = brightness(r, g, b);
        brightness_sum += brightness;

        if is_skin_tone(r, g, b) {
            skin += 1;
        }
        if is_hair_like(r, g, b) {
            hair += 1;
        }

        variance_sum += (f64::from(r) - brightness).powi(2)
            + (f64::from(g) - brightness).powi(2)
            + (f64::from(b) - brightness).powi(2);
    }

    if total == 0 {
        return ImageCharacteristics {
            skin_tone_ratio: 0.0,
            hair_like_ratio: 0.0,
            average_brightness: 0.0,
            color_variance: 0.0,
            total_pixels: 0,
        };
    }

    let n = total as f64;
    ImageCharacteristics {
        skin_tone_ratio: skin as f64 / n,
        hair_like_ratio: hair as f64 / n,
        average_brightness: brightness_sum / n,
        color_variance: variance_sum / n,
        total_pixels: total,
    }
}

fn brightness(r: u8, g: u8, b: u8) -> f64 {
    (f64::from(r) + f64::from(g) + f64::from(b)) / 3.0
}

fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    let within = |v: u8, (lo, hi): (u8, u8)| v >= lo && v <= hi;
    SKIN_TONES
        .iter()
        .any(|t| within(r, t.r) && within(g, t.g) && within(b, t.b))
}

fn is_hair_like(r: u8, g: u8, b: u8) -> bool {
    let brightness = brightness(r, g, b);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    // black / dark brown
    if brightness < 60.0 && max - min < 30 {
        return true;
    }

    // brown
    if r > g && r > b && g > b && r < 150 && brightness < 100.0 {
        return true;
    }

    // blonde
    if r > 150 && g > 130 && b < 120 && brightness > 80.0 && brightness < 180.0 {
        return true;
    }

    // grey / white
    r.abs_diff(g) < 20 && g.abs_diff(b) < 20 && brightness > 120.0
}

/// Points out of 100, returned as a 0..1 fraction.
fn confidence_score(analysis: &ImageCharacteristics) -> f64 {
    let mut score = 0.0;

    score += (analysis.skin_tone_ratio * 200.0).min(30.0);
    score += (analysis.hair_like_ratio * 250.0).min(25.0);

    let brightness = analysis.average_brightness;
    if (50.0..=200.0).contains(&brightness) {
        score += 25.0;
    } else if (30.0..=220.0).contains(&brightness) {
        score += 15.0;
    }

    if analysis.color_variance > 500.0 {
        score += 20.0;
    } else if analysis.color_variance > 200.0 {
        score += 10.0;
    }

    f64::min(100.0, score) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    /// Left half painted with `left`, right half with `right`.
    fn split_image(left: [u8; 3], right: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(SAMPLE_SIZE, SAMPLE_SIZE, |x, _| {
            if x < SAMPLE_SIZE / 2 {
                Rgb(left)
            } else {
                Rgb(right)
            }
        })
    }

    #[test]
    fn test_skin_and_hair_image_is_valid() {
        let image = split_image([200, 170, 150], [30, 25, 20]);
        let result = screen_pixels(&image);

        assert!(result.is_valid, "unexpected rejection: {}", result.reason);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.hair_coverage, 95);

        let details = result.details.unwrap();
        assert!((details.skin_tone_ratio - 0.5).abs() < 1e-9);
        assert!((details.hair_like_ratio - 0.5).abs() < 1e-9);
        assert_eq!(details.total_pixels, 224 * 224);
    }

    #[test]
    fn test_black_image_has_no_skin() {
        let image = split_image([0, 0, 0], [0, 0, 0]);
        let result = screen_pixels(&image);

        assert!(!result.is_valid);
        assert!(result.reason.starts_with("No skin/scalp detected"));
    }

    #[test]
    fn test_dark_image_is_rejected_for_lighting() {
        let image = split_image([60, 40, 20], [0, 0, 0]);
        let result = screen_pixels(&image);

        assert!(!result.is_valid);
        assert!(result.reason.starts_with("Image too dark"));
    }

    #[test]
    fn test_bright_image_is_overexposed() {
        let image = split_image([250, 220, 200], [255, 255, 255]);
        let result = screen_pixels(&image);

        assert!(!result.is_valid);
        assert!(result.reason.starts_with("Image overexposed"));
    }

    #[test]
    fn test_skin_without_hair() {
        let image = split_image([200, 170, 150], [200, 170, 150]);
        let result = screen_pixels(&image);

        assert!(!result.is_valid);
        assert!(result.reason.starts_with("Insufficient hair/scalp coverage"));
    }

    #[test]
    fn test_hair_like_rules() {
        assert!(is_hair_like(20, 20, 20));
        assert!(is_hair_like(120, 80, 40));
        assert!(is_hair_like(220, 180, 90));
        assert!(is_hair_like(200, 200, 205));
        assert!(!is_hair_like(40, 200, 40));
    }

    #[test]
    fn test_skin_tone_ranges() {
        assert!(is_skin_tone(230, 190, 160));
        assert!(is_skin_tone(100, 70, 50));
        assert!(!is_skin_tone(20, 20, 200));
    }

    #[test]
    fn test_screen_image_decodes_and_resizes() {
        let image = RgbImage::from_fn(448, 448, |x, _| {
            if x < 224 {
                Rgb([200, 170, 150])
            } else {
                Rgb([30, 25, 20])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();

        let result = screen_image(buf.get_ref());
        assert!(result.is_valid, "unexpected rejection: {}", result.reason);
        assert_eq!(result.details.unwrap().total_pixels, 224 * 224);
    }

    #[test]
    fn test_screen_image_undecodable() {
        let result = screen_image(b"definitely not an image");
        assert!(!result.is_valid);
        assert_eq!(result.confidence, 0.0);
        assert!(result.details.is_none());
    }
}
