//! Skin wellness scoring: pixel metrics for a face photo and the rule table
//! that turns averaged metrics and mood into a care plan.

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::screening::decode_sample;

/// Readings kept for the rolling average, newest last.
pub const MAX_READINGS: usize = 25;

/// Mood scores at or below this are not counted toward the dominant mood.
const MOOD_SCORE_THRESHOLD: f64 = 0.2;

/// Every 8th pixel is sampled.
const PIXEL_STRIDE: usize = 8;

/// Percent scores, 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinMetrics {
    pub hydration: f64,
    pub smoothness: f64,
    pub redness: f64,
    pub oiliness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Mood {
    fn is_low(self) -> bool {
        matches!(self, Mood::Sad | Mood::Angry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MoodReading {
    pub emotion: Mood,
    pub score: f64,
}

/// One frame of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SkinReading {
    #[serde(flatten)]
    pub metrics: SkinMetrics,
    #[serde(default)]
    pub mood: Option<MoodReading>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkinType {
    Oily,
    Dry,
    Combination,
    Sensitive,
    Normal,
    #[serde(rename = "General Wellness")]
    GeneralWellness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallHealth {
    pub score: f64,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Medication {
    pub condition: &'static str,
    pub ingredients: &'static [&'static str],
    pub products: &'static [&'static str],
    pub usage: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YogaPose {
    pub name: &'static str,
    pub duration: &'static str,
    pub benefits: &'static str,
    pub instructions: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YogaRoutine {
    pub category: &'static str,
    pub poses: &'static [YogaPose],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkincareRoutine {
    pub morning: Vec<&'static str>,
    pub evening: Vec<&'static str>,
    pub weekly: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DietPlan {
    pub include: Vec<&'static str>,
    pub avoid: Vec<&'static str>,
    pub supplements: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Built from measured readings.
    Comprehensive,
    /// No readings were collected, so general guidance is returned.
    Wellness,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellnessReport {
    pub session: SessionKind,
    pub skin_type: SkinType,
    pub overall_health: OverallHealth,
    pub medications: Vec<Medication>,
    pub yoga: Vec<YogaRoutine>,
    pub lifestyle: Vec<&'static str>,
    pub skincare: SkincareRoutine,
    pub diet: DietPlan,
    pub metrics: SkinMetrics,
    pub mood: Mood,
    pub generated_at: DateTime<Utc>,
}

/// Decodes a photo and measures it on a 224x224 sample.
pub fn measure_image(bytes: &[u8]) -> Option<SkinMetrics> {
    let sample = decode_sample(bytes)?;
    measure_skin(&sample)
}

/// Colour, shine and texture statistics over every 8th pixel.
pub fn measure_skin(image: &RgbImage) -> Option<SkinMetrics> {
    let mut n = 0usize;
    let (mut total_r, mut total_g, mut total_b) = (0.0, 0.0, 0.0);
    let mut luminance_sum = 0.0;
    let mut saturation_sum = 0.0;
    let mut red = 0usize;
    let mut inflamed = 0usize;
    let mut dry = 0usize;
    let mut shiny = 0usize;
    let mut pores = 0usize;
    let mut smooth = 0usize;
    let mut texture_sum = 0.0;
    let mut contrast_sum = 0.0;
    let mut previous: [Option<f64>; 2] = [None, None];

    for pixel in image.pixels().step_by(PIXEL_STRIDE) {
        let [r, g, b] = pixel.0.map(f64::from);
        n += 1;
        total_r += r;
        total_g += g;
        total_b += b;

        let brightness = (r + g + b) / 3.0;
        let luminance = 0.299 * r + 0.587 * g + 0.114 * b;
        luminance_sum += luminance;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let saturation = if max == 0.0 { 0.0 } else { (max - min) / max };
        saturation_sum += saturation;

        if r / (g + b + 1.0) > 1.3 && r > 120.0 {
            inflamed += 1;
        }
        if r > g + 20.0 && r > b + 20.0 && r > 100.0 {
            red += 1;
        }

        let hydration_index = saturation * (g / (r + 1.0)) * (luminance / 255.0);
        if hydration_index < 0.15 && luminance > 80.0 && luminance < 200.0 {
            dry += 1;
        }
        if luminance > 190.0 && saturation < 0.25 {
            shiny += 1;
        }
        if luminance < 80.0 && saturation < 0.3 {
            pores += 1;
        }

        // The first three samples only seed the neighbour window.
        if n > 3 {
            if let [Some(prev1), Some(prev2)] = previous {
                let local = (brightness - prev1).abs() + (prev1 - prev2).abs();
                texture_sum += local;
                if local < 15.0 {
                    smooth += 1;
                }
                if local > 25.0 {
                    contrast_sum += local;
                }
            }
        }
        previous = [Some(brightness), previous[0]];
    }

    if n == 0 {
        return None;
    }

    let count = n as f64;
    let avg_r = total_r / count;
    let avg_g = total_g / count;
    let avg_b = total_b / count;
    let avg_luminance = luminance_sum / count;
    let avg_saturation = saturation_sum / count;
    let ratio = |hits: usize| hits as f64 / count;

    let dry_ratio = ratio(dry);
    let moisture = avg_saturation * (avg_g / avg_r.max(1.0)) * (1.0 - dry_ratio);
    let hydration = ((moisture * 150.0).min(100.0) - dry_ratio * 80.0 + 20.0).clamp(0.0, 100.0);

    let texture_quality = (100.0 - texture_sum / count * 2.0).max(0.0);
    let pore_quality = (100.0 - ratio(pores) * 300.0).max(0.0);
    let smoothness = (texture_quality * 0.5 + pore_quality * 0.3 + ratio(smooth) * 40.0 * 0.2)
        .clamp(0.0, 100.0);

    let color_balance = ((avg_r - avg_g - avg_b / 2.0) * 0.8).max(0.0);
    let redness = (ratio(inflamed) * 500.0 * 0.4 + ratio(red) * 300.0 * 0.4 + color_balance * 0.2)
        .clamp(0.0, 100.0);

    let shine = (ratio(shiny) * 600.0).min(100.0);
    let glare = ((avg_luminance - 130.0) * 1.5).max(0.0);
    let flatness = ((0.35 - avg_saturation) * 180.0).max(0.0);
    let contrast = (contrast_sum / count * 0.6).min(40.0);
    let oiliness = (shine * 0.4 + glare * 0.3 + flatness * 0.2 + contrast * 0.1).clamp(0.0, 100.0);

    let metrics = SkinMetrics {
        hydration: hydration.round(),
        smoothness: smoothness.round(),
        redness: redness.round(),
        oiliness: oiliness.round(),
    };
    debug!("Measured skin metrics from {} samples: {:?}", n, metrics);
    Some(metrics)
}

pub fn determine_skin_type(metrics: &SkinMetrics) -> SkinType {
    let SkinMetrics {
        hydration,
        redness,
        oiliness,
        ..
    } = *metrics;

    if oiliness > 60.0 && hydration > 50.0 {
        SkinType::Oily
    } else if hydration < 40.0 && oiliness < 30.0 {
        SkinType::Dry
    } else if oiliness > 50.0 && hydration < 50.0 {
        SkinType::Combination
    } else if redness > 40.0 {
        SkinType::Sensitive
    } else {
        SkinType::Normal
    }
}

/// Oiliness scores best at 40; the other metrics score linearly.
pub fn overall_health(metrics: &SkinMetrics) -> OverallHealth {
    let score = (metrics.hydration
        + metrics.smoothness
        + (100.0 - metrics.redness)
        + (100.0 - (metrics.oiliness - 40.0).abs()))
        / 4.0;

    let status = if score >= 80.0 {
        HealthStatus::Excellent
    } else if score >= 60.0 {
        HealthStatus::Good
    } else if score >= 40.0 {
        HealthStatus::Fair
    } else {
        HealthStatus::NeedsAttention
    };

    OverallHealth { score, status }
}

const DEHYDRATED: Medication = Medication {
    condition: "Dehydrated Skin",
    ingredients: &["Hyaluronic Acid", "Ceramides", "Glycerin"],
    products: &[
        "Neutrogena Hydra Boost",
        "CeraVe Daily Moisturizing Lotion",
        "The Ordinary Hyaluronic Acid 2% + B5",
    ],
    usage: "Apply twice daily on clean skin",
};

const IRRITATED: Medication = Medication {
    condition: "Skin Irritation/Redness",
    ingredients: &["Niacinamide", "Centella Asiatica", "Aloe Vera", "Green Tea Extract"],
    products: &[
        "The Ordinary Niacinamide 10% + Zinc 1%",
        "COSRX Centella Blemish Cream",
        "Aloe Vera Gel 99%",
    ],
    usage: "Apply morning and evening, patch test first",
};

const EXCESS_OIL: Medication = Medication {
    condition: "Excess Oil Production",
    ingredients: &["Salicylic Acid", "Niacinamide", "Clay Masks", "Retinol"],
    products: &[
        "Paula's Choice 2% BHA Liquid Exfoliant",
        "The Ordinary Niacinamide",
        "Aztec Secret Indian Healing Clay",
    ],
    usage: "Start with 2-3 times per week, gradually increase",
};

const ROUGH_TEXTURE: Medication = Medication {
    condition: "Rough Skin Texture",
    ingredients: &["AHA (Glycolic/Lactic Acid)", "Retinol", "Vitamin C"],
    products: &[
        "The Ordinary Glycolic Acid 7%",
        "Differin Gel",
        "Vitamin C Serum",
    ],
    usage: "Use AHA at night, start slowly to build tolerance",
};

const DAILY_MAINTENANCE: Medication = Medication {
    condition: "Daily Skin Maintenance",
    ingredients: &["Hyaluronic Acid", "Vitamin C", "Niacinamide", "SPF"],
    products: &[
        "CeraVe Daily Moisturizer",
        "The Ordinary Vitamin C",
        "Neutrogena SPF 30",
    ],
    usage: "Apply daily as part of morning and evening routine",
};

pub fn recommend_medications(metrics: &SkinMetrics) -> Vec<Medication> {
    let mut medications = Vec::new();
    if metrics.hydration < 40.0 {
        medications.push(DEHYDRATED);
    }
    if metrics.redness > 40.0 {
        medications.push(IRRITATED);
    }
    if metrics.oiliness > 60.0 {
        medications.push(EXCESS_OIL);
    }
    if metrics.smoothness < 50.0 {
        medications.push(ROUGH_TEXTURE);
    }
    medications
}

const STRESS_RELIEF: YogaRoutine = YogaRoutine {
    category: "Stress Relief & Anti-Inflammatory",
    poses: &[
        YogaPose {
            name: "Child's Pose (Balasana)",
            duration: "2-3 minutes",
            benefits: "Reduces stress, improves blood circulation to face",
            instructions: "Kneel on floor, sit back on heels, fold forward with arms extended",
        },
        YogaPose {
            name: "Legs Up the Wall (Viparita Karani)",
            duration: "5-10 minutes",
            benefits: "Reduces facial puffiness, calms nervous system",
            instructions: "Lie on back with legs up against wall, arms relaxed at sides",
        },
        YogaPose {
            name: "Fish Pose (Matsyasana)",
            duration: "1-2 minutes",
            benefits: "Improves circulation to face and neck",
            instructions: "Lie on back, arch chest up, top of head touches ground",
        },
    ],
};

const OIL_BALANCE: YogaRoutine = YogaRoutine {
    category: "Detoxification & Oil Balance",
    poses: &[
        YogaPose {
            name: "Twisted Triangle (Parivrtta Trikonasana)",
            duration: "30 seconds each side",
            benefits: "Stimulates liver detoxification, balances hormones",
            instructions: "Stand wide, twist torso and reach opposite hand to floor",
        },
        YogaPose {
            name: "Shoulder Stand (Sarvangasana)",
            duration: "2-5 minutes",
            benefits: "Improves circulation, helps regulate oil production",
            instructions: "Lie on back, lift legs and torso up, support lower back with hands",
        },
        YogaPose {
            name: "Seated Forward Bend (Paschimottanasana)",
            duration: "2-3 minutes",
            benefits: "Calms mind, reduces stress-related oil production",
            instructions: "Sit with legs extended, fold forward over legs",
        },
    ],
};

const OVERALL_SKIN_HEALTH: YogaRoutine = YogaRoutine {
    category: "Overall Skin Health",
    poses: &[
        YogaPose {
            name: "Sun Salutation (Surya Namaskara)",
            duration: "5-10 rounds",
            benefits: "Improves overall circulation, promotes healthy glow",
            instructions: "Flow through 12 poses, synchronizing with breath",
        },
        YogaPose {
            name: "Cobra Pose (Bhujangasana)",
            duration: "30 seconds, 3 times",
            benefits: "Opens chest, improves circulation to face",
            instructions: "Lie face down, press palms down, lift chest up",
        },
        YogaPose {
            name: "Pranayama (Deep Breathing)",
            duration: "5-10 minutes",
            benefits: "Oxygenates skin, reduces stress hormones",
            instructions: "Sit comfortably, breathe deeply through nose, hold, exhale slowly",
        },
    ],
};

const DAILY_WELLNESS: YogaRoutine = YogaRoutine {
    category: "Daily Wellness Routine",
    poses: &[
        YogaPose {
            name: "Sun Salutation (Surya Namaskara)",
            duration: "5-10 rounds",
            benefits: "Improves circulation, promotes healthy glow, energizes body",
            instructions: "Flow through 12 poses, synchronizing with breath",
        },
        YogaPose {
            name: "Deep Breathing (Pranayama)",
            duration: "5-10 minutes",
            benefits: "Oxygenates skin, reduces stress, improves complexion",
            instructions: "Sit comfortably, inhale for 4 counts, hold for 4, exhale for 6",
        },
        YogaPose {
            name: "Mountain Pose (Tadasana)",
            duration: "2-3 minutes",
            benefits: "Improves posture, enhances confidence, grounds energy",
            instructions: "Stand tall, feet hip-width apart, arms at sides, breathe deeply",
        },
    ],
};

const SKIN_SPECIFIC: YogaRoutine = YogaRoutine {
    category: "Skin-Specific Poses",
    poses: &[
        YogaPose {
            name: "Fish Pose (Matsyasana)",
            duration: "1-2 minutes",
            benefits: "Increases blood flow to face, opens throat chakra",
            instructions: "Lie on back, arch chest, top of head touches ground",
        },
        YogaPose {
            name: "Cobra Pose (Bhujangasana)",
            duration: "30 seconds, 3 times",
            benefits: "Opens chest, improves circulation to face and neck",
            instructions: "Lie face down, press palms, lift chest keeping hips down",
        },
        YogaPose {
            name: "Legs Up Wall (Viparita Karani)",
            duration: "5-10 minutes",
            benefits: "Reduces puffiness, calms nervous system, improves lymphatic drainage",
            instructions: "Lie with legs up wall, arms relaxed, breathe naturally",
        },
        YogaPose {
            name: "Child's Pose (Balasana)",
            duration: "3-5 minutes",
            benefits: "Reduces stress, calms mind, improves blood flow to head",
            instructions: "Kneel, sit back on heels, fold forward with arms extended",
        },
    ],
};

pub fn recommend_yoga(mood: Mood, metrics: &SkinMetrics) -> Vec<YogaRoutine> {
    let mut routines = Vec::new();
    if metrics.redness > 30.0 || mood.is_low() {
        routines.push(STRESS_RELIEF);
    }
    if metrics.oiliness > 50.0 {
        routines.push(OIL_BALANCE);
    }
    routines.push(OVERALL_SKIN_HEALTH);
    routines
}

pub fn recommend_lifestyle(mood: Mood, metrics: &SkinMetrics) -> Vec<&'static str> {
    let mut tips = Vec::new();
    if metrics.hydration < 50.0 {
        tips.extend([
            "Drink 8-10 glasses of water daily",
            "Use a humidifier in your room",
            "Take lukewarm showers instead of hot",
        ]);
    }
    if metrics.redness > 30.0 {
        tips.extend([
            "Always wear SPF 30+ sunscreen",
            "Use fragrance-free products",
            "Apply cool compresses for 10 minutes daily",
        ]);
    }
    if metrics.oiliness > 60.0 {
        tips.extend([
            "Cleanse face twice daily with gentle cleanser",
            "Clean your phone screen regularly",
            "Change pillowcases every 2-3 days",
        ]);
    }
    if mood.is_low() {
        tips.extend([
            "Maintain 7-9 hours of quality sleep",
            "Practice 10 minutes of meditation daily",
            "Take 30-minute walks in nature",
        ]);
    }
    tips
}

pub fn recommend_skincare(metrics: &SkinMetrics) -> SkincareRoutine {
    let mut routine = SkincareRoutine::default();

    routine.morning.push("Gentle cleanser");
    if metrics.redness > 30.0 {
        routine.morning.push("Soothing toner with niacinamide");
    }
    if metrics.hydration < 50.0 {
        routine.morning.push("Hydrating serum");
    }
    routine.morning.push("Moisturizer suitable for your skin type");
    routine.morning.push("Broad-spectrum SPF 30+");

    routine.evening.push("Double cleanse (oil cleanser + water-based)");
    if metrics.oiliness > 50.0 {
        routine.evening.push("BHA exfoliant (2-3x/week)");
    }
    if metrics.smoothness < 50.0 {
        routine.evening.push("AHA exfoliant (1-2x/week)");
    }
    if metrics.hydration < 50.0 {
        routine.evening.push("Hydrating essence");
    }
    routine.evening.push("Night moisturizer or sleeping mask");

    if metrics.hydration < 50.0 {
        routine.weekly.push("Hydrating sheet mask (2x/week)");
    }
    if metrics.oiliness > 60.0 {
        routine.weekly.push("Clay mask (1x/week)");
    }
    if metrics.redness > 30.0 {
        routine.weekly.push("Calming mask with centella (1x/week)");
    }

    routine
}

const IRRITANTS: [&str; 4] = [
    "Spicy foods and alcohol",
    "Caffeine (dehydrates skin)",
    "Alcohol (worsens dryness)",
    "Excess salt (causes water retention)",
];

fn push_unique(list: &mut Vec<&'static str>, items: &[&'static str]) {
    for item in items {
        if !list.contains(item) {
            list.push(item);
        }
    }
}

/// Each list keeps first-seen order without repeats.
pub fn recommend_diet(metrics: &SkinMetrics) -> DietPlan {
    let mut diet = DietPlan::default();

    if metrics.hydration < 60.0 {
        push_unique(
            &mut diet.include,
            &[
                "Water-rich foods: cucumber, watermelon, oranges",
                "Healthy fats: avocado, nuts, olive oil",
            ],
        );
        push_unique(&mut diet.avoid, &IRRITANTS);
        push_unique(&mut diet.supplements, &["Omega-3 fatty acids"]);
    }
    if metrics.redness > 30.0 {
        push_unique(
            &mut diet.include,
            &[
                "Anti-inflammatory foods: berries, leafy greens",
                "Fatty fish: salmon, mackerel, sardines",
            ],
        );
        push_unique(&mut diet.avoid, &IRRITANTS);
        push_unique(&mut diet.supplements, &["Vitamin E and Zinc"]);
    }
    if metrics.oiliness > 60.0 {
        push_unique(
            &mut diet.include,
            &[
                "Zinc-rich foods: pumpkin seeds, chickpeas",
                "Green tea (2-3 cups daily)",
            ],
        );
        push_unique(
            &mut diet.avoid,
            &[
                "Fried and processed foods",
                "Dairy products (may increase oil production)",
            ],
        );
        push_unique(&mut diet.supplements, &["Zinc and Probiotics"]);
    }
    if metrics.smoothness < 50.0 {
        push_unique(
            &mut diet.include,
            &[
                "Vitamin C foods: citrus, bell peppers",
                "Beta-carotene foods: carrots, sweet potatoes",
            ],
        );
        push_unique(&mut diet.supplements, &["Vitamin C and Collagen"]);
    }

    diet
}

pub fn comprehensive_report(metrics: SkinMetrics, mood: Mood) -> WellnessReport {
    WellnessReport {
        session: SessionKind::Comprehensive,
        skin_type: determine_skin_type(&metrics),
        overall_health: overall_health(&metrics),
        medications: recommend_medications(&metrics),
        yoga: recommend_yoga(mood, &metrics),
        lifestyle: recommend_lifestyle(mood, &metrics),
        skincare: recommend_skincare(&metrics),
        diet: recommend_diet(&metrics),
        metrics,
        mood,
        generated_at: Utc::now(),
    }
}

/// Guidance for a session that collected no readings.
pub fn general_wellness_report() -> WellnessReport {
    WellnessReport {
        session: SessionKind::Wellness,
        skin_type: SkinType::GeneralWellness,
        overall_health: OverallHealth {
            score: 75.0,
            status: HealthStatus::Good,
        },
        medications: vec![DAILY_MAINTENANCE],
        yoga: vec![DAILY_WELLNESS, SKIN_SPECIFIC],
        lifestyle: vec![
            "Drink 8-10 glasses of water daily for optimal hydration",
            "Maintain 7-9 hours of quality sleep for skin repair",
            "Always wear SPF 30+ sunscreen, even indoors",
            "Practice 10 minutes of meditation daily for stress reduction",
            "Take 30-minute walks in nature for fresh air and exercise",
            "Clean phone screen regularly to prevent bacteria transfer",
            "Change pillowcases every 2-3 days for cleaner skin contact",
        ],
        skincare: SkincareRoutine {
            morning: vec![
                "Gentle cleanser with lukewarm water",
                "Vitamin C serum for antioxidant protection",
                "Lightweight moisturizer suitable for your skin type",
                "Broad-spectrum SPF 30+ sunscreen",
            ],
            evening: vec![
                "Double cleanse (oil cleanser + water-based cleanser)",
                "Hydrating toner or essence",
                "Night moisturizer or sleeping mask",
                "Eye cream for delicate under-eye area",
            ],
            weekly: vec![
                "Hydrating sheet mask (2x per week)",
                "Gentle exfoliation with AHA/BHA (1x per week)",
                "Clay mask for deep cleansing (1x per week)",
            ],
        },
        diet: DietPlan {
            include: vec![
                "Water-rich foods: cucumber, watermelon, oranges",
                "Healthy fats: avocado, nuts, olive oil, fatty fish",
                "Antioxidant-rich foods: berries, leafy greens, dark chocolate",
                "Vitamin C foods: citrus fruits, bell peppers, broccoli",
                "Beta-carotene foods: carrots, sweet potatoes, spinach",
                "Green tea (2-3 cups daily) for anti-inflammatory benefits",
            ],
            avoid: vec![
                "Processed and fried foods that can cause inflammation",
                "Excessive sugar that can accelerate skin aging",
                "Dairy products if you notice skin reactions",
                "Very spicy foods if you have sensitive skin",
            ],
            supplements: vec![
                "Omega-3 fatty acids for skin hydration",
                "Vitamin C for collagen production",
                "Vitamin E for antioxidant protection",
                "Zinc for skin healing and oil regulation",
                "Probiotics for gut-skin health connection",
            ],
        },
        metrics: SkinMetrics {
            hydration: 65.0,
            smoothness: 70.0,
            redness: 25.0,
            oiliness: 45.0,
        },
        mood: Mood::Neutral,
        generated_at: Utc::now(),
    }
}

/// Most frequent confident mood. Ties go to the mood first seen last.
fn dominant_mood<'a>(readings: impl Iterator<Item = &'a MoodReading>) -> Mood {
    let mut counts: Vec<(Mood, usize)> = Vec::new();
    for reading in readings.filter(|m| m.score > MOOD_SCORE_THRESHOLD) {
        match counts.iter_mut().find(|(mood, _)| *mood == reading.emotion) {
            Some((_, count)) => *count += 1,
            None => counts.push((reading.emotion, 1)),
        }
    }

    counts
        .into_iter()
        .fold(None, |best: Option<(Mood, usize)>, (mood, count)| match best {
            Some((_, top)) if top > count => best,
            _ => Some((mood, count)),
        })
        .map_or(Mood::Neutral, |(mood, _)| mood)
}

/// Averages the last `MAX_READINGS` readings into a report. With no
/// readings the general wellness report is returned.
pub fn summarize(readings: &[SkinReading]) -> WellnessReport {
    let window = &readings[readings.len().saturating_sub(MAX_READINGS)..];
    if window.is_empty() {
        return general_wellness_report();
    }

    let n = window.len() as f64;
    let mean = |field: fn(&SkinMetrics) -> f64| {
        (window.iter().map(|r| field(&r.metrics)).sum::<f64>() / n).round()
    };
    let metrics = SkinMetrics {
        hydration: mean(|m| m.hydration),
        smoothness: mean(|m| m.smoothness),
        redness: mean(|m| m.redness),
        oiliness: mean(|m| m.oiliness),
    };
    let mood = dominant_mood(window.iter().filter_map(|r| r.mood.as_ref()));

    comprehensive_report(metrics, mood)
}
