//! Semantic Similarity Rating
//!
//! Converts a free-text answer into a probability mass function over Likert
//! levels 1..=5. The answer and every reference phrase are embedded; per
//! reference set the five cosine similarities go through a temperature-scaled
//! softmax, `epsilon` of uniform mass is blended in, and the per-set PMFs are
//! averaged.

mod references;

pub use references::{default_scale, default_scales};

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::debug;

use crate::ai::embedding::{SharedEmbedder, cosine_similarity};
use crate::constants::ssr::{LIKERT_LEVELS, PMF_TOLERANCE};
use crate::types::{MarketError, Result};

// =============================================================================
// Dimensions
// =============================================================================

/// A rated aspect of a respondent's reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Interest,
    PurchaseIntent,
    Disappointment,
    Recommendation,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Self::Interest,
        Self::PurchaseIntent,
        Self::Disappointment,
        Self::Recommendation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interest => "interest",
            Self::PurchaseIntent => "purchase_intent",
            Self::Disappointment => "disappointment",
            Self::Recommendation => "recommendation",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// PMF
// =============================================================================

/// Probabilities for Likert levels 1..=5 (index 0 is level 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Pmf([f64; LIKERT_LEVELS]);

impl Pmf {
    /// Validate non-negativity and unit sum
    pub fn new(values: [f64; LIKERT_LEVELS]) -> Result<Self> {
        if values.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(MarketError::rating(
                "pmf",
                format!("negative or non-finite entry in {:?}", values),
            ));
        }
        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > PMF_TOLERANCE {
            return Err(MarketError::rating(
                "pmf",
                format!("entries sum to {} instead of 1", sum),
            ));
        }
        Ok(Self(values))
    }

    pub fn uniform() -> Self {
        Self([1.0 / LIKERT_LEVELS as f64; LIKERT_LEVELS])
    }

    /// All mass on one level (1..=5)
    pub fn point(level: u8) -> Self {
        let mut values = [0.0; LIKERT_LEVELS];
        let idx = usize::from(level.clamp(1, LIKERT_LEVELS as u8)) - 1;
        values[idx] = 1.0;
        Self(values)
    }

    pub fn values(&self) -> &[f64; LIKERT_LEVELS] {
        &self.0
    }

    /// Probability of a single level (1..=5)
    pub fn at(&self, level: u8) -> f64 {
        self.mass(level..=level)
    }

    /// Total probability over an inclusive level range, e.g. `4..=5`
    pub fn mass(&self, levels: RangeInclusive<u8>) -> f64 {
        levels
            .filter(|l| (1..=LIKERT_LEVELS as u8).contains(l))
            .map(|l| self.0[usize::from(l) - 1])
            .sum()
    }

    /// Dot product with [1, 2, 3, 4, 5]
    pub fn expected_value(&self) -> f64 {
        self.0
            .iter()
            .enumerate()
            .map(|(i, p)| (i + 1) as f64 * p)
            .sum()
    }

    /// Most probable level; ties resolve to the lower level
    pub fn mode(&self) -> u8 {
        let mut best = 0;
        for (i, p) in self.0.iter().enumerate() {
            if *p > self.0[best] {
                best = i;
            }
        }
        (best + 1) as u8
    }

    /// Elementwise arithmetic mean. `None` for an empty input.
    pub fn mean<'a>(pmfs: impl IntoIterator<Item = &'a Pmf>) -> Option<Pmf> {
        let mut sum = [0.0; LIKERT_LEVELS];
        let mut count = 0usize;
        for pmf in pmfs {
            for (acc, p) in sum.iter_mut().zip(pmf.0.iter()) {
                *acc += p;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(Pmf(sum.map(|s| s / count as f64)))
    }
}

impl TryFrom<Vec<f64>> for Pmf {
    type Error = MarketError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        let array: [f64; LIKERT_LEVELS] = values.try_into().map_err(|v: Vec<f64>| {
            MarketError::rating("pmf", format!("expected 5 entries, got {}", v.len()))
        })?;
        Pmf::new(array)
    }
}

impl From<Pmf> for Vec<f64> {
    fn from(pmf: Pmf) -> Self {
        pmf.0.to_vec()
    }
}

/// Softmax over similarities scaled by `1 / temperature`, smoothed with
/// `epsilon` uniform mass, averaged over reference sets.
///
/// Callers guarantee `temperature > 0`, `0 <= epsilon < 1` and at least one set.
pub fn pmf_from_similarities(
    similarities: &[[f64; LIKERT_LEVELS]],
    temperature: f64,
    epsilon: f64,
) -> Pmf {
    let per_set: Vec<Pmf> = similarities
        .iter()
        .map(|sims| {
            let max = sims.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps = sims.map(|s| ((s - max) / temperature).exp());
            let total: f64 = exps.iter().sum();
            Pmf(exps.map(|e| (1.0 - epsilon) * (e / total) + epsilon / LIKERT_LEVELS as f64))
        })
        .collect();
    Pmf::mean(&per_set).unwrap_or_else(Pmf::uniform)
}

// =============================================================================
// Reference Scales
// =============================================================================

/// Five phrases, one per Likert level, in level order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub phrases: [String; LIKERT_LEVELS],
}

impl ReferenceSet {
    pub fn new(phrases: [&str; LIKERT_LEVELS]) -> Self {
        Self {
            phrases: phrases.map(String::from),
        }
    }
}

/// Independently worded reference sets for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub dimension: Dimension,
    pub sets: Vec<ReferenceSet>,
}

/// A scale whose reference phrases have been embedded
#[derive(Debug, Clone)]
pub struct CalibratedScale {
    dimension: Dimension,
    sets: Vec<[Vec<f32>; LIKERT_LEVELS]>,
}

impl CalibratedScale {
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }
}

// =============================================================================
// Rating Converter
// =============================================================================

pub struct RatingConverter {
    embedder: SharedEmbedder,
    temperature: f64,
    epsilon: f64,
}

impl RatingConverter {
    pub fn new(embedder: SharedEmbedder, temperature: f64, epsilon: f64) -> Result<Self> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(MarketError::Config(format!(
                "SSR temperature must be greater than 0, got {}",
                temperature
            )));
        }
        if !(0.0..1.0).contains(&epsilon) {
            return Err(MarketError::Config(format!(
                "SSR epsilon must be in [0, 1), got {}",
                epsilon
            )));
        }
        Ok(Self {
            embedder,
            temperature,
            epsilon,
        })
    }

    /// Embed every reference phrase of a scale once
    pub async fn calibrate(&self, scale: &RatingScale) -> Result<CalibratedScale> {
        if scale.sets.is_empty() {
            return Err(MarketError::rating(
                scale.dimension.as_str(),
                "scale has no reference sets",
            ));
        }
        let phrases: Vec<String> = scale
            .sets
            .iter()
            .flat_map(|set| set.phrases.iter().cloned())
            .collect();

        let vectors = self
            .embedder
            .embed_batch(&phrases)
            .await
            .map_err(|e| MarketError::rating(scale.dimension.as_str(), e.to_string()))?;
        if vectors.len() != phrases.len() {
            return Err(MarketError::rating(
                scale.dimension.as_str(),
                format!("expected {} embeddings, got {}", phrases.len(), vectors.len()),
            ));
        }

        let mut iter = vectors.into_iter();
        let sets = scale
            .sets
            .iter()
            .map(|_| std::array::from_fn(|_| iter.next().unwrap_or_default()))
            .collect();

        debug!(dimension = %scale.dimension, "Calibrated {} reference phrases", phrases.len());
        Ok(CalibratedScale {
            dimension: scale.dimension,
            sets,
        })
    }

    /// Convert one free-text answer into a PMF
    pub async fn convert(&self, scale: &CalibratedScale, text: &str) -> Result<Pmf> {
        let dimension = scale.dimension.as_str();
        if text.trim().is_empty() {
            return Err(MarketError::rating(dimension, "response text is empty"));
        }

        let response = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| MarketError::rating(dimension, e.to_string()))?;

        let similarities: Vec<[f64; LIKERT_LEVELS]> = scale
            .sets
            .iter()
            .map(|set| std::array::from_fn(|level| cosine_similarity(&response, &set[level])))
            .collect();

        Ok(pmf_from_similarities(
            &similarities,
            self.temperature,
            self.epsilon,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingEmbedder, KeywordEmbedder};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn converter(temperature: f64) -> RatingConverter {
        RatingConverter::new(Arc::new(KeywordEmbedder), temperature, 0.01).unwrap()
    }

    #[test]
    fn test_construction_validates_parameters() {
        let embedder: SharedEmbedder = Arc::new(KeywordEmbedder);
        assert!(RatingConverter::new(embedder.clone(), 0.0, 0.01).is_err());
        assert!(RatingConverter::new(embedder.clone(), -1.0, 0.01).is_err());
        assert!(RatingConverter::new(embedder.clone(), 1.0, 1.0).is_err());
        assert!(RatingConverter::new(embedder.clone(), 1.0, -0.1).is_err());
        assert!(RatingConverter::new(embedder, 1.0, 0.0).is_ok());
    }

    #[test]
    fn test_pmf_helpers() {
        let pmf = Pmf::new([0.1, 0.1, 0.2, 0.3, 0.3]).unwrap();
        assert!((pmf.mass(4..=5) - 0.6).abs() < 1e-12);
        assert!((pmf.expected_value() - 3.6).abs() < 1e-12);
        assert_eq!(pmf.mode(), 4);
        assert_eq!(Pmf::point(5).at(5), 1.0);
        assert!(Pmf::new([0.5, 0.5, 0.5, 0.0, 0.0]).is_err());
        assert!(Pmf::new([-0.1, 0.3, 0.3, 0.3, 0.2]).is_err());
        assert!(Pmf::mean(&Vec::<Pmf>::new()).is_none());
    }

    #[test]
    fn test_pmf_serde_validates() {
        let json = serde_json::to_string(&Pmf::uniform()).unwrap();
        let back: Pmf = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Pmf::uniform());
        assert!(serde_json::from_str::<Pmf>("[0.5, 0.5]").is_err());
    }

    #[test]
    fn test_identical_similarities_give_uniform() {
        let pmf = pmf_from_similarities(&[[0.3; 5], [0.7; 5]], 1.0, 0.01);
        for p in pmf.values() {
            assert!((p - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_epsilon_floor() {
        let pmf = pmf_from_similarities(&[[0.0, 0.0, 0.0, 0.0, 50.0]], 0.01, 0.05);
        assert!(pmf.values().iter().all(|p| *p >= 0.05 / 5.0 - 1e-12));
    }

    fn anchor_scale() -> RatingScale {
        RatingScale {
            dimension: Dimension::Interest,
            sets: vec![ReferenceSet::new(["alpha", "bravo", "charlie", "delta", "echo"])],
        }
    }

    #[tokio::test]
    async fn test_matching_phrase_maps_to_its_level() {
        let converter = converter(0.1);
        let scale = converter.calibrate(&anchor_scale()).await.unwrap();

        let high = converter.convert(&scale, "echo").await.unwrap();
        let low = converter.convert(&scale, "alpha").await.unwrap();
        let mid = converter.convert(&scale, "charlie").await.unwrap();
        assert_eq!(high.mode(), 5);
        assert_eq!(low.mode(), 1);
        assert_eq!(mid.mode(), 3);
        assert!(high.expected_value() > mid.expected_value());
        assert!(mid.expected_value() > low.expected_value());
    }

    #[tokio::test]
    async fn test_default_scales_calibrate() {
        let converter = converter(1.0);
        for scale in default_scales() {
            let calibrated = converter.calibrate(&scale).await.unwrap();
            assert_eq!(calibrated.dimension(), scale.dimension);
            let pmf = converter
                .convert(&calibrated, "I really like this")
                .await
                .unwrap();
            assert!(Pmf::new(*pmf.values()).is_ok());
        }
    }

    #[tokio::test]
    async fn test_empty_text_fails() {
        let converter = converter(1.0);
        let scale = converter
            .calibrate(&default_scale(Dimension::Interest))
            .await
            .unwrap();
        let err = converter.convert(&scale, "   ").await.unwrap_err();
        assert!(matches!(err, MarketError::RatingConversion { .. }));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_rating_error() {
        let converter = RatingConverter::new(Arc::new(FailingEmbedder), 1.0, 0.01).unwrap();
        let err = converter
            .calibrate(&default_scale(Dimension::Recommendation))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::RatingConversion { .. }));
    }

    proptest! {
        #[test]
        fn prop_pmf_is_valid(
            sims in prop::collection::vec(prop::array::uniform5(-1.0f64..1.0), 1..4),
            temperature in 0.01f64..5.0,
            epsilon in 0.0f64..0.99,
        ) {
            let pmf = pmf_from_similarities(&sims, temperature, epsilon);
            prop_assert!(pmf.values().iter().all(|p| *p >= 0.0));
            let sum: f64 = pmf.values().iter().sum();
            prop_assert!((sum - 1.0).abs() < PMF_TOLERANCE);
            prop_assert!(Pmf::new(*pmf.values()).is_ok());
        }

        #[test]
        fn prop_raising_a_similarity_never_lowers_its_level(
            sims in prop::array::uniform5(-1.0f64..1.0),
            level in 0usize..5,
            bump in 0.0f64..1.0,
        ) {
            let before = pmf_from_similarities(&[sims], 1.0, 0.01);
            let mut raised = sims;
            raised[level] += bump;
            let after = pmf_from_similarities(&[raised], 1.0, 0.01);
            prop_assert!(after.values()[level] >= before.values()[level] - 1e-12);
        }
    }
}
