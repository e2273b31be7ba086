//! Demographic facets, quota planning and realized-distribution statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::DemographicsConfig;
use crate::types::{AgeBracket, IncomeLevel, LocationType, Persona};

const TECH_LEVELS: [&str; 5] = ["1", "2", "3", "4", "5"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Age,
    Income,
    Location,
    TechSavviness,
}

impl Facet {
    pub const ALL: [Facet; 4] = [Self::Age, Self::Income, Self::Location, Self::TechSavviness];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Income => "income",
            Self::Location => "location",
            Self::TechSavviness => "tech_savviness",
        }
    }

    /// Wording used in generation prompts
    fn prompt_label(&self) -> &'static str {
        match self {
            Self::Age => "age bracket",
            Self::Income => "income",
            Self::Location => "location",
            Self::TechSavviness => "tech-savviness",
        }
    }

    /// Every bucket label of this facet, in canonical order
    pub fn labels(&self) -> Vec<&'static str> {
        match self {
            Self::Age => AgeBracket::ALL.iter().map(|a| a.as_str()).collect(),
            Self::Income => IncomeLevel::ALL.iter().map(|i| i.as_str()).collect(),
            Self::Location => LocationType::ALL.iter().map(|l| l.as_str()).collect(),
            Self::TechSavviness => TECH_LEVELS.to_vec(),
        }
    }

    pub fn bucket_of(&self, persona: &Persona) -> String {
        match self {
            Self::Age => persona.age_bracket().as_str().to_string(),
            Self::Income => persona.income_bracket.as_str().to_string(),
            Self::Location => persona.location_type.as_str().to_string(),
            Self::TechSavviness => persona.tech_savviness.to_string(),
        }
    }

    fn targets<'a>(&self, demographics: &'a DemographicsConfig) -> &'a BTreeMap<String, f64> {
        match self {
            Self::Age => &demographics.age,
            Self::Income => &demographics.income,
            Self::Location => &demographics.location,
            Self::TechSavviness => &demographics.tech_savviness,
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Realized count per facet and bucket label
pub type FacetCounts = BTreeMap<Facet, BTreeMap<String, usize>>;

pub fn realized_counts(population: &[Persona]) -> FacetCounts {
    let mut counts = FacetCounts::new();
    for facet in Facet::ALL {
        let buckets = counts.entry(facet).or_default();
        for persona in population {
            *buckets.entry(facet.bucket_of(persona)).or_default() += 1;
        }
    }
    counts
}

/// Mean normalized Shannon entropy across facets, 0-100
pub fn diversity_score(population: &[Persona]) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let counts = realized_counts(population);
    let total = population.len() as f64;

    let per_facet: Vec<f64> = Facet::ALL
        .iter()
        .map(|facet| {
            let max_entropy = (facet.labels().len() as f64).ln();
            let entropy: f64 = counts
                .get(facet)
                .into_iter()
                .flat_map(|b| b.values())
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / total;
                    -p * p.ln()
                })
                .sum();
            if max_entropy > 0.0 {
                entropy / max_entropy
            } else {
                0.0
            }
        })
        .collect();

    let mean = per_facet.iter().sum::<f64>() / per_facet.len() as f64;
    (mean * 10_000.0).round() / 100.0
}

// =============================================================================
// Quota plan
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketQuota {
    pub label: String,
    pub target_pct: f64,
    pub quota: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetQuota {
    pub facet: Facet,
    pub buckets: Vec<BucketQuota>,
}

/// Advisory per-bucket targets for a population of a given size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaPlan {
    pub size: usize,
    /// Constrained facets only
    pub facets: Vec<FacetQuota>,
}

impl QuotaPlan {
    /// `round(size * pct / 100)`, at least 1 for any bucket with a positive
    /// target. Facets with no positive targets are left unconstrained.
    pub fn new(size: usize, demographics: &DemographicsConfig) -> Self {
        let mut facets = Vec::new();
        for facet in Facet::ALL {
            let known = facet.labels();
            let mut buckets = Vec::new();
            for (label, pct) in facet.targets(demographics) {
                let label = label.trim();
                if !known.iter().any(|k| *k == label) {
                    warn!(facet = %facet, "Ignoring unknown demographic bucket '{}'", label);
                    continue;
                }
                if *pct <= 0.0 {
                    continue;
                }
                let quota = ((size as f64 * pct / 100.0).round() as usize).max(1);
                buckets.push(BucketQuota {
                    label: label.to_string(),
                    target_pct: *pct,
                    quota,
                });
            }
            if !buckets.is_empty() {
                buckets.sort_by_key(|b| known.iter().position(|k| *k == b.label));
                facets.push(FacetQuota { facet, buckets });
            }
        }
        Self { size, facets }
    }

    pub fn is_constrained(&self) -> bool {
        !self.facets.is_empty()
    }

    pub fn facet(&self, facet: Facet) -> Option<&FacetQuota> {
        self.facets.iter().find(|f| f.facet == facet)
    }

    /// Assign a demographic target to each of `slots` personas, steering
    /// every constrained facet toward the bucket with the largest remaining
    /// deficit. Ties go to the earlier bucket.
    pub fn assign_batch(&self, realized: &FacetCounts, slots: usize) -> Vec<SlotTarget> {
        let mut planned: BTreeMap<(Facet, String), usize> = BTreeMap::new();
        let mut out = Vec::with_capacity(slots);

        for _ in 0..slots {
            let mut target = SlotTarget::default();
            for fq in &self.facets {
                let have = |label: &str| {
                    let realized = realized
                        .get(&fq.facet)
                        .and_then(|b| b.get(label))
                        .copied()
                        .unwrap_or(0);
                    let planned = planned
                        .get(&(fq.facet, label.to_string()))
                        .copied()
                        .unwrap_or(0);
                    (realized + planned) as i64
                };

                let mut best: Option<(&BucketQuota, i64)> = None;
                for bucket in &fq.buckets {
                    let deficit = bucket.quota as i64 - have(&bucket.label);
                    if best.is_none_or(|(_, d)| deficit > d) {
                        best = Some((bucket, deficit));
                    }
                }
                if let Some((bucket, _)) = best {
                    *planned.entry((fq.facet, bucket.label.clone())).or_default() += 1;
                    target.buckets.push((fq.facet, bucket.label.clone()));
                }
            }
            out.push(target);
        }
        out
    }
}

/// Requested demographics for one persona in a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotTarget {
    pub buckets: Vec<(Facet, String)>,
}

impl SlotTarget {
    pub fn describe(&self) -> String {
        if self.buckets.is_empty() {
            return "any demographic profile".to_string();
        }
        self.buckets
            .iter()
            .map(|(facet, label)| format!("{} {}", facet.prompt_label(), label))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketReport {
    pub label: String,
    pub realized_count: usize,
    pub realized_pct: f64,
    pub target_pct: Option<f64>,
    pub quota: Option<usize>,
    /// Realized minus target, in percentage points
    pub deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetReport {
    pub facet: Facet,
    pub constrained: bool,
    pub buckets: Vec<BucketReport>,
}

/// Realized-vs-target comparison for every facet
pub fn facet_reports(population: &[Persona], plan: &QuotaPlan) -> Vec<FacetReport> {
    let counts = realized_counts(population);
    let total = population.len().max(1) as f64;
    let round2 = |v: f64| (v * 100.0).round() / 100.0;

    Facet::ALL
        .iter()
        .map(|facet| {
            let quota = plan.facet(*facet);
            let buckets = facet
                .labels()
                .into_iter()
                .map(|label| {
                    let realized_count = counts
                        .get(facet)
                        .and_then(|b| b.get(label))
                        .copied()
                        .unwrap_or(0);
                    let realized_pct = round2(realized_count as f64 / total * 100.0);
                    let target = quota.and_then(|q| q.buckets.iter().find(|b| b.label == label));
                    BucketReport {
                        label: label.to_string(),
                        realized_count,
                        realized_pct,
                        target_pct: target.map(|t| t.target_pct),
                        quota: target.map(|t| t.quota),
                        deviation_pct: target.map(|t| round2(realized_pct - t.target_pct)),
                    }
                })
                .collect();
            FacetReport {
                facet: *facet,
                constrained: quota.is_some(),
                buckets,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::persona_record;

    fn persona(age: u8) -> Persona {
        Persona::from_value(&persona_record("p", age)).unwrap()
    }

    fn age_only(entries: &[(&str, f64)]) -> DemographicsConfig {
        let mut demographics = DemographicsConfig::unconstrained();
        demographics.age = entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        demographics
    }

    #[test]
    fn test_quotas_round_with_floor_of_one() {
        let plan = QuotaPlan::new(10, &age_only(&[("18-24", 20.0), ("25-34", 30.0), ("65+", 1.0), ("55-64", 0.0)]));
        let age = plan.facet(Facet::Age).unwrap();
        let quotas: Vec<(&str, usize)> = age.buckets.iter().map(|b| (b.label.as_str(), b.quota)).collect();
        assert_eq!(quotas, vec![("18-24", 2), ("25-34", 3), ("65+", 1)]);
        assert!(plan.facet(Facet::Income).is_none());
    }

    #[test]
    fn test_all_zero_facet_is_unconstrained() {
        let plan = QuotaPlan::new(10, &age_only(&[("18-24", 0.0)]));
        assert!(!plan.is_constrained());
        let slots = plan.assign_batch(&FacetCounts::new(), 2);
        assert_eq!(slots[0].describe(), "any demographic profile");
    }

    #[test]
    fn test_unknown_labels_ignored() {
        let plan = QuotaPlan::new(10, &age_only(&[("teens", 50.0), ("25-34", 50.0)]));
        assert_eq!(plan.facet(Facet::Age).unwrap().buckets.len(), 1);
    }

    #[test]
    fn test_batch_steers_to_largest_deficit() {
        let plan = QuotaPlan::new(10, &age_only(&[("18-24", 20.0), ("25-34", 30.0), ("35-44", 50.0)]));
        let slots = plan.assign_batch(&FacetCounts::new(), 5);
        let labels: Vec<&str> = slots.iter().map(|s| s.buckets[0].1.as_str()).collect();
        assert_eq!(labels, vec!["35-44", "35-44", "25-34", "35-44", "18-24"]);
        assert_eq!(slots[0].describe(), "age bracket 35-44");
    }

    #[test]
    fn test_batch_accounts_for_realized() {
        let plan = QuotaPlan::new(10, &age_only(&[("18-24", 50.0), ("25-34", 50.0)]));
        let realized = realized_counts(&[persona(20), persona(21), persona(22), persona(23)]);
        let slots = plan.assign_batch(&realized, 1);
        assert_eq!(slots[0].buckets[0].1, "25-34");
    }

    #[test]
    fn test_diversity_bounds() {
        assert_eq!(diversity_score(&[]), 0.0);
        let same: Vec<Persona> = (0..5).map(|_| persona(30)).collect();
        assert_eq!(diversity_score(&same), 0.0);

        let mixed: Vec<Persona> = [20, 30, 40, 50, 60, 70].iter().map(|a| persona(*a)).collect();
        let score = diversity_score(&mixed);
        // age facet is maximally spread, the other three are constant
        assert!((score - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_report_compares_target_and_realized() {
        let plan = QuotaPlan::new(2, &age_only(&[("18-24", 50.0), ("25-34", 50.0)]));
        let reports = facet_reports(&[persona(20), persona(21)], &plan);
        let age = &reports[0];
        assert!(age.constrained);
        let young = age.buckets.iter().find(|b| b.label == "18-24").unwrap();
        assert_eq!(young.realized_count, 2);
        assert_eq!(young.deviation_pct, Some(50.0));
        let older = age.buckets.iter().find(|b| b.label == "25-34").unwrap();
        assert_eq!(older.deviation_pct, Some(-50.0));
        assert!(!reports[1].constrained);
    }
}
