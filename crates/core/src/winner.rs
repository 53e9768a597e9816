//! Leading/winning variant selection.
//!
//! The same computation backs the "leading" label of an active experiment and
//! the "winning" label of a completed one. It is a pure function of the
//! variant list: no clock, no randomness.

use crate::types::Variant;
use std::cmp::Ordering;
use uuid::Uuid;

/// The best-performing variant of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leader {
    pub variant_id: Uuid,
    /// Position in the experiment's variant list.
    pub index: usize,
    /// CTR as a fraction.
    pub ctr: f64,
    pub impressions: u64,
}

/// Pick the variant with the highest CTR.
///
/// Ties on CTR go to the variant with more impressions, then to the one
/// listed first. Variants without impressions never lead, and a snapshot
/// where nothing has been shown has no leader.
pub fn select_leader(variants: &[Variant]) -> Option<Leader> {
    let mut best: Option<(usize, &Variant)> = None;

    for (index, candidate) in variants.iter().enumerate() {
        if candidate.impressions() == 0 {
            continue;
        }
        let replace = match best {
            None => true,
            Some((_, current)) => match compare_ctr(candidate, current) {
                Ordering::Greater => true,
                Ordering::Equal => candidate.impressions() > current.impressions(),
                Ordering::Less => false,
            },
        };
        if replace {
            best = Some((index, candidate));
        }
    }

    best.map(|(index, v)| Leader {
        variant_id: v.id(),
        index,
        ctr: v.ctr_fraction().unwrap_or(0.0),
        impressions: v.impressions(),
    })
}

/// Relative lift of the leader over the unweighted mean CTR of the other
/// variants that have impressions, in percent.
pub fn improvement_percent(variants: &[Variant], leader: &Leader) -> Option<f64> {
    let others: Vec<f64> = variants
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != leader.index)
        .filter_map(|(_, v)| v.ctr_fraction())
        .collect();

    if others.is_empty() {
        return None;
    }
    let mean = others.iter().sum::<f64>() / others.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    Some((leader.ctr - mean) / mean * 100.0)
}

/// Exact CTR comparison by cross-multiplication. Both sides need impressions.
fn compare_ctr(a: &Variant, b: &Variant) -> Ordering {
    let lhs = a.clicks() as u128 * b.impressions() as u128;
    let rhs = b.clicks() as u128 * a.impressions() as u128;
    lhs.cmp(&rhs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn variant(impressions: u64, clicks: u64) -> Variant {
        let mut v = Variant::new(format!("https://img.example/{impressions}-{clicks}.jpg"));
        v.impressions = impressions;
        v.clicks = clicks;
        v
    }

    #[test]
    fn test_highest_ctr_leads() {
        let variants = vec![variant(1000, 150), variant(1000, 120)];
        let leader = select_leader(&variants).unwrap();
        assert_eq!(leader.index, 0);
        assert_eq!(leader.variant_id, variants[0].id());
        assert!((leader.ctr - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_ctr_tie_prefers_more_impressions() {
        let variants = vec![variant(100, 20), variant(200, 40)];
        let leader = select_leader(&variants).unwrap();
        assert_eq!(leader.index, 1);
    }

    #[test]
    fn test_full_tie_prefers_first_listed() {
        let variants = vec![variant(500, 50), variant(500, 50), variant(500, 50)];
        assert_eq!(select_leader(&variants).unwrap().index, 0);
    }

    #[test]
    fn test_no_impressions_means_no_leader() {
        let variants = vec![variant(0, 0), variant(0, 0)];
        assert!(select_leader(&variants).is_none());
    }

    #[test]
    fn test_unshown_variant_never_leads() {
        // A variant at zero impressions does not beat one with a zero CTR.
        let variants = vec![variant(0, 0), variant(300, 0)];
        assert_eq!(select_leader(&variants).unwrap().index, 1);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let variants = vec![variant(2500, 300), variant(2500, 275), variant(1800, 270)];
        let first = select_leader(&variants);
        let second = select_leader(&variants);
        assert_eq!(first, second);
        assert_eq!(first.unwrap().index, 2);
    }

    #[test]
    fn test_improvement_against_single_rival() {
        let variants = vec![variant(1000, 150), variant(1000, 120)];
        let leader = select_leader(&variants).unwrap();
        let lift = improvement_percent(&variants, &leader).unwrap();
        assert!((lift - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_improvement_uses_unweighted_mean() {
        // Others at 12% and 14% → mean 13%; 16% is ~23.08% above it.
        let variants = vec![variant(2800, 336), variant(100, 14), variant(2800, 448)];
        let leader = select_leader(&variants).unwrap();
        assert_eq!(leader.index, 2);
        let lift = improvement_percent(&variants, &leader).unwrap();
        assert!((lift - 300.0 / 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_improvement_absent_without_rivals() {
        let variants = vec![variant(1000, 100), variant(0, 0)];
        let leader = select_leader(&variants).unwrap();
        assert!(improvement_percent(&variants, &leader).is_none());
    }

    #[test]
    fn test_improvement_absent_when_rivals_have_no_clicks() {
        let variants = vec![variant(1000, 100), variant(1000, 0)];
        let leader = select_leader(&variants).unwrap();
        assert!(improvement_percent(&variants, &leader).is_none());
    }
}
