//! Threshold strings such as `memory=0.7,cpu=0.7`.

use std::collections::HashMap;

use nodescale_core::Resource;

use crate::decision::ScaleKind;
use crate::error::{AutoscaleError, AutoscaleResult};

/// Per-kind, per-resource utilization ratios. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    scale_up: HashMap<Resource, f64>,
    scale_down: HashMap<Resource, f64>,
}

impl ThresholdSet {
    pub fn new(scale_up: HashMap<Resource, f64>, scale_down: HashMap<Resource, f64>) -> Self {
        Self {
            scale_up,
            scale_down,
        }
    }

    /// Parse both threshold strings.
    pub fn parse(scale_up: &str, scale_down: &str) -> AutoscaleResult<Self> {
        Ok(Self::new(parse_thresholds(scale_up)?, parse_thresholds(scale_down)?))
    }

    /// The ratio configured for `resource` under `kind`, if any.
    pub fn get(&self, kind: ScaleKind, resource: Resource) -> Option<f64> {
        match kind {
            ScaleKind::Up => self.scale_up.get(&resource).copied(),
            ScaleKind::Down => self.scale_down.get(&resource).copied(),
        }
    }
}

/// Parse comma-separated `resource=ratio` pairs.
///
/// Resource names are case-insensitive. Ratios outside `[0, 1]` are kept
/// as given. Empty segments are skipped, and the first occurrence of a
/// repeated resource wins.
pub fn parse_thresholds(input: &str) -> AutoscaleResult<HashMap<Resource, f64>> {
    let invalid = |reason: String| AutoscaleError::InvalidThresholdFormat {
        input: input.to_string(),
        reason,
    };

    let mut thresholds = HashMap::with_capacity(2);

    for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("`{pair}` is not a resource=ratio pair")))?;

        let resource: Resource = name
            .trim()
            .parse()
            .map_err(|e| invalid(format!("{e}")))?;

        let value = value.trim();
        let ratio: f64 = value
            .parse()
            .map_err(|_| invalid(format!("`{value}` is not a number")))?;
        if !ratio.is_finite() {
            return Err(invalid(format!("`{value}` is not a finite number")));
        }

        thresholds.entry(resource).or_insert(ratio);
    }

    Ok(thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_resources() {
        let th = parse_thresholds("memory=0.7,cpu=0.7").unwrap();
        assert_eq!(th.len(), 2);
        assert_eq!(th[&Resource::Cpu], 0.7);
        assert_eq!(th[&Resource::Memory], 0.7);
    }

    #[test]
    fn resource_names_are_case_insensitive() {
        let th = parse_thresholds("CPU=0.5, Memory=0.25").unwrap();
        assert_eq!(th[&Resource::Cpu], 0.5);
        assert_eq!(th[&Resource::Memory], 0.25);
    }

    #[test]
    fn empty_string_is_empty_map() {
        assert!(parse_thresholds("").unwrap().is_empty());
        assert!(parse_thresholds(" , ").unwrap().is_empty());
    }

    #[test]
    fn out_of_range_ratios_are_kept() {
        let th = parse_thresholds("cpu=1.5,memory=-0.1").unwrap();
        assert_eq!(th[&Resource::Cpu], 1.5);
        assert_eq!(th[&Resource::Memory], -0.1);
    }

    #[test]
    fn first_occurrence_wins() {
        let th = parse_thresholds("cpu=0.3,cpu=0.9").unwrap();
        assert_eq!(th[&Resource::Cpu], 0.3);
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["cpu=x", "cpu", "disk=0.5", "cpu=", "=0.5", "cpu=NaN", "memory=inf"] {
            let err = parse_thresholds(input).unwrap_err();
            assert!(
                matches!(err, AutoscaleError::InvalidThresholdFormat { .. }),
                "{input} gave {err:?}"
            );
        }
    }

    #[test]
    fn threshold_set_lookup_by_kind() {
        let set = ThresholdSet::parse("cpu=0.7", "memory=0.15,cpu=0.15").unwrap();
        assert_eq!(set.get(ScaleKind::Up, Resource::Cpu), Some(0.7));
        assert_eq!(set.get(ScaleKind::Up, Resource::Memory), None);
        assert_eq!(set.get(ScaleKind::Down, Resource::Memory), Some(0.15));
    }

    #[test]
    fn threshold_set_propagates_errors() {
        assert!(ThresholdSet::parse("cpu=0.7", "cpu=low").is_err());
    }
}
