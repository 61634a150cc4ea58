//! Instantaneous scaling classification.

use std::fmt;

use nodescale_core::Resource;

use crate::threshold::ThresholdSet;

/// Direction of a scaling event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleKind {
    Up,
    Down,
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleKind::Up => f.write_str("scale-up"),
            ScaleKind::Down => f.write_str("scale-down"),
        }
    }
}

/// What the current utilization asks for, before any debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    ScaleUp,
    ScaleDown,
    NoAction,
}

impl ScaleDecision {
    /// The event kind this decision would arm, if any.
    pub fn kind(self) -> Option<ScaleKind> {
        match self {
            ScaleDecision::ScaleUp => Some(ScaleKind::Up),
            ScaleDecision::ScaleDown => Some(ScaleKind::Down),
            ScaleDecision::NoAction => None,
        }
    }
}

impl fmt::Display for ScaleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleDecision::ScaleUp => f.write_str("scale-up"),
            ScaleDecision::ScaleDown => f.write_str("scale-down"),
            ScaleDecision::NoAction => f.write_str("no-action"),
        }
    }
}

/// Classify average utilization against the thresholds.
///
/// Either dimension breaking its scale-up line asks for a scale-up. A
/// scale-down needs both dimensions under their scale-down lines and more
/// than one node. Checks run scale-up before scale-down and CPU before
/// memory; that order is the tie-break.
pub fn classify(
    cpu_util: f64,
    mem_util: f64,
    node_count: usize,
    thresholds: &ThresholdSet,
) -> ScaleDecision {
    let breaks = |kind, resource, util: f64| {
        thresholds
            .get(kind, resource)
            .is_some_and(|threshold| util >= threshold)
    };

    if breaks(ScaleKind::Up, Resource::Cpu, cpu_util) {
        return ScaleDecision::ScaleUp;
    }
    if breaks(ScaleKind::Up, Resource::Memory, mem_util) {
        return ScaleDecision::ScaleUp;
    }

    if breaks(ScaleKind::Down, Resource::Cpu, cpu_util) {
        return ScaleDecision::NoAction;
    }
    if breaks(ScaleKind::Down, Resource::Memory, mem_util) {
        return ScaleDecision::NoAction;
    }

    // Never shrink the last node.
    if node_count == 1 {
        return ScaleDecision::NoAction;
    }

    ScaleDecision::ScaleDown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ThresholdSet {
        ThresholdSet::parse("memory=0.7,cpu=0.7", "memory=0.15,cpu=0.15").unwrap()
    }

    #[test]
    fn below_every_scale_down_line_scales_down() {
        let th = defaults();
        for cpu in [0.0, 0.05, 0.1, 0.149] {
            for mem in [0.0, 0.07, 0.149] {
                assert_eq!(classify(cpu, mem, 2, &th), ScaleDecision::ScaleDown);
                assert_eq!(classify(cpu, mem, 10, &th), ScaleDecision::ScaleDown);
            }
        }
    }

    #[test]
    fn single_node_never_scales_down() {
        let th = defaults();
        assert_eq!(classify(0.0, 0.0, 1, &th), ScaleDecision::NoAction);
        assert_eq!(classify(0.1, 0.1, 1, &th), ScaleDecision::NoAction);
    }

    #[test]
    fn either_dimension_at_scale_up_line_scales_up() {
        let th = defaults();
        for other in [0.0, 0.1, 0.5, 0.99] {
            assert_eq!(classify(0.7, other, 3, &th), ScaleDecision::ScaleUp);
            assert_eq!(classify(other, 0.7, 3, &th), ScaleDecision::ScaleUp);
            assert_eq!(classify(0.95, other, 1, &th), ScaleDecision::ScaleUp);
        }
    }

    #[test]
    fn between_lines_is_no_action() {
        let th = defaults();
        assert_eq!(classify(0.5, 0.5, 4, &th), ScaleDecision::NoAction);
        // Only one dimension above its scale-down line keeps the pool.
        assert_eq!(classify(0.15, 0.0, 4, &th), ScaleDecision::NoAction);
        assert_eq!(classify(0.0, 0.2, 4, &th), ScaleDecision::NoAction);
    }

    #[test]
    fn scale_up_checks_precede_scale_down_checks() {
        // Overlapping lines: cpu is both >= scale-up and >= scale-down.
        let th = ThresholdSet::parse("cpu=0.5", "cpu=0.9").unwrap();
        assert_eq!(classify(0.95, 0.0, 3, &th), ScaleDecision::ScaleUp);
    }

    #[test]
    fn missing_thresholds_never_trigger() {
        let th = ThresholdSet::default();
        assert_eq!(classify(1.0, 1.0, 3, &th), ScaleDecision::ScaleDown);
        assert_eq!(classify(1.0, 1.0, 1, &th), ScaleDecision::NoAction);

        let only_up = ThresholdSet::parse("cpu=0.8", "").unwrap();
        assert_eq!(classify(0.1, 1.0, 3, &only_up), ScaleDecision::ScaleDown);
    }

    #[test]
    fn decision_kinds() {
        assert_eq!(ScaleDecision::ScaleUp.kind(), Some(ScaleKind::Up));
        assert_eq!(ScaleDecision::ScaleDown.kind(), Some(ScaleKind::Down));
        assert_eq!(ScaleDecision::NoAction.kind(), None);
    }
}
