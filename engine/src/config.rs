//! The three configuration surfaces: search tuning (`Config`), pattern
//! generation (`PatternConfig`), and expressed-chart interpretation
//! (`ExpressedChartConfig`).
//!
//! All three are deserialized from a wire form with `-1.0`/`-1` sentinels
//! standing in for "unset", then normalized to `Option` fields and
//! validated eagerly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use step_graph::StepType;

const UNSET: f64 = -1.0;

fn normalize(raw: f64) -> Option<f64> {
    if raw == UNSET {
        None
    } else {
        Some(raw)
    }
}

/// Wire form of [`TransitionConfig`], using `-1`/`-1.0` sentinels for
/// fields the source treats as runtime-nullable overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTransitionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_unset_i")]
    pub steps_per_transition_min: i64,
    #[serde(default = "default_unset_i")]
    pub steps_per_transition_max: i64,
    #[serde(default = "default_unset_i")]
    pub minimum_pad_width: i64,
    #[serde(default = "default_unset_f")]
    pub transition_cutoff_percentage: f64,
}

fn default_unset_i() -> i64 {
    -1
}
fn default_unset_f() -> f64 {
    UNSET
}

#[derive(Debug, Clone)]
pub struct TransitionConfig {
    pub enabled: bool,
    pub steps_per_transition_min: Option<u32>,
    pub steps_per_transition_max: Option<u32>,
    pub minimum_pad_width: Option<u32>,
    pub transition_cutoff_percentage: Option<f64>,
}

impl RawTransitionConfig {
    fn normalize(&self) -> TransitionConfig {
        TransitionConfig {
            enabled: self.enabled,
            steps_per_transition_min: non_negative_int(self.steps_per_transition_min),
            steps_per_transition_max: non_negative_int(self.steps_per_transition_max),
            minimum_pad_width: non_negative_int(self.minimum_pad_width),
            transition_cutoff_percentage: normalize(self.transition_cutoff_percentage),
        }
    }
}

fn non_negative_int(raw: i64) -> Option<u32> {
    if raw < 0 {
        None
    } else {
        Some(raw as u32)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RawFacingConfig {
    #[serde(default = "default_unset_f")]
    pub max_inward_percentage: f64,
    #[serde(default = "default_unset_f")]
    pub inward_percentage_cutoff: f64,
    #[serde(default = "default_unset_f")]
    pub max_outward_percentage: f64,
    #[serde(default = "default_unset_f")]
    pub outward_percentage_cutoff: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FacingConfig {
    pub max_inward_percentage: Option<f64>,
    pub inward_percentage_cutoff: Option<f64>,
    pub max_outward_percentage: Option<f64>,
    pub outward_percentage_cutoff: Option<f64>,
}

impl RawFacingConfig {
    fn normalize(&self) -> FacingConfig {
        FacingConfig {
            max_inward_percentage: normalize(self.max_inward_percentage),
            inward_percentage_cutoff: normalize(self.inward_percentage_cutoff),
            max_outward_percentage: normalize(self.max_outward_percentage),
            outward_percentage_cutoff: normalize(self.outward_percentage_cutoff),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RawLateralTighteningConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_unset_f")]
    pub relative_nps: f64,
    #[serde(default = "default_unset_f")]
    pub absolute_nps: f64,
    #[serde(default = "default_unset_f")]
    pub speed: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LateralTighteningConfig {
    pub enabled: bool,
    pub relative_nps: Option<f64>,
    pub absolute_nps: Option<f64>,
    pub speed: Option<f64>,
}

impl RawLateralTighteningConfig {
    fn normalize(&self) -> LateralTighteningConfig {
        LateralTighteningConfig {
            enabled: self.enabled,
            relative_nps: normalize(self.relative_nps),
            absolute_nps: normalize(self.absolute_nps),
            speed: normalize(self.speed),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RawStepTighteningConfig {
    #[serde(default)]
    pub speed_tightening_enabled: bool,
    #[serde(default = "default_unset_f")]
    pub speed_min_time_seconds: f64,
    #[serde(default = "default_unset_f")]
    pub speed_max_time_seconds: f64,
    #[serde(default = "default_unset_f")]
    pub speed_tightening_min_distance: f64,
    #[serde(default)]
    pub distance_tightening_enabled: bool,
    #[serde(default = "default_unset_f")]
    pub distance_min: f64,
    #[serde(default = "default_unset_f")]
    pub distance_max: f64,
    #[serde(default)]
    pub stretch_tightening_enabled: bool,
    #[serde(default = "default_unset_f")]
    pub stretch_distance_min: f64,
    #[serde(default = "default_unset_f")]
    pub stretch_distance_max: f64,
    #[serde(default = "default_unset_f")]
    pub lateral_min_panel_distance: f64,
    #[serde(default = "default_unset_f")]
    pub longitudinal_min_panel_distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StepTighteningConfig {
    pub speed_tightening_enabled: bool,
    pub speed_min_time_seconds: Option<f64>,
    pub speed_max_time_seconds: Option<f64>,
    pub speed_tightening_min_distance: Option<f64>,
    pub distance_tightening_enabled: bool,
    pub distance_min: Option<f64>,
    pub distance_max: Option<f64>,
    pub stretch_tightening_enabled: bool,
    pub stretch_distance_min: Option<f64>,
    pub stretch_distance_max: Option<f64>,
    pub lateral_min_panel_distance: Option<f64>,
    pub longitudinal_min_panel_distance: Option<f64>,
}

impl RawStepTighteningConfig {
    fn normalize(&self) -> StepTighteningConfig {
        StepTighteningConfig {
            speed_tightening_enabled: self.speed_tightening_enabled,
            speed_min_time_seconds: normalize(self.speed_min_time_seconds),
            speed_max_time_seconds: normalize(self.speed_max_time_seconds),
            speed_tightening_min_distance: normalize(self.speed_tightening_min_distance),
            distance_tightening_enabled: self.distance_tightening_enabled,
            distance_min: normalize(self.distance_min),
            distance_max: normalize(self.distance_max),
            stretch_tightening_enabled: self.stretch_tightening_enabled,
            stretch_distance_min: normalize(self.stretch_distance_min),
            stretch_distance_max: normalize(self.stretch_distance_max),
            lateral_min_panel_distance: normalize(self.lateral_min_panel_distance),
            longitudinal_min_panel_distance: normalize(self.longitudinal_min_panel_distance),
        }
    }
}

/// Per-step-type lane weights, normalized to sum to 1 within each step-type
/// during `fill_from_base`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawArrowWeights {
    pub weights: HashMap<StepType, Vec<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct ArrowWeights {
    pub weights: HashMap<StepType, Vec<f64>>,
}

impl RawArrowWeights {
    fn normalize(&self) -> ArrowWeights {
        let mut weights = HashMap::new();
        for (step_type, lane_weights) in &self.weights {
            let total: f64 = lane_weights.iter().sum();
            let normalized = if total > 0.0 {
                lane_weights.iter().map(|w| w / total).collect()
            } else {
                lane_weights.clone()
            };
            weights.insert(*step_type, normalized);
        }
        ArrowWeights { weights }
    }
}

/// Wire form of the search-tuning config. Any field left at its sentinel
/// is filled from `base` (if given) before normalization — an explicit
/// "fill unset fields from a base config" pre-init pass over the raw wire
/// struct rather than at read time.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RawConfig {
    pub transitions: Option<RawTransitionConfig>,
    pub facing: Option<RawFacingConfig>,
    pub lateral_tightening: Option<RawLateralTighteningConfig>,
    pub step_tightening: Option<RawStepTighteningConfig>,
    pub arrow_weights: Option<RawArrowWeights>,
}

impl RawConfig {
    /// Fill every field left `None` in `self` from the corresponding field
    /// of `base`. Applied before normalization so that overrides compose
    /// deterministically regardless of how many layers are stacked.
    pub fn fill_from_base(mut self, base: &RawConfig) -> RawConfig {
        self.transitions = self.transitions.or_else(|| base.transitions.clone());
        self.facing = self.facing.or_else(|| base.facing.clone());
        self.lateral_tightening = self
            .lateral_tightening
            .or_else(|| base.lateral_tightening.clone());
        self.step_tightening = self
            .step_tightening
            .or_else(|| base.step_tightening.clone());
        self.arrow_weights = self.arrow_weights.or_else(|| base.arrow_weights.clone());
        self
    }

    pub fn normalize(&self) -> Config {
        Config {
            transitions: self
                .transitions
                .as_ref()
                .map(RawTransitionConfig::normalize)
                .unwrap_or_else(|| RawTransitionConfig {
                    enabled: false,
                    steps_per_transition_min: -1,
                    steps_per_transition_max: -1,
                    minimum_pad_width: -1,
                    transition_cutoff_percentage: UNSET,
                }
                .normalize()),
            facing: self
                .facing
                .as_ref()
                .map(RawFacingConfig::normalize)
                .unwrap_or_default(),
            lateral_tightening: self
                .lateral_tightening
                .as_ref()
                .map(RawLateralTighteningConfig::normalize)
                .unwrap_or_default(),
            step_tightening: self
                .step_tightening
                .as_ref()
                .map(RawStepTighteningConfig::normalize)
                .unwrap_or_default(),
            arrow_weights: self
                .arrow_weights
                .as_ref()
                .map(RawArrowWeights::normalize)
                .unwrap_or_default(),
        }
    }
}

/// The normalized, validated search-tuning configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub transitions: TransitionConfig,
    pub facing: FacingConfig,
    pub lateral_tightening: LateralTighteningConfig,
    pub step_tightening: StepTighteningConfig,
    pub arrow_weights: ArrowWeights,
}

impl Config {
    /// Validate internal consistency, producing `Error::ConfigError` with
    /// a human-readable reason on the first problem found — surfaced
    /// synchronously before any search runs.
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (
            self.transitions.steps_per_transition_min,
            self.transitions.steps_per_transition_max,
        ) {
            if min > max {
                return Err(Error::ConfigError(format!(
                    "StepsPerTransitionMin ({min}) > StepsPerTransitionMax ({max})"
                )));
            }
        }
        if let Some(cutoff) = self.transitions.transition_cutoff_percentage {
            if !(0.0..=1.0).contains(&cutoff) {
                return Err(Error::ConfigError(
                    "TransitionCutoffPercentage must lie in [0, 1]".into(),
                ));
            }
        }
        for (name, value) in [
            (
                "MaxInwardPercentage",
                self.facing.max_inward_percentage,
            ),
            (
                "InwardPercentageCutoff",
                self.facing.inward_percentage_cutoff,
            ),
            (
                "MaxOutwardPercentage",
                self.facing.max_outward_percentage,
            ),
            (
                "OutwardPercentageCutoff",
                self.facing.outward_percentage_cutoff,
            ),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(Error::ConfigError(format!(
                        "{name} must lie in [0, 1], got {v}"
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (
            self.step_tightening.speed_min_time_seconds,
            self.step_tightening.speed_max_time_seconds,
        ) {
            if min > max {
                return Err(Error::ConfigError(
                    "SpeedMinTimeSeconds > SpeedMaxTimeSeconds".into(),
                ));
            }
        }
        if let (Some(min), Some(max)) = (
            self.step_tightening.distance_min,
            self.step_tightening.distance_max,
        ) {
            if min > max {
                return Err(Error::ConfigError("DistanceMin > DistanceMax".into()));
            }
        }
        if let (Some(min), Some(max)) = (
            self.step_tightening.stretch_distance_min,
            self.step_tightening.stretch_distance_max,
        ) {
            if min > max {
                return Err(Error::ConfigError(
                    "StretchDistanceMin > StretchDistanceMax".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Which lane a foot starts on, from `PatternConfig`'s seeding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FootStartChoice {
    AutomaticSameLane,
    AutomaticNewLane,
    AutomaticSameOrNewLane,
    SpecifiedLane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FootEndChoice {
    AutomaticSameLane,
    AutomaticNewLane,
    AutomaticSameOrNewLane,
    SpecifiedLane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum StartingFootChoice {
    Random,
    Automatic,
    Specified,
}

/// The pattern-generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternConfig {
    pub beat_subdivision: u32,
    pub starting_foot_choice: StartingFootChoice,
    pub starting_foot_specified: u8,
    pub foot_start_choice: [FootStartChoice; 2],
    pub foot_start_lane_specified: [Option<usize>; 2],
    pub foot_end_choice: [FootEndChoice; 2],
    pub foot_end_lane_specified: [Option<usize>; 2],
    pub same_arrow_step_weight: f64,
    pub new_arrow_step_weight: f64,
    pub limit_same_arrows_in_a_row: bool,
    pub max_same_arrows_in_a_row_per_foot: u32,
    pub step_type_check_period: u32,
}

impl PatternConfig {
    pub fn validate(&self) -> Result<()> {
        if self.beat_subdivision == 0 {
            return Err(Error::ConfigError(
                "BeatSubDivision must be a valid (nonzero) denominator".into(),
            ));
        }
        if self.starting_foot_specified > 1 {
            return Err(Error::ConfigError(
                "StartingFootSpecified must be 0 or 1".into(),
            ));
        }
        if self.same_arrow_step_weight < 0.0 || self.new_arrow_step_weight < 0.0 {
            return Err(Error::ConfigError(
                "SameArrowStepWeight/NewArrowStepWeight must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum BracketParsingMethod {
    Aggressive,
    Balanced,
    NoBrackets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum BracketParsingDetermination {
    ChooseMethodDynamically,
    UseDefaultMethod,
}

/// The expressed-chart interpretation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpressedChartConfig {
    pub default_bracket_parsing_method: BracketParsingMethod,
    pub bracket_parsing_determination: BracketParsingDetermination,
    pub min_level_for_brackets: u32,
    pub use_aggressive_brackets_when_more_simultaneous_notes_than_can_be_covered_without_brackets:
        bool,
    pub balanced_brackets_per_minute_for_aggressive_brackets: f64,
    pub balanced_brackets_per_minute_for_no_brackets: f64,
}

impl ExpressedChartConfig {
    pub fn validate(&self) -> Result<()> {
        let aggressive = self.balanced_brackets_per_minute_for_aggressive_brackets;
        let none = self.balanced_brackets_per_minute_for_no_brackets;
        if aggressive != 0.0 && none != 0.0 && aggressive <= none {
            return Err(Error::ConfigError(
                "BalancedBracketsPerMinuteForAggressiveBrackets must exceed \
                 BalancedBracketsPerMinuteForNoBrackets when both are nonzero"
                    .into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_normalizes_to_none() {
        let raw = RawTransitionConfig {
            enabled: true,
            steps_per_transition_min: -1,
            steps_per_transition_max: -1,
            minimum_pad_width: -1,
            transition_cutoff_percentage: UNSET,
        };
        let normalized = raw.normalize();
        assert_eq!(normalized.steps_per_transition_min, None);
        assert_eq!(normalized.transition_cutoff_percentage, None);
    }

    #[test]
    fn fill_from_base_only_fills_unset_fields() {
        let base = RawConfig {
            transitions: Some(RawTransitionConfig {
                enabled: true,
                steps_per_transition_min: 2,
                steps_per_transition_max: 8,
                minimum_pad_width: 1,
                transition_cutoff_percentage: 0.5,
            }),
            ..Default::default()
        };
        let overlay = RawConfig::default();
        let filled = overlay.fill_from_base(&base);
        assert_eq!(
            filled.transitions.unwrap().steps_per_transition_min,
            2
        );
    }

    #[test]
    fn rejects_inverted_transition_bounds() {
        let config = Config {
            transitions: TransitionConfig {
                enabled: true,
                steps_per_transition_min: Some(8),
                steps_per_transition_max: Some(2),
                minimum_pad_width: None,
                transition_cutoff_percentage: None,
            },
            facing: FacingConfig::default(),
            lateral_tightening: LateralTighteningConfig::default(),
            step_tightening: StepTighteningConfig::default(),
            arrow_weights: ArrowWeights::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn arrow_weights_normalize_to_unit_sum() {
        let mut weights = HashMap::new();
        weights.insert(StepType::NewArrow, vec![1.0, 1.0, 2.0]);
        let raw = RawArrowWeights { weights };
        let normalized = raw.normalize();
        let sum: f64 = normalized.weights[&StepType::NewArrow].iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
