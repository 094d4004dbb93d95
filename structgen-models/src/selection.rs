//! Picking one model out of several candidates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::ModelError;
use crate::model::BoxedModel;
use crate::profile::ModelProfile;
use crate::registry::ModelRegistry;

/// Preference used to rank candidate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPicking {
    /// Highest speed rank.
    Speed,
    /// Highest quality rank.
    Quality,
    /// Highest sum of both ranks.
    Balance,
}

impl ModelPicking {
    /// Score of a profile under this preference.
    #[must_use]
    pub fn score(&self, profile: &ModelProfile) -> u16 {
        let speed = u16::from(profile.speed_rank);
        let quality = u16::from(profile.quality_rank);
        match self {
            ModelPicking::Speed => speed,
            ModelPicking::Quality => quality,
            ModelPicking::Balance => speed + quality,
        }
    }
}

impl fmt::Display for ModelPicking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelPicking::Speed => write!(f, "speed"),
            ModelPicking::Quality => write!(f, "quality"),
            ModelPicking::Balance => write!(f, "balance"),
        }
    }
}

impl FromStr for ModelPicking {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speed" => Ok(ModelPicking::Speed),
            "quality" => Ok(ModelPicking::Quality),
            "balance" | "balanced" => Ok(ModelPicking::Balance),
            other => Err(ModelError::configuration(format!(
                "unknown model picking '{other}'"
            ))),
        }
    }
}

/// Choose exactly one model from `candidates`.
///
/// Candidates that do not resolve are skipped. Without a hint the first
/// resolvable candidate wins; with a hint the highest score wins and ties go
/// to the earlier candidate. The same inputs always give the same model.
#[must_use]
pub fn select_model(
    registry: &ModelRegistry,
    candidates: &[String],
    hint: Option<ModelPicking>,
) -> Option<BoxedModel> {
    let mut best: Option<(u16, BoxedModel)> = None;

    for candidate in candidates {
        let model = match registry.resolve(candidate) {
            Ok(model) => model,
            Err(err) => {
                debug!(candidate = %candidate, error = %err, "skipping unresolvable model");
                continue;
            }
        };

        let Some(hint) = hint else {
            debug!(model = %model.identifier(), "selected first resolvable model");
            return Some(model);
        };

        let score = hint.score(model.profile());
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, model));
        }
    }

    if let (Some((score, model)), Some(hint)) = (&best, hint) {
        debug!(model = %model.identifier(), %hint, score, "selected model by hint");
    }
    best.map(|(_, model)| model)
}
