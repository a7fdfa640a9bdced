//! Representative-sample selection over a posterior block.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{ActivityPosterior, ActivitySample};

/// How the representative `(a, b)` pair is picked from a posterior block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CentralSelection {
    /// Element at index `N / 2` of the block, in solver output order.
    #[default]
    MiddleIndex,
    /// Highest posterior weight; the first one wins on ties.
    MaxWeight,
}

impl CentralSelection {
    /// Representative sample and its position in the block.
    pub fn select(self, posterior: &ActivityPosterior) -> Option<(usize, ActivitySample)> {
        match self {
            CentralSelection::MiddleIndex => {
                let idx = posterior.declared_len / 2;
                posterior.samples.get(idx).map(|s| (idx, *s))
            }
            CentralSelection::MaxWeight => posterior
                .samples
                .iter()
                .copied()
                .enumerate()
                .reduce(|best, s| if s.1.weight > best.1.weight { s } else { best }),
        }
    }
}

/// Check that b values run monotonically through the block.
///
/// `MiddleIndex` only picks a central value when the solver emits samples
/// sorted along b; the returned message describes the first violation.
pub fn check_ordering(samples: &[ActivitySample]) -> Option<String> {
    if samples.len() < 3 {
        return None;
    }
    let rising = samples.windows(2).all(|w| w[1].b >= w[0].b);
    let falling = samples.windows(2).all(|w| w[1].b <= w[0].b);
    if rising || falling {
        return None;
    }

    // Plateaus carry no direction; the turn is where the first step against
    // the previous non-flat step starts.
    let mut direction = 0.0;
    let mut first_turn = 0;
    for (i, w) in samples.windows(2).enumerate() {
        let step = w[1].b - w[0].b;
        if step == 0.0 {
            continue;
        }
        if direction * step < 0.0 {
            first_turn = i;
            break;
        }
        direction = step;
    }
    Some(format!(
        "posterior b values are not monotone ({} samples, direction changes at index {first_turn})",
        samples.len()
    ))
}
