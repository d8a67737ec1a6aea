//! Random reviewer selection.
//!
//! Selection is uniform sampling without replacement: candidates are
//! shuffled and a prefix is taken. There is no weighting and no memory of
//! earlier assignments.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::domain::teams::User;

/// Shared source of randomness for reviewer selection.
pub struct Picker {
    rng: Mutex<StdRng>,
}

impl Picker {
    pub fn from_entropy() -> Self {
        Picker {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A deterministic picker, so tests can reproduce a draw.
    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Picker {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Shuffle `candidates` and keep at most `amount` of them.
    pub fn sample(&self, mut candidates: Vec<String>, amount: usize) -> Vec<String> {
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            candidates.shuffle(&mut *rng);
        }
        candidates.truncate(amount);
        candidates
    }

    pub fn pick_one(&self, candidates: &[String]) -> Option<String> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        candidates.choose(&mut *rng).cloned()
    }
}

/// Teammates who may review a pull request opened by `author_id`.
pub fn review_candidates(author_id: &str, roster: Vec<User>) -> Vec<String> {
    roster
        .into_iter()
        .filter(|u| u.is_active && u.user_id != author_id)
        .map(|u| u.user_id)
        .collect()
}

/// Teammates who may take over a review, skipping everyone in `excluded`.
pub fn replacement_candidates(roster: Vec<User>, excluded: &HashSet<&str>) -> Vec<String> {
    roster
        .into_iter()
        .filter(|u| u.is_active && !excluded.contains(u.user_id.as_str()))
        .map(|u| u.user_id)
        .collect()
}
