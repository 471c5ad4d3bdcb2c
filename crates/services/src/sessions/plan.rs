use rand::Rng;
use rand::seq::SliceRandom;

use exam_core::model::QuestionId;

/// Picks the question order for a new session.
///
/// The whole pool is shuffled with a uniform Fisher–Yates permutation before
/// the cap is applied, so every subset of size `cap` is equally likely.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QuestionPicker {
    cap: usize,
}

impl QuestionPicker {
    #[must_use]
    pub(crate) fn with_cap(cap: u32) -> Self {
        Self {
            cap: usize::try_from(cap).unwrap_or(usize::MAX),
        }
    }

    /// Shuffle `pool` and keep at most `cap` ids.
    pub(crate) fn pick<R: Rng + ?Sized>(self, mut pool: Vec<QuestionId>, rng: &mut R) -> Vec<QuestionId> {
        pool.shuffle(rng);
        pool.truncate(self.cap);
        pool
    }

    /// Same as [`QuestionPicker::pick`] with the thread-local generator.
    pub(crate) fn pick_random(self, pool: Vec<QuestionId>) -> Vec<QuestionId> {
        let mut rng = rand::rng();
        self.pick(pool, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn pool(n: u64) -> Vec<QuestionId> {
        (1..=n).map(QuestionId::new).collect()
    }

    #[test]
    fn small_pool_keeps_every_question_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let picked = QuestionPicker::with_cap(20).pick(pool(12), &mut rng);
        assert_eq!(picked.len(), 12);
        let distinct: HashSet<_> = picked.iter().copied().collect();
        assert_eq!(distinct, pool(12).into_iter().collect());
    }

    #[test]
    fn large_pool_is_capped_with_distinct_ids() {
        let mut rng = StdRng::seed_from_u64(11);
        let picked = QuestionPicker::with_cap(20).pick(pool(300), &mut rng);
        assert_eq!(picked.len(), 20);
        let distinct: HashSet<_> = picked.iter().copied().collect();
        assert_eq!(distinct.len(), 20);
    }

    #[test]
    fn empty_pool_yields_empty_selection() {
        assert!(QuestionPicker::with_cap(20).pick_random(Vec::new()).is_empty());
    }

    #[test]
    fn capped_selection_is_not_a_prefix_of_the_pool() {
        // Fisher–Yates over the full list: later ids must be reachable.
        let mut rng = StdRng::seed_from_u64(3);
        let reached_tail = (0..50).any(|_| {
            QuestionPicker::with_cap(5)
                .pick(pool(100), &mut rng)
                .iter()
                .any(|id| id.value() > 50)
        });
        assert!(reached_tail);
    }
}
