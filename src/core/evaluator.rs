use log::info;
use serde::{Deserialize, Serialize};

use super::registry::AgentRegistry;
use crate::signals::Opportunity;

pub const BASE_SCORE: u8 = 5;
pub const MAX_SCORE: u8 = 10;

/// Outcome of evaluating one opportunity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// An active agent already serves this type
    Duplicate { existing_id: String },

    /// Scored below the spawn threshold
    Rejected { score: u8 },

    /// Scored at or above the spawn threshold
    Accepted { score: u8 },
}

/// Score an opportunity on a 0..=10 scale
pub fn score(opportunity: &Opportunity) -> u8 {
    let mut score = BASE_SCORE;

    if opportunity.mentions > 10 {
        score += 2;
    }
    if opportunity.mentions > 20 {
        score += 1;
    }
    if opportunity.trending {
        score += 2;
    }

    score.min(MAX_SCORE)
}

/// Dedup and scoring gate in front of the factory
#[derive(Debug, Clone)]
pub struct Evaluator {
    threshold: u8,
}

impl Evaluator {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.min(MAX_SCORE),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Decide whether to spawn. Duplicates are rejected before scoring;
    /// otherwise the score is written back onto the opportunity.
    pub fn evaluate(&self, opportunity: &mut Opportunity, registry: &AgentRegistry) -> Decision {
        if let Some(existing) = registry.active_of_type(&opportunity.agent_type) {
            info!(
                "Already have {} agent: {}",
                opportunity.agent_type, existing.name
            );
            return Decision::Duplicate {
                existing_id: existing.id.clone(),
            };
        }

        let score = score(opportunity);
        opportunity.score = Some(score);
        info!(
            "Opportunity {} scored {}/{}",
            opportunity.agent_type, score, MAX_SCORE
        );

        if score >= self.threshold {
            Decision::Accepted { score }
        } else {
            Decision::Rejected { score }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::child::{test_agent, ChildStatus};
    use proptest::prelude::*;

    fn opp(agent_type: &str, mentions: u64, trending: bool) -> Opportunity {
        let mut o = Opportunity::new(agent_type, "test", "test").with_mentions(mentions);
        o.trending = trending;
        o
    }

    #[test]
    fn test_max_bonus_is_clamped() {
        assert_eq!(score(&opp("meme", 25, true)), 10);
    }

    #[test]
    fn test_base_score_below_threshold() {
        let evaluator = Evaluator::new(7);
        let mut o = opp("meme", 5, false);
        assert_eq!(
            evaluator.evaluate(&mut o, &AgentRegistry::new()),
            Decision::Rejected { score: 5 }
        );
        assert_eq!(o.score, Some(5));
    }

    #[test]
    fn test_bonus_boundaries() {
        assert_eq!(score(&opp("x", 10, false)), 5);
        assert_eq!(score(&opp("x", 11, false)), 7);
        assert_eq!(score(&opp("x", 20, false)), 7);
        assert_eq!(score(&opp("x", 21, false)), 8);
        assert_eq!(score(&opp("x", 0, true)), 7);
    }

    #[test]
    fn test_duplicate_rejected_regardless_of_score() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent("trader-1-1", "trader")).unwrap();
        let evaluator = Evaluator::new(7);

        let mut o = opp("trader", 1000, true);
        assert_eq!(
            evaluator.evaluate(&mut o, &registry),
            Decision::Duplicate {
                existing_id: "trader-1-1".to_string()
            }
        );
        assert_eq!(o.score, None);
    }

    #[test]
    fn test_paused_agent_does_not_dedup() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent("trader-1-1", "trader")).unwrap();
        registry
            .set_status("trader-1-1", ChildStatus::Paused)
            .unwrap();

        let mut o = opp("trader", 50, true);
        assert_eq!(
            Evaluator::new(7).evaluate(&mut o, &registry),
            Decision::Accepted { score: 10 }
        );
    }

    proptest! {
        #[test]
        fn prop_score_in_range(mentions in 0u64..1_000_000, trending in any::<bool>()) {
            let s = score(&opp("x", mentions, trending));
            prop_assert!(s <= MAX_SCORE);
            prop_assert!(s >= BASE_SCORE);
        }

        #[test]
        fn prop_score_monotonic_in_mentions(a in 0u64..100_000, b in 0u64..100_000, trending in any::<bool>()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(score(&opp("x", lo, trending)) <= score(&opp("x", hi, trending)));
        }

        #[test]
        fn prop_trending_never_lowers_score(mentions in 0u64..100_000) {
            prop_assert!(score(&opp("x", mentions, false)) <= score(&opp("x", mentions, true)));
        }
    }
}
