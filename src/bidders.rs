use rand::{rngs::StdRng, SeedableRng};

pub use crate::bidder::{Bidder, BidPolicyTrait};
use crate::bidder::{PolicyAbstain, PolicyConstant, PolicyExploreExploit, PolicyRandom};
use crate::utils::get_seed;

/// Bid policy kinds a bidder can be constructed with.
/// A closed set chosen at construction; there is no runtime re-dispatch.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum BidderType {
    /// Bid `exploration_bid` for the first `exploration_fraction` of the game,
    /// then bid the estimated click rate minus `under_cut`, floored at zero
    EXPLORE_EXPLOIT {
        exploration_fraction: f64,
        exploration_bid: f64,
        under_cut: f64,
    },
    /// Uniform random bid in [0, 1) every round
    RANDOM,
    /// Fixed bid every round
    CONSTANT { amount: f64 },
    /// Always bid zero
    ABSTAIN,
}

/// Container for the bidders of a simulation.
/// Fixes the user universe and the planned number of rounds up front so every
/// bidder is constructed with the same knowledge of the game.
pub struct Bidders {
    pub bidders: Vec<Bidder>,
    num_users: usize,
    total_rounds: u64,
}

impl Bidders {
    pub fn new(num_users: usize, total_rounds: u64) -> Self {
        assert!(total_rounds > 0, "A game needs at least one planned round");
        Self {
            bidders: Vec::new(),
            num_users,
            total_rounds,
        }
    }

    /// Add a bidder to the collection
    ///
    /// # Arguments
    /// * `bidder_name` - Name of the bidder
    /// * `bidder_type` - Bid policy kind with its parameters
    ///
    /// The bidder_id is assigned automatically to match the Vec index.
    pub fn add(&mut self, bidder_name: String, bidder_type: BidderType) {
        let bidder_id = self.bidders.len();

        let policy: Box<dyn BidPolicyTrait> = match bidder_type {
            BidderType::EXPLORE_EXPLOIT {
                exploration_fraction,
                exploration_bid,
                under_cut,
            } => {
                assert!(
                    (0.0..=1.0).contains(&exploration_fraction),
                    "exploration_fraction must be in [0, 1], got {}",
                    exploration_fraction
                );
                assert!(
                    exploration_bid >= 0.0,
                    "exploration_bid must be nonnegative, got {}",
                    exploration_bid
                );
                assert!(
                    under_cut >= 0.0,
                    "under_cut must be nonnegative, got {}",
                    under_cut
                );
                Box::new(PolicyExploreExploit::new(
                    self.num_users,
                    exploration_fraction,
                    exploration_bid,
                    under_cut,
                ))
            }
            BidderType::RANDOM => {
                // Each random bidder draws from its own reproducible stream
                let rng = StdRng::seed_from_u64(get_seed(5005 + bidder_id as u64));
                Box::new(PolicyRandom::new(rng))
            }
            BidderType::CONSTANT { amount } => {
                assert!(
                    amount >= 0.0,
                    "constant bid amount must be nonnegative, got {}",
                    amount
                );
                Box::new(PolicyConstant { amount })
            }
            BidderType::ABSTAIN => Box::new(PolicyAbstain),
        };

        self.bidders.push(Bidder::new(
            bidder_id,
            bidder_name,
            self.num_users,
            self.total_rounds,
            policy,
        ));
    }

    pub fn len(&self) -> usize {
        self.bidders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bidders.is_empty()
    }

    /// Planned number of rounds the game was set up for
    pub fn total_rounds(&self) -> u64 {
        self.total_rounds
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut bidders = Bidders::new(3, 100);
        bidders.add("a".to_string(), BidderType::ABSTAIN);
        bidders.add("b".to_string(), BidderType::CONSTANT { amount: 1.0 });
        bidders.add("c".to_string(), BidderType::RANDOM);
        assert_eq!(bidders.len(), 3);
        for (index, bidder) in bidders.bidders.iter().enumerate() {
            assert_eq!(bidder.bidder_id, index);
        }
    }

    #[test]
    #[should_panic(expected = "exploration_fraction must be in [0, 1]")]
    fn test_bad_exploration_fraction_rejected() {
        let mut bidders = Bidders::new(1, 100);
        bidders.add(
            "bad".to_string(),
            BidderType::EXPLORE_EXPLOIT {
                exploration_fraction: 1.5,
                exploration_bid: 0.85,
                under_cut: 0.0,
            },
        );
    }

    #[test]
    #[should_panic(expected = "must be nonnegative")]
    fn test_negative_constant_rejected() {
        let mut bidders = Bidders::new(1, 100);
        bidders.add("bad".to_string(), BidderType::CONSTANT { amount: -1.0 });
    }

    #[test]
    #[should_panic(expected = "at least one planned round")]
    fn test_zero_round_game_rejected() {
        Bidders::new(1, 0);
    }
}
