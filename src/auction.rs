/// This file contains the Auction struct, the round engine of the game.
/// One round: pick a user at random, collect one sealed bid per bidder,
/// settle a second-price auction with uniform tie breaking, show the ad
/// once, tell the winner (and only the winner) whether it clicked, move
/// the money and append the histories.

use std::sync::atomic::Ordering;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::bidders::Bidders;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::users::Users;
use crate::utils::{get_seed, VERBOSE_AUCTION};

/// One entry of the append-only round log, keyed by round order
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub user_id: usize,
    pub true_probability: f64,
    pub clicked: bool,
}

/// What one executed round resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub user_id: usize,
    pub winner_id: usize,
    pub clearing_price: f64,
    pub clicked: bool,
}

/// The repeated second-price auction. Owns the users, the bidders and every
/// accumulated history for the lifetime of the simulation; state only ever
/// accretes, nothing is rolled back.
pub struct Auction {
    pub users: Users,
    pub bidders: Bidders,
    /// Running balance per bidder, may go negative
    pub balances: Vec<f64>,
    /// Balance per bidder after every round, prefixed with the initial 0.0
    pub balance_history: Vec<Vec<f64>>,
    /// Clearing price of every round
    pub winning_prices: Vec<f64>,
    /// Selected user, hidden probability and click outcome of every round
    pub round_log: Vec<RoundRecord>,
    pub wins_by_bidder: Vec<u64>,
    pub successes_by_bidder: Vec<u64>,
    pub spend_by_bidder: Vec<f64>,
    /// Sum of the round-mean bid over the rounds each user was selected
    bid_mean_sums_by_user: Vec<f64>,
    /// Sum of clearing prices over the rounds each user was selected
    clearing_sums_by_user: Vec<f64>,
    rounds_selected_by_user: Vec<u64>,
    pub rounds_executed: u64,
    rng_user_pick: StdRng,
    rng_clicks: StdRng,
    rng_tiebreak: StdRng,
}

impl Auction {
    /// Create an auction over a fixed user universe and bidder field.
    /// Panics on an empty bidder or user set: a round could not determine a
    /// winner, so the configuration is rejected before anything executes.
    pub fn new(users: Users, bidders: Bidders) -> Self {
        if bidders.is_empty() {
            panic!("An auction needs at least one bidder");
        }
        if users.is_empty() {
            panic!("An auction needs at least one user");
        }
        assert_eq!(
            users.len(),
            bidders.num_users(),
            "Bidders were constructed for a universe of {} users but the auction has {}",
            bidders.num_users(),
            users.len()
        );

        let num_bidders = bidders.len();
        let num_users = users.len();
        Self {
            users,
            bidders,
            balances: vec![0.0; num_bidders],
            balance_history: vec![vec![0.0]; num_bidders],
            winning_prices: Vec::new(),
            round_log: Vec::new(),
            wins_by_bidder: vec![0; num_bidders],
            successes_by_bidder: vec![0; num_bidders],
            spend_by_bidder: vec![0.0; num_bidders],
            bid_mean_sums_by_user: vec![0.0; num_users],
            clearing_sums_by_user: vec![0.0; num_users],
            rounds_selected_by_user: vec![0; num_users],
            rounds_executed: 0,
            rng_user_pick: StdRng::seed_from_u64(get_seed(1991)),
            rng_clicks: StdRng::seed_from_u64(get_seed(2992)),
            rng_tiebreak: StdRng::seed_from_u64(get_seed(3993)),
        }
    }

    /// Execute one round of the game
    pub fn execute_round(&mut self, logger: &mut Logger) -> RoundOutcome {
        // Select a user uniformly at random, with replacement across rounds
        let user_id = self.rng_user_pick.gen_range(0..self.users.len());

        // Collect one sealed bid per bidder, in id order. The amounts are
        // taken as returned; the policy contract already promises they are
        // nonnegative.
        let bids: Vec<f64> = self
            .bidders
            .bidders
            .iter_mut()
            .map(|bidder| bidder.bid(user_id))
            .collect();

        // Single scan for the winner and the clearing price. A strictly
        // higher bid resets the tied set and demotes the old maximum to
        // second-highest; a bid tying the maximum joins the tied set and
        // pulls the second-highest up to the maximum, so a full tie at the
        // top clears at the tied value; a bid strictly between the two
        // bounds only raises the second-highest. Both bounds start at zero,
        // which is also where a lone bidder or an all-zero round clears.
        let mut max_bid = 0.0;
        let mut second_highest_bid = 0.0;
        let mut tied_winners: Vec<usize> = Vec::new();
        for (bidder_id, &bid) in bids.iter().enumerate() {
            if bid > max_bid {
                second_highest_bid = max_bid;
                max_bid = bid;
                tied_winners.clear();
                tied_winners.push(bidder_id);
            } else if bid == max_bid {
                tied_winners.push(bidder_id);
                second_highest_bid = bid;
            } else if bid > second_highest_bid {
                second_highest_bid = bid;
            }
        }
        let winner_id = tied_winners[self.rng_tiebreak.gen_range(0..tied_winners.len())];

        // Show the ad: exactly one sample per round, taken only now that the
        // round is actually being played out
        let clicked = self.users.users[user_id].show_ad(&mut self.rng_clicks);

        // Notify every bidder. The winner learns the outcome; losers learn
        // only the clearing price.
        for bidder in self.bidders.bidders.iter_mut() {
            if bidder.bidder_id == winner_id {
                bidder.notify(true, second_highest_bid, Some(clicked));
            } else {
                bidder.notify(false, second_highest_bid, None);
            }
        }

        // Settle: the impression is paid for whether or not it clicks, and a
        // click earns one unit of revenue. No other balance moves.
        self.balances[winner_id] -= second_highest_bid;
        self.spend_by_bidder[winner_id] += second_highest_bid;
        self.wins_by_bidder[winner_id] += 1;
        if clicked {
            self.balances[winner_id] += 1.0;
            self.successes_by_bidder[winner_id] += 1;
        }

        // Append the histories: round log, clearing price, every bidder's
        // post-settlement balance (unchanged balances repeat their last
        // value), and the per-user diagnostic sums
        let round_bid_mean = bids.iter().sum::<f64>() / bids.len() as f64;
        self.bid_mean_sums_by_user[user_id] += round_bid_mean;
        self.clearing_sums_by_user[user_id] += second_highest_bid;
        self.rounds_selected_by_user[user_id] += 1;
        for (bidder_id, history) in self.balance_history.iter_mut().enumerate() {
            history.push(self.balances[bidder_id]);
        }
        self.round_log.push(RoundRecord {
            user_id,
            true_probability: self.users.users[user_id].true_probability(),
            clicked,
        });
        self.winning_prices.push(second_highest_bid);
        self.rounds_executed += 1;

        if VERBOSE_AUCTION.load(Ordering::Relaxed) {
            let mut csv_fields = vec![
                format!("{}", self.rounds_executed),
                format!("{}", user_id),
                format!("{}", winner_id),
                format!("{:.4}", second_highest_bid),
                format!("{}", clicked),
            ];
            for bid in &bids {
                csv_fields.push(format!("{:.4}", bid));
            }
            logln!(logger, LogEvent::Auction, "{}", csv_fields.join(","));
        }

        RoundOutcome {
            user_id,
            winner_id,
            clearing_price: second_highest_bid,
            clicked,
        }
    }

    /// Average of the round-mean bids over the rounds each user was selected
    /// (0.0 for users never selected)
    pub fn average_bid_by_user(&self) -> Vec<f64> {
        self.bid_mean_sums_by_user
            .iter()
            .zip(&self.rounds_selected_by_user)
            .map(|(&sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect()
    }

    /// Average clearing price over the rounds each user was selected
    /// (0.0 for users never selected)
    pub fn average_clearing_by_user(&self) -> Vec<f64> {
        self.clearing_sums_by_user
            .iter()
            .zip(&self.rounds_selected_by_user)
            .map(|(&sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect()
    }

    /// Verify the history bookkeeping: one clearing price and one round log
    /// entry per executed round, and one balance entry per round and bidder
    /// on top of the initial zero
    pub fn check_bookkeeping(&self) -> Result<(), String> {
        if self.winning_prices.len() as u64 != self.rounds_executed {
            return Err(format!(
                "winning price history has {} entries for {} rounds",
                self.winning_prices.len(),
                self.rounds_executed
            ));
        }
        if self.round_log.len() as u64 != self.rounds_executed {
            return Err(format!(
                "round log has {} entries for {} rounds",
                self.round_log.len(),
                self.rounds_executed
            ));
        }
        for (bidder_id, history) in self.balance_history.iter().enumerate() {
            if history.len() as u64 != self.rounds_executed + 1 {
                return Err(format!(
                    "balance history of bidder {} has {} entries for {} rounds",
                    bidder_id,
                    history.len(),
                    self.rounds_executed
                ));
            }
            if history[0] != 0.0 {
                return Err(format!(
                    "balance history of bidder {} does not start at 0.0",
                    bidder_id
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidders::BidderType;
    use crate::utils::RAND_SEED;

    fn constant_auction(probabilities: Vec<f64>, amounts: &[f64], total_rounds: u64) -> Auction {
        let users = Users::from_probabilities(probabilities);
        let mut bidders = Bidders::new(users.len(), total_rounds);
        for (index, &amount) in amounts.iter().enumerate() {
            bidders.add(format!("bidder{}", index), BidderType::CONSTANT { amount });
        }
        Auction::new(users, bidders)
    }

    #[test]
    fn test_clearing_price_is_second_highest() {
        let mut auction = constant_auction(vec![0.0], &[5.0, 3.0, 1.0], 1);
        let outcome = auction.execute_round(&mut Logger::new());
        assert_eq!(outcome.winner_id, 0);
        assert_eq!(outcome.clearing_price, 3.0);
    }

    #[test]
    fn test_second_highest_tracked_behind_maximum() {
        // The runner-up arriving after the maximum must still be picked up
        let mut auction = constant_auction(vec![0.0], &[1.0, 3.0, 2.0], 1);
        let outcome = auction.execute_round(&mut Logger::new());
        assert_eq!(outcome.winner_id, 1);
        assert_eq!(outcome.clearing_price, 2.0);
    }

    #[test]
    fn test_certain_click_settlement() {
        // One certain clicker, bids 5 and 3: the 5-bidder wins at 3, pays 3,
        // earns 1 for the click
        let mut auction = constant_auction(vec![1.0], &[5.0, 3.0], 1);
        let outcome = auction.execute_round(&mut Logger::new());
        assert_eq!(outcome.winner_id, 0);
        assert_eq!(outcome.clearing_price, 3.0);
        assert!(outcome.clicked);
        assert_eq!(auction.balances, vec![-2.0, 0.0]);
        assert_eq!(auction.winning_prices, vec![3.0]);
        assert_eq!(auction.round_log[0].true_probability, 1.0);
        assert_eq!(auction.wins_by_bidder, vec![1, 0]);
        assert_eq!(auction.successes_by_bidder, vec![1, 0]);
    }

    #[test]
    fn test_lone_bidder_clears_at_zero() {
        let mut auction = constant_auction(vec![1.0], &[2.0], 3);
        for _ in 0..3 {
            let outcome = auction.execute_round(&mut Logger::new());
            assert_eq!(outcome.clearing_price, 0.0);
        }
        // Never pays, keeps every click as pure revenue
        assert_eq!(auction.balances[0], 3.0);
        assert_eq!(auction.spend_by_bidder[0], 0.0);
    }

    #[test]
    fn test_all_zero_bids_clear_at_zero() {
        let users = Users::from_probabilities(vec![0.0]);
        let mut bidders = Bidders::new(1, 1);
        bidders.add("floor0".to_string(), BidderType::ABSTAIN);
        bidders.add("floor1".to_string(), BidderType::ABSTAIN);
        let mut auction = Auction::new(users, bidders);
        let outcome = auction.execute_round(&mut Logger::new());
        assert_eq!(outcome.clearing_price, 0.0);
        assert_eq!(auction.wins_by_bidder.iter().sum::<u64>(), 1);
        assert_eq!(auction.balances, vec![0.0, 0.0]);
    }

    #[test]
    fn test_full_tie_clears_at_tied_value() {
        let mut auction = constant_auction(vec![0.0], &[0.7, 0.7, 0.7], 1);
        let outcome = auction.execute_round(&mut Logger::new());
        assert_eq!(outcome.clearing_price, 0.7);
    }

    #[test]
    fn test_tie_break_is_roughly_uniform() {
        let mut auction = constant_auction(vec![0.5], &[0.5, 0.5], 2000);
        let mut logger = Logger::new();
        for _ in 0..2000 {
            let outcome = auction.execute_round(&mut logger);
            assert_eq!(outcome.clearing_price, 0.5);
        }
        // Binomial(2000, 0.5): a 40%..60% window is over 9 standard
        // deviations wide
        for &wins in &auction.wins_by_bidder {
            assert!((800..=1200).contains(&wins), "uneven tie split: {:?}", auction.wins_by_bidder);
        }
    }

    #[test]
    fn test_losers_balances_never_move() {
        let mut auction = constant_auction(vec![0.5, 0.9], &[5.0, 3.0], 50);
        let mut logger = Logger::new();
        for _ in 0..50 {
            auction.execute_round(&mut logger);
        }
        assert_eq!(auction.balances[1], 0.0);
        assert!(auction.balance_history[1].iter().all(|&balance| balance == 0.0));
    }

    #[test]
    fn test_bookkeeping_invariants_hold() {
        let mut auction = constant_auction(vec![0.2, 0.8], &[1.0, 0.5], 10);
        let mut logger = Logger::new();
        for _ in 0..10 {
            auction.execute_round(&mut logger);
        }
        assert_eq!(auction.rounds_executed, 10);
        assert!(auction.check_bookkeeping().is_ok());
        for history in &auction.balance_history {
            assert_eq!(history.len(), 11);
            assert_eq!(history[0], 0.0);
        }
    }

    #[test]
    fn test_balance_equals_clicks_minus_spend() {
        let users = Users::from_probabilities(vec![0.3, 0.6, 0.9]);
        let mut bidders = Bidders::new(3, 200);
        bidders.add(
            "learner".to_string(),
            BidderType::EXPLORE_EXPLOIT {
                exploration_fraction: 0.2,
                exploration_bid: 0.85,
                under_cut: 0.0,
            },
        );
        bidders.add("random".to_string(), BidderType::RANDOM);
        bidders.add("floor".to_string(), BidderType::ABSTAIN);
        let mut auction = Auction::new(users, bidders);
        let mut logger = Logger::new();
        for _ in 0..200 {
            auction.execute_round(&mut logger);
        }
        for bidder_id in 0..3 {
            let expected =
                auction.successes_by_bidder[bidder_id] as f64 - auction.spend_by_bidder[bidder_id];
            assert!((auction.balances[bidder_id] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fixed_seed_replays_identically() {
        RAND_SEED.store(4242, Ordering::Relaxed);

        let build = || {
            let users = Users::from_probabilities(vec![0.1, 0.5, 0.9]);
            let mut bidders = Bidders::new(3, 300);
            bidders.add(
                "learner".to_string(),
                BidderType::EXPLORE_EXPLOIT {
                    exploration_fraction: 0.1,
                    exploration_bid: 0.85,
                    under_cut: 0.05,
                },
            );
            bidders.add("random".to_string(), BidderType::RANDOM);
            Auction::new(users, bidders)
        };

        let mut logger = Logger::new();
        let mut first = build();
        let mut second = build();
        for _ in 0..300 {
            first.execute_round(&mut logger);
            second.execute_round(&mut logger);
        }

        assert_eq!(first.round_log, second.round_log);
        assert_eq!(first.winning_prices, second.winning_prices);
        assert_eq!(first.balances, second.balances);
        assert_eq!(first.balance_history, second.balance_history);
    }

    #[test]
    fn test_average_clearing_by_user() {
        let mut auction = constant_auction(vec![0.0], &[4.0, 2.5], 4);
        let mut logger = Logger::new();
        for _ in 0..4 {
            auction.execute_round(&mut logger);
        }
        assert_eq!(auction.average_clearing_by_user(), vec![2.5]);
        // Mean of the two constant bids
        assert_eq!(auction.average_bid_by_user(), vec![3.25]);
    }

    #[test]
    #[should_panic(expected = "at least one bidder")]
    fn test_empty_bidder_set_rejected() {
        let users = Users::from_probabilities(vec![0.5]);
        let bidders = Bidders::new(1, 10);
        Auction::new(users, bidders);
    }

    #[test]
    #[should_panic(expected = "at least one user")]
    fn test_empty_user_set_rejected() {
        let users = Users::from_probabilities(vec![]);
        let mut bidders = Bidders::new(0, 10);
        bidders.add("lonely".to_string(), BidderType::ABSTAIN);
        Auction::new(users, bidders);
    }
}
