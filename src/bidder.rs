/// This is a file where the bidding agents reside.
/// A bidder is asked for one sealed bid per round and is told afterwards
/// whether it won and what the clearing price was. Only the round's winner
/// is told whether the user clicked, so belief about a user can only be
/// bought by winning impressions for that user.

use rand::{rngs::StdRng, Rng};

use crate::beliefs::ClickEstimates;

/// Trait for bid policies. The policy decides the amount; bookkeeping that
/// is common to all bidders (round counting, last-user memory, the notify
/// contract) lives in Bidder.
pub trait BidPolicyTrait {
    /// Return a nonnegative bid for the given user.
    /// `rounds_bid` is how many bids this bidder has placed before this one,
    /// `total_rounds` the planned length of the game.
    fn place_bid(&mut self, user_id: usize, rounds_bid: u64, total_rounds: u64) -> f64;

    /// Consume the click outcome of a round this bidder won
    fn observe(&mut self, user_id: usize, clicked: bool);

    /// Human readable label of the policy with its configured parameters
    fn get_policy_type(&self) -> String;

    /// Belief table of the policy, for reporting. Policies that do not learn
    /// return None.
    fn estimates(&self) -> Option<&ClickEstimates> {
        None
    }
}

/// Policy that explores with a fixed bid for a fixed fraction of the game,
/// then bids just below its belief about the user's click value.
pub struct PolicyExploreExploit {
    pub exploration_fraction: f64,
    pub exploration_bid: f64,
    pub under_cut: f64,
    estimates: ClickEstimates,
}

impl PolicyExploreExploit {
    pub fn new(num_users: usize, exploration_fraction: f64, exploration_bid: f64, under_cut: f64) -> Self {
        Self {
            exploration_fraction,
            exploration_bid,
            under_cut,
            estimates: ClickEstimates::new(num_users),
        }
    }
}

impl BidPolicyTrait for PolicyExploreExploit {
    fn place_bid(&mut self, user_id: usize, rounds_bid: u64, total_rounds: u64) -> f64 {
        // The exploration phase ends once the fraction of the game played
        // reaches exploration_fraction; the transition is one way.
        if (rounds_bid as f64) / (total_rounds as f64) < self.exploration_fraction {
            self.exploration_bid
        } else {
            // A click is worth 1.0, so the estimated click rate is the
            // estimated value of the impression. Never bid below zero.
            (self.estimates.estimate(user_id) - self.under_cut).max(0.0)
        }
    }

    fn observe(&mut self, user_id: usize, clicked: bool) {
        self.estimates.record(user_id, clicked);
    }

    fn get_policy_type(&self) -> String {
        format!(
            "explore/exploit (explore {:.0}% at {:.2}, undercut {:.2})",
            self.exploration_fraction * 100.0,
            self.exploration_bid,
            self.under_cut
        )
    }

    fn estimates(&self) -> Option<&ClickEstimates> {
        Some(&self.estimates)
    }
}

/// Baseline policy bidding a uniform random amount in [0, 1) every round
pub struct PolicyRandom {
    rng: StdRng,
}

impl PolicyRandom {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl BidPolicyTrait for PolicyRandom {
    fn place_bid(&mut self, _user_id: usize, _rounds_bid: u64, _total_rounds: u64) -> f64 {
        self.rng.gen::<f64>()
    }

    fn observe(&mut self, _user_id: usize, _clicked: bool) {}

    fn get_policy_type(&self) -> String {
        "random [0, 1)".to_string()
    }
}

/// Policy bidding a fixed amount every round
pub struct PolicyConstant {
    pub amount: f64,
}

impl BidPolicyTrait for PolicyConstant {
    fn place_bid(&mut self, _user_id: usize, _rounds_bid: u64, _total_rounds: u64) -> f64 {
        self.amount
    }

    fn observe(&mut self, _user_id: usize, _clicked: bool) {}

    fn get_policy_type(&self) -> String {
        format!("constant {:.2}", self.amount)
    }
}

/// Baseline policy that never competes
pub struct PolicyAbstain;

impl BidPolicyTrait for PolicyAbstain {
    fn place_bid(&mut self, _user_id: usize, _rounds_bid: u64, _total_rounds: u64) -> f64 {
        0.0
    }

    fn observe(&mut self, _user_id: usize, _clicked: bool) {}

    fn get_policy_type(&self) -> String {
        "abstain".to_string()
    }
}

/// A bidding agent: identity plus policy plus the bookkeeping shared by all
/// policies. Balances are not here: finances are handled entirely by the
/// auction, a bidder only learns prices through notify.
pub struct Bidder {
    pub bidder_id: usize,
    pub bidder_name: String,
    num_users: usize,
    total_rounds: u64,
    rounds_bid: u64,
    last_user: Option<usize>,
    policy: Box<dyn BidPolicyTrait>,
}

impl Bidder {
    pub fn new(
        bidder_id: usize,
        bidder_name: String,
        num_users: usize,
        total_rounds: u64,
        policy: Box<dyn BidPolicyTrait>,
    ) -> Self {
        Self {
            bidder_id,
            bidder_name,
            num_users,
            total_rounds,
            rounds_bid: 0,
            last_user: None,
            policy,
        }
    }

    /// Place a sealed bid for the given user. Remembers the user so the
    /// following notify call can attribute the outcome; the bidder does not
    /// know yet whether it will win. The bid counter advances on every call
    /// whatever the policy does.
    pub fn bid(&mut self, user_id: usize) -> f64 {
        assert!(
            user_id < self.num_users,
            "Bidder {} solicited for unknown user {} (universe of {})",
            self.bidder_id,
            user_id,
            self.num_users
        );
        self.last_user = Some(user_id);
        let rounds_bid = self.rounds_bid;
        self.rounds_bid += 1;
        self.policy.place_bid(user_id, rounds_bid, self.total_rounds)
    }

    /// Report the round outcome back to the bidder.
    /// `clicked` must be present exactly when the bidder won; a winner's
    /// policy observes the outcome for the user it last bid on, a loser
    /// observes nothing. The clearing price is disclosed to everyone but
    /// does not feed the belief update.
    pub fn notify(&mut self, won_auction: bool, _clearing_price: f64, clicked: Option<bool>) {
        if won_auction != clicked.is_some() {
            panic!(
                "notify contract violation for bidder {}: clicked must be present exactly when the auction was won (won={}, clicked={:?})",
                self.bidder_id, won_auction, clicked
            );
        }
        if let Some(clicked) = clicked {
            let user_id = self
                .last_user
                .expect("notify of a win before any bid was solicited");
            self.policy.observe(user_id, clicked);
        }
    }

    /// Count of bids placed so far
    pub fn rounds_bid(&self) -> u64 {
        self.rounds_bid
    }

    /// Label of the configured policy, for reporting
    pub fn get_policy_type(&self) -> String {
        self.policy.get_policy_type()
    }

    /// Belief table of the policy, when the policy learns one
    pub fn estimates(&self) -> Option<&ClickEstimates> {
        self.policy.estimates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn learner(num_users: usize, total_rounds: u64, fraction: f64) -> Bidder {
        Bidder::new(
            0,
            "learner".to_string(),
            num_users,
            total_rounds,
            Box::new(PolicyExploreExploit::new(num_users, fraction, 0.85, 0.0)),
        )
    }

    #[test]
    fn test_explore_then_exploit_transition() {
        // 4 planned rounds with a 0.5 fraction: rounds 0 and 1 explore,
        // rounds 2 and 3 exploit
        let mut bidder = learner(1, 4, 0.5);
        assert_eq!(bidder.bid(0), 0.85);
        bidder.notify(true, 0.0, Some(true));
        assert_eq!(bidder.bid(0), 0.85);
        bidder.notify(true, 0.0, Some(true));
        // Two certain clicks observed, estimate is 1.0
        assert_eq!(bidder.bid(0), 1.0);
        bidder.notify(false, 0.5, None);
        // Losses change nothing, still exploiting
        assert_eq!(bidder.bid(0), 1.0);
    }

    #[test]
    fn test_estimate_unseen_user_bids_zero() {
        let mut bidder = learner(2, 10, 0.0);
        // Never explored, never won: estimate 0.0, bid 0.0
        assert_eq!(bidder.bid(1), 0.0);
    }

    #[test]
    fn test_undercut_never_goes_negative() {
        let mut bidder = Bidder::new(
            0,
            "cutter".to_string(),
            1,
            10,
            Box::new(PolicyExploreExploit::new(1, 0.0, 0.85, 0.5)),
        );
        bidder.bid(0);
        bidder.notify(true, 0.1, Some(false));
        bidder.bid(0);
        bidder.notify(true, 0.1, Some(true));
        // estimate 0.5, undercut 0.5 -> exactly 0.0 instead of negative
        assert_eq!(bidder.bid(0), 0.0);
    }

    #[test]
    fn test_losses_never_update_belief() {
        let mut bidder = learner(1, 10, 0.0);
        for _ in 0..5 {
            bidder.bid(0);
            bidder.notify(false, 0.3, None);
        }
        assert_eq!(bidder.estimates().unwrap().attempts(0), 0);
        assert_eq!(bidder.rounds_bid(), 5);
    }

    #[test]
    fn test_belief_tracks_wins_per_user() {
        let mut bidder = learner(3, 10, 0.0);
        bidder.bid(2);
        bidder.notify(true, 0.1, Some(true));
        bidder.bid(2);
        bidder.notify(true, 0.1, Some(false));
        bidder.bid(1);
        bidder.notify(true, 0.1, Some(true));
        let estimates = bidder.estimates().unwrap();
        assert_eq!(estimates.estimate(2), 0.5);
        assert_eq!(estimates.estimate(1), 1.0);
        assert_eq!(estimates.estimate(0), 0.0);
    }

    #[test]
    #[should_panic(expected = "notify contract violation")]
    fn test_loss_with_outcome_rejected() {
        let mut bidder = learner(1, 10, 0.5);
        bidder.bid(0);
        bidder.notify(false, 0.2, Some(true));
    }

    #[test]
    #[should_panic(expected = "notify contract violation")]
    fn test_win_without_outcome_rejected() {
        let mut bidder = learner(1, 10, 0.5);
        bidder.bid(0);
        bidder.notify(true, 0.2, None);
    }

    #[test]
    #[should_panic(expected = "unknown user")]
    fn test_bid_outside_user_universe_rejected() {
        let mut bidder = learner(2, 10, 0.5);
        bidder.bid(2);
    }

    #[test]
    fn test_random_policy_stays_in_unit_interval() {
        let mut bidder = Bidder::new(
            0,
            "random".to_string(),
            1,
            10,
            Box::new(PolicyRandom::new(StdRng::seed_from_u64(11))),
        );
        for _ in 0..200 {
            let bid = bidder.bid(0);
            assert!((0.0..1.0).contains(&bid));
        }
    }

    #[test]
    fn test_abstain_always_bids_zero() {
        let mut bidder = Bidder::new(0, "floor".to_string(), 1, 10, Box::new(PolicyAbstain));
        assert_eq!(bidder.bid(0), 0.0);
        bidder.notify(false, 0.4, None);
        assert_eq!(bidder.bid(0), 0.0);
    }
}
