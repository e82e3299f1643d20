/// This file contains the Simulation struct, which plays one auction game
/// through its planned number of rounds, and the statistics collected from
/// the finished game. A scenario typically builds several variants of the
/// field of bidders and compares their statistics.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::auction::Auction;
use crate::logger::{sanitize_filename, FileReceiver, LogEvent, Logger};
use crate::logln;
use crate::utils::{TOTAL_SIMULATION_RUNS, VERBOSE_AUCTION};

/// One simulation: an auction played for the number of rounds the bidder
/// field was constructed for
pub struct Simulation {
    pub auction: Auction,
}

impl Simulation {
    pub fn new(auction: Auction) -> Self {
        Self { auction }
    }

    /// Print initialization information about the game
    pub fn printout(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Simulation, "Initialized {} users", self.auction.users.len());
        logln!(logger, LogEvent::Simulation, "Initialized {} bidders", self.auction.bidders.len());
        logln!(
            logger,
            LogEvent::Simulation,
            "Planned rounds: {}",
            self.auction.bidders.total_rounds()
        );
    }

    /// Execute every planned round in order. Rounds are strictly sequential:
    /// settlement and logging of a round complete before the next selection.
    pub fn run(&mut self, logger: &mut Logger) {
        for _ in 0..self.auction.bidders.total_rounds() {
            self.auction.execute_round(logger);
        }
        TOTAL_SIMULATION_RUNS.fetch_add(1, Ordering::Relaxed);
    }

    /// Run one variant with logging setup and cleanup
    ///
    /// # Arguments
    /// * `variant_description` - Description of the variant being run
    /// * `scenario_name` - Name of the scenario (for log file paths)
    /// * `variant_name` - Name of the variant (for log file paths)
    /// * `logger` - Logger for event-based logging
    ///
    /// # Returns
    /// Returns the SimulationStat of the finished game
    pub fn run_variant(
        &mut self,
        variant_description: &str,
        scenario_name: &str,
        variant_name: &str,
        logger: &mut Logger,
    ) -> SimulationStat {
        // Add variant receiver (for variant events)
        let variant_receiver_id = logger.add_receiver(FileReceiver::new(
            &PathBuf::from(format!(
                "log/{}/variant-{}.log",
                sanitize_filename(scenario_name),
                sanitize_filename(variant_name)
            )),
            vec![LogEvent::Simulation, LogEvent::Variant],
        ));

        // Add per-round CSV receiver when verbose auction logging is on
        let auction_receiver_id = if VERBOSE_AUCTION.load(Ordering::Relaxed) {
            let receiver_id = logger.add_receiver(FileReceiver::new(
                &PathBuf::from(format!(
                    "log/{}/auctions-{}.csv",
                    sanitize_filename(scenario_name),
                    sanitize_filename(variant_name)
                )),
                vec![LogEvent::Auction],
            ));

            let mut header_fields = vec![
                "round".to_string(),
                "user_id".to_string(),
                "winner_id".to_string(),
                "clearing_price".to_string(),
                "clicked".to_string(),
            ];
            for bidder_id in 0..self.auction.bidders.len() {
                header_fields.push(format!("bidder_{}_bid", bidder_id));
            }
            logln!(logger, LogEvent::Auction, "{}", header_fields.join(","));

            Some(receiver_id)
        } else {
            None
        };

        logln!(logger, LogEvent::Variant, "\n=== {} ===", variant_description);
        self.printout(logger);

        self.run(logger);

        let stats = SimulationStat::new(&self.auction);
        stats.printout(&self.auction, logger);

        if let Some(id) = auction_receiver_id {
            logger.remove_receiver(id);
        }
        logger.remove_receiver(variant_receiver_id);

        stats
    }
}

/// Statistics for a single bidder
pub struct BidderStat {
    pub wins: u64,
    /// Clicks earned on won impressions
    pub successes: u64,
    pub total_spend: f64,
    pub final_balance: f64,
    /// Mean absolute gap between the bidder's estimates and the hidden
    /// probabilities, over the users it has observed at least once.
    /// None for policies without a belief table, or before any observation.
    pub mean_estimate_error: Option<f64>,
}

/// Overall statistics for the game
pub struct OverallStat {
    pub rounds_executed: u64,
    pub total_clicks: u64,
    pub total_cleared: f64,
    pub mean_clearing_price: f64,
}

/// Complete statistics of a finished game
pub struct SimulationStat {
    pub bidder_stats: Vec<BidderStat>,
    pub overall_stat: OverallStat,
}

impl SimulationStat {
    /// Generate statistics from a played auction
    pub fn new(auction: &Auction) -> Self {
        let bidder_stats = auction
            .bidders
            .bidders
            .iter()
            .enumerate()
            .map(|(bidder_id, bidder)| {
                let mean_estimate_error = bidder.estimates().and_then(|estimates| {
                    let mut error_sum = 0.0;
                    let mut observed = 0usize;
                    for (user_id, user) in auction.users.users.iter().enumerate() {
                        if estimates.attempts(user_id) > 0 {
                            error_sum +=
                                (estimates.estimate(user_id) - user.true_probability()).abs();
                            observed += 1;
                        }
                    }
                    if observed == 0 {
                        None
                    } else {
                        Some(error_sum / observed as f64)
                    }
                });
                BidderStat {
                    wins: auction.wins_by_bidder[bidder_id],
                    successes: auction.successes_by_bidder[bidder_id],
                    total_spend: auction.spend_by_bidder[bidder_id],
                    final_balance: auction.balances[bidder_id],
                    mean_estimate_error,
                }
            })
            .collect();

        let total_clicks = auction.round_log.iter().filter(|record| record.clicked).count() as u64;
        let total_cleared: f64 = auction.winning_prices.iter().sum();
        let mean_clearing_price = if auction.rounds_executed == 0 {
            0.0
        } else {
            total_cleared / auction.rounds_executed as f64
        };

        Self {
            bidder_stats,
            overall_stat: OverallStat {
                rounds_executed: auction.rounds_executed,
                total_clicks,
                total_cleared,
                mean_clearing_price,
            },
        }
    }

    /// Output bidder statistics (without header, for compact output)
    pub fn printout_bidders(&self, auction: &Auction, logger: &mut Logger, event: LogEvent) {
        for (index, bidder_stat) in self.bidder_stats.iter().enumerate() {
            let bidder = &auction.bidders.bidders[index];
            logln!(
                logger,
                event,
                "\nBidder {} ({}) - {}",
                bidder.bidder_id,
                bidder.bidder_name,
                bidder.get_policy_type()
            );
            logln!(
                logger,
                event,
                "  Wins / clicks earned: {} / {}",
                bidder_stat.wins,
                bidder_stat.successes
            );
            logln!(
                logger,
                event,
                "  Spend: {:.2}, final balance: {:.2}",
                bidder_stat.total_spend,
                bidder_stat.final_balance
            );
            if let Some(error) = bidder_stat.mean_estimate_error {
                logln!(logger, event, "  Mean estimate error: {:.4}", error);
            }
        }
    }

    /// Output only overall statistics
    pub fn printout_overall(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Variant, "\n=== Overall Statistics ===");
        logln!(
            logger,
            LogEvent::Variant,
            "Rounds: {}, clicks: {} ({:.2}%)",
            self.overall_stat.rounds_executed,
            self.overall_stat.total_clicks,
            if self.overall_stat.rounds_executed == 0 {
                0.0
            } else {
                100.0 * self.overall_stat.total_clicks as f64
                    / self.overall_stat.rounds_executed as f64
            }
        );
        logln!(
            logger,
            LogEvent::Variant,
            "Cleared: {:.2} total, {:.4} mean per round",
            self.overall_stat.total_cleared,
            self.overall_stat.mean_clearing_price
        );
    }

    /// Output complete statistics
    pub fn printout(&self, auction: &Auction, logger: &mut Logger) {
        logln!(logger, LogEvent::Variant, "\n=== Bidder Statistics ===");
        self.printout_bidders(auction, logger, LogEvent::Variant);
        self.printout_overall(logger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidders::{BidderType, Bidders};
    use crate::users::Users;

    #[test]
    fn test_stats_match_the_played_game() {
        let users = Users::from_probabilities(vec![1.0]);
        let mut bidders = Bidders::new(1, 20);
        bidders.add("strong".to_string(), BidderType::CONSTANT { amount: 5.0 });
        bidders.add("weak".to_string(), BidderType::CONSTANT { amount: 3.0 });
        let mut simulation = Simulation::new(Auction::new(users, bidders));
        simulation.run(&mut Logger::new());

        let stats = SimulationStat::new(&simulation.auction);
        // Certain clicker: every round won by the 5-bidder at price 3
        assert_eq!(stats.overall_stat.rounds_executed, 20);
        assert_eq!(stats.overall_stat.total_clicks, 20);
        assert_eq!(stats.bidder_stats[0].wins, 20);
        assert_eq!(stats.bidder_stats[0].total_spend, 60.0);
        assert_eq!(stats.bidder_stats[0].final_balance, -40.0);
        assert_eq!(stats.bidder_stats[1].wins, 0);
        assert_eq!(stats.bidder_stats[1].final_balance, 0.0);
        assert_eq!(stats.overall_stat.mean_clearing_price, 3.0);
    }

    #[test]
    fn test_estimate_error_for_a_winning_learner() {
        // A lone learner wins every round, so its estimates converge on the
        // certain clicker exactly
        let users = Users::from_probabilities(vec![1.0]);
        let mut bidders = Bidders::new(1, 30);
        bidders.add(
            "learner".to_string(),
            BidderType::EXPLORE_EXPLOIT {
                exploration_fraction: 0.5,
                exploration_bid: 0.85,
                under_cut: 0.0,
            },
        );
        let mut simulation = Simulation::new(Auction::new(users, bidders));
        simulation.run(&mut Logger::new());

        let stats = SimulationStat::new(&simulation.auction);
        assert_eq!(stats.bidder_stats[0].mean_estimate_error, Some(0.0));
    }

    #[test]
    fn test_estimate_error_absent_without_observations() {
        let users = Users::from_probabilities(vec![0.5]);
        let mut bidders = Bidders::new(1, 5);
        bidders.add("constant".to_string(), BidderType::CONSTANT { amount: 1.0 });
        let mut simulation = Simulation::new(Auction::new(users, bidders));
        simulation.run(&mut Logger::new());

        let stats = SimulationStat::new(&simulation.auction);
        // Constant policies have no belief table at all
        assert!(stats.bidder_stats[0].mean_estimate_error.is_none());
    }
}
