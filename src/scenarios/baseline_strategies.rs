/// The full field of baseline strategies competing over a uniform user
/// population: an abstaining floor, two explore/exploit learners with
/// different exploration budgets, and a random bidder.
///
/// The learners buy information early (a fixed exploration bid wins most
/// impressions cheaply against the random field) and then bid close to the
/// estimated click value; the random bidder keeps paying exploration-phase
/// prices for average users.

use rand::distributions::Uniform;

use crate::auction::Auction;
use crate::bidders::{BidderType, Bidders};
use crate::logger::{LogEvent, Logger};
use crate::simulationrun::Simulation;
use crate::users::{Users, UsersParam};
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "baseline_strategies",
    run,
});

const NUM_USERS: usize = 10;
const ROUNDS: u64 = 10000;

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let users_params = UsersParam::new(Uniform::new(0.0, 1.0));
    let users = Users::new(NUM_USERS, &users_params);

    let mut bidders = Bidders::new(NUM_USERS, ROUNDS);
    bidders.add("floor".to_string(), BidderType::ABSTAIN);
    bidders.add(
        "learner_short".to_string(),
        BidderType::EXPLORE_EXPLOIT {
            exploration_fraction: 0.05,
            exploration_bid: 0.85,
            under_cut: 0.0,
        },
    );
    bidders.add(
        "learner_long".to_string(),
        BidderType::EXPLORE_EXPLOIT {
            exploration_fraction: 0.2,
            exploration_bid: 0.85,
            under_cut: 0.1,
        },
    );
    bidders.add("random".to_string(), BidderType::RANDOM);

    let mut simulation = Simulation::new(Auction::new(users, bidders));
    let stats = simulation.run_variant(
        "Running abstain / two learners / random",
        scenario_name,
        "baseline",
        logger,
    );

    logln!(logger, LogEvent::Scenario, "");

    let mut errors: Vec<String> = Vec::new();

    // Check: history bookkeeping lines up with the executed rounds
    let msg = format!("Histories line up with {} executed rounds", ROUNDS);
    match simulation.auction.check_bookkeeping() {
        Ok(()) => logln!(logger, LogEvent::Scenario, "✓ {}", msg),
        Err(detail) => {
            let msg = format!("{} ({})", msg, detail);
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
    }

    // Check: the abstaining bidder never won and never moved its balance
    // (the random bidder is above zero on essentially every round)
    let msg = format!(
        "Abstaining bidder stayed out of the game: {} wins, balance {:.2}",
        stats.bidder_stats[0].wins, stats.bidder_stats[0].final_balance
    );
    if stats.bidder_stats[0].wins == 0 && stats.bidder_stats[0].final_balance == 0.0 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: every bidder's balance is exactly click revenue minus spend
    for (index, bidder_stat) in stats.bidder_stats.iter().enumerate() {
        let expected = bidder_stat.successes as f64 - bidder_stat.total_spend;
        let msg = format!(
            "Bidder {} balance equals clicks minus spend: {:.2} vs {:.2}",
            index, bidder_stat.final_balance, expected
        );
        if (bidder_stat.final_balance - expected).abs() < 1e-6 {
            logln!(logger, LogEvent::Scenario, "✓ {}", msg);
        } else {
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
    }

    // Check: both learners ended up with usable estimates
    // (statistical: thousands of won impressions spread over 10 users)
    for index in [1, 2] {
        let msg = match stats.bidder_stats[index].mean_estimate_error {
            Some(error) => {
                let msg = format!("Bidder {} mean estimate error is small: {:.4}", index, error);
                if error < 0.35 {
                    logln!(logger, LogEvent::Scenario, "✓ {}", msg);
                    continue;
                }
                msg
            }
            None => format!("Bidder {} never observed a single outcome", index),
        };
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the learners together out-win the random bidder
    // (true whenever the exploration bid tops the random range most rounds)
    let learner_wins = stats.bidder_stats[1].wins + stats.bidder_stats[2].wins;
    let msg = format!(
        "Learners out-won the random bidder: {} > {}",
        learner_wins, stats.bidder_stats[3].wins
    );
    if learner_wins > stats.bidder_stats[3].wins {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the random bidder ends in the red (Note: true whenever
    // exploration-phase prices exceed the typical click value)
    let msg = format!(
        "Random bidder ends in the red: balance {:.2}",
        stats.bidder_stats[3].final_balance
    );
    if stats.bidder_stats[3].final_balance < 0.0 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}
