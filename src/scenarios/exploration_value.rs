/// A learner only ever observes the users it wins impressions for, so a
/// learner that never explores never gets its belief table off the ground.
///
/// Its two variants run the same learner against the same random competitor
/// over the same low-CTR population, differing only in exploration budget:
///
/// - Variant A: 15% of the game spent exploring at a fixed bid
///
/// - Variant B: no exploration at all — the empty belief table makes it bid
///   zero forever

use crate::auction::Auction;
use crate::bidders::{BidderType, Bidders};
use crate::logger::{LogEvent, Logger};
use crate::simulationrun::Simulation;
use crate::users::{Users, UsersParam};
use crate::utils;
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "exploration_value",
    run,
});

const NUM_USERS: usize = 10;
const ROUNDS: u64 = 5000;

/// Prepare a simulation with a learner of the given exploration budget
/// against a random competitor. Both variants draw the user population from
/// the same seeded stream, so they face identical hidden probabilities.
fn prepare_simulation(exploration_fraction: f64) -> Simulation {
    // Beta(2, 6) skews towards the low click rates of display inventory
    let users_params = UsersParam::new(utils::beta_dist(2.0, 6.0));
    let users = Users::new(NUM_USERS, &users_params);

    let mut bidders = Bidders::new(NUM_USERS, ROUNDS);
    bidders.add(
        "learner".to_string(),
        BidderType::EXPLORE_EXPLOIT {
            exploration_fraction,
            exploration_bid: 0.85,
            under_cut: 0.0,
        },
    );
    bidders.add("random".to_string(), BidderType::RANDOM);

    Simulation::new(Auction::new(users, bidders))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    // Run variant A with an exploring learner
    let mut simulation_a = prepare_simulation(0.15);
    let stats_a = simulation_a.run_variant(
        "Running a learner exploring 15% of the game",
        scenario_name,
        "exploring",
        logger,
    );

    // Run variant B with a learner that never explores
    let mut simulation_b = prepare_simulation(0.0);
    let stats_b = simulation_b.run_variant(
        "Running a learner with no exploration",
        scenario_name,
        "blind",
        logger,
    );

    logln!(logger, LogEvent::Scenario, "");

    let mut errors: Vec<String> = Vec::new();

    let estimates_a = simulation_a.auction.bidders.bidders[0]
        .estimates()
        .expect("explore/exploit bidders carry a belief table");
    let estimates_b = simulation_b.auction.bidders.bidders[0]
        .estimates()
        .expect("explore/exploit bidders carry a belief table");

    // Check: without exploration the belief table never gets an entry, so
    // the bidder never bids above zero and never wins against the random
    // competitor
    let msg = format!(
        "Variant B learner never learned or won: {} attempts, {} wins, balance {:.2}",
        estimates_b.total_attempts(),
        stats_b.bidder_stats[0].wins,
        stats_b.bidder_stats[0].final_balance
    );
    if estimates_b.total_attempts() == 0
        && stats_b.bidder_stats[0].wins == 0
        && stats_b.bidder_stats[0].final_balance == 0.0
    {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the exploring learner covered the whole user universe
    // (each user is drawn about 75 times in the exploration phase, and the
    // exploration bid tops a uniform random bid 85% of the time)
    let msg = format!(
        "Variant A learner observed every user: {} of {}",
        estimates_a.users_observed(),
        NUM_USERS
    );
    if estimates_a.users_observed() == NUM_USERS {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the exploration phase bought a solid base of observations
    let msg = format!(
        "Variant A learner accumulated observations: {}",
        estimates_a.total_attempts()
    );
    if estimates_a.total_attempts() >= 400 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: exploring converts into wins the blind variant never gets
    let msg = format!(
        "Exploring learner out-won the blind one: {} > {}",
        stats_a.bidder_stats[0].wins, stats_b.bidder_stats[0].wins
    );
    if stats_a.bidder_stats[0].wins > stats_b.bidder_stats[0].wins {
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
