/// Constant-bid fields make the second-price mechanics directly checkable.
///
/// Its two variants:
///
/// - Variant A: bidders at 5 / 3 / 1 — the strongest bidder wins every round
///   and pays the runner-up's 3, never its own bid.
///
/// - Variant B: a lone bidder — with nobody underneath, every round clears
///   at zero and the bidder keeps its clicks as pure revenue.

use crate::auction::Auction;
use crate::bidders::{BidderType, Bidders};
use crate::logger::{LogEvent, Logger};
use crate::simulationrun::Simulation;
use crate::users::Users;
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "second_price_dynamics",
    run,
});

const ROUNDS: u64 = 2000;

/// Prepare a simulation with one constant bidder per given amount
fn prepare_simulation(amounts: &[f64]) -> Simulation {
    let users = Users::from_probabilities(vec![0.9, 0.5, 0.1, 0.7, 0.3]);

    let mut bidders = Bidders::new(users.len(), ROUNDS);
    for (index, &amount) in amounts.iter().enumerate() {
        bidders.add(format!("constant{}", index), BidderType::CONSTANT { amount });
    }

    Simulation::new(Auction::new(users, bidders))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    // Run variant A with a field of three constant bidders
    let mut simulation_a = prepare_simulation(&[5.0, 3.0, 1.0]);
    let stats_a = simulation_a.run_variant(
        "Running constant bidders at 5 / 3 / 1",
        scenario_name,
        "field",
        logger,
    );

    // Run variant B with a lone bidder
    let mut simulation_b = prepare_simulation(&[2.0]);
    let stats_b = simulation_b.run_variant(
        "Running a lone constant bidder at 2",
        scenario_name,
        "lone",
        logger,
    );

    logln!(logger, LogEvent::Scenario, "");

    let mut errors: Vec<String> = Vec::new();

    // Check: history bookkeeping lines up with the executed rounds
    let msg = format!("Variant A histories line up with {} executed rounds", ROUNDS);
    match simulation_a.auction.check_bookkeeping() {
        Ok(()) => logln!(logger, LogEvent::Scenario, "✓ {}", msg),
        Err(detail) => {
            let msg = format!("{} ({})", msg, detail);
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
    }

    // Check: the strongest bidder won every round
    let msg = format!(
        "Variant A strongest bidder won every round: {} of {}",
        stats_a.bidder_stats[0].wins, ROUNDS
    );
    if stats_a.bidder_stats[0].wins == ROUNDS {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: every clearing price equals the runner-up bid of 3
    let all_cleared_at_runner_up = simulation_a
        .auction
        .winning_prices
        .iter()
        .all(|&price| price == 3.0);
    let msg = "Variant A cleared every round at the runner-up bid of 3".to_string();
    if all_cleared_at_runner_up {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: losing bidders' balances never moved
    let msg = format!(
        "Variant A losers' balances stayed at zero: {:.2} and {:.2}",
        stats_a.bidder_stats[1].final_balance, stats_a.bidder_stats[2].final_balance
    );
    if stats_a.bidder_stats[1].final_balance == 0.0 && stats_a.bidder_stats[2].final_balance == 0.0 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the winner paid 3 per round and earned 1 per click
    let expected_balance = stats_a.bidder_stats[0].successes as f64 - 3.0 * ROUNDS as f64;
    let msg = format!(
        "Variant A winner's balance equals clicks minus payments: {:.2} vs {:.2}",
        stats_a.bidder_stats[0].final_balance, expected_balance
    );
    if (stats_a.bidder_stats[0].final_balance - expected_balance).abs() < 1e-6 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the lone bidder cleared every round at zero and never paid
    let lone_cleared_free = simulation_b
        .auction
        .winning_prices
        .iter()
        .all(|&price| price == 0.0);
    let msg = format!(
        "Variant B lone bidder cleared at zero throughout, spend {:.2}",
        stats_b.bidder_stats[0].total_spend
    );
    if lone_cleared_free && stats_b.bidder_stats[0].total_spend == 0.0 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the lone bidder's balance is exactly its click revenue
    let msg = format!(
        "Variant B lone bidder kept every click as revenue: balance {:.2} for {} clicks",
        stats_b.bidder_stats[0].final_balance, stats_b.bidder_stats[0].successes
    );
    if stats_b.bidder_stats[0].final_balance == stats_b.bidder_stats[0].successes as f64 {
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
