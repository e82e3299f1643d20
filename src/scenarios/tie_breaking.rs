/// Two bidders posting the identical constant bid every round: the tie is
/// broken uniformly at random, and the tie collapses the clearing price to
/// the tied value itself (second price degenerates to pay-your-bid).

use crate::auction::Auction;
use crate::bidders::{BidderType, Bidders};
use crate::logger::{LogEvent, Logger};
use crate::simulationrun::Simulation;
use crate::users::Users;
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "tie_breaking",
    run,
});

const ROUNDS: u64 = 10000;
const TIED_BID: f64 = 0.5;

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let users = Users::from_probabilities(vec![0.8, 0.6, 0.4, 0.2, 0.5, 0.7, 0.3, 0.1, 0.9, 0.5]);

    let mut bidders = Bidders::new(users.len(), ROUNDS);
    bidders.add("twin0".to_string(), BidderType::CONSTANT { amount: TIED_BID });
    bidders.add("twin1".to_string(), BidderType::CONSTANT { amount: TIED_BID });

    let mut simulation = Simulation::new(Auction::new(users, bidders));
    let stats = simulation.run_variant(
        "Running two identical constant bidders",
        scenario_name,
        "twins",
        logger,
    );

    logln!(logger, LogEvent::Scenario, "");

    let mut errors: Vec<String> = Vec::new();

    // Check: a full tie at the top clears at the tied value itself
    let all_cleared_at_tie = simulation
        .auction
        .winning_prices
        .iter()
        .all(|&price| price == TIED_BID);
    let msg = format!("Every round cleared at the tied bid of {:.2}", TIED_BID);
    if all_cleared_at_tie {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: exactly one winner per round
    let total_wins: u64 = stats.bidder_stats.iter().map(|stat| stat.wins).sum();
    let msg = format!("One winner per round: {} wins over {} rounds", total_wins, ROUNDS);
    if total_wins == ROUNDS {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // Check: the tie split is close to even. Binomial(10000, 0.5) keeps the
    // share inside 45%..55% with enormous margin.
    for (index, bidder_stat) in stats.bidder_stats.iter().enumerate() {
        let share = bidder_stat.wins as f64 / ROUNDS as f64;
        let msg = format!(
            "Bidder {} won close to half of the ties: {:.1}%",
            index,
            100.0 * share
        );
        if (0.45..=0.55).contains(&share) {
            logln!(logger, LogEvent::Scenario, "✓ {}", msg);
        } else {
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
    }

    // Check: winners paid the tied value for each of their wins
    for (index, bidder_stat) in stats.bidder_stats.iter().enumerate() {
        let expected_spend = bidder_stat.wins as f64 * TIED_BID;
        let msg = format!(
            "Bidder {} paid the tied value for every win: {:.2} for {} wins",
            index, bidder_stat.total_spend, bidder_stat.wins
        );
        if (bidder_stat.total_spend - expected_spend).abs() < 1e-6 {
            logln!(logger, LogEvent::Scenario, "✓ {}", msg);
        } else {
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}
