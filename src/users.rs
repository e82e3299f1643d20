use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Distribution;

use crate::utils::get_seed;

/// Object-safe wrapper for Distribution<f64> that works with StdRng
/// This is needed because Distribution<f64> cannot be made into a trait object
/// due to its generic sample method
pub trait DistributionF64 {
    fn sample(&self, rng: &mut StdRng) -> f64;
}

impl<D: Distribution<f64>> DistributionF64 for D {
    fn sample(&self, rng: &mut StdRng) -> f64 {
        Distribution::sample(self, rng)
    }
}

/// Struct for providing the distribution a user population is drawn from
pub struct UsersParam {
    pub click_probability_dist: Box<dyn DistributionF64>,
}

impl UsersParam {
    /// Create a new UsersParam from any Distribution<f64>
    /// The distribution will be boxed internally; sampled values are clamped into [0, 1]
    pub fn new<D>(click_probability_dist: D) -> Self
    where
        D: Distribution<f64> + 'static,
    {
        Self {
            click_probability_dist: Box::new(click_probability_dist),
        }
    }
}

/// A user an ad can be shown to. The click probability is hidden: it is fixed
/// at creation and the only public operation is sampling one impression.
pub struct User {
    click_probability: f64,
}

impl User {
    /// Create a user with the given click probability in [0, 1]
    pub fn new(click_probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&click_probability),
            "User click probability must be in [0, 1], got {}",
            click_probability
        );
        Self { click_probability }
    }

    /// Show the ad to this user once and report whether they clicked.
    /// One uniform draw in [0, 1); clicks iff the draw is <= the hidden
    /// probability. Independent of who is showing the ad and of prior draws.
    pub fn show_ad(&self, rng: &mut StdRng) -> bool {
        rng.gen::<f64>() <= self.click_probability
    }

    /// The hidden probability, readable inside the crate only so the auction
    /// can record ground truth in its round log. Never handed to a bidder.
    pub(crate) fn true_probability(&self) -> f64 {
        self.click_probability
    }
}

/// Container for the fixed user universe of a simulation
pub struct Users {
    pub users: Vec<User>,
}

impl Users {
    /// Create a population of `count` users with probabilities drawn from the
    /// configured distribution (clamped into [0, 1])
    pub fn new(count: usize, params: &UsersParam) -> Self {
        let mut rng_probabilities = StdRng::seed_from_u64(get_seed(1212));
        let users = (0..count)
            .map(|_| {
                let p = params
                    .click_probability_dist
                    .sample(&mut rng_probabilities)
                    .clamp(0.0, 1.0);
                User::new(p)
            })
            .collect();
        Self { users }
    }

    /// Create a population with explicitly chosen probabilities
    pub fn from_probabilities(probabilities: Vec<f64>) -> Self {
        let users = probabilities.into_iter().map(User::new).collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Uniform;

    #[test]
    fn test_certain_clicker_always_clicks() {
        let user = User::new(1.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(user.show_ad(&mut rng));
        }
    }

    #[test]
    fn test_never_clicker_does_not_click() {
        // A zero-probability user clicks only if the draw is exactly 0.0
        let user = User::new(0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(!user.show_ad(&mut rng));
        }
    }

    #[test]
    #[should_panic(expected = "must be in [0, 1]")]
    fn test_probability_above_one_rejected() {
        User::new(1.5);
    }

    #[test]
    #[should_panic(expected = "must be in [0, 1]")]
    fn test_negative_probability_rejected() {
        User::new(-0.1);
    }

    #[test]
    fn test_sampled_population_stays_in_range() {
        let params = UsersParam::new(Uniform::new(0.0, 1.0));
        let users = Users::new(50, &params);
        assert_eq!(users.len(), 50);
        for user in &users.users {
            let p = user.true_probability();
            assert!((0.0..1.0).contains(&p));
        }
    }

    #[test]
    fn test_explicit_population() {
        let users = Users::from_probabilities(vec![1.0, 0.0, 0.25]);
        assert_eq!(users.len(), 3);
        assert_eq!(users.users[2].true_probability(), 0.25);
    }
}
