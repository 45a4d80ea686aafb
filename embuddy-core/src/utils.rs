use rand::{seq::index, SeedableRng};
use rand::rngs::StdRng;

/// Creates a seeded random number generator or a default one.
pub fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Picks up to `amount` distinct indices out of `0..len`, in ascending order.
/// Every index is returned when `len <= amount`.
pub(crate) fn sample_indices(len: usize, amount: usize, seed: Option<u64>) -> Vec<usize> {
    if len <= amount {
        return (0..len).collect();
    }
    let mut rng = create_rng(seed);
    let mut picked = index::sample(&mut rng, len, amount).into_vec();
    picked.sort_unstable();
    picked
}
