use super::ConfigurationError;
use crate::models::{DrawnWinner, Participant, SelectionOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Raw draw settings as supplied by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub winner_count: i64,
    /// Weight each candidate by its message count
    pub weighted: bool,
    /// Fixed seed for a reproducible draw
    pub seed: Option<u64>,
}

impl SelectionConfig {
    /// Check the configuration and return the requested winner count.
    pub fn validate(&self) -> Result<usize, ConfigurationError> {
        if self.winner_count < 0 {
            return Err(ConfigurationError::NegativeWinnerCount(self.winner_count));
        }
        Ok(self.winner_count as usize)
    }
}

/// Draw winners without replacement.
///
/// `winner_count` is clamped to the number of eligible participants. With a
/// seed, the same eligible sequence always yields the same outcome; without
/// one the RNG is seeded from OS entropy.
///
/// In weighted mode each step draws with probability proportional to
/// `message_count` among the candidates not drawn yet.
pub fn select(
    eligible: &[&Participant],
    winner_count: usize,
    weighted: bool,
    seed: Option<u64>,
) -> SelectionOutcome {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let target = winner_count.min(eligible.len());
    let mut pool: Vec<&Participant> = eligible.to_vec();
    let mut winners = Vec::with_capacity(target);

    for draw in 0..target {
        let picked = if weighted {
            pick_weighted(&pool, &mut rng)
        } else {
            rng.gen_range(0..pool.len())
        };
        let participant = pool.remove(picked);
        winners.push(DrawnWinner {
            identity: participant.identity.clone(),
            draw_order: draw as u32 + 1,
        });
    }

    tracing::info!(
        requested = winner_count,
        drawn = winners.len(),
        pool_size = eligible.len(),
        weighted,
        seeded = seed.is_some(),
        "🎲 Winners drawn"
    );

    SelectionOutcome {
        winners,
        weighted,
        seed,
        pool_size: eligible.len(),
    }
}

/// Validate `config` and run [`select`].
pub fn select_with_config(
    eligible: &[&Participant],
    config: &SelectionConfig,
) -> Result<SelectionOutcome, ConfigurationError> {
    let winner_count = config.validate()?;
    Ok(select(eligible, winner_count, config.weighted, config.seed))
}

/// Index of the next weighted draw, partitioning `[0, total)` by cumulative
/// message counts. `pool` must not be empty.
fn pick_weighted(pool: &[&Participant], rng: &mut StdRng) -> usize {
    let total: u64 = pool.iter().map(|p| p.message_count as u64).sum();
    if total == 0 {
        return rng.gen_range(0..pool.len());
    }

    let target = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for (index, participant) in pool.iter().enumerate() {
        cumulative += participant.message_count as u64;
        if target < cumulative {
            return index;
        }
    }
    pool.len() - 1
}
