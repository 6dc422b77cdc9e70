use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Permutation seed, stored in the manifest as a JSON number or string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seed {
    Number(u64),
    Text(String),
}

impl Seed {
    /// Fresh numeric seed from the OS CSPRNG
    pub fn generate() -> Self {
        Seed::Number(OsRng.gen_range(0..1_000_000_000))
    }

    fn rng(&self) -> Xoshiro256StarStar {
        // Both variants hash their text form, so 42 and "42" agree
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        Xoshiro256StarStar::from_seed(hasher.finalize().into())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seed::Number(n) => write!(f, "{}", n),
            Seed::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for Seed {
    type Err = Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<u64>() {
            Ok(n) => Seed::Number(n),
            Err(_) => Seed::Text(s.to_string()),
        })
    }
}

impl From<u64> for Seed {
    fn from(n: u64) -> Self {
        Seed::Number(n)
    }
}

impl From<&str> for Seed {
    fn from(s: &str) -> Self {
        Seed::Text(s.to_string())
    }
}

/// Permutation of `0..len` determined only by `len` and `seed`
/// Position `i` of the shuffled sequence holds original element `permutation[i]`
pub fn permutation(len: usize, seed: &Seed) -> Vec<usize> {
    let mut rng = seed.rng();
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Reorder `items` by the seeded permutation
pub fn shuffle<T>(items: Vec<T>, seed: &Seed) -> Vec<T> {
    let order = permutation(items.len(), seed);
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order.iter().filter_map(|&src| slots[src].take()).collect()
}

/// Exact inverse of [`shuffle`] for the same seed
pub fn unshuffle<T>(items: Vec<T>, seed: &Seed) -> Vec<T> {
    let order = permutation(items.len(), seed);
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (item, &dst) in items.into_iter().zip(&order) {
        slots[dst] = Some(item);
    }
    slots.into_iter().flatten().collect()
}
