//! Opaque identifiers used on the wire.
//!
//! Two shapes are produced: dash-separated lowercase alphanumeric ids
//! (`8-4-4-4-12`) for messages and requests, and zero-prefixed numeric
//! device ids. Neither is a real UUID; the gateway only checks the shape.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const DIGITS: &[u8] = b"0123456789";

/// Group lengths of an opaque id.
pub const OPAQUE_ID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Constant prefix of every numeric id.
pub const NUMERIC_ID_PREFIX: &str = "0000000000000";

/// Number of random digits following [`NUMERIC_ID_PREFIX`].
pub const NUMERIC_ID_DIGITS: usize = 19;

/// Identifier generator backed by an injectable random source.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: StdRng,
}

impl IdGenerator {
    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator, for tests and reproducible traces.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` with lowercase letters and digits.
    pub fn new_opaque_id(&mut self) -> String {
        let mut id = String::with_capacity(36);
        for (i, len) in OPAQUE_ID_GROUPS.iter().enumerate() {
            if i > 0 {
                id.push('-');
            }
            self.push_random(&mut id, ALPHANUMERIC, *len);
        }
        id
    }

    /// Fixed-length numeric id: [`NUMERIC_ID_PREFIX`] followed by random digits.
    pub fn new_numeric_id(&mut self) -> String {
        let mut id = String::with_capacity(NUMERIC_ID_PREFIX.len() + NUMERIC_ID_DIGITS);
        id.push_str(NUMERIC_ID_PREFIX);
        self.push_random(&mut id, DIGITS, NUMERIC_ID_DIGITS);
        id
    }

    fn push_random(&mut self, out: &mut String, alphabet: &[u8], len: usize) {
        for _ in 0..len {
            let idx = self.rng.gen_range(0..alphabet.len());
            out.push(char::from(alphabet[idx]));
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}
