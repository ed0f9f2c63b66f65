use std::ops::BitXor;

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;
use crate::util::{BEAT_BITS, BEATS, BURST_BITS, BURST_BYTES};

/// One full burst read: 8 beats of 64 bits.
///
/// Bit order convention: bit `n` of the burst is bit `n % 64` of beat `n / 64`,
/// so beat 0 holds the least-significant 64 bits. Every beat and lane accessor
/// goes through [`Burst::beat`]; nothing else indexes the words directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Burst([u64; BEATS]);

impl Burst {
    pub const ZERO: Burst = Burst([0; BEATS]);
    pub const ONES: Burst = Burst([u64::MAX; BEATS]);

    pub const fn from_beats(beats: [u64; BEATS]) -> Self {
        Burst(beats)
    }

    /// Build a burst from its 64-byte little-endian encoding.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, InvariantViolation> {
        if bytes.len() != BURST_BYTES {
            return Err(InvariantViolation::MalformedBurst {
                len: bytes.len(),
                expected: BURST_BYTES,
            });
        }
        let mut beats = [0u64; BEATS];
        for (beat, chunk) in beats.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            *beat = u64::from_le_bytes(word);
        }
        Ok(Burst(beats))
    }

    pub fn beat(&self, beat: usize) -> u64 {
        assert!(beat < BEATS, "beat {} out of range", beat);
        self.0[beat]
    }

    pub fn beats(&self) -> impl Iterator<Item = u64> + '_ {
        (0..BEATS).map(|b| self.beat(b))
    }

    pub fn bit(&self, bit: usize) -> bool {
        assert!(bit < BURST_BITS, "bit {} out of range", bit);
        (self.beat(bit / BEAT_BITS) >> (bit % BEAT_BITS)) & 1 == 1
    }

    pub fn with_bit_flipped(mut self, bit: usize) -> Self {
        assert!(bit < BURST_BITS, "bit {} out of range", bit);
        self.0[bit / BEAT_BITS] ^= 1 << (bit % BEAT_BITS);
        self
    }

    pub fn count_ones(&self) -> u32 {
        self.beats().map(u64::count_ones).sum()
    }

    /// Strided extraction: `groups` groups of `group_size` bits, the first one
    /// starting at `first_bit`, each following one `stride` bits further.
    /// Returns the number of set bits among all extracted bits.
    pub fn count_strided(
        &self,
        first_bit: usize,
        stride: usize,
        group_size: usize,
        groups: usize,
    ) -> u32 {
        (0..groups)
            .map(|g| {
                let start = first_bit + g * stride;
                (start..start + group_size)
                    .filter(|bit| self.bit(*bit))
                    .count() as u32
            })
            .sum()
    }
}

impl BitXor for Burst {
    type Output = Burst;

    fn bitxor(self, rhs: Burst) -> Burst {
        let mut beats = self.0;
        for (b, r) in beats.iter_mut().zip(rhs.0.iter()) {
            *b ^= r;
        }
        Burst(beats)
    }
}

impl std::fmt::LowerHex for Burst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for beat in self.0.iter().rev() {
            write!(f, "{:016x}", beat)?;
        }
        Ok(())
    }
}
