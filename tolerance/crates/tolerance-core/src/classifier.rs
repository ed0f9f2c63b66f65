use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;
use crate::memory::Burst;
use crate::util::{BEAT_BITS, BEATS};

/// One observed read-back discrepancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Byte address of the burst, relative to the managed region.
    pub addr: usize,
    pub observed: Burst,
    pub expected: Burst,
}

impl ErrorRecord {
    pub fn new(addr: usize, observed: Burst, expected: Burst) -> Self {
        Self {
            addr,
            observed,
            expected,
        }
    }

    /// Build a record from the raw 64-byte read-back and reference values.
    pub fn from_le_bytes(
        addr: usize,
        observed: &[u8],
        expected: &[u8],
    ) -> Result<Self, InvariantViolation> {
        Ok(Self::new(
            addr,
            Burst::from_le_bytes(observed)?,
            Burst::from_le_bytes(expected)?,
        ))
    }

    pub fn flips(&self) -> Burst {
        self.observed ^ self.expected
    }
}

/// Where the flipped bits of one burst are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlipDecomposition {
    pub total: u32,
    pub per_beat: [u32; BEATS],
    /// Indexed `[chip][beat]`.
    pub per_chip_per_beat: Vec<[u32; BEATS]>,
    /// Indexed `[chip]`, flips of that chip's lane over all beats.
    pub per_chip_per_read: Vec<u32>,
}

/// Splits burst differences into beats and chip lanes.
#[derive(Clone, Copy, Debug)]
pub struct ErrorClassifier {
    nr_chips: usize,
    lane_width: usize,
}

impl ErrorClassifier {
    pub fn new(nr_chips: usize) -> Result<Self, InvariantViolation> {
        if nr_chips == 0 || nr_chips > BEAT_BITS || BEAT_BITS % nr_chips != 0 {
            return Err(InvariantViolation::LaneMismatch { nr_chips });
        }
        Ok(Self {
            nr_chips,
            lane_width: BEAT_BITS / nr_chips,
        })
    }

    fn lane(&self, beat: u64, chip: usize) -> u64 {
        let shifted = beat >> (chip * self.lane_width);
        if self.lane_width == BEAT_BITS {
            shifted
        } else {
            shifted & ((1u64 << self.lane_width) - 1)
        }
    }

    pub fn classify(
        &self,
        record: &ErrorRecord,
    ) -> Result<FlipDecomposition, InvariantViolation> {
        let flips = record.flips();
        let mut per_beat = [0u32; BEATS];
        let mut per_chip_per_beat = vec![[0u32; BEATS]; self.nr_chips];
        for (b, beat) in flips.beats().enumerate() {
            let count = beat.count_ones();
            if count as usize >= BEAT_BITS {
                return Err(InvariantViolation::FullBeatFlip {
                    addr: record.addr,
                    beat: b,
                    width: count,
                });
            }
            per_beat[b] = count;
            if count == 0 {
                continue;
            }
            for (chip, lanes) in per_chip_per_beat.iter_mut().enumerate() {
                lanes[b] = self.lane(beat, chip).count_ones();
            }
        }
        let per_chip_per_read = (0..self.nr_chips)
            .map(|chip| {
                flips.count_strided(chip * self.lane_width, BEAT_BITS, self.lane_width, BEATS)
            })
            .collect::<Vec<_>>();
        let d = FlipDecomposition {
            total: per_beat.iter().sum(),
            per_beat,
            per_chip_per_beat,
            per_chip_per_read,
        };
        trace!("Record at 0x{:x}: flips {:x} -> {:?}", record.addr, flips, d);
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::BURST_BITS;
    use proptest::prelude::*;

    fn record_with_bits(bits: &[usize]) -> ErrorRecord {
        let observed = bits
            .iter()
            .fold(Burst::ZERO, |b, bit| b.with_bit_flipped(*bit));
        ErrorRecord::new(0x40, observed, Burst::ZERO)
    }

    #[test]
    fn bits_zero_and_sixty_five_land_in_chip_zero() {
        let c = ErrorClassifier::new(8).unwrap();
        let d = c.classify(&record_with_bits(&[0, 65])).unwrap();
        assert_eq!(d.total, 2);
        assert_eq!(d.per_beat, [1, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(d.per_chip_per_beat[0], [1, 1, 0, 0, 0, 0, 0, 0]);
        assert!(d.per_chip_per_beat[1..].iter().all(|l| *l == [0; BEATS]));
        assert_eq!(d.per_chip_per_read, vec![2, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn lanes_follow_bit_position_within_beat() {
        let c = ErrorClassifier::new(4).unwrap();
        // beat 2, bits 16 and 63 of the beat: chips 1 and 3
        let d = c.classify(&record_with_bits(&[128 + 16, 128 + 63])).unwrap();
        assert_eq!(d.per_chip_per_beat[1][2], 1);
        assert_eq!(d.per_chip_per_beat[3][2], 1);
        assert_eq!(d.per_chip_per_read, vec![0, 1, 0, 1]);
    }

    #[test]
    fn single_chip_takes_the_whole_beat() {
        let c = ErrorClassifier::new(1).unwrap();
        let d = c.classify(&record_with_bits(&[0, 63, 511])).unwrap();
        assert_eq!(d.per_chip_per_beat[0][0], 2);
        assert_eq!(d.per_chip_per_beat[0][7], 1);
        assert_eq!(d.per_chip_per_read, vec![3]);
    }

    #[test]
    fn raw_bytes_must_be_a_full_burst() {
        let mut observed = [0xffu8; 64];
        observed[8] ^= 0x02;
        let r = ErrorRecord::from_le_bytes(0, &observed, &[0xff; 64]).unwrap();
        assert_eq!(r.flips(), Burst::ZERO.with_bit_flipped(65));
        assert_eq!(
            ErrorRecord::from_le_bytes(0, &observed[..32], &[0xff; 64]),
            Err(InvariantViolation::MalformedBurst {
                len: 32,
                expected: 64
            })
        );
    }

    #[test]
    fn full_beat_flip_is_an_invariant_violation() {
        let c = ErrorClassifier::new(8).unwrap();
        let r = ErrorRecord::new(
            0x80,
            Burst::from_beats([0, 0, 0, u64::MAX, 0, 0, 0, 0]),
            Burst::ZERO,
        );
        assert_eq!(
            c.classify(&r),
            Err(InvariantViolation::FullBeatFlip {
                addr: 0x80,
                beat: 3,
                width: 64
            })
        );
    }

    #[test]
    fn chip_counts_must_divide_the_beat() {
        for bad in [0, 3, 7, 65, 128] {
            assert_eq!(
                ErrorClassifier::new(bad).unwrap_err(),
                InvariantViolation::LaneMismatch { nr_chips: bad }
            );
        }
        for good in [1, 2, 4, 8, 16, 32, 64] {
            assert!(ErrorClassifier::new(good).is_ok());
        }
    }

    proptest! {
        #[test]
        fn chip_lanes_partition_every_beat(
            bits in proptest::collection::btree_set(0usize..BURST_BITS, 0..40),
            chips_log2 in 0u32..7,
        ) {
            let c = ErrorClassifier::new(1 << chips_log2).unwrap();
            let bits: Vec<usize> = bits.into_iter().collect();
            let d = c.classify(&record_with_bits(&bits)).unwrap();
            prop_assert_eq!(d.total as usize, bits.len());
            prop_assert_eq!(d.per_beat.iter().sum::<u32>(), d.total);
            for beat in 0..BEATS {
                let lanes: u32 = d.per_chip_per_beat.iter().map(|l| l[beat]).sum();
                prop_assert_eq!(lanes, d.per_beat[beat]);
            }
            prop_assert_eq!(d.per_chip_per_read.iter().sum::<u32>(), d.total);
        }
    }
}
