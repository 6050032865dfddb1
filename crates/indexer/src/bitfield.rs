//! Decoding of attestation aggregation bitfields.
//!
//! Bitfields arrive as `0x`-prefixed hex. Bits are packed most-significant
//! first: position `p` lives in byte `p / 8` at bit `7 - p % 8`.

use tracing::warn;

/// A decoded aggregation bitfield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationBits(Vec<u8>);

impl AggregationBits {
    /// Decode a `0x`-prefixed hex string. Returns `None` if the prefix is
    /// missing or the digits are not valid hex.
    pub fn from_hex(hex_bits: &str) -> Option<Self> {
        let digits = hex_bits.strip_prefix("0x")?;
        hex::decode(digits).ok().map(Self)
    }

    /// Number of addressable bit positions.
    pub fn len(&self) -> usize {
        self.0.len() * 8
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit at `position`, or `None` past the end of the bitfield.
    pub fn get(&self, position: usize) -> Option<bool> {
        let byte = self.0.get(position / 8)?;
        Some((byte >> (7 - position % 8)) & 1 == 1)
    }

    /// Number of set bits among the first `size` positions, or `None` if the
    /// bitfield is shorter than `size`.
    pub fn count_set(&self, size: usize) -> Option<usize> {
        if size > self.len() {
            return None;
        }
        let full_bytes = size / 8;
        let mut count: usize = self.0[..full_bytes]
            .iter()
            .map(|byte| byte.count_ones() as usize)
            .sum();
        let remaining = size % 8;
        if remaining > 0 {
            // Keep only the `remaining` most significant bits of the partial byte.
            let mask = !(0xffu8 >> remaining);
            count += (self.0[full_bytes] & mask).count_ones() as usize;
        }
        Some(count)
    }

    /// Number of unset bits among the first `size` positions, or `None` if the
    /// bitfield is shorter than `size`.
    pub fn count_unset(&self, size: usize) -> Option<usize> {
        self.count_set(size).map(|set| size - set)
    }
}

/// Attestation bit of the committee member at `position`.
///
/// `None` means undetermined: the hex was malformed or `position` is out of
/// range. Callers must not read it as "did not attest".
pub fn bit_at(hex_bits: &str, position: usize) -> Option<bool> {
    AggregationBits::from_hex(hex_bits)?.get(position)
}

/// Missed attestations in a committee of `committee_size`: the unset bits
/// among its first `committee_size` positions.
///
/// Malformed hex, or a committee larger than the bitfield, counts as zero.
pub fn count_unset_bits(hex_bits: &str, committee_size: usize) -> usize {
    count_with(hex_bits, committee_size, AggregationBits::count_unset)
}

/// Included attestations in a committee of `committee_size`.
///
/// Malformed hex, or a committee larger than the bitfield, counts as zero.
pub fn count_set_bits(hex_bits: &str, committee_size: usize) -> usize {
    count_with(hex_bits, committee_size, AggregationBits::count_set)
}

fn count_with(
    hex_bits: &str,
    committee_size: usize,
    count: impl Fn(&AggregationBits, usize) -> Option<usize>,
) -> usize {
    let Some(bits) = AggregationBits::from_hex(hex_bits) else {
        warn!(%hex_bits, "Malformed aggregation bitfield");
        return 0;
    };
    count(&bits, committee_size).unwrap_or_else(|| {
        warn!(
            committee_size,
            bitfield_len = bits.len(),
            "Committee larger than its aggregation bitfield"
        );
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_most_significant_first() {
        // 0xa0 = 1010_0000
        assert_eq!(bit_at("0xa0", 0), Some(true));
        assert_eq!(bit_at("0xa0", 1), Some(false));
        assert_eq!(bit_at("0xa0", 2), Some(true));
        assert_eq!(bit_at("0xa0", 7), Some(false));
        // Second byte: 0x01 = 0000_0001
        assert_eq!(bit_at("0x0001", 15), Some(true));
        assert_eq!(bit_at("0x0001", 8), Some(false));
    }

    #[test]
    fn out_of_range_and_malformed_are_undetermined() {
        assert_eq!(bit_at("0xff", 8), None);
        assert_eq!(bit_at("0x", 0), None);
        assert_eq!(bit_at("0xzz", 0), None);
        assert_eq!(bit_at("0xf", 0), None);
        assert_eq!(bit_at("ff", 0), None);
        assert_eq!(bit_at("", 0), None);
    }

    #[test]
    fn counts_only_the_committee_prefix() {
        // 0xf0 = 1111_0000: a committee of 4 fully attested.
        assert_eq!(count_unset_bits("0xf0", 4), 0);
        assert_eq!(count_set_bits("0xf0", 4), 4);
        // Trailing bits past the committee size are ignored.
        assert_eq!(count_unset_bits("0xf0", 6), 2);
        assert_eq!(count_unset_bits("0xa0", 4), 2);
        assert_eq!(count_unset_bits("0xff00", 12), 4);
        assert_eq!(count_set_bits("0xff80", 9), 9);
    }

    #[test]
    fn oversized_committee_fails_closed() {
        assert_eq!(count_unset_bits("0x00", 9), 0);
        assert_eq!(count_set_bits("0xff", 64), 0);
        assert_eq!(count_unset_bits("0x", 1), 0);
    }

    #[test]
    fn malformed_hex_counts_as_zero() {
        assert_eq!(count_unset_bits("0xnothex", 4), 0);
        assert_eq!(count_unset_bits("f0", 4), 0);
    }

    #[test]
    fn zero_sized_committee_has_no_bits() {
        assert_eq!(count_unset_bits("0x00", 0), 0);
        assert_eq!(count_set_bits("0x", 0), 0);
    }

    #[test]
    fn counts_agree_with_bit_reads() {
        let samples = ["0x00", "0xff", "0xa5", "0x5a3c", "0x0180ff7e", "0xdeadbeef"];
        for hex_bits in samples {
            let len = AggregationBits::from_hex(hex_bits).unwrap().len();
            for size in 0..=len {
                let unset = (0..size)
                    .filter(|&p| bit_at(hex_bits, p) == Some(false))
                    .count();
                let set = (0..size)
                    .filter(|&p| bit_at(hex_bits, p) == Some(true))
                    .count();
                assert_eq!(count_unset_bits(hex_bits, size), unset, "{hex_bits} {size}");
                assert_eq!(count_set_bits(hex_bits, size), set, "{hex_bits} {size}");
                assert_eq!(unset + set, size);
            }
        }
    }
}
