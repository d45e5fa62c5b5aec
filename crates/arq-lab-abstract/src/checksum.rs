//! Additive packet checksum shared by both sides of every protocol variant.
//!
//! Deliberately weak: it only has to flag the single-field corruption the
//! simulated channel injects, not resist an adversary.

/// Sum of `seqnum`, `acknum` and every payload byte, with wraparound.
pub fn compute(seqnum: i32, acknum: i32, payload: &[u8]) -> i32 {
    let mut sum = seqnum.wrapping_add(acknum);
    for &byte in payload {
        sum = sum.wrapping_add(byte as i32);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_header_and_payload() {
        assert_eq!(compute(2, 3, &[1, 2, 3]), 11);
    }

    #[test]
    fn wraps_instead_of_overflowing() {
        // Must not panic in debug builds.
        let _ = compute(i32::MAX, 1, &[0xff; 20]);
    }

    #[test]
    fn sensitive_to_each_field() {
        let base = compute(1, 2, &[9; 4]);
        assert_ne!(base, compute(2, 2, &[9; 4]));
        assert_ne!(base, compute(1, 3, &[9; 4]));
        assert_ne!(base, compute(1, 2, &[8, 9, 9, 9]));
    }
}
