//! Delta policy: decides whether an order's coordinates may travel as
//! one-byte signed differences from the values the client already holds.
//!
//! The verdict is all-or-nothing per order. It is computed once, from
//! every coordinate pair of the kind's schema, before any field is
//! written; unchanged fields are omitted either way.

/// Differences must stay strictly below this magnitude.
pub const DELTA_LIMIT: u32 = 128;

/// Whether `new` can be sent as a one-byte difference from `previous`.
pub fn fits_delta(new: i32, previous: i32) -> bool {
    new.abs_diff(previous) < DELTA_LIMIT
}

/// `true` iff every `(new, previous)` pair fits in a signed byte.
pub fn prefers_delta(pairs: &[(i32, i32)]) -> bool {
    pairs.iter().all(|&(new, previous)| fits_delta(new, previous))
}

/// Wire byte for a delta: `(new - previous) mod 256`.
pub fn delta_byte(new: i32, previous: i32) -> u8 {
    new.wrapping_sub(previous) as u8
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_exclusive() {
        assert!(fits_delta(127, 0));
        assert!(!fits_delta(128, 0));
        assert!(fits_delta(-127, 0));
        assert!(!fits_delta(-128, 0));
    }

    #[test]
    fn one_far_pair_disables_delta() {
        assert!(prefers_delta(&[(10, 0), (20, 5), (0, 0)]));
        assert!(!prefers_delta(&[(10, 0), (500, 5), (0, 0)]));
    }

    #[test]
    fn empty_set_prefers_delta() {
        assert!(prefers_delta(&[]));
    }

    #[test]
    fn delta_byte_is_twos_complement() {
        assert_eq!(delta_byte(5, 10), 0xfb);
        assert_eq!(delta_byte(10, 5), 5);
        assert_eq!(delta_byte(5, 10) as i8, -5);
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert!(!fits_delta(i32::MAX, i32::MIN));
        assert!(fits_delta(i32::MIN, i32::MIN + 1));
    }
}
