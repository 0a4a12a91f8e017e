//! Property-based tests for dilated arithmetic and the membership ledger.

use cellsim::cells::morton::MAX_AXIS_VALUE;
use cellsim::cells::{DilatedInteger, MembershipLedger, MortonNumber};
use proptest::prelude::*;

proptest! {
    /// Dilation is lossless for every representable coordinate.
    #[test]
    fn prop_dilate_round_trip(v in 0u32..=MAX_AXIS_VALUE) {
        prop_assert_eq!(DilatedInteger::new(v).value(), v);
    }

    /// Dilated addition and subtraction agree with plain arithmetic.
    #[test]
    fn prop_add_sub_match_plain(a in 0u32..1_000_000, b in 0u32..1_000_000) {
        let (da, db) = (DilatedInteger::new(a), DilatedInteger::new(b));
        prop_assert_eq!(da.add(db).value(), a + b);
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        prop_assert_eq!(DilatedInteger::new(hi).sub(DilatedInteger::new(lo)).value(), hi - lo);
    }

    /// Wrapped stepping is arithmetic modulo the axis length.
    #[test]
    fn prop_wrapped_steps_are_modular(count in 3u32..200, start in 0u32..200, step in 0u32..3) {
        let start = start % count;
        let step = step.min(count - 1);
        let max = DilatedInteger::new(count - 1);
        let d = DilatedInteger::new(start);
        let s = DilatedInteger::new(step);

        prop_assert_eq!(d.add_wrapped(s, max).value(), (start + step) % count);
        prop_assert_eq!(d.sub_wrapped(s, max).value(), (start + count - step) % count);
        prop_assert_eq!(d.inc_wrapped(max).value(), (start + 1) % count);
        prop_assert_eq!(d.dec_wrapped(max).value(), (start + count - 1) % count);
    }

    /// Morton codes decode to the coordinates they were built from.
    #[test]
    fn prop_morton_round_trip(x in 0u32..=MAX_AXIS_VALUE, y in 0u32..=MAX_AXIS_VALUE, z in 0u32..=MAX_AXIS_VALUE) {
        let m = MortonNumber::new(x, y, z);
        prop_assert_eq!(MortonNumber::from_morton(m.morton()).coords(), [x, y, z]);
    }

    /// After any sequence of moves, every particle sits in exactly one list,
    /// and that list is the one the ledger reports.
    #[test]
    fn prop_ledger_stays_consistent(
        moves in prop::collection::vec((0usize..20, 0usize..8), 1..200)
    ) {
        let (cells, particles) = (8, 20);
        let mut ledger = MembershipLedger::new(cells, particles);
        let mut expected = vec![None; particles];
        for (p, c) in moves {
            if expected[p].is_some() {
                prop_assert_eq!(ledger.remove(p), expected[p]);
            }
            ledger.insert(p, c);
            expected[p] = Some(c);
        }

        let mut seen = vec![0usize; particles];
        for c in 0..cells {
            for p in ledger.iter_cell(c) {
                seen[p] += 1;
                prop_assert_eq!(expected[p], Some(c));
            }
            prop_assert_eq!(ledger.is_cell_empty(c), !expected.contains(&Some(c)));
        }
        for p in 0..particles {
            prop_assert_eq!(seen[p], usize::from(expected[p].is_some()));
            prop_assert_eq!(ledger.cell_of(p), expected[p]);
        }
    }
}
