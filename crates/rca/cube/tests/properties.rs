//! Property tests: ordering, floating-point correction and additivity.

use proptest::prelude::*;
use rca_cube::{correct_floating_point, CostFunction, Cube, Summarizer, SummaryConfig};
use rca_types::{AggregateRow, DimensionValues, Dimensions};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const COUNTRIES: [&str; 4] = ["US", "IN", "DE", "FR"];
const PAGES: [&str; 3] = ["home", "search", "checkout"];

fn arb_values() -> impl Strategy<Value = DimensionValues> {
    prop::collection::vec("[a-c]{1,2}", 0..4).prop_map(DimensionValues::from)
}

/// Baseline/current pairs for every (country, page) leaf.
fn arb_leaves() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0u32..500, 0u32..500), COUNTRIES.len() * PAGES.len())
        .prop_map(|pairs| pairs.into_iter().map(|(b, c)| (b as f64, c as f64)).collect())
}

/// Leaf rows plus the root total; intermediate levels are left to synthesis.
fn leaf_rows(leaves: &[(f64, f64)]) -> Vec<AggregateRow> {
    let mut rows = Vec::new();
    let (mut baseline, mut current) = (0.0, 0.0);
    for (i, (b, c)) in leaves.iter().enumerate() {
        let country = COUNTRIES[i / PAGES.len()];
        let page = PAGES[i % PAGES.len()];
        rows.push(AggregateRow::new(
            DimensionValues::new([country, page]),
            *b,
            *c,
        ));
        baseline += b;
        current += c;
    }
    rows.push(AggregateRow::root(baseline, current));
    rows
}

fn dims() -> Dimensions {
    Dimensions::new(["country", "page"]).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * (1.0 + a.abs().max(b.abs()))
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A longer combination always orders before a shorter one.
    #[test]
    fn longer_values_order_first(a in arb_values(), b in arb_values()) {
        if a.len() > b.len() {
            prop_assert!(a < b);
        }
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    /// Correcting twice is the same as correcting once.
    #[test]
    fn correction_is_idempotent(x in -2.0f64..2.0) {
        let once = correct_floating_point(x);
        prop_assert_eq!(correct_floating_point(once), once);
        if x.abs() < 1e-6 {
            prop_assert_eq!(once, 0.0);
        }
        if (x - 1.0).abs() < 1e-6 {
            prop_assert_eq!(once, 1.0);
        }
    }

    /// Values within the tolerance of the targets always snap.
    #[test]
    fn correction_snaps_near_targets(delta in -9.9e-7f64..9.9e-7) {
        prop_assert_eq!(correct_floating_point(delta), 0.0);
        prop_assert_eq!(correct_floating_point(1.0 + delta), 1.0);
    }

    /// Every node equals the sum of its children after a sparse build.
    #[test]
    fn cube_is_additive(leaves in arb_leaves()) {
        let rows = leaf_rows(&leaves);
        let cube = Cube::build(dims(), rows, 2).unwrap();

        prop_assert!(cube.verify_additivity().is_empty());
        for node in cube.nodes() {
            if !node.is_root() {
                prop_assert!(node.baseline_value() > 0.0 || node.current_value() > 0.0);
            }
        }
    }

    /// Summary rows add back up to the totals for any top-k.
    #[test]
    fn summary_is_additive(leaves in arb_leaves(), top_k in 1usize..6, one_side in any::<bool>()) {
        let rows = leaf_rows(&leaves);
        let cube = Cube::build(dims(), rows, 2).unwrap().score(CostFunction::default());
        let config = SummaryConfig::new(top_k).unwrap().with_one_side_error(one_side);
        let report = Summarizer::new(config).summarize(&cube).unwrap();

        let (baseline, current) = report.row_totals();
        prop_assert!(close(baseline, cube.baseline_total()));
        prop_assert!(close(current, cube.current_total()));
        prop_assert!(report.rows.iter().all(|row| row.labels.len() == 2));
        prop_assert!(report
            .rows
            .iter()
            .all(|row| row.baseline_value >= 0.0 && row.current_value >= 0.0));
    }
}
