use hb_core::{Column, GroupKey, Symbols};
use hb_hist::{AxisSpec, Hist, HistConfig};
use proptest::prelude::*;

fn template() -> Hist {
    let config = HistConfig::new()
        .axis(AxisSpec::groupby("c"))
        .axis(AxisSpec::bin("x", 5, 0.0, 10.0))
        .axis(AxisSpec::profile("y"))
        .weight("w");
    Hist::new(config).unwrap()
}

#[derive(Debug, Clone)]
struct Events {
    c: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    w: Vec<f64>,
}

impl Events {
    fn symbols(&self) -> Symbols {
        let mut s = Symbols::new();
        s.insert("c".into(), Column::from(self.c.clone()));
        s.insert("x".into(), Column::from(self.x.clone()));
        s.insert("y".into(), Column::from(self.y.clone()));
        s.insert("w".into(), Column::from(self.w.clone()));
        s
    }

    fn concat(&self, other: &Events) -> Events {
        let join = |a: &[f64], b: &[f64]| a.iter().chain(b).copied().collect();
        Events {
            c: join(&self.c, &other.c),
            x: join(&self.x, &other.x),
            y: join(&self.y, &other.y),
            w: join(&self.w, &other.w),
        }
    }
}

fn events(max: usize) -> impl Strategy<Value = Events> {
    (0..max).prop_flat_map(|n| {
        (
            proptest::collection::vec((0u8..3).prop_map(f64::from), n),
            proptest::collection::vec(prop_oneof![9 => -2.0f64..12.0, 1 => Just(f64::NAN)], n),
            proptest::collection::vec(-5.0f64..5.0, n),
            proptest::collection::vec(0.0f64..4.0, n),
        )
            .prop_map(|(c, x, y, w)| Events { c, x, y, w })
    })
}

fn filled(e: &Events) -> Hist {
    let mut h = template();
    h.fill(&e.symbols()).unwrap();
    h
}

fn flatten(h: &Hist) -> Vec<(Vec<GroupKey>, Vec<f64>)> {
    h.content()
        .map(|c| c.leaves().into_iter().map(|(k, a)| (k, a.iter().copied().collect())).collect())
        .unwrap_or_default()
}

fn assert_close(a: &Hist, b: &Hist) -> Result<(), TestCaseError> {
    let (fa, fb) = (flatten(a), flatten(b));
    prop_assert_eq!(fa.len(), fb.len());
    for ((ka, va), (kb, vb)) in fa.iter().zip(&fb) {
        prop_assert_eq!(ka, kb);
        for (x, y) in va.iter().zip(vb) {
            prop_assert!((x - y).abs() <= 1e-9 * (1.0 + x.abs().max(y.abs())), "{} vs {}", x, y);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_fill_is_linear_in_batches(a in events(20), b in events(20)) {
        let mut split = template();
        split.fill(&a.symbols()).unwrap();
        split.fill(&b.symbols()).unwrap();
        let joined = filled(&a.concat(&b));
        assert_close(&split, &joined)?;
    }

    #[test]
    fn prop_add_matches_joint_fill(a in events(20), b in events(20)) {
        let sum = (&filled(&a) + &filled(&b)).unwrap();
        assert_close(&sum, &filled(&a.concat(&b)))?;
    }

    #[test]
    fn prop_add_is_associative(a in events(15), b in events(15), c in events(15)) {
        let (ha, hb, hc) = (filled(&a), filled(&b), filled(&c));
        let left = (&(&ha + &hb).unwrap() + &hc).unwrap();
        let right = (&ha + &(&hb + &hc).unwrap()).unwrap();
        assert_close(&left, &right)?;
    }

    #[test]
    fn prop_scale_distributes_over_add(a in events(15), b in events(15), f in -3.0f64..3.0) {
        let (ha, hb) = (filled(&a), filled(&b));
        let left = &(&ha + &hb).unwrap() * f;
        let right = (&(&ha * f) + &(&hb * f)).unwrap();
        assert_close(&left, &right)?;
    }

    #[test]
    fn prop_scaled_copies_add_to_summed_factor(a in events(20)) {
        let h = filled(&a);
        let sum = (&(&h * 2.0) + &(&h * 3.0)).unwrap();
        assert_close(&sum, &(&h * 5.0))?;
    }

    #[test]
    fn prop_empty_is_identity(a in events(20)) {
        let h = filled(&a);
        let empty = h.cleared();
        assert_close(&(&h + &empty).unwrap(), &h)?;
        assert_close(&(&empty + &h).unwrap(), &h)?;
        let mut merged = h.copy();
        merged.merge(&empty).unwrap();
        assert_close(&merged, &h)?;
    }

    #[test]
    fn prop_every_leaf_has_the_histogram_shape(a in events(30)) {
        let h = filled(&a);
        for (_, leaf) in h.content().unwrap().leaves() {
            prop_assert_eq!(leaf.shape(), h.shape());
        }
    }

    #[test]
    fn prop_total_weight_is_conserved(a in events(30)) {
        // every flow slot is on and every key is valid, so nothing is dropped
        let h = filled(&a);
        let sumw = h.sumw_index();
        let total: f64 = flatten(&h)
            .iter()
            .flat_map(|(_, v)| v.iter().skip(sumw).step_by(h.shape()[1]).copied().collect::<Vec<_>>())
            .sum();
        let expected: f64 = a.w.iter().sum();
        prop_assert!((total - expected).abs() <= 1e-9 * (1.0 + expected));
        let keys = h.content().unwrap().children().unwrap().len();
        let mut distinct = a.c.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        prop_assert_eq!(keys, distinct.len());
    }
}
