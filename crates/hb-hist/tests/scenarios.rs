use approx::assert_relative_eq;
use hb_core::{Column, Error, GroupKey, Symbols};
use hb_hist::{AxisSpec, Hist};
use ndarray::IxDyn;

fn symbols(cols: Vec<(&str, Column)>) -> Symbols {
    cols.into_iter().map(|(n, c)| (n.to_string(), c)).collect()
}

#[test]
fn json_config_fill_and_restore() {
    let json = r#"{
        "axes": [
            {"type": "bin", "expr": "pt", "numbins": 4, "low": 0, "high": 200, "nanflow": false},
            {"type": "groupby", "expr": "region"},
            {"type": "cut", "expr": "abs(eta) < 2.5 and pt > 20"}
        ],
        "weight": "w_mc * w_sf",
        "defs": {"pt": "sqrt(px**2 + py**2)"}
    }"#;
    let mut h = Hist::from_json(json).unwrap();
    assert_eq!(h.shape(), &[6, 2, 2]);

    let events = symbols(vec![
        ("px", Column::from(vec![30.0, 3.0, 120.0, 0.0])),
        ("py", Column::from(vec![40.0, 4.0, 160.0, 0.0])),
        ("eta", Column::from(vec![0.5, 1.0, 3.0, 0.0])),
        ("region", Column::from(vec!["sr", "cr", "sr", "cr"])),
        ("w_mc", Column::from(vec![1.0, 1.0, 2.0, 1.0])),
        ("w_sf", Column::from(vec![0.5, 1.0, 1.0, 2.0])),
    ]);
    h.fill(&events).unwrap();

    // pt = 50 -> bin 1 (+1 underflow) passing the cut; weight 0.5
    let sr = h.content_at(&["sr".into()]).unwrap().leaf().unwrap();
    assert_relative_eq!(sr[IxDyn(&[2, 1, 0])], 0.5);
    assert_relative_eq!(sr[IxDyn(&[2, 1, 1])], 0.25);
    // pt = 200 is the high edge: overflow, failing |eta| < 2.5
    assert_relative_eq!(sr[IxDyn(&[5, 0, 0])], 2.0);

    let back = Hist::from_state_json(&h.to_json().unwrap()).unwrap();
    assert_eq!(back.content(), h.content());
    assert_eq!(back.defs(), h.defs());
}

#[test]
fn unknown_options_and_symbols() {
    assert!(matches!(Hist::from_json(r#"{"axes": [], "bogus": 1}"#), Err(Error::Config(_))));
    let mut h = Hist::from_axes([AxisSpec::bin("x + y", 2, 0.0, 1.0)]).unwrap();
    let only_x = symbols(vec![("x", Column::from(vec![0.1]))]);
    assert!(matches!(h.fill(&only_x), Err(Error::UnknownSymbol(ref s)) if s == "y"));
    assert!(h.content().is_none());
}

#[test]
fn nan_group_values_are_dropped() {
    let mut h = Hist::from_axes([AxisSpec::groupbin("x", 1.0), AxisSpec::cut("x > 0")]).unwrap();
    h.fill(&symbols(vec![("x", Column::from(vec![0.5, f64::NAN, 2.5, 2.25, -0.5]))])).unwrap();
    let keys: Vec<GroupKey> = h.content().unwrap().children().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec![GroupKey::real(-1.0), GroupKey::real(0.0), GroupKey::real(2.0)]);
    let total: f64 = h.content().unwrap().leaves().iter().map(|(_, a)| a.sum()).sum();
    assert_relative_eq!(total, 4.0);
    // [false, true] per key
    let below = h.content_at(&[GroupKey::real(-1.0)]).unwrap().leaf().unwrap();
    assert_eq!(below.iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0]);
}

#[test]
fn intbin_ranges_beyond_exact_integers_are_rejected() {
    for spec in [AxisSpec::intbin("n", i64::MIN, 0), AxisSpec::intbin("n", 0, i64::MAX)] {
        assert!(matches!(Hist::from_axes([spec]), Err(Error::Config(_))));
    }
    let json = r#"{"axes": [{"type": "intbin", "expr": "n", "min": -9223372036854775808, "max": 0}]}"#;
    assert!(matches!(Hist::from_json(json), Err(Error::Config(_))));
}

#[test]
fn split_and_intbin_layouts() {
    let mut h = Hist::from_axes([
        AxisSpec::split("x", vec![0.0, 1.0, 10.0]).closedlow(false),
        AxisSpec::intbin("n", 1, 3).underflow(false),
    ])
    .unwrap();
    // split: [under, (0,1], (1,10], over, nan]; intbin: [1, 2, 3, over]
    assert_eq!(h.shape(), &[5, 4, 1]);
    let events = symbols(vec![
        ("x", Column::from(vec![1.0, 0.0, 10.5, f64::NAN, 5.0])),
        ("n", Column::from(vec![1.0, 2.0, 3.0, 9.0, 0.0])),
    ]);
    h.fill(&events).unwrap();
    let leaf = h.content().unwrap().leaf().unwrap();
    assert_relative_eq!(leaf[IxDyn(&[1, 0, 0])], 1.0);
    assert_relative_eq!(leaf[IxDyn(&[0, 1, 0])], 1.0);
    assert_relative_eq!(leaf[IxDyn(&[3, 2, 0])], 1.0);
    assert_relative_eq!(leaf[IxDyn(&[4, 3, 0])], 1.0);
    // n = 0 underflows with no underflow slot: dropped
    assert_relative_eq!(leaf.sum(), 4.0);
}

#[test]
fn grouped_samples_add_like_their_members() {
    let mut sig = Hist::from_axes([AxisSpec::bin("x", 2, 0.0, 2.0)]).unwrap();
    let mut bkg = sig.cleared();
    sig.fill_single(vec![0.5, 1.5]).unwrap();
    bkg.fill_single(vec![1.5, 1.5, 3.0]).unwrap();

    let g1 = Hist::group("sample", [("sig", &sig), ("bkg", &bkg)]).unwrap();
    let g2 = Hist::group("sample", [("bkg", &bkg)]).unwrap();
    let sum = (&g1 + &g2).unwrap();
    let twice_bkg = (&bkg * 2.0).content().cloned();
    assert_eq!(sum.content_at(&["bkg".into()]).cloned(), twice_bkg);
    assert_eq!(sum.content_at(&["sig".into()]), sig.content());
}
