use std::collections::{HashMap, VecDeque};

use egraph_dataflow::*;

type G = EGraph<Symbol, NonNullLattice>;
type Frozen = FrozenEGraph<Symbol, NonNullLattice>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn s(name: &str) -> Symbol {
    Symbol::from(name)
}

fn b(n: usize) -> BlockId {
    BlockId::from(n)
}

/// Renders everything reachable from the constant root with symbolic
/// values renamed in visit order, so isomorphic graphs render the same.
fn canonical<L: Lattice>(g: &Snapshot<Symbol, L>) -> Vec<String> {
    let root = g.const_root();
    let mut names: HashMap<SymValue, usize> = HashMap::new();
    let mut queue = VecDeque::new();
    let mut lines = vec![];
    names.insert(root, 0);
    queue.push_back(root);
    while let Some(v) = queue.pop_front() {
        let n = names[&v];
        let value = g.value(v);
        if !g.lattice().is_top(&value) {
            lines.push(format!("n{} : {:?}", n, value));
        }
        for (function, to) in g.edges(v) {
            let next = names.len();
            let m = *names.entry(to).or_insert_with(|| {
                queue.push_back(to);
                next
            });
            lines.push(format!("n{} -{}-> n{}", n, function, m));
        }
    }
    lines
}

#[test]
fn merge_loses_nonnull() {
    init_logger();
    let mut g = G::new(NonNullLattice);
    let x = g.constant(s("x"));
    let g = g.freeze();

    let mut g1 = g.branch(b(1));
    g1.set_value(x, Nullness::NonNull);
    let mut g2 = g.branch(b(2));
    g2.set_value(x, Nullness::MaybeNull);

    let (joined, changed) = g1.freeze().join_changed(&g2.freeze(), b(3));
    assert!(changed);
    let rx = joined.try_lookup(&s("x"), &[]).unwrap();
    assert_eq!(joined.value(rx), Nullness::MaybeNull);
    assert_eq!(joined.block(), Some(b(3)));
}

#[test]
fn join_with_own_clone_is_identity() {
    init_logger();
    let mut g = G::new(NonNullLattice);
    let x = g.constant(s("x"));
    let y = g.constant(s("y"));
    let fx = g.apply(s("f"), x);
    g.set_value(fx, Nullness::NonNull);
    g.assume_equal(x, y);

    // a short history joins in full
    let g = g.freeze();
    let (joined, info) = g.join(&g.branch(b(1)).freeze(), b(1));
    assert_eq!(info.strategy(), JoinStrategy::Full);
    assert!(!info.changed());
    assert_eq!(canonical(&joined), canonical(&g));

    // a long one replays
    let mut long = g.branch(b(2));
    for i in 3..8 {
        long = long.branch(b(i)).1;
    }
    let g = long.freeze();
    let (joined, info) = g.join(&g.branch(b(9)).freeze(), b(9));
    assert_eq!(info.strategy(), JoinStrategy::Replay);
    assert!(!info.changed());
    assert_eq!(canonical(&joined), canonical(&g));
}

/// Builds a lineage with `prefix` snapshots and two branches of two
/// snapshots each on top.
fn diverging(config: Config, prefix: usize) -> (Frozen, Frozen) {
    let (next, val, tmp) = (s("next"), s("val"), s("tmp"));
    let mut g = G::with_config(NonNullLattice, config);
    let vars: Vec<SymValue> = (0..10).map(|i| g.constant(s(&format!("v{}", i)))).collect();
    g.set_value(vars[0], Nullness::NonNull);
    g.set_value(vars[8], Nullness::NonNull);
    let mut frozen = g.freeze();
    for i in 1..prefix {
        let mut g = frozen.branch(b(i));
        let v = g.constant(s(&format!("v{}", i % 10)));
        let n = g.apply(next, v);
        if i % 3 == 0 {
            g.set_value(n, Nullness::NonNull);
        }
        if i % 7 == 0 {
            let t = g.fresh_symbol();
            g.set(tmp, &[], t);
        }
        frozen = g.freeze();
    }
    let common = frozen;

    let mut g1 = common.branch(b(1000));
    let x1 = g1.fresh_symbol();
    g1.set(s("x"), &[], x1);
    g1.set_value(x1, Nullness::NonNull);
    g1.assume_equal(vars[1], vars[2]);
    g1.eliminate(&s("v3"), &[]);
    let (_, mut g1) = g1.branch(b(1001));
    g1.set_value(vars[5], Nullness::NonNull);
    let v6 = g1.apply(val, vars[6]);
    g1.set_value(v6, Nullness::NonNull);
    g1.eliminate_all(vars[7]);

    let mut g2 = common.branch(b(2000));
    let x2 = g2.fresh_symbol();
    g2.set(s("x"), &[], x2);
    g2.eliminate(&s("v3"), &[]);
    g2.set_value(vars[8], Nullness::MaybeNull);
    let (_, mut g2) = g2.branch(b(2001));
    g2.set_value(vars[5], Nullness::NonNull);
    g2.assume_equal(vars[1], vars[2]);
    g2.assume_equal(vars[4], vars[9]);
    let v6 = g2.apply(val, vars[6]);
    g2.set_value(v6, Nullness::NonNull);

    (g1.freeze(), g2.freeze())
}

fn force_full() -> Config {
    Config::default()
        .with_short_history(usize::MAX)
        .with_long_history(usize::MAX)
}

#[test]
fn long_lineages_replay() {
    init_logger();
    let (g1, g2) = diverging(Config::default().with_statistics(true), 101);
    assert!(g1.history_size() > 100 && g2.history_size() > 100);
    let (replayed, info) = g1.join(&g2, b(3000));
    assert_eq!(info.strategy(), JoinStrategy::Replay);
    assert_eq!(info.update_size(), 4);
    assert!(info.changed());

    let (f1, f2) = diverging(force_full(), 101);
    let (full, full_info) = f1.join(&f2, b(3000));
    assert_eq!(full_info.strategy(), JoinStrategy::Full);
    assert!(full_info.changed());
    assert_eq!(canonical(&replayed), canonical(&full));

    let lookup = |g: &Snapshot<Symbol, NonNullLattice>, name: &str| {
        g.try_lookup(&s(name), &[]).unwrap()
    };
    for g in [&*replayed, &*full] {
        assert_eq!(g.value(lookup(g, "x")), Nullness::MaybeNull);
        assert_eq!(g.value(lookup(g, "v5")), Nullness::NonNull);
        assert_eq!(g.value(lookup(g, "v8")), Nullness::MaybeNull);
        assert!(g.is_equal(lookup(g, "v1"), lookup(g, "v2")));
        assert!(!g.is_equal(lookup(g, "v4"), lookup(g, "v9")));
        assert_eq!(g.try_lookup(&s("v3"), &[]), None);
        let v6 = g.try_lookup(&s("val"), &[lookup(g, "v6")]).unwrap();
        assert_eq!(g.value(v6), Nullness::NonNull);
        assert_eq!(g.functions(lookup(g, "v7")).count(), 0);
    }
}

#[test]
fn replay_and_full_agree() {
    init_logger();
    for prefix in [5, 12, 40] {
        let (g1, g2) = diverging(Config::default(), prefix);
        let (f1, f2) = diverging(force_full(), prefix);
        for (a, b_, fa, fb) in [(&g1, &g2, &f1, &f2), (&g2, &g1, &f2, &f1)] {
            let (replayed, info) = a.join(b_, b(3000));
            assert_eq!(info.strategy(), JoinStrategy::Replay);
            let (full, full_info) = fa.join(fb, b(3000));
            assert_eq!(full_info.strategy(), JoinStrategy::Full);
            assert_eq!(canonical(&replayed), canonical(&full), "prefix {}", prefix);
        }
    }
}

/// `a` and `b` are distinct constants with `h(b)` non-null in the common
/// ancestor. The first branch merges them and then rewrites the merged
/// class through `a`; the second branch leaves them alone.
fn one_sided_merge(
    config: Config,
    rewrite: impl Fn(&mut G, SymValue),
) -> (Frozen, Frozen) {
    let mut g = G::with_config(NonNullLattice, config);
    let va = g.constant(s("a"));
    let vb = g.constant(s("b"));
    g.set_value(vb, Nullness::NonNull);
    let hb = g.apply(s("h"), vb);
    g.set_value(hb, Nullness::NonNull);
    let mut frozen = g.freeze();
    for i in 1..5 {
        let mut g = frozen.branch(b(i));
        g.constant(s(&format!("w{}", i)));
        frozen = g.freeze();
    }
    let mut merged = frozen.branch(b(10));
    merged.assume_equal(va, vb);
    rewrite(&mut merged, va);
    let plain = frozen.branch(b(20));
    (merged.freeze(), plain.freeze())
}

#[test]
fn one_sided_merges_rejoin_the_class() {
    init_logger();
    let redirect = |g: &mut G, a: SymValue| {
        let fresh = g.fresh_symbol();
        g.set(s("h"), &[a], fresh);
    };
    let weaken = |g: &mut G, a: SymValue| g.set_value(a, Nullness::MaybeNull);

    let rewrites: [(&str, &dyn Fn(&mut G, SymValue)); 2] =
        [("redirect", &redirect), ("weaken", &weaken)];
    for (name, rewrite) in rewrites {
        let (g1, g2) = one_sided_merge(Config::default(), rewrite);
        let (f1, f2) = one_sided_merge(force_full(), rewrite);
        assert!(g1.history_size() > 3 && g2.history_size() > 3);
        for (x, y, fx, fy) in [(&g1, &g2, &f1, &f2), (&g2, &g1, &f2, &f1)] {
            let (replayed, info) = x.join(y, b(3000));
            assert_eq!(info.strategy(), JoinStrategy::Replay, "{}", name);
            let (full, full_info) = fx.join(fy, b(3000));
            assert_eq!(full_info.strategy(), JoinStrategy::Full, "{}", name);
            assert_eq!(canonical(&replayed), canonical(&full), "{}", name);

            let rb = replayed.try_lookup(&s("b"), &[]).unwrap();
            let ra = replayed.try_lookup(&s("a"), &[]).unwrap();
            assert!(!replayed.is_equal(ra, rb), "{}", name);
            let hb = replayed.try_lookup(&s("h"), &[rb]).unwrap();
            match name {
                "redirect" => {
                    // h(b) is fresh, hence unconstrained, on the merging side
                    assert_eq!(replayed.value(hb), Nullness::MaybeNull);
                    assert_eq!(replayed.value(rb), Nullness::NonNull);
                }
                _ => {
                    assert_eq!(replayed.value(hb), Nullness::NonNull);
                    assert_eq!(replayed.value(rb), Nullness::MaybeNull);
                }
            }
        }
        // the merging side loses its equality
        assert!(g1.join(&g2, b(3000)).1.changed(), "{}", name);
    }
}

#[test]
fn join_commutes() {
    init_logger();
    for config in [Config::default(), force_full()] {
        let (g1, g2) = diverging(config, 20);
        let (j12, _) = g1.join(&g2, b(3000));
        let (j21, _) = g2.join(&g1, b(3000));
        assert_eq!(canonical(&j12), canonical(&j21));
    }

    // unrelated roots
    let mut g1 = G::new(NonNullLattice);
    let x = g1.constant(s("x"));
    g1.set_value(x, Nullness::NonNull);
    g1.constant(s("y"));
    let mut g2 = G::new(NonNullLattice);
    g2.constant(s("y"));
    let x = g2.constant(s("x"));
    g2.set_value(x, Nullness::NonNull);
    let (g1, g2) = (g1.freeze(), g2.freeze());
    let (j12, _) = g1.join(&g2, b(1));
    let (j21, _) = g2.join(&g1, b(1));
    assert_eq!(canonical(&j12), canonical(&j21));
    assert_eq!(canonical(&j12).len(), 3);
}

#[test]
fn merge_info_maps_pairs() {
    init_logger();
    let mut g = G::new(NonNullLattice);
    let x = g.constant(s("x"));
    let g = g.freeze();
    let mut g1 = g.branch(b(1));
    let a = g1.fresh_symbol();
    g1.set(s("y"), &[], a);
    let mut g2 = g.branch(b(2));
    let c = g2.fresh_symbol();
    let d = g2.fresh_symbol();
    g2.set(s("y"), &[], d);

    let (joined, info) = g1.freeze().join(&g2.freeze(), b(3));
    assert!(info.is_common(x));
    assert!(!info.is_common(d));
    assert_eq!(info.get(x, x), Some(x));
    let ry = joined.try_lookup(&s("y"), &[]).unwrap();
    assert_eq!(info.get(a, d), Some(ry));
    assert_eq!(info.get(a, c), None);
    assert!(!info.is_common(ry));
    let mut keys: Vec<SymValue> = info.keys1().collect();
    keys.sort();
    assert_eq!(keys, vec![joined.const_root(), x, a]);
    assert_eq!(info.keys2(a).collect::<Vec<_>>(), vec![d]);
}

#[test]
fn joins_continue_the_lineage() {
    init_logger();
    let (g1, g2) = diverging(Config::default(), 10);
    let (joined, _) = g1.join(&g2, b(3000));
    let joined = joined.freeze();
    assert_eq!(joined.block_trace(1), vec![b(3000)]);

    // a loop body branching off the join result gets replayed against it
    let mut body = joined.branch(b(3001));
    let x = body.fresh_symbol();
    body.set(s("x"), &[], x);
    let (_, mut body) = body.branch(b(3002));
    body.set_value(x, Nullness::NonNull);
    let (_, info) = joined.join(&body.freeze(), b(3000));
    assert_eq!(info.strategy(), JoinStrategy::Replay);
    assert!(!info.changed());
}
