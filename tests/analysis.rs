//! Small non-null and exposure analyses run through the [`Analyzer`].

use egraph_dataflow::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn b(n: usize) -> BlockId {
    BlockId::from(n)
}

/// Statements of a toy language over locals, with the value of local `x`
/// stored as the constant `x`.
enum Stmt {
    /// `x = new T()`
    New(&'static str),
    /// `x = null` (or anything unknown)
    Havoc(&'static str),
    /// `x = y`
    Copy(&'static str, &'static str),
    /// `x = y.f`
    Load(&'static str, &'static str, &'static str),
    /// `x.f = y`
    Store(&'static str, &'static str, &'static str),
}

struct Program {
    cfg: Cfg,
    blocks: Vec<Vec<Stmt>>,
}

type G = EGraph<Symbol, NonNullLattice>;

fn nonnull_transfer(program: &Program) -> impl FnMut(BlockId, &mut G) + '_ {
    move |block: BlockId, g: &mut G| {
        for stmt in &program.blocks[usize::from(block)] {
            match *stmt {
                Stmt::New(x) => {
                    let v = g.fresh_symbol();
                    g.set(x.into(), &[], v);
                    g.set_value(v, Nullness::NonNull);
                }
                Stmt::Havoc(x) => {
                    let v = g.fresh_symbol();
                    g.set(x.into(), &[], v);
                }
                Stmt::Copy(x, y) => {
                    let v = g.constant(y.into());
                    g.set(x.into(), &[], v);
                }
                Stmt::Load(x, y, f) => {
                    let obj = g.constant(y.into());
                    // dereferencing proves the object non-null
                    g.set_value(obj, Nullness::NonNull);
                    let v = g.apply(f.into(), obj);
                    g.set(x.into(), &[], v);
                }
                Stmt::Store(x, f, y) => {
                    let obj = g.constant(x.into());
                    g.set_value(obj, Nullness::NonNull);
                    let v = g.constant(y.into());
                    g.set(f.into(), &[obj], v);
                }
            }
        }
    }
}

fn value_of<L: Lattice>(g: &Snapshot<Symbol, L>, local: &str) -> L::Element {
    match g.try_lookup(&local.into(), &[]) {
        Some(v) => g.value(v),
        None => g.lattice().top(),
    }
}

#[test]
fn loop_reaches_fixpoint() {
    init_logger();
    use Stmt::*;
    // 0 -> 1 -> 2 -> 3 <-> 4, 3 -> 5
    let cfg = Cfg::new(b(0))
        .with_edge(b(0), b(1))
        .with_edge(b(1), b(2))
        .with_edge(b(2), b(3))
        .with_edge(b(3), b(4))
        .with_edge(b(4), b(3))
        .with_edge(b(3), b(5));
    let program = Program {
        cfg,
        blocks: vec![
            vec![New("p")],
            vec![Havoc("q")],
            vec![New("node"), Store("node", "next", "p")],
            vec![],
            vec![Copy("q", "p"), New("p"), Store("p", "next", "q")],
            vec![],
        ],
    };

    let mut transfer = nonnull_transfer(&program);
    let initial = EGraph::new(NonNullLattice).freeze();
    let solution = Analyzer::new(Config::default().with_debug_dfa(true)).run(
        &program.cfg,
        initial,
        &mut transfer,
    );
    solution.print_report();

    assert_eq!(solution.stop_reason, StopReason::Converged);
    assert!(solution.joins.replay >= 1);

    let head = solution.entry_state(b(3)).unwrap();
    assert_eq!(value_of(head, "p"), Nullness::NonNull);
    assert_eq!(value_of(head, "q"), Nullness::MaybeNull);
    assert_eq!(value_of(head, "node"), Nullness::NonNull);

    let exit = solution.entry_state(b(5)).unwrap();
    assert_eq!(value_of(exit, "p"), Nullness::NonNull);
    // node.next == p only holds before the first iteration
    let node = exit.try_lookup(&"node".into(), &[]).unwrap();
    let p = exit.try_lookup(&"p".into(), &[]).unwrap();
    let next = exit.try_lookup(&"next".into(), &[node]).unwrap();
    assert_ne!(next, p);
    assert_eq!(exit.value(next), Nullness::NonNull);
}

#[test]
fn branches_merge_field_facts() {
    init_logger();
    use Stmt::*;
    // 0 -> {1, 2} -> 3
    let cfg = Cfg::new(b(0))
        .with_edge(b(0), b(1))
        .with_edge(b(0), b(2))
        .with_edge(b(1), b(3))
        .with_edge(b(2), b(3));
    let program = Program {
        cfg,
        blocks: vec![
            vec![New("o"), Havoc("a")],
            vec![New("x"), Store("o", "f", "x"), Copy("y", "x")],
            vec![New("x"), Store("o", "f", "x"), Copy("y", "a")],
            vec![Load("z", "o", "f")],
        ],
    };

    let mut transfer = nonnull_transfer(&program);
    let initial = EGraph::new(NonNullLattice).freeze();
    let solution = Analyzer::default().run(&program.cfg, initial, &mut transfer);
    assert_eq!(solution.stop_reason, StopReason::Converged);
    assert_eq!(solution.joins.full, 1);

    let merge = solution.entry_state(b(3)).unwrap();
    // o.f == x on both paths, so the field is non-null after the merge
    let o = merge.try_lookup(&"o".into(), &[]).unwrap();
    let x = merge.try_lookup(&"x".into(), &[]).unwrap();
    assert_eq!(merge.try_lookup(&"f".into(), &[o]), Some(x));
    assert_eq!(merge.value(x), Nullness::NonNull);
    // y == x only on one path
    assert_eq!(value_of(merge, "y"), Nullness::MaybeNull);
    assert_ne!(merge.try_lookup(&"y".into(), &[]), Some(x));

    let end = solution.exit_state(b(3)).unwrap();
    assert_eq!(value_of(end, "z"), Nullness::NonNull);
    assert_eq!(end.block_trace(3), vec![b(3), b(0)]);
}

#[test]
fn exposure_frames() {
    init_logger();
    let frame: Symbol = "FrameFor".into();
    let cfg = Cfg::new(b(0))
        .with_edge(b(0), b(1))
        .with_edge(b(0), b(2))
        .with_edge(b(1), b(3))
        .with_edge(b(2), b(3));
    let exposed = Flat::Value(Exposure::Frame {
        lower: "Derived".into(),
        upper: "Base".into(),
    });
    let mut transfer = |block: BlockId, g: &mut EGraph<Symbol, ExposureLattice>| {
        let this = g.constant("this".into());
        match usize::from(block) {
            0 => {
                let f = g.apply(frame, this);
                g.set_value(f, Flat::Value(Exposure::NotExposed));
            }
            1 | 2 => {
                let f = g.apply(frame, this);
                g.set_value(f, exposed.clone());
            }
            _ => {}
        }
    };
    let initial = EGraph::new(ExposureLattice::new()).freeze();
    let solution = Analyzer::default().run(&cfg, initial, &mut transfer);
    let merge = solution.entry_state(b(3)).unwrap();
    let this = merge.try_lookup(&"this".into(), &[]).unwrap();
    let f = merge.try_lookup(&frame, &[this]).unwrap();
    assert_eq!(merge.value(f), exposed);

    let packed = solution.exit_state(b(0)).unwrap();
    assert_eq!(
        packed.value(packed.try_lookup(&frame, &[this]).unwrap()),
        Flat::Value(Exposure::NotExposed)
    );
}
