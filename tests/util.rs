#![allow(dead_code)]
use mesh_ghost::{
    algs::communicator::RayonComm,
    geometry::{Vector3, VertexTable},
    topology::{Cell, CellFace, CellRegistry, CellType},
};

/// Run `f` once per rank of a fresh in-process world, one thread per rank.
/// Results come back in rank order.
pub fn run_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&RayonComm) -> T + Sync,
{
    let world = RayonComm::world(n);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = world.iter().map(|c| s.spawn(move || f(c))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

/// Global id of cell `i` of a strip.
pub fn strip_gid(i: usize) -> u64 {
    100 + 3 * i as u64
}

/// Vertices of a strip of `n` unit quads along x: bottom row `0..=n`, top
/// row `n+1..=2n+1`.
pub fn strip_vertices(n: usize) -> VertexTable {
    (0..=n)
        .map(|i| Vector3::new(i as f64, 0.0, 0.0))
        .chain((0..=n).map(|i| Vector3::new(i as f64, 1.0, 0.0)))
        .collect()
}

/// Quad `i` of a strip of `n` cells, where `owner(j)` owns cell `j`.
pub fn strip_cell(i: usize, n: usize, owner: impl Fn(usize) -> usize) -> Cell {
    let top = |k: usize| (n + 1 + k) as u64;
    let (b0, b1) = (i as u64, i as u64 + 1);
    let mut right = CellFace::new(vec![b1, top(i + 1)]);
    if i + 1 < n {
        right = right.with_neighbor(strip_gid(i + 1), owner(i + 1));
    }
    let mut left = CellFace::new(vec![top(i), b0]);
    if i > 0 {
        left = left.with_neighbor(strip_gid(i - 1), owner(i - 1));
    }
    Cell::new(CellType::Polygon, strip_gid(i), owner(i))
        .with_material(i as i32 % 2)
        .with_vertices(vec![b0, b1, top(i + 1), top(i)])
        .with_face(CellFace::new(vec![b0, b1]))
        .with_face(right)
        .with_face(CellFace::new(vec![top(i + 1), top(i)]))
        .with_face(left)
}

/// Registry of `rank` for a strip of `ranks * per_rank` cells handed out in
/// consecutive blocks.
pub fn strip_registry(rank: usize, ranks: usize, per_rank: usize) -> (CellRegistry, VertexTable) {
    let n = ranks * per_rank;
    let vertices = strip_vertices(n);
    let owner = |j: usize| j / per_rank;
    let mut reg = CellRegistry::new(rank);
    for i in (0..n).filter(|&i| owner(i) == rank) {
        reg.register_native(strip_cell(i, n, owner));
    }
    reg.compute_native_geometry(&vertices)
        .expect("strip vertices are complete");
    (reg, vertices)
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
