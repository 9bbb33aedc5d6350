use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use mesh_ghost::algs::DirectedGraph;

// Random sweep-dependency graph: mostly forward edges with a fraction of
// backward ones closing cycles.
fn random_graph(n: usize, out_degree: usize, backward: f64, seed: u64) -> DirectedGraph {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut g = DirectedGraph::new();
    for _ in 0..n {
        g.add_vertex(());
    }
    for u in 0..n {
        for _ in 0..out_degree {
            let v = rng.gen_range(0..n);
            if v == u {
                continue;
            }
            let (a, b) = if (v > u) ^ (rng.r#gen::<f64>() < backward) {
                (u, v)
            } else {
                (v, u)
            };
            g.add_edge(a, b);
        }
    }
    g
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("directed_graph");
    for &n in &[1_000usize, 10_000] {
        let dag = random_graph(n, 4, 0.0, 42);
        let cyclic = random_graph(n, 4, 0.02, 42);

        group.bench_with_input(BenchmarkId::new("topological_sort", n), &dag, |b, g| {
            b.iter(|| g.generate_topological_sort())
        });
        group.bench_with_input(BenchmarkId::new("tarjan_scc", n), &cyclic, |b, g| {
            b.iter(|| g.find_strongly_connected_components())
        });
        group.bench_with_input(
            BenchmarkId::new("remove_cyclic_dependencies", n),
            &cyclic,
            |b, g| {
                b.iter_batched(
                    || g.clone(),
                    |mut g| g.remove_cyclic_dependencies(),
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_graph);
criterion_main!(benches);
