mod util;

use std::collections::BTreeMap;

use mesh_ghost::algs::communicator::{CommTag, Communicator, GhostCommTags};
use mesh_ghost::algs::ghost_exchange::{
    discover_subscriptions, exchange_ghost_cells, exchange_records, serialize_cell,
};
use mesh_ghost::geometry::Vector3;
use mesh_ghost::topology::{Cell, CellFace, CellLocation, CellRegistry, CellType};
use mesh_ghost::{DebugInvariants, MeshGhostError};
use util::{run_ranks, strip_cell, strip_gid, strip_registry, strip_vertices};

#[test]
fn two_ranks_swap_boundary_cells() {
    let tags = GhostCommTags::from_base(CommTag::new(0x7000));
    let out = run_ranks(2, |comm| {
        let (mut reg, vertices) = strip_registry(comm.rank(), 2, 2);
        let n = exchange_ghost_cells(&mut reg, &vertices, comm, tags).unwrap();
        reg.finalize();
        (n, reg)
    });

    // rank 0 owns cells 0,1 and borrows 2; rank 1 owns 2,3 and borrows 1
    let (n0, reg0) = &out[0];
    let (n1, reg1) = &out[1];
    assert_eq!((*n0, *n1), (1, 1));

    let ghost = reg0.foreign_cell(strip_gid(2)).expect("cell 2 on rank 0");
    let owned = reg1.cell(strip_gid(2)).unwrap();
    assert_eq!(ghost.vertex_ids, owned.vertex_ids);
    assert_eq!(ghost.material_id, owned.material_id);
    assert_eq!(ghost.partition_id, 1);
    assert_eq!(ghost.local_id, None);
    assert_eq!(ghost.faces.len(), owned.faces.len());
    for (g, o) in ghost.faces.iter().zip(&owned.faces) {
        assert_eq!(g.vertex_ids, o.vertex_ids);
        assert_eq!(g.normal, o.normal);
        assert_eq!(g.centroid, o.centroid);
    }
    assert_eq!(ghost.centroid, Vector3::new(2.5, 0.5, 0.0));

    assert!(matches!(
        reg1.resolve(strip_gid(1)),
        Ok(CellLocation::Foreign { .. })
    ));
    assert!(matches!(
        reg1.resolve(strip_gid(2)),
        Ok(CellLocation::Native { local_id: 0, .. })
    ));
    assert_eq!(
        reg1.resolve(strip_gid(0)),
        Err(MeshGhostError::CellNotFound(strip_gid(0)))
    );
    reg0.validate_invariants().unwrap();
    reg1.validate_invariants().unwrap();
}

#[test]
fn middle_rank_receives_from_both_sides() {
    let tags = GhostCommTags::from_base(CommTag::new(0x7100));
    let foreign: Vec<Vec<u64>> = run_ranks(3, |comm| {
        let (mut reg, vertices) = strip_registry(comm.rank(), 3, 2);
        exchange_ghost_cells(&mut reg, &vertices, comm, tags).unwrap();
        reg.foreign_cells().map(|c| c.global_id).collect()
    });
    assert_eq!(foreign[0], vec![strip_gid(2)]);
    assert_eq!(foreign[1], vec![strip_gid(1), strip_gid(4)]);
    assert_eq!(foreign[2], vec![strip_gid(3)]);
}

#[test]
fn foreign_cells_match_face_neighbours_owned_elsewhere() {
    let tags = GhostCommTags::from_base(CommTag::new(0x7200));
    run_ranks(4, |comm| {
        let me = comm.rank();
        let (mut reg, vertices) = strip_registry(me, 4, 3);
        exchange_ghost_cells(&mut reg, &vertices, comm, tags).unwrap();

        let mut wanted: Vec<u64> = reg
            .native_cells()
            .flat_map(|c| c.faces.iter().filter_map(|f| f.neighbor))
            .filter(|n| n.partition_id != me)
            .map(|n| n.global_id)
            .collect();
        wanted.sort_unstable();
        wanted.dedup();
        let got: Vec<u64> = reg.foreign_cells().map(|c| c.global_id).collect();
        assert_eq!(got, wanted);
        for id in got {
            assert!(!reg.is_local(id));
        }
    });
}

#[test]
fn rank_without_neighbours_still_takes_part() {
    let tags = GhostCommTags::from_base(CommTag::new(0x7300));
    let counts = run_ranks(3, |comm| {
        let me = comm.rank();
        let vertices = strip_vertices(2);
        let mut reg = CellRegistry::new(me);
        if me < 2 {
            // ranks 0 and 1 share a two-cell strip, rank 2 holds an island
            reg.register_native(strip_cell(me, 2, |j| j));
        } else {
            reg.register_native(
                Cell::new(CellType::Slab, 9_000, 2)
                    .with_vertices(vec![0, 1])
                    .with_face(CellFace::new(vec![0]))
                    .with_face(CellFace::new(vec![1])),
            );
        }
        assert_eq!(discover_subscriptions(&reg).is_empty(), me == 2);
        exchange_ghost_cells(&mut reg, &vertices, comm, tags).unwrap()
    });
    assert_eq!(counts, vec![1, 1, 0]);
}

#[test]
fn unknown_cell_type_aborts_without_registering() {
    let tags = GhostCommTags::from_base(CommTag::new(0x7400));
    let out = run_ranks(2, |comm| {
        let me = comm.rank();
        let (mut reg, vertices) = strip_registry(me, 2, 1);
        if me == 0 {
            // a valid record followed by garbage
            let mut words = Vec::new();
            serialize_cell(reg.native_cell(0).unwrap(), &mut words);
            words.extend([42, 0, 0]);
            let mut outgoing = BTreeMap::new();
            outgoing.insert(1, words);
            exchange_records(comm, &outgoing, tags).unwrap();
            Ok(0)
        } else {
            let result = exchange_ghost_cells(&mut reg, &vertices, comm, tags);
            assert_eq!(reg.num_foreign(), 0);
            result
        }
    });
    let err = out[1].clone().unwrap_err();
    assert!(matches!(err, MeshGhostError::UnknownCellType { tag: 42, .. }));
    assert!(err.is_fatal());
}

#[test]
fn ghost_of_a_cell_already_known_is_rejected() {
    let tags = GhostCommTags::from_base(CommTag::new(0x7500));
    let out = run_ranks(2, |comm| {
        let me = comm.rank();
        let (mut reg, vertices) = strip_registry(me, 2, 1);
        if me == 1 {
            // pretend the ghost already arrived once
            reg.register_foreign(strip_cell(0, 2, |j| j));
        }
        exchange_ghost_cells(&mut reg, &vertices, comm, tags)
    });
    assert_eq!(out[0], Ok(1));
    assert_eq!(
        out[1],
        Err(MeshGhostError::DuplicateGhostCell(strip_gid(0)))
    );
}
