#![cfg(feature = "json")]

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ricochet::glam::DVec3;
use ricochet::{
    AssetRef, Capsule, Collider, CapsuleResolver, NarrowPhase, Octree, OctreeConfig, Preprocessor,
    SourceMesh,
};

fn arena_meshes() -> Vec<SourceMesh> {
    let mut meshes = vec![SourceMesh::cuboid(
        "floor",
        DVec3::new(0.0, -0.5, 0.0),
        DVec3::new(40.0, 1.0, 40.0),
    )];
    for i in 0..12 {
        let f = i as f64;
        let center = DVec3::new((f * 6.1) % 30.0 - 15.0, 1.0, (f * 4.3) % 30.0 - 15.0);
        let mesh = SourceMesh::cuboid(format!("crate{i}"), center, DVec3::splat(1.0 + (i % 3) as f64 * 0.5))
            .with_user_data(AssetRef {
                file: Some("props.glb".into()),
                model: Some(format!("crate{i}")),
                offset: (i % 2 == 0).then_some(DVec3::new(0.0, 0.5, 0.0)),
            });
        meshes.push(mesh);
    }
    meshes
}

fn snapshot(tree: &Octree) -> Vec<(Option<String>, DVec3, DVec3)> {
    tree.iter()
        .map(|c| (c.name().map(str::to_owned), c.center(), c.size()))
        .collect()
}

#[test]
fn test_round_trip_preserves_objects() {
    let (colliders, _) = Preprocessor::default().run(&arena_meshes()).unwrap();
    let config = OctreeConfig {
        max_objects: 2,
        ..Default::default()
    };
    let (tree, _) = Octree::build(colliders, &config);
    assert!(tree.node_count() > 1);

    let json = tree.to_json().unwrap();
    let restored = Octree::from_json(&json, &config).unwrap();

    assert_eq!(restored.count(), tree.count());
    assert_eq!(restored.node_count(), tree.node_count());
    assert_eq!(restored.depth(), tree.depth());
    assert_eq!(snapshot(&restored), snapshot(&tree));
    for (a, b) in tree.iter().zip(restored.iter()) {
        assert!((a.aabb().min - b.aabb().min).length() < 1e-9);
        assert!((a.aabb().max - b.aabb().max).length() < 1e-9);
        assert_eq!(a.user_data(), b.user_data());
    }

    // Pretty output is the same document
    let pretty = Octree::from_json(&tree.to_json_pretty().unwrap(), &config).unwrap();
    assert_eq!(snapshot(&pretty), snapshot(&tree));
}

#[test]
fn test_round_trip_keeps_exact_floats() {
    let config = OctreeConfig {
        max_objects: 4,
        ..Default::default()
    };
    let mut tree = Octree::new(DVec3::ZERO, 1000.0, &config);
    let mut rng = StdRng::seed_from_u64(7);
    for i in 0..2000 {
        let center = DVec3::new(
            rng.random_range(-400.0..400.0),
            rng.random_range(-400.0..400.0),
            rng.random_range(-400.0..400.0),
        );
        let size = DVec3::new(
            rng.random_range(0.01..5.0),
            rng.random_range(0.01..5.0),
            rng.random_range(0.01..5.0),
        );
        let collider = Collider::placeholder(Some(format!("o{i}")), center, size);
        assert_eq!(collider.center(), center);
        assert_eq!(collider.size(), size);
        assert!(tree.insert(collider));
    }

    let restored = Octree::from_json(&tree.to_json().unwrap(), &config).unwrap();
    assert_eq!(restored.count(), 2000);
    assert_eq!(snapshot(&restored), snapshot(&tree));
    for (a, b) in tree.iter().zip(restored.iter()) {
        assert_eq!(a.aabb(), b.aabb());
    }
}

#[test]
fn test_restored_map_collides_after_binding() {
    let (colliders, _) = Preprocessor::default().run(&arena_meshes()).unwrap();
    let (tree, _) = Octree::build(colliders, &OctreeConfig::default());
    let mut restored = Octree::from_json(&tree.to_json().unwrap(), &OctreeConfig::default()).unwrap();

    let capsule = Capsule::new(DVec3::new(1.3, 0.1, -2.1), DVec3::new(1.3, 1.5, -2.1), 0.3);
    let resolver = CapsuleResolver::default();
    // Nothing is collidable until narrow-phase data is attached
    assert_eq!(resolver.resolve(&capsule, &restored.query_capsule(&capsule)), DVec3::ZERO);

    let by_name: HashMap<String, NarrowPhase> = tree
        .iter()
        .filter_map(|c| Some((c.name()?.to_owned(), c.narrow_phase()?.clone())))
        .collect();
    let bound = restored.bind_narrow_phase(|c: &Collider| c.name().and_then(|n| by_name.get(n)).cloned());
    assert_eq!(bound, tree.count());

    let expected = resolver.resolve(&capsule, &tree.query_capsule(&capsule));
    let actual = resolver.resolve(&capsule, &restored.query_capsule(&capsule));
    assert!((expected - DVec3::new(0.0, 0.2, 0.0)).length() < 1e-9);
    assert!((actual - expected).length() < 1e-12);
}

#[test]
fn test_subdivision_trigger() {
    let config = OctreeConfig {
        max_depth: 1,
        max_objects: 1,
        ..Default::default()
    };
    let mut tree = Octree::new(DVec3::ZERO, 8.0, &config);
    assert!(tree.insert(Collider::placeholder(Some("low".into()), DVec3::new(-2.0, -2.0, -2.0), DVec3::ONE)));
    assert!(tree.root().children().is_none());
    assert!(tree.insert(Collider::placeholder(Some("high".into()), DVec3::new(2.0, 2.0, -2.0), DVec3::ONE)));

    let children = tree.root().children().expect("root split");
    assert_eq!(children.len(), 8);
    assert!(tree.root().objects().is_empty());
    for child in children.iter() {
        for object in child.objects() {
            assert!(child.aabb().contains(object.aabb()));
        }
    }
    let occupied: Vec<usize> = (0..8).filter(|&i| !children[i].objects().is_empty()).collect();
    assert_eq!(occupied, vec![0, 3]);

    // The split survives a round trip unchanged
    let restored = Octree::from_json(&tree.to_json().unwrap(), &config).unwrap();
    let restored_children = restored.root().children().expect("children kept");
    assert_eq!(restored_children[3].objects()[0].name(), Some("high"));
    assert_eq!(restored_children[3].center(), DVec3::new(2.0, 2.0, -2.0));
}
