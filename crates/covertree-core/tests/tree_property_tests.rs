//! Property-based tests comparing the cover tree against brute-force
//! references over randomized point sets, protecting the bounded-heap k-NN
//! logic and the placement/removal invariants independent of tree shape.

use proptest::collection::vec;
use proptest::prelude::*;

use covertree_core::{CoverTree, DistanceMetric, Point};

const PROP_CASES: u32 = 64;

/// Fixed-dimension point sets; the dimension is chosen per case so every
/// vector in a set has the same length.
fn point_set() -> impl Strategy<Value = Vec<Vec<f32>>> {
    (2_usize..=4).prop_flat_map(|dim| vec(vec(-50.0_f32..50.0, dim..=dim), 0..32))
}

/// Drops value-equal duplicates (`-0.0 == 0.0` included) so the set has no
/// two points at metric distance zero.
fn dedup_exact(mut vectors: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    let mut seen: Vec<Vec<f32>> = Vec::new();
    vectors.retain(|v| {
        if seen.iter().any(|s| s == v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
    vectors
}

fn brute_force_distances(vectors: &[Vec<f32>], query: &Point) -> Vec<f32> {
    let mut distances: Vec<f32> = vectors
        .iter()
        .map(|v| DistanceMetric::Euclidean.distance(query, &Point::new(v.clone())))
        .collect();
    distances.sort_by(f32::total_cmp);
    distances
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: PROP_CASES,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_knn_matches_brute_force(
        vectors in point_set(),
        query in vec(-50.0_f32..50.0, 4),
        k in 0_usize..40,
    ) {
        let dim = vectors.first().map_or(2, Vec::len);
        let query = Point::new(query[..dim].to_vec());

        let mut tree = CoverTree::new(2.0, DistanceMetric::Euclidean).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let identity = tree.insert(i as i32, Point::new(v.clone()));
            prop_assert_eq!(identity as usize, i, "identities are sequential");
        }

        let neighbors = tree.k_nearest_neighbors(&query, k);
        prop_assert_eq!(neighbors.len(), k.min(vectors.len()));

        for pair in neighbors.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance, "ascending order");
        }

        let expected = brute_force_distances(&vectors, &query);
        for (i, neighbor) in neighbors.iter().enumerate() {
            prop_assert_eq!(
                neighbor.distance.to_bits(),
                expected[i].to_bits(),
                "distance {} must match brute force", i
            );
        }
    }

    #[test]
    fn prop_insert_lookup_round_trip(vectors in point_set()) {
        let vectors = dedup_exact(vectors);
        let mut tree = CoverTree::new(2.0, DistanceMetric::Euclidean).unwrap();

        let mut identities = Vec::new();
        for (i, v) in vectors.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let payload = i as i64;
            identities.push(tree.insert(payload, Point::new(v.clone())));
        }

        for (i, identity) in identities.iter().enumerate() {
            let found = tree.find_point_by_index(*identity);
            prop_assert!(found.is_some(), "identity {} must resolve", identity);
            let found = found.unwrap();
            let original = Point::new(vectors[i].clone());
            prop_assert_eq!(
                DistanceMetric::Euclidean.distance(found, &original).to_bits(),
                0.0_f32.to_bits()
            );
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let expected = i as i64;
            prop_assert_eq!(tree.value(found), Some(expected));
        }
    }

    #[test]
    fn prop_remove_erases_only_the_target(
        vectors in point_set(),
        selector in 0_usize..32,
    ) {
        let vectors = dedup_exact(vectors);
        prop_assume!(!vectors.is_empty());

        let mut tree = CoverTree::new(2.0, DistanceMetric::Euclidean).unwrap();
        for v in &vectors {
            tree.insert(String::from("payload"), Point::new(v.clone()));
        }

        let victim = selector % vectors.len();
        let target = Point::new(vectors[victim].clone());
        prop_assert!(tree.remove(&target));
        prop_assert_eq!(tree.len(), vectors.len() - 1);

        // Identities are never reused: the next insert continues the sequence.
        let next = tree.insert(String::from("next"), Point::new(vectors[victim].clone()));
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let expected_next = vectors.len() as i32;
        prop_assert_eq!(next, expected_next);

        // Every survivor is still reachable through a full k-NN scan.
        let all = tree.k_nearest_neighbors(&target, vectors.len() + 1);
        prop_assert_eq!(all.len(), vectors.len());
    }

    #[test]
    fn prop_file_round_trip(vectors in point_set()) {
        let dir = tempfile::tempdir().unwrap();
        let envelope_path = dir.path().join("tree.bin");
        let payload_path = dir.path().join("values.bin");

        let mut tree = CoverTree::new(2.0, DistanceMetric::Euclidean).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            tree.insert(i as i64, Point::new(v.clone()));
        }

        let mut envelope = std::fs::File::create(&envelope_path).unwrap();
        let mut payloads = std::fs::File::create(&payload_path).unwrap();
        tree.encode_tree(&mut envelope).unwrap();
        tree.encode_values(&mut payloads).unwrap();
        drop((envelope, payloads));

        let mut loaded = CoverTree::<i64>::new(3.0, DistanceMetric::Cosine).unwrap();
        loaded
            .decode_tree(&mut std::fs::File::open(&envelope_path).unwrap())
            .unwrap();
        loaded
            .decode_values(&mut std::fs::File::open(&payload_path).unwrap())
            .unwrap();

        prop_assert_eq!(loaded.root(), tree.root());
        prop_assert_eq!(loaded.metric(), tree.metric());
        for identity in 0..vectors.len() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let identity = identity as i32;
            let point = loaded.find_point_by_index(identity);
            prop_assert!(point.is_some());
            prop_assert_eq!(loaded.value(point.unwrap()), Some(i64::from(identity)));
        }
    }

    #[test]
    fn prop_codec_round_trip(vectors in point_set()) {
        let mut tree = CoverTree::new(1.3, DistanceMetric::Cosine).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            tree.insert(i as i32, Point::new(v.clone()));
        }

        let mut envelope = Vec::new();
        let mut payloads = Vec::new();
        tree.encode_tree(&mut envelope).unwrap();
        tree.encode_values(&mut payloads).unwrap();

        let mut decoded = CoverTree::<i32>::new(2.0, DistanceMetric::Euclidean).unwrap();
        decoded.decode_tree(&mut envelope.as_slice()).unwrap();
        decoded.decode_values(&mut payloads.as_slice()).unwrap();

        prop_assert_eq!(decoded.base(), tree.base());
        prop_assert_eq!(decoded.metric(), tree.metric());
        prop_assert_eq!(decoded.root(), tree.root());
        prop_assert_eq!(decoded.len(), tree.len());

        // Re-encoding the decoded tree reproduces the stream byte-exactly.
        let mut envelope2 = Vec::new();
        decoded.encode_tree(&mut envelope2).unwrap();
        prop_assert_eq!(envelope2, envelope);
    }
}
