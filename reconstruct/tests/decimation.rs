use proptest::prelude::*;

use reconstruct::{builder::MeshBuilder, post_process::Decimator, Pos};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn never_exceeds_target_or_input(target in 256_usize..2_000, radius in 1.0_f32..50.0) {
        let mut mesh = MeshBuilder::icosphere(Pos::new(radius, 0.0, -radius), radius, 3);
        let input = mesh.face_count();

        Decimator { target_triangles: target, prevent_normal_flips: true }
            .post_process(&mut mesh);

        prop_assert!(mesh.face_count() <= input.min(target));
        prop_assert!(mesh.is_valid());
        prop_assert!(mesh.is_manifold());
    }
}
