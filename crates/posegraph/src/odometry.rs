use multiway_core::RigidTransform;

/// Initial node poses from the ordered sequential transforms `T(i, i+1)`.
///
/// A left fold over the odometry chain: the running product is
/// `odometry ← T(i, i+1) ∘ odometry`, and node `i + 1` gets
/// `odometry⁻¹`. Node 0 is the identity, so `n` transforms yield `n + 1`
/// poses. [`RigidTransform::compose`] re-orthonormalises each product.
pub fn chain_odometry(sequential: &[RigidTransform]) -> Vec<RigidTransform> {
    let identity = RigidTransform::identity();
    let (_, poses) = sequential.iter().fold(
        (identity, vec![identity]),
        |(odometry, mut poses), t| {
            let odometry = t.compose(&odometry);
            poses.push(odometry.inverse());
            (odometry, poses)
        },
    );
    poses
}
