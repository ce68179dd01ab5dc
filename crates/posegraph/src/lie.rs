use multiway_core::{skew, RigidTransform, Twist};
use nalgebra::Matrix6;

/// Adjoint of `t` on `[ω, ρ]` twists: `[[R, 0], [[t]×R, R]]`.
pub fn adjoint(t: &RigidTransform) -> Matrix6<f64> {
    let r = t.rotation();
    let mut ad = Matrix6::zeros();
    ad.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
    ad.fixed_view_mut::<3, 3>(3, 3).copy_from(r);
    ad.fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&(skew(t.translation()) * r));
    ad
}

/// Lie bracket matrix `ad(ξ) = [[ω×, 0], [ρ×, ω×]]`.
pub fn small_adjoint(xi: &Twist) -> Matrix6<f64> {
    let w = skew(&xi.fixed_rows::<3>(0).into_owned());
    let p = skew(&xi.fixed_rows::<3>(3).into_owned());
    let mut ad = Matrix6::zeros();
    ad.fixed_view_mut::<3, 3>(0, 0).copy_from(&w);
    ad.fixed_view_mut::<3, 3>(3, 3).copy_from(&w);
    ad.fixed_view_mut::<3, 3>(3, 0).copy_from(&p);
    ad
}

/// Residual of an edge and its Jacobians with respect to left
/// perturbations of the two endpoint poses.
#[derive(Debug, Clone, Copy)]
pub struct EdgeLinearization {
    pub residual: Twist,
    pub jac_source: Matrix6<f64>,
    pub jac_target: Matrix6<f64>,
}

/// `r = log(Z⁻¹ · P_t⁻¹ · P_s)`, which vanishes when the poses agree with the
/// measurement `Z`.
pub fn edge_residual(
    source_pose: &RigidTransform,
    target_pose: &RigidTransform,
    measured: &RigidTransform,
) -> Twist {
    measured
        .inverse()
        .compose(&target_pose.inverse())
        .compose(source_pose)
        .log()
}

/// Linearises [`edge_residual`] under `P ← exp(δ) P`.
///
/// Perturbing the source gives `exp(Ad(A) δ) · exp(r)` with
/// `A = Z⁻¹ P_t⁻¹`; the BCH expansion to first order in `r` gives
/// `J_s = (I - ½ ad(r)) Ad(A)`. Perturbing the target gives exactly the
/// negated term, so `J_t = -J_s`.
pub fn linearize_edge(
    source_pose: &RigidTransform,
    target_pose: &RigidTransform,
    measured: &RigidTransform,
) -> EdgeLinearization {
    let a = measured.inverse().compose(&target_pose.inverse());
    let residual = a.compose(source_pose).log();
    let jinv = Matrix6::identity() - 0.5 * small_adjoint(&residual);
    let jac_source = jinv * adjoint(&a);
    EdgeLinearization {
        residual,
        jac_source,
        jac_target: -jac_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn sample(seed: f64) -> RigidTransform {
        RigidTransform::exp(&Twist::new(
            0.3 * seed.sin(),
            -0.2 * seed.cos(),
            0.25,
            1.0 + seed,
            -0.5,
            0.3 * seed,
        ))
    }

    #[test]
    fn adjoint_matches_conjugation() {
        let t = sample(1.0);
        let xi = Twist::new(0.01, -0.02, 0.015, 0.1, 0.05, -0.03);
        let lhs = t.compose(&RigidTransform::exp(&xi)).compose(&t.inverse()).log();
        let rhs = adjoint(&t) * xi;
        assert!((lhs - rhs).amax() < 1e-12);
    }

    #[test]
    fn residual_vanishes_on_consistent_edge() {
        let (ps, pt) = (sample(0.5), sample(2.0));
        let z = pt.inverse().compose(&ps);
        assert!(edge_residual(&ps, &pt, &z).amax() < 1e-12);
    }

    #[test]
    fn jacobians_match_finite_differences() {
        let (ps, pt) = (sample(0.5), sample(2.0));
        // Measurement slightly off so the residual is small but non-zero.
        let z = RigidTransform::exp(&Twist::new(0.004, -0.002, 0.003, 0.01, 0.005, -0.008))
            .compose(&pt.inverse().compose(&ps));
        let lin = linearize_edge(&ps, &pt, &z);

        let h = 1e-6;
        for k in 0..6 {
            let mut d = Twist::zeros();
            d[k] = h;
            let ps_plus = RigidTransform::exp(&d).compose(&ps);
            let ps_minus = RigidTransform::exp(&(-d)).compose(&ps);
            let num_s = (edge_residual(&ps_plus, &pt, &z) - edge_residual(&ps_minus, &pt, &z)) / (2.0 * h);
            let pt_plus = RigidTransform::exp(&d).compose(&pt);
            let pt_minus = RigidTransform::exp(&(-d)).compose(&pt);
            let num_t = (edge_residual(&ps, &pt_plus, &z) - edge_residual(&ps, &pt_minus, &z)) / (2.0 * h);
            // First-order BCH: the error is O(|r|²).
            assert!((lin.jac_source.column(k) - num_s).amax() < 1e-3, "source column {k}");
            assert!((lin.jac_target.column(k) - num_t).amax() < 1e-3, "target column {k}");
        }
    }

    #[test]
    fn small_adjoint_is_the_bracket() {
        let a = Twist::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0);
        let b = Twist::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        let ab = small_adjoint(&a) * b;
        // [ω_a, ω_b] = z × x = y; translation part ω_a × ρ_b = z × y = -x.
        assert!((ab.fixed_rows::<3>(0) - Vector3::y()).amax() < 1e-15);
        assert!((ab.fixed_rows::<3>(3) + Vector3::x()).amax() < 1e-15);
    }
}
