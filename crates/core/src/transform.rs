use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3, Vector6};
use std::ops::Mul;

/// Tangent vector of SE(3), ordered `[ω_x, ω_y, ω_z, ρ_x, ρ_y, ρ_z]`:
/// rotation first, then translation.
pub type Twist = Vector6<f64>;

/// A rigid transform in SE(3).
///
/// The rotation block is kept orthonormal: every constructor that accepts a
/// raw matrix projects it back onto SO(3), and [`RigidTransform::compose`]
/// re-orthonormalises so that long products do not drift.
///
/// Composition follows matrix convention: `a.compose(&b)` applies `b` first,
/// then `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Builds a transform from a rotation matrix and translation. The matrix
    /// is projected to the nearest rotation.
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation: nearest_rotation(&rotation),
            translation,
        }
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation,
        }
    }

    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64, translation: Vector3<f64>) -> Self {
        let rotation = match nalgebra::Unit::try_new(*axis, f64::EPSILON) {
            Some(axis) => *Rotation3::from_axis_angle(&axis, angle).matrix(),
            None => Matrix3::identity(),
        };
        Self {
            rotation,
            translation,
        }
    }

    /// Builds a transform from a homogeneous 4x4 matrix. The bottom row is
    /// ignored.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let rotation: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let translation: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
        Self::new(rotation, translation)
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// `self ∘ other`: applies `other` first.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: nearest_rotation(&(self.rotation * other.rotation)),
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn inverse(&self) -> RigidTransform {
        let rt = self.rotation.transpose();
        RigidTransform {
            rotation: rt,
            translation: -(rt * self.translation),
        }
    }

    /// Projects the rotation block back onto SO(3).
    pub fn orthonormalized(&self) -> RigidTransform {
        RigidTransform {
            rotation: nearest_rotation(&self.rotation),
            translation: self.translation,
        }
    }

    pub fn apply_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    pub fn apply_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * v
    }

    pub fn apply_point_f32(&self, p: [f32; 3]) -> [f32; 3] {
        let q = self.apply_point(&Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64));
        [q.x as f32, q.y as f32, q.z as f32]
    }

    pub fn apply_vector_f32(&self, v: [f32; 3]) -> [f32; 3] {
        let q = self.apply_vector(&Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64));
        [q.x as f32, q.y as f32, q.z as f32]
    }

    /// Exponential map from a twist `[ω, ρ]` to SE(3).
    pub fn exp(xi: &Twist) -> RigidTransform {
        let omega = Vector3::new(xi[0], xi[1], xi[2]);
        let rho = Vector3::new(xi[3], xi[4], xi[5]);
        let rotation = *Rotation3::from_scaled_axis(omega).matrix();
        let v = left_jacobian_so3(&omega);
        RigidTransform {
            rotation,
            translation: v * rho,
        }
    }

    /// Logarithm map, the inverse of [`RigidTransform::exp`] for rotation
    /// angles in `[0, π]`.
    pub fn log(&self) -> Twist {
        let omega = rotation_log(&self.rotation);
        let rho = inverse_left_jacobian_so3(&omega) * self.translation;
        Twist::new(omega.x, omega.y, omega.z, rho.x, rho.y, rho.z)
    }

    pub fn rotation_angle(&self) -> f64 {
        let c = ((self.rotation.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
        c.acos()
    }

    pub fn is_finite(&self) -> bool {
        self.rotation.iter().all(|v| v.is_finite()) && self.translation.iter().all(|v| v.is_finite())
    }

    pub fn is_identity(&self, tol: f64) -> bool {
        self.approx_eq(&RigidTransform::identity(), tol)
    }

    /// Element-wise comparison of rotation and translation blocks.
    pub fn approx_eq(&self, other: &RigidTransform, tol: f64) -> bool {
        (self.rotation - other.rotation).amax() <= tol
            && (self.translation - other.translation).amax() <= tol
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

impl Mul<&RigidTransform> for &RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: &RigidTransform) -> RigidTransform {
        self.compose(rhs)
    }
}

pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Closest rotation in the Frobenius sense, via SVD with a determinant fix.
fn nearest_rotation(m: &Matrix3<f64>) -> Matrix3<f64> {
    let svd = m.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return *Rotation3::from_matrix(m).matrix();
    };
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }
    r
}

/// Rotation vector of `r`, taken from the quaternion with `atan2` so that
/// small angles keep full precision.
fn rotation_log(r: &Matrix3<f64>) -> Vector3<f64> {
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*r));
    let (mut w, mut v) = (q.w, q.imag());
    if w < 0.0 {
        w = -w;
        v = -v;
    }
    let n = v.norm();
    if n < 1e-15 {
        return v * (2.0 / w);
    }
    v * (2.0 * n.atan2(w) / n)
}

fn left_jacobian_so3(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta2 = omega.norm_squared();
    let w = skew(omega);
    let w2 = w * w;
    if theta2 < 1e-10 {
        return Matrix3::identity() + 0.5 * w + w2 / 6.0;
    }
    let theta = theta2.sqrt();
    let a = (1.0 - theta.cos()) / theta2;
    let b = (theta - theta.sin()) / (theta2 * theta);
    Matrix3::identity() + a * w + b * w2
}

fn inverse_left_jacobian_so3(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta2 = omega.norm_squared();
    let w = skew(omega);
    let w2 = w * w;
    if theta2 < 1e-10 {
        return Matrix3::identity() - 0.5 * w + w2 / 12.0;
    }
    let theta = theta2.sqrt();
    let half = 0.5 * theta;
    let c = (1.0 - half * half.cos() / half.sin()) / theta2;
    Matrix3::identity() - 0.5 * w + c * w2
}

#[cfg(test)]
mod tests {
    use super::{RigidTransform, Twist};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn arb_twist(max_angle: f64) -> impl Strategy<Value = Twist> {
        (
            -1.0f64..1.0,
            -1.0f64..1.0,
            -1.0f64..1.0,
            0.0..max_angle,
            -10.0f64..10.0,
            -10.0f64..10.0,
            -10.0f64..10.0,
        )
            .prop_map(|(ax, ay, az, angle, tx, ty, tz)| {
                let axis = Vector3::new(ax, ay, az);
                let n = axis.norm();
                let omega = if n < 1e-6 { Vector3::zeros() } else { axis / n * angle };
                Twist::new(omega.x, omega.y, omega.z, tx, ty, tz)
            })
    }

    #[test]
    fn identity_leaves_points_unchanged() {
        let t = RigidTransform::identity();
        let p = Vector3::new(1.0, -2.0, 3.0);
        assert_eq!(t.apply_point(&p), p);
        assert!(t.is_identity(0.0));
    }

    #[test]
    fn compose_applies_right_operand_first() {
        let rot = RigidTransform::from_axis_angle(&Vector3::z(), FRAC_PI_2, Vector3::zeros());
        let shift = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let p = rot.compose(&shift).apply_point(&Vector3::zeros());
        assert_relative_eq!(p, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        let q = (shift * rot).apply_point(&Vector3::zeros());
        assert_relative_eq!(q, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn new_projects_onto_rotations() {
        let noisy = Matrix3::new(1.01, 0.02, 0.0, -0.01, 0.99, 0.0, 0.0, 0.0, 1.0);
        let t = RigidTransform::new(noisy, Vector3::zeros());
        let r = t.rotation();
        assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn reflection_is_projected_to_proper_rotation() {
        let reflect = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0);
        let t = RigidTransform::new(reflect, Vector3::zeros());
        assert_relative_eq!(t.rotation().determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn log_handles_half_turn() {
        let t = RigidTransform::from_axis_angle(&Vector3::x(), PI, Vector3::new(0.0, 1.0, 0.0));
        let xi = t.log();
        assert_relative_eq!(xi.fixed_rows::<3>(0).norm(), PI, epsilon = 1e-9);
        assert!(RigidTransform::exp(&xi).approx_eq(&t, 1e-9));
    }

    #[test]
    fn small_twist_round_trips() {
        let xi = Twist::new(1e-9, -2e-9, 5e-10, 0.3, -0.1, 0.2);
        let back = RigidTransform::exp(&xi).log();
        assert_relative_eq!(back, xi, epsilon = 1e-12);
    }

    #[test]
    fn matrix_round_trip() {
        let t = RigidTransform::from_axis_angle(&Vector3::new(1.0, 1.0, 0.0), 0.7, Vector3::new(1.0, 2.0, 3.0));
        let back = RigidTransform::from_matrix(&t.to_matrix());
        assert!(back.approx_eq(&t, 1e-12));
    }

    proptest! {
        #[test]
        fn compose_with_inverse_is_identity(xi in arb_twist(3.0)) {
            let t = RigidTransform::exp(&xi);
            prop_assert!(t.compose(&t.inverse()).is_identity(1e-9));
            prop_assert!(t.inverse().compose(&t).is_identity(1e-9));
        }

        #[test]
        fn exp_log_round_trip(xi in arb_twist(3.0)) {
            let back = RigidTransform::exp(&xi).log();
            prop_assert!((back - xi).amax() < 1e-8, "{:?} vs {:?}", back, xi);
        }

        #[test]
        fn composition_is_associative(a in arb_twist(3.0), b in arb_twist(3.0), c in arb_twist(3.0)) {
            let (a, b, c) = (RigidTransform::exp(&a), RigidTransform::exp(&b), RigidTransform::exp(&c));
            let left = a.compose(&b).compose(&c);
            let right = a.compose(&b.compose(&c));
            prop_assert!(left.approx_eq(&right, 1e-9));
        }

        #[test]
        fn long_products_stay_orthonormal(xi in arb_twist(0.5)) {
            let step = RigidTransform::exp(&xi);
            let mut acc = RigidTransform::identity();
            for _ in 0..500 {
                acc = step.compose(&acc);
            }
            let r = acc.rotation();
            prop_assert!((r.transpose() * r - Matrix3::identity()).amax() < 1e-12);
            prop_assert!((r.determinant() - 1.0).abs() < 1e-12);
        }
    }
}
