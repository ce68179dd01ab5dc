use nalgebra::{Matrix6, SymmetricEigen, Vector6};
use std::ops::{Add, AddAssign};

/// Symmetric, positive semi-definite 6x6 weight on an SE(3) tangent vector,
/// in the same `[ω, ρ]` ordering as [`crate::Twist`].
///
/// Symmetry is enforced on construction; accumulation through
/// [`InformationMatrix::add_jacobian_row`] keeps the matrix PSD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InformationMatrix(Matrix6<f64>);

impl InformationMatrix {
    pub fn zeros() -> Self {
        Self(Matrix6::zeros())
    }

    pub fn identity() -> Self {
        Self(Matrix6::identity())
    }

    /// Wraps `m`, replacing it with its symmetric part.
    pub fn from_matrix(m: Matrix6<f64>) -> Self {
        Self((m + m.transpose()) * 0.5)
    }

    pub fn from_diagonal(d: &Vector6<f64>) -> Self {
        Self(Matrix6::from_diagonal(d))
    }

    /// Adds `j jᵀ` for one residual Jacobian row.
    pub fn add_jacobian_row(&mut self, j: &Vector6<f64>) {
        self.0 += j * j.transpose();
    }

    pub fn scaled(&self, s: f64) -> Self {
        Self(self.0 * s)
    }

    pub fn as_matrix(&self) -> &Matrix6<f64> {
        &self.0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[(row, col)]
    }

    /// `rᵀ Ω r`, the chi-square of a residual under this weight.
    pub fn chi_square(&self, r: &Vector6<f64>) -> f64 {
        r.dot(&(self.0 * r))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn is_positive_semidefinite(&self, tol: f64) -> bool {
        let scale = self.0.amax().max(1.0);
        SymmetricEigen::new(self.0)
            .eigenvalues
            .iter()
            .all(|&l| l >= -tol * scale)
    }
}

impl Default for InformationMatrix {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Add for InformationMatrix {
    type Output = InformationMatrix;

    fn add(self, rhs: InformationMatrix) -> InformationMatrix {
        InformationMatrix(self.0 + rhs.0)
    }
}

impl AddAssign for InformationMatrix {
    fn add_assign(&mut self, rhs: InformationMatrix) {
        self.0 += rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::InformationMatrix;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix6, Vector6};

    #[test]
    fn from_matrix_symmetrises() {
        let mut m = Matrix6::identity();
        m[(0, 5)] = 2.0;
        let info = InformationMatrix::from_matrix(m);
        assert_eq!(info.get(0, 5), 1.0);
        assert_eq!(info.get(5, 0), 1.0);
    }

    #[test]
    fn accumulated_rows_are_psd() {
        let mut info = InformationMatrix::zeros();
        assert!(info.is_zero());
        info.add_jacobian_row(&Vector6::new(0.0, 1.0, -2.0, 1.0, 0.0, 0.0));
        info.add_jacobian_row(&Vector6::new(-1.0, 0.0, 3.0, 0.0, 1.0, 0.0));
        assert!(!info.is_zero());
        assert!(info.is_positive_semidefinite(1e-12));
        assert_eq!(info.as_matrix(), &info.as_matrix().transpose());
    }

    #[test]
    fn chi_square_of_identity_is_squared_norm() {
        let r = Vector6::new(1.0, 2.0, 3.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(InformationMatrix::identity().chi_square(&r), 15.0);
        assert_relative_eq!(InformationMatrix::identity().scaled(2.0).chi_square(&r), 30.0);
    }

    #[test]
    fn negative_definite_is_rejected() {
        let info = InformationMatrix::identity().scaled(-1.0);
        assert!(!info.is_positive_semidefinite(1e-9));
    }
}
