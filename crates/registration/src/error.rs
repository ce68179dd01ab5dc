use std::fmt;

/// Which half of the two-stage alignment an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Coarse,
    Fine,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Coarse => f.write_str("coarse"),
            Stage::Fine => f.write_str("fine"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    #[error("no correspondences within {max_distance} during {stage} alignment")]
    NoCorrespondences { stage: Stage, max_distance: f32 },

    #[error("target has {normals} normals for {points} points")]
    NormalsMismatch { normals: usize, points: usize },
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
