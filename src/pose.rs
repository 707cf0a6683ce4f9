// Tool pose: translation (x, y, z) followed by rotation vector (rx, ry, rz)

use crate::error::LinkError;
use nalgebra as na;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose([f64; 6]);

impl Pose {
    pub const fn new(values: [f64; 6]) -> Self {
        Self(values)
    }

    pub fn from_parts(translation: &na::Vector3<f64>, rotation: &na::Vector3<f64>) -> Self {
        Self([
            translation[0],
            translation[1],
            translation[2],
            rotation[0],
            rotation[1],
            rotation[2],
        ])
    }

    /// Builds a pose from a controller reading. Only the length is checked.
    pub fn from_slice(values: &[f64]) -> Result<Self, LinkError> {
        let values: [f64; 6] = values.try_into().map_err(|_| {
            LinkError::InvalidPose(format!("expected 6 values, got {}", values.len()))
        })?;
        Ok(Self(values))
    }

    pub fn translation(&self) -> na::Vector3<f64> {
        na::Vector3::new(self.0[0], self.0[1], self.0[2])
    }

    pub fn rotation(&self) -> na::Vector3<f64> {
        na::Vector3::new(self.0[3], self.0[4], self.0[5])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_array(self) -> [f64; 6] {
        self.0
    }
}

impl From<[f64; 6]> for Pose {
    fn from(values: [f64; 6]) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_translation_and_rotation() {
        let pose = Pose::new([0.2, -0.6, 0.4, 3.14, 0.0, 0.0]);
        assert_eq!(pose.translation(), na::Vector3::new(0.2, -0.6, 0.4));
        assert_eq!(pose.rotation(), na::Vector3::new(3.14, 0.0, 0.0));
        assert_eq!(Pose::from_parts(&pose.translation(), &pose.rotation()), pose);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Pose::from_slice(&[0.0; 6]).is_ok());
        match Pose::from_slice(&[0.0; 5]) {
            Err(LinkError::InvalidPose(msg)) => assert!(msg.contains("got 5")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
