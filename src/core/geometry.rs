//! Angle conversion and fixed-size rotation matrices

/// Compass and tilt sensors report hundredths of a degree
pub fn centidegrees_to_radians(centidegrees: f64) -> f64 {
    (centidegrees / 100.0).to_radians()
}

/// Three-component vector in a right-handed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

/// Row-major 3x3 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f64; 3]; 3],
}

impl Mat3 {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Rotation about the vertical axis by the compass heading
    pub fn heading(heading_rad: f64) -> Self {
        let (s, c) = heading_rad.sin_cos();
        Self {
            m: [[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Rotation about the instrument x axis
    pub fn pitch(pitch_rad: f64) -> Self {
        let (s, c) = pitch_rad.sin_cos();
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        }
    }

    /// Rotation about the instrument y axis
    pub fn roll(roll_rad: f64) -> Self {
        let (s, c) = roll_rad.sin_cos();
        Self {
            m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    /// Instrument-to-earth rotation `heading · pitch · roll`
    pub fn attitude(heading_rad: f64, pitch_rad: f64, roll_rad: f64) -> Self {
        Self::heading(heading_rad)
            .mul_mat(&Self::pitch(pitch_rad))
            .mul_mat(&Self::roll(roll_rad))
    }

    pub fn mul_vec(&self, v: &Vec3) -> Vec3 {
        let m = &self.m;
        Vec3 {
            x: m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            y: m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            z: m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        }
    }

    pub fn mul_mat(&self, other: &Self) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * other.m[k][j]).sum();
            }
        }
        Self { m: out }
    }

    pub fn transpose(&self) -> Self {
        let m = &self.m;
        Self {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }
}

/// Tilt sensors measure pitch and roll independently; the rotation needs the
/// pitch projected through the roll angle.
pub fn effective_pitch(pitch_rad: f64, roll_rad: f64) -> f64 {
    (pitch_rad.tan() * roll_rad.cos()).atan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centidegree_conversion() {
        assert_relative_eq!(centidegrees_to_radians(18000.0), std::f64::consts::PI);
        assert_relative_eq!(centidegrees_to_radians(-9000.0), -std::f64::consts::FRAC_PI_2);
        assert_eq!(centidegrees_to_radians(0.0), 0.0);
    }

    #[test]
    fn test_zero_attitude_is_identity() {
        let m = Mat3::attitude(0.0, 0.0, 0.0);
        let id = Mat3::identity();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(m.m[i][j], id.m[i][j]);
            }
        }
    }

    #[test]
    fn test_attitude_is_orthonormal() {
        let m = Mat3::attitude(1.7, 0.05, -0.3);
        let product = m.mul_mat(&m.transpose());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(product.m[i][j], expected, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_heading_rotates_north_to_east() {
        // Instrument y axis pointing east (heading 90) maps to earth east
        let m = Mat3::heading(90f64.to_radians());
        let v = m.mul_vec(&Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.magnitude(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_effective_pitch() {
        assert_relative_eq!(effective_pitch(0.1, 0.0), 0.1, epsilon = 1e-12);
        assert_relative_eq!(effective_pitch(0.1, std::f64::consts::PI), -0.1, epsilon = 1e-12);
    }
}
