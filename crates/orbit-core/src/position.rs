//! Dual polar/cartesian positions
//!
//! Axis convention: x right, y front, z up. Azimuth 0° points to the front,
//! positive azimuth turns right. Elevation is positive upwards.

use serde::{Deserialize, Serialize};

/// Lengths under this are treated as the origin
const ORIGIN_EPSILON: f32 = 1e-10;

/// Cartesian vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartesianVector {
    /// Left/right, positive = right
    pub x: f32,
    /// Back/front, positive = front
    pub y: f32,
    /// Down/up, positive = up
    pub z: f32,
}

impl CartesianVector {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector in the same direction; the origin maps to straight ahead
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len < ORIGIN_EPSILON {
            return Self::new(0.0, 1.0, 0.0);
        }
        Self::new(self.x / len, self.y / len, self.z / len)
    }

    pub fn distance_to(&self, other: &Self) -> f32 {
        Self::new(other.x - self.x, other.y - self.y, other.z - self.z).length()
    }

    fn to_polar(self) -> PolarVector {
        let length = self.length();
        if length < ORIGIN_EPSILON {
            return PolarVector::new(0.0, 0.0, 0.0);
        }
        PolarVector {
            azimuth: self.x.atan2(self.y).to_degrees(),
            elevation: (self.z / length).clamp(-1.0, 1.0).asin().to_degrees(),
            length,
        }
    }
}

/// Polar vector, angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolarVector {
    /// Horizontal angle, (-180, 180]
    pub azimuth: f32,
    /// Vertical angle, [-90, 90]
    pub elevation: f32,
    /// Distance from the listener, never negative
    pub length: f32,
}

impl PolarVector {
    pub const fn new(azimuth: f32, elevation: f32, length: f32) -> Self {
        Self {
            azimuth,
            elevation,
            length,
        }
    }

    /// Wrap azimuth, clamp elevation and length into their valid ranges
    fn sanitized(self) -> Self {
        let mut azimuth = self.azimuth % 360.0;
        if azimuth > 180.0 {
            azimuth -= 360.0;
        } else if azimuth <= -180.0 {
            azimuth += 360.0;
        }
        Self {
            azimuth,
            elevation: self.elevation.clamp(-90.0, 90.0),
            length: self.length.max(0.0),
        }
    }

    fn to_cartesian(self) -> CartesianVector {
        let az = self.azimuth.to_radians();
        let el = self.elevation.to_radians();
        let cos_el = el.cos();
        CartesianVector::new(
            self.length * az.sin() * cos_el,
            self.length * az.cos() * cos_el,
            self.length * el.sin(),
        )
    }
}

/// A position kept in both representations.
///
/// Every mutator regenerates the other representation, so the two views
/// never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PolarVector", into = "PolarVector")]
pub struct Position {
    polar: PolarVector,
    cartesian: CartesianVector,
}

impl Position {
    /// Create from azimuth/elevation in degrees and a length
    pub fn from_polar(azimuth: f32, elevation: f32, length: f32) -> Self {
        PolarVector::new(azimuth, elevation, length).into()
    }

    pub fn from_cartesian(x: f32, y: f32, z: f32) -> Self {
        CartesianVector::new(x, y, z).into()
    }

    /// Listener position
    pub fn origin() -> Self {
        Self::from_cartesian(0.0, 0.0, 0.0)
    }

    #[inline]
    pub fn polar(&self) -> PolarVector {
        self.polar
    }

    #[inline]
    pub fn cartesian(&self) -> CartesianVector {
        self.cartesian
    }

    #[inline]
    pub fn azimuth(&self) -> f32 {
        self.polar.azimuth
    }

    #[inline]
    pub fn elevation(&self) -> f32 {
        self.polar.elevation
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.polar.length
    }

    /// Unit direction vector, taken from the polar angles so it stays
    /// defined at zero length
    pub fn direction(&self) -> CartesianVector {
        self.normalized().cartesian()
    }

    pub fn set_polar(&mut self, polar: PolarVector) {
        *self = polar.into();
    }

    pub fn set_cartesian(&mut self, cartesian: CartesianVector) {
        *self = cartesian.into();
    }

    pub fn set_azimuth(&mut self, azimuth: f32) {
        self.set_polar(PolarVector {
            azimuth,
            ..self.polar
        });
    }

    pub fn set_elevation(&mut self, elevation: f32) {
        self.set_polar(PolarVector {
            elevation,
            ..self.polar
        });
    }

    pub fn set_length(&mut self, length: f32) {
        self.set_polar(PolarVector {
            length,
            ..self.polar
        });
    }

    pub fn set_x(&mut self, x: f32) {
        self.set_cartesian(CartesianVector { x, ..self.cartesian });
    }

    pub fn set_y(&mut self, y: f32) {
        self.set_cartesian(CartesianVector { y, ..self.cartesian });
    }

    pub fn set_z(&mut self, z: f32) {
        self.set_cartesian(CartesianVector { z, ..self.cartesian });
    }

    /// Same direction, unit length
    pub fn normalized(&self) -> Self {
        Self::from_polar(self.polar.azimuth, self.polar.elevation, 1.0)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::from_polar(0.0, 0.0, 1.0)
    }
}

impl From<PolarVector> for Position {
    fn from(polar: PolarVector) -> Self {
        let polar = polar.sanitized();
        Self {
            polar,
            cartesian: polar.to_cartesian(),
        }
    }
}

impl From<CartesianVector> for Position {
    fn from(cartesian: CartesianVector) -> Self {
        Self {
            polar: cartesian.to_polar(),
            cartesian,
        }
    }
}

impl From<Position> for PolarVector {
    fn from(position: Position) -> Self {
        position.polar
    }
}
