//! Field panning
//!
//! Speakers are treated as points inside a box. A source is clamped into the
//! box and every speaker within the field radius of it receives a weight
//! that falls smoothly to zero at the radius edge:
//!
//! ```text
//! w(d) = (1 - (d / R)^2)^2   for d < R
//! w(d) = 0                   otherwise
//! ```
//!
//! The weights are then scaled to unit energy. `R` is derived from the
//! layout so that every point of the box has at least one speaker well
//! inside the field, which keeps the normalization away from zero and the
//! gains continuous.

use crate::{SpatialError, SpatialResult};
use orbit_core::{CartesianVector, Position, SpeakerData};

/// Grid resolution per axis used to measure layout coverage
const COVERAGE_STEPS: usize = 9;

/// Field radius relative to the worst-case nearest-speaker distance
pub const FIELD_RADIUS_SCALE: f32 = 1.25;

/// Precomputed field for one layout
#[derive(Debug, Clone)]
pub struct LbapField {
    speakers: Vec<(usize, CartesianVector)>,
    min: CartesianVector,
    max: CartesianVector,
    radius: f32,
    num_outputs: usize,
}

impl LbapField {
    /// Build from a speaker layout; direct-out-only speakers are left out
    pub fn build(speakers: &[SpeakerData]) -> SpatialResult<Self> {
        let entries: Vec<(usize, CartesianVector)> = speakers
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.direct_out_only)
            .map(|(i, s)| (i, s.position.cartesian()))
            .collect();

        if entries.len() < 2 {
            return Err(SpatialError::NotEnoughSpeakers {
                needed: 2,
                got: entries.len(),
            });
        }

        let mut min = entries[0].1;
        let mut max = entries[0].1;
        for (_, p) in &entries {
            min = CartesianVector::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = CartesianVector::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        if min.distance_to(&max) < 1e-6 {
            return Err(SpatialError::DegenerateLayout(
                "all speakers share the same position".into(),
            ));
        }

        let mut field = Self {
            speakers: entries,
            min,
            max,
            radius: 0.0,
            num_outputs: speakers.len(),
        };
        field.radius = field.coverage_radius() * FIELD_RADIUS_SCALE;

        log::debug!(
            "lbap: {} speakers, field radius {:.3}",
            field.speakers.len(),
            field.radius
        );
        Ok(field)
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Compute unit-energy gains for a source position
    pub fn compute_gains(&self, position: &Position, gains: &mut [f32]) {
        gains.fill(0.0);

        let p = self.clamp(position.cartesian());
        let mut energy = 0.0;
        for &(output, speaker) in &self.speakers {
            let w = self.weight(p.distance_to(&speaker));
            if let Some(slot) = gains.get_mut(output) {
                *slot = w;
                energy += w * w;
            }
        }

        if energy > 0.0 {
            let norm = energy.sqrt();
            for g in gains.iter_mut() {
                *g /= norm;
            }
        }
    }

    #[inline]
    fn weight(&self, distance: f32) -> f32 {
        if distance >= self.radius {
            return 0.0;
        }
        let r = distance / self.radius;
        let w = 1.0 - r * r;
        w * w
    }

    fn clamp(&self, p: CartesianVector) -> CartesianVector {
        CartesianVector::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Largest distance from any point of the box to its nearest speaker,
    /// measured on a grid and padded by half a grid cell diagonal.
    fn coverage_radius(&self) -> f32 {
        let axis = |lo: f32, hi: f32| -> (usize, f32) {
            if hi - lo < 1e-6 {
                (1, 0.0)
            } else {
                (COVERAGE_STEPS, (hi - lo) / (COVERAGE_STEPS - 1) as f32)
            }
        };
        let (nx, dx) = axis(self.min.x, self.max.x);
        let (ny, dy) = axis(self.min.y, self.max.y);
        let (nz, dz) = axis(self.min.z, self.max.z);

        let mut worst = 0.0_f32;
        for ix in 0..nx {
            for iy in 0..ny {
                for iz in 0..nz {
                    let point = CartesianVector::new(
                        self.min.x + ix as f32 * dx,
                        self.min.y + iy as f32 * dy,
                        self.min.z + iz as f32 * dz,
                    );
                    let nearest = self
                        .speakers
                        .iter()
                        .map(|(_, s)| point.distance_to(s))
                        .fold(f32::MAX, f32::min);
                    worst = worst.max(nearest);
                }
            }
        }

        let half_cell = 0.5 * (dx * dx + dy * dy + dz * dz).sqrt();
        worst + half_cell
    }
}
