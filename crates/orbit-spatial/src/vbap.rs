//! Vector-base amplitude panning
//!
//! The topology builder splits the speaker layout into panning sets: pairs
//! around a circle when every speaker sits at (nearly) the same elevation,
//! triplets covering the sphere otherwise. Triplets are chosen with Pulkki's
//! method: keep every non-degenerate triangle, drop the ones whose edges
//! cross a shorter edge, then drop the ones that enclose another speaker.
//! Each set caches the inverse of its speaker-direction matrix, so a gain
//! lookup is one 3x3 product per candidate.

use crate::{SpatialError, SpatialResult};
use nalgebra::{Matrix2, Matrix3, Vector3};
use orbit_core::{Position, SpeakerData};

/// Elevation spread under which a layout is treated as planar
pub const PLANAR_TOLERANCE_DEG: f32 = 4.9;

/// Minimum volume-to-perimeter ratio of a usable triplet
const MIN_VOL_P_SIDE_LENGTH: f32 = 0.01;

/// Gains above this still count as inside a set
const INSIDE_TOLERANCE: f32 = -1e-4;

/// Tolerance used when testing whether a speaker lies inside a triplet
const ENCLOSED_TOLERANCE: f32 = -0.001;

/// Angular slack, in radians, used by the edge crossing test
const CROSSING_TOLERANCE: f32 = 0.01;

// ═══════════════════════════════════════════════════════════════════════════
// SPEAKER SETS
// ═══════════════════════════════════════════════════════════════════════════

/// Planar or spherical layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Two,
    Three,
}

/// A pair or triplet of speakers with its cached inverse matrix
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerSet {
    outputs: [usize; 3],
    len: usize,
    /// Maps a unit direction to the raw gains of `outputs`
    inverse: Matrix3<f32>,
}

impl SpeakerSet {
    /// Output channels this set pans between
    pub fn outputs(&self) -> &[usize] {
        &self.outputs[..self.len]
    }

    #[inline]
    fn solve(&self, direction: &Vector3<f32>) -> Vector3<f32> {
        self.inverse * direction
    }

    #[inline]
    fn smallest(&self, raw: &Vector3<f32>) -> f32 {
        raw.iter().take(self.len).fold(f32::MAX, |m, &g| m.min(g))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TOPOLOGY
// ═══════════════════════════════════════════════════════════════════════════

/// Precomputed VBAP sets for one layout
#[derive(Debug, Clone)]
pub struct VbapTopology {
    dimension: Dimension,
    sets: Vec<SpeakerSet>,
    /// Every output that takes part in panning
    outputs: Vec<usize>,
    num_outputs: usize,
}

impl VbapTopology {
    /// Build from a speaker layout; direct-out-only speakers are left out
    pub fn build(speakers: &[SpeakerData]) -> SpatialResult<Self> {
        let entries: Vec<(usize, Position)> = speakers
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.direct_out_only)
            .map(|(i, s)| (i, s.position))
            .collect();
        Self::from_positions(&entries, speakers.len())
    }

    /// Build from `(output, position)` pairs.
    ///
    /// `num_outputs` is the length of the gain vectors this topology fills.
    pub fn from_positions(entries: &[(usize, Position)], num_outputs: usize) -> SpatialResult<Self> {
        if entries.len() < 2 {
            return Err(SpatialError::NotEnoughSpeakers {
                needed: 2,
                got: entries.len(),
            });
        }

        let reference = entries[0].1.elevation();
        let planar = entries
            .iter()
            .all(|(_, p)| (p.elevation() - reference).abs() <= PLANAR_TOLERANCE_DEG);

        let (dimension, sets) = if planar {
            (Dimension::Two, build_pairs(entries)?)
        } else {
            (Dimension::Three, build_triplets(entries)?)
        };

        log::debug!(
            "vbap: {:?} topology with {} sets over {} speakers",
            dimension,
            sets.len(),
            entries.len()
        );

        Ok(Self {
            dimension,
            sets,
            outputs: entries.iter().map(|(o, _)| *o).collect(),
            num_outputs,
        })
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn sets(&self) -> &[SpeakerSet] {
        &self.sets
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Compute unit-energy gains for a source position.
    ///
    /// `last_set` remembers the set that last contained this source. When
    /// no set contains the direction it is reused with negative gains
    /// clamped to zero; without history the closest set is used instead.
    pub fn compute_gains(&self, position: &Position, last_set: &mut Option<usize>, gains: &mut [f32]) {
        gains.fill(0.0);

        // Polar angles drive the direction, so a source sitting on the
        // listener still pans where it points.
        let d = position.direction();
        let direction = match self.dimension {
            Dimension::Three => Vector3::new(d.x, d.y, d.z),
            Dimension::Two => {
                let c = d;
                let horizontal = (c.x * c.x + c.y * c.y).sqrt();
                if horizontal < 1e-6 {
                    // Straight above or below a ring: no azimuth to pan to.
                    self.spread_evenly(gains);
                    return;
                }
                Vector3::new(c.x / horizontal, c.y / horizontal, 0.0)
            }
        };

        let mut found = None;
        let mut closest = 0;
        let mut closest_smallest = f32::MIN;
        for (index, set) in self.sets.iter().enumerate() {
            let raw = set.solve(&direction);
            let smallest = set.smallest(&raw);
            if smallest >= INSIDE_TOLERANCE {
                found = Some((index, raw));
                break;
            }
            if smallest > closest_smallest {
                closest_smallest = smallest;
                closest = index;
            }
        }

        let (index, raw) = match found {
            Some((index, raw)) => {
                *last_set = Some(index);
                (index, raw)
            }
            None => {
                let index = last_set.filter(|&i| i < self.sets.len()).unwrap_or(closest);
                (index, self.sets[index].solve(&direction))
            }
        };

        let set = &self.sets[index];
        let mut clamped = [0.0_f32; 3];
        for (dst, &g) in clamped.iter_mut().zip(raw.iter()).take(set.len) {
            *dst = g.max(0.0);
        }
        let norm = clamped.iter().map(|g| g * g).sum::<f32>().sqrt();
        let even = 1.0 / (set.len as f32).sqrt();
        for (&output, &g) in set.outputs().iter().zip(&clamped) {
            if let Some(slot) = gains.get_mut(output) {
                *slot = if norm > 1e-9 { (g / norm).min(1.0) } else { even };
            }
        }
    }

    fn spread_evenly(&self, gains: &mut [f32]) {
        let even = 1.0 / (self.outputs.len() as f32).sqrt();
        for &output in &self.outputs {
            if let Some(slot) = gains.get_mut(output) {
                *slot = even;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 2D PAIRS
// ═══════════════════════════════════════════════════════════════════════════

fn build_pairs(entries: &[(usize, Position)]) -> SpatialResult<Vec<SpeakerSet>> {
    let mut ring: Vec<(usize, f32)> = entries.iter().map(|(o, p)| (*o, p.azimuth())).collect();
    ring.sort_by(|a, b| a.1.total_cmp(&b.1));

    let n = ring.len();
    let mut sets = Vec::with_capacity(n);
    for i in 0..n {
        let j = (i + 1) % n;
        let (out_a, az_a) = ring[i];
        let (out_b, az_b) = ring[j];
        let mut gap = az_b - az_a;
        if j == 0 {
            gap += 360.0;
        }
        if gap <= 1e-3 || gap >= 180.0 - 1e-3 {
            continue;
        }

        let (a, b) = (az_a.to_radians(), az_b.to_radians());
        let matrix = Matrix2::new(a.sin(), b.sin(), a.cos(), b.cos());
        let Some(inv) = matrix.try_inverse() else {
            continue;
        };

        let mut inverse = Matrix3::zeros();
        inverse.fixed_view_mut::<2, 2>(0, 0).copy_from(&inv);
        sets.push(SpeakerSet {
            outputs: [out_a, out_b, 0],
            len: 2,
            inverse,
        });
    }

    if sets.is_empty() {
        return Err(SpatialError::DegenerateLayout(
            "no adjacent speaker pair spans less than 180 degrees".into(),
        ));
    }
    Ok(sets)
}

// ═══════════════════════════════════════════════════════════════════════════
// 3D TRIPLETS
// ═══════════════════════════════════════════════════════════════════════════

fn build_triplets(entries: &[(usize, Position)]) -> SpatialResult<Vec<SpeakerSet>> {
    let n = entries.len();
    if n < 3 {
        return Err(SpatialError::NotEnoughSpeakers { needed: 3, got: n });
    }

    let dirs: Vec<Vector3<f32>> = entries
        .iter()
        .map(|(_, p)| {
            let d = p.direction();
            Vector3::new(d.x, d.y, d.z)
        })
        .collect();

    let mut candidates = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if vol_p_side_length(&dirs[i], &dirs[j], &dirs[k]) > MIN_VOL_P_SIDE_LENGTH {
                    candidates.push([i, j, k]);
                }
            }
        }
    }
    if candidates.is_empty() {
        return Err(SpatialError::DegenerateLayout(
            "speakers are collinear or coplanar with the listener".into(),
        ));
    }

    let connected = remove_crossing_edges(&dirs, &candidates);
    let total = candidates.len();
    candidates.retain(|&[i, j, k]| connected[i * n + j] && connected[i * n + k] && connected[j * n + k]);

    let mut sets = Vec::with_capacity(candidates.len());
    for [i, j, k] in candidates {
        let matrix = Matrix3::from_columns(&[dirs[i], dirs[j], dirs[k]]);
        let Some(inverse) = matrix.try_inverse() else {
            continue;
        };
        let encloses_other = (0..n).filter(|&l| l != i && l != j && l != k).any(|l| {
            let g = inverse * dirs[l];
            g.iter().all(|&v| v >= ENCLOSED_TOLERANCE)
        });
        if encloses_other {
            continue;
        }
        sets.push(SpeakerSet {
            outputs: [entries[i].0, entries[j].0, entries[k].0],
            len: 3,
            inverse,
        });
    }

    log::debug!("vbap: {} of {} candidate triplets kept", sets.len(), total);

    if sets.is_empty() {
        return Err(SpatialError::DegenerateLayout("no valid speaker triplet".into()));
    }
    Ok(sets)
}

/// Volume of the parallelepiped over the sum of the side angles
fn vol_p_side_length(i: &Vector3<f32>, j: &Vector3<f32>, k: &Vector3<f32>) -> f32 {
    let volume = i.cross(j).dot(k).abs();
    let length = angle(i, j) + angle(i, k) + angle(j, k);
    if length > 1e-5 { volume / length } else { 0.0 }
}

fn angle(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let denom = a.norm() * b.norm();
    if denom < 1e-12 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Connection matrix (row-major `n * n`) after removing every edge that
/// crosses a shorter one
fn remove_crossing_edges(dirs: &[Vector3<f32>], candidates: &[[usize; 3]]) -> Vec<bool> {
    let n = dirs.len();
    let mut connected = vec![false; n * n];
    let mut connect = |a: usize, b: usize| {
        connected[a * n + b] = true;
        connected[b * n + a] = true;
    };
    for &[i, j, k] in candidates {
        connect(i, j);
        connect(i, k);
        connect(j, k);
    }

    let mut edges: Vec<(usize, usize, f32)> = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            if connected[i * n + j] {
                edges.push((i, j, angle(&dirs[i], &dirs[j])));
            }
        }
    }
    edges.sort_by(|a, b| a.2.total_cmp(&b.2));

    for &(i, j, _) in &edges {
        if !connected[i * n + j] {
            continue;
        }
        for k in 0..n {
            for l in k + 1..n {
                if !connected[k * n + l] || k == i || k == j || l == i || l == j {
                    continue;
                }
                if edges_cross(&dirs[i], &dirs[j], &dirs[k], &dirs[l]) {
                    connected[k * n + l] = false;
                    connected[l * n + k] = false;
                }
            }
        }
    }
    connected
}

/// Whether great-circle arcs `i-j` and `k-l` intersect
fn edges_cross(i: &Vector3<f32>, j: &Vector3<f32>, k: &Vector3<f32>, l: &Vector3<f32>) -> bool {
    let v3 = i.cross(j).cross(&k.cross(l));
    let len = v3.norm();
    if len < 1e-9 {
        return false;
    }
    let v3 = v3 / len;
    let nv3 = -v3;

    let dist_ij = angle(i, j);
    let dist_kl = angle(k, l);
    let dist_iv3 = angle(i, &v3);
    let dist_jv3 = angle(&v3, j);
    let dist_inv3 = angle(i, &nv3);
    let dist_jnv3 = angle(&nv3, j);
    let dist_kv3 = angle(k, &v3);
    let dist_lv3 = angle(&v3, l);
    let dist_knv3 = angle(k, &nv3);
    let dist_lnv3 = angle(&nv3, l);

    // A speaker sitting on the crossing point is not a crossing.
    let near_endpoint = [
        dist_iv3, dist_jv3, dist_kv3, dist_lv3, dist_inv3, dist_jnv3, dist_knv3, dist_lnv3,
    ]
    .iter()
    .any(|d| d.abs() <= CROSSING_TOLERANCE);
    if near_endpoint {
        return false;
    }

    let on_both = |di: f32, dj: f32, dk: f32, dl: f32| {
        (dist_ij - (di + dj)).abs() <= CROSSING_TOLERANCE && (dist_kl - (dk + dl)).abs() <= CROSSING_TOLERANCE
    };
    on_both(dist_iv3, dist_jv3, dist_kv3, dist_lv3) || on_both(dist_inv3, dist_jnv3, dist_knv3, dist_lnv3)
}
