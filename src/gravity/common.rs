use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    error::{OrreryError, OrreryResult},
    types::{self, Array3d},
};

// Gravitational constant 6.674×10−11
pub const G: f64 = 6.674e-11;
const KM3_PER_M3: f64 = 1e-9;

/// Units the configured gravitational constant is expressed in.
#[derive(Display, EnumString, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GravityUnits {
    /// m^3 kg^-1 s^-2
    #[default]
    Si,
    /// km^3 kg^-1 s^-2
    Km,
}

/// Gravitational constant as configured by the user. The simulation stores
/// positions in km and velocities in km/s, so every force computation goes
/// through [`GravitationalConstant::km_scaled`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GravitationalConstant {
    pub value: f64,
    #[serde(default)]
    pub units: GravityUnits,
}

impl GravitationalConstant {
    pub fn si(value: f64) -> Self {
        Self {
            value,
            units: GravityUnits::Si,
        }
    }

    /// G in km^3 kg^-1 s^-2.
    pub fn km_scaled(&self) -> f64 {
        match self.units {
            GravityUnits::Si => self.value * KM3_PER_M3,
            GravityUnits::Km => self.value,
        }
    }

    pub fn validate(&self) -> OrreryResult<()> {
        if self.value.is_finite() && self.value > 0.0 {
            Ok(())
        } else {
            Err(OrreryError::invalid(format!(
                "gravitational constant must be positive, got {} ({})",
                self.value, self.units
            )))
        }
    }
}

impl Default for GravitationalConstant {
    fn default() -> Self {
        Self::si(G)
    }
}

/// Indices of two bodies found at the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoincidentPair(pub usize, pub usize);

/// Acceleration field of a point mass.
///
/// ### Arguments
/// * 'distance_vector' - Vector from the attracting mass to the attracted body, km.
/// * 'mass_kg' - Mass of the attracting body.
/// * 'g_km' - Gravitational constant in km^3 kg^-1 s^-2.
///
/// ### Return
/// Acceleration of the attracted body in km/s^2, or `None` when the
/// distance vanishes.
///
pub fn newton_gravitational_field(
    distance_vector: &Array3d,
    mass_kg: f64,
    g_km: f64,
) -> Option<Array3d> {
    let l2_dist = types::l2_norm(distance_vector);
    if l2_dist.powi(3) == 0.0 {
        return None;
    }
    // Calculate unit vector for perturbation
    let unit_vector = types::normalize(distance_vector, Some(l2_dist));
    // Calculate acceleration field using Newton's law of universal gravitation
    Some(unit_vector * (-g_km * (mass_kg / l2_dist.powi(2))))
}

/// Net gravitational acceleration on every body from all other bodies.
///
/// Each body's sum is computed independently (fork-join over bodies) and
/// always in index order of the attracting bodies, so the result does not
/// depend on scheduling.
pub fn net_accelerations(
    positions: &[Array3d],
    masses: &[f64],
    g_km: f64,
) -> Result<Vec<Array3d>, CoincidentPair> {
    debug_assert_eq!(positions.len(), masses.len());

    (0..positions.len())
        .into_par_iter()
        .map(|i| {
            let mut net_acceleration = Array3d::default();
            for (j, (source, mass_kg)) in positions.iter().zip(masses).enumerate() {
                if i == j {
                    continue;
                }
                let distance_vector = positions[i] - source;
                match newton_gravitational_field(&distance_vector, *mass_kg, g_km) {
                    Some(acceleration) => net_acceleration += acceleration,
                    None => return Err(CoincidentPair(i.min(j), i.max(j))),
                }
            }
            Ok(net_acceleration)
        })
        .collect()
}

/// First pair of bodies sharing a position, if any.
pub fn find_coincident(positions: &[Array3d]) -> Option<CoincidentPair> {
    positions.iter().enumerate().find_map(|(i, a)| {
        positions[i + 1..]
            .iter()
            .position(|b| types::l2_norm_squared(&(a - b)) == 0.0)
            .map(|offset| CoincidentPair(i, i + 1 + offset))
    })
}
