use std::f64::consts::TAU;

use crate::{
    bodies::body::BodyRecord,
    error::{OrreryError, OrreryResult},
    types::{self, Array3d},
};

const KEPLER_TOLERANCE: f64 = 1e-12;
const KEPLER_MAX_ITERS: usize = 50;

/// Wrap an angle given in degrees into [0, 360).
pub fn wrap_angle_deg(angle: f64) -> f64 {
    let wrapped = angle % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Classical elements of an orbit relative to its parent body. Angles in
/// degrees, distances in km.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalElements {
    pub semimajor_axis_km: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub ascending_node_deg: f64,
    pub argument_of_perihelion_deg: f64,
    pub mean_anomaly_deg: f64,
    /// Orbital period in seconds when the data store provides it. Only used
    /// for circular orbits, where it fixes the tangential speed.
    pub period_s: Option<f64>,
}

impl OrbitalElements {
    /// Pull orbital elements out of an ingested record. Returns `None` when
    /// the record carries no orbit. Missing angles default to zero, which is
    /// the circular coplanar case.
    pub fn from_record(name: &str, record: &BodyRecord) -> OrreryResult<Option<Self>> {
        let Some(semimajor_axis_km) = record.orbital_radius_km else {
            return Ok(None);
        };
        if !(semimajor_axis_km.is_finite() && semimajor_axis_km > 0.0) {
            return Err(OrreryError::invalid(format!(
                "body '{}' has non-positive orbital radius {}",
                name, semimajor_axis_km
            )));
        }

        let eccentricity = record.eccentricity.unwrap_or(0.0);
        if !(0.0..1.0).contains(&eccentricity) {
            return Err(OrreryError::invalid(format!(
                "body '{}' has eccentricity {} outside of [0, 1)",
                name, eccentricity
            )));
        }

        if let Some(period) = record.orbital_period_s {
            if !(period.is_finite() && period > 0.0) {
                return Err(OrreryError::invalid(format!(
                    "body '{}' has non-positive orbital period {}",
                    name, period
                )));
            }
        }

        let node = record.longitude_of_the_ascending_node_degrees.unwrap_or(0.0);
        let perihelion = record.longitude_of_perihelion_degrees.unwrap_or(node);
        let mean_longitude = record.mean_longitude_degrees.unwrap_or(perihelion);

        Ok(Some(Self {
            semimajor_axis_km,
            eccentricity,
            inclination_deg: record.inclination_degrees.unwrap_or(0.0),
            ascending_node_deg: wrap_angle_deg(node),
            argument_of_perihelion_deg: wrap_angle_deg(perihelion - node),
            mean_anomaly_deg: wrap_angle_deg(mean_longitude - perihelion),
            period_s: record.orbital_period_s,
        }))
    }

    pub fn is_circular(&self) -> bool {
        self.eccentricity == 0.0
    }

    /// Position (km) and velocity (km/s) relative to the parent.
    ///
    /// ### Arguments
    /// * 'mu' - Gravitational parameter of the parent/body pair in km^3/s^2.
    ///
    pub fn to_cartesian(&self, mu: f64) -> (Array3d, Array3d) {
        let a = self.semimajor_axis_km;
        let e = self.eccentricity;
        let ecc_anomaly = eccentric_anomaly(e, self.mean_anomaly_deg.to_radians());
        let (sin_e, cos_e) = ecc_anomaly.sin_cos();
        let root = (1.0 - e * e).sqrt();

        // Perifocal frame, x axis towards perihelion.
        let position_pf = Array3d::new(a * (cos_e - e), a * root * sin_e, 0.0);
        let mean_motion = (mu / a.powi(3)).sqrt();
        let rate = a * mean_motion / (1.0 - e * cos_e);
        let mut velocity_pf = Array3d::new(-rate * sin_e, rate * root * cos_e, 0.0);

        if let (true, Some(period)) = (self.is_circular(), self.period_s) {
            let speed = TAU * a / period;
            velocity_pf = types::normalize(&velocity_pf, None) * speed;
        }

        (
            self.perifocal_to_ecliptic(&position_pf),
            self.perifocal_to_ecliptic(&velocity_pf),
        )
    }

    fn perifocal_to_ecliptic(&self, v: &Array3d) -> Array3d {
        let (sw, cw) = sin_cos_deg!(self.argument_of_perihelion_deg);
        let (sn, cn) = sin_cos_deg!(self.ascending_node_deg);
        let (si, ci) = sin_cos_deg!(self.inclination_deg);

        let r1 = Array3d::new(cw * cn - sw * sn * ci, -sw * cn - cw * sn * ci, 0.0);
        let r2 = Array3d::new(cw * sn + sw * cn * ci, -sw * sn + cw * cn * ci, 0.0);
        let r3 = Array3d::new(sw * si, cw * si, 0.0);

        Array3d {
            x: v.dot(&r1),
            y: v.dot(&r2),
            z: v.dot(&r3),
        }
    }
}

/// Solve Kepler's equation `E - e sin E = M` by Newton iteration.
///
/// ### Arguments
/// * 'e' - Eccentricity in [0, 1)
/// * 'm' - Mean anomaly in radians
///
/// ### Returns
/// The eccentric anomaly in radians.
pub fn eccentric_anomaly(e: f64, m: f64) -> f64 {
    let mut ecc = if e < 0.8 { m } else { std::f64::consts::PI };

    for _ in 0..KEPLER_MAX_ITERS {
        let delta = (ecc - e * ecc.sin() - m) / (1.0 - e * ecc.cos());
        ecc -= delta;
        if delta.abs() < KEPLER_TOLERANCE {
            break;
        }
    }

    ecc
}
