use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    error::{OrreryError, OrreryResult},
    types::Array3d,
};

/// Presentation color of a body. Carried through the simulation untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    const PALETTE: [Color; 8] = [
        Color(255, 204, 0),
        Color(169, 169, 169),
        Color(230, 190, 138),
        Color(100, 149, 237),
        Color(193, 68, 14),
        Color(216, 202, 157),
        Color(250, 213, 165),
        Color(64, 224, 208),
    ];

    /// Deterministic fallback color for a body without one in the data store.
    pub fn from_palette(index: usize) -> Self {
        Self::PALETTE[index % Self::PALETTE.len()]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Display, EnumString, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Star,
    Planet,
    Satellite,
}

/// A point mass taking part in the simulation.
///
/// Identity and physical attributes are fixed at construction. Only the
/// gravity integrator moves a body, through the crate-visible `position`
/// and `velocity` fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    name: String,
    kind: BodyKind,
    mass_kg: f64,
    radius_km: f64,
    color: Color,
    pub(crate) position: Array3d, // km
    pub(crate) velocity: Array3d, // km/s
}

impl Body {
    pub fn new(
        name: impl Into<String>,
        kind: BodyKind,
        mass_kg: f64,
        radius_km: f64,
        color: Color,
        position: Array3d,
        velocity: Array3d,
    ) -> OrreryResult<Self> {
        let name = name.into();
        if !(mass_kg.is_finite() && mass_kg > 0.0) {
            return Err(OrreryError::invalid(format!(
                "body '{}' has non-positive mass {}",
                name, mass_kg
            )));
        }
        if !(radius_km.is_finite() && radius_km >= 0.0) {
            return Err(OrreryError::invalid(format!(
                "body '{}' has negative radius {}",
                name, radius_km
            )));
        }
        if !position.is_finite() || !velocity.is_finite() {
            return Err(OrreryError::invalid(format!(
                "body '{}' has a non-finite initial state",
                name
            )));
        }

        Ok(Self {
            name,
            kind,
            mass_kg,
            radius_km,
            color,
            position,
            velocity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn position(&self) -> &Array3d {
        &self.position
    }

    pub fn velocity(&self) -> &Array3d {
        &self.velocity
    }
}

/// One entry of the ingested data store as handed to the body registry.
///
/// Every field is optional at the serde level so that the registry, not the
/// parser, decides which fields are required and reports them by name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BodyRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mass_kg: Option<f64>,
    #[serde(default, alias = "meanradius_km")]
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub color: Option<Color>,
    /// Name of the body this one orbits.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub position_km: Option<[f64; 3]>,
    #[serde(default)]
    pub velocity_km_s: Option<[f64; 3]>,
    #[serde(default, alias = "semi_major_axis_km")]
    pub orbital_radius_km: Option<f64>,
    #[serde(default)]
    pub orbital_period_s: Option<f64>,
    #[serde(default)]
    pub eccentricity: Option<f64>,
    #[serde(default)]
    pub inclination_degrees: Option<f64>,
    #[serde(default)]
    pub mean_longitude_degrees: Option<f64>,
    #[serde(default, alias = "longitude_of_perhelion_degrees")]
    pub longitude_of_perihelion_degrees: Option<f64>,
    #[serde(default)]
    pub longitude_of_the_ascending_node_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub moons: BTreeMap<String, BodyRecord>,
}

impl BodyRecord {
    pub fn has_orbit(&self) -> bool {
        self.orbital_radius_km.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_rejects_non_positive_mass() {
        let zero = Body::new(
            "Ghost",
            BodyKind::Planet,
            0.0,
            1.0,
            Color(0, 0, 0),
            Array3d::default(),
            Array3d::default(),
        );
        assert!(matches!(zero, Err(OrreryError::InvalidConfiguration(_))));

        let negative = Body::new(
            "Ghost",
            BodyKind::Planet,
            -5.0,
            1.0,
            Color(0, 0, 0),
            Array3d::default(),
            Array3d::default(),
        );
        assert!(matches!(negative, Err(OrreryError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_body_rejects_non_finite_state() {
        let body = Body::new(
            "Ghost",
            BodyKind::Planet,
            1.0,
            1.0,
            Color(0, 0, 0),
            Array3d::new(f64::NAN, 0.0, 0.0),
            Array3d::default(),
        );
        assert!(body.is_err());
    }

    #[test]
    fn test_color_display_and_palette() {
        assert_eq!(Color(255, 0, 16).to_string(), "#ff0010");
        assert_eq!(Color::from_palette(0), Color::from_palette(8));
    }

    #[test]
    fn test_record_accepts_scraper_field_names() {
        let record: BodyRecord = toml::from_str(
            r#"
            semi_major_axis_km = 57909227.0
            meanradius_km = 2439.4
            mass_kg = 3.30103e23
            longitude_of_perhelion_degrees = 77.45
            "#,
        )
        .unwrap();

        assert_eq!(record.orbital_radius_km, Some(57909227.0));
        assert_eq!(record.radius_km, Some(2439.4));
        assert_eq!(record.longitude_of_perihelion_degrees, Some(77.45));
        assert!(record.has_orbit());
    }
}
