use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::iter;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

use super::{
    body::{Body, BodyKind, BodyRecord, Color},
    elements::OrbitalElements,
};
use crate::{
    error::{OrreryError, OrreryResult},
    gravity::common::GravitationalConstant,
    state::SimulationState,
    types::Array3d,
};

/// Origin of the simulation coordinate frame.
#[derive(Display, EnumString, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReferenceFrame {
    /// Central body at the origin, as loaded.
    Heliocentric,
    /// Centre of mass at the origin with zero total momentum.
    #[default]
    Barycentric,
}

/// Ingested body records in data-store order. Names live inside the
/// records so that duplicate entries can be detected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySource {
    pub records: Vec<BodyRecord>,
}

impl RegistrySource {
    pub fn new(records: Vec<BodyRecord>) -> Self {
        Self { records }
    }
}

/// Primary placed at the origin when bodies orbit the centre of the system
/// but no record describes it, as in the scraper's planet-only output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CentralBody {
    pub name: String,
    pub mass_kg: f64,
    pub radius_km: f64,
}

impl Default for CentralBody {
    fn default() -> Self {
        Self {
            name: "Sun".to_string(),
            mass_kg: 1.989e30,
            radius_km: 695_700.0,
        }
    }
}

impl CentralBody {
    fn to_record(&self) -> BodyRecord {
        BodyRecord {
            name: Some(self.name.clone()),
            mass_kg: Some(self.mass_kg),
            radius_km: Some(self.radius_km),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub gravitational_constant: GravitationalConstant,
    pub frame: ReferenceFrame,
    /// `None` turns a missing central body into an error.
    pub implicit_central: Option<CentralBody>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            gravitational_constant: GravitationalConstant::default(),
            frame: ReferenceFrame::default(),
            implicit_central: Some(CentralBody::default()),
        }
    }
}

fn is_central(record: &BodyRecord) -> bool {
    !record.has_orbit() && record.position_km.is_none()
}

/// Prepend `central` when some record orbits the central body and none
/// qualifies as one.
fn with_implicit_central<'a>(
    records: &'a [BodyRecord],
    central: Option<&CentralBody>,
) -> Cow<'a, [BodyRecord]> {
    let needs_central = records
        .iter()
        .any(|r| r.has_orbit() && r.parent.is_none() && r.position_km.is_none());

    match central {
        Some(central) if needs_central && !records.iter().any(is_central) => {
            info!(
                body = %central.name,
                mass_kg = central.mass_kg,
                "data store has no central body, placing one at the origin"
            );
            Cow::Owned(
                iter::once(central.to_record())
                    .chain(records.iter().cloned())
                    .collect(),
            )
        }
        _ => Cow::Borrowed(records),
    }
}

/// Absolute initial state of one record plus how deep it sits in the
/// parent chain.
#[derive(Clone, Copy)]
struct Resolved {
    position: Array3d,
    velocity: Array3d,
    depth: usize,
}

struct Resolver<'a> {
    records: &'a [BodyRecord],
    names: &'a [&'a str],
    masses: &'a [f64],
    index_of: HashMap<&'a str, usize>,
    central: Option<usize>,
    g_km: f64,
    resolved: Vec<Option<Resolved>>,
    visiting: HashSet<usize>,
}

impl<'a> Resolver<'a> {
    /// Parent a record is placed relative to, if any.
    fn parent_of(&self, index: usize) -> OrreryResult<Option<usize>> {
        let record = &self.records[index];
        let name = self.names[index];
        match &record.parent {
            Some(parent) => match self.index_of.get(parent.trim()) {
                Some(&parent_index) if parent_index != index => Ok(Some(parent_index)),
                Some(_) => Err(OrreryError::invalid(format!("body '{}' orbits itself", name))),
                None => Err(OrreryError::invalid(format!(
                    "body '{}' orbits unknown body '{}'",
                    name, parent
                ))),
            },
            None if record.position_km.is_none() && record.has_orbit() => match self.central {
                Some(central) if central != index => Ok(Some(central)),
                _ => Err(OrreryError::invalid(format!(
                    "body '{}' has an orbit but there is no central body to orbit",
                    name
                ))),
            },
            None => Ok(None),
        }
    }

    fn resolve(&mut self, index: usize) -> OrreryResult<Resolved> {
        if let Some(resolved) = self.resolved[index] {
            return Ok(resolved);
        }
        if !self.visiting.insert(index) {
            return Err(OrreryError::invalid(format!(
                "parent chain of body '{}' forms a cycle",
                self.names[index]
            )));
        }

        let records = self.records;
        let record = &records[index];
        let name = self.names[index];
        let parent = match self.parent_of(index)? {
            Some(parent_index) => Some((parent_index, self.resolve(parent_index)?)),
            None => None,
        };
        let (origin, origin_velocity, depth) = match parent {
            Some((_, p)) => (p.position, p.velocity, p.depth + 1),
            None => (Array3d::default(), Array3d::default(), 0),
        };

        let (relative_position, relative_velocity) = if let Some(position) = record.position_km {
            let velocity = record.velocity_km_s.unwrap_or_default();
            (Array3d::from(position), Array3d::from(velocity))
        } else if let Some(elements) = OrbitalElements::from_record(name, record)? {
            let parent_mass = parent.map(|(i, _)| self.masses[i]).unwrap_or(0.0);
            let mu = self.g_km * (parent_mass + self.masses[index]);
            elements.to_cartesian(mu)
        } else {
            (Array3d::default(), Array3d::default())
        };

        let resolved = Resolved {
            position: origin + relative_position,
            velocity: origin_velocity + relative_velocity,
            depth,
        };
        self.visiting.remove(&index);
        self.resolved[index] = Some(resolved);

        Ok(resolved)
    }
}

/// Build the initial simulation state from ingested records.
///
/// Validation happens before any body is built: every record needs a
/// `name` and a `mass_kg`, and names must be unique. Initial states are
/// taken from, in order of preference, an explicit `position_km` (relative
/// to the parent when one is named), orbital elements around the parent or
/// the central body, or the origin at rest. The central body is the first
/// record with neither an orbit nor an explicit position, or the
/// `implicit_central` body when no record qualifies and one is needed.
///
/// No I/O happens here; reading the data store is the job of `input`.
pub fn load(source: &RegistrySource, options: &RegistryOptions) -> OrreryResult<SimulationState> {
    options.gravitational_constant.validate()?;
    let owned = with_implicit_central(&source.records, options.implicit_central.as_ref());
    let records: &[BodyRecord] = &owned;

    let mut names: Vec<&str> = Vec::with_capacity(records.len());
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let name = match record.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(OrreryError::MissingField {
                    body: format!("#{}", index + 1),
                    field: "name",
                })
            }
        };
        if index_of.insert(name, index).is_some() {
            return Err(OrreryError::DuplicateName(name.to_string()));
        }
        names.push(name);
    }

    let masses = records
        .iter()
        .zip(&names)
        .map(|(record, name)| {
            record.mass_kg.ok_or_else(|| OrreryError::MissingField {
                body: name.to_string(),
                field: "mass_kg",
            })
        })
        .collect::<OrreryResult<Vec<f64>>>()?;

    let central = records.iter().position(is_central);

    let mut resolver = Resolver {
        records,
        names: &names,
        masses: &masses,
        index_of,
        central,
        g_km: options.gravitational_constant.km_scaled(),
        resolved: vec![None; records.len()],
        visiting: HashSet::new(),
    };

    let mut bodies = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let resolved = resolver.resolve(index)?;
        let kind = match (Some(index) == central, resolved.depth) {
            (true, _) => BodyKind::Star,
            (false, 0 | 1) => BodyKind::Planet,
            (false, _) => BodyKind::Satellite,
        };
        debug!(body = names[index], %kind, depth = resolved.depth, "resolved initial state");

        bodies.push(Body::new(
            names[index],
            kind,
            masses[index],
            record.radius_km.unwrap_or(0.0),
            record.color.unwrap_or_else(|| Color::from_palette(index)),
            resolved.position,
            resolved.velocity,
        )?);
    }

    let mut state = SimulationState::new(bodies)?;
    if options.frame == ReferenceFrame::Barycentric {
        state.recenter_on_barycenter();
    }

    info!(
        bodies = state.len(),
        frame = %options.frame,
        central = central.map(|i| names[i]).unwrap_or("none"),
        "body registry loaded"
    );

    Ok(state)
}
