use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    bodies::{
        body::BodyRecord,
        registry::{CentralBody, ReferenceFrame, RegistrySource},
    },
    cli::ProgramArgs,
    error::{OrreryError, OrreryResult},
    gravity::{
        common::{GravitationalConstant, GravityUnits},
        integrator::IntegrationScheme,
    },
    output,
};

const JULIAN_YEAR_S: f64 = 365.25 * 86400.0;
// 2000-01-01T12:00:00Z as unix seconds.
const J2000_UNIX_S: i64 = 946_728_000;

/// Everything the simulation needs to know before it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub input_bodies_file: PathBuf,
    pub output_dir: String,
    pub fixed_dt: f64,            // Simulated seconds per physics step.
    pub time_scale: f64,          // Simulated seconds per wall second.
    pub frame_rate: f64,          // Rendered frames per wall second.
    pub duration_s: f64,          // Simulated seconds until the run stops.
    pub write_period_s: f64,      // Minimum simulated seconds between written frames.
    pub max_steps_per_frame: Option<u64>,
    pub gravitational_constant: GravitationalConstant,
    pub integrator: IntegrationScheme,
    pub frame: ReferenceFrame,
    pub central_body: CentralBody, // Used when the data store names no central body.
    pub epoch: DateTime<Utc>,      // Calendar date of simulation time zero.
    pub realtime: bool,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            input_bodies_file: PathBuf::new(),
            output_dir: "output".to_string(),
            fixed_dt: 3600.0,
            time_scale: 10.0 * 86400.0,
            frame_rate: 60.0,
            duration_s: JULIAN_YEAR_S,
            write_period_s: 0.0,
            max_steps_per_frame: None,
            gravitational_constant: GravitationalConstant::default(),
            integrator: IntegrationScheme::default(),
            frame: ReferenceFrame::default(),
            central_body: CentralBody::default(),
            epoch: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(J2000_UNIX_S),
            realtime: false,
        }
    }
}

impl SimulationParameters {
    pub fn validate(&self) -> OrreryResult<()> {
        let positive = |value: f64, what: &str| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(OrreryError::invalid(format!(
                    "{} must be positive, got {}",
                    what, value
                )))
            }
        };

        positive(self.fixed_dt, "fixed_dt")?;
        positive(self.time_scale, "time_scale")?;
        positive(self.frame_rate, "frame_rate")?;
        positive(self.duration_s, "duration")?;
        if !(self.write_period_s.is_finite() && self.write_period_s >= 0.0) {
            return Err(OrreryError::invalid(format!(
                "write_period must not be negative, got {}",
                self.write_period_s
            )));
        }
        if self.max_steps_per_frame == Some(0) {
            return Err(OrreryError::invalid("max_steps_per_frame must be at least 1"));
        }
        positive(self.central_body.mass_kg, "central_body.mass_kg")?;
        // Every written frame carries a calendar epoch, so the whole run has
        // to fit in the calendar.
        output::sim_time_to_epoch(self.epoch, self.duration_s)?;
        self.gravitational_constant.validate()
    }
}

/// Optional TOML configuration file. Every field may be overridden from the
/// command line.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub output_dir: Option<String>,
    pub fixed_dt: Option<f64>,
    pub time_scale: Option<f64>,
    pub frame_rate: Option<f64>,
    pub duration_s: Option<f64>,
    pub write_period_s: Option<f64>,
    pub max_steps_per_frame: Option<u64>,
    pub gravitational_constant: Option<GravitationalConstant>,
    pub integrator: Option<IntegrationScheme>,
    pub frame: Option<ReferenceFrame>,
    pub central_body: Option<CentralBody>,
    pub epoch: Option<DateTime<Utc>>,
    pub realtime: Option<bool>,
}

pub fn read_config_file<P: AsRef<Path>>(path: P) -> OrreryResult<ConfigFile> {
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Build the run parameters. Precedence is command line, then config file,
/// then defaults.
pub fn gather_program_arguments(args: ProgramArgs) -> OrreryResult<SimulationParameters> {
    let file = match &args.config {
        Some(path) => read_config_file(path)?,
        None => ConfigFile::default(),
    };
    let sim_params = merge_parameters(args, file);
    sim_params.validate()?;

    Ok(sim_params)
}

fn merge_parameters(args: ProgramArgs, file: ConfigFile) -> SimulationParameters {
    let defaults = SimulationParameters::default();

    let gravitational_constant = match args.gravitational_constant {
        Some(value) => GravitationalConstant {
            value,
            units: args.g_units.unwrap_or(GravityUnits::Si),
        },
        None => file
            .gravitational_constant
            .unwrap_or(defaults.gravitational_constant),
    };

    SimulationParameters {
        input_bodies_file: args.input,
        output_dir: args.out.or(file.output_dir).unwrap_or(defaults.output_dir),
        fixed_dt: args.fixed_dt.or(file.fixed_dt).unwrap_or(defaults.fixed_dt),
        time_scale: args
            .time_scale
            .or(file.time_scale)
            .unwrap_or(defaults.time_scale),
        frame_rate: args
            .frame_rate
            .or(file.frame_rate)
            .unwrap_or(defaults.frame_rate),
        duration_s: args
            .duration
            .or(file.duration_s)
            .unwrap_or(defaults.duration_s),
        write_period_s: args
            .write_period
            .or(file.write_period_s)
            .unwrap_or(defaults.write_period_s),
        max_steps_per_frame: args.max_steps_per_frame.or(file.max_steps_per_frame),
        gravitational_constant,
        integrator: args
            .integrator
            .or(file.integrator)
            .unwrap_or(defaults.integrator),
        frame: args.frame.or(file.frame).unwrap_or(defaults.frame),
        central_body: file.central_body.unwrap_or(defaults.central_body),
        epoch: args.epoch.or(file.epoch).unwrap_or(defaults.epoch),
        realtime: args.realtime || file.realtime.unwrap_or(defaults.realtime),
    }
}

/// Layout of the ingested body data store. Bodies may be listed
/// (`[[bodies]]`, each with a `name`) or keyed by name under `SolarSystem`,
/// the layout written by the data scraper. Moons nest under their planet in
/// either layout.
#[derive(Deserialize, Debug, Default)]
pub struct DataStore {
    #[serde(default)]
    pub number_of_bodies: Option<usize>,
    #[serde(default)]
    pub bodies: Vec<BodyRecord>,
    #[serde(default, rename = "SolarSystem")]
    pub solar_system: BTreeMap<String, BodyRecord>,
}

impl DataStore {
    pub fn into_registry_source(self) -> RegistrySource {
        let top_level = self.bodies.len() + self.solar_system.len();
        if let Some(expected) = self.number_of_bodies {
            if expected != top_level {
                warn!(
                    expected,
                    found = top_level,
                    "number_of_bodies does not match the bodies in the data store"
                );
            }
        }

        let mut records = Vec::with_capacity(top_level);
        for record in self.bodies {
            flatten_moons(record, &mut records);
        }
        for (name, mut record) in self.solar_system {
            record.name = Some(name);
            flatten_moons(record, &mut records);
        }

        RegistrySource::new(records)
    }
}

/// Push `record` followed by its moons, each moon named by its table key and
/// parented to `record`.
fn flatten_moons(mut record: BodyRecord, records: &mut Vec<BodyRecord>) {
    let moons = std::mem::take(&mut record.moons);
    let parent = record.name.clone();
    records.push(record);

    for (moon_name, mut moon) in moons {
        moon.name = Some(moon_name);
        if moon.parent.is_none() {
            moon.parent = parent.clone();
        }
        flatten_moons(moon, records);
    }
}

/// Read the body data store from disk, TOML unless the file ends in `.json`.
///
/// ### Argument
/// * 'path' - The path to the data store.
///
/// ### Return
/// The records to hand to the body registry, or the IO/parse error.
///
pub fn read_body_records<P: AsRef<Path>>(path: P) -> OrreryResult<RegistrySource> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let store: DataStore = if is_json {
        serde_json::from_str(&contents)?
    } else {
        toml::from_str(&contents)?
    };

    let source = store.into_registry_source();
    info!(
        path = %path.display(),
        records = source.records.len(),
        "read body data store"
    );

    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> ProgramArgs {
        let mut argv = vec!["orrery", "bodies.toml"];
        argv.extend_from_slice(extra);
        ProgramArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let params = merge_parameters(args(&[]), ConfigFile::default());
        assert_eq!(
            params.epoch,
            Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(params.fixed_dt, 3600.0);
        assert_eq!(params.frame_rate, 60.0);
        assert_eq!(params.integrator, IntegrationScheme::VelocityVerlet);
        assert_eq!(params.frame, ReferenceFrame::Barycentric);
        assert_eq!(params.input_bodies_file, PathBuf::from("bodies.toml"));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            fixed_dt = 60.0
            time_scale = 1000.0
            integrator = "leapfrog"
            frame = "heliocentric"
            epoch = "2024-03-20T03:06:00Z"

            [gravitational_constant]
            value = 6.674e-20
            units = "km"
            "#,
        )
        .unwrap();

        let params = merge_parameters(args(&["--step", "30", "--integrator", "euler"]), file);
        assert_eq!(params.fixed_dt, 30.0);
        assert_eq!(params.time_scale, 1000.0);
        assert_eq!(params.integrator, IntegrationScheme::Euler);
        assert_eq!(params.frame, ReferenceFrame::Heliocentric);
        assert_eq!(params.gravitational_constant.units, GravityUnits::Km);
        assert_eq!(
            params.epoch,
            Utc.with_ymd_and_hms(2024, 3, 20, 3, 6, 0).unwrap()
        );
    }

    #[test]
    fn test_central_body_from_config_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [central_body]
            name = "Sol"
            mass_kg = 1.99e30
            "#,
        )
        .unwrap();

        let params = merge_parameters(args(&[]), file);
        assert_eq!(params.central_body.name, "Sol");
        assert_eq!(params.central_body.mass_kg, 1.99e30);
        assert_eq!(params.central_body.radius_km, CentralBody::default().radius_km);

        let defaults = merge_parameters(args(&[]), ConfigFile::default());
        assert_eq!(defaults.central_body, CentralBody::default());
    }

    #[test]
    fn test_config_file_rejects_unknown_keys() {
        assert!(toml::from_str::<ConfigFile>("fixed_step = 1.0").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        for extra in [
            &["--step", "0"][..],
            &["--step=-5"][..],
            &["--time-scale", "0"][..],
            &["--frame-rate", "0"][..],
            &["--max-steps-per-frame", "0"][..],
            &["--gravitational-constant", "0"][..],
            &["--duration", "1e13"][..],
        ] {
            let params = merge_parameters(args(extra), ConfigFile::default());
            assert!(
                matches!(params.validate(), Err(OrreryError::InvalidConfiguration(_))),
                "{:?} should be rejected",
                extra
            );
        }
    }

    #[test]
    fn test_scraper_layout_with_moons() {
        let store: DataStore = toml::from_str(
            r#"
            number_of_bodies = 3

            [SolarSystem.Sun]
            mass_kg = 1.989e30
            meanradius_km = 695700.0

            [SolarSystem.Earth]
            semi_major_axis_km = 149597870.7
            mass_kg = 5.972e24

            [SolarSystem.Earth.moons.Moon]
            semi_major_axis_km = 384400.0
            mass_kg = 7.346e22

            [SolarSystem.Mars]
            semi_major_axis_km = 227939200.0
            mass_kg = 6.417e23
            "#,
        )
        .unwrap();

        let source = store.into_registry_source();
        let names: Vec<_> = source
            .records
            .iter()
            .map(|r| r.name.clone().unwrap())
            .collect();
        assert_eq!(names, ["Earth", "Moon", "Mars", "Sun"]);
        assert_eq!(source.records[1].parent.as_deref(), Some("Earth"));
        assert!(source.records.iter().all(|r| r.moons.is_empty()));
    }

    #[test]
    fn test_scraper_layout_without_a_sun() {
        use crate::bodies::{body::BodyKind, registry};

        let store: DataStore = toml::from_str(
            r#"
            number_of_bodies = 2

            [SolarSystem.Earth]
            semi_major_axis_km = 149598261.2
            eccentricity = 0.01671123
            meanradius_km = 6371.0084
            mass_kg = 5.972170e+24

            [SolarSystem.Mars]
            semi_major_axis_km = 227943822.4
            eccentricity = 0.0933941
            meanradius_km = 3389.5
            mass_kg = 6.41691e+23
            "#,
        )
        .unwrap();

        let state = registry::load(
            &store.into_registry_source(),
            &registry::RegistryOptions::default(),
        )
        .unwrap();
        assert_eq!(state.len(), 3);
        assert_eq!(state.body("Sun").unwrap().kind(), BodyKind::Star);
        assert_eq!(state.body("Mars").unwrap().kind(), BodyKind::Planet);
    }

    #[test]
    fn test_list_layout_keeps_duplicates_for_the_registry() {
        let store: DataStore = toml::from_str(
            r#"
            [[bodies]]
            name = "Sun"
            mass_kg = 1.989e30

            [[bodies]]
            name = "Sun"
            mass_kg = 2.0e30
            "#,
        )
        .unwrap();
        assert_eq!(store.into_registry_source().records.len(), 2);
    }

    #[test]
    fn test_read_json_and_toml_files() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("bodies.json");
        let mut json = fs::File::create(&json_path).unwrap();
        write!(
            json,
            r#"{{"bodies": [{{"name": "Sun", "mass_kg": 1.989e30}},
                             {{"name": "Earth", "mass_kg": 5.972e24, "orbital_radius_km": 1.496e8}}]}}"#
        )
        .unwrap();
        let source = read_body_records(&json_path).unwrap();
        assert_eq!(source.records.len(), 2);
        assert_eq!(source.records[1].orbital_radius_km, Some(1.496e8));

        let toml_path = dir.path().join("bodies.toml");
        fs::write(&toml_path, "[[bodies]]\nname = \"Sun\"\nmass_kg = 1.0\n").unwrap();
        assert_eq!(read_body_records(&toml_path).unwrap().records.len(), 1);

        fs::write(&toml_path, "[[bodies]\n").unwrap();
        assert!(matches!(
            read_body_records(&toml_path),
            Err(OrreryError::Toml(_))
        ));
        assert!(matches!(
            read_body_records(dir.path().join("missing.toml")),
            Err(OrreryError::Io(_))
        ));
    }

    #[test]
    fn test_bundled_data_store() {
        use crate::bodies::{body::BodyKind, registry};
        use crate::gravity::integrator::GravityIntegrator;

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/celestial_bodies_data.toml");
        let source = read_body_records(path).unwrap();
        assert_eq!(source.records.len(), 10);

        let mut state = registry::load(&source, &registry::RegistryOptions::default()).unwrap();
        assert_eq!(state.body("Sun").unwrap().kind(), BodyKind::Star);
        assert_eq!(state.body("Jupiter").unwrap().kind(), BodyKind::Planet);
        assert_eq!(state.body("Moon").unwrap().kind(), BodyKind::Satellite);

        let integrator = GravityIntegrator::new(
            IntegrationScheme::VelocityVerlet,
            GravitationalConstant::default(),
        )
        .unwrap();
        let initial = state.total_energy(integrator.g_km());
        for _ in 0..24 * 30 {
            integrator.step(&mut state, 3600.0).unwrap();
        }
        let drift = ((state.total_energy(integrator.g_km()) - initial) / initial).abs();
        assert!(drift < 1e-6, "drift {}", drift);
    }
}
