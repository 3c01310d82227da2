use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{trace, warn};

use super::common::{self, CoincidentPair, GravitationalConstant};
use crate::{
    error::{OrreryError, OrreryResult},
    state::SimulationState,
    types::Array3d,
};

#[derive(Display, EnumString, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationScheme {
    /// Velocity-Verlet, two force evaluations per step.
    #[default]
    #[strum(to_string = "verlet", serialize = "velocity-verlet")]
    #[serde(rename = "verlet", alias = "velocity-verlet")]
    VelocityVerlet,
    /// Drift-kick-drift leapfrog, one force evaluation per step.
    #[strum(to_string = "leapfrog")]
    #[serde(rename = "leapfrog")]
    Leapfrog,
    /// Explicit Euler. Not symplectic, orbits spiral outwards. Kept as a
    /// baseline to compare the other schemes against.
    #[strum(to_string = "euler")]
    #[serde(rename = "euler")]
    Euler,
}

/// Advances a [`SimulationState`] by fixed time increments under pairwise
/// Newtonian gravity. This is the only writer of body positions and
/// velocities.
///
/// Units: positions km, velocities km/s, masses kg. The gravitational
/// constant is carried km-scaled (km^3 kg^-1 s^-2), so accelerations come out
/// in km/s^2 without any conversion inside the loop.
#[derive(Debug, Clone)]
pub struct GravityIntegrator {
    scheme: IntegrationScheme,
    g_km: f64,
}

impl GravityIntegrator {
    pub fn new(
        scheme: IntegrationScheme,
        gravitational_constant: GravitationalConstant,
    ) -> OrreryResult<Self> {
        gravitational_constant.validate()?;
        if scheme == IntegrationScheme::Euler {
            warn!("explicit Euler integration does not conserve orbital energy");
        }

        Ok(Self {
            scheme,
            g_km: gravitational_constant.km_scaled(),
        })
    }

    pub fn scheme(&self) -> IntegrationScheme {
        self.scheme
    }

    /// Gravitational constant in km^3 kg^-1 s^-2.
    pub fn g_km(&self) -> f64 {
        self.g_km
    }

    /// Advance `state` by one step of `dt` seconds.
    ///
    /// The new positions and velocities are computed off to the side and
    /// written back only once the whole step succeeded, so on error `state`
    /// is left exactly as it was.
    pub fn step(&self, state: &mut SimulationState, dt: f64) -> OrreryResult<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(OrreryError::invalid(format!(
                "time step must be positive, got {}",
                dt
            )));
        }

        let positions = state.positions();
        let velocities: Vec<Array3d> = state.bodies().iter().map(|b| *b.velocity()).collect();
        let masses = state.masses();

        let (new_positions, new_velocities): (Vec<Array3d>, Vec<Array3d>) = match self.scheme {
            IntegrationScheme::VelocityVerlet => {
                let acc = self.accelerations(state, &positions, &masses)?;
                // p' = p + v dt + a dt^2 / 2
                let new_positions: Vec<Array3d> = positions
                    .iter()
                    .zip(&velocities)
                    .zip(&acc)
                    .map(|((p, v), a)| p + v * dt + a * (0.5 * dt * dt))
                    .collect();
                let new_acc = self.accelerations(state, &new_positions, &masses)?;
                // v' = v + (a + a') dt / 2
                let new_velocities = velocities
                    .iter()
                    .zip(acc.iter().zip(&new_acc))
                    .map(|(v, (a, a_new))| v + (a + a_new) * (0.5 * dt))
                    .collect();
                (new_positions, new_velocities)
            }
            IntegrationScheme::Leapfrog => {
                if let Some(pair) = common::find_coincident(&positions) {
                    return Err(degenerate(state, pair));
                }
                let half_positions: Vec<Array3d> = positions
                    .iter()
                    .zip(&velocities)
                    .map(|(p, v)| p + v * (0.5 * dt))
                    .collect();
                let acc = self.accelerations(state, &half_positions, &masses)?;
                let new_velocities: Vec<Array3d> = velocities
                    .iter()
                    .zip(&acc)
                    .map(|(v, a)| v + a * dt)
                    .collect();
                let new_positions = half_positions
                    .iter()
                    .zip(&new_velocities)
                    .map(|(p, v)| p + v * (0.5 * dt))
                    .collect();
                (new_positions, new_velocities)
            }
            IntegrationScheme::Euler => {
                let acc = self.accelerations(state, &positions, &masses)?;
                let new_positions = positions
                    .iter()
                    .zip(&velocities)
                    .map(|(p, v)| p + v * dt)
                    .collect();
                let new_velocities = velocities
                    .iter()
                    .zip(&acc)
                    .map(|(v, a)| v + a * dt)
                    .collect();
                (new_positions, new_velocities)
            }
        };

        if let Some(index) = new_positions
            .iter()
            .zip(&new_velocities)
            .position(|(p, v)| !p.is_finite() || !v.is_finite())
        {
            return Err(OrreryError::NonFiniteState {
                body: state.bodies()[index].name().to_string(),
            });
        }

        for ((body, position), velocity) in state
            .bodies_mut()
            .iter_mut()
            .zip(new_positions)
            .zip(new_velocities)
        {
            body.position = position;
            body.velocity = velocity;
        }
        state.complete_step(dt);

        trace!(
            step = state.step_count(),
            sim_time_s = state.sim_time_s(),
            "integration step complete"
        );

        Ok(())
    }

    fn accelerations(
        &self,
        state: &SimulationState,
        positions: &[Array3d],
        masses: &[f64],
    ) -> OrreryResult<Vec<Array3d>> {
        common::net_accelerations(positions, masses, self.g_km).map_err(|pair| degenerate(state, pair))
    }
}

fn degenerate(state: &SimulationState, CoincidentPair(i, j): CoincidentPair) -> OrreryError {
    let bodies = state.bodies();
    OrreryError::DegenerateConfiguration {
        first: bodies[i].name().to_string(),
        second: bodies[j].name().to_string(),
    }
}
