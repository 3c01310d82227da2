use tracing::debug;

use crate::error::{OrreryError, OrreryResult};

/// Converts elapsed wall time into a whole number of fixed-size physics
/// steps.
///
/// Every call adds `elapsed * time_scale` simulated seconds of debt, pays
/// off as many `fixed_dt` steps as the debt covers and carries the remainder
/// into the next call. Simulated time is never dropped or counted twice.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    fixed_dt: f64,                    // Simulated seconds per physics step.
    time_scale: f64,                  // Simulated seconds per wall second.
    max_steps_per_frame: Option<u64>, // Debt beyond this is kept for later frames.
    accumulator: f64,
    total_steps: u64,
    paused: bool,
}

impl SimulationClock {
    pub fn new(fixed_dt: f64, time_scale: f64) -> OrreryResult<Self> {
        if !(fixed_dt.is_finite() && fixed_dt > 0.0) {
            return Err(OrreryError::invalid(format!(
                "fixed_dt must be positive, got {}",
                fixed_dt
            )));
        }
        validate_time_scale(time_scale)?;

        Ok(Self {
            fixed_dt,
            time_scale,
            max_steps_per_frame: None,
            accumulator: 0.0,
            total_steps: 0,
            paused: false,
        })
    }

    /// Cap the number of steps a single call may emit.
    pub fn with_max_steps_per_frame(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps_per_frame = max_steps;
        self
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f64) -> OrreryResult<()> {
        validate_time_scale(time_scale)?;
        self.time_scale = time_scale;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Simulated seconds owed but not yet stepped.
    pub fn pending_time(&self) -> f64 {
        self.accumulator
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Simulated seconds paid out as steps so far.
    pub fn consumed_time(&self) -> f64 {
        self.total_steps as f64 * self.fixed_dt
    }

    /// Add `elapsed_wall_seconds` of wall time and return the number of whole
    /// physics steps to run now. Negative or non-finite elapsed times are
    /// ignored.
    pub fn accumulate(&mut self, elapsed_wall_seconds: f64) -> u64 {
        if !self.paused && elapsed_wall_seconds.is_finite() && elapsed_wall_seconds > 0.0 {
            self.accumulator += elapsed_wall_seconds * self.time_scale;
        }

        let whole_steps = (self.accumulator / self.fixed_dt).floor();
        if whole_steps < 1.0 {
            return 0;
        }

        let mut steps = whole_steps as u64;
        if let Some(max_steps) = self.max_steps_per_frame {
            if steps > max_steps {
                debug!(
                    owed = steps,
                    emitted = max_steps,
                    "step debt exceeds the per-frame cap, carrying the rest"
                );
                steps = max_steps;
            }
        }

        self.accumulator -= steps as f64 * self.fixed_dt;
        self.total_steps += steps;
        steps
    }
}

fn validate_time_scale(time_scale: f64) -> OrreryResult<()> {
    if time_scale.is_finite() && time_scale >= 0.0 {
        Ok(())
    } else {
        Err(OrreryError::invalid(format!(
            "time_scale must be non-negative, got {}",
            time_scale
        )))
    }
}
