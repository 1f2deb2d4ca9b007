//! Particle-swarm global minimisation over a box.

use nalgebra::DVector;
use tracing::{debug, trace};

use super::rng::BullardGenerator;
use crate::error::{MathError, MathResult};
use crate::function::MultipleVarFunction;

/// Inertia weight of the constriction update.
const INERTIA: f64 = 0.72;
/// Cognitive and social acceleration coefficients.
const ACCELERATION: f64 = 1.193;
/// Upper bound on the number of pre-sampling grid nodes.
pub const MAX_GRID_NODES: usize = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct PsoConfig {
    pub nb_particles: usize,
    pub nb_iterations: usize,
    pub seed: u32,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            nb_particles: 32,
            nb_iterations: 100,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Particle {
    position: DVector<f64>,
    velocity: DVector<f64>,
    value: f64,
    best_position: DVector<f64>,
    best_value: f64,
}

/// Result of a swarm search.
#[derive(Debug, Clone, PartialEq)]
pub struct PsoResult {
    done: bool,
    location: DVector<f64>,
    minimum: f64,
    iterations: usize,
    particles: Vec<DVector<f64>>,
}

impl PsoResult {
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn location(&self) -> MathResult<&DVector<f64>> {
        if self.done { Ok(&self.location) } else { Err(MathError::NotDone) }
    }

    pub fn minimum(&self) -> MathResult<f64> {
        if self.done { Ok(self.minimum) } else { Err(MathError::NotDone) }
    }

    pub fn nb_iterations(&self) -> usize {
        self.iterations
    }

    /// Final particle positions.
    pub fn particles(&self) -> &[DVector<f64>] {
        &self.particles
    }
}

#[derive(Debug, Clone)]
pub struct Pso {
    lower: DVector<f64>,
    upper: DVector<f64>,
    steps: DVector<f64>,
    config: PsoConfig,
}

impl Pso {
    /// `steps` defines the pre-sampling grid spacing per dimension.
    pub fn new(
        lower: DVector<f64>,
        upper: DVector<f64>,
        steps: DVector<f64>,
        config: PsoConfig,
    ) -> MathResult<Self> {
        let n = lower.len();
        for found in [upper.len(), steps.len()] {
            if found != n {
                return Err(MathError::DimensionMismatch { expected: n, found });
            }
        }
        for i in 0..n {
            if !(lower[i] <= upper[i]) {
                return Err(MathError::InvalidBounds {
                    lower: lower[i],
                    upper: upper[i],
                });
            }
            if !(steps[i] > 0.0) {
                return Err(MathError::InvalidParameter {
                    name: "steps",
                    reason: format!("step {i} must be positive, got {}", steps[i]),
                });
            }
        }
        if config.nb_particles == 0 {
            return Err(MathError::InvalidParameter {
                name: "nb_particles",
                reason: "at least one particle is required".into(),
            });
        }
        if grid_counts(&lower, &upper, &steps).is_none() {
            return Err(MathError::InvalidParameter {
                name: "steps",
                reason: format!("sampling grid exceeds {MAX_GRID_NODES} nodes"),
            });
        }
        Ok(Self {
            lower,
            upper,
            steps,
            config,
        })
    }

    pub fn perform<F: MultipleVarFunction + ?Sized>(&self, f: &F) -> MathResult<PsoResult> {
        let n = self.lower.len();
        if f.nb_variables() != n {
            return Err(MathError::DimensionMismatch {
                expected: n,
                found: f.nb_variables(),
            });
        }
        let mut rng = BullardGenerator::new(self.config.seed);
        let mut swarm = self.initial_swarm(f, &mut rng);

        let Some(mut global) = swarm
            .iter()
            .filter(|p| p.best_value.is_finite())
            .min_by(|a, b| a.best_value.total_cmp(&b.best_value))
            .map(|p| (p.best_position.clone(), p.best_value))
        else {
            debug!("no particle could be evaluated");
            return Ok(PsoResult {
                done: false,
                location: DVector::zeros(n),
                minimum: f64::NAN,
                iterations: 0,
                particles: swarm.into_iter().map(|p| p.position).collect(),
            });
        };

        for iteration in 1..=self.config.nb_iterations {
            for particle in swarm.iter_mut() {
                for i in 0..n {
                    let r1 = rng.next_real();
                    let r2 = rng.next_real();
                    let x = particle.position[i];
                    let v = INERTIA * particle.velocity[i]
                        + ACCELERATION * r1 * (particle.best_position[i] - x)
                        + ACCELERATION * r2 * (global.0[i] - x);
                    let moved = x + v;
                    if moved < self.lower[i] {
                        particle.position[i] = self.lower[i];
                        particle.velocity[i] = 0.0;
                    } else if moved > self.upper[i] {
                        particle.position[i] = self.upper[i];
                        particle.velocity[i] = 0.0;
                    } else {
                        particle.position[i] = moved;
                        particle.velocity[i] = v;
                    }
                }
                particle.value = f.value(&particle.position).unwrap_or(f64::INFINITY);
                if particle.value < particle.best_value {
                    particle.best_value = particle.value;
                    particle.best_position.copy_from(&particle.position);
                }
                if particle.value < global.1 {
                    global = (particle.position.clone(), particle.value);
                }
            }
            trace!(iteration, best = global.1, "pso iteration");
        }

        debug!(minimum = global.1, "pso finished");
        Ok(PsoResult {
            done: true,
            location: global.0,
            minimum: global.1,
            iterations: self.config.nb_iterations,
            particles: swarm.into_iter().map(|p| p.position).collect(),
        })
    }

    /// Best grid nodes as starting particles, topped up with random points
    /// when the grid has fewer nodes than particles.
    fn initial_swarm<F: MultipleVarFunction + ?Sized>(
        &self,
        f: &F,
        rng: &mut BullardGenerator,
    ) -> Vec<Particle> {
        let n = self.lower.len();
        // Checked in `new`.
        let counts = grid_counts(&self.lower, &self.upper, &self.steps).unwrap_or_else(|| vec![1; n]);
        let total: usize = counts.iter().product();

        let mut nodes: Vec<(f64, DVector<f64>)> = Vec::with_capacity(total);
        let mut index = vec![0_usize; n];
        for _ in 0..total {
            let point = DVector::from_fn(n, |i, _| {
                (self.lower[i] + index[i] as f64 * self.steps[i]).min(self.upper[i])
            });
            let value = f.value(&point).unwrap_or(f64::INFINITY);
            nodes.push((value, point));
            // Odometer increment over the grid.
            for (i, idx) in index.iter_mut().enumerate() {
                *idx += 1;
                if *idx < counts[i] {
                    break;
                }
                *idx = 0;
            }
        }
        nodes.sort_by(|a, b| a.0.total_cmp(&b.0));
        nodes.truncate(self.config.nb_particles);

        while nodes.len() < self.config.nb_particles {
            let point = DVector::from_fn(n, |i, _| {
                self.lower[i] + rng.next_real() * (self.upper[i] - self.lower[i])
            });
            let value = f.value(&point).unwrap_or(f64::INFINITY);
            nodes.push((value, point));
        }

        nodes
            .into_iter()
            .map(|(value, position)| Particle {
                velocity: DVector::from_fn(n, |i, _| (rng.next_real() - 0.5) * self.steps[i]),
                best_position: position.clone(),
                best_value: value,
                position,
                value,
            })
            .collect()
    }
}

/// Grid nodes per dimension, `None` when the grid would exceed
/// [`MAX_GRID_NODES`] or a span is not finite.
fn grid_counts(lower: &DVector<f64>, upper: &DVector<f64>, steps: &DVector<f64>) -> Option<Vec<usize>> {
    let mut total = 1_usize;
    let mut counts = Vec::with_capacity(lower.len());
    for ((lo, hi), step) in lower.iter().zip(upper.iter()).zip(steps.iter()) {
        let nodes = ((hi - lo) / step).floor() + 1.0;
        if !nodes.is_finite() || nodes > MAX_GRID_NODES as f64 {
            return None;
        }
        let count = nodes as usize;
        total = total.checked_mul(count).filter(|&t| t <= MAX_GRID_NODES)?;
        counts.push(count);
    }
    Some(counts)
}
