use log::debug;
use nalgebra::Vector3;
use rand::prelude::*;
use rayon::prelude::*;

use crate::SimulationParameters;

/// Spawn positions are sampled per axis from `[-SPAWN_BOUND, SPAWN_BOUND)`.
pub const SPAWN_BOUND: f32 = 4.0;
/// Upper bound for the x component of a spawned velocity.
pub const MAX_VELOCITY_SAMPLE: f32 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Boid {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    /// Flock group, 0 or 1, fixed at creation. Group 0 drifts right over
    /// time, group 1 left.
    pub group: u8,
}

impl Boid {
    pub fn new(position: Vector3<f32>, velocity: Vector3<f32>, group: u8) -> Self {
        Boid {
            position,
            velocity,
            group,
        }
    }
}

/// The population of boids and the logic to seed and advance it.
///
/// One `advance` call is one frame: every boid steers against a fixed view
/// of the whole flock, then the boundary turns are applied, then positions
/// integrate. The renderer only ever sees [`Flock::snapshot`].
pub struct Flock {
    boids: Vec<Boid>,
}

impl Flock {
    /// Creates a flock of `total_boids` freshly sampled boids.
    ///
    /// Positions are uniform and symmetric about the origin; velocities are
    /// sampled one-sided (non-negative on every axis), x stronger than the
    /// rest. Groups alternate by index: `(index + 1) % 2`.
    pub fn seed(total_boids: usize) -> Self {
        let mut rng = rand::rng();
        let boids = (0..total_boids)
            .map(|index| Boid {
                position: Vector3::new(
                    rng.random_range(-SPAWN_BOUND..SPAWN_BOUND),
                    rng.random_range(-SPAWN_BOUND..SPAWN_BOUND),
                    rng.random_range(-SPAWN_BOUND..SPAWN_BOUND),
                ),
                velocity: Vector3::new(
                    rng.random_range(0.0..MAX_VELOCITY_SAMPLE),
                    rng.random_range(0.0..1.0),
                    rng.random_range(0.0..1.0),
                ),
                group: ((index + 1) % 2) as u8,
            })
            .collect();
        debug!("seeded flock with {total_boids} boids");
        Flock { boids }
    }

    /// Builds a flock from explicit boids, bypassing random seeding.
    pub fn from_boids(boids: Vec<Boid>) -> Self {
        Flock { boids }
    }

    /// Throws the whole population away and samples a fresh one. This is
    /// the only way the population size ever changes; no boid survives it.
    pub fn reseed(&mut self, total_boids: usize) {
        debug!("reseeding flock: {} -> {} boids", self.boids.len(), total_boids);
        *self = Flock::seed(total_boids);
    }

    /// Advances the simulation by one frame of `dt` seconds.
    pub fn advance(&mut self, dt: f32, params: &SimulationParameters) {
        // Gather every boid's next velocity against a fixed view of the
        // flock, then apply, so iteration order never matters.
        let next_velocities: Vec<Vector3<f32>> = self
            .boids
            .par_iter()
            .map(|boid| steer(boid, &self.boids, params))
            .collect();
        for (boid, velocity) in self.boids.iter_mut().zip(next_velocities) {
            boid.velocity = velocity;
        }

        for boid in self.boids.iter_mut() {
            avoid_boundary(boid, params);
        }

        for boid in self.boids.iter_mut() {
            boid.position += boid.velocity * dt;
        }
    }

    /// Read-only view of the flock for the renderer.
    pub fn snapshot(&self) -> &[Boid] {
        &self.boids
    }

    pub fn len(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }
}

// The scan's own metric: sqrt(|dx| + |dy|) over the x/y plane. Not
// Euclidean, and z never enters it.
fn flock_distance(a: &Boid, b: &Boid) -> f32 {
    ((a.position.x - b.position.x).abs() + (a.position.y - b.position.y).abs()).sqrt()
}

/// One boid's behavioral update: scan the flock, then apply separation,
/// alignment, cohesion, the group bias and the speed cap, in that order.
/// Returns the boid's next velocity; nothing is written here.
fn steer(boid: &Boid, flock: &[Boid], params: &SimulationParameters) -> Vector3<f32> {
    let mut xpos_avg: f32 = 0.0;
    let mut ypos_avg: f32 = 0.0;
    let mut xvel_avg: f32 = 0.0;
    let mut yvel_avg: f32 = 0.0;
    let mut neighboring_boids: usize = 0;
    let mut close_dx: f32 = 0.0;
    let mut close_dy: f32 = 0.0;

    // The scan runs over the whole flock, the boid itself included: a boid
    // always counts as its own visible and protected neighbor.
    for other in flock {
        let distance = flock_distance(boid, other);

        if distance < params.visible_range {
            xvel_avg += other.velocity.x;
            yvel_avg += other.velocity.y;
            xpos_avg += other.position.x;
            ypos_avg += other.position.y;
            neighboring_boids += 1;
        }

        if distance < params.protected_range {
            close_dx += boid.position.x - other.position.x;
            close_dy += boid.position.y - other.position.y;
        }
    }

    let mut vx = boid.velocity.x;
    let mut vy = boid.velocity.y;

    // Separation
    vx += close_dx * params.avoid_factor;
    vy += close_dy * params.avoid_factor;

    if neighboring_boids > 0 {
        // Alignment
        xvel_avg /= neighboring_boids as f32;
        yvel_avg /= neighboring_boids as f32;
        vx += (xvel_avg - vx) * params.matching_factor;
        vy += (yvel_avg - vy) * params.matching_factor;

        // Cohesion
        xpos_avg /= neighboring_boids as f32;
        ypos_avg /= neighboring_boids as f32;
        vx += (xpos_avg - boid.position.x) * params.centering_factor;
        vy += (ypos_avg - boid.position.y) * params.centering_factor;
    }

    // Bias
    let bias_direction = if boid.group == 0 { 1.0 } else { -1.0 };
    vx = (1.0 - params.bias_val) * vx + params.bias_val * bias_direction;

    // Speed cap on the x/y plane only; vz passes through untouched. A
    // pre-cap speed of exactly zero divides by zero here and the boid's
    // planar velocity goes NaN until something overwrites it.
    let speed = (vx * vx + vy * vy).sqrt();
    if speed > params.max_speed {
        vx = vx / speed * params.max_speed;
        vy = vy / speed * params.max_speed;
    }
    if speed < params.min_speed {
        vx = vx / speed * params.min_speed;
        vy = vy / speed * params.min_speed;
    }

    Vector3::new(vx, vy, boid.velocity.z)
}

// Each axis is tested on its own: a boid outside two margins at once gets
// turned on both.
fn avoid_boundary(boid: &mut Boid, params: &SimulationParameters) {
    if boid.position.x < params.left_margin {
        boid.velocity.x += params.turn_factor;
    }
    if boid.position.x > params.right_margin {
        boid.velocity.x -= params.turn_factor;
    }
    if boid.position.y < params.bottom_margin {
        boid.velocity.y += params.turn_factor;
    }
    if boid.position.y > params.top_margin {
        boid.velocity.y -= params.turn_factor;
    }
    if boid.position.z < params.close_margin {
        boid.velocity.z += params.turn_factor;
    }
    if boid.position.z > params.far_margin {
        boid.velocity.z -= params.turn_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still_boid(x: f32, y: f32, z: f32) -> Boid {
        Boid::new(Vector3::new(x, y, z), Vector3::zeros(), 0)
    }

    /// Defaults with the bias and the lower speed cap switched off, so a
    /// single steering rule can be observed in isolation.
    fn quiet_params() -> SimulationParameters {
        SimulationParameters {
            bias_val: 0.0,
            min_speed: 0.0,
            ..SimulationParameters::default()
        }
    }

    #[test]
    fn distance_is_root_of_planar_offset_sum() {
        let a = still_boid(0.0, 0.0, 0.0);
        let b = still_boid(0.1, 0.0, 0.0);
        assert!((flock_distance(&a, &b) - 0.1_f32.sqrt()).abs() < 1e-6);

        // z displacement is invisible to the metric
        let c = still_boid(0.1, 0.0, 50.0);
        assert_eq!(flock_distance(&a, &b), flock_distance(&a, &c));

        let d = still_boid(3.0, 4.0, 0.0);
        assert!((flock_distance(&a, &d) - 7.0_f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn groups_alternate_starting_with_one() {
        let flock = Flock::seed(5);
        let groups: Vec<u8> = flock.snapshot().iter().map(|b| b.group).collect();
        assert_eq!(groups, vec![1, 0, 1, 0, 1]);
    }

    #[test]
    fn lone_boid_past_left_margin_gets_one_turn() {
        let params = quiet_params();
        let mut flock = Flock::from_boids(vec![still_boid(params.left_margin - 1.0, 0.0, 0.0)]);

        flock.advance(1.0, &params);

        // Self-inclusion makes the boid its own sole neighbor with zero
        // relative offset, so every steering rule contributes nothing and
        // only the boundary turn is left.
        let boid = &flock.snapshot()[0];
        assert_eq!(boid.velocity.x, params.turn_factor);
        assert_eq!(boid.velocity.y, 0.0);
        assert_eq!(boid.position.x, params.left_margin - 1.0 + params.turn_factor);
    }

    #[test]
    fn separation_pushes_away_from_protected_neighbor() {
        let params = SimulationParameters {
            visible_range: 1.0,
            protected_range: 1.0,
            avoid_factor: 0.1,
            matching_factor: 0.0,
            centering_factor: 0.0,
            ..quiet_params()
        };
        let mut flock = Flock::from_boids(vec![
            still_boid(0.0, 0.0, 0.0),
            Boid::new(Vector3::new(0.1, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 0),
        ]);

        flock.advance(1.0, &params);

        // close_dx for the first boid is (0 - 0) + (0 - 0.1) = -0.1
        let boid = &flock.snapshot()[0];
        assert!((boid.velocity.x - (-0.01)).abs() < 1e-6);
        assert!(boid.velocity.y.abs() < 1e-6);
    }

    #[test]
    fn neighbor_average_includes_the_boid_itself() {
        let params = SimulationParameters {
            visible_range: 1.0,
            protected_range: 0.05,
            avoid_factor: 0.0,
            matching_factor: 1.0,
            centering_factor: 0.0,
            max_speed: 100.0,
            ..quiet_params()
        };
        let mut flock = Flock::from_boids(vec![
            still_boid(0.0, 0.0, 0.0),
            Boid::new(Vector3::new(0.1, 0.0, 0.0), Vector3::new(3.0, 0.0, 0.0), 0),
        ]);

        flock.advance(0.0, &params);

        // The velocity average is taken over both boids, itself included:
        // (0 + 3) / 2, not the other boid's 3.0.
        let boid = &flock.snapshot()[0];
        assert!((boid.velocity.x - 1.5).abs() < 1e-6);
    }

    #[test]
    fn zero_speed_clamp_produces_nan() {
        // Known edge: a zero pre-cap speed with a positive min_speed divides
        // by zero. The corruption stays local to the boid.
        let params = SimulationParameters {
            bias_val: 0.0,
            ..SimulationParameters::default()
        };
        let mut flock = Flock::from_boids(vec![still_boid(0.0, 0.0, 0.0)]);

        flock.advance(1.0, &params);

        let boid = &flock.snapshot()[0];
        assert!(boid.velocity.x.is_nan());
        assert!(boid.velocity.y.is_nan());
    }

    #[test]
    fn corner_boid_is_turned_on_both_axes() {
        let params = quiet_params();
        let mut flock = Flock::from_boids(vec![still_boid(
            params.left_margin - 1.0,
            params.bottom_margin - 1.0,
            0.0,
        )]);

        flock.advance(1.0, &params);

        let boid = &flock.snapshot()[0];
        assert_eq!(boid.velocity.x, params.turn_factor);
        assert_eq!(boid.velocity.y, params.turn_factor);
    }

    #[test]
    fn depth_margins_turn_the_z_velocity() {
        let params = quiet_params();

        let mut far = Flock::from_boids(vec![still_boid(0.0, 0.0, params.far_margin + 0.5)]);
        far.advance(1.0, &params);
        assert_eq!(far.snapshot()[0].velocity.z, -params.turn_factor);

        let mut close = Flock::from_boids(vec![still_boid(0.0, 0.0, params.close_margin - 0.5)]);
        close.advance(1.0, &params);
        assert_eq!(close.snapshot()[0].velocity.z, params.turn_factor);
    }

    #[test]
    fn speed_cap_clamps_the_plane_and_spares_z() {
        let params = SimulationParameters {
            bias_val: 0.0,
            ..SimulationParameters::default()
        };

        let mut fast = Flock::from_boids(vec![Boid::new(
            Vector3::zeros(),
            Vector3::new(10.0, 0.0, 0.7),
            0,
        )]);
        fast.advance(0.0, &params);
        let boid = &fast.snapshot()[0];
        assert!((boid.velocity.x - params.max_speed).abs() < 1e-5);
        assert_eq!(boid.velocity.z, 0.7);

        let mut slow = Flock::from_boids(vec![Boid::new(
            Vector3::zeros(),
            Vector3::new(0.5, 0.0, 0.7),
            0,
        )]);
        slow.advance(0.0, &params);
        let boid = &slow.snapshot()[0];
        assert!((boid.velocity.x - params.min_speed).abs() < 1e-5);
        assert_eq!(boid.velocity.z, 0.7);
    }

    #[test]
    fn zero_dt_moves_velocities_but_not_positions() {
        let params = SimulationParameters::default();
        let mut flock = Flock::seed(50);
        let before: Vec<Boid> = flock.snapshot().to_vec();

        flock.advance(0.0, &params);

        for (boid, old) in flock.snapshot().iter().zip(before.iter()) {
            assert_eq!(boid.position, old.position);
        }
        let any_velocity_changed = flock
            .snapshot()
            .iter()
            .zip(before.iter())
            .any(|(boid, old)| boid.velocity != old.velocity);
        assert!(any_velocity_changed);
    }
}
