use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sampler::MotionSource;
use crate::types::{SensorSample, Vec3, SAMPLING_RATE};

/// Poses de muñeca reconocibles, con su vector de gravedad típico
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub name: &'static str,
    pub gravity: Vec3,
}

pub const POSES: [Pose; 7] = [
    Pose { name: "hover", gravity: Vec3::new(0.0, 0.0, -1.0) },
    Pose { name: "point-to-floor", gravity: Vec3::new(1.0, 0.0, -0.2) },
    Pose { name: "point-to-sky", gravity: Vec3::new(-1.0, 0.0, 0.0) },
    Pose { name: "tilt-right", gravity: Vec3::new(0.0, -1.0, 0.0) },
    Pose { name: "tilt-left", gravity: Vec3::new(0.0, 1.0, 0.0) },
    Pose { name: "half-up", gravity: Vec3::new(-0.5, 0.0, -1.0) },
    Pose { name: "half-down", gravity: Vec3::new(0.5, 0.0, -1.0) },
];

const JITTER: f32 = 0.05;

/// Fuente sintética: recorre una lista de poses manteniendo cada una
/// `hold_samples` muestras, con ruido uniforme de ±0.05 en la gravedad.
pub struct SimulatedMotion {
    poses: Vec<Pose>,
    hold_samples: usize,
    index: u64,
    rng: StdRng,
}

impl SimulatedMotion {
    pub fn new(poses: Vec<Pose>, hold_samples: usize, seed: u64) -> Self {
        Self {
            poses,
            hold_samples: hold_samples.max(1),
            index: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Todas las poses, dos segundos cada una a 50 Hz
    pub fn tour(seed: u64) -> Self {
        Self::new(POSES.to_vec(), 100, seed)
    }

    pub fn current_pose(&self) -> Option<&Pose> {
        if self.poses.is_empty() {
            return None;
        }
        let slot = (self.index as usize / self.hold_samples) % self.poses.len();
        self.poses.get(slot)
    }

    fn jitter(&mut self) -> f32 {
        self.rng.gen_range(-JITTER..JITTER)
    }
}

impl MotionSource for SimulatedMotion {
    fn name(&self) -> &str {
        "simulator"
    }

    fn is_available(&self) -> bool {
        !self.poses.is_empty()
    }

    fn next_sample(&mut self) -> Option<SensorSample> {
        let pose = *self.current_pose()?;
        let gravity = Vec3::new(
            pose.gravity.x + self.jitter(),
            pose.gravity.y + self.jitter(),
            pose.gravity.z + self.jitter(),
        );
        let user_acceleration = Vec3::new(self.jitter(), self.jitter(), self.jitter());
        let sample = SensorSample {
            timestamp: self.index as f64 / SAMPLING_RATE as f64,
            gravity,
            user_acceleration,
            rotation_rate: Vec3::new(self.jitter(), self.jitter(), self.jitter()),
            acceleration: Vec3::new(
                gravity.x + user_acceleration.x,
                gravity.y + user_acceleration.y,
                gravity.z + user_acceleration.z,
            ),
        };
        self.index += 1;
        Some(sample)
    }
}
