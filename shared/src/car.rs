//! Deterministic 2D car dynamics shared by the server simulation and client prediction
//!
//! The model follows the classic slip-angle approach: the body's velocity is
//! expressed in the car-local frame, each axle produces a lateral force from
//! its slip angle (capped by the available grip), the drive train produces a
//! longitudinal traction force, and linear plus quadratic resistance opposes
//! motion. Forces are summed in the local frame, mapped back to world space and
//! integrated with semi-implicit Euler.
//!
//! Every body integrates with [`PHYSICS_TIMESTEP`] regardless of the delta
//! handed to [`CarPhysicsBody::update`]. Server and clients therefore produce
//! bit-identical trajectories for identical inputs even when their timers
//! jitter.

use crate::math::{sign, to_radians, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integration step applied by every [`CarPhysicsBody::update`] call, in seconds.
pub const PHYSICS_TIMESTEP: f32 = 0.01;
pub const GRAVITY: f32 = 9.81;

/// Rejected car construction parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CarConfigError {
    #[error("mass must be positive and finite, got {0}")]
    InvalidMass(f32),
    #[error("rear axle must sit behind the front axle (wheel base {0})")]
    InvalidWheelBase(f32),
    #[error("max steer angle must be non-negative and finite, got {0}")]
    InvalidSteerLimit(f32),
    #[error("max grip must be non-negative and finite, got {0}")]
    InvalidGrip(f32),
    #[error("front train share must lie in [0, 1], got {0}")]
    InvalidFrontTrain(f32),
    #[error("{0} must be finite")]
    NonFinite(&'static str),
}

/// Per-axle pair of values, front first.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axles {
    pub front: f32,
    pub rear: f32,
}

/// Static vehicle parameters, immutable once a body has been built from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarConfig {
    pub mass: f32,
    pub max_steer_angle: f32,
    /// Distance of each axle from the mass center along the longitudinal axis.
    /// The front axle is negative, the rear axle positive.
    pub axles: Axles,
    pub cornering_stiffness: Axles,
    pub max_grip: f32,
    /// Linear resistance coefficient (rolling resistance).
    pub resistance: f32,
    /// Quadratic resistance coefficient (air drag).
    pub drag: f32,
    /// Share of traction delivered through the front wheels. 0 is rear-wheel drive.
    pub front_train: f32,
    pub engine_force: f32,
    pub brake_force: f32,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            mass: 1500.0,
            max_steer_angle: to_radians(30.0),
            axles: Axles {
                front: -1.2,
                rear: 1.2,
            },
            cornering_stiffness: Axles {
                front: -5.0,
                rear: -5.2,
            },
            max_grip: 2.0,
            resistance: 30.0,
            drag: 2.0,
            front_train: 0.0,
            engine_force: 8000.0,
            brake_force: 8000.0,
        }
    }
}

impl CarConfig {
    pub fn wheel_base(&self) -> f32 {
        self.axles.rear - self.axles.front
    }

    /// Rejects parameter sets that would make the integrator divide by zero
    /// or propagate NaN.
    pub fn validate(&self) -> Result<(), CarConfigError> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(CarConfigError::InvalidMass(self.mass));
        }

        let wheel_base = self.wheel_base();
        if !(wheel_base.is_finite() && wheel_base > 0.0) {
            return Err(CarConfigError::InvalidWheelBase(wheel_base));
        }

        if !(self.max_steer_angle.is_finite() && self.max_steer_angle >= 0.0) {
            return Err(CarConfigError::InvalidSteerLimit(self.max_steer_angle));
        }

        if !(self.max_grip.is_finite() && self.max_grip >= 0.0) {
            return Err(CarConfigError::InvalidGrip(self.max_grip));
        }

        if !(0.0..=1.0).contains(&self.front_train) {
            return Err(CarConfigError::InvalidFrontTrain(self.front_train));
        }

        let coefficients = [
            ("front cornering stiffness", self.cornering_stiffness.front),
            ("rear cornering stiffness", self.cornering_stiffness.rear),
            ("resistance", self.resistance),
            ("drag", self.drag),
            ("engine force", self.engine_force),
            ("brake force", self.brake_force),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() {
                return Err(CarConfigError::NonFinite(name));
            }
        }

        Ok(())
    }
}

/// Serialized form of a body: its config and kinematic state only.
///
/// Derived constants are never sent; they are rebuilt from the config on
/// arrival so a peer cannot smuggle in an unvalidated body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarBodyState {
    pub config: CarConfig,
    pub pos: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
    pub steer_angle: f32,
    pub cornering_intensity: f32,
    pub throttle: f32,
    pub brake: f32,
}

/// One simulated vehicle: immutable derived constants plus its kinematic state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CarBodyState", into = "CarBodyState")]
pub struct CarPhysicsBody {
    config: CarConfig,

    // precomputed from config
    inertia: f32,
    weight: f32,
    axle_weights: Axles,

    pub pos: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
    steer_angle: f32,
    pub cornering_intensity: f32,

    // controls
    pub throttle: f32,
    pub brake: f32,
}

impl TryFrom<CarBodyState> for CarPhysicsBody {
    type Error = CarConfigError;

    fn try_from(state: CarBodyState) -> Result<Self, Self::Error> {
        let vectors = [("position", state.pos), ("velocity", state.velocity)];
        for (name, value) in vectors {
            if !value.is_finite() {
                return Err(CarConfigError::NonFinite(name));
            }
        }
        let scalars = [
            ("angle", state.angle),
            ("angular velocity", state.angular_velocity),
            ("steer angle", state.steer_angle),
            ("cornering intensity", state.cornering_intensity),
            ("throttle", state.throttle),
            ("brake", state.brake),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(CarConfigError::NonFinite(name));
            }
        }

        let mut body = CarPhysicsBody::new(state.config, state.pos, state.angle)?;
        body.velocity = state.velocity;
        body.angular_velocity = state.angular_velocity;
        body.set_steer_angle(state.steer_angle);
        body.cornering_intensity = state.cornering_intensity;
        body.throttle = state.throttle;
        body.brake = state.brake;
        Ok(body)
    }
}

impl From<CarPhysicsBody> for CarBodyState {
    fn from(body: CarPhysicsBody) -> Self {
        Self {
            config: body.config,
            pos: body.pos,
            velocity: body.velocity,
            angle: body.angle,
            angular_velocity: body.angular_velocity,
            steer_angle: body.steer_angle,
            cornering_intensity: body.cornering_intensity,
            throttle: body.throttle,
            brake: body.brake,
        }
    }
}

impl CarPhysicsBody {
    /// Builds a resting body at `pos` facing `angle`.
    pub fn new(config: CarConfig, pos: Vec2, angle: f32) -> Result<Self, CarConfigError> {
        config.validate()?;

        let wheel_base = config.wheel_base();
        let weight = config.mass * GRAVITY;
        let axle_weights = Axles {
            front: -config.axles.front / wheel_base * weight,
            rear: config.axles.rear / wheel_base * weight,
        };

        Ok(Self {
            inertia: config.mass,
            weight,
            axle_weights,
            config,
            pos,
            velocity: Vec2::ZERO,
            angle,
            angular_velocity: 0.0,
            steer_angle: 0.0,
            cornering_intensity: 0.0,
            throttle: 0.0,
            brake: 0.0,
        })
    }

    pub fn config(&self) -> &CarConfig {
        &self.config
    }

    pub fn max_steer_angle(&self) -> f32 {
        self.config.max_steer_angle
    }

    pub fn steer_angle(&self) -> f32 {
        self.steer_angle
    }

    /// Sets the steering angle, clamped to the steering lock.
    pub fn set_steer_angle(&mut self, steer_angle: f32) {
        let limit = self.config.max_steer_angle;
        self.steer_angle = steer_angle.clamp(-limit, limit);
    }

    /// Adjusts the steering angle by `delta`, clamped to the steering lock.
    pub fn turn(&mut self, delta: f32) {
        self.set_steer_angle(self.steer_angle + delta);
    }

    /// Moves the steering angle back toward zero by at most `step`.
    pub fn center_steering(&mut self, step: f32) {
        if self.steer_angle > 0.0 {
            self.steer_angle = (self.steer_angle - step).max(0.0);
        } else if self.steer_angle < 0.0 {
            self.steer_angle = (self.steer_angle + step).min(0.0);
        }
    }

    /// Advances the body by one step.
    ///
    /// `_delta` is accepted for call-site symmetry with frame-driven loops but
    /// ignored: integration always uses [`PHYSICS_TIMESTEP`].
    pub fn update(&mut self, _delta: f32) {
        let dt = PHYSICS_TIMESTEP;
        let CarConfig {
            axles,
            cornering_stiffness,
            max_grip,
            resistance,
            drag,
            front_train,
            engine_force,
            brake_force,
            mass,
            ..
        } = self.config;
        let steer_angle = self.steer_angle;

        let local_velocity = self.velocity.rotate_frame(self.angle);

        let mut slip_angles = Axles::default();
        if local_velocity.x != 0.0 {
            let abs_long = local_velocity.x.abs();
            slip_angles.front = (local_velocity.y + self.angular_velocity * -axles.front)
                .atan2(abs_long)
                - steer_angle * sign(local_velocity.x);
            slip_angles.rear =
                (local_velocity.y - self.angular_velocity * axles.rear).atan2(abs_long);
        }

        let front_coef = 0.5 * front_train;
        let rear_coef = 1.0 - front_coef;

        let lateral = Axles {
            front: (cornering_stiffness.front * slip_angles.front).clamp(-max_grip, max_grip)
                * self.axle_weights.front,
            rear: (cornering_stiffness.rear * slip_angles.rear).clamp(-max_grip, max_grip)
                * self.axle_weights.rear,
        };

        let traction = Vec2::new(
            engine_force * self.throttle * (rear_coef + front_coef * steer_angle.cos())
                - brake_force * self.brake * sign(local_velocity.x),
            engine_force * self.throttle * front_coef * steer_angle.sin(),
        );

        let resistance_force = Vec2::new(
            -(resistance * local_velocity.x + drag * local_velocity.x * local_velocity.x.abs()),
            -(resistance * local_velocity.y + drag * local_velocity.y * local_velocity.y.abs()),
        );

        let cornering = Vec2::new(0.0, lateral.rear + steer_angle.cos() * lateral.front);

        let total = traction + cornering + resistance_force;
        let acceleration = total.scale(1.0 / mass).rotate_frame(self.angle);

        self.velocity += acceleration * dt;
        self.pos += self.velocity * dt;

        let torque = -lateral.rear * axles.rear + lateral.front * -axles.front;
        let angular_acceleration = torque / self.inertia;

        self.angular_velocity += dt * angular_acceleration;
        self.angle += dt * self.angular_velocity;

        let grip_force = max_grip * self.weight;
        self.cornering_intensity = if grip_force > 0.0 {
            cornering.y.abs() / grip_force
        } else {
            0.0
        };
    }
}
