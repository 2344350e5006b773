//! Motion control boundary.
//!
//! The daemon never drives the vehicle directly; it only pauses, resumes,
//! stops, and (for reservations) caps the speed of whatever line follower
//! sits behind [`MotionActuator`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Commands the daemon issues to the vehicle.
pub trait MotionActuator: Send {
    fn pause(&mut self);
    fn unpause(&mut self);
    /// Halt for good. Issued on detector errors.
    fn stop(&mut self);
    /// Cap the forward speed, in meters per second.
    fn set_max_speed(&mut self, speed: f64);
}

impl<A: MotionActuator + ?Sized> MotionActuator for Box<A> {
    fn pause(&mut self) {
        (**self).pause();
    }

    fn unpause(&mut self) {
        (**self).unpause();
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn set_max_speed(&mut self, speed: f64) {
        (**self).set_max_speed(speed);
    }
}

/// A single issued command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCommand {
    Pause,
    Unpause,
    Stop,
    SetMaxSpeed(f64),
}

/// Current motion state as the actuator sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    pub paused: bool,
    pub stopped: bool,
    pub max_speed: f64,
}

impl MotionState {
    /// Whether the vehicle is moving forward.
    pub fn is_moving(&self) -> bool {
        !self.paused && !self.stopped && self.max_speed > 0.0
    }
}

#[derive(Debug)]
struct Recorded {
    state: MotionState,
    commands: Vec<MotionCommand>,
}

/// In-memory actuator that tracks state and logs every command.
///
/// Clones share the same record, so a test or simulator can keep a handle
/// while the daemon owns another.
#[derive(Debug, Clone)]
pub struct RecordingActuator {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingActuator {
    pub fn new(max_speed: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recorded {
                state: MotionState {
                    paused: false,
                    stopped: false,
                    max_speed,
                },
                commands: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> MotionState {
        self.lock().state
    }

    pub fn commands(&self) -> Vec<MotionCommand> {
        self.lock().commands.clone()
    }

    fn apply(&self, command: MotionCommand) {
        let mut rec = self.lock();
        match command {
            MotionCommand::Pause => rec.state.paused = true,
            MotionCommand::Unpause => rec.state.paused = false,
            MotionCommand::Stop => rec.state.stopped = true,
            MotionCommand::SetMaxSpeed(speed) => rec.state.max_speed = speed,
        }
        rec.commands.push(command);
    }
}

impl MotionActuator for RecordingActuator {
    fn pause(&mut self) {
        self.apply(MotionCommand::Pause);
    }

    fn unpause(&mut self) {
        self.apply(MotionCommand::Unpause);
    }

    fn stop(&mut self) {
        self.apply(MotionCommand::Stop);
    }

    fn set_max_speed(&mut self, speed: f64) {
        self.apply(MotionCommand::SetMaxSpeed(speed));
    }
}
