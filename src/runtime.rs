// 50 Hz command loop with watchdog
// Commands arrive over zenoh, go through the serialized ControllerHandle one
// at a time, and each gets an outcome published back. If the command stream
// stops, every motor that was left running is stopped.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

// local imports
use crate::config::{CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_MOTOR, TOPIC_HEALTH, TOPIC_OUTCOME_MOTOR};
use crate::messages::{CommandOutcome, MotorAction, MotorCommand, RuntimeHealth};
use crate::motor::{ControllerHandle, MotorError, MotorId};

/// How a motor was left running
#[derive(Debug, Clone, Copy, PartialEq)]
enum Drive {
    Power,
    Velocity,
}

pub struct Runtime {
    handle: ControllerHandle,
    running: HashMap<MotorId, Drive>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(handle: ControllerHandle) -> Self {
        Self {
            handle,
            running: HashMap::new(),
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Validate and execute one command
    pub async fn on_command(&mut self, cmd: &MotorCommand) -> CommandOutcome {
        info!("Received command: {:?}", cmd);
        self.cmd_received_at = Instant::now();
        self.health = RuntimeHealth::Ok;

        let id = match MotorId::validate(&cmd.id) {
            Ok(id) => id,
            Err(e) => {
                warn!("Rejected command: {}", e);
                return CommandOutcome::failure(cmd, e);
            }
        };

        match self.execute(id, cmd.action).await {
            Ok(value) => CommandOutcome::success(cmd, value),
            Err(e) => {
                warn!("Command on {} failed: {}", id, e);
                CommandOutcome::failure(cmd, e)
            }
        }
    }

    async fn execute(
        &mut self,
        id: MotorId,
        action: MotorAction,
    ) -> Result<Option<serde_json::Value>, MotorError> {
        let h = &self.handle;
        match action {
            MotorAction::Power { percent } => {
                h.power_percent(id, percent).await?;
                self.track(id, Drive::Power, percent != 0);
            }
            MotorAction::Velocity { percent } => {
                h.velocity(id, percent).await?;
                self.track(id, Drive::Velocity, percent != 0.0);
            }
            MotorAction::Angle { degrees } => h.angle(id, degrees).await?,
            MotorAction::SetZero => h.steer_setzero(id).await?,
            MotorAction::InitVelocity => h.init_velocity(id).await?,
            MotorAction::InitAngle => h.init_angle(id).await?,
            MotorAction::MaxAngle => return Ok(Some(h.maxangle(id).await?.into())),
            MotorAction::Version => return Ok(Some(h.version(id).await?.into())),
            MotorAction::InputVoltage => return Ok(Some(h.input_voltage(id).await?.into())),
        }
        Ok(None)
    }

    fn track(&mut self, id: MotorId, drive: Drive, moving: bool) {
        if moving {
            self.running.insert(id, drive);
        } else {
            self.running.remove(&id);
        }
    }

    /// Stop running motors if the command stream went quiet
    pub async fn check_watchdog(&mut self) {
        let cmd_age = self.cmd_received_at.elapsed();
        if cmd_age <= CMD_TIMEOUT {
            return;
        }

        if self.health != RuntimeHealth::CmdStale && !self.running.is_empty() {
            warn!("Command stale ({:?} old), stopping motors", cmd_age);
        }
        self.health = RuntimeHealth::CmdStale;

        for (id, drive) in std::mem::take(&mut self.running) {
            let result = match drive {
                Drive::Power => self.handle.power_percent(id, 0).await,
                Drive::Velocity => self.handle.velocity(id, 0.0).await,
            };
            if let Err(e) = result {
                warn!("Failed to stop {}: {}", id, e);
            }
        }
    }
}

pub async fn run(handle: ControllerHandle) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_MOTOR).await?;
    let pub_outcome = session.declare_publisher(TOPIC_OUTCOME_MOTOR).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(handle);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_MOTOR);
    info!("Publishing to: {}, {}", TOPIC_OUTCOME_MOTOR, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), in arrival order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<MotorCommand>(&payload) {
                Ok(cmd) => {
                    let outcome = runtime.on_command(&cmd).await;
                    pub_outcome.put(serde_json::to_string(&outcome)?).await?;
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Watchdog
        runtime.check_watchdog().await;

        // 3. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}
