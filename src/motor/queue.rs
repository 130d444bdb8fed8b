// Serialized access to a single MotorDriver from many callers
//
// The driver lives on one worker thread. Callers send jobs over an mpsc
// channel and await the reply, so exactly one command is in flight against
// the transport and commands run in the order they were submitted.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::driver::MotorDriver;
use super::error::{MotorError, Result};
use super::id::MotorId;

/// Pending commands beyond this make submitters wait
const QUEUE_DEPTH: usize = 64;

type Job = Box<dyn FnOnce(&mut MotorDriver) + Send>;

/// Clonable handle to the driver's worker
#[derive(Clone)]
pub struct ControllerHandle {
    jobs: mpsc::Sender<Job>,
}

impl ControllerHandle {
    /// Move `driver` onto a dedicated worker thread
    ///
    /// The worker exits once every handle has been dropped. A job that panics
    /// is dropped without a reply (its submitter sees `QueueClosed`) and the
    /// worker moves on to the next one.
    pub fn spawn(driver: MotorDriver) -> Self {
        let (jobs, mut rx) = mpsc::channel::<Job>(QUEUE_DEPTH);

        thread::spawn(move || {
            let mut driver = driver;
            debug!("RoboClaw worker started");
            while let Some(job) = rx.blocking_recv() {
                if panic::catch_unwind(AssertUnwindSafe(|| job(&mut driver))).is_err() {
                    error!("RoboClaw job panicked; worker continues with the next command");
                }
            }
            info!("RoboClaw worker stopped");
        });

        Self { jobs }
    }

    /// Run `f` against the driver once every earlier submission has finished
    pub async fn submit<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut MotorDriver) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |driver| {
            // The submitter may have gone away; nothing to report to then
            let _ = reply_tx.send(f(driver));
        });

        self.jobs
            .send(job)
            .await
            .map_err(|_| MotorError::QueueClosed)?;
        reply_rx.await.map_err(|_| MotorError::QueueClosed)?
    }

    pub async fn version(&self, id: MotorId) -> Result<String> {
        self.submit(move |d| d.version(id)).await
    }

    pub async fn input_voltage(&self, id: MotorId) -> Result<f64> {
        self.submit(move |d| d.input_voltage(id)).await
    }

    pub async fn power_percent(&self, id: MotorId, percentage: i32) -> Result<()> {
        self.submit(move |d| d.power_percent(id, percentage)).await
    }

    pub async fn velocity(&self, id: MotorId, pct_velocity: f64) -> Result<()> {
        self.submit(move |d| d.velocity(id, pct_velocity)).await
    }

    pub async fn angle(&self, id: MotorId, degrees: f64) -> Result<()> {
        self.submit(move |d| d.angle(id, degrees)).await
    }

    pub async fn maxangle(&self, id: MotorId) -> Result<f64> {
        self.submit(move |d| d.maxangle(id)).await
    }

    pub async fn steer_setzero(&self, id: MotorId) -> Result<()> {
        self.submit(move |d| d.steer_setzero(id)).await
    }

    pub async fn init_velocity(&self, id: MotorId) -> Result<()> {
        self.submit(move |d| d.init_velocity(id)).await
    }

    pub async fn init_angle(&self, id: MotorId) -> Result<()> {
        self.submit(move |d| d.init_angle(id)).await
    }
}
