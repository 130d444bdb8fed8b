use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use roboclaw_rover_hal::config::DEFAULT_CONFIG_PATH;
use roboclaw_rover_hal::motor::{ControllerHandle, MotorDriver, MotorId};

/// Drive rover wheels and steering through RoboClaw motor controllers
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// RoboClaw connection and calibration file ("port": "TEST" simulates)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve motor commands over zenoh until interrupted
    Run,
    /// Print the controller firmware version
    Version(Motor),
    /// Print the controller input voltage
    Voltage(Motor),
    /// Run a motor at a percentage of full power
    Power {
        #[command(flatten)]
        motor: Motor,
        #[arg(allow_hyphen_values = true)]
        percent: i32,
    },
    /// Run a wheel at a percentage of its max velocity
    Velocity {
        #[command(flatten)]
        motor: Motor,
        #[arg(allow_hyphen_values = true)]
        percent: f64,
    },
    /// Steer to an angle in degrees off center (positive clockwise)
    Angle {
        #[command(flatten)]
        motor: Motor,
        #[arg(allow_hyphen_values = true)]
        degrees: f64,
    },
    /// Print the configured maximum steering angle
    MaxAngle(Motor),
    /// Zero a steering motor's encoder
    SetZero(Motor),
    /// Apply wheel calibration (max current, velocity PID)
    InitVelocity(Motor),
    /// Apply steering calibration (max current, velocity PID, position PID)
    InitAngle(Motor),
}

#[derive(Args)]
struct Motor {
    /// Controller address (128-135)
    #[arg(long)]
    address: i64,
    /// Motor channel (1 or 2)
    #[arg(long)]
    channel: i64,
    /// Motor is mounted reversed
    #[arg(long)]
    inverted: bool,
}

impl Motor {
    fn id(&self) -> Result<MotorId, roboclaw_rover_hal::motor::MotorError> {
        MotorId::new(self.address, self.channel, self.inverted)
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut driver = MotorDriver::new();
    driver.connect_from_file(&cli.config)?;
    let handle = ControllerHandle::spawn(driver);

    match cli.command {
        Command::Run => roboclaw_rover_hal::runtime::run(handle).await?,
        Command::Version(m) => println!("{}", handle.version(m.id()?).await?),
        Command::Voltage(m) => println!("{:.1} V", handle.input_voltage(m.id()?).await?),
        Command::Power { motor, percent } => handle.power_percent(motor.id()?, percent).await?,
        Command::Velocity { motor, percent } => handle.velocity(motor.id()?, percent).await?,
        Command::Angle { motor, degrees } => handle.angle(motor.id()?, degrees).await?,
        Command::MaxAngle(m) => println!("{}", handle.maxangle(m.id()?).await?),
        Command::SetZero(m) => handle.steer_setzero(m.id()?).await?,
        Command::InitVelocity(m) => handle.init_velocity(m.id()?).await?,
        Command::InitAngle(m) => handle.init_angle(m.id()?).await?,
    }

    info!("Done");
    Ok(())
}
