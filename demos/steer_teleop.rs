// Keyboard teleop for one wheel and one steering motor
// W/S drive, A/D steer, R/F speed, C center, Q quit
//
// Usage: cargo run --example steer_teleop
// Expects `roboclaw-rover run` listening on the same zenoh network.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::info;

use roboclaw_rover_hal::config::TOPIC_CMD_MOTOR;

fn wheel() -> serde_json::Value {
    json!([128, 1, false])
}

fn steering() -> serde_json::Value {
    json!([128, 2, false])
}

const SPEEDS: [f64; 3] = [15.0, 40.0, 80.0]; // percent of max velocity
const STEER_STEP: f64 = 5.0; // degrees per key press
const MAX_STEER: f64 = 40.0; // stay clear of the hardstop
const INPUT_TIMEOUT_MS: u64 = 100; // Stop the wheel after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_MOTOR).await?;

    info!("Controls: W/S=drive, A/D=steer, C=center, R/F=speed, Q=quit");
    info!("Speed: LOW");

    // Calibrate before moving anything
    send(&publisher, wheel(), json!({ "type": "init_velocity" })).await?;
    send(&publisher, steering(), json!({ "type": "init_angle" })).await?;

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    id: serde_json::Value,
    action: serde_json::Value,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cmd = json!({ "id": id, "action": action });
    publisher.put(cmd.to_string()).await?;
    Ok(())
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Persistent drive state
    let mut velocity = 0.0;
    let mut steer = 0.0;
    let mut last_steer = f64::NAN;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Drive - update velocity and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        velocity = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        velocity = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Steering holds its angle between presses
                    KeyCode::Char('a') if pressed => {
                        steer = (steer - STEER_STEP).max(-MAX_STEER);
                    }
                    KeyCode::Char('d') if pressed => {
                        steer = (steer + STEER_STEP).min(MAX_STEER);
                    }
                    KeyCode::Char('c') if pressed => steer = 0.0,

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset velocity if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            velocity = 0.0;
        }

        // Wheel is refreshed at ~50Hz so the runtime watchdog stays fed
        send(publisher, wheel(), json!({ "type": "velocity", "percent": velocity })).await?;

        if steer != last_steer {
            send(publisher, steering(), json!({ "type": "angle", "degrees": steer })).await?;
            last_steer = steer;
        }
    }

    send(publisher, wheel(), json!({ "type": "velocity", "percent": 0.0 })).await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
