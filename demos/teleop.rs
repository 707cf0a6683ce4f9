use ur_teleop::config::TeleopConfig;
use ur_teleop::harness;
use ur_teleop::init_logging;
use ur_teleop::input::StdinKeys;
use ur_teleop::rtde_control::RTDEControl;
use ur_teleop::LinkError;

use log::{error, info};

async fn teleop(config: TeleopConfig) -> Result<(), LinkError> {
    let mut control = RTDEControl::new(&config.hostname).await?;
    info!("Connected to robot");

    // w a s d i j for x y z, p to pause/resume, q to quit. Press enter to send.
    let mut input = StdinKeys::spawn(config.step);
    let result = harness::run(&mut control, &mut input, &config).await;

    if let Err(e) = control.disconnect().await {
        error!("Failed to disconnect from robot: {}", e);
    }

    let report = result?;
    if let Some(target) = report.last_target {
        info!("Last commanded pose {:?}", target.as_slice());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let config = match TeleopConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            println!("Usage: teleop [hostname] [period_s] [step]");
            std::process::exit(2);
        }
    };

    if let Err(e) = teleop(config).await {
        error!("Teleop failed: {}", e);
        std::process::exit(1);
    }
}
