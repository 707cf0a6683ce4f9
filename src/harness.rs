/* Fixed-rate teleoperation loop with unconditional motion halt */

use crate::config::TeleopConfig;
use crate::error::LinkError;
use crate::input::{InputSample, InputSource};
use crate::pose::Pose;
use crate::robot_link::RobotLink;
use crate::teleop::Teleop;
use chrono::{DateTime, Utc};
use log::{error, info};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub cycles: u64,
    pub servo_commands: u64,
    pub last_target: Option<Pose>,
}

/// Homes the arm, then tracks `input` until it quits. `stop_script` runs on
/// every exit path; a loop error takes precedence over a cleanup error.
/// Pass `&mut link` to keep the link for a later disconnect.
pub async fn run<L, I>(
    link: L,
    input: &mut I,
    config: &TeleopConfig,
) -> Result<SessionReport, LinkError>
where
    L: RobotLink,
    I: InputSource,
{
    let mut teleop = Teleop::new(link, config.control_period);
    let mut report =
        SessionReport { started_at: Utc::now(), cycles: 0, servo_commands: 0, last_target: None };

    let result = drive(&mut teleop, input, config, &mut report).await;
    let cleanup = teleop.link_mut().stop_script().await;

    match (result, cleanup) {
        (Err(e), Err(cleanup_err)) => {
            error!("Failed to stop robot script after error: {}", cleanup_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(cleanup_err)) => Err(cleanup_err),
        (Ok(()), Ok(())) => {
            info!(
                "Teleop session from {} ran {} cycles, {} servo commands",
                report.started_at, report.cycles, report.servo_commands
            );
            Ok(report)
        }
    }
}

async fn drive<L, I>(
    teleop: &mut Teleop<L>,
    input: &mut I,
    config: &TeleopConfig,
    report: &mut SessionReport,
) -> Result<(), LinkError>
where
    L: RobotLink,
    I: InputSource,
{
    info!("Moving to home");
    teleop.link_mut().move_joint(&config.home_joints).await?;
    teleop.link_mut().move_tool(&config.home_pose).await?;

    let anchor = match input.sample() {
        InputSample::Quit => {
            info!("Exiting teleop.");
            return Ok(());
        }
        InputSample::Displacement(v) | InputSample::TogglePause(v) => v,
    };
    teleop.resume(anchor).await?;
    info!("Teleop active");

    let mut ticker = tokio::time::interval(teleop.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        report.cycles += 1;

        match input.sample() {
            InputSample::Quit => {
                info!("Exiting teleop.");
                return Ok(());
            }
            InputSample::TogglePause(v) => {
                if teleop.is_paused() {
                    teleop.resume(v).await?;
                    info!("Teleop resumed");
                } else {
                    teleop.pause();
                    info!("Teleop paused");
                }
            }
            InputSample::Displacement(v) => {
                if let Some(target) = teleop.track(&v).await? {
                    report.servo_commands += 1;
                    report.last_target = Some(target);
                }
            }
        }
    }
}
