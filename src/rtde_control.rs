use crate::dashboard::DashboardClient;
use crate::error::LinkError;
use crate::pose::Pose;
use crate::robot_link::RobotLink;
use crate::rtde_receive::RTDEReceive;
use crate::script_client::{
    self, MoveParams, ScriptClient, ServoParams, MOVE_JOINT_PARAMS, MOVE_TOOL_PARAMS,
};
use log::{debug, info};
use tokio::time::{Duration, Instant};

const UR_PROGRAM_START_TIMEOUT: Duration = Duration::from_secs(5);
const UR_EXECUTION_TIMEOUT: Duration = Duration::from_secs(300);
const POLL_INTERVAL: Duration = Duration::from_millis(2);
const TARGET_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy)]
enum MotionTarget {
    Joints([f64; 6]),
    Tool(Pose),
}

/// UR controller link: RTDE for state, the script interface for motion and
/// the Dashboard server for halting programs.
pub struct RTDEControl {
    hostname: String,
    receive: RTDEReceive,
    script_client: ScriptClient,
    db_client: DashboardClient,
    servo_params: ServoParams,
    joint_params: MoveParams,
    tool_params: MoveParams,
}

impl RTDEControl {
    pub async fn new(hostname: &str) -> Result<Self, LinkError> {
        let mut db_client = DashboardClient::new(hostname);
        debug!("Connecting to dashboard");
        db_client.connect().await?;

        if !db_client.is_in_remote_control().await? {
            return Err(LinkError::RobotNotInRemoteControl(format!(
                "Robot not in remote control: {}",
                hostname
            )));
        }

        let receive = RTDEReceive::new(hostname).await?;

        let mut script_client = ScriptClient::new(hostname);
        script_client.connect().await?;

        info!("Connected to robot at {}", hostname);

        Ok(Self::from_parts(hostname, receive, script_client, db_client))
    }

    /// Assembles a link from already connected clients.
    pub fn from_parts(
        hostname: &str,
        receive: RTDEReceive,
        script_client: ScriptClient,
        db_client: DashboardClient,
    ) -> Self {
        Self {
            hostname: hostname.to_string(),
            receive,
            script_client,
            db_client,
            servo_params: ServoParams::default(),
            joint_params: MOVE_JOINT_PARAMS,
            tool_params: MOVE_TOOL_PARAMS,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn receive(&self) -> &RTDEReceive {
        &self.receive
    }

    pub fn set_servo_params(&mut self, params: ServoParams) {
        self.servo_params = params;
    }

    async fn check_safety(&self) -> Result<(), LinkError> {
        if self.receive.is_protective_stopped().await? {
            return Err(LinkError::RobotStopped("Robot is protective stopped".to_string()));
        }
        if self.receive.is_emergency_stopped().await? {
            return Err(LinkError::RobotStopped("Robot is emergency stopped".to_string()));
        }
        Ok(())
    }

    async fn at_target(&self, target: &MotionTarget) -> Result<bool, LinkError> {
        Ok(match target {
            MotionTarget::Joints(joints) => {
                let actual = self.receive.get_actual_q().await?;
                actual.iter().zip(joints).all(|(a, t)| (a - t).abs() < TARGET_TOLERANCE)
            }
            MotionTarget::Tool(pose) => {
                let actual = self.receive.get_actual_tcp_pose().await?;
                let actual = actual.as_slice().iter();
                actual.zip(pose.as_slice()).all(|(a, t)| (a - t).abs() < TARGET_TOLERANCE)
            }
        })
    }

    /// Waits for a freshly sent move to start and then to finish. A move to
    /// where the arm already is may never show up as a running program.
    async fn wait_for_motion(&self, target: MotionTarget) -> Result<(), LinkError> {
        let start_time = Instant::now();
        while !self.receive.is_program_running().await? {
            self.check_safety().await?;
            if self.at_target(&target).await? {
                debug!("Already at {:?}", target);
                return Ok(());
            }
            if start_time.elapsed() > UR_PROGRAM_START_TIMEOUT {
                return Err(LinkError::RobotConnectionTimeout(
                    "Failed to start motion program, before timeout of 5 seconds".to_string(),
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        let start_time = Instant::now();
        while self.receive.is_program_running().await? {
            self.check_safety().await?;
            if start_time.elapsed() > UR_EXECUTION_TIMEOUT {
                return Err(LinkError::RobotConnectionTimeout(
                    "Motion program timed out".to_string(),
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        self.check_safety().await
    }

    pub async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.script_client.disconnect().await?;
        self.db_client.disconnect().await?;
        self.receive.disconnect().await?;
        Ok(())
    }
}

impl RobotLink for RTDEControl {
    async fn get_tool_pose(&mut self) -> Result<Pose, LinkError> {
        self.receive.get_actual_tcp_pose().await
    }

    async fn servo_tool(&mut self, target: &Pose, period: Duration) -> Result<(), LinkError> {
        let script = script_client::servo_tool(target.as_slice(), period, &self.servo_params);
        self.script_client.send_script(&script).await
    }

    async fn move_joint(&mut self, joints: &[f64; 6]) -> Result<(), LinkError> {
        info!("Moving joints to {:?}", joints);
        let script = script_client::movej(joints, &self.joint_params);
        self.script_client.send_script(&script).await?;
        self.wait_for_motion(MotionTarget::Joints(*joints)).await
    }

    async fn move_tool(&mut self, pose: &Pose) -> Result<(), LinkError> {
        info!("Moving tool to {:?}", pose.as_slice());
        let script = script_client::movel(pose.as_slice(), &self.tool_params);
        self.script_client.send_script(&script).await?;
        self.wait_for_motion(MotionTarget::Tool(*pose)).await
    }

    async fn stop_script(&mut self) -> Result<(), LinkError> {
        debug!("Stopping robot program");
        self.db_client.stop().await
    }
}
