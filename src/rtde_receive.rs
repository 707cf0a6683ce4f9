/* RTDE Receive Interface for reading data from UR robot */

use crate::error::LinkError;
use crate::pose::Pose;
use crate::robot_state::{RobotState, StateValue};
use crate::rtde::{RTDE, RTDE_START_SYNCHRONIZATION_TIMEOUT};
use log::{debug, error, info};
use num_enum::TryFromPrimitive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

pub const DEFAULT_FREQUENCY: f64 = 500.0;
const DISCONNECT_TIMEOUT: Duration = Duration::from_millis(500);

const OUTPUT_FIELDS: &[&str] = &[
    "timestamp",
    "actual_q",
    "actual_TCP_pose",
    "robot_mode",
    "runtime_state",
    "robot_status_bits",
    "safety_status_bits",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum RuntimeState {
    Stopping = 0,
    Stopped = 1,
    Playing = 2,
    Pausing = 3,
    Paused = 4,
    Resuming = 5,
}

#[derive(Debug, Clone, Copy)]
#[repr(u32)]
pub enum SafetyStatusBits {
    IsNormalMode = 0,
    IsReducedMode = 1,
    IsProtectiveStopped = 2,
    IsRecoveryMode = 3,
    IsSafeguardStopped = 4,
    IsSystemEmergencyStopped = 5,
    IsRobotEmergencyStopped = 6,
    IsEmergencyStopped = 7,
    IsViolation = 8,
    IsFault = 9,
    IsStoppedDueToSafety = 10,
}

pub struct RTDEReceive {
    robot_state: Arc<Mutex<RobotState>>,
    receiving: Arc<AtomicBool>,
    stop_receive_thread: Option<oneshot::Sender<()>>,
    receive_thread: Option<JoinHandle<()>>,
}

impl RTDEReceive {
    pub async fn new(hostname: &str) -> Result<Self, LinkError> {
        Self::connect(RTDE::new(hostname), DEFAULT_FREQUENCY).await
    }

    /// Runs the RTDE handshake on `rtde`, then hands it to a background task
    /// that keeps the robot state current. Returns once the first state
    /// has arrived.
    pub async fn connect(mut rtde: RTDE, frequency: f64) -> Result<Self, LinkError> {
        debug!("Connecting to robot");
        rtde.connect().await?;
        rtde.negotiate_protocol_version().await?;

        let version = rtde.get_controller_version().await?;
        info!(
            "Controller version {}.{}.{}.{}",
            version.major, version.minor, version.bugfix, version.build
        );

        rtde.send_output_setup(OUTPUT_FIELDS, frequency).await?;
        rtde.send_start().await?;

        let mut interface = Self {
            robot_state: Arc::new(Mutex::new(RobotState::new())),
            receiving: Arc::new(AtomicBool::new(false)),
            stop_receive_thread: None,
            receive_thread: None,
        };
        interface.start_receive_thread(rtde);

        let start_time = Instant::now();
        while !interface.robot_state.lock().await.first_state_received() {
            if !interface.receiving.load(Ordering::SeqCst) {
                return Err(LinkError::ConnectionError(
                    "RTDE receive stopped before the first robot state".to_string(),
                ));
            }
            if start_time.elapsed() >= Duration::from_secs(RTDE_START_SYNCHRONIZATION_TIMEOUT) {
                return Err(LinkError::RobotConnectionTimeout(
                    "RTDE did not start within start synchronization timeout.".to_string(),
                ));
            }
            debug!("Waiting for robot state...");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        Ok(interface)
    }

    fn start_receive_thread(&mut self, mut rtde: RTDE) {
        let robot_state = self.robot_state.clone();
        let receiving = self.receiving.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        receiving.store(true, Ordering::SeqCst);
        self.stop_receive_thread = Some(stop_tx);
        self.receive_thread = Some(tokio::spawn(async move {
            debug!("STARTED receive thread");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        match tokio::time::timeout(DISCONNECT_TIMEOUT, rtde.disconnect(true)).await {
                            Ok(Err(e)) => error!("Failed to disconnect RTDE: {}", e),
                            Err(_) => error!("RTDE disconnect timed out"),
                            Ok(Ok(())) => {}
                        }
                        break;
                    }
                    received = rtde.receive_data(&robot_state) => {
                        if let Err(e) = received {
                            error!("RTDE receive failed: {}", e);
                            break;
                        }
                    }
                }
            }
            receiving.store(false, Ordering::SeqCst);
            debug!("STOPPED receive thread");
        }));
    }

    pub fn is_connected(&self) -> bool {
        self.receiving.load(Ordering::SeqCst)
    }

    async fn get_state_data(&self, name: &str) -> Result<StateValue, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::ConnectionError("RTDE receive is not running".to_string()));
        }
        Ok(self.robot_state.lock().await.get_state_data(name)?.clone())
    }

    async fn get_vector6(&self, name: &str) -> Result<[f64; 6], LinkError> {
        let value = self.get_state_data(name).await?;
        value
            .as_vec_double()
            .and_then(|v| v.try_into().ok())
            .ok_or_else(|| LinkError::ProtocolError(format!("{} is not a 6-vector", name)))
    }

    async fn get_uint32(&self, name: &str) -> Result<u32, LinkError> {
        self.get_state_data(name)
            .await?
            .as_uint32()
            .ok_or_else(|| LinkError::ProtocolError(format!("{} is not an unsigned integer", name)))
    }

    pub async fn get_timestamp(&self) -> Result<f64, LinkError> {
        self.get_state_data("timestamp")
            .await?
            .as_double()
            .ok_or_else(|| LinkError::ProtocolError("timestamp is not a double".to_string()))
    }

    pub async fn get_actual_q(&self) -> Result<[f64; 6], LinkError> {
        self.get_vector6("actual_q").await
    }

    pub async fn get_actual_tcp_pose(&self) -> Result<Pose, LinkError> {
        Ok(Pose::new(self.get_vector6("actual_TCP_pose").await?))
    }

    pub async fn get_robot_mode(&self) -> Result<i32, LinkError> {
        self.get_state_data("robot_mode")
            .await?
            .as_int32()
            .ok_or_else(|| LinkError::ProtocolError("robot_mode is not an integer".to_string()))
    }

    pub async fn get_runtime_state(&self) -> Result<RuntimeState, LinkError> {
        let raw = self.get_uint32("runtime_state").await?;
        RuntimeState::try_from(raw)
            .map_err(|_| LinkError::ProtocolError(format!("Unknown runtime state {}", raw)))
    }

    pub async fn is_program_running(&self) -> Result<bool, LinkError> {
        Ok(self.get_runtime_state().await? == RuntimeState::Playing)
    }

    async fn safety_bit(&self, bit: SafetyStatusBits) -> Result<bool, LinkError> {
        let bits = self.get_uint32("safety_status_bits").await?;
        Ok(bits & (1 << bit as u32) != 0)
    }

    pub async fn is_protective_stopped(&self) -> Result<bool, LinkError> {
        self.safety_bit(SafetyStatusBits::IsProtectiveStopped).await
    }

    pub async fn is_emergency_stopped(&self) -> Result<bool, LinkError> {
        self.safety_bit(SafetyStatusBits::IsEmergencyStopped).await
    }

    pub async fn disconnect(&mut self) -> Result<(), LinkError> {
        if let Some(stop) = self.stop_receive_thread.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.receive_thread.take() {
            handle
                .await
                .map_err(|e| LinkError::ConnectionError(format!("Receive task failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for RTDEReceive {
    fn drop(&mut self) {
        if let Some(handle) = self.receive_thread.take() {
            handle.abort();
        }
    }
}
