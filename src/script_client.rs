use crate::error::LinkError;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Duration;

pub const SCRIPT_PORT: u16 = 30003;

#[derive(Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connected = 1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveParams {
    pub acceleration: f64,
    pub velocity: f64,
}

pub const MOVE_JOINT_PARAMS: MoveParams = MoveParams { acceleration: 1.4, velocity: 1.05 };
pub const MOVE_TOOL_PARAMS: MoveParams = MoveParams { acceleration: 1.2, velocity: 0.25 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoParams {
    pub lookahead_time: f64,
    pub gain: f64,
}

impl Default for ServoParams {
    fn default() -> Self {
        Self { lookahead_time: 0.1, gain: 300.0 }
    }
}

fn format_list(values: &[f64]) -> String {
    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(", "))
}

/// `p[x, y, z, rx, ry, rz]`
pub fn format_pose(pose: &[f64]) -> String {
    format!("p{}", format_list(pose))
}

pub fn movej(joints: &[f64], params: &MoveParams) -> String {
    format!("movej({}, a={}, v={})\n", format_list(joints), params.acceleration, params.velocity)
}

pub fn movel(pose: &[f64], params: &MoveParams) -> String {
    format!("movel({}, a={}, v={})\n", format_pose(pose), params.acceleration, params.velocity)
}

/// Servo toward a tool pose; the controller resolves the joint target.
pub fn servo_tool(pose: &[f64], period: Duration, params: &ServoParams) -> String {
    format!(
        "servoj(get_inverse_kin({}), t={}, lookahead_time={}, gain={})\n",
        format_pose(pose),
        period.as_secs_f64(),
        params.lookahead_time,
        params.gain
    )
}

pub struct ScriptClient {
    hostname: String,
    port: u16,
    conn_state: ConnectionState,
    stream: Option<TcpStream>,
}

impl ScriptClient {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            port: SCRIPT_PORT,
            conn_state: ConnectionState::Disconnected,
            stream: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub async fn connect(&mut self) -> Result<(), LinkError> {
        let stream = TcpStream::connect((self.hostname.as_str(), self.port))
            .await
            .map_err(|e| format!("Failed to connect to {}:{}: {}", self.hostname, self.port, e))?;
        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        self.conn_state = ConnectionState::Connected;

        debug!("Connected to script interface");
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<(), LinkError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        self.conn_state = ConnectionState::Disconnected;
        debug!("Disconnected from script interface");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn_state == ConnectionState::Connected
    }

    /// Sends URScript to the controller. A new script replaces whatever
    /// program is currently running.
    pub async fn send_script(&mut self, script: &str) -> Result<(), LinkError> {
        if script.trim().is_empty() {
            return Err(LinkError::ScriptClientError("Refusing to send empty script".to_string()));
        }

        match self.stream.as_mut() {
            Some(stream) if self.conn_state == ConnectionState::Connected => {
                stream.write_all(script.as_bytes()).await?;
                Ok(())
            }
            _ => Err(LinkError::ScriptClientError("Script client is not connected".to_string())),
        }
    }
}
