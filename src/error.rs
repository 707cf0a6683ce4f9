/* Errors raised while talking to the robot controller */

#[derive(Debug)]
pub enum LinkError {
    ConnectionError(String),
    ProtocolError(String),
    RobotConnectionTimeout(String),
    RobotNotInRemoteControl(String),
    DashboardError(String),
    ScriptClientError(String),
    NoDataAvailable(String),
    RobotStopped(String),
    InvalidPose(String),
    ConfigError(String),
}

impl std::error::Error for LinkError {}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Self::ProtocolError(msg) => write!(f, "Protocol error: {}", msg),
            Self::RobotConnectionTimeout(msg) => write!(f, "Robot connection timeout: {}", msg),
            Self::RobotNotInRemoteControl(msg) => write!(f, "Robot not in remote control: {}", msg),
            Self::DashboardError(msg) => write!(f, "Dashboard error: {}", msg),
            Self::ScriptClientError(msg) => write!(f, "Script client error: {}", msg),
            Self::NoDataAvailable(msg) => write!(f, "No data available: {}", msg),
            Self::RobotStopped(msg) => write!(f, "Robot stopped: {}", msg),
            Self::InvalidPose(msg) => write!(f, "Invalid pose: {}", msg),
            Self::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::ConnectionError(err.to_string())
    }
}

impl From<String> for LinkError {
    fn from(err: String) -> Self {
        LinkError::ConnectionError(err)
    }
}
