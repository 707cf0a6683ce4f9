/* Teleoperation session parameters */

use crate::error::LinkError;
use crate::pose::Pose;
use tokio::time::Duration;

pub const DEFAULT_HOSTNAME: &str = "192.168.1.102";
pub const DEFAULT_CONTROL_PERIOD: f64 = 0.01;
pub const DEFAULT_STEP: f64 = 0.001;
pub const HOME_JOINTS: [f64; 6] = [1.57, -1.7, 2.0, -1.87, -1.57, 3.14];
pub const HOME_POSE: Pose = Pose::new([0.2, -0.6, 0.4, 3.14, 0.0, 0.0]);

#[derive(Debug, Clone, PartialEq)]
pub struct TeleopConfig {
    pub hostname: String,
    pub control_period: Duration,
    /// Displacement per key edge, in metres.
    pub step: f64,
    pub home_joints: [f64; 6],
    pub home_pose: Pose,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            control_period: Duration::from_secs_f64(DEFAULT_CONTROL_PERIOD),
            step: DEFAULT_STEP,
            home_joints: HOME_JOINTS,
            home_pose: HOME_POSE,
        }
    }
}

impl TeleopConfig {
    /// Parses `[hostname] [period_s] [step]`, program name excluded.
    /// Missing arguments keep their defaults.
    pub fn from_args<I, S>(args: I) -> Result<Self, LinkError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        if let Some(hostname) = args.next() {
            config.hostname = hostname.as_ref().to_string();
        }
        if let Some(period) = args.next() {
            let period = parse_positive("period", period.as_ref())?;
            config.control_period = Duration::from_secs_f64(period);
        }
        if let Some(step) = args.next() {
            config.step = parse_positive("step", step.as_ref())?;
        }
        if let Some(extra) = args.next() {
            return Err(LinkError::ConfigError(format!("Unexpected argument: {}", extra.as_ref())));
        }

        Ok(config)
    }
}

fn parse_positive(name: &str, value: &str) -> Result<f64, LinkError> {
    let parsed: f64 = value
        .parse()
        .map_err(|e| LinkError::ConfigError(format!("Invalid {} {:?}: {}", name, value, e)))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(LinkError::ConfigError(format!("{} must be positive, got {}", name, value)));
    }
    Ok(parsed)
}
