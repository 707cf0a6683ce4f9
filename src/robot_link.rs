/* Capabilities the teleoperation loop needs from a robot controller */

use crate::error::LinkError;
use crate::pose::Pose;
use tokio::time::Duration;

/// Motion execution and pose queries against a physical or simulated arm.
///
/// Every call may fail with a transport error; callers decide whether to
/// retry. [`crate::rtde_control::RTDEControl`] implements this for UR
/// controllers.
#[allow(async_fn_in_trait)]
pub trait RobotLink {
    /// Current tool pose as reported by the controller.
    async fn get_tool_pose(&mut self) -> Result<Pose, LinkError>;

    /// Streams a short-horizon target. Expected to be called again before
    /// `period` elapses.
    async fn servo_tool(&mut self, target: &Pose, period: Duration) -> Result<(), LinkError>;

    /// Point-to-point move in joint space, returns once the move is done.
    async fn move_joint(&mut self, joints: &[f64; 6]) -> Result<(), LinkError>;

    /// Point-to-point linear move of the tool, returns once the move is done.
    async fn move_tool(&mut self, pose: &Pose) -> Result<(), LinkError>;

    /// Halts whatever motion program is running on the controller.
    async fn stop_script(&mut self) -> Result<(), LinkError>;
}

/// Lets a loop borrow a link it does not own, so the owner can still
/// disconnect it afterwards.
impl<L: RobotLink + ?Sized> RobotLink for &mut L {
    async fn get_tool_pose(&mut self) -> Result<Pose, LinkError> {
        (**self).get_tool_pose().await
    }

    async fn servo_tool(&mut self, target: &Pose, period: Duration) -> Result<(), LinkError> {
        (**self).servo_tool(target, period).await
    }

    async fn move_joint(&mut self, joints: &[f64; 6]) -> Result<(), LinkError> {
        (**self).move_joint(joints).await
    }

    async fn move_tool(&mut self, pose: &Pose) -> Result<(), LinkError> {
        (**self).move_tool(pose).await
    }

    async fn stop_script(&mut self) -> Result<(), LinkError> {
        (**self).stop_script().await
    }
}
