/* Anchor-relative teleoperation of the tool pose */

use crate::error::LinkError;
use crate::pose::Pose;
use crate::robot_link::RobotLink;
use log::debug;
use nalgebra as na;
use tokio::time::Duration;

/// Input reading and tool pose captured together at a resume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub input: na::Vector3<f64>,
    pub tool: Pose,
}

impl Anchor {
    /// Tool pose for `input`: the anchor translation shifted by the input's
    /// displacement since the anchor, rotation left as anchored.
    pub fn target_pose(&self, input: &na::Vector3<f64>) -> Pose {
        let relative = input - self.input;
        let translation = self.tool.translation() + relative;
        Pose::from_parts(&translation, &self.tool.rotation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackState {
    Paused,
    Active(Anchor),
}

pub struct Teleop<L> {
    link: L,
    period: Duration,
    state: TrackState,
}

impl<L: RobotLink> Teleop<L> {
    pub fn new(link: L, period: Duration) -> Self {
        Self { link, period, state: TrackState::Paused }
    }

    /// Re-anchors on the current tool pose and `input_anchor`. The state is
    /// untouched if the pose query fails.
    pub async fn resume(&mut self, input_anchor: na::Vector3<f64>) -> Result<(), LinkError> {
        let tool = self.link.get_tool_pose().await?;
        debug!("Anchored input {:?} to tool pose {:?}", input_anchor.as_slice(), tool.as_slice());
        self.state = TrackState::Active(Anchor { input: input_anchor, tool });
        Ok(())
    }

    pub fn pause(&mut self) {
        self.state = TrackState::Paused;
    }

    /// Sends one servo target for `input`. Returns the commanded pose, or
    /// `None` without touching the link while paused.
    pub async fn track(&mut self, input: &na::Vector3<f64>) -> Result<Option<Pose>, LinkError> {
        let anchor = match &self.state {
            TrackState::Paused => return Ok(None),
            TrackState::Active(anchor) => anchor,
        };

        let target = anchor.target_pose(input);
        self.link.servo_tool(&target, self.period).await?;
        Ok(Some(target))
    }

    pub fn is_paused(&self) -> bool {
        self.state == TrackState::Paused
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        match &self.state {
            TrackState::Paused => None,
            TrackState::Active(anchor) => Some(anchor),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}
