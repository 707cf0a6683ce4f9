pub mod config;
pub mod dashboard;
pub mod error;
pub mod harness;
pub mod input;
pub mod pose;
pub mod robot_link;
pub mod robot_state;
pub mod rtde;
pub mod rtde_control;
pub mod rtde_receive;
pub mod script_client;
pub mod teleop;
mod utils;

pub use error::LinkError;
pub use log;
pub use pose::Pose;
pub use robot_link::RobotLink;
pub use teleop::Teleop;

pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    env_logger::builder().try_init().ok();
}
