use tokio::time::Duration;
use ur_teleop::config::DEFAULT_HOSTNAME;
use ur_teleop::init_logging;
use ur_teleop::rtde_receive::RTDEReceive;

use log::error;

async fn print_tool_pose(hostname: &str) {
    let rtde = match RTDEReceive::new(hostname).await {
        Ok(rtde) => rtde,
        Err(e) => {
            error!("Failed to connect to {}: {}", hostname, e);
            return;
        }
    };

    loop {
        match rtde.get_actual_tcp_pose().await {
            Ok(pose) => println!("Tool pose: {:?}", pose.as_slice()),
            Err(e) => {
                error!("{}", e);
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let hostname = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
    print_tool_pose(&hostname).await;
}
