#![allow(dead_code)]

// In-process stand-ins for the controller's RTDE, script and Dashboard ports.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

use ur_teleop::dashboard::DashboardClient;
use ur_teleop::rtde::RTDE;
use ur_teleop::rtde_control::RTDEControl;
use ur_teleop::rtde_receive::RTDEReceive;
use ur_teleop::script_client::ScriptClient;

pub const TCP_POSE: [f64; 6] = [0.2, -0.6, 0.4, 3.14, 0.0, 0.0];
pub const JOINTS: [f64; 6] = [1.57, -1.7, 2.0, -1.87, -1.57, 3.14];
pub const RUNTIME_STOPPED: u32 = 1;
pub const RUNTIME_PLAYING: u32 = 2;
pub const PROTECTIVE_STOPPED: u32 = 1 << 2;

#[derive(Clone)]
pub struct ControllerState {
    pub runtime_state: Arc<AtomicU32>,
    pub safety_status_bits: Arc<AtomicU32>,
    pub tcp_pose: Arc<Mutex<[f64; 6]>>,
    pub scripts: Arc<Mutex<Vec<String>>>,
    pub dashboard_commands: Arc<Mutex<Vec<String>>>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            runtime_state: Arc::new(AtomicU32::new(RUNTIME_STOPPED)),
            safety_status_bits: Arc::new(AtomicU32::new(1)),
            tcp_pose: Arc::new(Mutex::new(TCP_POSE)),
            scripts: Arc::new(Mutex::new(Vec::new())),
            dashboard_commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn dashboard_commands(&self) -> Vec<String> {
        self.dashboard_commands.lock().unwrap().clone()
    }
}

pub async fn read_packet<R: AsyncRead + Unpin>(stream: &mut R) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 3];
    stream.read_exact(&mut header).await.ok()?;
    let size = u16::from_be_bytes([header[0], header[1]]) as usize;
    let mut body = vec![0u8; size.checked_sub(3)?];
    stream.read_exact(&mut body).await.ok()?;
    Some((header[2], body))
}

pub async fn write_packet<W: AsyncWrite + Unpin>(
    stream: &mut W,
    cmd: u8,
    payload: &[u8],
) -> std::io::Result<()> {
    let size = (payload.len() + 3) as u16;
    let mut packet = size.to_be_bytes().to_vec();
    packet.push(cmd);
    packet.extend_from_slice(payload);
    stream.write_all(&packet).await
}

fn field_type(name: &str) -> &'static str {
    match name {
        "timestamp" => "DOUBLE",
        "actual_q" | "actual_TCP_pose" => "VECTOR6D",
        "robot_mode" => "INT32",
        "runtime_state" | "robot_status_bits" | "safety_status_bits" => "UINT32",
        _ => "NOT_FOUND",
    }
}

fn data_package(state: &ControllerState, names: &[String], timestamp: f64) -> Vec<u8> {
    let mut payload = vec![1u8];
    for name in names {
        match name.as_str() {
            "timestamp" => payload.extend_from_slice(&timestamp.to_be_bytes()),
            "actual_q" => JOINTS.iter().for_each(|q| payload.extend_from_slice(&q.to_be_bytes())),
            "actual_TCP_pose" => {
                let pose = *state.tcp_pose.lock().unwrap();
                pose.iter().for_each(|v| payload.extend_from_slice(&v.to_be_bytes()));
            }
            "robot_mode" => payload.extend_from_slice(&7i32.to_be_bytes()),
            "runtime_state" => {
                payload.extend_from_slice(&state.runtime_state.load(Ordering::SeqCst).to_be_bytes())
            }
            "robot_status_bits" => payload.extend_from_slice(&3u32.to_be_bytes()),
            "safety_status_bits" => payload
                .extend_from_slice(&state.safety_status_bits.load(Ordering::SeqCst).to_be_bytes()),
            other => panic!("no fake data for {}", other),
        }
    }
    payload
}

/// Fake RTDE server. `unknown_field` is answered with NOT_FOUND.
pub async fn spawn_rtde(state: ControllerState, unknown_field: Option<&'static str>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut names: Vec<String> = Vec::new();

        loop {
            let Some((cmd, body)) = read_packet(&mut stream).await else {
                return;
            };
            match cmd {
                b'V' => {
                    assert_eq!(body, vec![0, 2]);
                    write_packet(&mut stream, b'V', &[1]).await.unwrap();
                }
                b'v' => {
                    let mut text = vec![5u8];
                    text.extend_from_slice(b"hello");
                    text.push(4);
                    text.extend_from_slice(b"fake");
                    text.push(3);
                    write_packet(&mut stream, b'M', &text).await.unwrap();

                    let mut version = Vec::new();
                    for v in [5u32, 11, 0, 0] {
                        version.extend_from_slice(&v.to_be_bytes());
                    }
                    write_packet(&mut stream, b'v', &version).await.unwrap();
                }
                b'O' => {
                    let requested = String::from_utf8(body[8..].to_vec()).unwrap();
                    names = requested.split(',').map(str::to_string).collect();
                    let types: Vec<&str> = names
                        .iter()
                        .map(|n| {
                            if Some(n.as_str()) == unknown_field {
                                "NOT_FOUND"
                            } else {
                                field_type(n)
                            }
                        })
                        .collect();
                    let mut reply = vec![1u8];
                    reply.extend_from_slice(types.join(",").as_bytes());
                    write_packet(&mut stream, b'O', &reply).await.unwrap();
                }
                b'S' => {
                    write_packet(&mut stream, b'S', &[1]).await.unwrap();
                    break;
                }
                other => panic!("unexpected RTDE command {}", other),
            }
        }

        stream_data(stream, state, names).await;
    });

    port
}

async fn stream_data(stream: TcpStream, state: ControllerState, names: Vec<String>) {
    let (mut rd, mut wr) = stream.into_split();
    let (pause_tx, mut pause_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some((cmd, _)) = read_packet(&mut rd).await {
            if cmd == b'P' && pause_tx.send(()).is_err() {
                return;
            }
        }
    });

    let mut timestamp = 0.0;
    loop {
        tokio::select! {
            Some(()) = pause_rx.recv() => {
                let _ = write_packet(&mut wr, b'P', &[1]).await;
                return;
            }
            _ = sleep(Duration::from_millis(2)) => {
                timestamp += 0.002;
                let package = data_package(&state, &names, timestamp);
                if write_packet(&mut wr, b'U', &package).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Fake script port. Moves run as a program for `move_duration`.
pub async fn spawn_script_server(state: ControllerState, move_duration: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let is_move = line.starts_with("movej") || line.starts_with("movel");
            state.scripts.lock().unwrap().push(line);
            if is_move {
                state.runtime_state.store(RUNTIME_PLAYING, Ordering::SeqCst);
                let runtime_state = state.runtime_state.clone();
                tokio::spawn(async move {
                    sleep(move_duration).await;
                    runtime_state.store(RUNTIME_STOPPED, Ordering::SeqCst);
                });
            }
        }
    });

    port
}

/// Fake Dashboard server answering `is in remote control` and `stop`.
pub async fn spawn_dashboard(
    state: ControllerState,
    remote_control: bool,
    stop_reply: &'static str,
) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (rd, mut wr) = stream.into_split();
        wr.write_all(b"Connected: Universal Robots Dashboard Server\n").await.unwrap();

        let mut lines = BufReader::new(rd).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = match line.as_str() {
                "is in remote control" => remote_control.to_string(),
                "stop" => stop_reply.to_string(),
                other => format!("could not understand: '{}'", other),
            };
            state.dashboard_commands.lock().unwrap().push(line);
            if wr.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                return;
            }
        }
    });

    port
}

pub async fn connect_receive(state: &ControllerState) -> RTDEReceive {
    let port = spawn_rtde(state.clone(), None).await;
    RTDEReceive::connect(RTDE::new("127.0.0.1").with_port(port), 500.0).await.unwrap()
}

/// A full link wired to fresh fake servers.
pub async fn connect_control(state: &ControllerState, move_duration: Duration) -> RTDEControl {
    let receive = connect_receive(state).await;

    let script_port = spawn_script_server(state.clone(), move_duration).await;
    let mut script_client = ScriptClient::new("127.0.0.1").with_port(script_port);
    script_client.connect().await.unwrap();

    let dashboard_port = spawn_dashboard(state.clone(), true, "Stopped").await;
    let mut db_client = DashboardClient::new("127.0.0.1").with_port(dashboard_port);
    db_client.connect().await.unwrap();

    RTDEControl::from_parts("127.0.0.1", receive, script_client, db_client)
}

/// Polls `condition` until it holds or a second has passed.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(1) {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(2)).await;
    }
    condition()
}
