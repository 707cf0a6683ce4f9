/* RTDE Protocol */

use crate::error::LinkError;
use crate::robot_state::{FieldType, RobotState};
use crate::utils::{
    pack_double, pack_packet, pack_u16, read_rtde_header, PacketReader, RTDE_HEADER_SIZE,
};
use log::{debug, error, info, warn};
use num_enum::TryFromPrimitive;
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

pub const RTDE_PORT: u16 = 30004;
pub const RTDE_PROTOCOL_VERSION: u16 = 2;
pub const RTDE_START_SYNCHRONIZATION_TIMEOUT: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum RTDECommand {
    RtdeRequestProtocolVersion = 86,
    RtdeGetUrcontrolVersion = 118,
    RtdeTextMessage = 77,
    RtdeDataPackage = 85,
    RtdeControlPackageSetupOutputs = 79,
    RtdeControlPackageSetupInputs = 73,
    RtdeControlPackageStart = 83,
    RtdeControlPackagePause = 80,
}

#[derive(Debug, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connected,
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerVersion {
    pub major: u32,
    pub minor: u32,
    pub bugfix: u32,
    pub build: u32,
}

pub struct RTDE {
    hostname: String,
    port: u16,
    conn_state: ConnectionState,
    stream: Option<TcpStream>,
    output_recipe_id: Option<u8>,
    output_fields: Vec<(String, FieldType)>,
}

impl RTDE {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            port: RTDE_PORT,
            conn_state: ConnectionState::Disconnected,
            stream: None,
            output_recipe_id: None,
            output_fields: Vec::new(),
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

        let sock = SockRef::from(&stream);
        sock.set_reuse_address(true)?;

        self.stream = Some(stream);
        self.conn_state = ConnectionState::Connected;
        debug!("Connected to RTDE at {}:{}", self.hostname, self.port);
        Ok(())
    }

    pub async fn disconnect(&mut self, send_pause: bool) -> Result<(), LinkError> {
        if send_pause && self.conn_state == ConnectionState::Started {
            if let Err(e) = self.send_pause().await {
                warn!("Failed to pause RTDE before disconnecting: {}", e);
            }
        }

        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }

        self.conn_state = ConnectionState::Disconnected;
        debug!("Disconnected from robot");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn_state == ConnectionState::Connected || self.conn_state == ConnectionState::Started
    }

    pub fn is_started(&self) -> bool {
        self.conn_state == ConnectionState::Started
    }

    pub fn output_fields(&self) -> &[(String, FieldType)] {
        &self.output_fields
    }

    pub async fn negotiate_protocol_version(&mut self) -> Result<(), LinkError> {
        let cmd = RTDECommand::RtdeRequestProtocolVersion;
        self.send_all(cmd, &pack_u16(RTDE_PROTOCOL_VERSION)).await?;
        debug!("Done sending RTDE_REQUEST_PROTOCOL_VERSION");

        let reply = self.receive_reply(cmd).await?;
        if !PacketReader::new(&reply).get_bool()? {
            return Err(LinkError::ProtocolError(format!(
                "Controller refused RTDE protocol version {}",
                RTDE_PROTOCOL_VERSION
            )));
        }
        Ok(())
    }

    pub async fn get_controller_version(&mut self) -> Result<ControllerVersion, LinkError> {
        let cmd = RTDECommand::RtdeGetUrcontrolVersion;
        self.send_all(cmd, &[]).await?;
        debug!("Done sending RTDE_GET_URCONTROL_VERSION");

        let reply = self.receive_reply(cmd).await?;
        let mut reader = PacketReader::new(&reply);
        Ok(ControllerVersion {
            major: reader.get_u32()?,
            minor: reader.get_u32()?,
            bugfix: reader.get_u32()?,
            build: reader.get_u32()?,
        })
    }

    /// Subscribes to `output_names` at `frequency` Hz. Fails if the
    /// controller does not know one of the names.
    pub async fn send_output_setup(
        &mut self,
        output_names: &[&str],
        frequency: f64,
    ) -> Result<(), LinkError> {
        let cmd = RTDECommand::RtdeControlPackageSetupOutputs;
        let mut payload = pack_double(frequency).to_vec();
        payload.extend_from_slice(output_names.join(",").as_bytes());
        self.send_all(cmd, &payload).await?;
        debug!("Done sending RTDE_CONTROL_PACKAGE_SETUP_OUTPUTS");

        let reply = self.receive_reply(cmd).await?;
        let mut reader = PacketReader::new(&reply);
        let recipe_id = reader.get_u8()?;
        let types = reader.get_rest_string();
        let types: Vec<&str> = types.trim_end_matches('\0').split(',').collect();

        if types.len() != output_names.len() {
            return Err(LinkError::ProtocolError(format!(
                "Output setup returned {} types for {} fields",
                types.len(),
                output_names.len()
            )));
        }

        let mut fields = Vec::with_capacity(output_names.len());
        for (name, type_name) in output_names.iter().zip(types) {
            if type_name.trim() == "NOT_FOUND" {
                return Err(LinkError::ProtocolError(format!("Unknown output field: {}", name)));
            }
            fields.push((name.to_string(), FieldType::parse(type_name)?));
        }

        self.output_recipe_id = Some(recipe_id);
        self.output_fields = fields;
        Ok(())
    }

    pub async fn send_start(&mut self) -> Result<(), LinkError> {
        let cmd = RTDECommand::RtdeControlPackageStart;
        self.send_all(cmd, &[]).await?;
        debug!("Done sending RTDE_CONTROL_PACKAGE_START");

        let reply = self.receive_reply(cmd).await?;
        if !PacketReader::new(&reply).get_bool()? {
            return Err(LinkError::ProtocolError("Controller refused to start RTDE".into()));
        }
        self.conn_state = ConnectionState::Started;
        Ok(())
    }

    pub async fn send_pause(&mut self) -> Result<(), LinkError> {
        let cmd = RTDECommand::RtdeControlPackagePause;
        self.send_all(cmd, &[]).await?;
        debug!("Done sending RTDE_CONTROL_PACKAGE_PAUSE");

        let reply = self.receive_reply(cmd).await?;
        if !PacketReader::new(&reply).get_bool()? {
            return Err(LinkError::ProtocolError("Controller refused to pause RTDE".into()));
        }
        self.conn_state = ConnectionState::Connected;
        Ok(())
    }

    /// Waits for the next data package and decodes it into `robot_state`.
    pub async fn receive_data(
        &mut self,
        robot_state: &Mutex<RobotState>,
    ) -> Result<(), LinkError> {
        let body = self.receive_reply(RTDECommand::RtdeDataPackage).await?;
        let mut reader = PacketReader::new(&body);

        let recipe_id = reader.get_u8()?;
        if Some(recipe_id) != self.output_recipe_id {
            return Err(LinkError::ProtocolError(format!(
                "Data package for unexpected recipe {}",
                recipe_id
            )));
        }

        robot_state.lock().await.update_from_packet(&self.output_fields, &mut reader)?;
        if reader.remaining() > 0 {
            warn!("Ignoring {} trailing bytes in data package", reader.remaining());
        }
        Ok(())
    }

    pub async fn send_all(&mut self, command: RTDECommand, payload: &[u8]) -> Result<(), LinkError> {
        let packet = pack_packet(command as u8, payload)?;
        let stream = self.stream_mut()?;
        stream.write_all(&packet).await?;
        Ok(())
    }

    /// Reads packets until one of type `expected` arrives. Text messages are
    /// logged; stray data packages are dropped.
    async fn receive_reply(&mut self, expected: RTDECommand) -> Result<Vec<u8>, LinkError> {
        loop {
            let (command, body) = self.receive_packet().await?;
            if command == expected {
                return Ok(body);
            }
            match command {
                RTDECommand::RtdeTextMessage => log_text_message(&body),
                RTDECommand::RtdeDataPackage => debug!("Skipping data package"),
                other => {
                    return Err(LinkError::ProtocolError(format!(
                        "Expected {:?}, received {:?}",
                        expected, other
                    )))
                }
            }
        }
    }

    async fn receive_packet(&mut self) -> Result<(RTDECommand, Vec<u8>), LinkError> {
        let stream = self.stream_mut()?;

        let mut header = [0u8; RTDE_HEADER_SIZE];
        stream.read_exact(&mut header).await?;
        let header = read_rtde_header(&header)?;

        let msg_size = header.msg_size as usize;
        if msg_size < RTDE_HEADER_SIZE {
            return Err(LinkError::ProtocolError(format!("Invalid packet size {}", msg_size)));
        }

        let mut body = vec![0u8; msg_size - RTDE_HEADER_SIZE];
        stream.read_exact(&mut body).await?;

        let command = RTDECommand::try_from(header.msg_cmd).map_err(|_| {
            LinkError::ProtocolError(format!("Unknown RTDE command {}", header.msg_cmd))
        })?;
        Ok((command, body))
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, LinkError> {
        self.stream
            .as_mut()
            .ok_or_else(|| LinkError::ConnectionError("RTDE stream is not connected".into()))
    }
}

fn parse_text_message(body: &[u8]) -> Result<(String, String, u8), LinkError> {
    let mut reader = PacketReader::new(body);
    let message = reader.get_short_string()?;
    let source = reader.get_short_string()?;
    let level = reader.get_u8()?;
    Ok((message, source, level))
}

fn log_text_message(body: &[u8]) {
    match parse_text_message(body) {
        Ok((message, source, level)) => match level {
            0 | 1 => error!("RTDE {}: {}", source, message),
            2 => warn!("RTDE {}: {}", source, message),
            _ => info!("RTDE {}: {}", source, message),
        },
        Err(e) => warn!("Malformed RTDE text message: {}", e),
    }
}
