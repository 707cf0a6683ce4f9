use crate::error::LinkError;
use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

pub const DASHBOARD_PORT: u16 = 29999;

#[derive(Debug, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connected,
}

pub struct DashboardClient {
    hostname: String,
    port: u16,
    conn_state: ConnectionState,
    reader: Option<BufReader<TcpStream>>,
}

impl DashboardClient {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            port: DASHBOARD_PORT,
            conn_state: ConnectionState::Disconnected,
            reader: None,
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

        self.conn_state = ConnectionState::Connected;
        self.reader = Some(BufReader::new(stream));

        let intro_msg = self.receive().await?;
        debug!("Intro msg {:?}", intro_msg);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn_state == ConnectionState::Connected
    }

    pub async fn disconnect(&mut self) -> Result<(), LinkError> {
        if let Some(reader) = self.reader.take() {
            let mut stream = reader.into_inner();
            stream.shutdown().await?;
        }
        self.conn_state = ConnectionState::Disconnected;
        Ok(())
    }

    pub async fn send(&mut self, command: &str) -> Result<(), LinkError> {
        if let Some(reader) = &mut self.reader {
            let stream = reader.get_mut();
            stream.write_all(command.as_bytes()).await?;
            return Ok(());
        }
        Err(LinkError::ConnectionError("Dashboard stream is not connected".into()))
    }

    /// Reads one reply line, without the line terminator.
    pub async fn receive(&mut self) -> Result<String, LinkError> {
        if let Some(reader) = &mut self.reader {
            let mut line = String::new();
            let read = reader.read_line(&mut line).await?;
            if read == 0 {
                self.conn_state = ConnectionState::Disconnected;
                return Err(LinkError::ConnectionError("Dashboard closed the connection".into()));
            }
            return Ok(line.trim_end().to_string());
        }
        Err(LinkError::ConnectionError("Dashboard stream is not connected".into()))
    }

    async fn request(&mut self, command: &str) -> Result<String, LinkError> {
        self.send(&format!("{}\n", command)).await?;
        let reply = self.receive().await?;
        debug!("{}: {}", command, reply);
        Ok(reply)
    }

    // Dashboard commands

    pub async fn stop(&mut self) -> Result<(), LinkError> {
        let result = self.request("stop").await?;
        if !result.starts_with("Stopped") {
            return Err(LinkError::DashboardError(format!("Failed to stop: {}", result)));
        }
        Ok(())
    }

    pub async fn is_in_remote_control(&mut self) -> Result<bool, LinkError> {
        let result = self.request("is in remote control").await?;
        Ok(result == "true")
    }
}
