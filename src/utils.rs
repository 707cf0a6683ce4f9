// RTDE Utility functions for byte manipulation

use crate::error::LinkError;

#[derive(Debug, PartialEq, Eq)]
pub struct RTDEControlHeader {
    pub msg_size: u16,
    pub msg_cmd: u8,
}

pub const RTDE_HEADER_SIZE: usize = 3;

/// Big-endian cursor over a received packet.
pub struct PacketReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], LinkError> {
        let end = self.offset + N;
        let bytes = self.data.get(self.offset..end).ok_or_else(|| {
            LinkError::ProtocolError(format!(
                "Packet too short: need {} bytes at offset {}, have {}",
                N,
                self.offset,
                self.data.len()
            ))
        })?;
        self.offset = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, LinkError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, LinkError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16, LinkError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, LinkError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn get_u64(&mut self) -> Result<u64, LinkError> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub fn get_i32(&mut self) -> Result<i32, LinkError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn get_double(&mut self) -> Result<f64, LinkError> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    pub fn get_vector_double(&mut self, n: usize) -> Result<Vec<f64>, LinkError> {
        (0..n).map(|_| self.get_double()).collect()
    }

    pub fn get_vector_i32(&mut self, n: usize) -> Result<Vec<i32>, LinkError> {
        (0..n).map(|_| self.get_i32()).collect()
    }

    /// Everything left in the packet, as text.
    pub fn get_rest_string(&mut self) -> String {
        let rest = &self.data[self.offset..];
        self.offset = self.data.len();
        String::from_utf8_lossy(rest).into_owned()
    }

    /// A u8 length prefix followed by that many bytes of text.
    pub fn get_short_string(&mut self) -> Result<String, LinkError> {
        let len = self.get_u8()? as usize;
        let end = self.offset + len;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| LinkError::ProtocolError("String runs past end of packet".into()))?;
        self.offset = end;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

pub fn read_rtde_header(data: &[u8]) -> Result<RTDEControlHeader, LinkError> {
    let mut reader = PacketReader::new(data);
    Ok(RTDEControlHeader { msg_size: reader.get_u16()?, msg_cmd: reader.get_u8()? })
}

/// Header plus payload, with the size field covering both.
pub fn pack_packet(command: u8, payload: &[u8]) -> Result<Vec<u8>, LinkError> {
    let size = u16::try_from(RTDE_HEADER_SIZE + payload.len())
        .map_err(|_| LinkError::ProtocolError(format!("Payload too large: {}", payload.len())))?;
    let mut packet = Vec::with_capacity(size as usize);
    packet.extend_from_slice(&size.to_be_bytes());
    packet.push(command);
    packet.extend_from_slice(payload);
    Ok(packet)
}

pub fn pack_double(value: f64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn pack_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}
