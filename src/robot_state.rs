// Shared Robot State

use crate::error::LinkError;
use crate::utils::PacketReader;
use phf::phf_map;
use std::collections::HashMap;

// Wire types the controller reports for each output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Uint8,
    Uint32,
    Uint64,
    Int32,
    Double,
    Vector3d,
    Vector6d,
    Vector6Int32,
    Vector6Uint32,
}

static FIELD_TYPES: phf::Map<&'static str, FieldType> = phf_map! {
    "BOOL" => FieldType::Bool,
    "UINT8" => FieldType::Uint8,
    "UINT32" => FieldType::Uint32,
    "UINT64" => FieldType::Uint64,
    "INT32" => FieldType::Int32,
    "DOUBLE" => FieldType::Double,
    "VECTOR3D" => FieldType::Vector3d,
    "VECTOR6D" => FieldType::Vector6d,
    "VECTOR6INT32" => FieldType::Vector6Int32,
    "VECTOR6UINT32" => FieldType::Vector6Uint32,
};

impl FieldType {
    pub fn parse(name: &str) -> Result<Self, LinkError> {
        FIELD_TYPES
            .get(name.trim())
            .copied()
            .ok_or_else(|| LinkError::ProtocolError(format!("Unsupported field type: {}", name)))
    }

    pub(crate) fn unpack(&self, reader: &mut PacketReader) -> Result<StateValue, LinkError> {
        Ok(match self {
            FieldType::Bool => StateValue::Boolean(reader.get_bool()?),
            FieldType::Uint8 => StateValue::Uint8(reader.get_u8()?),
            FieldType::Uint32 => StateValue::Uint32(reader.get_u32()?),
            FieldType::Uint64 => StateValue::Uint64(reader.get_u64()?),
            FieldType::Int32 => StateValue::Int32(reader.get_i32()?),
            FieldType::Double => StateValue::Double(reader.get_double()?),
            FieldType::Vector3d => StateValue::VectorDouble(reader.get_vector_double(3)?),
            FieldType::Vector6d => StateValue::VectorDouble(reader.get_vector_double(6)?),
            FieldType::Vector6Int32 => StateValue::VectorInt(reader.get_vector_i32(6)?),
            FieldType::Vector6Uint32 => StateValue::VectorInt(
                (0..6).map(|_| reader.get_u32().map(|v| v as i32)).collect::<Result<_, _>>()?,
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    VectorDouble(Vec<f64>),
    VectorInt(Vec<i32>),
    Boolean(bool),
    Uint8(u8),
    Uint32(u32),
    Uint64(u64),
    Int32(i32),
    Double(f64),
}

impl StateValue {
    pub fn as_vec_double(&self) -> Option<&[f64]> {
        match self {
            StateValue::VectorDouble(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_uint32(&self) -> Option<u32> {
        match self {
            StateValue::Uint32(x) => Some(*x),
            StateValue::Uint8(x) => Some(*x as u32),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self {
            StateValue::Int32(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            StateValue::Double(x) => Some(*x),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RobotState {
    state_data: HashMap<String, StateValue>,
    first_state_received: bool,
}

impl RobotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_state_received(&self) -> bool {
        self.first_state_received
    }

    pub fn get_state_data(&self, name: &str) -> Result<&StateValue, LinkError> {
        self.state_data
            .get(name)
            .ok_or_else(|| LinkError::NoDataAvailable(format!("State data not found: {}", name)))
    }

    /// Decodes one data package body laid out as `fields` describes.
    pub(crate) fn update_from_packet(
        &mut self,
        fields: &[(String, FieldType)],
        reader: &mut PacketReader,
    ) -> Result<(), LinkError> {
        let mut values = Vec::with_capacity(fields.len());
        for (_, field_type) in fields {
            values.push(field_type.unpack(reader)?);
        }
        for ((name, _), value) in fields.iter().zip(values) {
            self.state_data.insert(name.clone(), value);
        }
        self.first_state_received = true;
        Ok(())
    }
}
