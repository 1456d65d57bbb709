/// Controls the decoding of transmitted and received data at the application,
/// frame, and physical layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLevel {
    /// Controls decoding of the protocol data unit (function codes and data)
    pub pdu: PduDecodeLevel,
    /// Controls decoding of the MBAP header
    pub adu: AduDecodeLevel,
    /// Controls logging of the raw bytes read from and written to the stream
    pub physical: PhysDecodeLevel,
}

/// Controls how transmitted and received Protocol Data Units (PDUs) are decoded
/// at the INFO log level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PduDecodeLevel {
    /// Decode nothing
    Nothing,
    /// Decode the function code only
    FunctionCode,
}

/// Controls how the MBAP header of transmitted and received frames is decoded
/// at the INFO log level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AduDecodeLevel {
    /// Decode nothing
    Nothing,
    /// Decode the header
    Header,
    /// Decode the header and the raw payload as hexadecimal
    Payload,
}

/// Controls how data transmitted at the physical layer is logged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysDecodeLevel {
    /// Log nothing
    Nothing,
    /// Log only the length of data that is sent and received
    Length,
    /// Log the length and the actual data that is sent and received
    Data,
}

impl DecodeLevel {
    /// construct a `DecodeLevel` with nothing enabled
    pub fn nothing() -> Self {
        Self::default()
    }

    /// construct a `DecodeLevel` from its fields
    pub fn new(pdu: PduDecodeLevel, adu: AduDecodeLevel, physical: PhysDecodeLevel) -> Self {
        DecodeLevel { pdu, adu, physical }
    }

    /// replace the PDU decode level
    pub fn pdu(self, pdu: PduDecodeLevel) -> Self {
        Self { pdu, ..self }
    }

    /// replace the ADU decode level
    pub fn adu(self, adu: AduDecodeLevel) -> Self {
        Self { adu, ..self }
    }

    /// replace the physical-layer decode level
    pub fn physical(self, physical: PhysDecodeLevel) -> Self {
        Self { physical, ..self }
    }
}

impl Default for DecodeLevel {
    fn default() -> Self {
        Self {
            pdu: PduDecodeLevel::Nothing,
            adu: AduDecodeLevel::Nothing,
            physical: PhysDecodeLevel::Nothing,
        }
    }
}

impl PduDecodeLevel {
    pub(crate) fn enabled(&self) -> bool {
        match self {
            PduDecodeLevel::Nothing => false,
            PduDecodeLevel::FunctionCode => true,
        }
    }
}

impl AduDecodeLevel {
    pub(crate) fn enabled(&self) -> bool {
        self.header_enabled()
    }

    pub(crate) fn header_enabled(&self) -> bool {
        match self {
            AduDecodeLevel::Nothing => false,
            AduDecodeLevel::Header => true,
            AduDecodeLevel::Payload => true,
        }
    }

    pub(crate) fn payload_enabled(&self) -> bool {
        match self {
            AduDecodeLevel::Nothing => false,
            AduDecodeLevel::Header => false,
            AduDecodeLevel::Payload => true,
        }
    }
}

impl PhysDecodeLevel {
    pub(crate) fn enabled(&self) -> bool {
        self.length_enabled()
    }

    pub(crate) fn length_enabled(&self) -> bool {
        match self {
            PhysDecodeLevel::Nothing => false,
            PhysDecodeLevel::Length => true,
            PhysDecodeLevel::Data => true,
        }
    }

    pub(crate) fn data_enabled(&self) -> bool {
        match self {
            PhysDecodeLevel::Nothing => false,
            PhysDecodeLevel::Length => false,
            PhysDecodeLevel::Data => true,
        }
    }
}
