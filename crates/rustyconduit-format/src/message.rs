//! Header message type codes.

/// Message types this crate reads or writes. Everything else is carried as
/// [`MessageType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Nil,
    Dataspace,
    LinkInfo,
    Datatype,
    FillValue,
    Link,
    DataLayout,
    GroupInfo,
    FilterPipeline,
    Attribute,
    Continuation,
    Other(u16),
}

/// Known codes; one table serves both directions.
const CODES: [(MessageType, u16); 11] = [
    (MessageType::Nil, 0x00),
    (MessageType::Dataspace, 0x01),
    (MessageType::LinkInfo, 0x02),
    (MessageType::Datatype, 0x03),
    (MessageType::FillValue, 0x05),
    (MessageType::Link, 0x06),
    (MessageType::DataLayout, 0x08),
    (MessageType::GroupInfo, 0x0A),
    (MessageType::FilterPipeline, 0x0B),
    (MessageType::Attribute, 0x0C),
    (MessageType::Continuation, 0x10),
];

impl MessageType {
    pub fn from_u16(v: u16) -> Self {
        CODES
            .iter()
            .find(|(_, code)| *code == v)
            .map_or(MessageType::Other(v), |(ty, _)| *ty)
    }

    pub fn to_u16(self) -> u16 {
        match self {
            MessageType::Other(v) => v,
            known => CODES
                .iter()
                .find(|(ty, _)| *ty == known)
                .map_or(0, |(_, code)| *code),
        }
    }
}
