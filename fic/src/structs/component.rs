//! Service component records (FIG 0/2, FIG 0/3, FIG 0/13, FIG 1/4).

use crate::structs::label::Label;
use crate::structs::table::Slot;

/// Transport mechanism identifier (TMId).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportMode {
    /// MSC stream audio.
    #[default]
    StreamAudio,
    /// MSC stream data.
    StreamData,
    /// Reserved.
    Reserved,
    /// MSC packet data.
    PacketData,
}

impl From<u8> for TransportMode {
    fn from(value: u8) -> Self {
        match value & 3 {
            0 => TransportMode::StreamAudio,
            1 => TransportMode::StreamData,
            2 => TransportMode::Reserved,
            _ => TransportMode::PacketData,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioComponent {
    pub sub_ch_id: u8,
    /// Audio service component type (ASCTy).
    pub ascty: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketComponent {
    /// Service component identifier (SCId).
    pub sc_id: u16,
    pub ca_flag: bool,
    /// Filled by FIG 0/3.
    pub sub_ch_id: Option<u8>,
    /// Data service component type (DSCTy).
    pub dscty: u8,
    pub dg_flag: bool,
    pub packet_address: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Audio(AudioComponent),
    Packet(PacketComponent),
}

impl Default for ComponentKind {
    fn default() -> Self {
        ComponentKind::Audio(AudioComponent::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Component {
    pub in_use: bool,
    /// Packet data fully described by FIG 0/3.
    pub made_public: bool,

    pub transport: TransportMode,
    /// Slot of the owning service in the service table.
    pub service: usize,
    /// Position within the owning service's FIG 0/2 entry; 0 is primary.
    pub component_nr: u8,
    pub primary: bool,
    pub kind: ComponentKind,

    /// Service component identifier within the service (SCIdS).
    pub sc_ids: Option<u8>,
    /// User application type (FIG 0/13).
    pub app_type: Option<u16>,
    pub label: Option<Label>,
}

impl Slot for Component {
    fn in_use(&self) -> bool {
        self.in_use
    }
}

impl Component {
    pub fn sub_ch_id(&self) -> Option<u8> {
        match self.kind {
            ComponentKind::Audio(audio) => Some(audio.sub_ch_id),
            ComponentKind::Packet(packet) => packet.sub_ch_id,
        }
    }

    pub fn packet(&self) -> Option<&PacketComponent> {
        match &self.kind {
            ComponentKind::Packet(packet) => Some(packet),
            ComponentKind::Audio(_) => None,
        }
    }
}
