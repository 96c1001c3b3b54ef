//! Read accessors over the decoded ensemble.
//!
//! Every accessor takes the decoder lock for its own duration only, so they
//! are safe to call from notification handlers and from other threads while
//! FIBs are being decoded. Only services that have received a label are
//! visible; components and subchannels are reached through them. Lookups
//! that find nothing return `None` rather than an error.

use std::fmt::Write as _;

use crate::process::ServiceKind;
use crate::process::decode::{DecoderState, FibDecoder};
use crate::structs::component::{Component, ComponentKind, TransportMode};
use crate::structs::ensemble::Ensemble;
use crate::structs::label::Label;
use crate::structs::linking::ServiceLink;
use crate::structs::subchannel::{Protection, Subchannel};

/// Outcome of matching a requested service name against a label, best
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameMatch {
    /// Equal once the space padding of the label is removed.
    Exact,
    /// The label continues with a space after the requested name.
    Word,
    /// The label continues with more text after the requested name.
    Prefix,
    None,
}

/// Matches `name` against the label text `label`. Labels are padded with
/// spaces to 16 characters: `"Radio 1"` is exact for `"Radio 1         "`,
/// a word match for `"Radio 1 Extra   "` and a prefix of `"Radio 10        "`.
/// An empty name matches nothing.
pub fn compare_names(name: &str, label: &str) -> NameMatch {
    if name.is_empty() || !label.starts_with(name) {
        return NameMatch::None;
    }
    if label.trim_end() == name {
        return NameMatch::Exact;
    }

    if label[name.len()..].starts_with(' ') {
        NameMatch::Word
    } else {
        NameMatch::Prefix
    }
}

/// Subchannel fields as seen at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubchannelInfo {
    pub start_addr: u16,
    /// Size in capacity units.
    pub length: u16,
    pub protection: Protection,
    /// kbit/s.
    pub bit_rate: Option<u16>,
    pub fec_scheme: u8,
    pub language: Option<u8>,
}

impl From<&Subchannel> for SubchannelInfo {
    fn from(sub: &Subchannel) -> Self {
        Self {
            start_addr: sub.start_addr,
            length: sub.length,
            protection: sub.protection,
            bit_rate: sub.bit_rate,
            fec_scheme: sub.fec_scheme,
            language: sub.language,
        }
    }
}

/// An audio service component with its subchannel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    pub service_id: u32,
    pub component_nr: u8,
    pub sub_ch_id: u8,
    /// Audio service component type.
    pub ascty: u8,
    /// `None` until the subchannel has been organized.
    pub subchannel: Option<SubchannelInfo>,
    pub label: Option<Label>,
}

/// A packet mode data component with its subchannel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketData {
    pub service_id: u32,
    pub component_nr: u8,
    pub sc_id: u16,
    /// `None` until the component has been described by FIG 0/3.
    pub sub_ch_id: Option<u8>,
    /// Data service component type.
    pub dscty: u8,
    pub dg_flag: bool,
    pub packet_address: u16,
    pub app_type: Option<u16>,
    pub subchannel: Option<SubchannelInfo>,
    pub label: Option<Label>,
}

/// A named service and its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub id: u32,
    pub label: Label,
    pub kind: ServiceKind,
    pub programme_type: u8,
    pub language: Option<u8>,
    pub programme_number: Option<u8>,
    pub audio: Vec<AudioData>,
    pub packet: Vec<PacketData>,
}

impl DecoderState {
    /// Named service whose label matches `name`, judged over the whole
    /// table. The first exact match wins; otherwise a word or prefix match
    /// is accepted only when it is the single best one. `word_match_only`
    /// rejects plain prefixes.
    fn named_service(&self, name: &str, word_match_only: bool) -> Option<usize> {
        let mut best = NameMatch::None;
        let mut found = None;
        let mut ambiguous = false;

        for (index, svc) in self.services.iter().filter(|(_, s)| s.has_name) {
            let quality = compare_names(name, &svc.label.text);
            if quality == NameMatch::Exact {
                return Some(index);
            }

            if quality < best {
                best = quality;
                found = Some(index);
                ambiguous = false;
            } else if quality == best && quality != NameMatch::None {
                ambiguous = true;
            }
        }

        if ambiguous || (word_match_only && best == NameMatch::Prefix) {
            return None;
        }
        found
    }

    fn named_service_by_id(&self, service_id: u32) -> Option<usize> {
        self.find_service(service_id)
            .filter(|&index| self.services.get(index).is_some_and(|s| s.has_name))
    }

    fn subchannel_info(&self, sub_ch_id: Option<u8>) -> Option<SubchannelInfo> {
        sub_ch_id
            .and_then(|id| self.subchannels.get(id as usize))
            .map(SubchannelInfo::from)
    }

    fn kind_of(&self, service: usize) -> ServiceKind {
        let transport = self
            .find_component(service, 0)
            .and_then(|index| self.components.get(index))
            .map(|c| c.transport);

        match transport {
            Some(TransportMode::StreamAudio) => ServiceKind::Audio,
            Some(TransportMode::PacketData) => ServiceKind::Packet,
            _ => ServiceKind::Unknown,
        }
    }

    fn service_id_of(&self, service: usize) -> u32 {
        self.services.get(service).map_or(0, |s| s.service_id)
    }

    fn audio_of(&self, component: &Component) -> Option<AudioData> {
        let ComponentKind::Audio(audio) = component.kind else {
            return None;
        };
        if component.transport != TransportMode::StreamAudio {
            return None;
        }

        Some(AudioData {
            service_id: self.service_id_of(component.service),
            component_nr: component.component_nr,
            sub_ch_id: audio.sub_ch_id,
            ascty: audio.ascty,
            subchannel: self.subchannel_info(Some(audio.sub_ch_id)),
            label: component.label.clone(),
        })
    }

    fn packet_of(&self, component: &Component) -> Option<PacketData> {
        let packet = component.packet()?;

        Some(PacketData {
            service_id: self.service_id_of(component.service),
            component_nr: component.component_nr,
            sc_id: packet.sc_id,
            sub_ch_id: packet.sub_ch_id,
            dscty: packet.dscty,
            dg_flag: packet.dg_flag,
            packet_address: packet.packet_address,
            app_type: component.app_type,
            subchannel: self.subchannel_info(packet.sub_ch_id),
            label: component.label.clone(),
        })
    }

    fn component_of(&self, service: Option<usize>, component_nr: u8) -> Option<&Component> {
        service
            .and_then(|service| self.find_component(service, component_nr))
            .and_then(|index| self.components.get(index))
    }

    fn service_info(&self, index: usize) -> Option<ServiceInfo> {
        let svc = self.services.get(index).filter(|s| s.has_name)?;
        let components: Vec<&Component> = self
            .components
            .iter()
            .filter(|(_, c)| c.service == index)
            .map(|(_, c)| c)
            .collect();

        Some(ServiceInfo {
            id: svc.service_id,
            label: svc.label.clone(),
            kind: self.kind_of(index),
            programme_type: svc.programme_type,
            language: svc.language,
            programme_number: svc.programme_number,
            audio: components.iter().filter_map(|c| self.audio_of(c)).collect(),
            packet: components.iter().filter_map(|c| self.packet_of(c)).collect(),
        })
    }
}

impl FibDecoder {
    /// Id of the service named `name`, allowing an unambiguous prefix.
    pub fn service_id_for(&self, name: &str) -> Option<u32> {
        let state = self.lock();
        state
            .named_service(name, false)
            .map(|index| state.service_id_of(index))
    }

    /// Label text of the service `service_id`.
    pub fn name_for(&self, service_id: u32) -> Option<String> {
        let state = self.lock();
        state
            .named_service_by_id(service_id)
            .and_then(|index| state.services.get(index))
            .map(|svc| svc.label.text.clone())
    }

    pub fn kind_of_service(&self, name: &str) -> ServiceKind {
        let state = self.lock();
        state
            .named_service(name, false)
            .map_or(ServiceKind::Unknown, |index| state.kind_of(index))
    }

    pub fn kind_of_service_id(&self, service_id: u32) -> ServiceKind {
        let state = self.lock();
        state
            .named_service_by_id(service_id)
            .map_or(ServiceKind::Unknown, |index| state.kind_of(index))
    }

    /// Audio component `component_nr` of the service named `name`. The name
    /// must end at a word boundary of the label.
    pub fn audio_data(&self, name: &str, component_nr: u8) -> Option<AudioData> {
        let state = self.lock();
        let service = state.named_service(name, true);
        state
            .component_of(service, component_nr)
            .and_then(|c| state.audio_of(c))
    }

    pub fn audio_data_by_id(&self, service_id: u32, component_nr: u8) -> Option<AudioData> {
        let state = self.lock();
        let service = state.named_service_by_id(service_id);
        state
            .component_of(service, component_nr)
            .and_then(|c| state.audio_of(c))
    }

    /// Packet component `component_nr` of the service named `name`. The
    /// name must end at a word boundary of the label.
    pub fn packet_data(&self, name: &str, component_nr: u8) -> Option<PacketData> {
        let state = self.lock();
        let service = state.named_service(name, true);
        state
            .component_of(service, component_nr)
            .and_then(|c| state.packet_of(c))
    }

    pub fn packet_data_by_id(&self, service_id: u32, component_nr: u8) -> Option<PacketData> {
        let state = self.lock();
        let service = state.named_service_by_id(service_id);
        state
            .component_of(service, component_nr)
            .and_then(|c| state.packet_of(c))
    }

    /// Named services in discovery order.
    pub fn services(&self) -> Vec<ServiceInfo> {
        let state = self.lock();
        state
            .services
            .iter()
            .filter_map(|(index, _)| state.service_info(index))
            .collect()
    }

    pub fn ensemble(&self) -> Ensemble {
        self.lock().ensemble.clone()
    }

    /// Extended country code; lock free.
    pub fn ecc(&self) -> Option<u8> {
        self.counters.ecc()
    }

    /// International table id; lock free.
    pub fn inter_table_id(&self) -> Option<u8> {
        self.counters.inter_table_id()
    }

    /// Linkage sets accumulated since the last flush.
    pub fn service_links(&self) -> Vec<ServiceLink> {
        self.lock().links.links()
    }

    pub fn flush_service_links(&self) -> Vec<ServiceLink> {
        self.lock().links.flush()
    }

    /// Renders ensemble, services, components and subchannels for
    /// diagnostics. Unnamed services are included and marked.
    pub fn dump(&self) -> String {
        let state = self.lock();
        let mut out = String::new();

        let ensemble = &state.ensemble;
        let _ = writeln!(
            out,
            "Ensemble 0x{:04X} \"{}\" ({:?})",
            ensemble.id.unwrap_or(0),
            ensemble.label.as_ref().map_or("", |l| l.text.trim_end()),
            ensemble.state
        );
        if let Some(cif) = self.counters.cif() {
            let _ = writeln!(out, "  CIF count {cif}");
        }
        if let (Some(ecc), Some(table)) = (self.counters.ecc(), self.counters.inter_table_id()) {
            let _ = writeln!(out, "  ECC 0x{ecc:02X}, international table {table}");
        }
        if let Some(dt) = ensemble.date_time {
            let _ = writeln!(
                out,
                "  {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
            );
        }

        for (index, svc) in state.services.iter() {
            let _ = writeln!(
                out,
                "Service 0x{:04X} \"{}\"{} PTy {}",
                svc.service_id,
                svc.label.text.trim_end(),
                if svc.has_name { "" } else { " (unnamed)" },
                svc.programme_type
            );

            for (_, component) in state.components.iter().filter(|(_, c)| c.service == index) {
                let _ = match component.kind {
                    ComponentKind::Audio(audio) => writeln!(
                        out,
                        "  [{}] audio, subchannel {}, ASCTy {}",
                        component.component_nr, audio.sub_ch_id, audio.ascty
                    ),
                    ComponentKind::Packet(packet) => writeln!(
                        out,
                        "  [{}] packet SCId {}, subchannel {:?}, DSCTy {}, address {}",
                        component.component_nr,
                        packet.sc_id,
                        packet.sub_ch_id,
                        packet.dscty,
                        packet.packet_address
                    ),
                };
            }
        }

        for (_, sub) in state.subchannels.iter() {
            let _ = writeln!(
                out,
                "Subchannel {:2}: start {:3}, {:3} CU, {:?}, {} kbit/s, FEC {}",
                sub.sub_ch_id,
                sub.start_addr,
                sub.length,
                sub.protection,
                sub.bit_rate.unwrap_or(0),
                sub.fec_scheme
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fixtures::{FigWriter, fib, fig0, fig1, label_field};

    fn audio_service(sid: u16, sub_ch_id: u8) -> Vec<u8> {
        let payload = FigWriter::new()
            .bits(16, sid as u32)
            .bits(4, 0)
            .bits(4, 1)
            .bits(2, 0)
            .bits(6, 0x3F)
            .bits(6, sub_ch_id as u32)
            .flag(true)
            .flag(false)
            .finish();
        fig0(false, false, false, 2, &payload)
    }

    fn short_subchannel(sub_ch_id: u8, table_index: u8) -> Vec<u8> {
        let payload = FigWriter::new()
            .bits(6, sub_ch_id as u32)
            .bits(10, 0)
            .flag(false)
            .flag(false)
            .bits(6, table_index as u32)
            .finish();
        fig0(false, false, false, 1, &payload)
    }

    fn service_label(sid: u16, text: &str) -> Vec<u8> {
        let mut payload = sid.to_be_bytes().to_vec();
        payload.extend(label_field(text, 0));
        fig1(0, 1, &payload)
    }

    #[test]
    fn name_matching() {
        assert_eq!(compare_names("Test FM", "Test FM"), NameMatch::Exact);
        assert_eq!(compare_names("Test FM", "Test FM         "), NameMatch::Exact);
        assert_eq!(compare_names("Test", "Test FM         "), NameMatch::Word);
        assert_eq!(compare_names("Tes", "Test FM         "), NameMatch::Prefix);
        assert_eq!(compare_names("Test FM Extra", "Test FM"), NameMatch::None);
        assert_eq!(compare_names("Jazz", "Test FM         "), NameMatch::None);
        assert_eq!(compare_names("", "Test FM         "), NameMatch::None);
        assert!(NameMatch::Exact < NameMatch::Word && NameMatch::Word < NameMatch::Prefix);
    }

    #[test]
    fn end_to_end_audio_service() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[audio_service(0x1234, 5), short_subchannel(5, 3)]));
        decoder.process_fib(&fib(&[service_label(0x1234, "Test FM")]));

        let audio = decoder.audio_data("Test FM", 0).unwrap();
        assert_eq!(audio.service_id, 0x1234);
        assert_eq!(audio.sub_ch_id, 5);
        assert_eq!(audio.ascty, 0x3F);
        let sub = audio.subchannel.unwrap();
        assert_eq!(sub.bit_rate, Some(32));
        assert_eq!(sub.length, 29);

        assert_eq!(decoder.audio_data_by_id(0x1234, 0), Some(audio));
        assert_eq!(decoder.kind_of_service("Test FM"), ServiceKind::Audio);
        assert_eq!(decoder.service_id_for("Test"), Some(0x1234));
        assert_eq!(decoder.name_for(0x1234).unwrap().trim_end(), "Test FM");
        assert!(decoder.packet_data("Test FM", 0).is_none());
    }

    #[test]
    fn components_hidden_until_named() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[audio_service(0x2345, 7), short_subchannel(7, 10)]));
        assert!(decoder.audio_data_by_id(0x2345, 0).is_none());
        assert!(decoder.services().is_empty());
        assert_eq!(decoder.kind_of_service_id(0x2345), ServiceKind::Unknown);
        assert_eq!(decoder.name_for(0x2345), None);

        decoder.process_fib(&fib(&[service_label(0x2345, "Late Label")]));
        let audio = decoder.audio_data("Late Label", 0).unwrap();
        assert_eq!(audio.sub_ch_id, 7);
        assert_eq!(decoder.services().len(), 1);
    }

    #[test]
    fn subchannel_after_component() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[audio_service(0x3456, 9), service_label(0x3456, "Order")]));
        let audio = decoder.audio_data("Order", 0).unwrap();
        assert_eq!(audio.subchannel, None);

        decoder.process_fib(&fib(&[short_subchannel(9, 33)]));
        let audio = decoder.audio_data("Order", 0).unwrap();
        assert_eq!(audio.subchannel.unwrap().bit_rate, Some(128));
    }

    #[test]
    fn best_match_over_the_whole_table() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[service_label(0x1002, "Radio 1")]));
        decoder.process_fib(&fib(&[service_label(0x1001, "Radio 1 Extra")]));
        decoder.process_fib(&fib(&[service_label(0x1003, "RadioX")]));

        assert_eq!(decoder.service_id_for("Radio 1"), Some(0x1002));
        assert_eq!(decoder.service_id_for("Radio 1 Extra"), Some(0x1001));
        assert_eq!(decoder.service_id_for("Radio 1 Ex"), Some(0x1001));
        assert_eq!(decoder.service_id_for("RadioX"), Some(0x1003));
        // three labels start with it
        assert_eq!(decoder.service_id_for("Radi"), None);
        assert_eq!(decoder.service_id_for(""), None);
        assert_eq!(decoder.service_id_for("Jazz"), None);
        // word lookups reject prefixes
        assert!(decoder.audio_data("Radi", 0).is_none());
    }

    #[test]
    fn exact_name_beats_earlier_slot() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[
            audio_service(0x1001, 4),
            service_label(0x1001, "Radio 1 Extra"),
        ]));
        decoder.process_fib(&fib(&[
            audio_service(0x1002, 5),
            service_label(0x1002, "Radio 1"),
        ]));

        assert_eq!(decoder.service_id_for("Radio 1"), Some(0x1002));
        assert_eq!(decoder.audio_data("Radio 1", 0).map(|a| a.sub_ch_id), Some(5));
        assert_eq!(decoder.audio_data("Radio 1 Extra", 0).map(|a| a.sub_ch_id), Some(4));
        assert_eq!(decoder.kind_of_service("Radio 1"), ServiceKind::Audio);
    }

    #[test]
    fn ambiguous_word_matches_resolve_to_nothing() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[service_label(0x2001, "Jazz North")]));
        decoder.process_fib(&fib(&[service_label(0x2002, "Jazz South")]));
        decoder.process_fib(&fib(&[service_label(0x2003, "Jazzy")]));

        assert_eq!(decoder.service_id_for("Jazz"), None);
        assert_eq!(decoder.service_id_for("Jazz N"), Some(0x2001));
        assert_eq!(decoder.service_id_for("Jazzy"), Some(0x2003));
    }

    #[test]
    fn dump_lists_everything() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[audio_service(0x4567, 2), short_subchannel(2, 3)]));
        let dump = decoder.dump();

        assert!(dump.contains("Service 0x4567 \"\" (unnamed)"));
        assert!(dump.contains("[0] audio, subchannel 2, ASCTy 63"));
        assert!(dump.contains("Subchannel  2: start   0,  29 CU"));
    }
}
