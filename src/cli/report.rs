use std::fmt::{self, Display};
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::{Serialize, Serializer};

use fic::process::decode::FibDecoder;
use fic::process::query::{AudioData, PacketData, ServiceInfo, SubchannelInfo};
use fic::structs::linking::ServiceLink;

/// Identifier rendered as upper-case hex with a `0x` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hex(u32);

impl Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl Serialize for Hex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Statistics {
    pub fibs: u64,
    pub crc_errors: u64,
}

#[derive(Debug, Serialize)]
pub struct EnsembleReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Hex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ecc: Option<Hex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inter_table_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_time_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cif_count: Option<u32>,
    statistics: Statistics,
    services: Vec<ServiceReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    links: Vec<LinkReport>,
}

#[derive(Debug, Serialize)]
struct ServiceReport {
    id: Hex,
    label: String,
    short_label: String,
    kind: String,
    programme_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    programme_number: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    audio: Vec<AudioReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    packet: Vec<PacketReport>,
}

#[derive(Debug, Serialize)]
struct SubchannelReport {
    start_addr: u16,
    length: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    protection: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protection_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bit_rate: Option<u16>,
    fec_scheme: u8,
}

#[derive(Debug, Serialize)]
struct AudioReport {
    component: u8,
    sub_ch_id: u8,
    ascty: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    subchannel: Option<SubchannelReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct PacketReport {
    component: u8,
    sc_id: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_ch_id: Option<u8>,
    dscty: u8,
    packet_address: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_type: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subchannel: Option<SubchannelReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinkReport {
    lsn: Hex,
    active: bool,
    hard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<Hex>,
    members: Vec<Hex>,
}

impl From<&SubchannelInfo> for SubchannelReport {
    fn from(sub: &SubchannelInfo) -> Self {
        Self {
            start_addr: sub.start_addr,
            length: sub.length,
            protection: sub.protection.code(),
            protection_level: sub.protection.level(),
            bit_rate: sub.bit_rate,
            fec_scheme: sub.fec_scheme,
        }
    }
}

impl From<&AudioData> for AudioReport {
    fn from(audio: &AudioData) -> Self {
        Self {
            component: audio.component_nr,
            sub_ch_id: audio.sub_ch_id,
            ascty: audio.ascty,
            subchannel: audio.subchannel.as_ref().map(SubchannelReport::from),
            label: audio.label.as_ref().map(|l| l.text.trim_end().to_string()),
        }
    }
}

impl From<&PacketData> for PacketReport {
    fn from(packet: &PacketData) -> Self {
        Self {
            component: packet.component_nr,
            sc_id: packet.sc_id,
            sub_ch_id: packet.sub_ch_id,
            dscty: packet.dscty,
            packet_address: packet.packet_address,
            app_type: packet.app_type,
            subchannel: packet.subchannel.as_ref().map(SubchannelReport::from),
            label: packet.label.as_ref().map(|l| l.text.trim_end().to_string()),
        }
    }
}

impl From<&ServiceInfo> for ServiceReport {
    fn from(svc: &ServiceInfo) -> Self {
        Self {
            id: Hex(svc.id),
            label: svc.label.text.trim_end().to_string(),
            short_label: svc.label.abbreviation.clone(),
            kind: svc.kind.to_string(),
            programme_type: svc.programme_type,
            language: svc.language,
            programme_number: svc.programme_number,
            audio: svc.audio.iter().map(AudioReport::from).collect(),
            packet: svc.packet.iter().map(PacketReport::from).collect(),
        }
    }
}

/// One entry per id quality class that has members.
fn link_reports(link: &ServiceLink) -> Vec<LinkReport> {
    link.classes
        .iter()
        .filter(|class| !class.members.is_empty())
        .map(|class| LinkReport {
            lsn: Hex(link.key.lsn as u32),
            active: link.key.active,
            hard: link.key.hard,
            reference: class.reference.map(Hex),
            members: class.members.keys().copied().map(Hex).collect(),
        })
        .collect()
}

impl EnsembleReport {
    /// Snapshot of everything the decoder knows, plus the still unflushed
    /// linkage sets.
    pub fn from_decoder(decoder: &FibDecoder, statistics: Statistics) -> Self {
        let ensemble = decoder.ensemble();

        let date_time = ensemble.date_time.map(|t| {
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
                t.year, t.month, t.day, t.hour, t.minute, t.second
            )
        });
        let local_time_offset = ensemble.local_time_offset.map(|lto| {
            format!(
                "{}{:02}:{}",
                if lto.hours < 0 { '-' } else { '+' },
                lto.hours.unsigned_abs(),
                if lto.half_hour { "30" } else { "00" }
            )
        });

        Self {
            id: ensemble.id.map(Hex),
            label: ensemble.label.map(|l| l.text.trim_end().to_string()),
            state: format!("{:?}", ensemble.state),
            ecc: decoder.ecc().map(|ecc| Hex(ecc as u32)),
            inter_table_id: decoder.inter_table_id(),
            date_time,
            local_time_offset,
            cif_count: decoder.cif_count(),
            statistics,
            services: decoder.services().iter().map(ServiceReport::from).collect(),
            links: decoder
                .service_links()
                .iter()
                .flat_map(link_reports)
                .collect(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Writes the report to `path`, or to stdout.
    pub fn write(&self, path: Option<&Path>) -> Result<()> {
        let yaml = self.to_yaml()?;
        match path {
            Some(path) => {
                fs::write(path, yaml)?;
                log::info!("Report written to {}", path.display());
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(yaml.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use fic::structs::fig::{END_MARKER, FIB_BYTES};
    use fic::utils::crc::seal_crc;

    /// A FIB announcing audio service 0xC221 "BBC Radio 1" on subchannel 1.
    pub(crate) fn sample_fib() -> [u8; FIB_BYTES] {
        let mut fib = [END_MARKER; FIB_BYTES];

        // FIG 0/2: SId, one component, TMId 0, ASCTy 0, SubChId 1, primary
        let fig0 = [0x06, 0x02, 0xC2, 0x21, 0x01, 0x00, 0x06];

        // FIG 1/1: EBU Latin, SId, label, no abbreviation
        let mut fig1 = vec![(1 << 5) | 21, 0x01, 0xC2, 0x21];
        fig1.extend_from_slice(b"BBC Radio 1     ");
        fig1.extend_from_slice(&[0x00, 0x00]);

        fib[..fig0.len()].copy_from_slice(&fig0);
        fib[fig0.len()..fig0.len() + fig1.len()].copy_from_slice(&fig1);
        seal_crc(&mut fib);
        fib
    }

    #[test]
    fn report_lists_services() {
        let decoder = FibDecoder::new();
        decoder.process_fib(&sample_fib());

        let report = EnsembleReport::from_decoder(
            &decoder,
            Statistics {
                fibs: 1,
                crc_errors: 0,
            },
        );
        assert_eq!(report.services.len(), 1);
        assert_eq!(report.services[0].label, "BBC Radio 1");
        assert_eq!(report.services[0].audio[0].sub_ch_id, 1);
        assert!(report.services[0].audio[0].subchannel.is_none());

        let yaml = report.to_yaml().unwrap();
        assert!(yaml.contains("0xC221"));
        assert!(yaml.contains("kind: audio"));
        assert!(yaml.contains("fibs: 1"));
        assert!(!yaml.contains("links"));
    }

    #[test]
    fn hex_ids() {
        assert_eq!(Hex(0xE1).to_string(), "0x00E1");
        assert_eq!(Hex(0xE1C2_38A1).to_string(), "0xE1C238A1");
    }
}
