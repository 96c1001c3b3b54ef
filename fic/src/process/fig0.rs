//! FIG type 0 extension handlers.
//!
//! Field positions are absolute bit offsets from the start of the FIG, the
//! header byte being byte 0 and the C/N, OE, P/D, extension byte byte 1.
//! Loops over repeated entries are bounded by the FIG length field; a field
//! read past the FIG fails the remaining entries of that FIG only.

use anyhow::{Result, anyhow};
use log::Level::Warn;
use log::{debug, trace};

use crate::log_or_err;
use crate::process::FicEvent;
use crate::process::decode::{DecoderState, FrameCounters};
use crate::structs::component::{AudioComponent, ComponentKind, PacketComponent, TransportMode};
use crate::structs::ensemble::{DateTime, LocalTimeOffset};
use crate::structs::fig::{Fig, Fig0Header};
use crate::structs::linking::{IdQuality, LinkKey};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::FigError;

pub(crate) fn decode(state: &mut DecoderState, counters: &FrameCounters, fig: &Fig) -> Result<()> {
    if fig.length == 0 {
        trace!("Empty FIG 0 at byte {}", fig.offset);
        return Ok(());
    }

    let reader = &mut fig.reader();
    let header = Fig0Header::read(reader)?;
    let len = fig.length;

    trace!(
        "FIG 0/{} ({len} bytes) C/N {} OE {} P/D {}",
        header.extension, header.cn as u8, header.oe as u8, header.pd as u8
    );

    match header.extension {
        0 => ensemble_information(state, counters, reader),
        1 => subchannel_organization(state, reader, len),
        2 => service_organization(state, reader, len, &header),
        3 => packet_mode_component(state, reader, len),
        5 => component_language(state, reader, len),
        6 => service_linking(state, reader, len, &header),
        8 => global_definition(state, reader, len, &header),
        9 => country_lto(state, counters, reader),
        10 => date_time(state, reader),
        13 => user_application(state, reader, len, &header),
        14 | 15 => fec_scheme(state, reader, len),
        16 => programme_number(state, reader, len),
        17 => programme_type(state, reader, len),
        18 => announcement_support(reader, len),
        19 => announcement_switching(reader, len),
        21 => frequency_information(reader, len),
        22 => tii_coordinates(reader, len),
        extension => {
            state.note_skipped(0, extension);
            Ok(())
        }
    }
}

/// FIG 0/0: ensemble id, change flags, alarm and CIF count.
fn ensemble_information(
    state: &mut DecoderState,
    counters: &FrameCounters,
    reader: &mut BsIoSliceReader,
) -> Result<()> {
    let eid: u32 = reader.get_at(16, 16)?;
    let change_flags: u8 = reader.get_at(32, 2)?;
    let alarm = reader.flag_at(34)?;
    let high = reader.get_at::<u32>(35, 5)? % 20;
    let low = reader.get_at::<u32>(40, 8)? % 250;

    counters.set_cif(high * 250 + low);
    trace!("CIF count {}", high * 250 + low);

    state.ensemble.id = Some(eid);
    state.ensemble.change_flags = change_flags;
    state.ensemble.alarm = alarm;

    if !state.ensemble_id_reported {
        state.ensemble_id_reported = true;
        state.ensemble.synced();
        log::info!("Ensemble id 0x{eid:04X}");
        state.events.push(FicEvent::EnsembleId(eid));
    }

    if change_flags != 0 {
        let occurrence: u8 = reader.get_at(48, 8)?;
        debug!("Configuration change announced (flags {change_flags}, occurrence {occurrence})");
    }

    Ok(())
}

/// FIG 0/1: subchannel start address, size and protection.
fn subchannel_organization(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
) -> Result<()> {
    let mut used = 2;

    while used + 1 < len {
        let bit = used * 8;
        let sub_ch_id: u8 = reader.get_at(bit, 6)?;
        let start_addr: u16 = reader.get_at(bit + 6, 10)?;
        let long_form = reader.flag_at(bit + 16)?;

        let subchannel = if long_form {
            let option: u8 = reader.get_at(bit + 17, 3)?;
            let level: u8 = reader.get_at(bit + 20, 2)?;
            let size: u16 = reader.get_at(bit + 22, 10)?;
            used += 4;

            state.subchannels.slot_mut(sub_ch_id as usize).map(|sub| {
                sub.set_long_form(option, level, size);
                sub
            })
        } else {
            let table_index: u8 = reader.get_at(bit + 18, 6)?;
            used += 3;

            state.subchannels.slot_mut(sub_ch_id as usize).map(|sub| {
                sub.set_short_form(table_index);
                sub
            })
        };

        if let Some(sub) = subchannel {
            if !sub.in_use {
                debug!(
                    "Subchannel {sub_ch_id}: start {start_addr}, {:?}, {} kbit/s",
                    sub.protection,
                    sub.bit_rate.unwrap_or(0)
                );
            }
            sub.in_use = true;
            sub.sub_ch_id = sub_ch_id;
            sub.start_addr = start_addr;
        }
    }

    state.ensemble.collecting();
    Ok(())
}

/// FIG 0/2: binds service components to services.
fn service_organization(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
    header: &Fig0Header,
) -> Result<()> {
    let mut used = 2;

    while used < len {
        let mut bit = used * 8;
        let service_id: u32 = reader.get_at(bit, header.sid_bits())?;
        bit += header.sid_bits() as usize;

        let num_components: u8 = reader.get_at(bit + 4, 4)?;
        bit += 8;

        for component_nr in 0..num_components {
            let transport = TransportMode::from(reader.get_at::<u8>(bit, 2)?);
            let primary = reader.flag_at(bit + 14)?;

            let kind = match transport {
                TransportMode::StreamAudio => ComponentKind::Audio(AudioComponent {
                    ascty: reader.get_at(bit + 2, 6)?,
                    sub_ch_id: reader.get_at(bit + 8, 6)?,
                }),
                TransportMode::PacketData => ComponentKind::Packet(PacketComponent {
                    sc_id: reader.get_at(bit + 2, 12)?,
                    ca_flag: reader.flag_at(bit + 15)?,
                    ..Default::default()
                }),
                other => {
                    trace!("Service 0x{service_id:04X} component {component_nr}: {other:?} skipped");
                    bit += 16;
                    continue;
                }
            };
            bit += 16;

            if let Some(service) = state.find_or_create_service(service_id)? {
                state.bind_component(service, component_nr, transport, kind, primary)?;
            }
        }

        used = bit / 8;
    }

    Ok(())
}

/// FIG 0/3: packet mode details of a component bound by FIG 0/2.
fn packet_mode_component(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
) -> Result<()> {
    let mut used = 2;

    while used < len {
        let bit = used * 8;
        let sc_id: u16 = reader.get_at(bit, 12)?;
        let ca_org_flag = reader.flag_at(bit + 15)?;
        let dg_flag = reader.flag_at(bit + 16)?;
        let dscty: u8 = reader.get_at(bit + 18, 6)?;
        let sub_ch_id: u8 = reader.get_at(bit + 24, 6)?;
        let packet_address: u16 = reader.get_at(bit + 30, 10)?;

        if ca_org_flag {
            let ca_org: u16 = reader.get_at(bit + 40, 16)?;
            trace!("SCId {sc_id}: CA organization 0x{ca_org:04X}");
            used += 2;
        }
        used += 5;

        let Some(index) = state.components.position(|c| {
            c.transport == TransportMode::PacketData && c.packet().is_some_and(|p| p.sc_id == sc_id)
        }) else {
            continue;
        };

        if state.subchannels.get(sub_ch_id as usize).is_none() {
            continue;
        }

        let Some(component) = state.components.get_mut(index) else {
            continue;
        };
        if component.made_public {
            continue;
        }

        component.made_public = true;
        if let ComponentKind::Packet(packet) = &mut component.kind {
            packet.sub_ch_id = Some(sub_ch_id);
            packet.dscty = dscty;
            packet.dg_flag = dg_flag;
            packet.packet_address = packet_address;
        }
        let service = component.service;
        let primary_component = component.component_nr == 0;

        debug!("SCId {sc_id}: subchannel {sub_ch_id}, DSCTy {dscty}, address {packet_address}");

        if let Some(svc) = state.services.get_mut(service) {
            svc.sub_ch_ids.insert(sub_ch_id as u16);
        }
        if primary_component {
            state.publish_service(service);
        }
    }

    Ok(())
}

/// FIG 0/5: component language.
fn component_language(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
) -> Result<()> {
    let mut used = 2;

    while used < len {
        let bit = used * 8;

        if reader.flag_at(bit)? {
            let sc_id: u16 = reader.get_at(bit + 4, 12)?;
            let language: u8 = reader.get_at(bit + 16, 8)?;
            debug!("SCId {sc_id}: language 0x{language:02X}");
            used += 3;
        } else {
            if !reader.flag_at(bit + 1)? {
                let sub_ch_id: u8 = reader.get_at(bit + 2, 6)?;
                let language: u8 = reader.get_at(bit + 8, 8)?;
                if let Some(sub) = state.subchannels.slot_mut(sub_ch_id as usize) {
                    sub.language = Some(language);
                }
                debug!("Subchannel {sub_ch_id}: language 0x{language:02X}");
            }
            used += 2;
        }
    }

    Ok(())
}

/// FIG 0/6: service linking information.
fn service_linking(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
    header: &Fig0Header,
) -> Result<()> {
    if !header.cn {
        if let Some(report) = state.links.database_start() {
            debug!("Service linking info #{}: {}", report.sequence, report.header);
            state.events.push(FicEvent::LinkInfo {
                sequence: report.sequence,
                header: report.header,
                body: report.body,
            });
        }
    }

    state.links.fig_header(header.oe, header.pd);

    let mut used = 2;

    while used < len {
        let bit = used * 8;
        let id_list = reader.flag_at(bit)?;
        let key = LinkKey {
            active: reader.flag_at(bit + 1)?,
            hard: reader.flag_at(bit + 2)?,
            lsn: reader.get_at(bit + 4, 12)?,
        };
        let international = reader.flag_at(bit + 3)?;

        if !id_list {
            used += 2;
            continue;
        }

        state.links.link_entry(key, international);

        let usage: u8 = reader.get_at(bit + 16, 4)?;
        let quality = match usage & 8 {
            0 => IdQuality::from_idlq(usage >> 1),
            _ => None,
        };
        let Some(quality) = quality else {
            log_or_err!(state, Warn, anyhow!(FigError::ReservedLinkQualifier(usage)));
            break;
        };
        let shorthand = usage & 1 != 0;
        let num_ids = reader.get_at::<u8>(bit + 20, 4)? as usize;
        let ids_start = bit + 24;

        let (ids, stride) = if header.pd {
            let ids = (0..num_ids)
                .map(|k| reader.get_at::<u32>(ids_start + k * 32, 32))
                .collect::<std::io::Result<Vec<_>>>()?;
            (ids, 4)
        } else if international {
            let ids = (0..num_ids)
                .map(|k| reader.get_at::<u32>(ids_start + k * 24, 24))
                .collect::<std::io::Result<Vec<_>>>()?;
            (ids, 3)
        } else {
            let ids = (0..num_ids)
                .map(|k| reader.get_at::<u32>(ids_start + k * 16, 16))
                .collect::<std::io::Result<Vec<_>>>()?;
            (ids, 2)
        };

        state.links.id_list(
            key,
            quality,
            international,
            header.pd,
            shorthand,
            &ids,
        );
        used += 3 + stride * num_ids;
    }

    Ok(())
}

/// FIG 0/8: global definition of components, feeding the cross references
/// of the service.
fn global_definition(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
    header: &Fig0Header,
) -> Result<()> {
    let mut used = 2;

    while used < len {
        let mut bit = used * 8;
        let service_id: u32 = reader.get_at(bit, header.sid_bits())?;
        bit += header.sid_bits() as usize;

        let extension_flag = reader.flag_at(bit)?;
        let sc_ids: u16 = reader.get_at(bit + 4, 4)?;
        bit += 8;

        let long_form = reader.flag_at(bit)?;
        let (sc_id, sub_ch_id) = if long_form {
            let sc_id: u16 = reader.get_at(bit + 4, 12)?;
            bit += 16;
            (Some(sc_id), None)
        } else {
            let sub_ch_id: u16 = reader.get_at(bit + 2, 6)?;
            bit += 8;
            (None, Some(sub_ch_id))
        };
        if extension_flag {
            bit += 8;
        }
        used = bit / 8;

        let Some(index) = state.find_or_create_service(service_id)? else {
            continue;
        };
        if let Some(svc) = state.services.get_mut(index) {
            svc.sc_ids.insert(sc_ids);
            if let Some(sc_id) = sc_id {
                svc.sc_id_list.insert(sc_id);
            }
            if let Some(sub_ch_id) = sub_ch_id {
                svc.sub_ch_ids.insert(sub_ch_id);
            }
        }
    }

    Ok(())
}

/// FIG 0/9: local time offset, extended country code and international
/// table id.
fn country_lto(
    state: &mut DecoderState,
    counters: &FrameCounters,
    reader: &mut BsIoSliceReader,
) -> Result<()> {
    let negative = reader.flag_at(18)?;
    let hours: i8 = reader.get_at::<u8>(19, 4)? as i8;
    let half_hour = reader.flag_at(23)?;
    let ecc: u8 = reader.get_at(24, 8)?;
    let inter_table_id: u8 = reader.get_at(32, 8)?;

    state.ensemble.local_time_offset = Some(LocalTimeOffset {
        hours: if negative { -hours } else { hours },
        half_hour,
    });

    counters.set_ecc(ecc);
    counters.set_inter_table_id(inter_table_id);

    if !state.country_reported {
        state.country_reported = true;
        let ecc = counters.ecc().unwrap_or(ecc);
        debug!("ECC 0x{ecc:02X}, international table {inter_table_id}");
        state.events.push(FicEvent::Country {
            ecc,
            inter_table_id,
        });
    }

    Ok(())
}

/// FIG 0/10: date and time.
fn date_time(state: &mut DecoderState, reader: &mut BsIoSliceReader) -> Result<()> {
    let mjd: u32 = reader.get_at(17, 17)?;
    let utc_long_form = reader.flag_at(36)?;
    let hour: u8 = reader.get_at(37, 5)?;
    let minute: u8 = reader.get_at(42, 6)?;

    let (year, month, day) = DateTime::from_mjd(mjd);
    let previous = state.ensemble.date_time.unwrap_or_default();

    let mut second = if previous.minute == minute {
        previous.second
    } else {
        0
    };
    if utc_long_form {
        second = reader.get_at(48, 6)?;
    }

    state.ensemble.date_time = Some(DateTime {
        year,
        month,
        day,
        hour,
        minute,
        second,
    });
    trace!("Date {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}");

    Ok(())
}

/// FIG 0/13: user application types.
fn user_application(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
    header: &Fig0Header,
) -> Result<()> {
    let mut used = 2;

    while used < len {
        let mut bit = used * 8;
        let service_id: u32 = reader.get_at(bit, header.sid_bits())?;
        bit += header.sid_bits() as usize;

        let sc_ids: u8 = reader.get_at(bit, 4)?;
        let num_apps: u8 = reader.get_at(bit + 4, 4)?;
        bit += 8;

        for _ in 0..num_apps {
            let app_type: u16 = reader.get_at(bit, 11)?;
            let data_len: usize = reader.get_at::<u8>(bit + 11, 5)? as usize;
            bit += 16 + 8 * data_len;

            if let Some(index) = state.find_component_by_sid(service_id, sc_ids) {
                if let Some(component) = state.components.get_mut(index) {
                    component.sc_ids = Some(sc_ids);
                    component.app_type = Some(app_type);
                }
            }
        }

        used = bit / 8;
    }

    Ok(())
}

/// FIG 0/14 (and the obsolete 0/15): FEC scheme per subchannel.
fn fec_scheme(state: &mut DecoderState, reader: &mut BsIoSliceReader, len: usize) -> Result<()> {
    let mut used = 2;

    while used < len {
        let sub_ch_id: u8 = reader.get_at(used * 8, 6)?;
        let scheme: u8 = reader.get_at(used * 8 + 6, 2)?;
        used += 1;

        if let Some(sub) = state.subchannels.slot_mut(sub_ch_id as usize) {
            sub.fec_scheme = scheme;
        }
    }

    Ok(())
}

/// FIG 0/16 (obsolete): programme number.
fn programme_number(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
) -> Result<()> {
    let mut bit = 16;

    while bit < len * 8 {
        let service_id: u32 = reader.get_at(bit, 16)?;
        // only the low byte of the 16-bit PNum is kept
        let number = reader.get_at::<u16>(bit + 16, 16)? as u8;
        bit += 72;

        let Some(index) = state.find_or_create_service(service_id)? else {
            continue;
        };
        if let Some(svc) = state.services.get_mut(index) {
            if svc.programme_number.is_none() {
                svc.programme_number = Some(number);
                debug!("Service 0x{service_id:04X}: programme number {number}");
            }
        }
    }

    Ok(())
}

/// FIG 0/17: programme type and language.
fn programme_type(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    len: usize,
) -> Result<()> {
    let mut bit = 16;

    while bit < len * 8 {
        let service_id: u32 = reader.get_at(bit, 16)?;
        let language_flag = reader.flag_at(bit + 18)?;
        let cc_flag = reader.flag_at(bit + 19)?;

        let language = if language_flag {
            let language: u8 = reader.get_at(bit + 24, 8)?;
            bit += 8;
            Some(language)
        } else {
            None
        };
        let programme_type: u8 = reader.get_at(bit + 27, 5)?;
        bit += if cc_flag { 40 } else { 32 };

        let Some(index) = state.find_or_create_service(service_id)? else {
            continue;
        };
        if let Some(svc) = state.services.get_mut(index) {
            if language.is_some() {
                svc.language = language;
            }
            svc.programme_type = programme_type;
        }
    }

    Ok(())
}

/// FIG 0/18: announcement support, parsed only.
fn announcement_support(reader: &mut BsIoSliceReader, len: usize) -> Result<()> {
    let mut bit = 16;

    while bit / 8 + 1 < len {
        let service_id: u16 = reader.get_at(bit, 16)?;
        let flags: u16 = reader.get_at(bit + 16, 16)?;
        let clusters: usize = reader.get_at::<u8>(bit + 35, 5)? as usize;
        trace!("Service 0x{service_id:04X}: announcements 0x{flags:04X} in {clusters} clusters");
        bit += 40 + clusters * 8;
    }

    Ok(())
}

/// FIG 0/19: announcement switching, parsed only.
fn announcement_switching(reader: &mut BsIoSliceReader, len: usize) -> Result<()> {
    let mut bit = 16;

    while bit / 8 + 1 < len {
        let cluster: u8 = reader.get_at(bit, 8)?;
        let flags: u16 = reader.get_at(bit + 8, 16)?;
        let region_flag = reader.flag_at(bit + 25)?;
        let sub_ch_id: u8 = reader.get_at(bit + 26, 6)?;
        trace!("Cluster {cluster}: announcement 0x{flags:04X} on subchannel {sub_ch_id}");
        bit += if region_flag { 40 } else { 32 };
    }

    Ok(())
}

/// FIG 0/21: frequency information, parsed only.
fn frequency_information(reader: &mut BsIoSliceReader, len: usize) -> Result<()> {
    let mut used = 2;

    while used < len {
        let bit = used * 8;
        let block_len: usize = reader.get_at::<u8>(bit + 11, 5)? as usize;
        let upper = bit + 16 + block_len * 8;
        let mut base = bit + 16;

        while base < upper {
            let range_modulation: u8 = reader.get_at(base + 16, 4)?;
            let list_len: usize = reader.get_at::<u8>(base + 21, 3)? as usize;
            if range_modulation == 0x08 {
                let key: u32 = reader.get_at(base + 24, 8)?;
                trace!("FM frequency {} kHz", 87500 + key * 100);
            }
            base += 24 + list_len * 8;
        }

        used = upper / 8;
    }

    Ok(())
}

/// FIG 0/22 (obsolete): TII coordinates, parsed for logging.
fn tii_coordinates(reader: &mut BsIoSliceReader, len: usize) -> Result<()> {
    let mut used = 2;

    while used < len {
        let bit = used * 8;
        let multiple = reader.flag_at(bit)?;
        let main_id: u8 = reader.get_at(bit + 1, 7)?;

        if !multiple {
            let latitude = reader.get_at::<u16>(bit + 8, 16)? as i16;
            let longitude = reader.get_at::<u16>(bit + 24, 16)? as i16;
            trace!(
                "TII main {main_id}: {:.4}, {:.4}",
                latitude as f64 * 90.0 / 32768.0,
                longitude as f64 * 180.0 / 32768.0
            );
            // 8-byte stride over a 6-byte entry
            used += 48 / 6;
            continue;
        }

        let subfields: usize = reader.get_at::<u8>(bit + 13, 3)? as usize;
        for i in 0..subfields {
            let sub = bit + 16 + i * 48;
            let sub_id: u8 = reader.get_at(sub, 5)?;
            let td: u16 = reader.get_at(sub + 5, 11)?;
            trace!("TII main {main_id} sub {sub_id}: TD {td}");
        }
        used += (16 + subfields * 48) / 8;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::decode::FibDecoder;
    use crate::process::fixtures::{FigWriter, fib, fig0, fig1, label_field};
    use crate::structs::subchannel::Protection;

    fn subchannel_short(sub_ch_id: u8, start: u16, table_index: u8) -> Vec<u8> {
        let payload = FigWriter::new()
            .bits(6, sub_ch_id as u32)
            .bits(10, start as u32)
            .flag(false)
            .flag(false)
            .bits(6, table_index as u32)
            .finish();
        fig0(false, false, false, 1, &payload)
    }

    #[test]
    fn subchannel_short_and_long_form() {
        let decoder = FibDecoder::new();

        let long = FigWriter::new()
            .bits(6, 7)
            .bits(10, 300)
            .flag(true)
            .bits(3, 1)
            .bits(2, 2)
            .bits(10, 72)
            .finish();
        decoder.process_fib(&fib(&[
            subchannel_short(5, 100, 3),
            fig0(false, false, false, 1, &long),
        ]));

        let state = decoder.lock();
        let short = state.subchannels.get(5).unwrap();
        assert_eq!(short.start_addr, 100);
        assert_eq!(short.length, 29);
        assert_eq!(short.bit_rate, Some(32));

        let long = state.subchannels.get(7).unwrap();
        assert_eq!(long.start_addr, 300);
        assert_eq!(long.protection, Protection::EepB { level: 2 });
        // 72 / 18 * 32
        assert_eq!(long.bit_rate, Some(128));
    }

    #[test]
    fn packet_component_made_public() {
        let decoder = FibDecoder::new();

        // FIG 0/2: service 0xE1234567 (P/D = 1), one packet component SCId 0x123
        let org = FigWriter::new()
            .bits(32, 0xE123_4567)
            .bits(4, 0)
            .bits(4, 1)
            .bits(2, 3)
            .bits(12, 0x123)
            .flag(true)
            .flag(false)
            .finish();
        // FIG 0/3: SCId 0x123, DG, DSCTy 60, subchannel 9, address 1000
        let packet = FigWriter::new()
            .bits(12, 0x123)
            .bits(3, 0)
            .flag(false)
            .flag(true)
            .flag(false)
            .bits(6, 60)
            .bits(6, 9)
            .bits(10, 1000)
            .finish();
        let mut label = 0xE123_4567u32.to_be_bytes().to_vec();
        label.extend(label_field("Data", 0));

        let events = decoder.process_fib(&fib(&[
            fig0(false, false, true, 2, &org),
            subchannel_short(9, 0, 10),
        ]));
        assert!(events.is_empty());

        decoder.process_fib(&fib(&[fig0(false, false, false, 3, &packet)]));
        {
            let state = decoder.lock();
            let component = state.components.get(0).unwrap();
            assert!(component.made_public);
            let packet = component.packet().unwrap();
            assert_eq!(packet.sub_ch_id, Some(9));
            assert_eq!(packet.dscty, 60);
            assert!(packet.dg_flag);
            assert_eq!(packet.packet_address, 1000);
            assert!(state.services.get(0).unwrap().sub_ch_ids.contains(9));
        }

        // data service label publishes immediately
        let events = decoder.process_fib(&fib(&[fig1(0, 5, &label)]));
        assert!(matches!(&events[..], [FicEvent::Service { id: 0xE123_4567, .. }]));
    }

    #[test]
    fn cross_references_are_unique_and_capped() {
        let decoder = FibDecoder::new();

        let mut w = FigWriter::new();
        for sub_ch_id in [1, 2, 2, 3, 4, 5] {
            w = w
                .bits(16, 0x5000)
                .flag(false)
                .bits(3, 0)
                .bits(4, 0)
                .flag(false)
                .flag(false)
                .bits(6, sub_ch_id);
        }
        decoder.process_fib(&fib(&[fig0(false, false, false, 8, &w.finish())]));

        let state = decoder.lock();
        let svc = state.services.get(0).unwrap();
        assert_eq!(svc.sub_ch_ids.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(svc.sc_ids.as_slice(), &[0]);
    }

    #[test]
    fn country_and_time() {
        let decoder = FibDecoder::new();

        // LTO -2h30, ECC 0xE0, international table 1
        let lto = FigWriter::new()
            .bits(2, 0)
            .flag(true)
            .bits(4, 2)
            .flag(true)
            .bits(8, 0xE0)
            .bits(8, 1)
            .finish();
        // MJD 60000, UTC long form, 13:37:42
        let time = FigWriter::new()
            .flag(false)
            .bits(17, 60000)
            .bits(2, 0)
            .flag(true)
            .bits(5, 13)
            .bits(6, 37)
            .bits(6, 42)
            .bits(10, 0)
            .finish();

        let events = decoder.process_fib(&fib(&[
            fig0(false, false, false, 9, &lto),
            fig0(false, false, false, 10, &time),
        ]));
        assert_eq!(
            events,
            vec![FicEvent::Country {
                ecc: 0xE0,
                inter_table_id: 1
            }]
        );
        assert_eq!(decoder.ecc(), Some(0xE0));
        assert_eq!(decoder.inter_table_id(), Some(1));

        let ensemble = decoder.ensemble();
        let lto = ensemble.local_time_offset.unwrap();
        assert_eq!(lto.hours, -2);
        assert!(lto.half_hour);
        let dt = ensemble.date_time.unwrap();
        assert_eq!((dt.year, dt.month, dt.day), (2023, 2, 25));
        assert_eq!((dt.hour, dt.minute, dt.second), (13, 37, 42));

        // country is reported once; the first ECC is kept
        let other = FigWriter::new()
            .bits(8, 0)
            .bits(8, 0xE1)
            .bits(8, 2)
            .finish();
        let events = decoder.process_fib(&fib(&[fig0(false, false, false, 9, &other)]));
        assert!(events.is_empty());
        assert_eq!(decoder.ecc(), Some(0xE0));
        assert_eq!(decoder.inter_table_id(), Some(2));
    }

    #[test]
    fn programme_type_language_and_number() {
        let decoder = FibDecoder::new();

        let pty = FigWriter::new()
            .bits(16, 0xD001)
            .bits(2, 0)
            .flag(true)
            .flag(false)
            .bits(4, 0)
            .bits(8, 0x0F)
            .bits(3, 0)
            .bits(5, 10)
            .finish();
        let pnum = FigWriter::new()
            .bits(16, 0xD001)
            .bits(16, 0x1234)
            .bits(32, 0)
            .bits(8, 0)
            .finish();

        decoder.process_fib(&fib(&[
            fig0(false, false, false, 17, &pty),
            fig0(false, false, false, 16, &pnum),
        ]));

        let state = decoder.lock();
        let svc = state.services.get(0).unwrap();
        assert_eq!(svc.service_id, 0xD001);
        assert_eq!(svc.language, Some(0x0F));
        assert_eq!(svc.programme_type, 10);
        assert_eq!(svc.programme_number, Some(0x34));
    }

    #[test]
    fn fec_and_language_before_organization() {
        let decoder = FibDecoder::new();

        decoder.process_fib(&fib(&[
            fig0(false, false, false, 14, &[(12 << 2) | 1, 0]),
            fig0(false, false, false, 5, &[12, 0x09]),
            subchannel_short(12, 0, 0),
        ]));

        let state = decoder.lock();
        let sub = state.subchannels.get(12).unwrap();
        assert_eq!(sub.fec_scheme, 1);
        assert_eq!(sub.language, Some(0x09));
    }

    #[test]
    fn reserved_link_qualifier_ends_fig() {
        let decoder = FibDecoder::new();

        // id list flagged, usage 0b0100 (IdLQ 2), one id
        let payload = FigWriter::new()
            .flag(true)
            .flag(true)
            .flag(false)
            .flag(false)
            .bits(12, 0x001)
            .bits(4, 0b0100)
            .bits(4, 1)
            .bits(16, 0xD001)
            .finish();

        decoder.process_fib(&fib(&[fig0(false, false, false, 6, &payload)]));
        assert!(decoder.service_links().is_empty());

        decoder.set_fail_level(log::Level::Warn);
        decoder.process_fib(&fib(&[fig0(true, false, false, 6, &payload)]));
        assert!(decoder.service_links().is_empty());
    }

    #[test]
    fn linking_sets_from_figs() {
        let decoder = FibDecoder::new();

        let entry = |ids: &[u16]| {
            let mut w = FigWriter::new()
                .flag(true)
                .flag(true)
                .flag(true)
                .flag(false)
                .bits(12, 0x0AB)
                .bits(4, 0b0010)
                .bits(4, ids.len() as u32);
            for &id in ids {
                w = w.bits(16, id as u32);
            }
            w.finish()
        };

        let pair = fig0(false, false, false, 6, &entry(&[0xC201, 0xC202]));
        let single = fig0(false, false, false, 6, &entry(&[0xC203]));

        // first database start: nothing complete to report yet
        assert!(decoder.process_fib(&fib(&[pair.clone()])).is_empty());

        // second start reports the rendering gathered since the first
        let events = decoder.process_fib(&fib(&[pair]));
        assert!(matches!(
            &events[..],
            [FicEvent::LinkInfo { sequence: 1, header, body }]
                if header == "OE THIS Ensemble, 16/program"
                    && body.contains("SHD-0, RDS PIs, ID 16-Bit: 0xC201 (=DAB_SID), 0xC202")
        ));

        // identical rendering again: refreshed, not reported
        assert!(decoder.process_fib(&fib(&[single])).is_empty());

        let links = decoder.service_links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].key, LinkKey { lsn: 0x0AB, active: true, hard: true });
        let class = &links[0].classes[IdQuality::RdsPi.index()];
        assert_eq!(class.reference, Some(0xC203));
        assert_eq!(class.members.get(&0xC202), Some(&2));

        assert_eq!(decoder.flush_service_links().len(), 1);
        assert!(decoder.service_links().is_empty());
    }
}
