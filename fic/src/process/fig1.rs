//! FIG type 1 label handlers.
//!
//! Every label field is 16 character bytes followed by a 16-bit character
//! flag field selecting the abbreviation.

use anyhow::{Result, anyhow};
use log::Level::Warn;
use log::{debug, info, trace};

use crate::log_or_err;
use crate::process::FicEvent;
use crate::process::decode::DecoderState;
use crate::structs::fig::{Fig, Fig1Header};
use crate::structs::label::{LABEL_LEN, Label};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::charset::Charset;
use crate::utils::errors::FigError;

pub(crate) fn decode(state: &mut DecoderState, fig: &Fig) -> Result<()> {
    if fig.length == 0 {
        trace!("Empty FIG 1 at byte {}", fig.offset);
        return Ok(());
    }

    let reader = &mut fig.reader();
    let header = Fig1Header::read(reader)?;
    let charset = Charset::from(header.charset);

    if charset == Charset::Ucs2 {
        log_or_err!(
            state,
            Warn,
            anyhow!(FigError::UnsupportedCharset(header.charset))
        );
        return Ok(());
    }

    match header.extension {
        0 => ensemble_label(state, reader, charset),
        1 => programme_service_label(state, reader, charset),
        3 => region_label(reader, charset),
        4 => component_label(state, reader, charset),
        5 => data_service_label(state, reader, charset),
        6 => x_pad_label(reader, charset),
        extension => {
            state.note_skipped(1, extension);
            Ok(())
        }
    }
}

fn read_label(reader: &mut BsIoSliceReader, offset: usize, charset: Charset) -> Result<Label> {
    let mut raw = [0u8; LABEL_LEN];
    for (i, byte) in raw.iter_mut().enumerate() {
        *byte = reader.get_at(offset + 8 * i, 8)?;
    }
    let flags: u16 = reader.get_at(offset + 8 * LABEL_LEN, 16)?;

    Label::decode(&raw, flags, charset)
}

/// FIG 1/0: ensemble label.
fn ensemble_label(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    charset: Charset,
) -> Result<()> {
    let eid: u32 = reader.get_at(16, 16)?;
    let label = read_label(reader, 32, charset)?;

    state.ensemble.id = Some(eid);
    state.ensemble.label = Some(label.clone());
    state.ensemble.synced();

    if !state.ensemble_name_reported {
        state.ensemble_name_reported = true;
        info!("Ensemble 0x{eid:04X}: {}", label.text.trim_end());
        state.events.push(FicEvent::EnsembleName { id: eid, label });
    }

    Ok(())
}

/// FIG 1/1: programme service label.
fn programme_service_label(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    charset: Charset,
) -> Result<()> {
    let service_id: u32 = reader.get_at(16, 16)?;
    let label = read_label(reader, 32, charset)?;

    let Some(index) = state.find_or_create_service(service_id)? else {
        return Ok(());
    };

    if let Some(svc) = state.services.get_mut(index) {
        if svc.has_name {
            return Ok(());
        }
        svc.label = label;
        svc.has_name = true;
    }

    if state.has_components(index) {
        state.publish_service(index);
    }

    Ok(())
}

/// FIG 1/3: region label.
fn region_label(reader: &mut BsIoSliceReader, charset: Charset) -> Result<()> {
    let region_id: u8 = reader.get_at(18, 6)?;
    let label = read_label(reader, 24, charset)?;
    trace!("Region {region_id}: {}", label.text.trim_end());

    Ok(())
}

/// FIG 1/4: service component label.
fn component_label(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    charset: Charset,
) -> Result<()> {
    let pd = reader.flag_at(16)?;
    let sc_ids: u8 = reader.get_at(20, 4)?;

    let (service_id, label) = if pd {
        (reader.get_at::<u32>(24, 32)?, read_label(reader, 56, charset)?)
    } else {
        (reader.get_at::<u32>(24, 16)?, read_label(reader, 40, charset)?)
    };

    let Some(index) = state.find_component_by_sid(service_id, sc_ids) else {
        return Ok(());
    };

    if let Some(component) = state.components.get_mut(index) {
        if component.label.is_none() {
            debug!(
                "Service 0x{service_id:04X} component {sc_ids}: {}",
                label.text.trim_end()
            );
            component.label = Some(label);
        }
    }

    Ok(())
}

/// FIG 1/5: data service label. Data services are published as soon as
/// they are named.
fn data_service_label(
    state: &mut DecoderState,
    reader: &mut BsIoSliceReader,
    charset: Charset,
) -> Result<()> {
    let service_id: u32 = reader.get_at(16, 32)?;
    let label = read_label(reader, 48, charset)?;

    let Some(index) = state.find_or_create_service(service_id)? else {
        return Ok(());
    };

    if let Some(svc) = state.services.get_mut(index) {
        if svc.has_name {
            return Ok(());
        }
        svc.label = label;
        svc.has_name = true;
    }

    state.publish_service(index);

    Ok(())
}

/// FIG 1/6: X-PAD user application label.
fn x_pad_label(reader: &mut BsIoSliceReader, charset: Charset) -> Result<()> {
    let pd = reader.flag_at(16)?;
    let sc_ids: u8 = reader.get_at(20, 4)?;

    let (service_id, app_id, label) = if pd {
        (
            reader.get_at::<u32>(24, 32)?,
            reader.get_at::<u8>(59, 5)?,
            read_label(reader, 64, charset)?,
        )
    } else {
        (
            reader.get_at::<u32>(24, 16)?,
            reader.get_at::<u8>(43, 5)?,
            read_label(reader, 48, charset)?,
        )
    };
    trace!(
        "Service 0x{service_id:04X} component {sc_ids} X-PAD app {app_id}: {}",
        label.text.trim_end()
    );

    Ok(())
}
