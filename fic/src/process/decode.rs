use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use log::Level::Warn;
use log::{debug, info, trace};

use crate::log_or_err;
use crate::process::{FicEvent, fig0, fig1};
use crate::structs::component::{Component, ComponentKind, TransportMode};
use crate::structs::ensemble::{Ensemble, SyncState};
use crate::structs::fig::{FIB_BYTES, FIB_DATA_BYTES, Fig, FigIter};
use crate::structs::linking::LinkAccumulator;
use crate::structs::service::Service;
use crate::structs::subchannel::Subchannel;
use crate::structs::table::Table;
use crate::utils::errors::FigError;

/// CIF counts run from 0 to 4999.
pub const CIF_COUNT_MODULO: u32 = 5000;

/// Decodes CRC-checked FIBs into the ensemble data model.
///
/// All tables live behind one mutex. Decoding a FIB holds the lock for the
/// whole FIB and queues notifications; [`Self::process_fib`] hands them out
/// after the lock is released, so callers may query the decoder from inside
/// their notification handlers.
///
/// Frame counter, extended country code and international table id are
/// atomics readable without the lock.
#[derive(Debug, Default)]
pub struct FibDecoder {
    state: Mutex<DecoderState>,
    pub(crate) counters: FrameCounters,
}

impl FibDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the data bytes of one FIB (30 bytes, or 32 with the CRC,
    /// which is not checked here) and returns the notifications it produced.
    pub fn process_fib(&self, fib: &[u8]) -> Vec<FicEvent> {
        let mut state = self.lock();

        if let Err(err) = state.decode_fib(&self.counters, fib) {
            log::error!("FIB dropped: {err:#}");
        }

        std::mem::take(&mut state.events)
    }

    /// Sets the failure level for validation errors.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Drop the rest of a FIB on Warning level and above
    ///   (strict mode)
    pub fn set_fail_level(&self, level: log::Level) {
        self.lock().fail_level = level;
    }

    /// Signals the start of a transmission frame.
    pub fn new_frame(&self) {
        self.counters.advance_cif();
    }

    /// Forgets the ensemble: tables are cleared in place, counters and
    /// country information become absent and the state returns to
    /// [`SyncState::Unsynced`].
    pub fn reset(&self) {
        self.lock().reset();
        self.counters.reset();
    }

    pub fn sync_state(&self) -> SyncState {
        self.lock().ensemble.state
    }

    pub fn cif_count(&self) -> Option<u32> {
        self.counters.cif()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DecoderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lock-free scalars shared with readers.
#[derive(Debug, Default)]
pub struct FrameCounters {
    cif_count: AtomicU32,
    cif_present: AtomicBool,
    ecc: AtomicU8,
    ecc_present: AtomicBool,
    inter_table_id: AtomicU8,
    inter_table_present: AtomicBool,
}

impl FrameCounters {
    pub fn cif(&self) -> Option<u32> {
        self.cif_present
            .load(Ordering::Acquire)
            .then(|| self.cif_count.load(Ordering::Relaxed))
    }

    pub fn set_cif(&self, count: u32) {
        self.cif_count.store(count, Ordering::Relaxed);
        self.cif_present.store(true, Ordering::Release);
    }

    fn advance_cif(&self) {
        let _ = self
            .cif_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                Some((count + 1) % CIF_COUNT_MODULO)
            });
    }

    pub fn ecc(&self) -> Option<u8> {
        self.ecc_present
            .load(Ordering::Acquire)
            .then(|| self.ecc.load(Ordering::Relaxed))
    }

    /// Only the first extended country code after a reset is kept.
    pub fn set_ecc(&self, ecc: u8) {
        if !self.ecc_present.load(Ordering::Acquire) {
            self.ecc.store(ecc, Ordering::Relaxed);
            self.ecc_present.store(true, Ordering::Release);
        }
    }

    pub fn inter_table_id(&self) -> Option<u8> {
        self.inter_table_present
            .load(Ordering::Acquire)
            .then(|| self.inter_table_id.load(Ordering::Relaxed))
    }

    pub fn set_inter_table_id(&self, id: u8) {
        self.inter_table_id.store(id, Ordering::Relaxed);
        self.inter_table_present.store(true, Ordering::Release);
    }

    fn reset(&self) {
        self.cif_count.store(0, Ordering::Relaxed);
        self.cif_present.store(false, Ordering::Release);
        self.ecc_present.store(false, Ordering::Release);
        self.inter_table_present.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct DecoderState {
    pub fail_level: log::Level,

    pub services: Table<Service>,
    pub components: Table<Component>,
    /// Indexed by subchannel id.
    pub subchannels: Table<Subchannel>,
    pub ensemble: Ensemble,
    pub links: LinkAccumulator,

    pub events: Vec<FicEvent>,

    pub ensemble_id_reported: bool,
    pub ensemble_name_reported: bool,
    pub country_reported: bool,

    pub fib_count: u64,
    skipped_figs: HashSet<(u8, u8)>,
}

impl Default for DecoderState {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
            services: Table::default(),
            components: Table::default(),
            subchannels: Table::default(),
            ensemble: Ensemble::default(),
            links: LinkAccumulator::default(),
            events: Vec::with_capacity(8),
            ensemble_id_reported: false,
            ensemble_name_reported: false,
            country_reported: false,
            fib_count: 0,
            skipped_figs: HashSet::new(),
        }
    }
}

impl DecoderState {
    fn decode_fib(&mut self, counters: &FrameCounters, fib: &[u8]) -> Result<()> {
        if fib.len() != FIB_BYTES && fib.len() != FIB_DATA_BYTES {
            log_or_err!(self, Warn, anyhow!(FigError::FibLength(fib.len())));
            return Ok(());
        }

        self.fib_count += 1;

        for fig in FigIter::new(fib) {
            let fig = match fig {
                Ok(fig) => fig,
                Err(err) => {
                    log_or_err!(self, Warn, anyhow!(err));
                    break;
                }
            };

            if let Err(err) = self.decode_fig(counters, &fig) {
                let truncated = err
                    .downcast_ref::<io::Error>()
                    .filter(|e| e.kind() == io::ErrorKind::UnexpectedEof)
                    .map(|e| e.to_string());

                match truncated {
                    Some(reason) => log_or_err!(
                        self,
                        Warn,
                        anyhow!(FigError::Truncated {
                            fig_type: fig.fig_type,
                            extension: fig.extension().unwrap_or(0),
                            len: fig.length,
                            reason,
                        })
                    ),
                    None => return Err(err),
                }
            }
        }

        Ok(())
    }

    fn decode_fig(&mut self, counters: &FrameCounters, fig: &Fig) -> Result<()> {
        match fig.fig_type {
            0 => fig0::decode(self, counters, fig),
            1 => fig1::decode(self, fig),
            fig_type => {
                self.note_skipped(fig_type, fig.extension().unwrap_or(0));
                Ok(())
            }
        }
    }

    /// Logs an unhandled FIG type/extension the first time it is seen.
    pub fn note_skipped(&mut self, fig_type: u8, extension: u8) {
        if self.skipped_figs.insert((fig_type, extension)) {
            debug!("FIG {fig_type}/{extension} is not handled, skipping");
        }
    }

    pub fn find_service(&self, service_id: u32) -> Option<usize> {
        self.services.position(|s| s.service_id == service_id)
    }

    /// Slot of the service `service_id`, allocated on first reference.
    pub fn find_or_create_service(&mut self, service_id: u32) -> Result<Option<usize>> {
        if let Some(index) = self.find_service(service_id) {
            return Ok(Some(index));
        }

        let Some(index) = self.services.first_free() else {
            log_or_err!(self, Warn, anyhow!(FigError::TableFull("Service")));
            return Ok(None);
        };

        if let Some(slot) = self.services.slot_mut(index) {
            *slot = Service::new(service_id);
        }
        self.ensemble.collecting();
        debug!("Service 0x{service_id:04X} allocated in slot {index}");

        Ok(Some(index))
    }

    pub fn find_component(&self, service: usize, component_nr: u8) -> Option<usize> {
        self.components
            .position(|c| c.service == service && c.component_nr == component_nr)
    }

    /// Component `component_nr` of the service with id `service_id`.
    pub fn find_component_by_sid(&self, service_id: u32, component_nr: u8) -> Option<usize> {
        self.find_service(service_id)
            .and_then(|service| self.find_component(service, component_nr))
    }

    /// Binds a component to a service unless the pair (service, component
    /// number) is already bound. A service that already has a label is
    /// published.
    pub fn bind_component(
        &mut self,
        service: usize,
        component_nr: u8,
        transport: TransportMode,
        kind: ComponentKind,
        primary: bool,
    ) -> Result<Option<usize>> {
        if let Some(index) = self.find_component(service, component_nr) {
            return Ok(Some(index));
        }

        let Some(index) = self.components.first_free() else {
            log_or_err!(self, Warn, anyhow!(FigError::TableFull("Component")));
            return Ok(None);
        };

        if let Some(slot) = self.components.slot_mut(index) {
            *slot = Component {
                in_use: true,
                transport,
                service,
                component_nr,
                primary,
                kind,
                ..Default::default()
            };
        }

        if let Some(svc) = self.services.get(service) {
            debug!(
                "Component {component_nr} ({transport:?}) bound to service 0x{:04X}",
                svc.service_id
            );
        }

        self.publish_service(service);

        Ok(Some(index))
    }

    /// Queues the `Service` notification once the service has a label.
    pub fn publish_service(&mut self, service: usize) {
        let Some(svc) = self.services.get_mut(service) else {
            return;
        };

        if !svc.has_name || svc.published {
            return;
        }

        svc.published = true;
        info!(
            "Service 0x{:04X}: {}",
            svc.service_id,
            svc.label.text.trim_end()
        );

        let event = FicEvent::Service {
            id: svc.service_id,
            label: svc.label.clone(),
        };
        self.events.push(event);
    }

    pub fn has_components(&self, service: usize) -> bool {
        self.components.position(|c| c.service == service).is_some()
    }

    fn reset(&mut self) {
        self.services.clear();
        self.components.clear();
        self.subchannels.clear();
        self.ensemble = Ensemble::default();
        self.links.reset();
        self.events.clear();
        self.ensemble_id_reported = false;
        self.ensemble_name_reported = false;
        self.country_reported = false;
        trace!("Decoder state reset after {} FIBs", self.fib_count);
    }
}
