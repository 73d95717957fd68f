//! Record loader — batch-fetches card files and aggregates decoded fields.
//!
//! One load cycle issues the full file batch over the transport, tracks the
//! outstanding count, and signals completion exactly once when every
//! request has come back (success or failure alike):
//!
//! ```text
//! begin_load ──▶ 9 commands ──▶ transport
//!                                  │ (async, any order)
//!                   on_result ◀────┘
//!                   pending  9 → 8 → … → 0  ──▶ Completed
//! ```
//!
//! Individual decode failures are tolerated: the field stays absent and
//! the batch keeps counting down.  Batches are generation-tagged so a
//! `begin_load` that supersedes an in-flight batch consumes the old
//! completions without letting them touch the new counter or record set.

pub mod codec;

use log::{debug, error, info, warn};

use crate::app::ports::TransportPort;
use crate::config::SystemConfig;
use crate::error::DecodeError;
use crate::transport::{Command, CorrelationId, FileKind, Outcome, Response};

use codec::{DigitString, LangList, NameString, SystemIdList};

// ───────────────────────────────────────────────────────────────
// Record set
// ───────────────────────────────────────────────────────────────

/// Field names consumers can query once the set is fully loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Imsi,
    Iccid,
    Mdn,
    Min,
    ServiceName,
    PrlVersion,
    HomeSystemIds,
    HomeNetworkIds,
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Digits(DigitString),
    Name(NameString),
    Number(u16),
    Systems(SystemIdList),
}

/// Aggregated card identity and provisioning records.
///
/// Populated incrementally while a batch is in flight, but only ever
/// handed out whole — consumers see it exclusively through
/// [`RecordLoader::fields`], which returns `None` until all-loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub imsi: Option<DigitString>,
    pub iccid: Option<DigitString>,
    pub mdn: Option<DigitString>,
    pub min: Option<DigitString>,
    pub service_name: Option<NameString>,
    pub spn_display_condition: bool,
    pub prl_version: Option<u16>,
    pub home_sids: Option<SystemIdList>,
    pub home_nids: Option<SystemIdList>,
    /// Preferred languages from EF_CSIM_LI (checked first).
    pub csim_languages: LangList,
    /// Preferred languages from EF_PL (fallback).
    pub iso_languages: LangList,
}

impl RecordSet {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Field lookup by name.  `None` for absent fields.
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Imsi => self.imsi.clone().map(FieldValue::Digits),
            Field::Iccid => self.iccid.clone().map(FieldValue::Digits),
            Field::Mdn => self.mdn.clone().map(FieldValue::Digits),
            Field::Min => self.min.clone().map(FieldValue::Digits),
            Field::ServiceName => self.service_name.clone().map(FieldValue::Name),
            Field::PrlVersion => self.prl_version.map(FieldValue::Number),
            Field::HomeSystemIds => self.home_sids.clone().map(FieldValue::Systems),
            Field::HomeNetworkIds => self.home_nids.clone().map(FieldValue::Systems),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Load batch bookkeeping
// ───────────────────────────────────────────────────────────────

/// One item of the load batch.  The IMSI is queried from the application,
/// not read as a file, so it sits beside the EF reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadItem {
    Imsi,
    File(FileKind),
}

impl LoadItem {
    fn name(self) -> &'static str {
        match self {
            Self::Imsi => "IMSI",
            Self::File(kind) => kind.name(),
        }
    }
}

/// In-flight request entry.  Capacity covers one full batch plus stragglers
/// from a superseded one.
const MAX_INFLIGHT: usize = 24;

#[derive(Debug, Clone, Copy)]
struct Inflight {
    id: CorrelationId,
    item: LoadItem,
    generation: u32,
}

/// Outcome of feeding one transport completion to the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProgress {
    /// Batch still has outstanding requests.
    InProgress,
    /// The batch just completed; "all loaded" should be signalled now.
    Completed,
    /// Stale or duplicate completion; consumed with no state change.
    Ignored,
}

// ───────────────────────────────────────────────────────────────
// Record loader
// ───────────────────────────────────────────────────────────────

/// Drives the card file batch and owns the aggregated [`RecordSet`].
pub struct RecordLoader {
    set: RecordSet,
    /// Outstanding requests of the current generation.  Never negative:
    /// decremented exactly once per consumed completion.
    pending: u32,
    /// True from `begin_load` until completion fires; guards against a
    /// spurious zero-count firing before any request was issued.
    requested: bool,
    /// Current batch generation; bumped by every `begin_load`.
    generation: u32,
    /// All-loaded latch; gates field exposure.
    loaded: bool,
    inflight: heapless::Vec<Inflight, MAX_INFLIGHT>,

    // Copied out of SystemConfig at construction / reconfigure.
    imsi_min_digits: usize,
    imsi_max_digits: usize,
    eprl_read_bytes: u8,
    mdn_record_index: u8,
}

impl RecordLoader {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            set: RecordSet::default(),
            pending: 0,
            requested: false,
            generation: 0,
            loaded: false,
            inflight: heapless::Vec::new(),
            imsi_min_digits: config.imsi_min_digits as usize,
            imsi_max_digits: config.imsi_max_digits as usize,
            eprl_read_bytes: config.eprl_read_bytes,
            mdn_record_index: config.mdn_record_index,
        }
    }

    /// Apply a hot-reloaded configuration.
    pub fn reconfigure(&mut self, config: &SystemConfig) {
        self.imsi_min_digits = config.imsi_min_digits as usize;
        self.imsi_max_digits = config.imsi_max_digits as usize;
        self.eprl_read_bytes = config.eprl_read_bytes;
        self.mdn_record_index = config.mdn_record_index;
    }

    /// Start a fresh load cycle: reset the record set, bump the generation,
    /// and issue the whole file batch.  Supersedes any in-flight batch.
    pub fn begin_load(&mut self, transport: &mut dyn TransportPort) {
        self.generation = self.generation.wrapping_add(1);
        self.set.clear();
        self.loaded = false;
        self.requested = true;
        self.pending = 0;

        let batch = [
            (LoadItem::Imsi, Command::ReadImsi),
            (
                LoadItem::File(FileKind::Iccid),
                Command::ReadTransparent {
                    file: FileKind::Iccid,
                    len: None,
                },
            ),
            (
                LoadItem::File(FileKind::PreferredLanguages),
                Command::ReadTransparent {
                    file: FileKind::PreferredLanguages,
                    len: None,
                },
            ),
            (
                LoadItem::File(FileKind::CsimLanguage),
                Command::ReadTransparent {
                    file: FileKind::CsimLanguage,
                    len: None,
                },
            ),
            (
                LoadItem::File(FileKind::CsimServiceName),
                Command::ReadTransparent {
                    file: FileKind::CsimServiceName,
                    len: None,
                },
            ),
            (
                LoadItem::File(FileKind::CsimMdn),
                Command::ReadRecord {
                    file: FileKind::CsimMdn,
                    index: self.mdn_record_index,
                },
            ),
            (
                LoadItem::File(FileKind::CsimImsiM),
                Command::ReadTransparent {
                    file: FileKind::CsimImsiM,
                    len: None,
                },
            ),
            (
                LoadItem::File(FileKind::CsimCdmaHome),
                Command::ReadAllRecords {
                    file: FileKind::CsimCdmaHome,
                },
            ),
            // The full PRL can be huge; only the header carries the version.
            (
                LoadItem::File(FileKind::CsimEprl),
                Command::ReadTransparent {
                    file: FileKind::CsimEprl,
                    len: Some(self.eprl_read_bytes),
                },
            ),
        ];

        for (item, command) in batch {
            let id = transport.send(command);
            self.track(Inflight {
                id,
                item,
                generation: self.generation,
            });
            self.pending += 1;
        }

        info!(
            "record load started: {} requests, generation {}",
            self.pending, self.generation
        );
    }

    /// Feed one transport completion into the loader.
    pub fn on_result(&mut self, id: CorrelationId, outcome: &Outcome) -> LoadProgress {
        let Some(pos) = self.inflight.iter().position(|e| e.id == id) else {
            // Not ours, or already consumed: a duplicate delivery must not
            // decrement the counter or re-fire completion.
            warn!("duplicate or unknown load completion {id}, ignoring");
            return LoadProgress::Ignored;
        };
        let entry = self.inflight.swap_remove(pos);

        if entry.generation != self.generation {
            debug!(
                "stale completion {id} for {} (generation {} < {}), discarding",
                entry.item.name(),
                entry.generation,
                self.generation
            );
            return LoadProgress::Ignored;
        }

        match outcome {
            Ok(response) => {
                if let Err(e) = self.decode(entry.item, response) {
                    // Recovered locally: the field stays absent.
                    warn!("{} decode failed: {e}", entry.item.name());
                }
            }
            Err(e) => {
                warn!("{} load skipped: {e}", entry.item.name());
            }
        }

        self.finish_one()
    }

    /// All-loaded latch.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The record set, exposed only once fully loaded.
    pub fn fields(&self) -> Option<&RecordSet> {
        self.loaded.then_some(&self.set)
    }

    /// Current batch generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Outstanding requests in the current batch.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Drop all cached records, latches and in-flight bookkeeping (card
    /// refresh / dispose).  Stragglers from before the reset then count
    /// as unknown ids and are ignored.
    pub fn reset(&mut self) {
        self.set.clear();
        self.loaded = false;
        self.requested = false;
        self.pending = 0;
        self.inflight.clear();
    }

    // ── Internal ──────────────────────────────────────────────

    fn track(&mut self, entry: Inflight) {
        if self.inflight.is_full() {
            // Oldest straggler gives way; its late completion will then
            // count as unknown and be ignored.
            warn!("in-flight table full, evicting oldest entry");
            self.inflight.remove(0);
        }
        // Cannot fail: an eviction just guaranteed a free slot.
        let _ = self.inflight.push(entry);
    }

    fn finish_one(&mut self) -> LoadProgress {
        if self.pending == 0 {
            // A consumed completion with a zero counter means the
            // bookkeeping above has a bug; clamp rather than wrap.
            error!("pending count already zero, programmer error suspected");
            return LoadProgress::Ignored;
        }
        self.pending -= 1;
        debug!(
            "record loaded, {} to go (requested: {})",
            self.pending, self.requested
        );

        if self.pending == 0 && self.requested {
            self.requested = false;
            self.loaded = true;
            info!("record load complete, generation {}", self.generation);
            LoadProgress::Completed
        } else {
            LoadProgress::InProgress
        }
    }

    fn decode(&mut self, item: LoadItem, response: &Response) -> Result<(), DecodeError> {
        match item {
            LoadItem::Imsi => {
                let Response::Imsi(imsi) = response else {
                    return Err(DecodeError::WrongPayload);
                };
                if !codec::validate_imsi(imsi, self.imsi_min_digits, self.imsi_max_digits) {
                    return Err(DecodeError::InvalidDigits);
                }
                let mut stored = DigitString::new();
                stored
                    .push_str(imsi)
                    .map_err(|()| DecodeError::CapacityExceeded)?;
                debug!("IMSI: {}xxxxxxxxx", &stored[..6]);
                self.set.imsi = Some(stored);
            }
            LoadItem::File(FileKind::Iccid) => {
                let data = expect_data(response)?;
                self.set.iccid = Some(codec::bcd_to_string(data)?);
            }
            LoadItem::File(FileKind::PreferredLanguages) => {
                let data = expect_data(response)?;
                self.set.iso_languages = codec::decode_iso_languages(data);
            }
            LoadItem::File(FileKind::CsimLanguage) => {
                let data = expect_data(response)?;
                self.set.csim_languages = codec::decode_csim_languages(data);
            }
            LoadItem::File(FileKind::CsimServiceName) => {
                let data = expect_data(response)?;
                let (display, name) = codec::decode_spn(data)?;
                self.set.spn_display_condition = display;
                self.set.service_name = Some(name);
            }
            LoadItem::File(FileKind::CsimMdn) => {
                let data = expect_data(response)?;
                self.set.mdn = Some(codec::decode_mdn(data)?);
            }
            LoadItem::File(FileKind::CsimImsiM) => {
                let data = expect_data(response)?;
                match codec::decode_min(data)? {
                    Some(min) => self.set.min = Some(min),
                    None => debug!("MIN not provisioned"),
                }
            }
            LoadItem::File(FileKind::CsimCdmaHome) => {
                let Response::Records(records) = response else {
                    return Err(DecodeError::WrongPayload);
                };
                let (sids, nids) = codec::decode_cdma_home(records.as_slice())?;
                self.set.home_sids = Some(sids);
                self.set.home_nids = Some(nids);
            }
            LoadItem::File(FileKind::CsimEprl) => {
                let data = expect_data(response)?;
                self.set.prl_version = Some(codec::decode_prl_version(data)?);
            }
        }
        Ok(())
    }
}

fn expect_data(response: &Response) -> Result<&[u8], DecodeError> {
    match response {
        Response::Data(data) => Ok(data.as_slice()),
        _ => Err(DecodeError::WrongPayload),
    }
}
