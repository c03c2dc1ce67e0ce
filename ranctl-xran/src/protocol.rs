//! xRAN message types
//!
//! Defines the message-type table and the typed bodies exchanged with
//! cells. The envelope is `{ version, message-type, body }`; the body
//! is a choice of exactly one of the kinds below, and the message-type
//! integer is the stable index into that choice (the same number is
//! used as the body's constructed TLV tag on the wire).

use std::fmt;

use bytes::Bytes;

use ranctl_common::{Crnti, Ecgi, Pci};

/// Protocol version carried in every envelope.
pub const PROTOCOL_VERSION: &str = "3";

/// Message type identifier - the stable mapping from integer to body
/// alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Controller asks a cell for its configuration
    CellConfigRequest = 1,
    /// Cell reports its radio configuration
    CellConfigReport = 2,
    /// Cell asks whether a UE may attach
    UeAdmissionRequest = 3,
    /// Controller's admission verdict
    UeAdmissionResponse = 4,
    /// Cell reports an admitted UE's context (stable + radio identity)
    UeContextUpdate = 5,
    /// Cell reports that a UE's CRNTI was rebound
    UeReconfigInd = 6,
    /// Cell reports that a UE went idle
    UeReleaseInd = 7,
    /// Cell asks whether bearers may be admitted
    BearerAdmissionRequest = 8,
    /// Controller's bearer admission verdict
    BearerAdmissionResponse = 9,
    /// Cell reports released bearers
    BearerReleaseInd = 10,
    /// Controller orders a handover
    HoRequest = 11,
    /// Source cell reports a failed handover
    HoFailure = 12,
    /// Target cell reports a completed handover
    HoComplete = 13,
    /// Per-UE signal strength report (RSRP/RSRQ per measured cell)
    RxSigMeasReport = 14,
    /// Per-UE radio quality report (CQI histogram per serving cell)
    RadioMeasReportPerUe = 15,
    /// Per-UE scheduler report (PRB usage, MCS per serving cell)
    SchedMeasReportPerUe = 16,
    /// Per-UE PDCP throughput/delay report
    PdcpMeasReportPerUe = 17,
    /// Controller pushes radio-resource-management parameters
    RrmConfig = 18,
    /// Cell acknowledges an RRM configuration
    RrmConfigStatus = 19,
    /// Controller orders a secondary-carrier add
    ScellAdd = 20,
    /// Cell acknowledges a secondary-carrier add
    ScellAddStatus = 21,
    /// Controller orders a secondary-carrier delete
    ScellDelete = 22,
    /// Controller asks a UE for its capabilities
    UeCapabilityEnquiry = 23,
    /// Cell forwards a UE's capabilities
    UeCapabilityInfo = 24,
    /// Controller configures L2 measurement reporting
    L2MeasConfig = 25,
}

impl MessageType {
    /// All message types in ascending wire-number order. Choice decode
    /// scans this table for the alternative whose tag matches.
    pub const ALL: [MessageType; 25] = [
        MessageType::CellConfigRequest,
        MessageType::CellConfigReport,
        MessageType::UeAdmissionRequest,
        MessageType::UeAdmissionResponse,
        MessageType::UeContextUpdate,
        MessageType::UeReconfigInd,
        MessageType::UeReleaseInd,
        MessageType::BearerAdmissionRequest,
        MessageType::BearerAdmissionResponse,
        MessageType::BearerReleaseInd,
        MessageType::HoRequest,
        MessageType::HoFailure,
        MessageType::HoComplete,
        MessageType::RxSigMeasReport,
        MessageType::RadioMeasReportPerUe,
        MessageType::SchedMeasReportPerUe,
        MessageType::PdcpMeasReportPerUe,
        MessageType::RrmConfig,
        MessageType::RrmConfigStatus,
        MessageType::ScellAdd,
        MessageType::ScellAddStatus,
        MessageType::ScellDelete,
        MessageType::UeCapabilityEnquiry,
        MessageType::UeCapabilityInfo,
        MessageType::L2MeasConfig,
    ];

    /// Creates a MessageType from its wire integer.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| *t as u8 == value)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Accept/reject verdict carried in admission-shaped responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdmissionStatus {
    /// Request granted
    Success = 0,
    /// Request denied (a valid outcome, not an error)
    Failure = 1,
}

impl AdmissionStatus {
    /// Creates an AdmissionStatus from its wire integer.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::Failure),
            _ => None,
        }
    }
}

/// One bearer in an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bearer {
    /// E-RAB identifier
    pub erab_id: u8,
    /// QoS class identifier
    pub qci: u8,
}

/// One measured cell in a signal report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxSigReport {
    /// Physical identity of the measured cell
    pub pci: Pci,
    /// Reference signal received power (dBm)
    pub rsrp: i16,
    /// Reference signal received quality (dB)
    pub rsrq: i16,
}

/// Per-serving-cell radio quality report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioRepPerServCell {
    /// Physical identity of the serving cell
    pub pci: Pci,
    /// CQI histogram (bucket counts, index = CQI value)
    pub cqi_hist: Vec<u32>,
}

/// Per-serving-cell scheduler report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedMeasRepPerServCell {
    /// Physical identity of the serving cell
    pub pci: Pci,
    /// Downlink PRB usage percentage
    pub prb_usage_dl: u8,
    /// Uplink PRB usage percentage
    pub prb_usage_ul: u8,
    /// Downlink modulation and coding scheme
    pub mcs_dl: u8,
    /// Uplink modulation and coding scheme
    pub mcs_ul: u8,
}

/// Radio-resource-management parameters pushed to a cell, optionally
/// scoped to one UE's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RrmConfig {
    /// Downlink power offset (dB)
    pub p_a: Option<i64>,
    /// Downlink traffic split percentage for dual connectivity
    pub traffic_split_pct: Option<u8>,
}

/// Cell radio configuration as reported by the cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellConfig {
    /// Physical cell identity
    pub pci: Pci,
    /// Downlink EARFCN
    pub earfcn_dl: u32,
    /// Uplink EARFCN
    pub earfcn_ul: u32,
    /// Downlink bandwidth in PRBs
    pub num_prbs_dl: u16,
    /// Uplink bandwidth in PRBs
    pub num_prbs_ul: u16,
    /// Admission capacity
    pub max_ues: u16,
}

/// The message body choice: exactly one alternative per PDU.
#[derive(Debug, Clone, PartialEq)]
pub enum XranBody {
    /// Configuration request (controller to cell)
    CellConfigRequest {
        /// Target cell
        ecgi: Ecgi,
    },
    /// Configuration report (cell to controller)
    CellConfigReport {
        /// Reporting cell
        ecgi: Ecgi,
        /// Reported radio configuration
        config: CellConfig,
    },
    /// UE admission request (cell to controller)
    UeAdmissionRequest {
        /// Requesting cell
        ecgi: Ecgi,
        /// Radio identity the cell proposes for the UE
        crnti: Crnti,
    },
    /// UE admission verdict (controller to cell)
    UeAdmissionResponse {
        /// Requesting cell
        ecgi: Ecgi,
        /// Radio identity from the request
        crnti: Crnti,
        /// Verdict
        status: AdmissionStatus,
    },
    /// UE context update (cell to controller)
    UeContextUpdate {
        /// Serving cell
        ecgi: Ecgi,
        /// Radio identity in that cell
        crnti: Crnti,
        /// Stable identity
        imsi: u64,
    },
    /// CRNTI rebinding (cell to controller)
    UeReconfigInd {
        /// Serving cell
        ecgi: Ecgi,
        /// Previous radio identity
        crnti_old: Crnti,
        /// New radio identity
        crnti_new: Crnti,
    },
    /// UE released to idle (cell to controller)
    UeReleaseInd {
        /// Serving cell
        ecgi: Ecgi,
        /// Radio identity
        crnti: Crnti,
        /// Release cause code
        cause: u8,
    },
    /// Bearer admission request (cell to controller)
    BearerAdmissionRequest {
        /// Requesting cell
        ecgi: Ecgi,
        /// Radio identity
        crnti: Crnti,
        /// Bearers to admit
        bearers: Vec<Bearer>,
    },
    /// Bearer admission verdict (controller to cell)
    BearerAdmissionResponse {
        /// Requesting cell
        ecgi: Ecgi,
        /// Radio identity
        crnti: Crnti,
        /// Verdict
        status: AdmissionStatus,
    },
    /// Bearer release indication (cell to controller)
    BearerReleaseInd {
        /// Serving cell
        ecgi: Ecgi,
        /// Radio identity
        crnti: Crnti,
        /// E-RAB ids released
        erab_ids: Vec<u8>,
    },
    /// Handover order (controller to source cell)
    HoRequest {
        /// Source cell
        ecgi_source: Ecgi,
        /// Target cell
        ecgi_target: Ecgi,
        /// UE radio identity at the source cell
        crnti: Crnti,
    },
    /// Handover failure (source cell to controller)
    HoFailure {
        /// Source cell
        ecgi_source: Ecgi,
        /// UE radio identity at the source cell
        crnti: Crnti,
        /// Failure cause code
        cause: u8,
    },
    /// Handover completion (target cell to controller)
    HoComplete {
        /// Source cell
        ecgi_source: Ecgi,
        /// Target cell
        ecgi_target: Ecgi,
        /// UE radio identity at the source cell
        crnti: Crnti,
    },
    /// Per-UE signal report (cell to controller)
    RxSigMeasReport {
        /// Reporting cell (by physical identity)
        pci: Pci,
        /// Reporting UE's radio identity
        crnti: Crnti,
        /// Measurements per measured cell
        reports: Vec<RxSigReport>,
    },
    /// Per-UE radio quality report (cell to controller)
    RadioMeasReportPerUe {
        /// Reporting cell (by physical identity)
        pci: Pci,
        /// Reporting UE's radio identity
        crnti: Crnti,
        /// Quality per serving cell
        reports: Vec<RadioRepPerServCell>,
    },
    /// Per-UE scheduler report (cell to controller)
    SchedMeasReportPerUe {
        /// Reporting cell (by physical identity)
        pci: Pci,
        /// Reporting UE's radio identity
        crnti: Crnti,
        /// Scheduler stats per serving cell
        reports: Vec<SchedMeasRepPerServCell>,
    },
    /// Per-UE PDCP report (cell to controller)
    PdcpMeasReportPerUe {
        /// Reporting cell (by physical identity)
        pci: Pci,
        /// Reporting UE's radio identity
        crnti: Crnti,
        /// Downlink throughput (kbps)
        throughput_dl: u32,
        /// Uplink throughput (kbps)
        throughput_ul: u32,
        /// Downlink packet delay (0.1 ms units)
        pkt_delay_dl: u32,
    },
    /// RRM parameter push (controller to cell)
    RrmConfig {
        /// Target cell
        ecgi: Ecgi,
        /// Target UE's radio identity, if link-scoped
        crnti: Option<Crnti>,
        /// Parameters
        params: RrmConfig,
    },
    /// RRM acknowledgment (cell to controller)
    RrmConfigStatus {
        /// Acknowledging cell
        ecgi: Ecgi,
        /// Verdict
        status: AdmissionStatus,
    },
    /// Secondary-carrier add order (controller to cell)
    ScellAdd {
        /// Anchor cell
        ecgi: Ecgi,
        /// UE radio identity at the anchor cell
        crnti: Crnti,
        /// Physical identity of the carrier to add
        scell_pci: Pci,
    },
    /// Secondary-carrier add acknowledgment (cell to controller)
    ScellAddStatus {
        /// Anchor cell
        ecgi: Ecgi,
        /// UE radio identity at the anchor cell
        crnti: Crnti,
        /// Verdict
        status: AdmissionStatus,
    },
    /// Secondary-carrier delete order (controller to cell)
    ScellDelete {
        /// Anchor cell
        ecgi: Ecgi,
        /// UE radio identity at the anchor cell
        crnti: Crnti,
        /// Physical identity of the carrier to drop
        scell_pci: Pci,
    },
    /// Capability enquiry (controller to cell)
    UeCapabilityEnquiry {
        /// Serving cell
        ecgi: Ecgi,
        /// UE radio identity
        crnti: Crnti,
    },
    /// Capability info (cell to controller)
    UeCapabilityInfo {
        /// Serving cell
        ecgi: Ecgi,
        /// UE radio identity
        crnti: Crnti,
        /// UE category
        ue_category: u8,
    },
    /// L2 measurement configuration (controller to cell)
    L2MeasConfig {
        /// Target cell
        ecgi: Ecgi,
        /// Reporting interval (ms)
        report_interval_ms: u32,
    },
}

impl XranBody {
    /// Returns the message type of this body alternative.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CellConfigRequest { .. } => MessageType::CellConfigRequest,
            Self::CellConfigReport { .. } => MessageType::CellConfigReport,
            Self::UeAdmissionRequest { .. } => MessageType::UeAdmissionRequest,
            Self::UeAdmissionResponse { .. } => MessageType::UeAdmissionResponse,
            Self::UeContextUpdate { .. } => MessageType::UeContextUpdate,
            Self::UeReconfigInd { .. } => MessageType::UeReconfigInd,
            Self::UeReleaseInd { .. } => MessageType::UeReleaseInd,
            Self::BearerAdmissionRequest { .. } => MessageType::BearerAdmissionRequest,
            Self::BearerAdmissionResponse { .. } => MessageType::BearerAdmissionResponse,
            Self::BearerReleaseInd { .. } => MessageType::BearerReleaseInd,
            Self::HoRequest { .. } => MessageType::HoRequest,
            Self::HoFailure { .. } => MessageType::HoFailure,
            Self::HoComplete { .. } => MessageType::HoComplete,
            Self::RxSigMeasReport { .. } => MessageType::RxSigMeasReport,
            Self::RadioMeasReportPerUe { .. } => MessageType::RadioMeasReportPerUe,
            Self::SchedMeasReportPerUe { .. } => MessageType::SchedMeasReportPerUe,
            Self::PdcpMeasReportPerUe { .. } => MessageType::PdcpMeasReportPerUe,
            Self::RrmConfig { .. } => MessageType::RrmConfig,
            Self::RrmConfigStatus { .. } => MessageType::RrmConfigStatus,
            Self::ScellAdd { .. } => MessageType::ScellAdd,
            Self::ScellAddStatus { .. } => MessageType::ScellAddStatus,
            Self::ScellDelete { .. } => MessageType::ScellDelete,
            Self::UeCapabilityEnquiry { .. } => MessageType::UeCapabilityEnquiry,
            Self::UeCapabilityInfo { .. } => MessageType::UeCapabilityInfo,
            Self::L2MeasConfig { .. } => MessageType::L2MeasConfig,
        }
    }
}

/// A protocol data unit: the envelope plus an optional cache of the
/// bytes it was decoded from.
///
/// The cache implements the passthrough contract: a PDU that was
/// decoded and not logically modified re-encodes to exactly the bytes
/// it came from. Mutating the body through [`XranPdu::body_mut`]
/// invalidates the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct XranPdu {
    version: String,
    body: XranBody,
    raw: Option<Bytes>,
}

impl XranPdu {
    /// Creates a new PDU with the current protocol version.
    pub fn new(body: XranBody) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_owned(),
            body,
            raw: None,
        }
    }

    /// Creates a PDU decoded from the wire, retaining its raw bytes.
    pub(crate) fn decoded(version: String, body: XranBody, raw: Bytes) -> Self {
        Self {
            version,
            body,
            raw: Some(raw),
        }
    }

    /// The envelope version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The message type of the body.
    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Read access to the body.
    pub fn body(&self) -> &XranBody {
        &self.body
    }

    /// Mutable access to the body; drops the raw-byte cache so the
    /// next encode reflects the change.
    pub fn body_mut(&mut self) -> &mut XranBody {
        self.raw = None;
        &mut self.body
    }

    /// Consumes the PDU, returning the body.
    pub fn into_body(self) -> XranBody {
        self.body
    }

    /// The cached wire form, if this PDU is an unmodified decode.
    pub(crate) fn cached(&self) -> Option<&Bytes> {
        self.raw.as_ref()
    }
}
