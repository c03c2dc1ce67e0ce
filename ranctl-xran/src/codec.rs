//! xRAN envelope encoding/decoding
//!
//! The envelope is one constructed TLV holding the version string, the
//! message-type integer, and the body. The body is a choice: it is
//! encoded under a constructed context tag whose number equals the
//! message type, and decoded by scanning the fixed per-alternative tag
//! table in ascending order until the leading tag matches. The header
//! integer and the matched alternative must agree.
//!
//! A decoded PDU keeps its raw bytes; encoding an unmodified PDU
//! returns those bytes unchanged (see [`XranPdu::body_mut`]).

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use ranctl_common::{Crnti, Ecgi, Pci};

use crate::protocol::{
    AdmissionStatus, Bearer, CellConfig, MessageType, RadioRepPerServCell, RrmConfig, RxSigReport,
    SchedMeasRepPerServCell, XranBody, XranPdu,
};
use crate::tlv::{Tag, TlvError, TlvReader, TlvWriter};

/// Tag number of the envelope's outer constructed TLV.
const ENVELOPE_TAG: u32 = 0;

/// Errors that can occur during xRAN message encoding/decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum XranCodecError {
    /// TLV-level failure
    #[error("TLV error: {0}")]
    Tlv(#[from] TlvError),

    /// The body's leading tag matched no alternative in the table
    #[error("no body alternative matches tag {0}")]
    UnknownChoiceTag(Tag),

    /// The header message-type integer is not in the table
    #[error("unknown message type: {0}")]
    UnknownMessageType(u64),

    /// The header message-type disagrees with the body alternative
    #[error("message type {header} does not match body alternative {body}")]
    TypeBodyMismatch {
        /// Integer from the envelope header
        header: u64,
        /// Alternative selected by the body tag
        body: MessageType,
    },

    /// A field held a value outside its domain
    #[error("field {0} is out of range")]
    ValueRange(&'static str),

    /// An identity field had the wrong length
    #[error("ECGI field of {0} bytes (want 7)")]
    BadEcgi(usize),

    /// An enumerated field held an unknown code
    #[error("unknown {what} code: {code}")]
    BadEnum {
        /// Field name
        what: &'static str,
        /// Offending code
        code: u64,
    },
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, XranCodecError>;

/// Encodes a PDU to its wire form.
///
/// If the PDU is an unmodified decode, the original bytes are returned
/// byte-exact.
pub fn encode(pdu: &XranPdu) -> Bytes {
    if let Some(raw) = pdu.cached() {
        return raw.clone();
    }

    let mut buf = BytesMut::with_capacity(128);
    let mut w = TlvWriter::new(&mut buf);
    w.constructed(ENVELOPE_TAG, |env| {
        env.put_str(0, pdu.version());
        env.put_u64(1, pdu.message_type() as u8 as u64);
        env.constructed(pdu.message_type() as u8 as u32, |body| {
            encode_body(body, pdu.body());
        });
    });
    buf.freeze()
}

/// Decodes a PDU from its wire form.
pub fn decode(data: &[u8]) -> Result<XranPdu> {
    let mut outer = TlvReader::new(data);
    let mut env = outer.constructed(ENVELOPE_TAG)?;

    let version = env.str(0)?;
    let header_type = env.u64(1)?;

    let (body_tag, body_value) = env.next_unit()?;

    // Choice resolution: ascending scan of the alternative table.
    let mut selected = None;
    for t in MessageType::ALL {
        if Tag::context_constructed(t as u8 as u32) == body_tag {
            selected = Some(t);
            break;
        }
    }
    let msg_type = selected.ok_or(XranCodecError::UnknownChoiceTag(body_tag))?;

    if MessageType::from_u8(header_type as u8).is_none() || header_type > u64::from(u8::MAX) {
        return Err(XranCodecError::UnknownMessageType(header_type));
    }
    if header_type != msg_type as u8 as u64 {
        return Err(XranCodecError::TypeBodyMismatch {
            header: header_type,
            body: msg_type,
        });
    }

    let mut r = TlvReader::new(body_value);
    let body = decode_body(msg_type, &mut r)?;
    r.finish()?;
    env.finish()?;
    outer.finish()?;

    Ok(XranPdu::decoded(
        version,
        body,
        Bytes::copy_from_slice(data),
    ))
}

fn u8_of(v: u64, what: &'static str) -> Result<u8> {
    u8::try_from(v).map_err(|_| XranCodecError::ValueRange(what))
}

fn u16_of(v: u64, what: &'static str) -> Result<u16> {
    u16::try_from(v).map_err(|_| XranCodecError::ValueRange(what))
}

fn u32_of(v: u64, what: &'static str) -> Result<u32> {
    u32::try_from(v).map_err(|_| XranCodecError::ValueRange(what))
}

fn i16_of(v: i64, what: &'static str) -> Result<i16> {
    i16::try_from(v).map_err(|_| XranCodecError::ValueRange(what))
}

fn put_ecgi(w: &mut TlvWriter<'_>, tag_no: u32, ecgi: Ecgi) {
    w.put_bytes(tag_no, &ecgi.encode());
}

fn get_ecgi(r: &mut TlvReader<'_>, tag_no: u32) -> Result<Ecgi> {
    let raw = r.bytes(tag_no)?;
    let bytes: [u8; 7] = raw
        .try_into()
        .map_err(|_| XranCodecError::BadEcgi(raw.len()))?;
    Ok(Ecgi::decode(bytes))
}

fn get_crnti(r: &mut TlvReader<'_>, tag_no: u32) -> Result<Crnti> {
    Ok(Crnti(u16_of(r.u64(tag_no)?, "crnti")?))
}

fn get_pci(r: &mut TlvReader<'_>, tag_no: u32) -> Result<Pci> {
    Ok(Pci(u16_of(r.u64(tag_no)?, "pci")?))
}

fn get_status(r: &mut TlvReader<'_>, tag_no: u32) -> Result<AdmissionStatus> {
    let code = r.u64(tag_no)?;
    AdmissionStatus::from_u8(u8_of(code, "status")?).ok_or(XranCodecError::BadEnum {
        what: "admission status",
        code,
    })
}

fn encode_body(w: &mut TlvWriter<'_>, body: &XranBody) {
    match body {
        XranBody::CellConfigRequest { ecgi } => {
            put_ecgi(w, 0, *ecgi);
        }
        XranBody::CellConfigReport { ecgi, config } => {
            put_ecgi(w, 0, *ecgi);
            w.constructed(1, |c| {
                c.put_u64(0, u64::from(config.pci.0));
                c.put_u64(1, u64::from(config.earfcn_dl));
                c.put_u64(2, u64::from(config.earfcn_ul));
                c.put_u64(3, u64::from(config.num_prbs_dl));
                c.put_u64(4, u64::from(config.num_prbs_ul));
                c.put_u64(5, u64::from(config.max_ues));
            });
        }
        XranBody::UeAdmissionRequest { ecgi, crnti } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
        }
        XranBody::UeAdmissionResponse { ecgi, crnti, status } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, *status as u8 as u64);
        }
        XranBody::UeContextUpdate { ecgi, crnti, imsi } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, *imsi);
        }
        XranBody::UeReconfigInd { ecgi, crnti_old, crnti_new } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti_old.0));
            w.put_u64(2, u64::from(crnti_new.0));
        }
        XranBody::UeReleaseInd { ecgi, crnti, cause } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, u64::from(*cause));
        }
        XranBody::BearerAdmissionRequest { ecgi, crnti, bearers } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.constructed(2, |list| {
                for b in bearers {
                    list.constructed(0, |item| {
                        item.put_u64(0, u64::from(b.erab_id));
                        item.put_u64(1, u64::from(b.qci));
                    });
                }
            });
        }
        XranBody::BearerAdmissionResponse { ecgi, crnti, status } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, *status as u8 as u64);
        }
        XranBody::BearerReleaseInd { ecgi, crnti, erab_ids } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_bytes(2, erab_ids);
        }
        XranBody::HoRequest { ecgi_source, ecgi_target, crnti } => {
            put_ecgi(w, 0, *ecgi_source);
            put_ecgi(w, 1, *ecgi_target);
            w.put_u64(2, u64::from(crnti.0));
        }
        XranBody::HoFailure { ecgi_source, crnti, cause } => {
            put_ecgi(w, 0, *ecgi_source);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, u64::from(*cause));
        }
        XranBody::HoComplete { ecgi_source, ecgi_target, crnti } => {
            put_ecgi(w, 0, *ecgi_source);
            put_ecgi(w, 1, *ecgi_target);
            w.put_u64(2, u64::from(crnti.0));
        }
        XranBody::RxSigMeasReport { pci, crnti, reports } => {
            w.put_u64(0, u64::from(pci.0));
            w.put_u64(1, u64::from(crnti.0));
            w.constructed(2, |list| {
                for rep in reports {
                    list.constructed(0, |item| {
                        item.put_u64(0, u64::from(rep.pci.0));
                        item.put_i64(1, i64::from(rep.rsrp));
                        item.put_i64(2, i64::from(rep.rsrq));
                    });
                }
            });
        }
        XranBody::RadioMeasReportPerUe { pci, crnti, reports } => {
            w.put_u64(0, u64::from(pci.0));
            w.put_u64(1, u64::from(crnti.0));
            w.constructed(2, |list| {
                for rep in reports {
                    list.constructed(0, |item| {
                        item.put_u64(0, u64::from(rep.pci.0));
                        item.constructed(1, |hist| {
                            for (i, count) in rep.cqi_hist.iter().enumerate() {
                                hist.put_u64(i as u32, u64::from(*count));
                            }
                        });
                    });
                }
            });
        }
        XranBody::SchedMeasReportPerUe { pci, crnti, reports } => {
            w.put_u64(0, u64::from(pci.0));
            w.put_u64(1, u64::from(crnti.0));
            w.constructed(2, |list| {
                for rep in reports {
                    list.constructed(0, |item| {
                        item.put_u64(0, u64::from(rep.pci.0));
                        item.put_u64(1, u64::from(rep.prb_usage_dl));
                        item.put_u64(2, u64::from(rep.prb_usage_ul));
                        item.put_u64(3, u64::from(rep.mcs_dl));
                        item.put_u64(4, u64::from(rep.mcs_ul));
                    });
                }
            });
        }
        XranBody::PdcpMeasReportPerUe {
            pci,
            crnti,
            throughput_dl,
            throughput_ul,
            pkt_delay_dl,
        } => {
            w.put_u64(0, u64::from(pci.0));
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, u64::from(*throughput_dl));
            w.put_u64(3, u64::from(*throughput_ul));
            w.put_u64(4, u64::from(*pkt_delay_dl));
        }
        XranBody::RrmConfig { ecgi, crnti, params } => {
            put_ecgi(w, 0, *ecgi);
            if let Some(crnti) = crnti {
                w.put_u64(1, u64::from(crnti.0));
            }
            if let Some(p_a) = params.p_a {
                w.put_i64(2, p_a);
            }
            if let Some(pct) = params.traffic_split_pct {
                w.put_u64(3, u64::from(pct));
            }
        }
        XranBody::RrmConfigStatus { ecgi, status } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, *status as u8 as u64);
        }
        XranBody::ScellAdd { ecgi, crnti, scell_pci } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, u64::from(scell_pci.0));
        }
        XranBody::ScellAddStatus { ecgi, crnti, status } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, *status as u8 as u64);
        }
        XranBody::ScellDelete { ecgi, crnti, scell_pci } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, u64::from(scell_pci.0));
        }
        XranBody::UeCapabilityEnquiry { ecgi, crnti } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
        }
        XranBody::UeCapabilityInfo { ecgi, crnti, ue_category } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(crnti.0));
            w.put_u64(2, u64::from(*ue_category));
        }
        XranBody::L2MeasConfig { ecgi, report_interval_ms } => {
            put_ecgi(w, 0, *ecgi);
            w.put_u64(1, u64::from(*report_interval_ms));
        }
    }
}

fn decode_body(msg_type: MessageType, r: &mut TlvReader<'_>) -> Result<XranBody> {
    let body = match msg_type {
        MessageType::CellConfigRequest => XranBody::CellConfigRequest {
            ecgi: get_ecgi(r, 0)?,
        },
        MessageType::CellConfigReport => {
            let ecgi = get_ecgi(r, 0)?;
            let mut c = r.constructed(1)?;
            let config = CellConfig {
                pci: get_pci(&mut c, 0)?,
                earfcn_dl: u32_of(c.u64(1)?, "earfcn_dl")?,
                earfcn_ul: u32_of(c.u64(2)?, "earfcn_ul")?,
                num_prbs_dl: u16_of(c.u64(3)?, "num_prbs_dl")?,
                num_prbs_ul: u16_of(c.u64(4)?, "num_prbs_ul")?,
                max_ues: u16_of(c.u64(5)?, "max_ues")?,
            };
            c.finish()?;
            XranBody::CellConfigReport { ecgi, config }
        }
        MessageType::UeAdmissionRequest => XranBody::UeAdmissionRequest {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
        },
        MessageType::UeAdmissionResponse => XranBody::UeAdmissionResponse {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            status: get_status(r, 2)?,
        },
        MessageType::UeContextUpdate => XranBody::UeContextUpdate {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            imsi: r.u64(2)?,
        },
        MessageType::UeReconfigInd => XranBody::UeReconfigInd {
            ecgi: get_ecgi(r, 0)?,
            crnti_old: get_crnti(r, 1)?,
            crnti_new: get_crnti(r, 2)?,
        },
        MessageType::UeReleaseInd => XranBody::UeReleaseInd {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            cause: u8_of(r.u64(2)?, "cause")?,
        },
        MessageType::BearerAdmissionRequest => {
            let ecgi = get_ecgi(r, 0)?;
            let crnti = get_crnti(r, 1)?;
            let mut list = r.constructed(2)?;
            let mut bearers = Vec::new();
            while !list.is_empty() {
                let mut item = list.constructed(0)?;
                bearers.push(Bearer {
                    erab_id: u8_of(item.u64(0)?, "erab_id")?,
                    qci: u8_of(item.u64(1)?, "qci")?,
                });
                item.finish()?;
            }
            XranBody::BearerAdmissionRequest { ecgi, crnti, bearers }
        }
        MessageType::BearerAdmissionResponse => XranBody::BearerAdmissionResponse {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            status: get_status(r, 2)?,
        },
        MessageType::BearerReleaseInd => XranBody::BearerReleaseInd {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            erab_ids: r.bytes(2)?.to_vec(),
        },
        MessageType::HoRequest => XranBody::HoRequest {
            ecgi_source: get_ecgi(r, 0)?,
            ecgi_target: get_ecgi(r, 1)?,
            crnti: get_crnti(r, 2)?,
        },
        MessageType::HoFailure => XranBody::HoFailure {
            ecgi_source: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            cause: u8_of(r.u64(2)?, "cause")?,
        },
        MessageType::HoComplete => XranBody::HoComplete {
            ecgi_source: get_ecgi(r, 0)?,
            ecgi_target: get_ecgi(r, 1)?,
            crnti: get_crnti(r, 2)?,
        },
        MessageType::RxSigMeasReport => {
            let pci = get_pci(r, 0)?;
            let crnti = get_crnti(r, 1)?;
            let mut list = r.constructed(2)?;
            let mut reports = Vec::new();
            while !list.is_empty() {
                let mut item = list.constructed(0)?;
                reports.push(RxSigReport {
                    pci: get_pci(&mut item, 0)?,
                    rsrp: i16_of(item.i64(1)?, "rsrp")?,
                    rsrq: i16_of(item.i64(2)?, "rsrq")?,
                });
                item.finish()?;
            }
            XranBody::RxSigMeasReport { pci, crnti, reports }
        }
        MessageType::RadioMeasReportPerUe => {
            let pci = get_pci(r, 0)?;
            let crnti = get_crnti(r, 1)?;
            let mut list = r.constructed(2)?;
            let mut reports = Vec::new();
            while !list.is_empty() {
                let mut item = list.constructed(0)?;
                let cell_pci = get_pci(&mut item, 0)?;
                let mut hist_r = item.constructed(1)?;
                let mut cqi_hist = Vec::new();
                let mut idx = 0u32;
                while !hist_r.is_empty() {
                    cqi_hist.push(u32_of(hist_r.u64(idx)?, "cqi bucket")?);
                    idx += 1;
                }
                hist_r.finish()?;
                item.finish()?;
                reports.push(RadioRepPerServCell {
                    pci: cell_pci,
                    cqi_hist,
                });
            }
            XranBody::RadioMeasReportPerUe { pci, crnti, reports }
        }
        MessageType::SchedMeasReportPerUe => {
            let pci = get_pci(r, 0)?;
            let crnti = get_crnti(r, 1)?;
            let mut list = r.constructed(2)?;
            let mut reports = Vec::new();
            while !list.is_empty() {
                let mut item = list.constructed(0)?;
                reports.push(SchedMeasRepPerServCell {
                    pci: get_pci(&mut item, 0)?,
                    prb_usage_dl: u8_of(item.u64(1)?, "prb_usage_dl")?,
                    prb_usage_ul: u8_of(item.u64(2)?, "prb_usage_ul")?,
                    mcs_dl: u8_of(item.u64(3)?, "mcs_dl")?,
                    mcs_ul: u8_of(item.u64(4)?, "mcs_ul")?,
                });
                item.finish()?;
            }
            XranBody::SchedMeasReportPerUe { pci, crnti, reports }
        }
        MessageType::PdcpMeasReportPerUe => XranBody::PdcpMeasReportPerUe {
            pci: get_pci(r, 0)?,
            crnti: get_crnti(r, 1)?,
            throughput_dl: u32_of(r.u64(2)?, "throughput_dl")?,
            throughput_ul: u32_of(r.u64(3)?, "throughput_ul")?,
            pkt_delay_dl: u32_of(r.u64(4)?, "pkt_delay_dl")?,
        },
        MessageType::RrmConfig => {
            let ecgi = get_ecgi(r, 0)?;
            let crnti = r.opt_u64(1)?.map(|v| u16_of(v, "crnti")).transpose()?.map(Crnti);
            let p_a = r.opt_i64(2)?;
            let traffic_split_pct = r
                .opt_u64(3)?
                .map(|v| u8_of(v, "traffic_split_pct"))
                .transpose()?;
            XranBody::RrmConfig {
                ecgi,
                crnti,
                params: RrmConfig {
                    p_a,
                    traffic_split_pct,
                },
            }
        }
        MessageType::RrmConfigStatus => XranBody::RrmConfigStatus {
            ecgi: get_ecgi(r, 0)?,
            status: get_status(r, 1)?,
        },
        MessageType::ScellAdd => XranBody::ScellAdd {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            scell_pci: get_pci(r, 2)?,
        },
        MessageType::ScellAddStatus => XranBody::ScellAddStatus {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            status: get_status(r, 2)?,
        },
        MessageType::ScellDelete => XranBody::ScellDelete {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            scell_pci: get_pci(r, 2)?,
        },
        MessageType::UeCapabilityEnquiry => XranBody::UeCapabilityEnquiry {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
        },
        MessageType::UeCapabilityInfo => XranBody::UeCapabilityInfo {
            ecgi: get_ecgi(r, 0)?,
            crnti: get_crnti(r, 1)?,
            ue_category: u8_of(r.u64(2)?, "ue_category")?,
        },
        MessageType::L2MeasConfig => XranBody::L2MeasConfig {
            ecgi: get_ecgi(r, 0)?,
            report_interval_ms: u32_of(r.u64(1)?, "report_interval_ms")?,
        },
    };
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PROTOCOL_VERSION;
    use ranctl_common::Plmn;

    fn ecgi(eci: u32) -> Ecgi {
        Ecgi::new(Plmn::new(315, 10, false), eci)
    }

    fn roundtrip(body: XranBody) -> XranPdu {
        let pdu = XranPdu::new(body);
        let bytes = encode(&pdu);
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded.body(), pdu.body());
        assert_eq!(decoded.version(), PROTOCOL_VERSION);
        decoded
    }

    #[test]
    fn test_cell_config_report_roundtrip() {
        roundtrip(XranBody::CellConfigReport {
            ecgi: ecgi(1),
            config: CellConfig {
                pci: Pci(101),
                earfcn_dl: 2100,
                earfcn_ul: 19900,
                num_prbs_dl: 100,
                num_prbs_ul: 100,
                max_ues: 64,
            },
        });
    }

    #[test]
    fn test_ue_context_update_roundtrip() {
        roundtrip(XranBody::UeContextUpdate {
            ecgi: ecgi(1),
            crnti: Crnti(0x002a),
            imsi: 315010999900001,
        });
    }

    #[test]
    fn test_ho_request_roundtrip() {
        roundtrip(XranBody::HoRequest {
            ecgi_source: ecgi(1),
            ecgi_target: ecgi(2),
            crnti: Crnti(7),
        });
    }

    #[test]
    fn test_rx_sig_meas_roundtrip() {
        roundtrip(XranBody::RxSigMeasReport {
            pci: Pci(101),
            crnti: Crnti(7),
            reports: vec![
                RxSigReport {
                    pci: Pci(101),
                    rsrp: -90,
                    rsrq: -12,
                },
                RxSigReport {
                    pci: Pci(102),
                    rsrp: -85,
                    rsrq: -10,
                },
            ],
        });
    }

    #[test]
    fn test_radio_meas_roundtrip() {
        roundtrip(XranBody::RadioMeasReportPerUe {
            pci: Pci(101),
            crnti: Crnti(7),
            reports: vec![RadioRepPerServCell {
                pci: Pci(101),
                cqi_hist: vec![0, 0, 1, 5, 9, 2],
            }],
        });
    }

    #[test]
    fn test_bearer_admission_roundtrip() {
        roundtrip(XranBody::BearerAdmissionRequest {
            ecgi: ecgi(1),
            crnti: Crnti(7),
            bearers: vec![
                Bearer { erab_id: 5, qci: 9 },
                Bearer { erab_id: 6, qci: 1 },
            ],
        });
    }

    #[test]
    fn test_rrm_config_optional_fields() {
        // All optionals absent.
        roundtrip(XranBody::RrmConfig {
            ecgi: ecgi(1),
            crnti: None,
            params: RrmConfig::default(),
        });
        // All optionals present.
        roundtrip(XranBody::RrmConfig {
            ecgi: ecgi(1),
            crnti: Some(Crnti(7)),
            params: RrmConfig {
                p_a: Some(-3),
                traffic_split_pct: Some(40),
            },
        });
    }

    #[test]
    fn test_all_controller_sent_types_roundtrip() {
        for body in [
            XranBody::CellConfigRequest { ecgi: ecgi(1) },
            XranBody::UeAdmissionResponse {
                ecgi: ecgi(1),
                crnti: Crnti(7),
                status: AdmissionStatus::Success,
            },
            XranBody::BearerAdmissionResponse {
                ecgi: ecgi(1),
                crnti: Crnti(7),
                status: AdmissionStatus::Failure,
            },
            XranBody::ScellAdd {
                ecgi: ecgi(1),
                crnti: Crnti(7),
                scell_pci: Pci(102),
            },
            XranBody::ScellDelete {
                ecgi: ecgi(1),
                crnti: Crnti(7),
                scell_pci: Pci(102),
            },
            XranBody::UeCapabilityEnquiry {
                ecgi: ecgi(1),
                crnti: Crnti(7),
            },
            XranBody::L2MeasConfig {
                ecgi: ecgi(1),
                report_interval_ms: 1000,
            },
        ] {
            roundtrip(body);
        }
    }

    #[test]
    fn test_all_cell_sent_types_roundtrip() {
        for body in [
            XranBody::UeAdmissionRequest {
                ecgi: ecgi(1),
                crnti: Crnti(7),
            },
            XranBody::UeReconfigInd {
                ecgi: ecgi(1),
                crnti_old: Crnti(7),
                crnti_new: Crnti(8),
            },
            XranBody::BearerReleaseInd {
                ecgi: ecgi(1),
                crnti: Crnti(7),
                erab_ids: vec![5, 6],
            },
            XranBody::HoFailure {
                ecgi_source: ecgi(1),
                crnti: Crnti(7),
                cause: 3,
            },
            XranBody::HoComplete {
                ecgi_source: ecgi(1),
                ecgi_target: ecgi(2),
                crnti: Crnti(7),
            },
            XranBody::SchedMeasReportPerUe {
                pci: Pci(101),
                crnti: Crnti(7),
                reports: vec![SchedMeasRepPerServCell {
                    pci: Pci(101),
                    prb_usage_dl: 40,
                    prb_usage_ul: 12,
                    mcs_dl: 22,
                    mcs_ul: 16,
                }],
            },
            XranBody::PdcpMeasReportPerUe {
                pci: Pci(101),
                crnti: Crnti(7),
                throughput_dl: 12_000,
                throughput_ul: 800,
                pkt_delay_dl: 45,
            },
            XranBody::RrmConfigStatus {
                ecgi: ecgi(1),
                status: AdmissionStatus::Failure,
            },
            XranBody::ScellAddStatus {
                ecgi: ecgi(1),
                crnti: Crnti(7),
                status: AdmissionStatus::Success,
            },
            XranBody::UeCapabilityInfo {
                ecgi: ecgi(1),
                crnti: Crnti(7),
                ue_category: 4,
            },
        ] {
            roundtrip(body);
        }
    }

    #[test]
    fn test_passthrough_is_byte_exact() {
        let pdu = XranPdu::new(XranBody::UeReleaseInd {
            ecgi: ecgi(3),
            crnti: Crnti(40),
            cause: 2,
        });
        let wire = encode(&pdu);
        let decoded = decode(&wire).unwrap();
        // No mutation between decode and encode: byte-exact.
        assert_eq!(encode(&decoded), wire);
    }

    #[test]
    fn test_mutation_invalidates_passthrough() {
        let pdu = XranPdu::new(XranBody::UeReleaseInd {
            ecgi: ecgi(3),
            crnti: Crnti(40),
            cause: 2,
        });
        let wire = encode(&pdu);
        let mut decoded = decode(&wire).unwrap();
        if let XranBody::UeReleaseInd { cause, .. } = decoded.body_mut() {
            *cause = 9;
        }
        let re = encode(&decoded);
        assert_ne!(re, wire);
        // And the re-encoded form decodes to the mutated body.
        let again = decode(&re).unwrap();
        assert!(matches!(
            again.body(),
            XranBody::UeReleaseInd { cause: 9, .. }
        ));
    }

    #[test]
    fn test_unknown_choice_tag_rejected() {
        // Hand-build an envelope with body tag 63 (no alternative).
        let mut buf = BytesMut::new();
        let mut w = TlvWriter::new(&mut buf);
        w.constructed(0, |env| {
            env.put_str(0, PROTOCOL_VERSION);
            env.put_u64(1, 63);
            env.constructed(63, |_| {});
        });
        assert!(matches!(
            decode(&buf),
            Err(XranCodecError::UnknownChoiceTag(_))
        ));
    }

    #[test]
    fn test_type_body_mismatch_rejected() {
        // Header claims HoComplete (13) but body tag is CellConfigRequest (1).
        let mut buf = BytesMut::new();
        let mut w = TlvWriter::new(&mut buf);
        w.constructed(0, |env| {
            env.put_str(0, PROTOCOL_VERSION);
            env.put_u64(1, 13);
            env.constructed(1, |b| put_ecgi(b, 0, ecgi(1)));
        });
        assert!(matches!(
            decode(&buf),
            Err(XranCodecError::TypeBodyMismatch { header: 13, .. })
        ));
    }

    #[test]
    fn test_body_with_trailing_bytes_rejected() {
        let mut buf = BytesMut::new();
        let mut w = TlvWriter::new(&mut buf);
        w.constructed(0, |env| {
            env.put_str(0, PROTOCOL_VERSION);
            env.put_u64(1, 1);
            env.constructed(1, |b| {
                put_ecgi(b, 0, ecgi(1));
                // Extra field the alternative does not define.
                b.put_u64(9, 1);
            });
        });
        assert!(matches!(
            decode(&buf),
            Err(XranCodecError::Tlv(TlvError::TrailingBytes(_)))
        ));
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let pdu = XranPdu::new(XranBody::CellConfigRequest { ecgi: ecgi(1) });
        let wire = encode(&pdu);
        assert!(decode(&wire[..wire.len() - 3]).is_err());
    }
}
