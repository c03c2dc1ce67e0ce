//! Link entity: the per-(cell, UE) relationship and its telemetry

use ranctl_common::LinkId;
use ranctl_xran::{Bearer, RrmConfig};

/// Role of a Link in the UE's connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// The UE's anchor cell. At most one per UE.
    ServingPrimary,
    /// A carrier-aggregation or dual-connectivity add-on cell
    ServingSecondary,
    /// A neighbor relation kept for measurement bookkeeping only,
    /// subject to expiry when reports stop refreshing it
    NonServing,
}

/// Display tag for a link type.
pub fn link_type_tag(link_type: LinkType) -> &'static str {
    match link_type {
        LinkType::ServingPrimary => "serving-primary",
        LinkType::ServingSecondary => "serving-secondary",
        LinkType::NonServing => "non-serving",
    }
}

/// Radio quality as last reported for a (cell, UE) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkQuality {
    /// Reference signal received power (dBm)
    pub rsrp: Option<i16>,
    /// Reference signal received quality (dB)
    pub rsrq: Option<i16>,
    /// CQI histogram (bucket counts, index = CQI value)
    pub cqi_hist: Vec<u32>,
    /// Downlink modulation and coding scheme
    pub mcs_dl: Option<u8>,
    /// Uplink modulation and coding scheme
    pub mcs_ul: Option<u8>,
}

/// Physical resource block usage on a Link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrbUsage {
    /// Downlink usage percentage
    pub dl: u8,
    /// Uplink usage percentage
    pub ul: u8,
}

/// PDCP throughput and delay on a Link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdcpStats {
    /// Downlink throughput (kbps)
    pub throughput_dl: u32,
    /// Uplink throughput (kbps)
    pub throughput_ul: u32,
    /// Downlink packet delay (0.1 ms units)
    pub pkt_delay_dl: u32,
}

/// The relationship between one Cell and one UE.
///
/// Created explicitly as serving-primary on attach, or implicitly as
/// non-serving when a measurement report references a pair with no
/// existing Link. A serving-primary Link is retyped non-serving on
/// handover away from its cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// (cell, UE) pair (primary key)
    pub id: LinkId,
    /// Role of this Link
    pub link_type: LinkType,
    /// Last reported radio quality
    pub quality: LinkQuality,
    /// Last reported PRB usage
    pub prb_usage: PrbUsage,
    /// Last reported PDCP stats
    pub pdcp: PdcpStats,
    /// Admitted bearers on this Link
    pub bearers: Vec<Bearer>,
    /// Downlink traffic split percentage for dual connectivity
    pub traffic_split_pct: u8,
    /// Per-link RRM parameter overrides
    pub rrm: RrmConfig,
}

impl Link {
    /// Creates an empty Link with the given role.
    pub fn new(id: LinkId, link_type: LinkType) -> Self {
        Self {
            id,
            link_type,
            quality: LinkQuality::default(),
            prb_usage: PrbUsage::default(),
            pdcp: PdcpStats::default(),
            bearers: Vec::new(),
            traffic_split_pct: 0,
            rrm: RrmConfig::default(),
        }
    }

    /// Removes the bearers with the given E-RAB ids.
    pub fn release_bearers(&mut self, erab_ids: &[u8]) {
        self.bearers.retain(|b| !erab_ids.contains(&b.erab_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranctl_common::{Ecgi, Imsi, Plmn};

    fn link_id() -> LinkId {
        LinkId::new(Ecgi::new(Plmn::new(315, 10, false), 1), Imsi(1001))
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(link_type_tag(LinkType::ServingPrimary), "serving-primary");
        assert_eq!(
            link_type_tag(LinkType::ServingSecondary),
            "serving-secondary"
        );
        assert_eq!(link_type_tag(LinkType::NonServing), "non-serving");
    }

    #[test]
    fn test_release_bearers() {
        let mut link = Link::new(link_id(), LinkType::ServingPrimary);
        link.bearers = vec![
            Bearer { erab_id: 5, qci: 9 },
            Bearer { erab_id: 6, qci: 1 },
            Bearer { erab_id: 7, qci: 9 },
        ];
        link.release_bearers(&[5, 7]);
        assert_eq!(link.bearers, vec![Bearer { erab_id: 6, qci: 1 }]);
    }
}
