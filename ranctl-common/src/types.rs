//! Radio network identifiers: PLMN, ECGI, PCI, CRNTI, IMSI

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Public Land Mobile Network identifier.
///
/// A PLMN uniquely identifies a mobile network and consists of:
/// - MCC (Mobile Country Code): 3 decimal digits
/// - MNC (Mobile Network Code): 2 or 3 decimal digits
///
/// The `long_mnc` field indicates whether the MNC uses 3 digits (true)
/// or 2 digits (false).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (3 digits, range 0-999)
    pub mcc: u16,
    /// Mobile Network Code (2-3 digits, range 0-999)
    pub mnc: u16,
    /// True if MNC is 3 digits, false if 2 digits
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a new PLMN with the given MCC and MNC.
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Encodes the PLMN to 3GPP format (3 bytes, TS 24.008 digit nibbles).
    pub fn encode(&self) -> [u8; 3] {
        let mcc3 = (self.mcc % 10) as u8;
        let mcc2 = ((self.mcc % 100) / 10) as u8;
        let mcc1 = ((self.mcc % 1000) / 100) as u8;

        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            (
                ((self.mnc % 1000) / 100) as u8,
                ((self.mnc % 100) / 10) as u8,
                (self.mnc % 10) as u8,
            )
        } else {
            (((self.mnc % 100) / 10) as u8, (self.mnc % 10) as u8, 0x0F)
        };

        [(mcc2 << 4) | mcc1, (mnc3 << 4) | mcc3, (mnc2 << 4) | mnc1]
    }

    /// Decodes a PLMN from 3GPP format (3 bytes).
    pub fn decode(bytes: [u8; 3]) -> Self {
        let mcc1 = (bytes[0] & 0x0F) as u16;
        let mcc2 = ((bytes[0] >> 4) & 0x0F) as u16;
        let mcc3 = (bytes[1] & 0x0F) as u16;
        let mcc = 100 * mcc1 + 10 * mcc2 + mcc3;

        let mnc3 = (bytes[1] >> 4) & 0x0F;
        let mnc1 = (bytes[2] & 0x0F) as u16;
        let mnc2 = ((bytes[2] >> 4) & 0x0F) as u16;

        let (mnc, long_mnc) = if mnc3 != 0x0F {
            (10 * (10 * mnc1 + mnc2) + mnc3 as u16, true)
        } else {
            (10 * mnc1 + mnc2, false)
        };

        Self { mcc, mnc, long_mnc }
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "Plmn({:03}-{:03})", self.mcc, self.mnc)
        } else {
            write!(f, "Plmn({:03}-{:02})", self.mcc, self.mnc)
        }
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}{:02}", self.mcc, self.mnc)
        }
    }
}

impl Default for Plmn {
    fn default() -> Self {
        Self::new(0, 0, false)
    }
}

/// E-UTRAN Cell Global Identifier.
///
/// The ECGI is the primary key of a cell: the serving PLMN plus the
/// 28-bit E-UTRAN Cell Identifier. Its canonical wire form is 7 bytes
/// (3-byte PLMN followed by the ECI in 4 big-endian bytes), and its
/// canonical string form is the 14-character hex encoding of those
/// bytes, which is what operator-facing lookups use.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ecgi {
    /// Serving PLMN
    pub plmn: Plmn,
    /// E-UTRAN Cell Identifier (28-bit)
    pub eci: u32,
}

impl Ecgi {
    /// Mask for the 28-bit ECI.
    pub const ECI_MASK: u32 = 0x0FFF_FFFF;

    /// Creates a new ECGI. The ECI is masked to 28 bits.
    pub const fn new(plmn: Plmn, eci: u32) -> Self {
        Self {
            plmn,
            eci: eci & Self::ECI_MASK,
        }
    }

    /// Encodes the ECGI to its 7-byte wire form.
    pub fn encode(&self) -> [u8; 7] {
        let p = self.plmn.encode();
        let e = self.eci.to_be_bytes();
        [p[0], p[1], p[2], e[0], e[1], e[2], e[3]]
    }

    /// Decodes an ECGI from its 7-byte wire form.
    pub fn decode(bytes: [u8; 7]) -> Self {
        let plmn = Plmn::decode([bytes[0], bytes[1], bytes[2]]);
        let eci = u32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]) & Self::ECI_MASK;
        Self { plmn, eci }
    }

    /// Returns the canonical 14-character hex form of this ECGI.
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }
}

impl FromStr for Ecgi {
    type Err = Error;

    /// Parses an ECGI from its 14-character hex form.
    ///
    /// Malformed input (wrong length, non-hex characters) is reported
    /// as a typed identifier error rather than a panic, so store
    /// lookups keyed by operator-supplied strings can surface it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s)
            .map_err(|e| Error::Identifier(format!("bad ECGI hex string {s:?}: {e}")))?;
        let bytes: [u8; 7] = raw
            .try_into()
            .map_err(|_| Error::Identifier(format!("bad ECGI length in {s:?}: want 7 bytes")))?;
        Ok(Self::decode(bytes))
    }
}

impl fmt::Debug for Ecgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ecgi({}:{:07x})", self.plmn, self.eci)
    }
}

impl fmt::Display for Ecgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Physical Cell Identity - the over-the-air identity a cell reports
/// in its configuration and that measurement reports are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl fmt::Display for Pci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pci-{}", self.0)
    }
}

/// Cell Radio Network Temporary Identifier.
///
/// The per-cell radio identity of a UE. Volatile: re-assigned across
/// handovers and reconfigurations, so it is only ever meaningful in
/// combination with the serving cell's ECGI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crnti(pub u16);

impl fmt::Display for Crnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// International Mobile Subscriber Identity - the stable core-network
/// identity of a UE, used as its primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Imsi(pub u64);

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imsi-{}", self.0)
    }
}

/// Primary key of a Link: the (cell, UE) pair it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId {
    /// Cell side of the pair
    pub ecgi: Ecgi,
    /// UE side of the pair
    pub imsi: Imsi,
}

impl LinkId {
    /// Creates a new link id.
    pub const fn new(ecgi: Ecgi, imsi: Imsi) -> Self {
        Self { ecgi, imsi }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.ecgi, self.imsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plmn_roundtrip_2digit() {
        let plmn = Plmn::new(310, 41, false);
        assert_eq!(Plmn::decode(plmn.encode()), plmn);
    }

    #[test]
    fn test_plmn_roundtrip_3digit() {
        let plmn = Plmn::new(234, 150, true);
        assert_eq!(Plmn::decode(plmn.encode()), plmn);
    }

    #[test]
    fn test_plmn_display() {
        assert_eq!(Plmn::new(310, 41, false).to_string(), "31041");
        assert_eq!(Plmn::new(310, 410, true).to_string(), "310410");
    }

    #[test]
    fn test_ecgi_masks_eci() {
        let ecgi = Ecgi::new(Plmn::new(1, 1, false), 0xFFFF_FFFF);
        assert_eq!(ecgi.eci, Ecgi::ECI_MASK);
    }

    #[test]
    fn test_ecgi_roundtrip() {
        let ecgi = Ecgi::new(Plmn::new(315, 10, false), 0x0ABCDEF);
        assert_eq!(Ecgi::decode(ecgi.encode()), ecgi);
    }

    #[test]
    fn test_ecgi_hex_roundtrip() {
        let ecgi = Ecgi::new(Plmn::new(315, 10, false), 0x0000001);
        let hex = ecgi.to_hex();
        assert_eq!(hex.len(), 14);
        assert_eq!(hex.parse::<Ecgi>().unwrap(), ecgi);
    }

    #[test]
    fn test_ecgi_bad_hex_is_typed_error() {
        assert!(matches!(
            "zzzz".parse::<Ecgi>(),
            Err(Error::Identifier(_))
        ));
        // Valid hex, wrong length.
        assert!(matches!(
            "0011".parse::<Ecgi>(),
            Err(Error::Identifier(_))
        ));
    }

    #[test]
    fn test_crnti_display() {
        assert_eq!(Crnti(0x1c).to_string(), "001c");
    }

    #[test]
    fn test_imsi_display() {
        assert_eq!(Imsi(1001).to_string(), "imsi-1001");
    }

    #[test]
    fn test_link_id_equality() {
        let ecgi = Ecgi::new(Plmn::new(1, 1, false), 7);
        assert_eq!(LinkId::new(ecgi, Imsi(5)), LinkId::new(ecgi, Imsi(5)));
        assert_ne!(LinkId::new(ecgi, Imsi(5)), LinkId::new(ecgi, Imsi(6)));
    }
}
