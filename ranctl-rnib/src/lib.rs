//! ranctl-rnib - the radio network information base
//!
//! The R-NIB is the controller's live model of the network: Cells,
//! UEs, the Links between them, and (as a stub) Slices. This crate
//! holds the entity records, the concurrent store that is the single
//! authoritative repository for them, and the secondary indexes that
//! resolve the over-the-air identities inbound reports are keyed by:
//!
//! - `cell` / `ue` / `link` / `slice`: plain entity records
//! - `store`: `RnibStore`, one independently-locked map per kind
//! - `index`: `CellIndex` (PCI to ECGI plus the live session handle),
//!   `UeIndex` ((ECGI, CRNTI) to IMSI), and `Rnib`, the combined view
//!   the dispatch engine and control surface operate on

pub mod cell;
pub mod index;
pub mod link;
pub mod slice;
pub mod store;
pub mod ue;

pub use cell::{Cell, CellStats};
pub use index::{CellIndex, Rnib, UeIndex};
pub use link::{link_type_tag, Link, LinkQuality, LinkType, PdcpStats, PrbUsage};
pub use slice::{KpiTargets, Slice, SliceId};
pub use store::{RnibStore, StoreError};
pub use ue::{ue_state_tag, Ue, UeState};
