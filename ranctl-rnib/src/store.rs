//! The concurrent R-NIB store
//!
//! One independently-locked map per entity kind. Dispatch paths,
//! timer callbacks, and operator calls all go through the same
//! methods; there is no privileged path. Cross-kind sequences (for
//! example removing a Cell and its Links) are not atomic here; the
//! controller orders them so readers only ever see resolvable state.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use ranctl_common::{Ecgi, Imsi, LinkId};

use crate::cell::Cell;
use crate::link::Link;
use crate::slice::{Slice, SliceId};
use crate::ue::Ue;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A lookup key could not be decoded
    #[error("bad lookup key: {0}")]
    BadKey(#[from] ranctl_common::Error),

    /// The operation exists in the model but has no implementation
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// The single authoritative repository of R-NIB entities.
///
/// Lookups return clones; in-place mutation goes through the
/// `update_*` methods so the lock is held only for the closure.
/// Lookups on missing keys return `None`, never panic, and no
/// ordering is guaranteed among entities of one kind.
#[derive(Debug, Default)]
pub struct RnibStore {
    cells: RwLock<HashMap<Ecgi, Cell>>,
    ues: RwLock<HashMap<Imsi, Ue>>,
    links: RwLock<HashMap<LinkId, Link>>,
    slices: RwLock<HashMap<SliceId, Slice>>,
}

impl RnibStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a Cell if none exists under its ECGI. Returns whether
    /// the insert happened.
    pub fn put_cell(&self, cell: Cell) -> bool {
        let mut cells = write(&self.cells);
        if cells.contains_key(&cell.ecgi) {
            return false;
        }
        cells.insert(cell.ecgi, cell);
        true
    }

    /// Looks up a Cell by ECGI.
    pub fn cell(&self, ecgi: Ecgi) -> Option<Cell> {
        read(&self.cells).get(&ecgi).cloned()
    }

    /// Looks up a Cell by the 14-character hex form of its ECGI, the
    /// encoding operator-facing lookups use. Malformed hex is a typed
    /// error; a missing cell is `Ok(None)`.
    pub fn cell_by_ecgi_hex(&self, hex: &str) -> Result<Option<Cell>, StoreError> {
        let ecgi: Ecgi = hex.parse()?;
        Ok(self.cell(ecgi))
    }

    /// Mutates a Cell in place. Returns whether the Cell existed.
    pub fn update_cell(&self, ecgi: Ecgi, f: impl FnOnce(&mut Cell)) -> bool {
        match write(&self.cells).get_mut(&ecgi) {
            Some(cell) => {
                f(cell);
                true
            }
            None => false,
        }
    }

    /// Removes a Cell. Does not cascade to Links; the caller removes
    /// those first.
    pub fn remove_cell(&self, ecgi: Ecgi) -> bool {
        write(&self.cells).remove(&ecgi).is_some()
    }

    /// All Cells, in no particular order.
    pub fn cells(&self) -> Vec<Cell> {
        read(&self.cells).values().cloned().collect()
    }

    /// Inserts a UE if none exists under its IMSI. Returns whether
    /// the insert happened.
    pub fn put_ue(&self, ue: Ue) -> bool {
        let mut ues = write(&self.ues);
        if ues.contains_key(&ue.imsi) {
            return false;
        }
        ues.insert(ue.imsi, ue);
        true
    }

    /// Looks up a UE by IMSI.
    pub fn ue(&self, imsi: Imsi) -> Option<Ue> {
        read(&self.ues).get(&imsi).cloned()
    }

    /// Mutates a UE in place. Returns whether the UE existed.
    pub fn update_ue(&self, imsi: Imsi, f: impl FnOnce(&mut Ue)) -> bool {
        match write(&self.ues).get_mut(&imsi) {
            Some(ue) => {
                f(ue);
                true
            }
            None => false,
        }
    }

    /// Removes a UE.
    pub fn remove_ue(&self, imsi: Imsi) -> bool {
        write(&self.ues).remove(&imsi).is_some()
    }

    /// All UEs, in no particular order.
    pub fn ues(&self) -> Vec<Ue> {
        read(&self.ues).values().cloned().collect()
    }

    /// Upserts a Link under its (cell, UE) pair.
    pub fn put_link(&self, link: Link) {
        write(&self.links).insert(link.id, link);
    }

    /// Looks up a Link by its (cell, UE) pair.
    pub fn link(&self, id: LinkId) -> Option<Link> {
        read(&self.links).get(&id).cloned()
    }

    /// Mutates a Link in place. Returns whether the Link existed.
    pub fn update_link(&self, id: LinkId, f: impl FnOnce(&mut Link)) -> bool {
        match write(&self.links).get_mut(&id) {
            Some(link) => {
                f(link);
                true
            }
            None => false,
        }
    }

    /// Removes a Link.
    pub fn remove_link(&self, id: LinkId) -> bool {
        write(&self.links).remove(&id).is_some()
    }

    /// All Links referencing the given Cell.
    pub fn links_for_cell(&self, ecgi: Ecgi) -> Vec<Link> {
        read(&self.links)
            .values()
            .filter(|l| l.id.ecgi == ecgi)
            .cloned()
            .collect()
    }

    /// All Links referencing the given UE.
    pub fn links_for_ue(&self, imsi: Imsi) -> Vec<Link> {
        read(&self.links)
            .values()
            .filter(|l| l.id.imsi == imsi)
            .cloned()
            .collect()
    }

    /// All Links, in no particular order.
    pub fn links(&self) -> Vec<Link> {
        read(&self.links).values().cloned().collect()
    }

    /// Slice creation is a stub: refused with a structured error.
    pub fn put_slice(&self, _slice: Slice) -> Result<(), StoreError> {
        Err(StoreError::NotImplemented("slice creation"))
    }

    /// All Slices (always empty while creation is unimplemented).
    pub fn slices(&self) -> Vec<Slice> {
        read(&self.slices).values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkType;
    use crate::slice::KpiTargets;
    use ranctl_common::Plmn;

    fn ecgi(eci: u32) -> Ecgi {
        Ecgi::new(Plmn::new(315, 10, false), eci)
    }

    #[test]
    fn test_put_cell_is_insert_if_absent() {
        let store = RnibStore::new();
        assert!(store.put_cell(Cell::new(ecgi(1))));
        assert!(!store.put_cell(Cell::new(ecgi(1))));
        assert_eq!(store.cells().len(), 1);
    }

    #[test]
    fn test_missing_lookups_return_none() {
        let store = RnibStore::new();
        assert!(store.cell(ecgi(9)).is_none());
        assert!(store.ue(Imsi(9)).is_none());
        assert!(store.link(LinkId::new(ecgi(9), Imsi(9))).is_none());
        assert!(!store.remove_cell(ecgi(9)));
    }

    #[test]
    fn test_cell_by_ecgi_hex() {
        let store = RnibStore::new();
        let id = ecgi(7);
        store.put_cell(Cell::new(id));
        let found = store.cell_by_ecgi_hex(&id.to_hex()).unwrap();
        assert_eq!(found.map(|c| c.ecgi), Some(id));
        // Missing cell with a well-formed key.
        assert!(store
            .cell_by_ecgi_hex(&ecgi(8).to_hex())
            .unwrap()
            .is_none());
        // Malformed key is a typed error.
        assert!(matches!(
            store.cell_by_ecgi_hex("nothex"),
            Err(StoreError::BadKey(_))
        ));
    }

    #[test]
    fn test_update_cell_in_place() {
        let store = RnibStore::new();
        store.put_cell(Cell::new(ecgi(1)));
        assert!(store.update_cell(ecgi(1), |c| c.version = Some("3".into())));
        assert_eq!(store.cell(ecgi(1)).unwrap().version.as_deref(), Some("3"));
        assert!(!store.update_cell(ecgi(2), |_| {}));
    }

    #[test]
    fn test_put_link_is_upsert() {
        let store = RnibStore::new();
        let id = LinkId::new(ecgi(1), Imsi(1001));
        store.put_link(Link::new(id, LinkType::NonServing));
        store.put_link(Link::new(id, LinkType::ServingPrimary));
        assert_eq!(store.link(id).unwrap().link_type, LinkType::ServingPrimary);
        assert_eq!(store.links().len(), 1);
    }

    #[test]
    fn test_links_by_secondary_key() {
        let store = RnibStore::new();
        store.put_link(Link::new(
            LinkId::new(ecgi(1), Imsi(1)),
            LinkType::ServingPrimary,
        ));
        store.put_link(Link::new(
            LinkId::new(ecgi(1), Imsi(2)),
            LinkType::ServingPrimary,
        ));
        store.put_link(Link::new(
            LinkId::new(ecgi(2), Imsi(1)),
            LinkType::NonServing,
        ));
        assert_eq!(store.links_for_cell(ecgi(1)).len(), 2);
        assert_eq!(store.links_for_ue(Imsi(1)).len(), 2);
    }

    #[test]
    fn test_cell_removal_does_not_cascade() {
        let store = RnibStore::new();
        store.put_cell(Cell::new(ecgi(1)));
        let id = LinkId::new(ecgi(1), Imsi(1));
        store.put_link(Link::new(id, LinkType::ServingPrimary));
        assert!(store.remove_cell(ecgi(1)));
        // The Link is still there; cascading is the controller's job.
        assert!(store.link(id).is_some());
    }

    #[test]
    fn test_slice_creation_refused() {
        let store = RnibStore::new();
        let slice = Slice {
            id: SliceId(1),
            links: Vec::new(),
            desired: KpiTargets::default(),
            delivered: KpiTargets::default(),
        };
        assert!(matches!(
            store.put_slice(slice),
            Err(StoreError::NotImplemented(_))
        ));
        assert!(store.slices().is_empty());
    }
}
