//! Secondary indexes and the combined R-NIB view
//!
//! Inbound reports are keyed by over-the-air identities (PCI for the
//! cell, CRNTI for the UE) rather than the primary keys the store
//! uses. The indexes resolve those, and `Rnib` combines store and
//! indexes into the view the dispatch engine and control surface
//! operate on.
//!
//! Index and store updates are two sequential operations, not one
//! transaction. Writers update the index first: a reader that can see
//! a Link in the store can then always resolve its identities.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use ranctl_common::{Crnti, Ecgi, Imsi, LinkId};
use ranctl_xran::XranPdu;

use crate::link::{Link, LinkType};
use crate::store::RnibStore;

#[derive(Debug, Default)]
struct CellIndexInner {
    pci_to_ecgi: HashMap<ranctl_common::Pci, Ecgi>,
    ecgi_to_pci: HashMap<Ecgi, ranctl_common::Pci>,
    senders: HashMap<Ecgi, mpsc::Sender<XranPdu>>,
}

/// Bidirectional PCI to ECGI map plus the live outbound session
/// handle per cell.
///
/// The session handle is registered when a session is accepted and
/// dropped on disconnect; the PCI mapping is set when the cell's
/// configuration report arrives.
#[derive(Debug, Default)]
pub struct CellIndex {
    inner: RwLock<CellIndexInner>,
}

impl CellIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::RwLockWriteGuard<'_, CellIndexInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn peek(&self) -> std::sync::RwLockReadGuard<'_, CellIndexInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the outbound sender for a cell's live session.
    pub fn register_session(&self, ecgi: Ecgi, sender: mpsc::Sender<XranPdu>) {
        self.lock().senders.insert(ecgi, sender);
    }

    /// Records the PCI a cell reported, replacing any previous
    /// mapping in both directions.
    pub fn set_pci(&self, ecgi: Ecgi, pci: ranctl_common::Pci) {
        let mut inner = self.lock();
        if let Some(old) = inner.ecgi_to_pci.insert(ecgi, pci) {
            inner.pci_to_ecgi.remove(&old);
        }
        inner.pci_to_ecgi.insert(pci, ecgi);
    }

    /// Resolves a report's physical cell identity to the protocol
    /// identity.
    pub fn ecgi_for_pci(&self, pci: ranctl_common::Pci) -> Option<Ecgi> {
        self.peek().pci_to_ecgi.get(&pci).copied()
    }

    /// The PCI a cell last reported.
    pub fn pci_for(&self, ecgi: Ecgi) -> Option<ranctl_common::Pci> {
        self.peek().ecgi_to_pci.get(&ecgi).copied()
    }

    /// The outbound sender for a cell, if its session is live.
    pub fn sender_for(&self, ecgi: Ecgi) -> Option<mpsc::Sender<XranPdu>> {
        self.peek().senders.get(&ecgi).cloned()
    }

    /// Drops a cell's session handle and PCI mapping.
    pub fn unregister(&self, ecgi: Ecgi) {
        let mut inner = self.lock();
        inner.senders.remove(&ecgi);
        if let Some(pci) = inner.ecgi_to_pci.remove(&ecgi) {
            inner.pci_to_ecgi.remove(&pci);
        }
    }
}

#[derive(Debug, Default)]
struct UeIndexInner {
    by_radio: HashMap<(Ecgi, Crnti), Imsi>,
    by_imsi: HashMap<Imsi, (Ecgi, Crnti)>,
}

/// Bidirectional (serving cell, CRNTI) to IMSI map.
///
/// Rebuilt whenever a UE's serving cell or CRNTI changes: binding an
/// IMSI drops its previous radio identity first, so the map never
/// holds two radio identities for one UE.
#[derive(Debug, Default)]
pub struct UeIndex {
    inner: RwLock<UeIndexInner>,
}

impl UeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::RwLockWriteGuard<'_, UeIndexInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn peek(&self) -> std::sync::RwLockReadGuard<'_, UeIndexInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds a UE's current radio identity, replacing any previous
    /// one.
    pub fn bind(&self, ecgi: Ecgi, crnti: Crnti, imsi: Imsi) {
        let mut inner = self.lock();
        if let Some(old) = inner.by_imsi.insert(imsi, (ecgi, crnti)) {
            inner.by_radio.remove(&old);
        }
        inner.by_radio.insert((ecgi, crnti), imsi);
    }

    /// Resolves a radio identity to the UE's stable identity.
    pub fn resolve(&self, ecgi: Ecgi, crnti: Crnti) -> Option<Imsi> {
        self.peek().by_radio.get(&(ecgi, crnti)).copied()
    }

    /// The radio identity currently bound for a UE.
    pub fn radio_identity(&self, imsi: Imsi) -> Option<(Ecgi, Crnti)> {
        self.peek().by_imsi.get(&imsi).copied()
    }

    /// Rebinds a UE's CRNTI within the same cell. Returns the IMSI if
    /// the old identity resolved, `None` otherwise.
    pub fn rebind_crnti(&self, ecgi: Ecgi, old: Crnti, new: Crnti) -> Option<Imsi> {
        let mut inner = self.lock();
        let imsi = inner.by_radio.remove(&(ecgi, old))?;
        inner.by_radio.insert((ecgi, new), imsi);
        inner.by_imsi.insert(imsi, (ecgi, new));
        Some(imsi)
    }

    /// Drops a UE's radio identity.
    pub fn unbind(&self, imsi: Imsi) {
        let mut inner = self.lock();
        if let Some(radio) = inner.by_imsi.remove(&imsi) {
            inner.by_radio.remove(&radio);
        }
    }

    /// Drops every radio identity bound at the given cell (used when
    /// the cell is removed).
    pub fn unbind_cell(&self, ecgi: Ecgi) {
        let mut inner = self.lock();
        inner.by_radio.retain(|(e, _), _| *e != ecgi);
        inner.by_imsi.retain(|_, (e, _)| *e != ecgi);
    }
}

/// The combined R-NIB view: store plus indexes.
///
/// Owns nothing exclusively; every component holds `Arc` handles so
/// dispatch paths, timers, and the control surface share one view.
#[derive(Debug, Clone)]
pub struct Rnib {
    store: Arc<RnibStore>,
    cells: Arc<CellIndex>,
    ues: Arc<UeIndex>,
}

impl Rnib {
    /// Builds the view over the given store and indexes.
    pub fn new(store: Arc<RnibStore>, cells: Arc<CellIndex>, ues: Arc<UeIndex>) -> Self {
        Self { store, cells, ues }
    }

    /// The underlying store.
    pub fn store(&self) -> &RnibStore {
        &self.store
    }

    /// The cell index.
    pub fn cell_index(&self) -> &CellIndex {
        &self.cells
    }

    /// The UE index.
    pub fn ue_index(&self) -> &UeIndex {
        &self.ues
    }

    /// Creates or overwrites the serving-primary Link for a UE and
    /// refreshes its radio identity.
    ///
    /// Any Link previously marked serving-primary for this UE is
    /// demoted to non-serving first, so at most one serving-primary
    /// Link per UE is observable. Returns the ids of the demoted
    /// Links; the caller must arm their expiry timers, the same as
    /// for any other non-serving Link.
    pub fn put_primary_link(&self, ecgi: Ecgi, imsi: Imsi, crnti: Crnti) -> Vec<LinkId> {
        self.ues.bind(ecgi, crnti, imsi);

        let mut demoted = Vec::new();
        for old in self.store.links_for_ue(imsi) {
            if old.link_type == LinkType::ServingPrimary && old.id.ecgi != ecgi {
                self.store
                    .update_link(old.id, |l| l.link_type = LinkType::NonServing);
                demoted.push(old.id);
            }
        }

        let id = LinkId::new(ecgi, imsi);
        if !self
            .store
            .update_link(id, |l| l.link_type = LinkType::ServingPrimary)
        {
            self.store.put_link(Link::new(id, LinkType::ServingPrimary));
        }

        debug_assert!(
            self.store
                .links_for_ue(imsi)
                .iter()
                .filter(|l| l.link_type == LinkType::ServingPrimary)
                .count()
                <= 1
        );

        demoted
    }

    /// Creates a non-serving Link for an already-resolved (cell, UE)
    /// pair unless a Link for the pair exists; an existing Link keeps
    /// its type. Returns true when a new Link was created.
    pub fn put_non_serving_link(&self, id: LinkId) -> bool {
        if self.store.link(id).is_some() {
            return false;
        }
        self.store.put_link(Link::new(id, LinkType::NonServing));
        true
    }

    /// The ECGI of the UE's serving-primary Link, if one exists.
    pub fn primary_cell_for(&self, imsi: Imsi) -> Option<Ecgi> {
        self.store
            .links_for_ue(imsi)
            .into_iter()
            .find(|l| l.link_type == LinkType::ServingPrimary)
            .map(|l| l.id.ecgi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ue::Ue;
    use ranctl_common::{Pci, Plmn};

    fn ecgi(eci: u32) -> Ecgi {
        Ecgi::new(Plmn::new(315, 10, false), eci)
    }

    fn rnib() -> Rnib {
        Rnib::new(
            Arc::new(RnibStore::new()),
            Arc::new(CellIndex::new()),
            Arc::new(UeIndex::new()),
        )
    }

    #[test]
    fn test_cell_index_bidirectional() {
        let index = CellIndex::new();
        index.set_pci(ecgi(1), Pci(101));
        assert_eq!(index.ecgi_for_pci(Pci(101)), Some(ecgi(1)));
        assert_eq!(index.pci_for(ecgi(1)), Some(Pci(101)));

        // A cell re-reporting a new PCI drops the old mapping.
        index.set_pci(ecgi(1), Pci(102));
        assert_eq!(index.ecgi_for_pci(Pci(101)), None);
        assert_eq!(index.ecgi_for_pci(Pci(102)), Some(ecgi(1)));
    }

    #[test]
    fn test_cell_index_unregister() {
        let index = CellIndex::new();
        let (tx, _rx) = mpsc::channel(1);
        index.register_session(ecgi(1), tx);
        index.set_pci(ecgi(1), Pci(101));
        assert!(index.sender_for(ecgi(1)).is_some());

        index.unregister(ecgi(1));
        assert!(index.sender_for(ecgi(1)).is_none());
        assert_eq!(index.ecgi_for_pci(Pci(101)), None);
    }

    #[test]
    fn test_ue_index_bind_replaces_radio_identity() {
        let index = UeIndex::new();
        index.bind(ecgi(1), Crnti(7), Imsi(1001));
        assert_eq!(index.resolve(ecgi(1), Crnti(7)), Some(Imsi(1001)));

        // Handover: new cell, new crnti; the old one no longer resolves.
        index.bind(ecgi(2), Crnti(9), Imsi(1001));
        assert_eq!(index.resolve(ecgi(1), Crnti(7)), None);
        assert_eq!(index.resolve(ecgi(2), Crnti(9)), Some(Imsi(1001)));
        assert_eq!(index.radio_identity(Imsi(1001)), Some((ecgi(2), Crnti(9))));
    }

    #[test]
    fn test_ue_index_rebind_crnti() {
        let index = UeIndex::new();
        index.bind(ecgi(1), Crnti(7), Imsi(1001));
        assert_eq!(
            index.rebind_crnti(ecgi(1), Crnti(7), Crnti(8)),
            Some(Imsi(1001))
        );
        assert_eq!(index.resolve(ecgi(1), Crnti(7)), None);
        assert_eq!(index.resolve(ecgi(1), Crnti(8)), Some(Imsi(1001)));
        // Rebinding an unknown identity is a no-op.
        assert_eq!(index.rebind_crnti(ecgi(1), Crnti(99), Crnti(100)), None);
    }

    #[test]
    fn test_primary_link_is_unique() {
        let rnib = rnib();
        rnib.store().put_ue(Ue::new(Imsi(1001), Crnti(7)));

        assert!(rnib.put_primary_link(ecgi(1), Imsi(1001), Crnti(7)).is_empty());
        assert_eq!(rnib.primary_cell_for(Imsi(1001)), Some(ecgi(1)));

        // Attach at a second cell: the first primary is demoted and
        // reported back for expiry.
        let demoted = rnib.put_primary_link(ecgi(2), Imsi(1001), Crnti(9));
        assert_eq!(demoted, vec![LinkId::new(ecgi(1), Imsi(1001))]);
        assert_eq!(rnib.primary_cell_for(Imsi(1001)), Some(ecgi(2)));
        let primaries = rnib
            .store()
            .links_for_ue(Imsi(1001))
            .into_iter()
            .filter(|l| l.link_type == LinkType::ServingPrimary)
            .count();
        assert_eq!(primaries, 1);
        assert_eq!(
            rnib.store()
                .link(LinkId::new(ecgi(1), Imsi(1001)))
                .unwrap()
                .link_type,
            LinkType::NonServing
        );
    }

    #[test]
    fn test_non_serving_link_keeps_existing_type() {
        let rnib = rnib();
        let neighbor = LinkId::new(ecgi(2), Imsi(1001));
        assert!(rnib.put_non_serving_link(neighbor));
        // Already present: no-op.
        assert!(!rnib.put_non_serving_link(neighbor));

        // A report about the serving cell must not demote its link.
        rnib.put_primary_link(ecgi(1), Imsi(1001), Crnti(7));
        let serving = LinkId::new(ecgi(1), Imsi(1001));
        assert!(!rnib.put_non_serving_link(serving));
        assert_eq!(
            rnib.store().link(serving).unwrap().link_type,
            LinkType::ServingPrimary
        );
    }
}
