//! Operator control surface
//!
//! A thin, in-process translation of operator calls onto the store
//! and controller contracts. An HTTP layer, if any, sits on top of
//! this and owns nothing: every failure is already a structured
//! `ApiError` (code, title, detail) here.

use std::sync::Arc;

use thiserror::Error;

use ranctl_common::{Ecgi, Imsi, LinkId};
use ranctl_rnib::{Cell, Link, Slice, StoreError, Ue};
use ranctl_xran::RrmConfig;

use crate::controller::{Controller, CtrlError};
use crate::correlation::WaitOutcome;

/// A structured, operator-visible failure.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{code} {title}: {detail}")]
pub struct ApiError {
    /// Numeric status code, HTTP-shaped
    pub code: u16,
    /// Short category
    pub title: String,
    /// Human-readable specifics
    pub detail: String,
}

impl ApiError {
    fn new(code: u16, title: &str, detail: impl Into<String>) -> Self {
        Self {
            code,
            title: title.to_owned(),
            detail: detail.into(),
        }
    }

    /// 400: the request itself is malformed.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, "Bad Request", detail)
    }

    /// 404: no such entity.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, "Not Found", detail)
    }

    /// 409: conflicts with an operation already in flight.
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(409, "Conflict", detail)
    }

    /// 501: modeled but not implemented.
    pub fn not_implemented(detail: impl Into<String>) -> Self {
        Self::new(501, "Not Implemented", detail)
    }

    /// 503: the cell cannot be reached right now.
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(503, "Service Unavailable", detail)
    }

    /// 504: the cell did not reply within the bound.
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(504, "No Response", detail)
    }
}

impl From<CtrlError> for ApiError {
    fn from(e: CtrlError) -> Self {
        match &e {
            CtrlError::UnknownCell(_) | CtrlError::UnknownUe(_) | CtrlError::NoPrimaryLink(_) => {
                ApiError::not_found(e.to_string())
            }
            CtrlError::Correlation(_) => ApiError::conflict(e.to_string()),
            CtrlError::CellNotConnected(_) | CtrlError::SendFailed(_) => {
                ApiError::unavailable(e.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::BadKey(_) => ApiError::bad_request(e.to_string()),
            StoreError::NotImplemented(_) => ApiError::not_implemented(e.to_string()),
        }
    }
}

/// Kind of a generic node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Backed by a Cell
    Cell,
    /// Backed by a UE
    Ue,
}

/// A generic node: the union of Cells and UEs under synthetic ids
/// (`cell:<ecgi-hex>`, `ue:<imsi>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Synthetic node id
    pub id: String,
    /// What backs it
    pub kind: NodeKind,
}

/// The in-process control surface.
pub struct ControlApi {
    controller: Arc<Controller>,
}

impl ControlApi {
    /// Creates the surface over the shared controller.
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    /// All cells.
    pub fn cells(&self) -> Vec<Cell> {
        self.controller.rnib().store().cells()
    }

    /// One cell by the hex form of its ECGI.
    pub fn cell(&self, ecgi_hex: &str) -> Result<Cell, ApiError> {
        self.controller
            .rnib()
            .store()
            .cell_by_ecgi_hex(ecgi_hex)?
            .ok_or_else(|| ApiError::not_found(format!("no cell {ecgi_hex}")))
    }

    /// All UEs.
    pub fn ues(&self) -> Vec<Ue> {
        self.controller.rnib().store().ues()
    }

    /// One UE by IMSI.
    pub fn ue(&self, imsi: u64) -> Result<Ue, ApiError> {
        self.controller
            .rnib()
            .store()
            .ue(Imsi(imsi))
            .ok_or_else(|| ApiError::not_found(format!("no ue imsi-{imsi}")))
    }

    /// All links.
    pub fn links(&self) -> Vec<Link> {
        self.controller.rnib().store().links()
    }

    /// Links referencing one cell.
    pub fn links_for_cell(&self, ecgi_hex: &str) -> Result<Vec<Link>, ApiError> {
        let ecgi: Ecgi = ecgi_hex
            .parse()
            .map_err(|e: ranctl_common::Error| ApiError::bad_request(e.to_string()))?;
        Ok(self.controller.rnib().store().links_for_cell(ecgi))
    }

    /// Links referencing one UE.
    pub fn links_for_ue(&self, imsi: u64) -> Vec<Link> {
        self.controller.rnib().store().links_for_ue(Imsi(imsi))
    }

    /// One link by its (cell, UE) pair.
    pub fn link(&self, ecgi_hex: &str, imsi: u64) -> Result<Link, ApiError> {
        let ecgi: Ecgi = ecgi_hex
            .parse()
            .map_err(|e: ranctl_common::Error| ApiError::bad_request(e.to_string()))?;
        self.controller
            .rnib()
            .store()
            .link(LinkId::new(ecgi, Imsi(imsi)))
            .ok_or_else(|| ApiError::not_found(format!("no link ({ecgi_hex},{imsi})")))
    }

    /// The union of cells and UEs as generic nodes.
    pub fn nodes(&self) -> Vec<Node> {
        let store = self.controller.rnib().store();
        let mut nodes: Vec<Node> = store
            .cells()
            .into_iter()
            .map(|c| Node {
                id: format!("cell:{}", c.ecgi.to_hex()),
                kind: NodeKind::Cell,
            })
            .collect();
        nodes.extend(store.ues().into_iter().map(|u| Node {
            id: format!("ue:{}", u.imsi.0),
            kind: NodeKind::Ue,
        }));
        nodes
    }

    /// One node by synthetic id.
    pub fn node(&self, id: &str) -> Result<Node, ApiError> {
        if let Some(hex) = id.strip_prefix("cell:") {
            return self.cell(hex).map(|c| Node {
                id: format!("cell:{}", c.ecgi.to_hex()),
                kind: NodeKind::Cell,
            });
        }
        if let Some(imsi) = id.strip_prefix("ue:") {
            let imsi: u64 = imsi
                .parse()
                .map_err(|_| ApiError::bad_request(format!("bad imsi in node id {id:?}")))?;
            return self.ue(imsi).map(|u| Node {
                id: format!("ue:{}", u.imsi.0),
                kind: NodeKind::Ue,
            });
        }
        Err(ApiError::bad_request(format!("bad node id {id:?}")))
    }

    /// Patches a cell's RRM configuration. Returns the cell's outcome
    /// string, or a timeout error when no reply arrives in bound.
    pub async fn patch_cell_rrm(
        &self,
        ecgi_hex: &str,
        params: RrmConfig,
    ) -> Result<String, ApiError> {
        let ecgi: Ecgi = ecgi_hex
            .parse()
            .map_err(|e: ranctl_common::Error| ApiError::bad_request(e.to_string()))?;
        self.wait_to_outcome(self.controller.patch_rrm(ecgi, None, params).await?)
    }

    /// Patches one link's RRM configuration through its cell.
    pub async fn patch_link_rrm(
        &self,
        ecgi_hex: &str,
        imsi: u64,
        params: RrmConfig,
    ) -> Result<String, ApiError> {
        let ecgi: Ecgi = ecgi_hex
            .parse()
            .map_err(|e: ranctl_common::Error| ApiError::bad_request(e.to_string()))?;
        let (_, crnti) = self
            .controller
            .rnib()
            .ue_index()
            .radio_identity(Imsi(imsi))
            .filter(|(e, _)| *e == ecgi)
            .ok_or_else(|| ApiError::not_found(format!("no active link ({ecgi_hex},{imsi})")))?;
        self.wait_to_outcome(
            self.controller
                .patch_rrm(ecgi, Some(crnti), params)
                .await?,
        )
    }

    /// Orders a handover, returning the outcome string.
    pub async fn handover(&self, imsi: u64, target_hex: &str) -> Result<String, ApiError> {
        let target: Ecgi = target_hex
            .parse()
            .map_err(|e: ranctl_common::Error| ApiError::bad_request(e.to_string()))?;
        self.wait_to_outcome(self.controller.handover(Imsi(imsi), target).await?)
    }

    /// Slice creation is a stub and reports so.
    pub fn create_slice(&self, slice: Slice) -> Result<(), ApiError> {
        self.controller.rnib().store().put_slice(slice)?;
        Ok(())
    }

    /// All slices (empty while creation is unimplemented).
    pub fn slices(&self) -> Vec<Slice> {
        self.controller.rnib().store().slices()
    }

    fn wait_to_outcome(&self, outcome: WaitOutcome) -> Result<String, ApiError> {
        match outcome {
            WaitOutcome::Reply(s) => Ok(s),
            WaitOutcome::NoResponse => Err(ApiError::timeout("no reply within bound")),
            WaitOutcome::Cancelled => Err(ApiError::unavailable("operation cancelled")),
        }
    }
}
