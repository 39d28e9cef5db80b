//! Proof to pnr link resolution
//!
//! Two tiers:
//! 1. Primary: pnrs whose `proof_ids` list contains the proof id.
//! 2. Fallback: the single pnr named by the proof's `pnr_id`, used only when
//!    the back-links could not be read on some pnrs (some accounts have no
//!    back-links at all). That pnr must itself lack readable back-links.
//!
//! Linked pnrs are then split by settlement system, since money is settled
//! per system and not per document.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::{Pnr, Proof};

/// How a proof's pnrs were found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    /// Through pnr `proof_ids` back-links
    BackLinks,
    /// Through the proof's own `pnr_id`
    ProofPnrId,
    /// No pnr could be linked
    Unlinked,
}

/// A pnr viewed with its default system applied
#[derive(Debug, Clone, Copy)]
pub struct LinkedPnr<'a> {
    pub pnr: &'a Pnr,
    pub system: &'a str,
}

impl<'a> LinkedPnr<'a> {
    fn new(pnr: &'a Pnr) -> Self {
        Self {
            pnr,
            system: pnr.system_or_default(),
        }
    }
}

/// Pnrs linked to a proof
#[derive(Debug, Clone)]
pub struct Links<'a> {
    pub source: LinkSource,
    pub pnrs: Vec<LinkedPnr<'a>>,
}

/// One (proof, system) reconciliation unit
#[derive(Debug, Clone)]
pub struct SystemGroup<'a> {
    pub system: &'a str,
    pub pnrs: Vec<&'a Pnr>,
}

/// Find the pnrs a proof bills for
///
/// A pnr repeated by overlapping pages is linked once.
pub fn resolve_links<'a>(proof: &Proof, pnrs: &'a [Pnr]) -> Links<'a> {
    let mut unreadable = 0usize;
    let mut seen = HashSet::new();
    let mut linked = Vec::new();
    for pnr in pnrs {
        if !seen.insert(pnr.id.as_str()) {
            continue;
        }
        match pnr.links_to(&proof.id) {
            Some(true) => linked.push(LinkedPnr::new(pnr)),
            Some(false) => {}
            None => unreadable += 1,
        }
    }

    if !linked.is_empty() {
        return Links {
            source: LinkSource::BackLinks,
            pnrs: linked,
        };
    }

    if unreadable == 0 {
        debug!("Proof {} is not back-linked by any pnr", proof.id);
        return Links {
            source: LinkSource::Unlinked,
            pnrs: Vec::new(),
        };
    }

    warn!(
        "No pnr back-links proof {} ({} pnrs without readable proof_ids), falling back to pnr_id",
        proof.id, unreadable
    );

    // A pnr whose readable back-links leave the proof out is never taken
    let fallback = proof.pnr_id.as_deref().and_then(|pnr_id| {
        pnrs.iter()
            .find(|pnr| pnr.id == pnr_id && pnr.links_to(&proof.id).is_none())
    });

    match fallback {
        Some(pnr) => Links {
            source: LinkSource::ProofPnrId,
            pnrs: vec![LinkedPnr::new(pnr)],
        },
        None => {
            debug!("Proof {} has no resolvable pnr", proof.id);
            Links {
                source: LinkSource::Unlinked,
                pnrs: Vec::new(),
            }
        }
    }
}

/// Split linked pnrs by system, keeping first-seen system order
pub fn group_by_system<'a>(linked: &[LinkedPnr<'a>]) -> Vec<SystemGroup<'a>> {
    let mut groups: Vec<SystemGroup<'a>> = Vec::new();
    for link in linked {
        match groups.iter_mut().find(|g| g.system == link.system) {
            Some(group) => group.pnrs.push(link.pnr),
            None => groups.push(SystemGroup {
                system: link.system,
                pnrs: vec![link.pnr],
            }),
        }
    }
    groups
}
