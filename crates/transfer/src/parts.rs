use std::sync::RwLock;

use crate::TransferError;
use crate::types::{CompletedPart, Part, PartStatus};

/// Status, attempt count and completion token of every part in a session.
///
/// Each slot is only written by the transferor that currently owns that
/// part number; the lock is held for bookkeeping only, never across I/O.
pub struct PartLedger {
    parts: RwLock<Vec<Part>>,
}

impl PartLedger {
    /// Creates `total_parts` pending parts numbered from 1.
    pub fn new(total_parts: u32) -> Self {
        Self {
            parts: RwLock::new((1..=total_parts).map(Part::new).collect()),
        }
    }

    /// Marks a part in-flight and returns its 1-based attempt number.
    pub fn begin_attempt(&self, part_number: u32) -> Result<u32, TransferError> {
        let mut parts = self.parts.write().unwrap();
        let part = slot_mut(&mut parts, part_number)?;
        part.status = PartStatus::InFlight;
        part.attempts += 1;
        Ok(part.attempts)
    }

    /// Records a completion token.
    pub fn complete(&self, part_number: u32, token: String) -> Result<(), TransferError> {
        let mut parts = self.parts.write().unwrap();
        let part = slot_mut(&mut parts, part_number)?;
        part.status = PartStatus::Complete;
        part.token = Some(token);
        Ok(())
    }

    /// Marks a part as permanently failed.
    pub fn fail(&self, part_number: u32) -> Result<(), TransferError> {
        let mut parts = self.parts.write().unwrap();
        slot_mut(&mut parts, part_number)?.status = PartStatus::Failed;
        Ok(())
    }

    /// Returns a copy of one part.
    pub fn get(&self, part_number: u32) -> Option<Part> {
        let parts = self.parts.read().unwrap();
        index(part_number).and_then(|i| parts.get(i).cloned())
    }

    /// Number of parts currently in `status`.
    pub fn count(&self, status: PartStatus) -> usize {
        let parts = self.parts.read().unwrap();
        parts.iter().filter(|p| p.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.parts.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once every part is complete.
    pub fn is_complete(&self) -> bool {
        let parts = self.parts.read().unwrap();
        parts.iter().all(|p| p.status == PartStatus::Complete)
    }

    /// Completed parts sorted ascending by part number.
    ///
    /// Fails with the missing part numbers unless every part is complete.
    pub fn completed_parts(&self) -> Result<Vec<CompletedPart>, TransferError> {
        let parts = self.parts.read().unwrap();
        let missing: Vec<u32> = parts
            .iter()
            .filter(|p| p.status != PartStatus::Complete || p.token.is_none())
            .map(|p| p.number)
            .collect();
        if !missing.is_empty() {
            return Err(TransferError::IncompleteParts(missing));
        }

        let mut completed: Vec<CompletedPart> = parts
            .iter()
            .filter_map(|p| {
                p.token.as_ref().map(|t| CompletedPart {
                    part_number: p.number,
                    token: t.clone(),
                })
            })
            .collect();
        completed.sort_by_key(|p| p.part_number);
        Ok(completed)
    }
}

fn index(part_number: u32) -> Option<usize> {
    part_number.checked_sub(1).map(|i| i as usize)
}

fn slot_mut(parts: &mut [Part], part_number: u32) -> Result<&mut Part, TransferError> {
    index(part_number)
        .and_then(|i| parts.get_mut(i))
        .ok_or(TransferError::UnknownPart(part_number))
}
