//! Two-generation buffering for R2D.
//!
//! `current` collects the values built from the tables at the depth being
//! read; `child` holds what the previous (one level deeper) depth produced
//! and is consumed while reading. Entries are keyed by the parent row
//! `(table, rid)` and then by member name.

use super::error::ReconstructionError;
use crate::kvdocument::{KvArray, KvDocument, KvValue};
use crate::table_ref::TableRef;
use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::sync::Arc;

/// Values collected for one member of a parent row
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Collected {
    /// Array elements keyed by seq; positions come from storage, so gaps
    /// are only detected when the array is built
    Elements(BTreeMap<usize, KvValue>),
    Document(KvDocument),
}

#[derive(Debug)]
struct Entry {
    did: i32,
    members: HashMap<Arc<str>, Collected>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ParentKey {
    table_ref: TableRef,
    rid: i32,
}

/// An orphaned buffer entry left when a generation is dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Orphan {
    pub did: i32,
    pub table_ref: TableRef,
    pub rid: i32,
    pub member: String,
}

#[derive(Debug, Default)]
pub(crate) struct Generation {
    entries: HashMap<ParentKey, Entry>,
}

impl Generation {
    fn entry_mut(&mut self, parent_table: &TableRef, parent_rid: i32, did: i32) -> &mut Entry {
        self.entries
            .entry(ParentKey {
                table_ref: parent_table.clone(),
                rid: parent_rid,
            })
            .or_insert_with(|| Entry {
                did,
                members: HashMap::new(),
            })
    }

    /// Record `value` as element `seq` of array member `member` of the
    /// parent row `(parent_table, parent_rid)`
    pub fn attach_element(
        &mut self,
        parent_table: &TableRef,
        parent_rid: i32,
        did: i32,
        member: &str,
        seq: usize,
        value: KvValue,
    ) -> Result<(), ReconstructionError> {
        let entry = self.entry_mut(parent_table, parent_rid, did);
        let collected = entry
            .members
            .entry(Arc::from(member))
            .or_insert_with(|| Collected::Elements(BTreeMap::new()));
        match collected {
            Collected::Elements(elements) if !elements.contains_key(&seq) => {
                elements.insert(seq, value);
                Ok(())
            }
            _ => Err(duplicate(parent_table, parent_rid, member)),
        }
    }

    /// Record `doc` as the sub-document member `member` of the parent row
    pub fn attach_document(
        &mut self,
        parent_table: &TableRef,
        parent_rid: i32,
        did: i32,
        member: &str,
        doc: KvDocument,
    ) -> Result<(), ReconstructionError> {
        let entry = self.entry_mut(parent_table, parent_rid, did);
        if entry.members.contains_key(member) {
            return Err(duplicate(parent_table, parent_rid, member));
        }
        entry.members.insert(Arc::from(member), Collected::Document(doc));
        Ok(())
    }

    /// Remove and return what was collected for the member of a row
    pub fn take(&mut self, table_ref: &TableRef, rid: i32, member: &str) -> Option<Collected> {
        let key = ParentKey {
            table_ref: table_ref.clone(),
            rid,
        };
        let entry = self.entries.get_mut(&key)?;
        let collected = entry.members.remove(member);
        if entry.members.is_empty() {
            self.entries.remove(&key);
        }
        collected
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Everything never taken
    pub fn into_orphans(self) -> Vec<Orphan> {
        let mut orphans: Vec<Orphan> = self
            .entries
            .into_iter()
            .flat_map(|(key, entry)| {
                let did = entry.did;
                entry.members.into_keys().map(move |member| Orphan {
                    did,
                    table_ref: key.table_ref.clone(),
                    rid: key.rid,
                    member: member.to_string(),
                })
            })
            .collect();
        orphans.sort_by(|a, b| (a.did, a.rid, &a.member).cmp(&(b.did, b.rid, &b.member)));
        orphans
    }
}

/// The `current` / `child` pair
#[derive(Debug, Default)]
pub(crate) struct GenerationBuffers {
    pub current: Generation,
    pub child: Generation,
}

impl GenerationBuffers {
    /// Step to the next depth: what was current becomes the child
    /// generation and a fresh one starts. Returns the replaced child
    /// generation, which should have been fully consumed.
    pub fn advance(&mut self) -> Generation {
        let produced = mem::take(&mut self.current);
        mem::replace(&mut self.child, produced)
    }

    /// Drop both generations, returning their leftovers
    pub fn finish(self) -> Vec<Orphan> {
        let mut orphans = self.child.into_orphans();
        orphans.extend(self.current.into_orphans());
        orphans
    }
}

fn duplicate(table_ref: &TableRef, rid: i32, member: &str) -> ReconstructionError {
    ReconstructionError::DuplicateMember {
        table: table_ref.to_string(),
        rid,
        member: member.to_string(),
    }
}

/// Turn collected array elements into an array, rejecting holes
pub(crate) fn into_array(
    elements: BTreeMap<usize, KvValue>,
    table_ref: &TableRef,
    rid: i32,
    member: &str,
) -> Result<KvArray, ReconstructionError> {
    let mut values = Vec::with_capacity(elements.len());
    for (index, (seq, value)) in elements.into_iter().enumerate() {
        if seq != index {
            return Err(ReconstructionError::ArrayHole {
                table: table_ref.to_string(),
                rid,
                member: member.to_string(),
                index,
            });
        }
        values.push(value);
    }
    Ok(KvArray::new(values))
}
