//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The neighbor table (component C4): a generational arena plus secondary
//! lookup trees, so callers can hold a stable [`NeighborId`] across RIB
//! mutations without re-walking a map.

use std::collections::{BTreeMap, HashMap};

use generational_arena::Index;
use rina_utils::name::IpcpName;

use crate::error::Error;
use crate::neighbor::Neighbor;

pub type ObjectId = u32;

#[derive(Clone, Debug)]
pub enum ObjectKey<T> {
    Id(ObjectId),
    Value(T),
}

pub type NeighborId = ObjectId;
pub type NeighborIndex = Index;
pub type NeighborKey = ObjectKey<IpcpName>;

#[derive(Debug)]
pub struct Arena<T>(generational_arena::Arena<T>);

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena(Default::default())
    }
}

impl<T> std::ops::Index<Index> for Arena<T> {
    type Output = T;

    fn index(&self, index: Index) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> std::ops::IndexMut<Index> for Arena<T> {
    fn index_mut(&mut self, index: Index) -> &mut Self::Output {
        &mut self.0[index]
    }
}

/// The RIB's neighbor table. The RIB exclusively owns all neighbors.
#[derive(Debug, Default)]
pub struct Neighbors {
    arena: Arena<Neighbor>,
    id_tree: HashMap<NeighborId, NeighborIndex>,
    name_tree: BTreeMap<IpcpName, NeighborIndex>,
    next_id: NeighborId,
}

impl Neighbors {
    /// Creates a neighbor on first mention of `name`.
    pub fn insert(&mut self, name: IpcpName) -> (NeighborIndex, &mut Neighbor) {
        self.next_id += 1;
        let id = self.next_id;
        let idx = self
            .arena
            .0
            .insert_with(|_| Neighbor::new(id, name.clone()));
        self.id_tree.insert(id, idx);
        self.name_tree.insert(name, idx);
        (idx, &mut self.arena[idx])
    }

    /// Destroys a neighbor. Called when its last flow closes and no
    /// reconnect is pending.
    pub fn delete(&mut self, idx: NeighborIndex) -> Option<Neighbor> {
        let neigh = self.arena.0.remove(idx)?;
        self.id_tree.remove(&neigh.id);
        self.name_tree.remove(&neigh.name);
        Some(neigh)
    }

    pub fn get_by_name(&self, name: &IpcpName) -> Option<&Neighbor> {
        self.name_tree.get(name).map(|idx| &self.arena[*idx])
    }

    pub fn get_by_name_mut(&mut self, name: &IpcpName) -> Option<&mut Neighbor> {
        let idx = *self.name_tree.get(name)?;
        Some(&mut self.arena[idx])
    }

    pub fn get_by_id(&self, id: NeighborId) -> Result<&Neighbor, Error> {
        self.id_tree
            .get(&id)
            .map(|idx| &self.arena[*idx])
            .ok_or(Error::NeighborNotFound(id))
    }

    pub fn get_by_id_mut(&mut self, id: NeighborId) -> Result<&mut Neighbor, Error> {
        let idx = *self.id_tree.get(&id).ok_or(Error::NeighborNotFound(id))?;
        Ok(&mut self.arena[idx])
    }

    pub fn index_of(&self, name: &IpcpName) -> Option<NeighborIndex> {
        self.name_tree.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.id_tree.values().map(|idx| &self.arena[*idx])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Neighbor> {
        self.arena.0.iter_mut().map(|(_, n)| n)
    }

    pub fn len(&self) -> usize {
        self.id_tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_tree.is_empty()
    }

    /// Finds the neighbor whose current address is `addr`, used by the SPF
    /// engine to translate next-hop addresses into port-ids.
    pub fn find_by_address(&self, addr: rina_utils::Addr) -> Option<&Neighbor> {
        self.iter().find(|n| n.address == Some(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut neighbors = Neighbors::default();
        let name = IpcpName::new("b", "1", "", "");
        let (idx, _) = neighbors.insert(name.clone());
        assert!(neighbors.get_by_name(&name).is_some());
        let id = neighbors.get_by_name(&name).unwrap().id;
        assert!(neighbors.get_by_id(id).is_ok());
        neighbors.delete(idx);
        assert!(neighbors.get_by_name(&name).is_none());
    }
}
