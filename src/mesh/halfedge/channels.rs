// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slotmap::SlotMap;

use crate::prelude::*;

slotmap::new_key_type! {
    /// Channels in a [`ChannelGroup`] are stored in a slotmap; this is its
    /// key type. Names resolve to ids through the group's bidirectional
    /// registry.
    pub struct DataId;
}

/// The entity class a data channel is attached to. Parsed from the kind
/// strings of the public `set_data`/`get_data` surface; `"face"` is accepted
/// as an alias of `"edge"` and `"mesh"` holds global values of any length.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[rustfmt::skip]
pub enum EntityKind { Node, Edge, Cell, HalfEdge, Mesh }

impl EntityKind {
    pub fn parse(kind: &str) -> Result<Self, MeshError> {
        match kind {
            "node" => Ok(Self::Node),
            "edge" | "face" => Ok(Self::Edge),
            "cell" => Ok(Self::Cell),
            "halfedge" => Ok(Self::HalfEdge),
            "mesh" => Ok(Self::Mesh),
            _ => Err(MeshError::BadEntityKind(kind.to_owned())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Cell => "cell",
            Self::HalfEdge => "halfedge",
            Self::Mesh => "mesh",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A homogeneous group of named scalar channels attached to one entity
/// class. Channel storage lives in a slotmap and names resolve through a
/// bidirectional map, so renames and lookups in either direction stay cheap.
#[derive(Debug, Default, Clone)]
pub struct ChannelGroup {
    names: bimap::BiMap<String, DataId>,
    channels: SlotMap<DataId, Vec<f64>>,
}

impl ChannelGroup {
    /// Creates the channel or replaces its values if the name is taken.
    pub fn set(&mut self, name: &str, values: Vec<f64>) -> DataId {
        if let Some(&id) = self.names.get_by_left(name) {
            self.channels[id] = values;
            id
        } else {
            let id = self.channels.insert(values);
            self.names.insert(name.to_owned(), id);
            id
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.names
            .get_by_left(name)
            .map(|&id| self.channels[id].as_slice())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<f64>> {
        let id = *self.names.get_by_left(name)?;
        self.channels.get_mut(id)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<f64>> {
        let (_, id) = self.names.remove_by_left(name)?;
        self.channels.remove(id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.left_values().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// All attribute tables of a mesh, one group per entity class plus the
/// mesh-global group.
#[derive(Debug, Default, Clone)]
pub struct MeshChannels {
    pub node: ChannelGroup,
    pub edge: ChannelGroup,
    pub cell: ChannelGroup,
    pub halfedge: ChannelGroup,
    pub mesh: ChannelGroup,
}

impl MeshChannels {
    pub fn group(&self, kind: EntityKind) -> &ChannelGroup {
        match kind {
            EntityKind::Node => &self.node,
            EntityKind::Edge => &self.edge,
            EntityKind::Cell => &self.cell,
            EntityKind::HalfEdge => &self.halfedge,
            EntityKind::Mesh => &self.mesh,
        }
    }

    pub fn group_mut(&mut self, kind: EntityKind) -> &mut ChannelGroup {
        match kind {
            EntityKind::Node => &mut self.node,
            EntityKind::Edge => &mut self.edge,
            EntityKind::Cell => &mut self.cell,
            EntityKind::HalfEdge => &mut self.halfedge,
            EntityKind::Mesh => &mut self.mesh,
        }
    }
}

impl HalfEdgeMesh {
    /// Stores a named value array on the given entity kind. Arrays are shape
    /// checked against the current mesh: node/edge/half-edge channels match
    /// the respective counts, cell channels carry `cell_count() + 1` slots
    /// (the sentinel slot last), mesh channels may have any length.
    pub fn set_data(&mut self, name: &str, values: Vec<f64>, kind: &str) -> Result<()> {
        let kind = EntityKind::parse(kind)?;
        let expected = match kind {
            EntityKind::Node => self.node_count(),
            EntityKind::Edge => self.edge_count(),
            EntityKind::Cell => self.cell_count() + 1,
            EntityKind::HalfEdge => self.halfedge_count(),
            EntityKind::Mesh => values.len(),
        };
        if values.len() != expected {
            return Err(MeshError::ShapeMismatch {
                what: kind.name(),
                expected,
                got: values.len(),
            }
            .into());
        }
        self.channels.group_mut(kind).set(name, values);
        Ok(())
    }

    /// Fetches a named value array. Cell channels come back without their
    /// sentinel slot.
    pub fn get_data(&self, kind: &str, name: &str) -> Result<&[f64]> {
        let kind = EntityKind::parse(kind)?;
        let values = self
            .channels
            .group(kind)
            .get(name)
            .ok_or_else(|| anyhow!("no {} data channel named {name:?}", kind.name()))?;
        Ok(match kind {
            EntityKind::Cell => &values[..self.cell_count().min(values.len())],
            _ => values,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use glam::DVec2;

    fn triangle() -> HalfEdgeMesh {
        let positions = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, 1.0),
        ];
        HalfEdgeMesh::from_triangle_mesh(&positions, &[[0u32, 1, 2]]).unwrap()
    }

    #[test]
    fn set_get_roundtrip_and_cell_truncation() {
        let mut mesh = triangle();
        mesh.set_data("temperature", vec![1.0, 2.0, 3.0], "node").unwrap();
        assert_eq!(mesh.get_data("node", "temperature").unwrap(), &[1.0, 2.0, 3.0]);

        // cell arrays carry the sentinel slot, which get_data drops
        mesh.set_data("indicator", vec![7.0, 0.0], "cell").unwrap();
        assert_eq!(mesh.get_data("cell", "indicator").unwrap(), &[7.0]);

        // "face" is an alias of "edge"
        mesh.set_data("flux", vec![0.0, 1.0, 2.0], "face").unwrap();
        assert_eq!(mesh.get_data("edge", "flux").unwrap(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn bad_kind_and_bad_shape() {
        let mut mesh = triangle();
        let err = mesh.set_data("x", vec![0.0], "polygon").unwrap_err();
        assert_eq!(
            err.downcast_ref::<MeshError>(),
            Some(&MeshError::BadEntityKind("polygon".into()))
        );

        let err = mesh.set_data("x", vec![0.0; 2], "node").unwrap_err();
        assert_eq!(
            err.downcast_ref::<MeshError>(),
            Some(&MeshError::ShapeMismatch {
                what: "node",
                expected: 3,
                got: 2
            })
        );

        assert!(mesh.get_data("node", "missing").is_err());
    }
}
