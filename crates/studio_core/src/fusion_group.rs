//! Partition of moveable objects into rigidly fused groups.
//!
//! A single table keyed by `GroupId` owns every member list; each object
//! stores only its group id. Group mutation is always a whole-group
//! reassignment, so no object can observe a half-updated membership view,
//! and the symmetry invariant (A in group(B) iff B in group(A)) holds by
//! construction.

use std::collections::HashMap;

use crate::object::ObjectId;

/// Identifier of one fused group. Never reused within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u32);

/// The group partition. Only this table mutates membership.
#[derive(Debug, Default)]
pub struct FusionGroupTable {
    /// Group of each object, indexed by `ObjectId`.
    group_of: Vec<GroupId>,
    members: HashMap<GroupId, Vec<ObjectId>>,
    next_id: u32,
}

impl FusionGroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a newly created object in its own singleton group. Objects
    /// must be registered in id order.
    pub fn insert_singleton(&mut self, object: ObjectId) -> GroupId {
        debug_assert_eq!(object.index(), self.group_of.len());
        let id = self.fresh_id();
        self.group_of.push(id);
        self.members.insert(id, vec![object]);
        id
    }

    pub fn group_of(&self, object: ObjectId) -> GroupId {
        self.group_of[object.index()]
    }

    pub fn members(&self, group: GroupId) -> &[ObjectId] {
        self.members.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Member list of the group the given object belongs to.
    pub fn members_of(&self, object: ObjectId) -> &[ObjectId] {
        self.members(self.group_of(object))
    }

    pub fn same_group(&self, a: ObjectId, b: ObjectId) -> bool {
        self.group_of(a) == self.group_of(b)
    }

    pub fn group_count(&self) -> usize {
        self.members.len()
    }

    /// Union of two groups. Every member of the absorbed group is
    /// reassigned in one pass; O(|A| + |B|).
    pub fn merge(&mut self, a: GroupId, b: GroupId) -> GroupId {
        if a == b {
            return a;
        }
        let absorbed = self.members.remove(&b).unwrap_or_default();
        for &object in &absorbed {
            self.group_of[object.index()] = a;
        }
        self.members
            .entry(a)
            .or_default()
            .extend(absorbed);
        self.debug_assert_consistent();
        a
    }

    /// Dissolve a group: every member becomes its own fresh singleton.
    /// Returns the former member list for the caller's link-graph rebuild.
    pub fn demote_to_singletons(&mut self, group: GroupId) -> Vec<ObjectId> {
        let former = self.members.remove(&group).unwrap_or_default();
        for &object in &former {
            let id = self.fresh_id();
            self.group_of[object.index()] = id;
            self.members.insert(id, vec![object]);
        }
        former
    }

    /// Collapse a set of singleton objects into one fresh group. Used when
    /// the link graph still connects them after a split.
    pub fn adopt_component(&mut self, component: &[ObjectId]) -> GroupId {
        let id = self.fresh_id();
        for &object in component {
            let old = self.group_of[object.index()];
            self.members.remove(&old);
            self.group_of[object.index()] = id;
        }
        self.members.insert(id, component.to_vec());
        self.debug_assert_consistent();
        id
    }

    /// Full consistency scan, used by tests and debug asserts: every object
    /// maps to a group whose member list contains it, and every member list
    /// maps back.
    pub fn is_consistent(&self) -> bool {
        for (index, &group) in self.group_of.iter().enumerate() {
            let object = ObjectId(index as u32);
            if !self.members(group).contains(&object) {
                return false;
            }
        }
        for (&group, members) in &self.members {
            for &object in members {
                if self.group_of[object.index()] != group {
                    return false;
                }
            }
        }
        true
    }

    /// A group whose members disagree about membership is a defect, not an
    /// expected runtime condition.
    pub fn debug_assert_consistent(&self) {
        debug_assert!(self.is_consistent(), "fusion group table inconsistent");
    }
}
