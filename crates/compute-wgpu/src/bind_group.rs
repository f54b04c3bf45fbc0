//! Bind group synthesis
//!
//! The arena keeps, for every distinct bind group index used by a pass, the layout
//! entries and bound resources registered at that index. Positions in the arena are
//! dense and identified by [`BindGroupId`]; the `order` table maps each position to the
//! shader-side group index, so iteration never depends on hash map ordering.
//!
//! Layouts and bind groups are only created by [`BindGroupArena::build`]. After that, a
//! resized resource is swapped in with [`BindGroupArena::patch_and_rebuild`], which
//! recreates the one affected bind group and leaves every layout untouched.

use crate::error::{ComputeError, Result};
use crate::registry::ResourceId;
use crate::resource::BindSlot;

/// Dense position of a bind group within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupId(pub(crate) u32);

impl BindGroupId {
    /// Raw index into the pass's bind group storage
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Device handle bound at a slot
#[derive(Debug, Clone)]
pub(crate) enum BoundResource {
    /// Whole-buffer binding
    Buffer(wgpu::Buffer),
    /// Texture view binding
    TextureView(wgpu::TextureView),
}

impl BoundResource {
    fn binding_resource(&self) -> wgpu::BindingResource<'_> {
        match self {
            BoundResource::Buffer(buffer) => buffer.as_entire_binding(),
            BoundResource::TextureView(view) => wgpu::BindingResource::TextureView(view),
        }
    }
}

/// One binding registered in a group
#[derive(Debug)]
struct BindingRecord<R> {
    owner: ResourceId,
    label: String,
    layout: wgpu::BindGroupLayoutEntry,
    resource: R,
}

/// Per-group binding bookkeeping plus the device objects built from it
#[derive(Debug)]
pub(crate) struct BindGroupArena<R = BoundResource> {
    /// Position to shader group index
    order: Vec<u32>,
    /// Position to bindings, sorted by binding index
    records: Vec<Vec<BindingRecord<R>>>,
    /// Position to layout; empty until built
    layouts: Vec<wgpu::BindGroupLayout>,
    /// Position to bind group; empty until built
    bind_groups: Vec<wgpu::BindGroup>,
    /// Bumped on every structural change
    generation: u64,
    /// Bind groups recreated by patches
    patches: u64,
}

impl<R> Default for BindGroupArena<R> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            records: Vec::new(),
            layouts: Vec::new(),
            bind_groups: Vec::new(),
            generation: 0,
            patches: 0,
        }
    }
}

impl<R> BindGroupArena<R> {
    /// Position of a shader group index
    pub fn position(&self, group: u32) -> Option<BindGroupId> {
        self.order.iter().position(|&g| g == group).map(|index| BindGroupId(index as u32))
    }

    /// Shader group index of every position, in position order
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    /// Number of distinct group indices
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Highest group index in use
    pub fn max_group(&self) -> Option<u32> {
        self.order.iter().copied().max()
    }

    /// Structural generation; changes whenever a binding is added or removed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of bind groups recreated by patches
    pub fn patches(&self) -> u64 {
        self.patches
    }

    /// Created layouts, one per position
    pub fn layouts(&self) -> &[wgpu::BindGroupLayout] {
        &self.layouts
    }

    /// Created bind groups, one per position
    pub fn bind_groups(&self) -> &[wgpu::BindGroup] {
        &self.bind_groups
    }

    /// Created bind groups paired with their shader group index
    pub fn bound_groups(&self) -> impl Iterator<Item = (u32, &wgpu::BindGroup)> {
        self.order.iter().copied().zip(self.bind_groups.iter())
    }

    /// Created layout of a shader group index
    pub fn layout_for_group(&self, group: u32) -> Option<&wgpu::BindGroupLayout> {
        self.position(group).and_then(|id| self.layouts.get(id.index()))
    }

    /// Label of the binding occupying a slot
    pub fn occupant(&self, slot: BindSlot) -> Option<&str> {
        let id = self.position(slot.group)?;
        self.records[id.index()]
            .iter()
            .find(|record| record.layout.binding == slot.binding)
            .map(|record| record.label.as_str())
    }

    /// Fails if a slot is already occupied
    pub fn check_free(&self, label: &str, slot: BindSlot) -> Result<()> {
        match self.occupant(slot) {
            Some(existing) => Err(ComputeError::DuplicateBinding {
                label: label.to_string(),
                slot,
                existing: existing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Slots bound by a resource
    pub fn slots_of(&self, owner: ResourceId) -> Vec<BindSlot> {
        self.order
            .iter()
            .zip(&self.records)
            .flat_map(|(&group, records)| {
                records
                    .iter()
                    .filter(move |record| record.owner == owner)
                    .map(move |record| BindSlot::new(group, record.layout.binding))
            })
            .collect()
    }

    /// Drops created layouts and bind groups, keeping the bookkeeping
    pub fn clear_built(&mut self) {
        self.layouts.clear();
        self.bind_groups.clear();
    }

    /// Registers a binding
    ///
    /// The layout entry's binding index must match `slot.binding`. Any built layouts and
    /// bind groups are dropped since the structure changed.
    pub fn insert(&mut self, owner: ResourceId, label: &str, slot: BindSlot, layout: wgpu::BindGroupLayoutEntry, resource: R) -> Result<BindGroupId> {
        debug_assert_eq!(layout.binding, slot.binding);
        self.check_free(label, slot)?;

        let id = match self.position(slot.group) {
            Some(id) => id,
            None => {
                self.order.push(slot.group);
                self.records.push(Vec::new());
                BindGroupId((self.order.len() - 1) as u32)
            }
        };

        let records = &mut self.records[id.index()];
        let at = records.partition_point(|record| record.layout.binding < slot.binding);
        records.insert(
            at,
            BindingRecord {
                owner,
                label: label.to_string(),
                layout,
                resource,
            },
        );

        self.clear_built();
        self.generation += 1;
        Ok(id)
    }

    /// Removes the binding at a slot, dropping its group if it becomes empty
    ///
    /// Returns the owner of the removed binding.
    pub fn remove_binding(&mut self, slot: BindSlot) -> Option<ResourceId> {
        let id = self.position(slot.group)?;
        let records = &mut self.records[id.index()];
        let at = records.iter().position(|record| record.layout.binding == slot.binding)?;
        let owner = records.remove(at).owner;

        if records.is_empty() {
            self.records.remove(id.index());
            self.order.remove(id.index());
        }
        self.clear_built();
        self.generation += 1;
        Some(owner)
    }

    /// Removes every binding owned by a resource
    ///
    /// Returns the number of bindings removed.
    pub fn remove_owner(&mut self, owner: ResourceId) -> usize {
        self.slots_of(owner).into_iter().filter_map(|slot| self.remove_binding(slot)).count()
    }

    /// Replaces the resource bound at a slot, returning the group position
    fn replace(&mut self, slot: BindSlot, resource: R) -> Result<BindGroupId> {
        let id = self.position(slot.group).ok_or(ComputeError::UnboundSlot { slot })?;
        let record = self.records[id.index()]
            .iter_mut()
            .find(|record| record.layout.binding == slot.binding)
            .ok_or(ComputeError::UnboundSlot { slot })?;
        record.resource = resource;
        Ok(id)
    }
}

impl BindGroupArena<BoundResource> {
    /// Creates one layout and one bind group per position
    ///
    /// Existing layouts and bind groups are dropped first.
    pub fn build(&mut self, device: &wgpu::Device, label: &str) {
        self.clear_built();

        for (&group, records) in self.order.iter().zip(&self.records) {
            let layout_entries = records.iter().map(|record| record.layout).collect::<Vec<_>>();
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label} group {group} layout")),
                entries: &layout_entries,
            });
            let bind_group = create_bind_group(device, &layout, label, group, records);

            self.layouts.push(layout);
            self.bind_groups.push(bind_group);
        }

        tracing::debug!(pass = label, groups = self.order.len(), "built bind groups");
    }

    /// Swaps the device handle bound at a slot
    ///
    /// When the group's layout exists, its bind group is recreated from the patched
    /// bindings and `true` is returned. The layout itself is kept since the binding type
    /// did not change.
    pub fn patch_and_rebuild(&mut self, device: &wgpu::Device, label: &str, slot: BindSlot, resource: BoundResource) -> Result<bool> {
        let id = self.replace(slot, resource)?;

        let Some(layout) = self.layouts.get(id.index()) else {
            return Ok(false);
        };

        let bind_group = create_bind_group(device, layout, label, slot.group, &self.records[id.index()]);
        self.bind_groups[id.index()] = bind_group;
        self.patches += 1;

        tracing::debug!(pass = label, %slot, "recreated bind group after patch");
        Ok(true)
    }
}

fn create_bind_group(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str, group: u32, records: &[BindingRecord<BoundResource>]) -> wgpu::BindGroup {
    let entries = records
        .iter()
        .map(|record| wgpu::BindGroupEntry {
            binding: record.layout.binding,
            resource: record.resource.binding_resource(),
        })
        .collect::<Vec<_>>();

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label} group {group}")),
        layout,
        entries: &entries,
    })
}
