//! # Space — A Loaded Scene and Its Composition Tree
//!
//! The `Space` owns everything in one scene: the arena of composition nodes,
//! every component, and the [`EventBus`] their conversations run on. It is
//! the single source of truth the engine ticks once per frame.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Space                                                  │
//! │                                                        │
//! │  nodes: arena of Node, keyed by CompositionId          │
//! │    Node { name, parent, children, component slots }    │
//! │                                                        │
//! │  bus: EventBus<Space>                                  │
//! │    every node and component owns a HandlerId           │
//! │                                                        │
//! │  root: the space itself, as the top-level composition  │
//! │    (speaker of LogicUpdate, CompositionAdded, ...)     │
//! │                                                        │
//! │  pending removals, applied in the deletion pass        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deferred removal
//!
//! `remove_component`/`remove_composition` never destroy anything on the
//! spot — the request is queued and applied at the end of the current
//! `update`, after the `DeletionUpdate` trigger. This is what makes it safe
//! for a component to remove itself (or its composition) from inside an
//! event callback. Structural *additions* are applied immediately.
//!
//! ## Two-phase construction
//!
//! Loading a document (or instantiating an archetype subtree) constructs
//! every component first and only then runs the `initialize` pass, so a
//! component's `initialize` can look up any sibling from the same batch.

use std::any::TypeId;
use std::rc::Rc;

use serde_json::Value;

use crate::arena::SlotAllocator;
use crate::component::{Component, ComponentContext, ComponentDependencies, ComponentRegistry};
use crate::composition::{
    COMPOSITION_ADDED, COMPOSITION_REMOVED, ComponentSlot, CompositionAdded, CompositionId,
    CompositionRemoved, Node,
};
use crate::engine::{DELETION_UPDATE, LOGIC_UPDATE, LogicUpdate, PRE_LOGIC_UPDATE};
use crate::event::{BusHost, Dispatch, EventBus, HandlerId};
use crate::meta::TypeRegistry;
use crate::object::serialize_by_type;

#[derive(Clone, Copy)]
enum Phase {
    Initialize,
    Start,
}

pub struct Space {
    name: String,
    meta: Rc<TypeRegistry>,
    components: Rc<ComponentRegistry>,
    bus: EventBus<Space>,
    allocator: SlotAllocator,
    nodes: Vec<Option<Node>>,
    root: CompositionId,
    /// The root node's handler; the space speaking as a composition.
    handler: HandlerId,
    paused: bool,
    pending_component_removals: Vec<(CompositionId, TypeId)>,
    pending_composition_removals: Vec<CompositionId>,
    #[cfg(feature = "diagnostics")]
    delivered_last_frame: u64,
}

impl BusHost for Space {
    fn bus(&self) -> &EventBus<Self> {
        &self.bus
    }
    fn bus_mut(&mut self) -> &mut EventBus<Self> {
        &mut self.bus
    }
}

impl Space {
    pub fn new(name: &str, meta: Rc<TypeRegistry>, components: Rc<ComponentRegistry>) -> Self {
        let mut bus = EventBus::new();
        let handler = bus.create_handler();
        let mut allocator = SlotAllocator::new();
        let (index, generation) = allocator.allocate();
        let root = CompositionId { index, generation };
        let mut root_node = Node::new(name.to_string(), None, handler);
        root_node.initialized = true;
        Self {
            name: name.to_string(),
            meta,
            components,
            bus,
            allocator,
            nodes: vec![Some(root_node)],
            root,
            handler,
            paused: false,
            pending_component_removals: Vec::new(),
            pending_composition_removals: Vec::new(),
            #[cfg(feature = "diagnostics")]
            delivered_last_frame: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The space's own composition: the root of the tree.
    pub fn root(&self) -> CompositionId {
        self.root
    }

    /// The space's top-level event handler.
    pub fn handler(&self) -> HandlerId {
        self.handler
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    // ── Node access ──────────────────────────────────────────────────

    pub fn is_alive(&self, cid: CompositionId) -> bool {
        self.allocator.is_alive(cid.index, cid.generation)
    }

    fn node(&self, cid: CompositionId) -> Option<&Node> {
        if !self.is_alive(cid) {
            return None;
        }
        self.nodes.get(cid.index as usize)?.as_ref()
    }

    fn node_mut(&mut self, cid: CompositionId) -> Option<&mut Node> {
        if !self.is_alive(cid) {
            return None;
        }
        self.nodes.get_mut(cid.index as usize)?.as_mut()
    }

    pub fn name_of(&self, cid: CompositionId) -> Option<&str> {
        self.node(cid).map(|n| n.name.as_str())
    }

    pub fn parent(&self, cid: CompositionId) -> Option<CompositionId> {
        self.node(cid).and_then(|n| n.parent)
    }

    pub fn children(&self, cid: CompositionId) -> Vec<CompositionId> {
        self.node(cid).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn composition_handler(&self, cid: CompositionId) -> Option<HandlerId> {
        self.node(cid).map(|n| n.handler)
    }

    pub fn is_being_deleted(&self, cid: CompositionId) -> bool {
        self.node(cid).is_some_and(|n| n.being_deleted)
    }

    pub fn should_serialize(&self, cid: CompositionId) -> bool {
        self.node(cid).is_some_and(|n| n.should_serialize)
    }

    pub fn set_should_serialize(&mut self, cid: CompositionId, serialize: bool) {
        if let Some(node) = self.node_mut(cid) {
            node.should_serialize = serialize;
        }
    }

    /// Number of live compositions, the root included.
    pub fn composition_count(&self) -> usize {
        self.allocator.alive_count()
    }

    // ── Compositions ─────────────────────────────────────────────────

    fn alloc_node(&mut self, name: &str, parent: CompositionId) -> Option<CompositionId> {
        if !self.is_alive(parent) {
            log::warn!("add_composition(`{name}`): parent {parent:?} is gone");
            return None;
        }
        let handler = self.bus.create_handler();
        let (index, generation) = self.allocator.allocate();
        let cid = CompositionId { index, generation };
        let idx = index as usize;
        if idx >= self.nodes.len() {
            self.nodes.resize_with(idx + 1, || None);
        }
        self.nodes[idx] = Some(Node::new(name.to_string(), Some(parent), handler));
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.push(cid);
        }
        Some(cid)
    }

    /// Insert an empty child composition under `parent`. Names need not be
    /// unique among siblings.
    pub fn add_composition(&mut self, parent: CompositionId, name: &str) -> Option<CompositionId> {
        let cid = self.alloc_node(name, parent)?;
        if let Some(node) = self.node_mut(cid) {
            node.initialized = true;
        }
        let handler = self.handler;
        self.trigger(handler, COMPOSITION_ADDED, &CompositionAdded { composition: cid });
        Some(cid)
    }

    /// Instantiate a serialized composition subtree (an archetype) under
    /// `parent`: construct everything, then initialize, then start.
    pub fn add_composition_from(
        &mut self,
        parent: CompositionId,
        name: &str,
        value: &Value,
    ) -> Option<CompositionId> {
        let cid = self.build_node_from(parent, name, value)?;
        self.initialize_subtree(cid);
        self.start_subtree(cid);
        Some(cid)
    }

    fn build_node_from(
        &mut self,
        parent: CompositionId,
        name: &str,
        value: &Value,
    ) -> Option<CompositionId> {
        if !value.is_object() {
            log::warn!("deserializing `{name}`: document is not a composition object");
            return None;
        }
        let cid = self.alloc_node(name, parent)?;
        self.populate_node(cid, value);
        Some(cid)
    }

    /// Apply a composition document's archetype name, components, and child
    /// subtrees onto an existing node. Construction only — no initialize.
    fn populate_node(&mut self, cid: CompositionId, value: &Value) {
        if let Some(archetype) = value.get("Archetype").and_then(|v| v.as_str()) {
            if let Some(node) = self.node_mut(cid) {
                node.archetype = Some(archetype.to_string());
            }
        }

        if let Some(components) = value.get("Components").and_then(|v| v.as_object()) {
            for (component_name, properties) in components {
                let Some(type_id) = self.components.type_id_of(component_name) else {
                    log::warn!("unknown component `{component_name}` in document; skipping");
                    continue;
                };
                self.construct_component(cid, type_id, Some(properties));
            }
        }

        if let Some(children) = value.get("Compositions").and_then(|v| v.as_array()) {
            for entry in children {
                let Some(child_name) = entry.get("Name").and_then(|v| v.as_str()) else {
                    log::warn!("child composition without a Name; skipping");
                    continue;
                };
                self.build_node_from(cid, child_name, entry);
            }
        }
    }

    pub fn find_first_composition(
        &self,
        parent: CompositionId,
        name: &str,
    ) -> Option<CompositionId> {
        self.node(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.name_of(c) == Some(name))
    }

    pub fn find_last_composition(
        &self,
        parent: CompositionId,
        name: &str,
    ) -> Option<CompositionId> {
        self.node(parent)?
            .children
            .iter()
            .copied()
            .rev()
            .find(|&c| self.name_of(c) == Some(name))
    }

    pub fn find_all_compositions(&self, parent: CompositionId, name: &str) -> Vec<CompositionId> {
        self.node(parent)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|&c| self.name_of(c) == Some(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Components ───────────────────────────────────────────────────

    /// Add a component of type `T`, constructed from `properties` and
    /// initialized immediately.
    ///
    /// Re-adding a type the composition already has keeps the original
    /// instance and re-applies `properties` to it — at most one component
    /// per type per composition, always.
    pub fn add_component<T: Component>(
        &mut self,
        cid: CompositionId,
        properties: Option<&Value>,
    ) -> Option<HandlerId> {
        self.add_component_dyn(cid, TypeId::of::<T>(), properties)
    }

    pub fn add_component_dyn(
        &mut self,
        cid: CompositionId,
        type_id: TypeId,
        properties: Option<&Value>,
    ) -> Option<HandlerId> {
        if self.node(cid).is_none() {
            log::warn!("add_component on dead composition {cid:?}");
            return None;
        }

        // Existing slot: keep the original, apply the new properties.
        let meta = Rc::clone(&self.meta);
        if let Some(slot) = self.node_mut(cid).and_then(|n| n.slot_mut(type_id)) {
            let handler = slot.handler;
            if let Some(props) = properties {
                if let Some(value) = slot.value.as_mut() {
                    crate::object::deserialize_by_type(&meta, type_id, value.as_any_mut(), props);
                }
            }
            return Some(handler);
        }

        let handler = self.construct_component(cid, type_id, properties)?;
        self.run_component_phase(cid, type_id, Phase::Initialize);
        Some(handler)
    }

    /// Construct a component into its slot without initializing it (the
    /// batch path; `initialize_subtree` runs the second phase).
    fn construct_component(
        &mut self,
        cid: CompositionId,
        type_id: TypeId,
        properties: Option<&Value>,
    ) -> Option<HandlerId> {
        let meta = Rc::clone(&self.meta);
        let components = Rc::clone(&self.components);
        let Some(boxed) = components.create(type_id, properties, &meta) else {
            log::warn!("no factory registered for component token {type_id:?}");
            return None;
        };
        let handler = self.bus.create_handler();
        let node = self.node_mut(cid)?;
        node.slots.push(ComponentSlot {
            type_id,
            handler,
            value: Some(boxed),
            initialized: false,
            started: false,
        });
        Some(handler)
    }

    /// Look up a component by type. `None` if absent — callers always
    /// null-check, even for "required" dependencies.
    pub fn get_component<T: Component>(&self, cid: CompositionId) -> Option<&T> {
        self.node(cid)?
            .slot(TypeId::of::<T>())?
            .value
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn get_component_mut<T: Component>(&mut self, cid: CompositionId) -> Option<&mut T> {
        self.node_mut(cid)?
            .slot_mut(TypeId::of::<T>())?
            .value
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn has_component<T: Component>(&self, cid: CompositionId) -> bool {
        self.has_component_dyn(cid, TypeId::of::<T>())
    }

    pub fn has_component_dyn(&self, cid: CompositionId, type_id: TypeId) -> bool {
        self.node(cid).is_some_and(|n| n.slot(type_id).is_some())
    }

    pub fn component_handler<T: Component>(&self, cid: CompositionId) -> Option<HandlerId> {
        self.node(cid)?.slot(TypeId::of::<T>()).map(|s| s.handler)
    }

    /// Type tokens of the components on `cid`, in insertion order.
    pub fn component_types(&self, cid: CompositionId) -> Vec<TypeId> {
        self.node(cid)
            .map(|n| n.slots.iter().map(|s| s.type_id).collect())
            .unwrap_or_default()
    }

    /// Take a component out of its slot for a callback. The slot stays,
    /// marked empty, so the composition retains sole ownership.
    pub(crate) fn checkout_component(
        &mut self,
        cid: CompositionId,
        type_id: TypeId,
    ) -> Option<Box<dyn Component>> {
        self.node_mut(cid)?.slot_mut(type_id)?.value.take()
    }

    /// Return a checked-out component. If its slot (or composition) was
    /// removed while it was out, finish its teardown here instead.
    pub(crate) fn restore_component(
        &mut self,
        cid: CompositionId,
        type_id: TypeId,
        handler: HandlerId,
        mut boxed: Box<dyn Component>,
    ) {
        if let Some(slot) = self.node_mut(cid).and_then(|n| n.slot_mut(type_id)) {
            if slot.value.is_none() {
                slot.value = Some(boxed);
                return;
            }
        }
        log::debug!("component destroyed while checked out; finishing teardown");
        {
            let mut ctx = ComponentContext { space: &mut *self, owner: cid, handler };
            boxed.deinitialize(&mut ctx);
        }
        if self.bus.is_alive(handler) {
            self.bus.destroy_handler(handler);
        }
    }

    fn run_component_phase(&mut self, cid: CompositionId, type_id: TypeId, phase: Phase) {
        let Some(node) = self.node_mut(cid) else {
            return;
        };
        if node.being_deleted {
            return;
        }
        let Some(slot) = node.slot_mut(type_id) else {
            return;
        };
        match phase {
            Phase::Initialize => {
                if slot.initialized {
                    return;
                }
                slot.initialized = true;
            }
            Phase::Start => {
                if slot.started {
                    return;
                }
                slot.started = true;
            }
        }
        let handler = slot.handler;
        let Some(mut boxed) = slot.value.take() else {
            return;
        };
        {
            let mut ctx = ComponentContext { space: &mut *self, owner: cid, handler };
            match phase {
                Phase::Initialize => boxed.initialize(&mut ctx),
                Phase::Start => boxed.start(&mut ctx),
            }
        }
        self.restore_component(cid, type_id, handler, boxed);
    }

    /// Initialize every uninitialized component in the subtree — components
    /// of a node first, then its children — and announce each node.
    fn initialize_subtree(&mut self, cid: CompositionId) {
        let Some(node) = self.node(cid) else {
            return;
        };
        if node.initialized {
            return;
        }
        let types: Vec<TypeId> = node.slots.iter().map(|s| s.type_id).collect();
        for type_id in types {
            self.run_component_phase(cid, type_id, Phase::Initialize);
        }
        for child in self.children(cid) {
            self.initialize_subtree(child);
        }
        if let Some(node) = self.node_mut(cid) {
            node.initialized = true;
        }
        let handler = self.handler;
        self.trigger(handler, COMPOSITION_ADDED, &CompositionAdded { composition: cid });
    }

    fn start_subtree(&mut self, cid: CompositionId) {
        let Some(node) = self.node(cid) else {
            return;
        };
        let types: Vec<TypeId> = node.slots.iter().map(|s| s.type_id).collect();
        for type_id in types {
            self.run_component_phase(cid, type_id, Phase::Start);
        }
        for child in self.children(cid) {
            self.start_subtree(child);
        }
    }

    // ── Removal (deferred) ───────────────────────────────────────────

    /// Queue a component for destruction in the deletion pass.
    pub fn remove_component<T: Component>(&mut self, cid: CompositionId) {
        self.remove_component_dyn(cid, TypeId::of::<T>());
    }

    pub fn remove_component_dyn(&mut self, cid: CompositionId, type_id: TypeId) {
        let Some(node) = self.node(cid) else {
            log::warn!("remove_component on dead composition {cid:?}");
            return;
        };
        if node.being_deleted {
            return;
        }
        if node.slot(type_id).is_none() {
            log::warn!("remove_component: {cid:?} has no such component; continuable, but odd");
            return;
        }
        self.pending_component_removals.push((cid, type_id));
    }

    /// Queue a composition (and its subtree) for destruction in the
    /// deletion pass.
    pub fn remove_composition(&mut self, cid: CompositionId) {
        if cid == self.root {
            log::warn!("refusing to remove the space's root composition");
            return;
        }
        let Some(node) = self.node(cid) else {
            log::warn!("remove_composition on dead composition {cid:?}");
            return;
        };
        // Already going away with an ancestor; don't queue it twice.
        if node.being_deleted || self.ancestor_being_deleted(cid) {
            return;
        }
        if let Some(node) = self.node_mut(cid) {
            node.being_deleted = true;
        }
        self.pending_composition_removals.push(cid);
    }

    fn ancestor_being_deleted(&self, cid: CompositionId) -> bool {
        let mut current = self.parent(cid);
        while let Some(parent) = current {
            if self.node(parent).is_some_and(|n| n.being_deleted) {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Apply queued removals. Runs until quiescent, so removals requested
    /// from `deinitialize` hooks resolve in the same pass.
    pub(crate) fn flush_removals(&mut self) {
        loop {
            if self.pending_component_removals.is_empty()
                && self.pending_composition_removals.is_empty()
            {
                break;
            }
            for (cid, type_id) in std::mem::take(&mut self.pending_component_removals) {
                self.destroy_component(cid, type_id);
            }
            for cid in std::mem::take(&mut self.pending_composition_removals) {
                if self.is_alive(cid) {
                    self.teardown_composition(cid);
                }
            }
        }
    }

    fn destroy_component(&mut self, cid: CompositionId, type_id: TypeId) {
        let Some(node) = self.node_mut(cid) else {
            return;
        };
        let Some(position) = node.slots.iter().position(|s| s.type_id == type_id) else {
            return;
        };
        let slot = node.slots.remove(position);
        match slot.value {
            Some(mut boxed) => {
                {
                    let mut ctx =
                        ComponentContext { space: &mut *self, owner: cid, handler: slot.handler };
                    boxed.deinitialize(&mut ctx);
                }
                self.bus.destroy_handler(slot.handler);
            }
            // Checked out by a callback; restore_component finishes the
            // teardown when it comes back.
            None => {}
        }
    }

    fn teardown_composition(&mut self, cid: CompositionId) {
        let name = self.name_of(cid).unwrap_or_default().to_string();
        let handler = self.handler;
        self.trigger(
            handler,
            COMPOSITION_REMOVED,
            &CompositionRemoved { composition: cid, name },
        );

        self.mark_being_deleted(cid);
        let parent = self.parent(cid);
        self.teardown_node(cid);
        if let Some(parent) = parent {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|&c| c != cid);
            }
        }
    }

    fn mark_being_deleted(&mut self, cid: CompositionId) {
        if let Some(node) = self.node_mut(cid) {
            node.being_deleted = true;
        }
        for child in self.children(cid) {
            self.mark_being_deleted(child);
        }
    }

    /// Post-order teardown: children, then components, then the node.
    fn teardown_node(&mut self, cid: CompositionId) {
        for child in self.children(cid) {
            self.teardown_node(child);
        }
        let Some(node) = self.node_mut(cid) else {
            return;
        };
        let slots = std::mem::take(&mut node.slots);
        let node_handler = node.handler;
        for slot in slots {
            match slot.value {
                Some(mut boxed) => {
                    {
                        let mut ctx = ComponentContext {
                            space: &mut *self,
                            owner: cid,
                            handler: slot.handler,
                        };
                        boxed.deinitialize(&mut ctx);
                    }
                    self.bus.destroy_handler(slot.handler);
                }
                None => {}
            }
        }
        self.bus.destroy_handler(node_handler);
        self.allocator.free(cid.index, cid.generation);
        self.nodes[cid.index as usize] = None;
    }

    // ── Frame update ─────────────────────────────────────────────────

    /// One tick: fan out the frame events, then run the deletion pass.
    pub fn update(&mut self, dt: f64) {
        if self.paused {
            return;
        }
        #[cfg(feature = "diagnostics")]
        let mark = self.bus.delivered();

        let handler = self.handler;
        let update = LogicUpdate { dt };
        self.trigger(handler, PRE_LOGIC_UPDATE, &update);
        self.trigger(handler, LOGIC_UPDATE, &update);
        self.trigger(handler, DELETION_UPDATE, &update);
        self.flush_removals();

        #[cfg(feature = "diagnostics")]
        {
            self.delivered_last_frame = self.bus.delivered() - mark;
        }
    }

    /// Callbacks invoked during the most recent `update`.
    #[cfg(feature = "diagnostics")]
    pub fn delivered_last_frame(&self) -> u64 {
        self.delivered_last_frame
    }

    // ── Dependencies ─────────────────────────────────────────────────

    /// Validate `type_id`'s declared dependencies against the components
    /// already on `cid`. `None` means satisfied; otherwise a report naming
    /// the missing alternatives. Tooling seam — construction never calls it.
    pub fn check_dependencies(&self, cid: CompositionId, type_id: TypeId) -> Option<String> {
        let deps = self.meta.get(type_id)?.attribute::<ComponentDependencies>()?;
        let missing: Vec<&Vec<TypeId>> = deps
            .requires()
            .iter()
            .filter(|group| !group.iter().any(|&t| self.has_component_dyn(cid, t)))
            .collect();
        if missing.is_empty() {
            return None;
        }

        let type_name = |t: TypeId| {
            self.meta
                .get(t)
                .map(|i| i.name())
                .unwrap_or("<unregistered>")
        };
        let mut report = format!(
            "Composition {} is attempting to add Component of type {}, but is missing the following Components:\n",
            self.name_of(cid).unwrap_or("<gone>"),
            type_name(type_id),
        );
        for group in missing {
            let alternatives: Vec<&str> = group.iter().map(|&t| type_name(t)).collect();
            report.push_str(&format!("  {}\n", alternatives.join(" or ")));
        }
        Some(report)
    }

    // ── Save / load ──────────────────────────────────────────────────

    /// Serialize the whole tree to a document.
    pub fn save(&self) -> Value {
        self.serialize_composition(self.root).unwrap_or(Value::Null)
    }

    /// Serialize one composition subtree. Children with serialization
    /// toggled off are skipped.
    pub fn serialize_composition(&self, cid: CompositionId) -> Option<Value> {
        let node = self.node(cid)?;
        let mut map = serde_json::Map::new();
        map.insert("Name".into(), Value::String(node.name.clone()));
        if let Some(archetype) = &node.archetype {
            map.insert("Archetype".into(), Value::String(archetype.clone()));
        }

        let mut components = serde_json::Map::new();
        for slot in &node.slots {
            let Some(name) = self.components.name_of(slot.type_id) else {
                log::warn!("component token {:?} has no registered name; skipping", slot.type_id);
                continue;
            };
            if let Some(value) = &slot.value {
                components.insert(
                    name.to_string(),
                    serialize_by_type(&self.meta, slot.type_id, value.as_any()),
                );
            }
        }
        map.insert("Components".into(), Value::Object(components));

        let mut children = Vec::new();
        for &child in &node.children {
            if !self.should_serialize(child) {
                continue;
            }
            if let Some(serialized) = self.serialize_composition(child) {
                children.push(serialized);
            }
        }
        map.insert("Compositions".into(), Value::Array(children));

        Some(Value::Object(map))
    }

    /// Load a document into the space: construct the root's components and
    /// child subtrees, then initialize and start the whole batch.
    pub fn load(&mut self, value: &Value) {
        if !value.is_object() {
            log::warn!("space load: document is not a composition object");
            return;
        }
        let root = self.root;
        if let Some(node) = self.node_mut(root) {
            node.initialized = false;
        }
        self.populate_node(root, value);
        self.initialize_subtree(root);
        self.start_subtree(root);
        log::info!("space `{}` loaded {} compositions", self.name, self.composition_count());
    }
}
