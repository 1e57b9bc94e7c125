//! # Component — Typed Units of Behavior
//!
//! A component is owned by exactly one composition and does its work by
//! listening for events: registration happens in [`Component::initialize`],
//! and every relationship is torn down through the bus when the component is
//! destroyed.
//!
//! ## Lifecycle
//!
//! ```text
//! factory create (properties applied)      — construction, no wiring yet
//!   └─ initialize(ctx)                     — register listeners; siblings
//!      └─ start(ctx)                          from the same batch exist and
//!         └─ ... event callbacks ...          are safe to look up
//!            └─ deinitialize(ctx)          — teardown, before the drop
//! ```
//!
//! During `initialize` every component of the same batch has already been
//! constructed, so sibling lookups succeed; sibling *state* is only
//! guaranteed initialized once one's own `initialize` has been entered,
//! never during construction.
//!
//! Lifecycle hooks and event callbacks receive a [`ComponentContext`]: the
//! owner composition's id, the component's own handler, and the `Space`,
//! which stands in for the owner/space back-pointers (the ids are non-owning
//! by construction).

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::composition::CompositionId;
use crate::event::{BusHost, Callback, Dispatch, HandlerId};
use crate::meta::TypeRegistry;
use crate::object::deserialize_by_type;
use crate::space::Space;

/// A unit of behavior attached to a composition.
///
/// All hooks default to doing nothing; most components implement
/// `initialize` to register listeners and little else.
pub trait Component: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Called once after the whole batch this component was added in has
    /// been constructed. Register event listeners here.
    fn initialize(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called once after the batch has initialized.
    fn start(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called as the component is being destroyed, before its event
    /// relationships are torn down.
    fn deinitialize(&mut self, _ctx: &mut ComponentContext<'_>) {}
}

/// The view a component gets of the world during lifecycle hooks and event
/// callbacks.
pub struct ComponentContext<'a> {
    pub(crate) space: &'a mut Space,
    pub(crate) owner: CompositionId,
    pub(crate) handler: HandlerId,
}

impl<'a> ComponentContext<'a> {
    /// The composition owning this component.
    pub fn owner(&self) -> CompositionId {
        self.owner
    }

    /// This component's own event handler.
    pub fn handler(&self) -> HandlerId {
        self.handler
    }

    /// The space's top-level handler (speaker of `LogicUpdate` and friends).
    pub fn space_handler(&self) -> HandlerId {
        self.space.handler()
    }

    /// The owning composition's handler.
    pub fn owner_handler(&self) -> Option<HandlerId> {
        self.space.composition_handler(self.owner)
    }

    pub fn space(&mut self) -> &mut Space {
        &mut *self.space
    }

    /// Look up a sibling component on the owning composition. Always
    /// null-checkable: absent dependencies yield `None`, never a panic.
    pub fn sibling<T: Component>(&self) -> Option<&T> {
        self.space.get_component::<T>(self.owner)
    }

    /// Register a typed member-function-style listener for `event` on
    /// `speaker`, subscribing this component's handler.
    ///
    /// At delivery the component is checked out of its slot, the callback
    /// runs with a fresh context, and the component is restored — so the
    /// composition keeps sole ownership and a dead component simply misses
    /// deliveries.
    pub fn listen<C: Component, E: Any>(
        &mut self,
        speaker: HandlerId,
        event: &str,
        f: fn(&mut C, &mut ComponentContext<'_>, &E),
    ) {
        let owner = self.owner;
        let handler = self.handler;
        let name = event.to_string();
        let callback: Callback<Space> =
            Rc::new(RefCell::new(move |space: &mut Space, payload: &dyn crate::event::Event| {
                let Some(ev) = crate::event::Event::as_any(payload).downcast_ref::<E>() else {
                    log::error!(
                        "event payload type mismatch: listener for `{name}` expected `{}`",
                        std::any::type_name::<E>()
                    );
                    debug_assert!(false, "event payload type mismatch for `{name}`");
                    return;
                };
                let Some(mut boxed) = space.checkout_component(owner, TypeId::of::<C>()) else {
                    // Component already removed (or mid-callback elsewhere);
                    // its goodbye just hasn't been reconciled yet.
                    log::warn!("dropping delivery of `{name}`: component is gone");
                    return;
                };
                if let Some(component) = boxed.as_any_mut().downcast_mut::<C>() {
                    let mut ctx = ComponentContext { space: &mut *space, owner, handler };
                    f(component, &mut ctx, ev);
                } else {
                    log::error!(
                        "component slot type mismatch delivering `{name}` to `{}`",
                        std::any::type_name::<C>()
                    );
                    debug_assert!(false, "component slot type mismatch for `{name}`");
                }
                space.restore_component(owner, TypeId::of::<C>(), handler, boxed);
            }));
        self.space
            .bus_mut()
            .register_callback(speaker, event, handler, callback);
    }

    /// Stop this component from listening to `speaker` for `event`.
    pub fn stop_listening(&mut self, event: &str, speaker: HandlerId) {
        self.space.bus_mut().stop_listening(self.handler, event, speaker);
    }

    /// Dispatch an event with this component as the speaker.
    pub fn send(&mut self, event: &str, payload: &dyn crate::event::Event) {
        let handler = self.handler;
        self.space.trigger(handler, event, payload);
    }
}

/// Declares which sibling component types a component expects, as an
/// AND-of-ORs: every inner group must be satisfied by at least one member.
///
/// Attached to a type's metadata; validated by
/// [`Space::check_dependencies`](crate::space::Space::check_dependencies),
/// never enforced at construction time.
pub struct ComponentDependencies {
    requires: Vec<Vec<TypeId>>,
}

impl ComponentDependencies {
    pub fn new() -> Self {
        Self { requires: Vec::new() }
    }

    /// Require a sibling of exactly type `T`.
    pub fn require<T: Component>(mut self) -> Self {
        self.requires.push(vec![TypeId::of::<T>()]);
        self
    }

    /// Require at least one sibling out of `options`.
    pub fn require_any(mut self, options: Vec<TypeId>) -> Self {
        self.requires.push(options);
        self
    }

    pub(crate) fn requires(&self) -> &[Vec<TypeId>] {
        &self.requires
    }
}

impl Default for ComponentDependencies {
    fn default() -> Self {
        Self::new()
    }
}

type CreateFn = Box<dyn Fn(Option<&Value>, &TypeRegistry) -> Box<dyn Component>>;

struct ComponentFactory {
    name: &'static str,
    create: CreateFn,
}

/// Maps component type tokens and names to construction functions.
///
/// The factory contract: default-construct, then apply the serialized
/// properties through reflection. The composition calls `initialize` later,
/// once the whole batch exists.
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentFactory>,
    by_name: HashMap<&'static str, TypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a component type for construction by token or by name.
    pub fn register<T: Component + Default>(&mut self, name: &'static str) {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            log::warn!("component `{name}` registered twice; replacing factory");
        }
        let factory = ComponentFactory {
            name,
            create: Box::new(move |properties, meta| {
                let mut component = T::default();
                if let Some(properties) = properties {
                    deserialize_by_type(meta, type_id, component.as_any_mut(), properties);
                }
                Box::new(component)
            }),
        };
        self.by_type.insert(type_id, factory);
        self.by_name.insert(name, type_id);
    }

    pub(crate) fn create(
        &self,
        type_id: TypeId,
        properties: Option<&Value>,
        meta: &TypeRegistry,
    ) -> Option<Box<dyn Component>> {
        let factory = self.by_type.get(&type_id)?;
        Some((factory.create)(properties, meta))
    }

    /// Token for a registered component name (deserialization key).
    pub fn type_id_of(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Display/serialization name of a registered component token.
    pub fn name_of(&self, type_id: TypeId) -> Option<&'static str> {
        self.by_type.get(&type_id).map(|f| f.name)
    }

    /// All registered component names (editor "add component" listing).
    pub fn component_names(&self) -> Vec<&'static str> {
        self.by_name.keys().copied().collect()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
