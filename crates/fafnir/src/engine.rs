//! # Engine — The Orchestrator
//!
//! Owns the type and component registries, the loaded [`Space`]s, and the
//! frame clock. The host loop calls [`Engine::update`] once per frame; that
//! is the engine's entire external surface — each space fans the frame out
//! to its components as `LogicUpdate`.
//!
//! Registries are built before the first space exists and are read-only
//! afterwards; [`Engine::register_component`] refuses late registration
//! instead of mutating a table the spaces already share.

use std::rc::Rc;

use crate::component::{Component, ComponentRegistry};
use crate::meta::{TypeInfo, TypeRegistry};
use crate::space::Space;
use crate::time::Time;
use crate::transform::register_core_types;

/// Dispatched on each space handler once per frame.
pub const LOGIC_UPDATE: &str = "LogicUpdate";

/// Dispatched on each space handler immediately before `LogicUpdate`.
pub const PRE_LOGIC_UPDATE: &str = "PreLogicUpdate";

/// Dispatched after `LogicUpdate`, right before the deletion pass applies
/// queued removals.
pub const DELETION_UPDATE: &str = "DeletionUpdate";

/// Per-frame payload.
pub struct LogicUpdate {
    pub dt: f64,
}

pub struct Engine {
    meta: Rc<TypeRegistry>,
    components: Rc<ComponentRegistry>,
    spaces: Vec<Space>,
    time: Time,
    running: bool,
}

impl Engine {
    /// Build an engine with the core component types registered.
    pub fn new() -> Self {
        let mut meta = TypeRegistry::new();
        let mut components = ComponentRegistry::new();
        register_core_types(&mut meta, &mut components);
        Self {
            meta: Rc::new(meta),
            components: Rc::new(components),
            spaces: Vec::new(),
            time: Time::new(),
            running: true,
        }
    }

    pub fn meta(&self) -> &TypeRegistry {
        &self.meta
    }

    pub fn component_registry(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    /// Register a game component type: its factory plus reflected metadata,
    /// declared by `describe` on the fresh [`TypeInfo`].
    ///
    /// Must happen before the first space is added; afterwards the
    /// registries are shared read-only and registration is refused.
    pub fn register_component<T: Component + Default>(
        &mut self,
        name: &'static str,
        describe: impl FnOnce(&mut TypeInfo),
    ) -> bool {
        if !self.spaces.is_empty() {
            log::error!("component `{name}` registered after a space exists; registries are read-only at runtime");
            debug_assert!(false, "late component registration for `{name}`");
            return false;
        }
        let (Some(meta), Some(components)) =
            (Rc::get_mut(&mut self.meta), Rc::get_mut(&mut self.components))
        else {
            log::error!("component `{name}` registration refused: registries already shared");
            return false;
        };
        describe(meta.register::<T>(name));
        components.register::<T>(name);
        true
    }

    /// Create an empty named space.
    pub fn add_space(&mut self, name: &str) -> &mut Space {
        log::info!("adding space `{name}`");
        let space = Space::new(name, Rc::clone(&self.meta), Rc::clone(&self.components));
        self.spaces.push(space);
        self.spaces.last_mut().unwrap()
    }

    pub fn space(&self, name: &str) -> Option<&Space> {
        self.spaces.iter().find(|s| s.name() == name)
    }

    pub fn space_mut(&mut self, name: &str) -> Option<&mut Space> {
        self.spaces.iter_mut().find(|s| s.name() == name)
    }

    pub fn spaces(&self) -> impl Iterator<Item = &Space> {
        self.spaces.iter()
    }

    /// One frame: advance the clock and tick every unpaused space with the
    /// measured delta.
    pub fn update(&mut self) {
        self.time.update();
        let dt = self.time.delta_secs();
        self.update_with(dt);
    }

    /// One frame with an explicit delta (fixed-step hosts, tests).
    pub fn update_with(&mut self, dt: f64) {
        for space in &mut self.spaces {
            space.update(dt);
        }
    }

    /// Whether the host loop should keep driving `update`.
    pub fn keep_running(&self) -> bool {
        self.running
    }

    /// Ask the host loop to stop after the current frame.
    pub fn end_execution(&mut self) {
        log::info!("end of execution requested");
        self.running = false;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentContext;
    use crate::transform::Transform;
    use std::any::Any;

    #[derive(Default)]
    struct Ticker {
        ticks: u32,
    }

    impl Component for Ticker {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn initialize(&mut self, ctx: &mut ComponentContext<'_>) {
            let speaker = ctx.space_handler();
            ctx.listen::<Ticker, LogicUpdate>(speaker, LOGIC_UPDATE, |ticker, _ctx, _ev| {
                ticker.ticks += 1;
            });
        }
    }

    #[test]
    fn frame_fans_out_to_every_space() {
        let mut engine = Engine::new();
        engine.register_component::<Ticker>("Ticker", |_| {});

        for name in ["one", "two"] {
            let space = engine.add_space(name);
            let root = space.root();
            let cid = space.add_composition(root, "obj").unwrap();
            space.add_component::<Ticker>(cid, None);
        }

        engine.update_with(0.016);
        engine.update_with(0.016);

        for name in ["one", "two"] {
            let space = engine.space(name).unwrap();
            let root = space.root();
            let cid = space.find_first_composition(root, "obj").unwrap();
            assert_eq!(space.get_component::<Ticker>(cid).unwrap().ticks, 2);
        }
    }

    #[test]
    fn paused_space_is_skipped_by_the_frame() {
        let mut engine = Engine::new();
        engine.register_component::<Ticker>("Ticker", |_| {});
        let space = engine.add_space("main");
        let root = space.root();
        let cid = space.add_composition(root, "obj").unwrap();
        space.add_component::<Ticker>(cid, None);
        space.set_paused(true);

        engine.update_with(0.016);
        let space = engine.space("main").unwrap();
        let cid = space.find_first_composition(space.root(), "obj").unwrap();
        assert_eq!(space.get_component::<Ticker>(cid).unwrap().ticks, 0);
    }

    #[test]
    fn core_types_are_preregistered() {
        let engine = Engine::new();
        assert!(engine.meta().get_by_name("Transform").is_some());
        assert!(engine.component_registry().type_id_of("Transform").is_some());
        assert_eq!(
            engine.component_registry().type_id_of("Transform"),
            Some(std::any::TypeId::of::<Transform>())
        );
    }

    #[test]
    fn measured_update_advances_the_clock() {
        let mut engine = Engine::new();
        engine.add_space("main");
        engine.update();
        assert_eq!(engine.time().frame_count(), 1);
        assert!(engine.time().delta_secs() >= 0.0);
    }

    #[test]
    fn end_execution_flips_keep_running() {
        let mut engine = Engine::new();
        assert!(engine.keep_running());
        engine.end_execution();
        assert!(!engine.keep_running());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "late component registration")]
    fn late_registration_is_refused() {
        let mut engine = Engine::new();
        engine.add_space("main");
        engine.register_component::<Ticker>("Ticker", |_| {});
    }
}
