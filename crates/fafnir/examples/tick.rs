//! Engine tick demo — a space, a patrol component, a fixed-step loop.
//!
//! Builds an engine, registers a gameplay component, loads a small scene
//! document, and runs sixty frames, printing where the patroller ended up.
//!
//! Run with: `cargo run -p fafnir --example tick`

use std::any::Any;

use fafnir::prelude::*;
use glam::Vec3;
use serde_json::json;

/// Walks its owner's Transform back and forth along the x axis.
#[derive(Default)]
struct Patrol {
    speed: f32,
    heading: f32,
}

impl Component for Patrol {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) {
        if self.heading == 0.0 {
            self.heading = 1.0;
        }
        let speaker = ctx.space_handler();
        ctx.listen::<Patrol, LogicUpdate>(speaker, LOGIC_UPDATE, |patrol, ctx, ev| {
            let step = patrol.speed * patrol.heading * ev.dt as f32;
            let owner = ctx.owner();
            if let Some(transform) = ctx.space().get_component_mut::<Transform>(owner) {
                transform.translation += Vec3::new(step, 0.0, 0.0);
                if transform.translation.x.abs() > 5.0 {
                    patrol.heading = -patrol.heading;
                }
            }
        });
    }
}

fn main() {
    env_logger::init();

    let mut engine = Engine::new();
    engine.register_component::<Patrol>("Patrol", |info| {
        info.field("speed", |p: &Patrol| p.speed, |p, v| p.speed = v)
            .serializable();
        info.with_attribute(ComponentDependencies::new().require::<Transform>());
    });

    let space = engine.add_space("level");
    space.load(&json!({
        "Components": {},
        "Compositions": [
            {
                "Name": "guard",
                "Components": {
                    "Transform": { "translation": [0.0, 0.0, 0.0] },
                    "Patrol": { "speed": 2.0 }
                },
                "Compositions": []
            }
        ]
    }));

    for _ in 0..60 {
        engine.update_with(1.0 / 60.0);
    }

    let space = engine.space("level").unwrap();
    let guard = space.find_first_composition(space.root(), "guard").unwrap();
    let transform = space.get_component::<Transform>(guard).unwrap();
    println!("guard after 1s: {:?}", transform.translation);
}
