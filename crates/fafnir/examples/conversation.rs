//! Bare event-bus demo — two handlers having a conversation.
//!
//! Shows the bus without any compositions: registration order, a listener
//! deregistering itself mid-dispatch, and teardown on destruction.
//!
//! Run with: `cargo run -p fafnir --example conversation`

use std::cell::RefCell;
use std::rc::Rc;

use fafnir::prelude::*;

struct Host {
    bus: EventBus<Host>,
}

impl BusHost for Host {
    fn bus(&self) -> &EventBus<Self> {
        &self.bus
    }
    fn bus_mut(&mut self) -> &mut EventBus<Self> {
        &mut self.bus
    }
}

struct Greeting {
    round: u32,
}

fn main() {
    env_logger::init();

    let mut host = Host { bus: EventBus::new() };
    let speaker = host.bus.create_handler();
    let polite = host.bus.create_handler();
    let rude = host.bus.create_handler();

    host.bus
        .listen::<Greeting>(speaker, "Hello", polite, |_, ev| {
            println!("polite: hello to you too (round {})", ev.round);
        });

    // Leaves the conversation from inside its own callback; the removal is
    // observable on the next trigger.
    host.bus.listen::<Greeting>(speaker, "Hello", rude, move |host, ev| {
        println!("rude: whatever (round {})", ev.round);
        host.bus_mut().stop_listening(rude, "Hello", speaker);
    });

    host.trigger(speaker, "Hello", &Greeting { round: 1 });
    host.trigger(speaker, "Hello", &Greeting { round: 2 });

    let counter = Rc::new(RefCell::new(0u32));
    let seen = Rc::clone(&counter);
    let transient = host.bus.create_handler();
    host.bus
        .listen::<Greeting>(speaker, "Hello", transient, move |_, _| {
            *seen.borrow_mut() += 1;
        });
    host.trigger(speaker, "Hello", &Greeting { round: 3 });
    host.bus.destroy_handler(transient);
    host.trigger(speaker, "Hello", &Greeting { round: 4 });
    println!("transient heard {} greeting(s)", counter.borrow());
}
