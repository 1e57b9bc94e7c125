//! # Fafnir — Composition/Event Core of a Component Game Engine
//!
//! Everything in a fafnir scene is a *composition* — a named node in a tree —
//! and every behavior is a *component* attached to one. Components never call
//! each other directly: all cross-component interaction flows through the
//! typed publish/subscribe [`event`] bus, with strict lifetime and
//! re-entrancy guarantees (deferred "goodbye" removal, registration-order
//! dispatch, symmetric teardown on destruction).
//!
//! The building blocks, leaves first:
//!
//! - [`meta`] — type registry: tokens, reflected members, attributes
//! - [`event`] — the publish/subscribe core
//! - [`object`] — reflection-driven load/save
//! - [`component`] / [`composition`] — behavior units and scene nodes
//! - [`space`] — a loaded scene: composition arena + event bus
//! - [`engine`] — orchestrator; `engine.update()` once per frame
//!
//! Start with `use fafnir::prelude::*`, build an [`Engine`](engine::Engine),
//! add a space, and attach components.

pub(crate) mod arena;
pub mod component;
pub mod composition;
pub mod engine;
pub mod event;
pub mod meta;
pub mod object;
pub mod prelude;
pub mod space;
pub mod time;
pub mod transform;
