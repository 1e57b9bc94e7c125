//! The common surface, for `use fafnir::prelude::*`.

pub use crate::component::{
    Component, ComponentContext, ComponentDependencies, ComponentRegistry,
};
pub use crate::composition::{
    COMPOSITION_ADDED, COMPOSITION_REMOVED, CompositionAdded, CompositionId, CompositionRemoved,
};
pub use crate::engine::{
    DELETION_UPDATE, Engine, LOGIC_UPDATE, LogicUpdate, PRE_LOGIC_UPDATE,
};
pub use crate::event::{BusHost, Dispatch, Event, EventBus, HandlerId};
pub use crate::meta::{
    AttributeSet, EditorVisible, Property, Serializable, TypeInfo, TypeRegistry,
};
pub use crate::object::{deserialize_by_type, serialize_by_type};
pub use crate::space::Space;
pub use crate::time::Time;
pub use crate::transform::Transform;
