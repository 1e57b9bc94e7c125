//! # Meta — Type Registry and Reflection
//!
//! Maps type tokens ([`TypeId`]) to declared metadata: named
//! properties/fields with erased getter/setter accessors, typed attributes,
//! and an optional base-type link. Serialization
//! ([`object`](crate::object)), the component factories, and editor tooling
//! all drive off this table.
//!
//! ## Type tokens
//!
//! Identity comparison, never name comparison, determines type equality:
//! two types registered under the same display name are still distinct
//! tokens. The name is only a serialization/tooling label.
//!
//! ## Inheritance
//!
//! A type may declare a single base via [`TypeInfo::base`]. In Rust the
//! "base" is an embedded struct, so the link carries a pair of projection
//! functions from the outer value to the embedded one; member lookup walks
//! the chain from the most-derived type toward the root. A linear walk,
//! nothing more — there are no diamonds to resolve.
//!
//! ## Registration
//!
//! The registry is built once at startup (the [`Engine`](crate::engine::Engine)
//! refuses registration after the first space exists) and is read-only
//! afterwards, so it can be shared freely by `Rc`.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Attribute tagging a property/field as part of the serialized state.
pub struct Serializable;

/// Attribute tagging a property/field/type for display in editor tooling.
pub struct EditorVisible {
    pub label: Option<&'static str>,
}

type Getter = Box<dyn Fn(&dyn Any) -> Option<Value>>;
type Setter = Box<dyn Fn(&mut dyn Any, &Value) -> bool>;

/// Typed tags attached to a property, field, or type: at most one instance
/// per attribute type token.
pub struct AttributeSet {
    entries: Vec<(TypeId, Box<dyn Any>)>,
}

impl AttributeSet {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert<A: Any>(&mut self, attribute: A) {
        let id = TypeId::of::<A>();
        if let Some(slot) = self.entries.iter_mut().find(|(tid, _)| *tid == id) {
            slot.1 = Box::new(attribute);
        } else {
            self.entries.push((id, Box::new(attribute)));
        }
    }

    pub fn get<A: Any>(&self) -> Option<&A> {
        let id = TypeId::of::<A>();
        self.entries
            .iter()
            .find(|(tid, _)| *tid == id)
            .and_then(|(_, a)| a.downcast_ref::<A>())
    }

    pub fn contains<A: Any>(&self) -> bool {
        self.get::<A>().is_some()
    }
}

/// A reflected member: a named accessor pair over an erased object.
///
/// Built through the typed methods on [`TypeInfo`], which erase the
/// getter/setter through [`serde_json::Value`]. The typed builders make a
/// mismatched getter/setter pair unrepresentable; the remaining contract —
/// marking a half-accessor member serializable — is a hard assertion.
pub struct Property {
    name: &'static str,
    getter: Option<Getter>,
    setter: Option<Setter>,
    attributes: AttributeSet,
}

impl Property {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Tag this member as serialized state.
    ///
    /// Requires both a getter and a setter — a member that cannot round-trip
    /// must not claim to be serializable.
    pub fn serializable(&mut self) -> &mut Self {
        if self.getter.is_none() || self.setter.is_none() {
            log::error!(
                "property `{}` marked serializable without a full getter/setter pair",
                self.name
            );
            debug_assert!(
                false,
                "property `{}` marked serializable without a full getter/setter pair",
                self.name
            );
            return self;
        }
        self.attributes.insert(Serializable);
        self
    }

    pub fn with_attribute<A: Any>(&mut self, attribute: A) -> &mut Self {
        self.attributes.insert(attribute);
        self
    }

    pub fn is_serializable(&self) -> bool {
        self.attributes.contains::<Serializable>()
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Read this member off `object` as a JSON value.
    ///
    /// `None` when the member has no getter or `object` is not the type this
    /// member was declared on (a framework bug the caller asserts on).
    pub fn get(&self, object: &dyn Any) -> Option<Value> {
        self.getter.as_ref().and_then(|g| g(object))
    }

    /// Write `value` into this member of `object`. Returns whether the write
    /// happened.
    pub fn set(&self, object: &mut dyn Any, value: &Value) -> bool {
        self.setter.as_ref().is_some_and(|s| s(object, value))
    }
}

/// Projection to an embedded base value, plus the base's type token.
pub(crate) struct BaseLink {
    pub(crate) type_id: TypeId,
    pub(crate) project: Box<dyn Fn(&dyn Any) -> Option<&dyn Any>>,
    pub(crate) project_mut: Box<dyn Fn(&mut dyn Any) -> Option<&mut dyn Any>>,
}

/// Metadata for one registered type: members, attributes, base link.
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    base: Option<BaseLink>,
    properties: Vec<Property>,
    fields: Vec<Property>,
    attributes: AttributeSet,
}

impl TypeInfo {
    fn new<T: Any>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            base: None,
            properties: Vec::new(),
            fields: Vec::new(),
            attributes: AttributeSet::new(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base_id(&self) -> Option<TypeId> {
        self.base.as_ref().map(|b| b.type_id)
    }

    /// Declare `B`, embedded in `T`, as this type's base. Member lookup that
    /// misses on `T` continues into `B`'s registered metadata.
    pub fn base<T: Any, B: Any>(
        &mut self,
        project: fn(&T) -> &B,
        project_mut: fn(&mut T) -> &mut B,
    ) -> &mut Self {
        debug_assert!(self.id == TypeId::of::<T>(), "base projection from foreign type");
        self.base = Some(BaseLink {
            type_id: TypeId::of::<B>(),
            project: Box::new(move |obj| obj.downcast_ref::<T>().map(|t| project(t) as &dyn Any)),
            project_mut: Box::new(move |obj| {
                obj.downcast_mut::<T>().map(|t| project_mut(t) as &mut dyn Any)
            }),
        });
        self
    }

    fn accessor_pair<T: Any, V: Serialize + DeserializeOwned + 'static>(
        name: &'static str,
        get: fn(&T) -> V,
        set: fn(&mut T, V),
    ) -> Property {
        Property {
            name,
            getter: Some(Box::new(move |obj: &dyn Any| {
                let obj = obj.downcast_ref::<T>()?;
                serde_json::to_value(get(obj)).ok()
            })),
            setter: Some(Box::new(move |obj: &mut dyn Any, value: &Value| {
                let Some(obj) = obj.downcast_mut::<T>() else {
                    return false;
                };
                match serde_json::from_value::<V>(value.clone()) {
                    Ok(v) => {
                        set(obj, v);
                        true
                    }
                    Err(err) => {
                        log::warn!("could not deserialize `{name}`: {err}");
                        false
                    }
                }
            })),
            attributes: AttributeSet::new(),
        }
    }

    /// Declare a property (getter/setter pair).
    pub fn property<T: Any, V: Serialize + DeserializeOwned + 'static>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> V,
        set: fn(&mut T, V),
    ) -> &mut Property {
        self.properties.push(Self::accessor_pair(name, get, set));
        self.properties.last_mut().unwrap()
    }

    /// Declare a getter-only property (derived values, tooling display).
    pub fn read_only_property<T: Any, V: Serialize + 'static>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> V,
    ) -> &mut Property {
        self.properties.push(Property {
            name,
            getter: Some(Box::new(move |obj: &dyn Any| {
                let obj = obj.downcast_ref::<T>()?;
                serde_json::to_value(get(obj)).ok()
            })),
            setter: None,
            attributes: AttributeSet::new(),
        });
        self.properties.last_mut().unwrap()
    }

    /// Declare a field (direct member access).
    pub fn field<T: Any, V: Serialize + DeserializeOwned + 'static>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> V,
        set: fn(&mut T, V),
    ) -> &mut Property {
        self.fields.push(Self::accessor_pair(name, get, set));
        self.fields.last_mut().unwrap()
    }

    pub fn with_attribute<A: Any>(&mut self, attribute: A) -> &mut Self {
        self.attributes.insert(attribute);
        self
    }

    pub fn attribute<A: Any>(&self) -> Option<&A> {
        self.attributes.get::<A>()
    }

    /// Properties then fields, declaration order.
    pub(crate) fn members(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().chain(self.fields.iter())
    }

    pub(crate) fn base_link(&self) -> Option<&BaseLink> {
        self.base.as_ref()
    }
}

/// The process-wide type table, built explicitly at startup.
pub struct TypeRegistry {
    types: HashMap<TypeId, TypeInfo>,
    by_name: HashMap<&'static str, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register `T` under `name`, returning its [`TypeInfo`] for member and
    /// attribute declarations. Re-registering a token replaces its metadata.
    pub fn register<T: Any>(&mut self, name: &'static str) -> &mut TypeInfo {
        let id = TypeId::of::<T>();
        if self.types.contains_key(&id) {
            log::warn!("type `{name}` registered twice; replacing metadata");
        }
        if let Some(&existing) = self.by_name.get(name) {
            if existing != id {
                log::warn!("type name `{name}` reused by a different type token");
            }
        }
        self.by_name.insert(name, id);
        self.types.insert(id, TypeInfo::new::<T>(name));
        self.types.get_mut(&id).unwrap()
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&TypeInfo> {
        self.by_name.get(name).and_then(|id| self.types.get(id))
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.types.contains_key(&id)
    }

    /// Find the serializable member `name` on `type_id`, searching
    /// properties, then fields, then the base chain. `None` at the root.
    pub fn get_property(&self, type_id: TypeId, name: &str) -> Option<&Property> {
        let mut current = Some(type_id);
        while let Some(id) = current {
            let info = self.get(id)?;
            if let Some(found) = info
                .members()
                .find(|p| p.name == name && p.is_serializable())
            {
                return Some(found);
            }
            current = info.base_id();
        }
        None
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health {
        current: f32,
        max: f32,
    }

    struct Actor {
        health: Health,
        name: String,
    }

    fn registry() -> TypeRegistry {
        let mut meta = TypeRegistry::new();
        let health = meta.register::<Health>("Health");
        health
            .field("current", |h: &Health| h.current, |h, v| h.current = v)
            .serializable();
        health
            .field("max", |h: &Health| h.max, |h, v| h.max = v)
            .serializable();

        let actor = meta.register::<Actor>("Actor");
        actor.base::<Actor, Health>(|a| &a.health, |a| &mut a.health);
        actor
            .property("name", |a: &Actor| a.name.clone(), |a, v| a.name = v)
            .serializable();
        actor.read_only_property("display", |a: &Actor| format!("actor:{}", a.name));
        meta
    }

    #[test]
    fn identity_not_name_decides_equality() {
        let meta = registry();
        assert_eq!(meta.get_by_name("Actor").unwrap().id(), TypeId::of::<Actor>());
        assert_ne!(TypeId::of::<Actor>(), TypeId::of::<Health>());
    }

    #[test]
    fn get_property_walks_base_chain() {
        let meta = registry();
        // Own property.
        assert!(meta.get_property(TypeId::of::<Actor>(), "name").is_some());
        // Inherited through the base link.
        assert!(meta.get_property(TypeId::of::<Actor>(), "max").is_some());
        // Missing everywhere.
        assert!(meta.get_property(TypeId::of::<Actor>(), "mana").is_none());
    }

    #[test]
    fn get_property_skips_non_serializable() {
        let meta = registry();
        // `display` exists but carries no Serializable tag.
        assert!(meta.get_property(TypeId::of::<Actor>(), "display").is_none());
    }

    #[test]
    fn property_accessors_round_trip_values() {
        let meta = registry();
        let mut actor = Actor {
            health: Health { current: 10.0, max: 50.0 },
            name: "hero".into(),
        };

        let prop = meta.get_property(TypeId::of::<Actor>(), "name").unwrap();
        assert_eq!(prop.get(&actor), Some(Value::String("hero".into())));
        assert!(prop.set(&mut actor, &Value::String("villain".into())));
        assert_eq!(actor.name, "villain");

        // Base members operate on the projected base value.
        let prop = meta.get_property(TypeId::of::<Health>(), "max").unwrap();
        assert!(prop.set(&mut actor.health, &serde_json::json!(99.0)));
        assert_eq!(actor.health.max, 99.0);
    }

    #[test]
    fn setter_rejects_wrong_value_shape() {
        let meta = registry();
        let mut health = Health { current: 1.0, max: 2.0 };
        let prop = meta.get_property(TypeId::of::<Health>(), "max").unwrap();
        assert!(!prop.set(&mut health, &Value::String("not a number".into())));
        assert_eq!(health.max, 2.0);
    }

    #[test]
    fn getter_on_wrong_object_returns_none() {
        let meta = registry();
        let prop = meta.get_property(TypeId::of::<Health>(), "max").unwrap();
        let actor_not_health = Actor {
            health: Health { current: 0.0, max: 0.0 },
            name: String::new(),
        };
        assert_eq!(prop.get(&actor_not_health), None);
    }

    #[test]
    fn attributes_one_instance_per_kind() {
        let mut meta = TypeRegistry::new();
        let info = meta.register::<Health>("Health");
        info.with_attribute(EditorVisible { label: Some("HP") });
        info.with_attribute(EditorVisible { label: Some("Hit Points") });
        assert_eq!(
            info.attribute::<EditorVisible>().unwrap().label,
            Some("Hit Points")
        );
    }

    #[test]
    #[should_panic(expected = "without a full getter/setter pair")]
    fn serializable_requires_round_trip_accessors() {
        let mut meta = TypeRegistry::new();
        let info = meta.register::<Actor>("Actor");
        info.read_only_property("display", |a: &Actor| a.name.clone())
            .serializable();
    }
}
