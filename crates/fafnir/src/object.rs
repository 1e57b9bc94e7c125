//! Load/save for any registered type: a generic walk over the members the
//! [`TypeRegistry`](crate::meta::TypeRegistry) tags as serializable,
//! producing and consuming [`serde_json::Value`] trees.
//!
//! These two functions are the seam asset loaders and the editor call into;
//! the composition tree (`Space::save`/`load`) is layered on top of them.

use std::any::{Any, TypeId};

use serde_json::Value;

use crate::meta::TypeRegistry;

/// Serialize the members of `object` tagged serializable, walking from the
/// most-derived type down the base chain. A derived member shadows a base
/// member of the same name.
pub fn serialize_by_type(meta: &TypeRegistry, type_id: TypeId, object: &dyn Any) -> Value {
    let mut map = serde_json::Map::new();
    collect(meta, type_id, object, &mut map);
    Value::Object(map)
}

fn collect(
    meta: &TypeRegistry,
    type_id: TypeId,
    object: &dyn Any,
    map: &mut serde_json::Map<String, Value>,
) {
    let Some(info) = meta.get(type_id) else {
        log::warn!("serialize of unregistered type token {type_id:?}");
        return;
    };
    for member in info.members().filter(|m| m.is_serializable()) {
        if map.contains_key(member.name()) {
            // Already emitted by a more-derived type.
            continue;
        }
        match member.get(object) {
            Some(value) => {
                map.insert(member.name().to_string(), value);
            }
            None => {
                log::error!(
                    "getter for `{}::{}` failed; object/member type mismatch",
                    info.name(),
                    member.name()
                );
                debug_assert!(false, "getter failed for `{}`", member.name());
            }
        }
    }
    if let Some(base) = info.base_link() {
        match (base.project)(object) {
            Some(projected) => collect(meta, base.type_id, projected, map),
            None => {
                log::error!("base projection failed for `{}`", info.name());
                debug_assert!(false, "base projection failed for `{}`", info.name());
            }
        }
    }
}

/// Deserialize `value` into `object`: each key is resolved against the
/// serializable members of `type_id` (walking the base chain) and written
/// through its setter. Unknown keys are logged and skipped.
pub fn deserialize_by_type(
    meta: &TypeRegistry,
    type_id: TypeId,
    object: &mut dyn Any,
    value: &Value,
) {
    let Some(map) = value.as_object() else {
        log::error!("deserialize expected an object, got {value}");
        debug_assert!(false, "deserialize expected an object");
        return;
    };
    for (name, entry) in map {
        if !set_member(meta, type_id, object, name, entry) {
            log::warn!("unknown serialized member `{name}`; skipping");
        }
    }
}

/// Write one member by name, walking the base chain. Returns whether a
/// serializable member with that name was found.
fn set_member(
    meta: &TypeRegistry,
    type_id: TypeId,
    object: &mut dyn Any,
    name: &str,
    value: &Value,
) -> bool {
    let Some(info) = meta.get(type_id) else {
        return false;
    };
    if let Some(member) = info
        .members()
        .find(|m| m.name() == name && m.is_serializable())
    {
        if !member.set(object, value) {
            log::error!("setter for `{}::{name}` rejected {value}", info.name());
            debug_assert!(false, "setter rejected value for `{name}`");
        }
        return true;
    }
    let Some(base) = info.base_link() else {
        return false;
    };
    let base_id = base.type_id;
    match (base.project_mut)(object) {
        Some(projected) => set_member(meta, base_id, projected, name, value),
        None => {
            log::error!("base projection failed for `{}`", info.name());
            debug_assert!(false, "base projection failed for `{}`", info.name());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default, PartialEq, Debug)]
    struct Stats {
        level: u32,
        title: String,
    }

    #[derive(Default, PartialEq, Debug)]
    struct Monster {
        stats: Stats,
        position: glam::Vec3,
        hostile: bool,
        /// Scratch state, never saved.
        cooldown: f32,
    }

    fn registry() -> TypeRegistry {
        let mut meta = TypeRegistry::new();
        let stats = meta.register::<Stats>("Stats");
        stats
            .field("level", |s: &Stats| s.level, |s, v| s.level = v)
            .serializable();
        stats
            .field("title", |s: &Stats| s.title.clone(), |s, v| s.title = v)
            .serializable();

        let monster = meta.register::<Monster>("Monster");
        monster.base::<Monster, Stats>(|m| &m.stats, |m| &mut m.stats);
        monster
            .field("position", |m: &Monster| m.position, |m, v| m.position = v)
            .serializable();
        monster
            .field("hostile", |m: &Monster| m.hostile, |m, v| m.hostile = v)
            .serializable();
        monster.field("cooldown", |m: &Monster| m.cooldown, |m, v| m.cooldown = v);
        meta
    }

    #[test]
    fn round_trip_with_base_chain() {
        let meta = registry();
        let monster = Monster {
            stats: Stats { level: 9, title: "Lindworm".into() },
            position: glam::Vec3::new(1.0, 2.0, 3.0),
            hostile: true,
            cooldown: 0.5,
        };

        let value = serialize_by_type(&meta, TypeId::of::<Monster>(), &monster);
        // Untagged members stay out of the document.
        assert!(value.get("cooldown").is_none());
        assert_eq!(value.get("level"), Some(&json!(9)));

        let mut restored = Monster::default();
        deserialize_by_type(&meta, TypeId::of::<Monster>(), &mut restored, &value);
        assert_eq!(restored.stats, monster.stats);
        assert_eq!(restored.position, monster.position);
        assert_eq!(restored.hostile, monster.hostile);
        assert_eq!(restored.cooldown, 0.0);
    }

    #[test]
    fn unknown_member_is_skipped() {
        let meta = registry();
        let mut monster = Monster::default();
        deserialize_by_type(
            &meta,
            TypeId::of::<Monster>(),
            &mut monster,
            &json!({ "level": 3, "no_such_member": 1 }),
        );
        assert_eq!(monster.stats.level, 3);
    }

    #[test]
    fn derived_member_shadows_base() {
        let mut meta = TypeRegistry::new();
        let stats = meta.register::<Stats>("Stats");
        stats
            .field("level", |s: &Stats| s.level, |s, v| s.level = v)
            .serializable();

        // Monster re-declares `level` with an offset getter; the base's
        // entry must not overwrite it in the output document.
        let monster = meta.register::<Monster>("Monster");
        monster.base::<Monster, Stats>(|m| &m.stats, |m| &mut m.stats);
        monster
            .field(
                "level",
                |m: &Monster| m.stats.level + 100,
                |m, v: u32| m.stats.level = v - 100,
            )
            .serializable();

        let mut monster_value = Monster::default();
        monster_value.stats.level = 7;
        let value = serialize_by_type(&meta, TypeId::of::<Monster>(), &monster_value);
        assert_eq!(value.get("level"), Some(&json!(107)));
    }

    #[test]
    fn partial_document_leaves_other_members_alone() {
        let meta = registry();
        let mut monster = Monster {
            stats: Stats { level: 4, title: "Wyrm".into() },
            position: glam::Vec3::ONE,
            hostile: true,
            cooldown: 0.0,
        };
        deserialize_by_type(
            &meta,
            TypeId::of::<Monster>(),
            &mut monster,
            &json!({ "hostile": false }),
        );
        assert!(!monster.hostile);
        assert_eq!(monster.stats.level, 4);
        assert_eq!(monster.position, glam::Vec3::ONE);
    }
}
