//! The core spatial component, and registration of the built-in types.

use std::any::Any;

use glam::{Mat4, Quat, Vec3};

use crate::component::{Component, ComponentRegistry};
use crate::meta::{EditorVisible, TypeRegistry};

/// Position, orientation, and scale of a composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    /// The local transformation matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Component for Transform {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Register the built-in component types into freshly built registries.
/// Called by [`Engine::new`](crate::engine::Engine::new).
pub fn register_core_types(meta: &mut TypeRegistry, components: &mut ComponentRegistry) {
    let info = meta.register::<Transform>("Transform");
    info.with_attribute(EditorVisible { label: Some("Transform") });
    info.field(
        "translation",
        |t: &Transform| t.translation,
        |t, v| t.translation = v,
    )
    .serializable();
    info.field("rotation", |t: &Transform| t.rotation, |t, v| t.rotation = v)
        .serializable();
    info.field("scale", |t: &Transform| t.scale, |t, v| t.scale = v)
        .serializable();
    components.register::<Transform>("Transform");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{deserialize_by_type, serialize_by_type};
    use std::any::TypeId;

    fn registries() -> (TypeRegistry, ComponentRegistry) {
        let mut meta = TypeRegistry::new();
        let mut components = ComponentRegistry::new();
        register_core_types(&mut meta, &mut components);
        (meta, components)
    }

    #[test]
    fn round_trip_all_members() {
        let (meta, _) = registries();
        let transform = Transform {
            translation: Vec3::new(1.0, -2.5, 3.0),
            rotation: Quat::from_rotation_y(1.0),
            scale: Vec3::new(2.0, 2.0, 0.5),
        };

        let value = serialize_by_type(&meta, TypeId::of::<Transform>(), &transform);
        let mut restored = Transform::default();
        deserialize_by_type(&meta, TypeId::of::<Transform>(), &mut restored, &value);
        assert_eq!(restored, transform);
    }

    #[test]
    fn factory_builds_from_properties() {
        let (meta, components) = registries();
        let props = serde_json::json!({ "translation": [7.0, 8.0, 9.0] });
        let built = components
            .create(TypeId::of::<Transform>(), Some(&props), &meta)
            .unwrap();
        let transform = built.as_any().downcast_ref::<Transform>().unwrap();
        assert_eq!(transform.translation, Vec3::new(7.0, 8.0, 9.0));
        // Untouched members keep their defaults.
        assert_eq!(transform.scale, Vec3::ONE);
    }

    #[test]
    fn matrix_applies_translation() {
        let transform = Transform::from_translation(Vec3::new(5.0, 0.0, 0.0));
        let point = transform.matrix().transform_point3(Vec3::ZERO);
        assert_eq!(point, Vec3::new(5.0, 0.0, 0.0));
    }
}
