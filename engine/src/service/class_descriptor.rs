// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Class descriptors: reflection records for types that are *instantiated
//! by the engine* rather than registered as ready-made instances.
//!
//! The main-loop orchestrator discovers game systems this way: it asks the
//! provider for every class implementing one of the per-frame interfaces,
//! reads the attribute bag (preferred execution mode), and invokes the
//! construction thunk - either inline or on a dedicated thread.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::service::registration::ServiceRegistration;

/// Typed attribute bag attached to a class descriptor. Keys are plain
/// strings; values are whatever the reader expects (e.g. the main loop
/// reads `PreferredExecutionMode` as an `ExecutionMode`).
#[derive(Default)]
pub struct ClassAttributes {
    values: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl ClassAttributes {
    pub fn set<V: Send + Sync + 'static>(&mut self, key: &'static str, value: V) {
        self.values.insert(key, Box::new(value));
    }

    #[must_use]
    pub fn get<V: Copy + 'static>(&self, key: &str) -> Option<V> {
        self.values.get(key)?.downcast_ref::<V>().copied()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool { self.values.contains_key(key) }
}

impl std::fmt::Debug for ClassAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassAttributes")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

type ConstructorThunk = Box<dyn Fn() -> ServiceRegistration + Send + Sync>;

/// Reflection record for an engine-constructible class: construction thunk,
/// advertised interface set, attribute bag and declared service
/// dependencies.
pub struct ClassDescriptor {
    class_name: &'static str,
    interfaces: Vec<(TypeId, &'static str)>,
    attributes: ClassAttributes,
    dependencies: Vec<TypeId>,
    constructor: ConstructorThunk,
}

impl ClassDescriptor {
    pub fn builder<F>(class_name: &'static str, constructor: F) -> ClassDescriptorBuilder
    where
        F: Fn() -> ServiceRegistration + Send + Sync + 'static,
    {
        ClassDescriptorBuilder {
            class_name,
            interfaces: Vec::new(),
            attributes: ClassAttributes::default(),
            dependencies: Vec::new(),
            constructor: Box::new(constructor),
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &'static str { self.class_name }

    #[must_use]
    pub fn has_interface<I: ?Sized + 'static>(&self) -> bool {
        self.has_interface_id(TypeId::of::<I>())
    }

    #[must_use]
    pub fn has_interface_id(&self, interface_id: TypeId) -> bool {
        self.interfaces.iter().any(|(id, _)| *id == interface_id)
    }

    #[must_use]
    pub fn attributes(&self) -> &ClassAttributes { &self.attributes }

    #[must_use]
    pub fn dependencies(&self) -> &[TypeId] { &self.dependencies }

    /// Invokes the construction thunk, yielding a ready-to-register
    /// service registration.
    #[must_use]
    pub fn construct(&self) -> ServiceRegistration { (self.constructor)() }
}

impl std::fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("class", &self.class_name)
            .field(
                "interfaces",
                &self.interfaces.iter().map(|(_, name)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

pub struct ClassDescriptorBuilder {
    class_name: &'static str,
    interfaces: Vec<(TypeId, &'static str)>,
    attributes: ClassAttributes,
    dependencies: Vec<TypeId>,
    constructor: ConstructorThunk,
}

impl ClassDescriptorBuilder {
    /// Declares that constructed instances expose `I`. Must stay in sync
    /// with the interfaces of the registration the thunk produces; the
    /// [`game_system_class!`](crate::game_system_class) macro guarantees
    /// that.
    #[must_use]
    pub fn with_interface<I: ?Sized + 'static>(mut self) -> Self {
        self.interfaces.push((TypeId::of::<I>(), type_name::<I>()));
        self
    }

    #[must_use]
    pub fn with_attribute<V: Send + Sync + 'static>(
        mut self,
        key: &'static str,
        value: V,
    ) -> Self {
        self.attributes.set(key, value);
        self
    }

    #[must_use]
    pub fn with_dependency<I: ?Sized + 'static>(mut self) -> Self {
        self.dependencies.push(TypeId::of::<I>());
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<ClassDescriptor> {
        debug_assert!(
            !self.interfaces.is_empty(),
            "a class descriptor must advertise at least one interface"
        );
        Arc::new(ClassDescriptor {
            class_name: self.class_name,
            interfaces: self.interfaces,
            attributes: self.attributes,
            dependencies: self.dependencies,
            constructor: self.constructor,
        })
    }
}

/// Builds a [`ClassDescriptor`] whose declared interface list and
/// constructed registration cannot drift apart.
///
/// ```ignore
/// let descriptor = game_system_class!("PhysicsSystem", PhysicsSystem::new => [
///     dyn GameSceneUpdate, dyn ServiceInitialization,
/// ]);
/// ```
#[macro_export]
macro_rules! game_system_class {
    ($name:expr, $ctor:expr => [$($iface:ty),+ $(,)?]) => {{
        $crate::service::ClassDescriptor::builder($name, move || {
            $crate::service_registration!(($ctor)() => [$($iface),+])
        })
        $(.with_interface::<$iface>())+
        .build()
    }};
}
