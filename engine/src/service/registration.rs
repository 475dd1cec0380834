// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Service registration: the accessor record the provider stores per
//! service.
//!
//! Runtime interface lookup needs two things a `dyn Any` cannot give us on
//! its own: a process-wide stable id per *interface* (we use the `TypeId` of
//! the `dyn Trait` type) and a way to go from the type-erased instance to an
//! `Arc<dyn Trait>`. The second is an explicit interface map: at
//! registration time, while the concrete type is still known, one cast
//! closure per exposed interface is captured. The
//! [`service_registration!`](crate::service_registration) macro writes those
//! casts for you.
//!
//! Accessor flavors:
//! - *direct*: an already-constructed instance;
//! - *lazy*: a factory invoked on the first `Create`-mode request.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Type-erased, shared service instance.
pub type ServiceObjectPtr = Arc<dyn Any + Send + Sync>;

/// Whether an interface request may materialize a lazy service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GetApiMode {
    Create,
    DoNotCreate,
}

type CastFn =
    Box<dyn Fn(&ServiceObjectPtr) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

struct InterfaceCast {
    interface_name: &'static str,
    cast: CastFn,
}

enum ServiceInstance {
    Direct(ServiceObjectPtr),
    Lazy {
        factory: Box<dyn Fn() -> ServiceObjectPtr + Send + Sync>,
        instance: OnceLock<ServiceObjectPtr>,
    },
}

/// The registry entry for one service: its (possibly not yet constructed)
/// instance plus the interface-cast map.
pub struct ServiceRegistration {
    service_name: &'static str,
    instance: ServiceInstance,
    casts: HashMap<TypeId, InterfaceCast>,
}

impl ServiceRegistration {
    /// Builder over an already-constructed instance.
    pub fn builder<T: Send + Sync + 'static>(instance: T) -> RegistrationBuilder<T> {
        RegistrationBuilder {
            instance: ServiceInstance::Direct(Arc::new(instance)),
            service_name: type_name::<T>(),
            casts: HashMap::new(),
            _concrete: std::marker::PhantomData,
        }
    }

    /// Builder over a shared instance (the caller keeps a handle too).
    pub fn shared_builder<T: Send + Sync + 'static>(
        instance: Arc<T>,
    ) -> RegistrationBuilder<T> {
        RegistrationBuilder {
            instance: ServiceInstance::Direct(instance),
            service_name: type_name::<T>(),
            casts: HashMap::new(),
            _concrete: std::marker::PhantomData,
        }
    }

    /// Builder over a factory; the instance is fabricated on the first
    /// `Create`-mode interface request.
    pub fn lazy_builder<T, F>(factory: F) -> RegistrationBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        RegistrationBuilder {
            instance: ServiceInstance::Lazy {
                factory: Box::new(move || Arc::new(factory())),
                instance: OnceLock::new(),
            },
            service_name: type_name::<T>(),
            casts: HashMap::new(),
            _concrete: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn service_name(&self) -> &'static str { self.service_name }

    #[must_use]
    pub fn has_interface_id(&self, interface_id: TypeId) -> bool {
        self.casts.contains_key(&interface_id)
    }

    #[must_use]
    pub fn has_interface<I: ?Sized + 'static>(&self) -> bool {
        self.has_interface_id(TypeId::of::<I>())
    }

    #[must_use]
    pub fn interface_ids(&self) -> Vec<TypeId> {
        self.casts.keys().copied().collect()
    }

    #[must_use]
    pub fn is_materialized(&self) -> bool {
        match &self.instance {
            ServiceInstance::Direct(_) => true,
            ServiceInstance::Lazy { instance, .. } => instance.get().is_some(),
        }
    }

    /// Resolves the requested interface. In `Create` mode a lazy service is
    /// materialized first; the factory runs without any provider lock held
    /// (the factory may itself query the provider).
    pub fn get_interface<I>(&self, mode: GetApiMode) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let cast = self.casts.get(&TypeId::of::<I>())?;
        let instance = self.instance(mode)?;
        let boxed = (cast.cast)(&instance)?;
        boxed.downcast::<Arc<I>>().ok().map(|arc| *arc)
    }

    fn instance(&self, mode: GetApiMode) -> Option<ServiceObjectPtr> {
        match &self.instance {
            ServiceInstance::Direct(instance) => Some(instance.clone()),
            ServiceInstance::Lazy { factory, instance } => match mode {
                GetApiMode::Create => {
                    Some(instance.get_or_init(|| factory()).clone())
                }
                GetApiMode::DoNotCreate => instance.get().cloned(),
            },
        }
    }

    /// Names of the interfaces this registration advertises (diagnostics).
    #[must_use]
    pub fn interface_names(&self) -> Vec<&'static str> {
        self.casts.values().map(|cast| cast.interface_name).collect()
    }
}

impl std::fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("service", &self.service_name)
            .field("interfaces", &self.interface_names())
            .finish()
    }
}

/// Builder returned by [`ServiceRegistration::builder`] and friends; chain
/// [`with_interface`](Self::with_interface) once per exposed interface.
pub struct RegistrationBuilder<T: Send + Sync + 'static> {
    instance: ServiceInstance,
    service_name: &'static str,
    casts: HashMap<TypeId, InterfaceCast>,
    _concrete: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> RegistrationBuilder<T> {
    /// Registers a cast from the concrete type to `Arc<I>`. Written as a
    /// closure (`|it| it as Arc<dyn Interface>`) so the compiler verifies
    /// `T` actually implements the interface.
    #[must_use]
    pub fn with_interface<I>(
        mut self,
        cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    ) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let erased: CastFn = Box::new(move |instance: &ServiceObjectPtr| {
            let concrete = instance.clone().downcast::<T>().ok()?;
            Some(Box::new(cast(concrete)) as Box<dyn Any + Send + Sync>)
        });
        self.casts.insert(
            TypeId::of::<I>(),
            InterfaceCast {
                interface_name: type_name::<I>(),
                cast: erased,
            },
        );
        self
    }

    #[must_use]
    pub fn build(self) -> ServiceRegistration {
        debug_assert!(
            !self.casts.is_empty(),
            "a service registration must expose at least one interface"
        );
        ServiceRegistration {
            service_name: self.service_name,
            instance: self.instance,
            casts: self.casts,
        }
    }
}

/// Builds a [`ServiceRegistration`] from an instance (or `lazy` factory)
/// and the list of interfaces it exposes.
///
/// ```ignore
/// let registration = service_registration!(MySystem::new() => [
///     dyn ServiceInitialization, dyn GamePreUpdate,
/// ]);
/// ```
#[macro_export]
macro_rules! service_registration {
    (lazy $factory:expr => [$($iface:ty),+ $(,)?]) => {{
        $crate::service::ServiceRegistration::lazy_builder($factory)
            $(.with_interface::<$iface>(|it| -> std::sync::Arc<$iface> { it }))+
            .build()
    }};
    (shared $instance:expr => [$($iface:ty),+ $(,)?]) => {{
        $crate::service::ServiceRegistration::shared_builder($instance)
            $(.with_interface::<$iface>(|it| -> std::sync::Arc<$iface> { it }))+
            .build()
    }};
    ($instance:expr => [$($iface:ty),+ $(,)?]) => {{
        $crate::service::ServiceRegistration::builder($instance)
            $(.with_interface::<$iface>(|it| -> std::sync::Arc<$iface> { it }))+
            .build()
    }};
}
