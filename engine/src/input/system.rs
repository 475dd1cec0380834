// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The input system service: controllers, signals, actions, contexts and
//! input sources.
//!
//! Evaluation happens in the pre-update frame phase. The action list and
//! the active context set are snapshotted at the start of the pass, so a
//! callback that mutates contexts affects the *next* frame, and callbacks
//! are free to call back into the system.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use miette::IntoDiagnostic;

use crate::data_block::DataBlock;
use crate::input::action::{ActionCallback, ActionType, InputAction};
use crate::input::device::{
    InputController, InputControllerImpl, InputDevice, InputSource,
    InputSourceManager,
};
use crate::input::factory::create_signal_by_type;
use crate::input::signal::{InputSignal, SignalContext};
use crate::main_loop::game_system::GamePreUpdate;
use crate::service::ServiceInitialization;

struct InputSystemState {
    devices: Vec<Arc<dyn InputDevice>>,
    controllers: HashMap<String, Arc<dyn InputController>>,
    actions: Vec<Arc<Mutex<InputAction>>>,
    contexts: BTreeSet<String>,
    source_manager: Option<Arc<dyn InputSourceManager>>,
    sources: Vec<InputSource>,
    current_source: String,
}

impl SignalContext for InputSystemState {
    fn controller(&self, name: &str) -> Option<Arc<dyn InputController>> {
        self.controllers.get(name).cloned()
    }

    fn create_signal(&self, signal_type: &str) -> Option<Box<dyn InputSignal>> {
        create_signal_by_type(signal_type)
    }
}

pub struct InputSystemImpl {
    state: Mutex<InputSystemState>,
}

impl InputSystemImpl {
    #[must_use]
    pub fn new() -> Arc<Self> { Self::with_devices(Vec::new()) }

    /// Builds the system over platform devices supplied by the input
    /// driver collaborator. One controller per device, named after it.
    #[must_use]
    pub fn with_devices(devices: Vec<Arc<dyn InputDevice>>) -> Arc<Self> {
        let mut controllers: HashMap<String, Arc<dyn InputController>> =
            HashMap::new();
        for device in &devices {
            let name = device.name();
            controllers.insert(
                name.clone(),
                InputControllerImpl::new(name, device.clone()),
            );
        }
        Arc::new(Self {
            state: Mutex::new(InputSystemState {
                devices,
                controllers,
                actions: Vec::new(),
                contexts: BTreeSet::new(),
                source_manager: None,
                sources: Vec::new(),
                current_source: String::new(),
            }),
        })
    }

    pub fn add_device(&self, device: Arc<dyn InputDevice>) {
        let mut state = self.lock();
        let name = device.name();
        state
            .controllers
            .insert(name.clone(), InputControllerImpl::new(name, device.clone()));
        state.devices.push(device);
    }

    #[must_use]
    pub fn devices(&self) -> Vec<Arc<dyn InputDevice>> { self.lock().devices.clone() }

    #[must_use]
    pub fn controller(&self, name: &str) -> Option<Arc<dyn InputController>> {
        self.lock().controllers.get(name).cloned()
    }

    /// Creates an unbound signal with a generated name.
    #[must_use]
    pub fn create_signal(&self, signal_type: &str) -> Option<Box<dyn InputSignal>> {
        let mut signal = create_signal_by_type(signal_type)?;
        signal.base_mut().generate_name();
        Some(signal)
    }

    /// Creates a signal bound to `controller_name` and hands it to
    /// `configure` for properties / nested inputs.
    #[must_use]
    pub fn create_signal_for(
        &self,
        signal_type: &str,
        controller_name: &str,
        configure: impl FnOnce(&mut dyn InputSignal),
    ) -> Option<Box<dyn InputSignal>> {
        let mut signal = self.create_signal(signal_type)?;
        signal
            .base_mut()
            .set_controller(self.controller(controller_name));
        configure(signal.as_mut());
        Some(signal)
    }

    /// Registers an action over `signal`. Ownership of the action is
    /// shared between the system and the returned handle.
    pub fn add_action(
        &self,
        name: impl Into<String>,
        action_type: ActionType,
        signal: Box<dyn InputSignal>,
        callback: ActionCallback,
    ) -> Arc<Mutex<InputAction>> {
        let action = Arc::new(Mutex::new(InputAction::new(
            name,
            action_type,
            signal,
            callback,
        )));
        self.lock().actions.push(action.clone());
        action
    }

    /// Registers an action rebuilt from its serialized block.
    #[must_use]
    pub fn add_action_from_block(
        &self,
        block: &DataBlock,
        callback: ActionCallback,
    ) -> Option<Arc<Mutex<InputAction>>> {
        let mut state = self.lock();
        let action = InputAction::from_block(block, &*state, callback)?;
        let action = Arc::new(Mutex::new(action));
        state.actions.push(action.clone());
        Some(action)
    }

    /// Unregisters the action. The handle stays usable for the caller but
    /// the system stops updating it.
    pub fn remove_action(&self, action: &Arc<Mutex<InputAction>>) -> bool {
        let mut state = self.lock();
        let before = state.actions.len();
        state.actions.retain(|entry| !Arc::ptr_eq(entry, action));
        state.actions.len() != before
    }

    #[must_use]
    pub fn actions(&self) -> Vec<Arc<Mutex<InputAction>>> {
        self.lock().actions.clone()
    }

    /// Persists the action's serialized tree (JSON form of the key-value
    /// tree).
    pub fn save_action(
        &self,
        action: &Arc<Mutex<InputAction>>,
        path: impl AsRef<Path>,
    ) -> miette::Result<()> {
        let block = lock_action(action).serialize();
        std::fs::write(path.as_ref(), block.to_json()?).into_diagnostic()
    }

    /// Loads and registers an action previously saved with
    /// [`save_action`](Self::save_action).
    pub fn load_action(
        &self,
        path: impl AsRef<Path>,
        callback: ActionCallback,
    ) -> miette::Result<Arc<Mutex<InputAction>>> {
        let text = std::fs::read_to_string(path.as_ref()).into_diagnostic()?;
        let block = DataBlock::from_json(&text)?;
        self.add_action_from_block(&block, callback).ok_or_else(|| {
            miette::miette!(
                "malformed action document: {}",
                path.as_ref().display()
            )
        })
    }

    /// Resets the active context set to `{context}`.
    pub fn set_context(&self, context: impl Into<String>) {
        let mut state = self.lock();
        state.contexts.clear();
        state.contexts.insert(context.into());
    }

    pub fn add_context(&self, context: impl Into<String>) {
        self.lock().contexts.insert(context.into());
    }

    pub fn remove_context(&self, context: &str) {
        self.lock().contexts.remove(context);
    }

    #[must_use]
    pub fn active_contexts(&self) -> BTreeSet<String> {
        self.lock().contexts.clone()
    }

    /// Supplies the source list provider (typically the windowing layer).
    pub fn set_source_manager(&self, manager: Arc<dyn InputSourceManager>) {
        self.lock().source_manager = Some(manager);
    }

    /// Switches the active input source; called by the platform message
    /// handler when an OS event arrives for a known source handle.
    pub fn set_input_source(&self, source: impl Into<String>) {
        self.lock().current_source = source.into();
    }

    #[must_use]
    pub fn current_source(&self) -> String { self.lock().current_source.clone() }

    /// Resolves an OS handle against the known sources and switches to the
    /// matching one before dispatch.
    pub fn switch_source_by_handle(&self, handle: usize) {
        let mut state = self.lock();
        if let Some(source) = state
            .sources
            .iter()
            .find(|source| source.handle == handle)
        {
            state.current_source = source.name.clone();
        }
    }

    /// One evaluation pass: refresh sources, tick controllers, evaluate
    /// every action against the contexts active at the start of the pass.
    pub fn update(&self, dt: f32) {
        let (controllers, actions, contexts) = {
            let mut state = self.lock();
            if let Some(source_manager) = &state.source_manager {
                state.sources = source_manager.sources();
            }
            (
                state.controllers.values().cloned().collect::<Vec<_>>(),
                state.actions.clone(),
                state.contexts.clone(),
            )
        };

        for controller in &controllers {
            controller.update(dt);
        }

        for action in &actions {
            lock_action(action).update(dt, &contexts);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InputSystemState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl GamePreUpdate for InputSystemImpl {
    fn game_pre_update(&self, dt: Duration) { self.update(dt.as_secs_f32()); }
}

impl ServiceInitialization for InputSystemImpl {}

impl std::fmt::Debug for InputSystemImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("InputSystemImpl")
            .field("devices", &state.devices.len())
            .field("actions", &state.actions.len())
            .field("contexts", &state.contexts)
            .finish()
    }
}

fn lock_action(action: &Arc<Mutex<InputAction>>) -> std::sync::MutexGuard<'_, InputAction> {
    action
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
