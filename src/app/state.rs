use super::{ComponentState, MotionplayOrchestrator};
use std::collections::HashMap;
use tracing::debug;

impl MotionplayOrchestrator {
    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        let previous = states.insert(component.to_string(), state.clone());
        if previous.as_ref() != Some(&state) {
            debug!(
                "Component '{}' state: {:?} -> {:?}",
                component, previous, state
            );
        }
    }

    /// Get component state
    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).cloned()
    }

    /// Get all component states
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }

    /// Components not in the `Running` or `Stopped` state, sorted by name
    pub async fn unhealthy_components(&self) -> Vec<(String, ComponentState)> {
        let states = self.component_states.lock().await;
        let mut unhealthy: Vec<_> = states
            .iter()
            .filter(|(_, state)| {
                !matches!(state, ComponentState::Running | ComponentState::Stopped)
            })
            .map(|(name, state)| (name.clone(), state.clone()))
            .collect();
        unhealthy.sort_by(|a, b| a.0.cmp(&b.0));
        unhealthy
    }
}
