use std::sync::Arc;
use tracing::debug;

use crate::error::StoreError;
use crate::ids::{ActionId, IdGenerator, RandomIds};
use crate::models::{Action, ActionKind, ActionPreset, ActionStep, OptionBag};

use super::move_item;

/// Ordered list of configured pipeline steps.
pub struct ActionList {
    steps: Vec<ActionStep>,
    ids: Arc<dyn IdGenerator>,
    locked: bool,
}

impl ActionList {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            steps: Vec::new(),
            ids,
            locked: false,
        }
    }

    fn ensure_unlocked(&self) -> Result<(), StoreError> {
        if self.locked {
            return Err(StoreError::RunInProgress);
        }
        Ok(())
    }

    /// Append a step of `kind` with default options.
    pub fn add(&mut self, kind: ActionKind) -> Result<ActionId, StoreError> {
        self.ensure_unlocked()?;
        let id = self.ids.action_id();
        self.steps
            .push(ActionStep::new(id, Action::default_for(kind)));
        debug!(action_id = %id, kind = %kind, "Action added");
        Ok(id)
    }

    /// Append a step of `kind` configured from an option bag.
    pub fn add_configured(
        &mut self,
        kind: ActionKind,
        options: &OptionBag,
    ) -> Result<ActionId, StoreError> {
        self.ensure_unlocked()?;
        let action = Action::from_options(kind, options)?;
        let id = self.ids.action_id();
        self.steps.push(ActionStep::new(id, action));
        Ok(id)
    }

    pub fn push(&mut self, step: ActionStep) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        step.action.validate()?;
        self.steps.push(step);
        Ok(())
    }

    /// Remove a step. Unknown ids are ignored.
    pub fn remove(&mut self, id: ActionId) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        self.steps.retain(|s| s.id != id);
        Ok(())
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        move_item(&mut self.steps, from, to)
    }

    /// Merge `options` into a step's configuration. Invalid results are rejected
    /// and leave the step unchanged.
    pub fn update_options(&mut self, id: ActionId, options: &OptionBag) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        step.action = step.action.updated_with(options)?;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        self.steps.clear();
        Ok(())
    }

    pub fn steps(&self) -> &[ActionStep] {
        &self.steps
    }

    pub fn get(&self, id: ActionId) -> Option<&ActionStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Copy of the current steps, for saving as a preset.
    pub fn get_current_action_steps(&self) -> Vec<ActionStep> {
        self.steps.clone()
    }

    /// Replace every step at once, as when a saved preset is loaded.
    pub fn replace_action_steps(&mut self, steps: Vec<ActionStep>) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        for step in &steps {
            step.action.validate()?;
        }
        self.steps = steps;
        Ok(())
    }

    /// Replace every step with the contents of a preset, assigning fresh ids.
    pub fn load_preset(&mut self, preset: &ActionPreset) -> Result<Vec<ActionId>, StoreError> {
        self.ensure_unlocked()?;
        let actions = preset
            .actions
            .iter()
            .map(|spec| spec.to_action())
            .collect::<Result<Vec<_>, _>>()?;
        let steps: Vec<ActionStep> = actions
            .into_iter()
            .map(|action| ActionStep::new(self.ids.action_id(), action))
            .collect();
        let ids = steps.iter().map(|s| s.id).collect();
        self.steps = steps;
        Ok(ids)
    }

    pub fn lock_for_run(&mut self) -> bool {
        !std::mem::replace(&mut self.locked, true)
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Default for ActionList {
    fn default() -> Self {
        Self::new(Arc::new(RandomIds))
    }
}

impl std::fmt::Debug for ActionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionList")
            .field("steps", &self.steps)
            .field("locked", &self.locked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionConfigError;
    use crate::ids::SequentialIds;
    use crate::models::ActionSpec;

    fn list() -> ActionList {
        ActionList::new(Arc::new(SequentialIds::new()))
    }

    fn bag(pairs: &[(&str, &str)]) -> OptionBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_add_uses_defaults_and_keeps_order() {
        let mut list = list();
        list.add(ActionKind::ResizeImages).unwrap();
        list.add(ActionKind::CompressFiles).unwrap();
        let kinds: Vec<ActionKind> = list.steps().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![ActionKind::ResizeImages, ActionKind::CompressFiles]);
        assert_eq!(list.steps()[1].options()["zipName"], "processed_files");
    }

    #[test]
    fn test_update_options_validates() {
        let mut list = list();
        let id = list.add(ActionKind::ResizeImages).unwrap();

        let err = list
            .update_options(id, &bag(&[("percentage", "150")]))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ActionConfig(ActionConfigError::OutOfRange { .. })
        ));
        assert_eq!(list.get(id).unwrap().options()["percentage"], "50");

        list.update_options(id, &bag(&[("percentage", "25")])).unwrap();
        assert_eq!(list.get(id).unwrap().options()["percentage"], "25");
    }

    #[test]
    fn test_reorder_and_remove() {
        let mut list = list();
        let a = list.add(ActionKind::ConvertFormat).unwrap();
        let b = list.add(ActionKind::FileRenaming).unwrap();
        let c = list.add(ActionKind::CombineFiles).unwrap();
        list.reorder(0, 2).unwrap();
        let ids: Vec<ActionId> = list.steps().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b, c, a]);

        list.remove(c).unwrap();
        list.remove(ActionId::from_u128(404)).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_replace_and_get_current_steps() {
        let mut source = list();
        source.add(ActionKind::ReduceSize).unwrap();
        source.add(ActionKind::CompressFiles).unwrap();
        let saved = source.get_current_action_steps();

        let mut target = list();
        target.add(ActionKind::FileRenaming).unwrap();
        target.replace_action_steps(saved.clone()).unwrap();
        assert_eq!(target.steps(), saved.as_slice());
    }

    #[test]
    fn test_load_preset_assigns_fresh_ids() {
        let mut list = list();
        let preset = ActionPreset {
            name: Some("webp".to_string()),
            actions: vec![ActionSpec {
                kind: ActionKind::ConvertFormat,
                options: bag(&[("format", "webp"), ("conversionType", "all")]),
            }],
        };
        let ids = list.load_preset(&preset).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(list.steps()[0].options()["format"], "webp");
    }

    #[test]
    fn test_locked_list_rejects_mutations() {
        let mut list = list();
        let id = list.add(ActionKind::ReduceSize).unwrap();
        assert!(list.lock_for_run());
        assert_eq!(list.add(ActionKind::ReduceSize), Err(StoreError::RunInProgress));
        assert_eq!(list.remove(id), Err(StoreError::RunInProgress));
        assert_eq!(
            list.update_options(id, &OptionBag::new()),
            Err(StoreError::RunInProgress)
        );
        assert_eq!(
            list.replace_action_steps(Vec::new()),
            Err(StoreError::RunInProgress)
        );
        list.unlock();
        assert!(list.clear().is_ok());
    }
}
