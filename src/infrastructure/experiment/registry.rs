//! In-memory experiment registry

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use super::tally::VariantTally;
use crate::domain::experiment::{Experiment, ExperimentValidationError};
use crate::domain::DomainError;

/// One registered experiment and the tallies observed for it
#[derive(Debug)]
pub struct ExperimentSlot {
    experiment: RwLock<Experiment>,
    tallies: Mutex<HashMap<String, VariantTally>>,
}

impl ExperimentSlot {
    fn new(experiment: Experiment) -> Self {
        let tallies = experiment
            .variants()
            .iter()
            .map(|v| (v.id().to_string(), VariantTally::default()))
            .collect();

        Self {
            experiment: RwLock::new(experiment),
            tallies: Mutex::new(tallies),
        }
    }

    /// Run `f` against the current definition without cloning it
    pub fn with_experiment<T>(&self, f: impl FnOnce(&Experiment) -> T) -> T {
        f(&self.read_experiment())
    }

    pub fn experiment(&self) -> Experiment {
        self.read_experiment().clone()
    }

    /// Move the experiment to Concluded
    pub fn conclude(&self) -> Result<Experiment, ExperimentValidationError> {
        let mut experiment = self
            .experiment
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        experiment.conclude()?;
        Ok(experiment.clone())
    }

    /// Apply `f` to the tally of `variant_id`; false if the variant is unknown
    pub fn update_tally(&self, variant_id: &str, f: impl FnOnce(&mut VariantTally)) -> bool {
        match self.lock_tallies().get_mut(variant_id) {
            Some(tally) => {
                f(tally);
                true
            }
            None => false,
        }
    }

    pub fn tallies(&self) -> HashMap<String, VariantTally> {
        self.lock_tallies().clone()
    }

    fn read_experiment(&self) -> RwLockReadGuard<'_, Experiment> {
        self.experiment.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tallies(&self) -> MutexGuard<'_, HashMap<String, VariantTally>> {
        self.tallies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory experiment registry
#[derive(Debug, Default)]
pub struct InMemoryExperimentRegistry {
    experiments: RwLock<HashMap<String, Arc<ExperimentSlot>>>,
}

impl InMemoryExperimentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an experiment; fails with `Conflict` if the id is taken
    pub fn insert(&self, experiment: Experiment) -> Result<Arc<ExperimentSlot>, DomainError> {
        let id = experiment.id().as_str().to_string();
        let mut experiments = self
            .experiments
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if experiments.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "Experiment '{}' already exists",
                id
            )));
        }

        let slot = Arc::new(ExperimentSlot::new(experiment));
        experiments.insert(id, Arc::clone(&slot));
        Ok(slot)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ExperimentSlot>> {
        self.read().get(id).cloned()
    }

    /// Get a slot or fail with `NotFound`
    pub fn require(&self, id: &str) -> Result<Arc<ExperimentSlot>, DomainError> {
        self.get(id)
            .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", id)))
    }

    /// All experiments, newest first
    pub fn list(&self) -> Vec<Experiment> {
        let slots: Vec<Arc<ExperimentSlot>> = self.read().values().cloned().collect();

        let mut experiments: Vec<Experiment> = slots.iter().map(|s| s.experiment()).collect();
        experiments.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().as_str().cmp(b.id().as_str()))
        });
        experiments
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ExperimentSlot>>> {
        self.experiments.read().unwrap_or_else(PoisonError::into_inner)
    }
}
