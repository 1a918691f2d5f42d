use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::als::fit;
use crate::artifact::ModelArtifact;
use crate::common::{Target, TrainReport};
use crate::config::Settings;
use crate::errors::{RecError, RecResult};
use crate::evaluate::{evaluate, group_held_out};
use crate::source::InteractionSource;
use crate::sparse::InteractionMatrix;
use crate::store::ArtifactStore;

/// Batch training for both targets. Runs for the same target never overlap.
pub struct Trainer {
    source: Arc<dyn InteractionSource>,
    store: Arc<dyn ArtifactStore>,
    settings: Settings,
    restaurants_lock: Mutex<()>,
    dishes_lock: Mutex<()>,
}

impl Trainer {
    pub fn new(
        source: Arc<dyn InteractionSource>,
        store: Arc<dyn ArtifactStore>,
        settings: Settings,
    ) -> Self {
        Self {
            source,
            store,
            settings,
            restaurants_lock: Mutex::new(()),
            dishes_lock: Mutex::new(()),
        }
    }

    fn lock_for(&self, target: Target) -> &Mutex<()> {
        match target {
            Target::Restaurants => &self.restaurants_lock,
            Target::Dishes => &self.dishes_lock,
        }
    }

    /// Fit, evaluate and store the model of one target. Nothing is stored when a
    /// step fails, so the previous artifact stays in place.
    pub fn train(&self, target: Target) -> RecResult<TrainReport> {
        // a panicked earlier run never reached the store
        let _guard = self
            .lock_for(target)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        let name = target.name();

        let rows = self.source.training_interactions(target)?;
        let matrix = InteractionMatrix::build(&rows).map_err(|e| match e {
            RecError::InsufficientData(_) => RecError::InsufficientData(name.to_string()),
            other => other,
        })?;
        log::info!(
            "train `{name}`: {} rows, {} users, {} items",
            rows.len(),
            matrix.n_users(),
            matrix.n_items()
        );

        let factors = fit(&matrix, &self.settings.als)?;
        let titles = self.source.titles(target)?;
        let artifact = ModelArtifact::from_training(name, matrix, factors, titles)?;

        let ground_truth = group_held_out(&self.source.held_out(target)?);
        let metrics = evaluate(&artifact, &ground_truth, self.settings.eval_k);

        let artifact_location = self.store.save(name, &artifact)?;
        log::info!(
            "train `{name}` done, saved to `{artifact_location}`, elapsed: {:.4?}",
            start.elapsed()
        );
        Ok(TrainReport {
            target,
            metrics,
            artifact_location,
        })
    }

    /// Stops at the first failing target.
    pub fn train_all(&self) -> RecResult<Vec<TrainReport>> {
        Target::ALL.iter().map(|&t| self.train(t)).collect()
    }
}
