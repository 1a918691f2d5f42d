use std::path::Path;
use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use pyo3::prelude::*;

use crate::als::{fit, AlsParams};
use crate::artifact::ModelArtifact;
use crate::common::{HeldOut, Interaction, ItemId};
use crate::errors::RecError;
use crate::evaluate::{evaluate as evaluate_artifact, group_held_out};
use crate::scorer::recommend_user;
use crate::serialization::{load_model, save_model};
use crate::sparse::InteractionMatrix;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[pyclass(module = "foodrec", name = "Model", frozen)]
pub struct PyModel {
    artifact: Arc<ModelArtifact>,
}

#[pymethods]
impl PyModel {
    #[getter]
    fn name(&self) -> String {
        self.artifact.name.clone()
    }

    #[getter]
    fn n_users(&self) -> usize {
        self.artifact.n_users()
    }

    #[getter]
    fn n_items(&self) -> usize {
        self.artifact.n_items()
    }

    /// `None` for users unknown to the model, else `(id, title, score)` best first.
    #[pyo3(signature = (user_id, k, exclude = None))]
    fn recommend(
        &self,
        user_id: &str,
        k: usize,
        exclude: Option<Vec<String>>,
    ) -> Option<Vec<(String, String, f32)>> {
        let exclude: Option<FxHashSet<usize>> = exclude.map(|ids| {
            ids.iter()
                .filter_map(|i| self.artifact.items.index_of(&ItemId::parse(i)))
                .collect()
        });
        let recs = recommend_user(&self.artifact, user_id, k, exclude.as_ref())?;
        Some(
            recs.into_iter()
                .map(|r| (r.id.to_string(), self.artifact.title_of(&r.id), r.score))
                .collect(),
        )
    }
}

fn zip_interactions(
    users: Vec<String>,
    items: Vec<String>,
    weights: Vec<f32>,
) -> Result<Vec<Interaction>, RecError> {
    if users.len() != items.len() || users.len() != weights.len() {
        return Err(RecError::InvalidParam(format!(
            "users, items and weights differ in length: {}, {}, {}",
            users.len(),
            items.len(),
            weights.len()
        )));
    }
    Ok(users
        .into_iter()
        .zip(items)
        .zip(weights)
        .map(|((u, i), w)| Interaction::new(u, ItemId::parse(&i), w))
        .collect())
}

/// Fit a model from parallel `users`, `items`, `weights` lists.
#[pyfunction]
#[pyo3(signature = (
    name, users, items, weights, titles = None,
    factors = 64, regularization = 0.01, iterations = 20, random_seed = 42, alpha = 1.0
))]
fn train(
    py: Python<'_>,
    name: &str,
    users: Vec<String>,
    items: Vec<String>,
    weights: Vec<f32>,
    titles: Option<FxHashMap<String, String>>,
    factors: usize,
    regularization: f32,
    iterations: usize,
    random_seed: u64,
    alpha: f32,
) -> PyResult<PyModel> {
    let params = AlsParams {
        factors,
        regularization,
        iterations,
        random_seed,
        alpha,
    };
    let records = zip_interactions(users, items, weights)?;
    let titles: FxHashMap<ItemId, String> = titles
        .unwrap_or_default()
        .into_iter()
        .map(|(id, title)| (ItemId::parse(&id), title))
        .collect();
    let name = name.to_string();
    let artifact = py.allow_threads(move || -> Result<ModelArtifact, RecError> {
        let matrix = InteractionMatrix::build(&records)?;
        let factors = fit(&matrix, &params)?;
        ModelArtifact::from_training(name, matrix, factors, titles)
    })?;
    Ok(PyModel {
        artifact: Arc::new(artifact),
    })
}

/// Mean (recall@k, ndcg@k) over held-out `(user, item)` pairs.
#[pyfunction]
#[pyo3(signature = (model, users, items, k = 5))]
fn evaluate(
    model: &PyModel,
    users: Vec<String>,
    items: Vec<String>,
    k: usize,
) -> PyResult<(f64, f64)> {
    if users.len() != items.len() {
        return Err(RecError::InvalidParam(String::from("users and items differ in length")).into());
    }
    let pairs: Vec<HeldOut> = users
        .into_iter()
        .zip(items)
        .map(|(user_id, i)| HeldOut {
            user_id,
            item_id: ItemId::parse(&i),
        })
        .collect();
    let metrics = evaluate_artifact(&model.artifact, &group_held_out(&pairs), k);
    Ok((metrics.recall, metrics.ndcg))
}

#[pyfunction]
fn save(model: &PyModel, path: &str) -> PyResult<String> {
    let saved = save_model(model.artifact.as_ref(), Path::new(path), &model.artifact.name)?;
    Ok(saved.display().to_string())
}

#[pyfunction]
fn load(path: &str, name: &str) -> PyResult<Option<PyModel>> {
    let artifact: Option<ModelArtifact> = load_model(Path::new(path), name)?;
    Ok(artifact.map(|a| PyModel {
        artifact: Arc::new(a),
    }))
}

/// foodrec module
#[pymodule]
fn foodrec(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyModel>()?;
    m.add_function(wrap_pyfunction!(train, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate, m)?)?;
    m.add_function(wrap_pyfunction!(save, m)?)?;
    m.add_function(wrap_pyfunction!(load, m)?)?;
    m.add("__version__", VERSION)?;
    Ok(())
}
