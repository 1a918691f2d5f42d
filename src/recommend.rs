use std::sync::Arc;

use fxhash::FxHashSet;

use crate::artifact::ModelArtifact;
use crate::common::{Mode, Recommendation, RecommendationItem, Target};
use crate::errors::{RecError, RecResult};
use crate::scorer::recommend_user;
use crate::source::InteractionSource;
use crate::store::ArtifactStore;

pub const MIN_K: usize = 1;
pub const MAX_K: usize = 100;

/// Per-request policy: personalized scores when the user is known to the trained
/// model, popularity ranking otherwise.
pub struct Recommender {
    source: Arc<dyn InteractionSource>,
    store: Arc<dyn ArtifactStore>,
    exclude_consumed: bool,
}

impl Recommender {
    pub fn new(
        source: Arc<dyn InteractionSource>,
        store: Arc<dyn ArtifactStore>,
        exclude_consumed: bool,
    ) -> Self {
        Self {
            source,
            store,
            exclude_consumed,
        }
    }

    pub fn recommend(
        &self,
        target: Target,
        user_id: Option<&str>,
        k: usize,
    ) -> RecResult<Recommendation> {
        if !(MIN_K..=MAX_K).contains(&k) {
            return Err(RecError::InvalidParam(format!(
                "k must be in [{MIN_K}, {MAX_K}], got {k}"
            )));
        }
        let user = match user_id {
            Some(u) if !u.is_empty() => u,
            _ => return self.popular(target, None, k),
        };
        if !self.source.user_has_history(user)? {
            return self.popular(target, user_id, k);
        }
        match self.personalized(target, user, k) {
            Ok(items) if !items.is_empty() => {
                log::info!("recommend {k} {target} for user {user}, personalized");
                Ok(Recommendation {
                    mode: Mode::Personalized,
                    user_id: Some(user.to_string()),
                    items,
                })
            }
            Ok(_) => self.popular(target, user_id, k),
            Err(e) if e.is_recoverable() => {
                log::debug!("fall back to popular {target} for user {user}: {e}");
                self.popular(target, user_id, k)
            }
            Err(e) => Err(e),
        }
    }

    fn personalized(
        &self,
        target: Target,
        user: &str,
        k: usize,
    ) -> RecResult<Vec<RecommendationItem>> {
        let artifact = self
            .store
            .load(target.name())?
            .ok_or_else(|| RecError::MissingArtifact(target.name().to_string()))?;
        let exclude = if self.exclude_consumed {
            Some(self.consumed_indices(&artifact, target, user)?)
        } else {
            None
        };
        let recs = recommend_user(&artifact, user, k, exclude.as_ref())
            .ok_or_else(|| RecError::ColdUser(user.to_string()))?;
        Ok(recs
            .into_iter()
            .map(|r| RecommendationItem {
                id: r.id.to_string(),
                title: artifact.title_of(&r.id),
                score: r.score,
            })
            .collect())
    }

    fn consumed_indices(
        &self,
        artifact: &ModelArtifact,
        target: Target,
        user: &str,
    ) -> RecResult<FxHashSet<usize>> {
        Ok(self
            .source
            .user_items(target, user)?
            .iter()
            .filter_map(|i| artifact.items.index_of(i))
            .collect())
    }

    fn popular(&self, target: Target, user_id: Option<&str>, k: usize) -> RecResult<Recommendation> {
        let items = self
            .source
            .popular(target, k)?
            .into_iter()
            .take(k)
            .map(RecommendationItem::from)
            .collect();
        log::info!("recommend {k} {target}, popular");
        Ok(Recommendation {
            mode: Mode::Popular,
            user_id: user_id.map(str::to_string),
            items,
        })
    }
}
