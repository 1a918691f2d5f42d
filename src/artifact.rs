use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::als::{FactorMatrix, Factors};
use crate::common::ItemId;
use crate::errors::{RecError, RecResult};
use crate::sparse::{IdIndex, InteractionMatrix};

/// Trained bundle for one target. `user_factors` row `i` belongs to user index `i`,
/// `item_factors` row `j` to item index `j`. Deserialization goes through the same
/// shape checks as [`ModelArtifact::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArtifact")]
pub struct ModelArtifact {
    pub name: String,
    pub users: IdIndex<String>,
    pub items: IdIndex<ItemId>,
    pub user_factors: FactorMatrix,
    pub item_factors: FactorMatrix,
    pub titles: FxHashMap<ItemId, String>,
}

/// Wire form of [`ModelArtifact`], same field order.
#[derive(Deserialize)]
struct RawArtifact {
    name: String,
    users: IdIndex<String>,
    items: IdIndex<ItemId>,
    user_factors: FactorMatrix,
    item_factors: FactorMatrix,
    titles: FxHashMap<ItemId, String>,
}

impl TryFrom<RawArtifact> for ModelArtifact {
    type Error = RecError;

    fn try_from(raw: RawArtifact) -> RecResult<Self> {
        let factors = Factors {
            user_factors: raw.user_factors,
            item_factors: raw.item_factors,
        };
        ModelArtifact::new(raw.name, raw.users, raw.items, factors, raw.titles)
    }
}

fn check_matrix(side: &str, m: &FactorMatrix) -> RecResult<()> {
    if m.n_cols == 0 {
        return Err(RecError::InvalidParam(format!(
            "{side} factors have zero columns"
        )));
    }
    match m.n_rows.checked_mul(m.n_cols) {
        Some(len) if len == m.data.len() => Ok(()),
        _ => Err(RecError::InvalidParam(format!(
            "{side} factors are {} x {} but hold {} values",
            m.n_rows,
            m.n_cols,
            m.data.len()
        ))),
    }
}

impl ModelArtifact {
    pub fn new(
        name: impl Into<String>,
        users: IdIndex<String>,
        items: IdIndex<ItemId>,
        factors: Factors,
        titles: FxHashMap<ItemId, String>,
    ) -> RecResult<Self> {
        let Factors {
            user_factors,
            item_factors,
        } = factors;
        check_matrix("user", &user_factors)?;
        check_matrix("item", &item_factors)?;
        if users.len() != user_factors.n_rows {
            return Err(RecError::InvalidParam(format!(
                "{} users but {} user factor rows",
                users.len(),
                user_factors.n_rows
            )));
        }
        if items.len() != item_factors.n_rows {
            return Err(RecError::InvalidParam(format!(
                "{} items but {} item factor rows",
                items.len(),
                item_factors.n_rows
            )));
        }
        if user_factors.n_cols != item_factors.n_cols {
            return Err(RecError::InvalidParam(format!(
                "factor dimensions differ, user {} vs item {}",
                user_factors.n_cols, item_factors.n_cols
            )));
        }
        Ok(Self {
            name: name.into(),
            users,
            items,
            user_factors,
            item_factors,
            titles,
        })
    }

    /// Keeps only the titles of items in the trained catalog.
    pub fn from_training(
        name: impl Into<String>,
        matrix: InteractionMatrix,
        factors: Factors,
        mut titles: FxHashMap<ItemId, String>,
    ) -> RecResult<Self> {
        titles.retain(|id, _| matrix.items.index_of(id).is_some());
        Self::new(name, matrix.users, matrix.items, factors, titles)
    }

    #[inline]
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    #[inline]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    pub fn title_of(&self, item: &ItemId) -> String {
        self.titles
            .get(item)
            .cloned()
            .unwrap_or_else(|| item.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_artifact() -> RecResult<ModelArtifact> {
        let users = IdIndex::from_ids(vec![String::from("u1")]);
        let items = IdIndex::from_ids(vec![ItemId::Int(5), ItemId::Int(9)]);
        let factors = Factors {
            user_factors: FactorMatrix::zeros(1, 2),
            item_factors: FactorMatrix::zeros(2, 2),
        };
        let mut titles = FxHashMap::default();
        titles.insert(ItemId::Int(5), String::from("Burger Barn"));
        ModelArtifact::new("restaurants", users, items, factors, titles)
    }

    #[test]
    fn test_title_fallback() -> RecResult<()> {
        let artifact = tiny_artifact()?;
        assert_eq!(artifact.title_of(&ItemId::Int(5)), "Burger Barn");
        assert_eq!(artifact.title_of(&ItemId::Int(9)), "9");
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() {
        let users = IdIndex::from_ids(vec![String::from("u1"), String::from("u2")]);
        let items = IdIndex::from_ids(vec![ItemId::Int(1)]);
        let factors = Factors {
            user_factors: FactorMatrix::zeros(1, 2),
            item_factors: FactorMatrix::zeros(1, 2),
        };
        let res = ModelArtifact::new("dishes", users, items, factors, FxHashMap::default());
        assert!(matches!(res, Err(RecError::InvalidParam(_))));
    }

    #[test]
    fn test_factor_data_length() {
        let users = IdIndex::from_ids(vec![String::from("u1")]);
        let items = IdIndex::from_ids(vec![ItemId::Int(1)]);
        let short = Factors {
            user_factors: FactorMatrix {
                n_rows: 1,
                n_cols: 2,
                data: vec![1.0],
            },
            item_factors: FactorMatrix::zeros(1, 2),
        };
        let res = ModelArtifact::new("dishes", users.clone(), items.clone(), short, FxHashMap::default());
        assert!(matches!(res, Err(RecError::InvalidParam(_))));

        let empty = Factors {
            user_factors: FactorMatrix::zeros(1, 0),
            item_factors: FactorMatrix::zeros(1, 0),
        };
        let res = ModelArtifact::new("dishes", users, items, empty, FxHashMap::default());
        assert!(matches!(res, Err(RecError::InvalidParam(_))));
    }

    #[test]
    fn test_deserialize_checks_shape() -> RecResult<()> {
        let artifact = tiny_artifact()?;
        let bytes = bincode::serialize(&artifact)?;
        let decoded: ModelArtifact = bincode::deserialize(&bytes)?;
        assert_eq!(decoded, artifact);

        let mut broken = artifact;
        broken.item_factors.data.pop();
        let bytes = bincode::serialize(&broken)?;
        assert!(bincode::deserialize::<ModelArtifact>(&bytes).is_err());
        Ok(())
    }

    #[test]
    fn test_rows_match_indices() -> RecResult<()> {
        let artifact = tiny_artifact()?;
        assert_eq!(artifact.items.ids().len(), artifact.item_factors.n_rows);
        assert_eq!(artifact.users.ids().len(), artifact.user_factors.n_rows);
        Ok(())
    }
}
