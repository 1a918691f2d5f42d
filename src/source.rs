use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::common::{HeldOut, Interaction, ItemId, PopularItem, Target};
use crate::errors::RecResult;

/// Relational queries the trainer and the recommender depend on.
pub trait InteractionSource: Send + Sync {
    /// Aggregated (user, item, weight) rows of the training partition.
    fn training_interactions(&self, target: Target) -> RecResult<Vec<Interaction>>;

    /// Items of each user's most recent order.
    fn held_out(&self, target: Target) -> RecResult<Vec<HeldOut>>;

    fn user_has_history(&self, user_id: &str) -> RecResult<bool>;

    /// Every item the user has ever ordered for `target`.
    fn user_items(&self, target: Target, user_id: &str) -> RecResult<Vec<ItemId>>;

    fn titles(&self, target: Target) -> RecResult<FxHashMap<ItemId, String>>;

    /// Most popular items over all orders, highest score first.
    fn popular(&self, target: Target, k: usize) -> RecResult<Vec<PopularItem>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub restaurant_id: i64,
    pub restaurant_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub dish_id: String,
    pub dish_name: String,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub customer_id: String,
    pub restaurant_id: i64,
    /// unix seconds
    pub placed_at: i64,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

/// Stable dish id: sha1 hex of `"{restaurant_id}|{dish_name}"`.
pub fn dish_id_for(restaurant_id: i64, dish_name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{restaurant_id}|{dish_name}").as_bytes());
    hex::encode(hasher.finalize())
}

/// In-memory order history with a last-order-per-customer holdout split. The
/// split is recomputed whenever a log is built or deserialized, and the orders
/// are read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawOrderLog")]
pub struct OrderLog {
    restaurants: Vec<Restaurant>,
    orders: Vec<Order>,
    #[serde(skip)]
    held_out_orders: FxHashSet<i64>,
}

#[derive(Deserialize)]
struct RawOrderLog {
    #[serde(default)]
    restaurants: Vec<Restaurant>,
    #[serde(default)]
    orders: Vec<Order>,
}

impl From<RawOrderLog> for OrderLog {
    fn from(raw: RawOrderLog) -> Self {
        OrderLog::new(raw.restaurants, raw.orders)
    }
}

impl OrderLog {
    pub fn new(restaurants: Vec<Restaurant>, orders: Vec<Order>) -> Self {
        let mut log = Self {
            restaurants,
            orders,
            held_out_orders: FxHashSet::default(),
        };
        log.split();
        log
    }

    pub fn from_json(json: &str) -> RecResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Marks the greatest `(placed_at, order_id)` order of each customer as held out.
    fn split(&mut self) {
        let mut latest: FxHashMap<&str, (i64, i64)> = FxHashMap::default();
        for o in &self.orders {
            let key = (o.placed_at, o.order_id);
            latest
                .entry(o.customer_id.as_str())
                .and_modify(|k| {
                    if key > *k {
                        *k = key
                    }
                })
                .or_insert(key);
        }
        self.held_out_orders = latest.into_values().map(|(_, order_id)| order_id).collect();
    }

    pub fn is_held_out(&self, order: &Order) -> bool {
        self.held_out_orders.contains(&order.order_id)
    }

    /// (item, weight) pairs contributed by one order.
    fn order_items(target: Target, order: &Order) -> Vec<(ItemId, f32)> {
        match target {
            Target::Restaurants => vec![(ItemId::Int(order.restaurant_id), 1.0)],
            Target::Dishes => order
                .items
                .iter()
                .map(|line| (ItemId::Str(line.dish_id.clone()), line.qty as f32))
                .collect(),
        }
    }
}

impl InteractionSource for OrderLog {
    fn training_interactions(&self, target: Target) -> RecResult<Vec<Interaction>> {
        let mut weights: FxHashMap<(&str, ItemId), f32> = FxHashMap::default();
        for order in self.orders.iter().filter(|o| !self.is_held_out(o)) {
            for (item, w) in Self::order_items(target, order) {
                *weights
                    .entry((order.customer_id.as_str(), item))
                    .or_insert(0.0) += w;
            }
        }
        let mut rows: Vec<Interaction> = weights
            .into_iter()
            .map(|((user, item), weight)| Interaction::new(user, item, weight))
            .collect();
        rows.sort_unstable_by(|a, b| (&a.user_id, &a.item_id).cmp(&(&b.user_id, &b.item_id)));
        Ok(rows)
    }

    fn held_out(&self, target: Target) -> RecResult<Vec<HeldOut>> {
        let mut pairs: FxHashSet<HeldOut> = FxHashSet::default();
        for order in self.orders.iter().filter(|o| self.is_held_out(o)) {
            for (item_id, _) in Self::order_items(target, order) {
                pairs.insert(HeldOut {
                    user_id: order.customer_id.clone(),
                    item_id,
                });
            }
        }
        Ok(pairs.into_iter().collect())
    }

    fn user_has_history(&self, user_id: &str) -> RecResult<bool> {
        Ok(self.orders.iter().any(|o| o.customer_id == user_id))
    }

    fn user_items(&self, target: Target, user_id: &str) -> RecResult<Vec<ItemId>> {
        let mut items: Vec<ItemId> = self
            .orders
            .iter()
            .filter(|o| o.customer_id == user_id)
            .flat_map(|o| Self::order_items(target, o).into_iter().map(|(i, _)| i))
            .collect();
        items.sort_unstable();
        items.dedup();
        Ok(items)
    }

    fn titles(&self, target: Target) -> RecResult<FxHashMap<ItemId, String>> {
        let titles = match target {
            Target::Restaurants => self
                .restaurants
                .iter()
                .map(|r| (ItemId::Int(r.restaurant_id), r.restaurant_name.clone()))
                .collect(),
            Target::Dishes => self
                .orders
                .iter()
                .flat_map(|o| o.items.iter())
                .map(|line| (ItemId::Str(line.dish_id.clone()), line.dish_name.clone()))
                .collect(),
        };
        Ok(titles)
    }

    fn popular(&self, target: Target, k: usize) -> RecResult<Vec<PopularItem>> {
        let mut scores: FxHashMap<ItemId, f32> = FxHashMap::default();
        for order in &self.orders {
            for (item, w) in Self::order_items(target, order) {
                *scores.entry(item).or_insert(0.0) += w;
            }
        }
        let titles = self.titles(target)?;
        let mut ranked: Vec<(ItemId, f32)> = scores.into_iter().collect();
        ranked.sort_unstable_by(|(ia, a), (ib, b)| b.total_cmp(a).then_with(|| ia.cmp(ib)));
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(id, score)| {
                let title = titles.get(&id).cloned().unwrap_or_else(|| id.to_string());
                PopularItem { id, title, score }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(restaurant_id: i64, name: &str, qty: u32) -> OrderLine {
        OrderLine {
            dish_id: dish_id_for(restaurant_id, name),
            dish_name: name.to_string(),
            qty,
        }
    }

    fn sample_log() -> OrderLog {
        let restaurants = vec![
            Restaurant {
                restaurant_id: 1,
                restaurant_name: String::from("Biryani Point"),
            },
            Restaurant {
                restaurant_id: 2,
                restaurant_name: String::from("Pasta Corner"),
            },
        ];
        let order = |order_id, customer: &str, restaurant_id, placed_at, items| Order {
            order_id,
            customer_id: customer.to_string(),
            restaurant_id,
            placed_at,
            items,
        };
        let orders = vec![
            order(1, "c1", 1, 100, vec![line(1, "Biryani", 2)]),
            order(2, "c1", 1, 200, vec![line(1, "Biryani", 1), line(1, "Raita", 1)]),
            order(3, "c1", 2, 300, vec![line(2, "Penne", 1)]),
            order(4, "c2", 1, 150, vec![line(1, "Raita", 3)]),
            // same timestamp, larger order id wins
            order(5, "c2", 2, 150, vec![line(2, "Penne", 2)]),
        ];
        OrderLog::new(restaurants, orders)
    }

    #[test]
    fn test_dish_id_is_stable_sha1() {
        let id = dish_id_for(1, "Biryani");
        assert_eq!(id.len(), 40);
        assert_eq!(id, dish_id_for(1, "Biryani"));
        assert_ne!(id, dish_id_for(2, "Biryani"));
    }

    #[test]
    fn test_last_order_is_held_out() -> RecResult<()> {
        let log = sample_log();
        let held: Vec<i64> = log
            .orders
            .iter()
            .filter(|o| log.is_held_out(o))
            .map(|o| o.order_id)
            .collect();
        assert_eq!(held, vec![3, 5]);

        let mut pairs = log.held_out(Target::Restaurants)?;
        pairs.sort_unstable_by(|a, b| a.user_id.cmp(&b.user_id));
        assert_eq!(
            pairs,
            vec![
                HeldOut {
                    user_id: String::from("c1"),
                    item_id: ItemId::Int(2)
                },
                HeldOut {
                    user_id: String::from("c2"),
                    item_id: ItemId::Int(2)
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_training_interactions() -> RecResult<()> {
        let log = sample_log();
        let rows = log.training_interactions(Target::Restaurants)?;
        assert_eq!(
            rows,
            vec![
                Interaction::new("c1", 1i64, 2.0),
                Interaction::new("c2", 1i64, 1.0),
            ]
        );
        let dishes = log.training_interactions(Target::Dishes)?;
        let biryani = ItemId::Str(dish_id_for(1, "Biryani"));
        let c1_biryani = dishes
            .iter()
            .find(|r| r.user_id == "c1" && r.item_id == biryani)
            .map(|r| r.weight);
        assert_eq!(c1_biryani, Some(3.0));
        assert_eq!(dishes.len(), 3);
        Ok(())
    }

    #[test]
    fn test_popular_and_history() -> RecResult<()> {
        let log = sample_log();
        let popular = log.popular(Target::Restaurants, 10)?;
        let ranked: Vec<(String, f32)> = popular
            .iter()
            .map(|p| (p.title.clone(), p.score))
            .collect();
        assert_eq!(
            ranked,
            vec![
                (String::from("Biryani Point"), 3.0),
                (String::from("Pasta Corner"), 2.0)
            ]
        );
        let dishes = log.popular(Target::Dishes, 1)?;
        assert_eq!(dishes.len(), 1);
        assert_eq!(dishes[0].title, "Raita");
        assert_eq!(dishes[0].score, 4.0);

        assert!(log.user_has_history("c1")?);
        assert!(!log.user_has_history("c3")?);
        assert_eq!(
            log.user_items(Target::Restaurants, "c1")?,
            vec![ItemId::Int(1), ItemId::Int(2)]
        );
        Ok(())
    }

    #[test]
    fn test_from_json() -> RecResult<()> {
        let json = r#"{
            "restaurants": [{"restaurant_id": 7, "restaurant_name": "Dosa Hut"}],
            "orders": [
                {"order_id": 1, "customer_id": "c1", "restaurant_id": 7, "placed_at": 10},
                {"order_id": 2, "customer_id": "c1", "restaurant_id": 7, "placed_at": 20}
            ]
        }"#;
        let log = OrderLog::from_json(json)?;
        assert_eq!(log.training_interactions(Target::Restaurants)?.len(), 1);
        assert_eq!(log.held_out(Target::Restaurants)?.len(), 1);
        assert!(log.training_interactions(Target::Dishes)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_deserialize_runs_split() -> RecResult<()> {
        let json = r#"{
            "orders": [
                {"order_id": 1, "customer_id": "c1", "restaurant_id": 7, "placed_at": 10},
                {"order_id": 2, "customer_id": "c1", "restaurant_id": 8, "placed_at": 20}
            ]
        }"#;
        let log: OrderLog = serde_json::from_str(json)?;
        assert_eq!(
            log.training_interactions(Target::Restaurants)?,
            vec![Interaction::new("c1", 7i64, 1.0)]
        );
        assert_eq!(log.held_out(Target::Restaurants)?.len(), 1);

        let again: OrderLog = serde_json::from_str(&serde_json::to_string(&log)?)?;
        assert_eq!(again.orders(), log.orders());
        assert_eq!(again.held_out(Target::Restaurants)?, log.held_out(Target::Restaurants)?);
        Ok(())
    }
}
