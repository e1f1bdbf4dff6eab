use crate::error::{EngineError, Result};
use crate::models::{EmotionTag, ItemId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const EMOTION_WIDTH: usize = EmotionTag::ALL.len();

/// Row of `item_popularity.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPopularity {
    pub item: ItemId,
    pub count: u64,
    #[serde(alias = "rank")]
    pub rank_popular: u64,
    #[serde(default)]
    pub rank_quality: u64,
}

/// Row of `averaged_item_score.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemBaselineScore {
    pub item: ItemId,
    pub ave_score: f64,
    pub ave_discounted_score: f64,
}

/// Row of `user_index_map.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdMapRow {
    pub internal_id: usize,
    pub user_id: UserId,
}

/// Bidirectional mapping between ANN row numbers and external user ids.
#[derive(Debug, Clone, Default)]
pub struct UserIdMap {
    internal_to_external: Vec<UserId>,
    external_to_internal: HashMap<UserId, usize>,
}

impl UserIdMap {
    pub fn from_rows(mut rows: Vec<UserIdMapRow>) -> Result<Self> {
        rows.sort_by_key(|r| r.internal_id);
        let mut map = Self::default();
        for (expected, row) in rows.into_iter().enumerate() {
            if row.internal_id != expected {
                return Err(EngineError::ModelLoad(format!(
                    "user index map is not dense: expected id {}, found {}",
                    expected, row.internal_id
                )));
            }
            map.external_to_internal
                .insert(row.user_id.clone(), row.internal_id);
            map.internal_to_external.push(row.user_id);
        }
        Ok(map)
    }

    pub fn from_user_ids(user_ids: &[UserId]) -> Self {
        Self {
            internal_to_external: user_ids.to_vec(),
            external_to_internal: user_ids
                .iter()
                .enumerate()
                .map(|(i, u)| (u.clone(), i))
                .collect(),
        }
    }

    pub fn to_rows(&self) -> Vec<UserIdMapRow> {
        self.internal_to_external
            .iter()
            .enumerate()
            .map(|(internal_id, user_id)| UserIdMapRow {
                internal_id,
                user_id: user_id.clone(),
            })
            .collect()
    }

    pub fn external(&self, internal_id: usize) -> Option<&UserId> {
        self.internal_to_external.get(internal_id)
    }

    pub fn internal(&self, user_id: &str) -> Option<usize> {
        self.external_to_internal.get(user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.internal_to_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal_to_external.is_empty()
    }
}

/// Columnar on-disk layout of the rating history. User `i` owns
/// `items[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryColumns {
    pub users: Vec<UserId>,
    pub offsets: Vec<u64>,
    pub items: Vec<ItemId>,
    pub ratings: Vec<f64>,
}

/// Observed ratings of the training population, grouped by user.
#[derive(Debug, Clone, Default)]
pub struct UserHistory {
    by_user: HashMap<UserId, Vec<(ItemId, f64)>>,
}

impl UserHistory {
    pub fn from_columns(columns: HistoryColumns) -> Result<Self> {
        let HistoryColumns {
            users,
            offsets,
            items,
            ratings,
        } = columns;

        if offsets.len() != users.len() + 1 || items.len() != ratings.len() {
            return Err(EngineError::ModelLoad(format!(
                "history columns inconsistent: {} users, {} offsets, {} items, {} ratings",
                users.len(),
                offsets.len(),
                items.len(),
                ratings.len()
            )));
        }

        let mut by_user = HashMap::with_capacity(users.len());
        for (i, user) in users.into_iter().enumerate() {
            let (start, end) = (offsets[i] as usize, offsets[i + 1] as usize);
            if start > end || end > items.len() {
                return Err(EngineError::ModelLoad(format!(
                    "history offsets out of range for user {}",
                    user
                )));
            }
            let rows = items[start..end]
                .iter()
                .copied()
                .zip(ratings[start..end].iter().copied())
                .collect();
            by_user.insert(user, rows);
        }

        Ok(Self { by_user })
    }

    pub fn from_ratings(rows: impl IntoIterator<Item = (UserId, ItemId, f64)>) -> Self {
        let mut by_user: HashMap<UserId, Vec<(ItemId, f64)>> = HashMap::new();
        for (user, item, rating) in rows {
            by_user.entry(user).or_default().push((item, rating));
        }
        Self { by_user }
    }

    pub fn to_columns(&self) -> HistoryColumns {
        let mut users: Vec<&UserId> = self.by_user.keys().collect();
        users.sort();

        let mut columns = HistoryColumns {
            offsets: vec![0],
            ..Default::default()
        };
        for user in users {
            for &(item, rating) in &self.by_user[user] {
                columns.items.push(item);
                columns.ratings.push(rating);
            }
            columns.users.push(user.clone());
            columns.offsets.push(columns.items.len() as u64);
        }
        columns
    }

    pub fn ratings_of(&self, user_id: &str) -> &[(ItemId, f64)] {
        self.by_user.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rating(&self, user_id: &str, item_id: ItemId) -> Option<f64> {
        self.ratings_of(user_id)
            .iter()
            .find(|(item, _)| *item == item_id)
            .map(|(_, rating)| *rating)
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}

/// Columnar on-disk layout of item emotion vectors, row-major.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionColumns {
    pub items: Vec<ItemId>,
    pub values: Vec<f64>,
}

/// Eight-dimensional emotion signature per item, in `EmotionTag::ALL` order.
#[derive(Debug, Clone, Default)]
pub struct ItemEmotions {
    by_item: HashMap<ItemId, [f64; EMOTION_WIDTH]>,
}

impl ItemEmotions {
    pub fn from_columns(columns: EmotionColumns) -> Result<Self> {
        if columns.values.len() != columns.items.len() * EMOTION_WIDTH {
            return Err(EngineError::ModelLoad(format!(
                "{} emotion values for {} items",
                columns.values.len(),
                columns.items.len()
            )));
        }

        let by_item = columns
            .items
            .iter()
            .zip(columns.values.chunks_exact(EMOTION_WIDTH))
            .map(|(&item, chunk)| {
                let mut row = [0.0; EMOTION_WIDTH];
                row.copy_from_slice(chunk);
                (item, row)
            })
            .collect();

        Ok(Self { by_item })
    }

    pub fn from_rows(rows: impl IntoIterator<Item = (ItemId, [f64; EMOTION_WIDTH])>) -> Self {
        Self {
            by_item: rows.into_iter().collect(),
        }
    }

    pub fn to_columns(&self) -> EmotionColumns {
        let mut items: Vec<ItemId> = self.by_item.keys().copied().collect();
        items.sort_unstable();
        let values = items
            .iter()
            .flat_map(|item| self.by_item[item].iter().copied())
            .collect();
        EmotionColumns { items, values }
    }

    pub fn get(&self, item_id: ItemId) -> Option<&[f64; EMOTION_WIDTH]> {
        self.by_item.get(&item_id)
    }

    pub fn len(&self) -> usize {
        self.by_item.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_item.is_empty()
    }
}
