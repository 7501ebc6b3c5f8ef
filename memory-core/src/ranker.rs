//! Composite retrieval ranking: `score = w_s·similarity + w_i·importance + w_d·decay`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::embeddings::cosine_similarity;
use crate::model::Message;

/// One week, in seconds; the decay function's half-life.
const DECAY_HALF_LIFE_SECONDS: f64 = 7.0 * 86_400.0;

/// Weights applied to similarity, importance and decay. Renormalised to sum
/// to 1 on construction so callers can pass arbitrary proportions.
#[derive(Debug, Clone, Copy)]
pub struct RankerWeights {
    pub similarity: f64,
    pub importance: f64,
    pub decay: f64,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self {
            similarity: 0.6,
            importance: 0.3,
            decay: 0.1,
        }
    }
}

impl RankerWeights {
    #[must_use]
    pub fn normalized(self) -> Self {
        let total = self.similarity + self.importance + self.decay;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            similarity: self.similarity / total,
            importance: self.importance / total,
            decay: self.decay / total,
        }
    }
}

/// A single scored candidate, as returned to callers of [`rank`].
#[derive(Debug, Clone)]
pub struct RankedMessage {
    pub message: Message,
    pub score: f64,
    pub similarity: f32,
    pub decay: f64,
}

/// Exponential recency decay: `exp(-age_seconds / half_life)`, bounded in
/// `(0, 1]`.
#[must_use]
pub fn decay(age_seconds: f64) -> f64 {
    (-age_seconds.max(0.0) / DECAY_HALF_LIFE_SECONDS).exp()
}

/// Score and sort `candidates` against `query_vec`, returning the top
/// `top_k` by score descending, tie-broken by `created_at` descending then
/// `id` ascending.
///
/// Candidates without an embedding are silently skipped: the contract is
/// that callers only pass messages with `embedding_status=completed`, but a
/// defensive skip here keeps the ranker correct even if that invariant is
/// violated upstream.
#[must_use]
pub fn rank(
    query_vec: &[f32],
    candidates: impl IntoIterator<Item = Message>,
    top_k: usize,
    weights: RankerWeights,
    now: DateTime<Utc>,
) -> Vec<RankedMessage> {
    let weights = weights.normalized();

    let mut scored: Vec<RankedMessage> = candidates
        .into_iter()
        .filter_map(|message| {
            let embedding = message.embedding.as_ref()?;
            let similarity = cosine_similarity(query_vec, embedding);
            let age_seconds = message.age_seconds(now);
            let decay_value = decay(age_seconds);
            let importance = message.importance_score.unwrap_or(0.0) as f64;

            let score = weights.similarity * similarity as f64
                + weights.importance * importance
                + weights.decay * decay_value;

            Some(RankedMessage {
                message,
                score,
                similarity,
                decay: decay_value,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.message.created_at.cmp(&a.message.created_at))
            .then_with(|| tie_break_id(&a.message.id, &b.message.id))
    });

    scored.truncate(top_k);
    scored
}

fn tie_break_id(a: &Uuid, b: &Uuid) -> std::cmp::Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmbeddingStatus, Metadata, Role};

    fn message(id: Uuid, importance: f32, age_days: i64, embedding: Vec<f32>) -> Message {
        let now = Utc::now();
        Message {
            id,
            tenant_id: "t1".into(),
            conversation_id: "c1".into(),
            role: Role::User,
            content: "hello".into(),
            metadata: Metadata::empty(),
            importance_score: Some(importance),
            embedding: Some(embedding),
            embedding_status: EmbeddingStatus::Completed,
            created_at: now - chrono::Duration::days(age_days),
            updated_at: now,
            archived: false,
        }
    }

    #[test]
    fn decay_is_bounded_and_monotonic() {
        assert_eq!(decay(0.0), 1.0);
        assert!(decay(86_400.0) < decay(0.0));
        assert!(decay(86_400.0) > 0.0);
    }

    #[test]
    fn ranks_by_score_descending_with_deterministic_tiebreak() {
        let now = Utc::now();
        let a = message(Uuid::from_u128(1), 0.9, 0, vec![1.0, 0.0]);
        let b = message(Uuid::from_u128(2), 0.1, 0, vec![1.0, 0.0]);

        let ranked = rank(&[1.0, 0.0], vec![a.clone(), b.clone()], 2, RankerWeights::default(), now);
        assert_eq!(ranked[0].message.id, a.id);
        assert_eq!(ranked[1].message.id, b.id);
    }

    #[test]
    fn truncates_to_top_k() {
        let now = Utc::now();
        let candidates: Vec<Message> = (0..5)
            .map(|i| message(Uuid::from_u128(i), 0.5, 0, vec![1.0, 0.0]))
            .collect();
        let ranked = rank(&[1.0, 0.0], candidates, 2, RankerWeights::default(), now);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn skips_candidates_without_embedding() {
        let now = Utc::now();
        let mut no_embedding = message(Uuid::from_u128(1), 0.5, 0, vec![1.0]);
        no_embedding.embedding = None;
        let ranked = rank(&[1.0], vec![no_embedding], 5, RankerWeights::default(), now);
        assert!(ranked.is_empty());
    }
}
