//! Bayesian-surprise event segmentation.
//!
//! A 384-dim semantic term (Gaussian window + EWMA-predicted next
//! embedding), a Jaccard entity term, and a z-scored temporal term,
//! combined 0.60/0.25/0.15. A legacy entropy-reduction variant is kept
//! only as a baseline comparator in tests, never as the default — see
//! [`legacy_entropy_surprise`].

use std::collections::HashSet;

use agtrace_types::{Episode, Event};
use serde::{Deserialize, Serialize};

pub const EMBEDDING_DIM: usize = 384;

/// External semantic embedding collaborator. Segmentation degrades
/// gracefully to an all-zero vector when no real embedder is wired up.
pub trait Embedder {
    fn embed(&self, content: &str) -> Vec<f32>;
}

pub struct NullEmbedder;

impl Embedder for NullEmbedder {
    fn embed(&self, _content: &str) -> Vec<f32> {
        vec![0.0; EMBEDDING_DIM]
    }
}

#[derive(Debug, Clone)]
pub struct EventFeatures {
    pub embedding: Vec<f32>,
    pub entities: HashSet<String>,
    pub temporal_delta: f64,
}

/// Coarse keyword-based entity extraction from an event's content, shared
/// by segmentation's entity term and by community detection's graph build.
pub fn extract_entities(event: &Event) -> HashSet<String> {
    let content = event.content.to_lowercase();
    let mut entities = HashSet::new();
    if content.contains("error") || content.contains("fail") {
        entities.insert("error".to_string());
    }
    if content.contains("success") || content.contains("complete") {
        entities.insert("success".to_string());
    }
    if content.contains("start") || content.contains("begin") {
        entities.insert("start".to_string());
    }
    entities
}

pub fn encode_events(events: &[Event], embedder: &dyn Embedder) -> Vec<EventFeatures> {
    let mut features = Vec::with_capacity(events.len());
    let mut prev_ts: Option<chrono::DateTime<chrono::Utc>> = None;
    for event in events {
        let temporal_delta = match prev_ts {
            Some(prev) => (event.timestamp - prev).num_milliseconds() as f64 / 1000.0,
            None => 0.0,
        };
        features.push(EventFeatures {
            embedding: embedder.embed(&event.content),
            entities: extract_entities(event),
            temporal_delta: temporal_delta.max(0.0),
        });
        prev_ts = Some(event.timestamp);
    }
    features
}

pub struct SurpriseWeights {
    pub semantic: f64,
    pub entity: f64,
    pub temporal: f64,
}

impl Default for SurpriseWeights {
    fn default() -> Self {
        Self {
            semantic: 0.60,
            entity: 0.25,
            temporal: 0.15,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stdev(values: &[f64], avg: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn predict_next_embedding(prior: &[Vec<f32>]) -> Vec<f32> {
    if prior.is_empty() {
        return vec![0.0; EMBEDDING_DIM];
    }
    let dim = prior[0].len();
    let alpha = 0.3_f64;
    let n = prior.len();
    let mut predicted = vec![0.0_f64; dim];
    for (i, emb) in prior.iter().enumerate() {
        let weight = alpha * (1.0 - alpha).powi((n - i - 1) as i32);
        for d in 0..dim {
            predicted[d] += emb[d] as f64 * weight;
        }
    }
    let norm = predicted.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in predicted.iter_mut() {
            *v /= norm;
        }
    }
    predicted.into_iter().map(|v| v as f32).collect()
}

fn kl_embedding(window: &[EventFeatures], current: &EventFeatures) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let dim = current.embedding.len();
    let n = window.len() as f64;

    let mut mean_prior = vec![0.0_f64; dim];
    for f in window {
        for d in 0..dim {
            mean_prior[d] += f.embedding[d] as f64;
        }
    }
    for v in mean_prior.iter_mut() {
        *v /= n;
    }

    let mut sigma_prior = vec![0.0_f64; dim];
    for f in window {
        for d in 0..dim {
            sigma_prior[d] += (f.embedding[d] as f64 - mean_prior[d]).powi(2);
        }
    }
    for v in sigma_prior.iter_mut() {
        *v = (*v / n).sqrt().max(0.001);
    }

    let predicted = predict_next_embedding(&window.iter().map(|f| f.embedding.clone()).collect::<Vec<_>>());

    let mut kl = 0.0_f64;
    for d in 0..dim {
        let diff = current.embedding[d] as f64 - predicted[d] as f64;
        kl += diff * diff / (sigma_prior[d].powi(2) + 1e-8);
    }
    kl / dim as f64
}

fn kl_entities(window: &[EventFeatures], current: &EventFeatures) -> f64 {
    let mut prior_entities = HashSet::new();
    for f in window {
        prior_entities.extend(f.entities.iter().cloned());
    }
    let union: HashSet<_> = prior_entities.union(&current.entities).collect();
    if union.is_empty() {
        return 0.0;
    }
    let intersection = prior_entities.intersection(&current.entities).count();
    let jaccard = intersection as f64 / union.len() as f64;
    -jaccard.max(0.01).ln()
}

fn kl_temporal(window: &[EventFeatures], current: &EventFeatures) -> f64 {
    let deltas: Vec<f64> = window.iter().map(|f| f.temporal_delta).collect();
    if deltas.is_empty() {
        return 0.0;
    }
    let avg = mean(&deltas);
    let sd = stdev(&deltas, avg);
    if sd < 1e-6 {
        return 0.0;
    }
    ((current.temporal_delta - avg) / sd).abs()
}

/// Composite Bayesian surprise for `current` given the preceding `window`.
pub fn calculate_surprise(window: &[EventFeatures], current: &EventFeatures, weights: &SurpriseWeights) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    weights.semantic * kl_embedding(window, current)
        + weights.entity * kl_entities(window, current)
        + weights.temporal * kl_temporal(window, current)
}

/// Surprise for the whole sequence, position 0 is always 0. `window_size`
/// bounds how many preceding events contribute context (default 5).
pub fn surprise_sequence(features: &[EventFeatures], window_size: usize, weights: &SurpriseWeights) -> Vec<f64> {
    let mut surprises = Vec::with_capacity(features.len());
    if features.is_empty() {
        return surprises;
    }
    surprises.push(0.0);
    for i in 1..features.len() {
        let start = i.saturating_sub(window_size);
        let surprise = calculate_surprise(&features[start..i], &features[i], weights);
        surprises.push(surprise);
    }
    surprises
}

/// Baseline comparator only, kept for regression tests against the legacy
/// behavior — entropy reduction is not used by [`segment_events`].
pub fn legacy_entropy_surprise(window: &[EventFeatures], current: &EventFeatures) -> f64 {
    kl_entities(window, current)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub window_size: usize,
    pub adaptive_gamma: f64,
    pub min_event_size: usize,
    pub max_event_size: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            adaptive_gamma: 1.0,
            min_event_size: 8,
            max_event_size: 128,
        }
    }
}

#[derive(Debug)]
pub struct SegmentationResult {
    pub segments: Vec<Vec<usize>>,
    pub surprises: Vec<f64>,
    pub threshold: f64,
    pub boundaries: Vec<usize>,
    pub modularity_score: f64,
}

fn adaptive_threshold(surprises: &[f64], gamma: f64) -> f64 {
    let avg = mean(surprises);
    let sd = stdev(surprises, avg);
    avg + gamma * sd
}

fn detect_boundaries(surprises: &[f64], threshold: f64) -> Vec<usize> {
    let mut boundaries = vec![0];
    for (i, s) in surprises.iter().enumerate().skip(1) {
        if *s > threshold {
            boundaries.push(i);
        }
    }
    let last = surprises.len() - 1;
    if *boundaries.last().unwrap() != last {
        boundaries.push(last);
    }
    boundaries
}

fn compute_modularity_score(communities: &[usize], edges: &[(usize, usize, f64)]) -> f64 {
    let internal: f64 = edges
        .iter()
        .filter(|(u, v, _)| communities[*u] == communities[*v])
        .map(|(_, _, w)| w)
        .sum();
    let total: f64 = edges.iter().map(|(_, _, w)| w).sum();
    if total == 0.0 {
        0.0
    } else {
        internal / total
    }
}

/// Assigns one community id per threshold-derived segment: everything
/// between two consecutive boundary markers starts in the same community,
/// rather than every event starting as its own singleton.
fn communities_from_boundaries(n: usize, boundaries: &[usize]) -> Vec<usize> {
    let mut communities = vec![0usize; n];
    let mut id = 0usize;
    for w in boundaries.windows(2) {
        for i in w[0]..w[1] {
            communities[i] = id;
        }
        id += 1;
    }
    if let Some(&last) = boundaries.last() {
        communities[last] = id.saturating_sub(1);
    }
    communities
}

/// Greedy chain-graph modularity refinement, seeded from the adaptive-
/// threshold boundaries rather than per-event singletons: only events the
/// threshold already split apart are candidates for re-merging, and only
/// while the merge strictly improves similarity-weighted modularity by at
/// least 0.1%, up to 10 passes. Seeding from singletons instead would let
/// the greedy merge collapse an entire chain into one community whenever
/// the accumulated modularity is already high, regardless of how sharp a
/// single spike in the middle is.
fn refine_with_modularity(n: usize, surprises: &[f64], boundaries: &[usize]) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let edges: Vec<(usize, usize, f64)> = (0..n - 1).map(|i| (i, i + 1, 1.0 / (1.0 + surprises[i + 1]))).collect();
    let mut communities = communities_from_boundaries(n, boundaries);

    for _ in 0..10 {
        let mut improved = false;
        let mut current = compute_modularity_score(&communities, &edges);
        for i in 0..n.saturating_sub(1) {
            if communities[i] == communities[i + 1] {
                continue;
            }
            let old = communities[i + 1];
            let new_comm = communities[i];
            communities[i + 1] = new_comm;
            let candidate = compute_modularity_score(&communities, &edges);
            if candidate > current * 1.001 {
                current = candidate;
                improved = true;
            } else {
                communities[i + 1] = old;
            }
        }
        if !improved {
            break;
        }
    }
    communities
}

fn boundaries_from_communities(communities: &[usize]) -> Vec<usize> {
    let mut boundaries = vec![0];
    for i in 1..communities.len() {
        if communities[i] != communities[i - 1] {
            boundaries.push(i);
        }
    }
    let last = communities.len() - 1;
    if *boundaries.last().unwrap() != last {
        boundaries.push(last);
    }
    boundaries
}

fn segments_from_boundaries(boundaries: &[usize]) -> Vec<Vec<usize>> {
    let mut segments = Vec::new();
    for w in boundaries.windows(2) {
        let (start, end) = (w[0], w[1] + 1);
        let segment: Vec<usize> = (start..end).collect();
        if !segment.is_empty() {
            segments.push(segment);
        }
    }
    segments
}

fn token_count(events: &[Event], segment: &[usize]) -> usize {
    segment.iter().map(|&i| events[i].content.split_whitespace().count()).sum()
}

fn split_segment(segment: &[usize]) -> Vec<Vec<usize>> {
    if segment.len() <= 1 {
        return vec![segment.to_vec()];
    }
    let mid = segment.len() / 2;
    vec![segment[..mid].to_vec(), segment[mid..].to_vec()]
}

fn enforce_size_constraints(events: &[Event], segments: Vec<Vec<usize>>, config: &SegmentationConfig) -> Vec<Vec<usize>> {
    let mut result: Vec<Vec<usize>> = Vec::new();
    for segment in segments {
        let tokens = token_count(events, &segment);
        if tokens < config.min_event_size {
            if let Some(prev) = result.last_mut() {
                prev.extend(segment);
            } else {
                result.push(segment);
            }
        } else if tokens > config.max_event_size {
            result.extend(split_segment(&segment));
        } else {
            result.push(segment);
        }
    }
    result
}

fn final_modularity(surprises: &[f64], boundaries: &[usize]) -> f64 {
    if boundaries.len() <= 1 {
        return 0.0;
    }
    let mut internal = Vec::new();
    for w in boundaries.windows(2) {
        internal.extend_from_slice(&surprises[w[0]..w[1]]);
    }
    let boundary_surprises: Vec<f64> = boundaries[1..boundaries.len() - 1].iter().map(|&b| surprises[b]).collect();
    if boundary_surprises.is_empty() {
        return 1.0;
    }
    let mean_internal = mean(&internal);
    let mean_boundary = mean(&boundary_surprises);
    if mean_boundary > 0.0 {
        (mean_internal / mean_boundary).min(1.0)
    } else {
        0.0
    }
}

/// Full segmentation pipeline: surprise scoring, adaptive threshold,
/// modularity refinement, size-constrained episode assembly.
pub fn segment_events(events: &[Event], embedder: &dyn Embedder, config: &SegmentationConfig) -> SegmentationResult {
    if events.len() < 2 {
        return SegmentationResult {
            segments: vec![(0..events.len()).collect()],
            surprises: vec![0.0; events.len()],
            threshold: 0.0,
            boundaries: if events.is_empty() { vec![] } else { vec![0, events.len() - 1] },
            modularity_score: 1.0,
        };
    }

    let weights = SurpriseWeights::default();
    let features = encode_events(events, embedder);
    let surprises = surprise_sequence(&features, config.window_size, &weights);
    let threshold = adaptive_threshold(&surprises, config.adaptive_gamma);
    let initial_boundaries = detect_boundaries(&surprises, threshold);
    let communities = refine_with_modularity(events.len(), &surprises, &initial_boundaries);
    let boundaries = boundaries_from_communities(&communities);
    let segments = segments_from_boundaries(&boundaries);
    let segments = enforce_size_constraints(events, segments, config);
    let modularity_score = final_modularity(&surprises, &boundaries);

    SegmentationResult {
        segments,
        surprises,
        threshold,
        boundaries,
        modularity_score,
    }
}

/// Turns the index-based segments `segment_events` produces into
/// `Episode` records: one per segment, carrying its event ids, time span,
/// and mean surprise (excluding the leading boundary event, which by
/// construction scored above threshold).
pub fn build_episodes(events: &[Event], result: &SegmentationResult) -> Vec<Episode> {
    if events.is_empty() {
        return Vec::new();
    }
    result
        .segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let event_ids = segment.iter().map(|&i| events[i].id).collect();
            let start_ts = events[segment[0]].timestamp;
            let end_ts = events[*segment.last().unwrap()].timestamp;
            let interior_surprises: Vec<f64> = segment[1..].iter().map(|&i| result.surprises[i]).collect();
            let mean_surprise = mean(&interior_surprises);
            Episode {
                id: uuid::Uuid::new_v4(),
                project_id: events[segment[0]].project_id.clone(),
                session_id: events[segment[0]].session_id.clone(),
                event_ids,
                start_ts,
                end_ts,
                mean_surprise,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn event_at(seconds: i64, content: &str) -> Event {
        Event::new("proj", "sess", Utc::now() + Duration::seconds(seconds), content)
    }

    #[test]
    fn single_event_has_zero_surprise() {
        let events = vec![event_at(0, "hello")];
        let result = segment_events(&events, &NullEmbedder, &SegmentationConfig::default());
        assert_eq!(result.surprises, vec![0.0]);
    }

    #[test]
    fn first_position_is_always_zero_surprise() {
        let events: Vec<Event> = (0..10).map(|i| event_at(i * 60, "steady progress here today")).collect();
        let features = encode_events(&events, &NullEmbedder);
        let surprises = surprise_sequence(&features, 5, &SurpriseWeights::default());
        assert_eq!(surprises[0], 0.0);
    }

    #[test]
    fn entity_surprise_detects_topic_shift() {
        let mut window = Vec::new();
        for _ in 0..3 {
            window.push(EventFeatures {
                embedding: vec![0.0; EMBEDDING_DIM],
                entities: HashSet::from(["success".to_string()]),
                temporal_delta: 10.0,
            });
        }
        let current = EventFeatures {
            embedding: vec![0.0; EMBEDDING_DIM],
            entities: HashSet::from(["error".to_string()]),
            temporal_delta: 10.0,
        };
        let surprise = kl_entities(&window, &current);
        assert!(surprise > 0.0);
    }

    #[test]
    fn oversized_segment_splits_at_midpoint() {
        let segment = vec![0, 1, 2, 3];
        let splits = split_segment(&segment);
        assert_eq!(splits.len(), 2);
        assert_eq!(splits[0].len() + splits[1].len(), 4);
    }

    #[test]
    fn build_episodes_covers_every_event_exactly_once() {
        let events: Vec<Event> = (0..20)
            .map(|i| event_at(i * 60, "steady progress on the refactor today"))
            .collect();
        let result = segment_events(&events, &NullEmbedder, &SegmentationConfig::default());
        let episodes = build_episodes(&events, &result);

        let total: usize = episodes.iter().map(|e| e.event_count()).sum();
        assert_eq!(total, events.len());
        assert!(!episodes.is_empty());
    }

    #[test]
    fn a_sharp_spike_in_an_otherwise_steady_chain_is_not_collapsed_into_one_segment() {
        let mut events: Vec<Event> = (0..20)
            .map(|i| event_at(i * 60, "steady progress on the refactor today"))
            .collect();
        events.push(event_at(20 * 60, "critical outage, everything failed"));
        events.extend(
            (1..=20).map(|i| event_at((20 + i) * 60, "steady progress on the refactor today")),
        );

        let result = segment_events(&events, &NullEmbedder, &SegmentationConfig::default());
        assert!(
            result.segments.len() > 1,
            "a sharp entity-surprise spike in the middle of a steady chain must not \
             be greedily merged back into a single segment"
        );
    }
}
