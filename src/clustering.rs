//! The merge engine: greedy agglomerative clustering over the weighted
//! region graph.
//!
//! # Lifecycle
//!
//! ```text
//! configure → set_initial_state → calibrate → cluster(threshold)
//!                (imputation)      (weights)     (greedy merging)
//! ```
//!
//! `set_initial_state` wraps the external over-segmentation into regions,
//! runs friction imputation, and stores the result as the *initial* state.
//! `calibrate` derives the fusion parameters from the raw delta
//! distributions over every initial edge and writes fused weights; it is
//! idempotent under a dirty flag that any configuration or state mutation
//! re-sets. `cluster` then repeatedly pops the globally cheapest edge and
//! merges its endpoints until the cheapest weight reaches the threshold.
//!
//! The initial state is retained separately from the current one, so
//! re-clustering at another threshold — or resuming upward from a previous
//! result — never repeats imputation or calibration.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};

use crate::calibration::{Calibration, MergingCriterion};
use crate::cloud::{ColoredPoint, LabeledCloud, LabeledPoint, PointCloud, PointKey};
use crate::color::{self, Rgb};
use crate::distance::{ColorDistance, DistancePolicies, GeometricDistance, HapticDistance};
use crate::error::{Error, Result};
use crate::gmm::MixtureModel;
use crate::graph::{ClusteringState, EdgeKey, WeightMap};
use crate::haptic::HapticTrack;
use crate::imputation::{self, ImputationConfig};
use crate::metrics::{self, Performance};
use crate::region::Region;

/// The region-merging engine.
///
/// Single-threaded and synchronous: all mutation happens in place on the
/// caller's thread, and exclusive access is enforced by `&mut self`.
#[derive(Debug, Clone)]
pub struct Clustering {
    policies: DistancePolicies,
    merging: MergingCriterion,
    lambda_c: f32,
    lambda_g: f32,
    bins: usize,
    imputation: ImputationConfig,
    calibration: Option<Calibration>,
    calibrated: bool,
    initial: Option<ClusteringState>,
    state: Option<ClusteringState>,
    mixture: Option<MixtureModel>,
}

impl Default for Clustering {
    fn default() -> Self {
        Self::new()
    }
}

impl Clustering {
    /// Engine with the default policies (CIEDE2000 color distance, plain
    /// normal difference, adaptive lambda fusion).
    pub fn new() -> Self {
        Self {
            policies: DistancePolicies::default(),
            merging: MergingCriterion::default(),
            lambda_c: 0.5,
            lambda_g: 0.0,
            bins: 500,
            imputation: ImputationConfig::default(),
            calibration: None,
            calibrated: false,
            initial: None,
            state: None,
            mixture: None,
        }
    }

    /// Engine with every policy chosen up front.
    pub fn with_policies(
        color: ColorDistance,
        geometric: GeometricDistance,
        haptic: HapticDistance,
        merging: MergingCriterion,
    ) -> Self {
        let mut engine = Self::new();
        engine.policies = DistancePolicies {
            color,
            geometric,
            haptic,
        };
        engine.merging = merging;
        engine
    }

    /// Select the color distance policy.
    pub fn set_color_distance(&mut self, policy: ColorDistance) {
        self.policies.color = policy;
        self.invalidate();
    }

    /// Select the geometric distance policy.
    pub fn set_geometric_distance(&mut self, policy: GeometricDistance) {
        self.policies.geometric = policy;
        self.invalidate();
    }

    /// Select the haptic distance policy.
    pub fn set_haptic_distance(&mut self, policy: HapticDistance) {
        self.policies.haptic = policy;
        self.invalidate();
    }

    /// Select the merging criterion. Strategy parameters reset to their
    /// defaults (λc = 0.5, λg = 0, 500 bins).
    pub fn set_merging(&mut self, merging: MergingCriterion) {
        self.merging = merging;
        self.lambda_c = 0.5;
        self.lambda_g = 0.0;
        self.bins = 500;
        self.invalidate();
    }

    /// Set the manual lambda weights. Only valid under
    /// [`MergingCriterion::ManualLambda`]; both weights must lie in [0, 1]
    /// and sum to at most 1. The haptic weight is the implicit remainder.
    pub fn set_lambda(&mut self, lambda_c: f32, lambda_g: f32) -> Result<()> {
        if self.merging != MergingCriterion::ManualLambda {
            return Err(Error::InvalidConfiguration {
                name: "lambda",
                message: "lambdas can only be set under the ManualLambda criterion",
            });
        }
        if !(0.0..=1.0).contains(&lambda_c)
            || !(0.0..=1.0).contains(&lambda_g)
            || lambda_c + lambda_g > 1.0
        {
            return Err(Error::InvalidConfiguration {
                name: "lambda",
                message: "weights must lie in [0, 1] and sum to at most 1",
            });
        }
        self.lambda_c = lambda_c;
        self.lambda_g = lambda_g;
        self.invalidate();
        Ok(())
    }

    /// Set the equalization bin count. Only valid under
    /// [`MergingCriterion::Equalization`]; at least one bin.
    pub fn set_bins(&mut self, bins: usize) -> Result<()> {
        if self.merging != MergingCriterion::Equalization {
            return Err(Error::InvalidConfiguration {
                name: "bins",
                message: "bin count can only be set under the Equalization criterion",
            });
        }
        if bins == 0 {
            return Err(Error::InvalidConfiguration {
                name: "bins",
                message: "at least one bin is required",
            });
        }
        self.bins = bins;
        self.invalidate();
        Ok(())
    }

    /// Replace the imputation parameters. Takes effect at the next
    /// `set_initial_state`.
    pub fn set_imputation_config(&mut self, config: ImputationConfig) {
        self.imputation = config;
    }

    /// The mixture fitted by the last imputation, if one was fitted.
    pub fn mixture(&self) -> Option<&MixtureModel> {
        self.mixture.as_ref()
    }

    /// Wrap the external over-segmentation and adjacency into the initial
    /// clustering state, running friction imputation against the track.
    ///
    /// Without a track every region counts as untouched and friction
    /// estimates stay at zero. Any previous calibration is invalidated.
    pub fn set_initial_state(
        &mut self,
        segments: BTreeMap<u32, Vec<ColoredPoint>>,
        adjacency: &[(u32, u32)],
        track: Option<&HapticTrack>,
    ) -> Result<()> {
        if segments.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut regions = BTreeMap::new();
        for (id, points) in segments {
            regions.insert(id, Region::build(points, track)?);
        }

        self.mixture = imputation::impute_frictions(&mut regions, &self.imputation)?;

        for &(i, j) in adjacency {
            for id in [i, j] {
                if !regions.contains_key(&id) {
                    return Err(Error::Other(format!(
                        "adjacency references unknown region id {id}"
                    )));
                }
            }
        }
        let weights = WeightMap::from_adjacency(adjacency.iter().copied());

        let state = ClusteringState::new(regions, weights);
        info!(
            "initial state: {} region(s), {} edge(s)",
            state.region_count(),
            state.edge_count()
        );
        self.initial = Some(state.clone());
        self.state = Some(state);
        self.invalidate();
        Ok(())
    }

    /// Compute the raw delta distributions over every initial edge, derive
    /// the calibration for the active criterion, and write fused weights.
    ///
    /// Idempotent: a repeated call with unchanged configuration and initial
    /// state is a no-op. Calibrating resets the current state to the
    /// initial one.
    pub fn calibrate(&mut self) -> Result<()> {
        if self.calibrated {
            return Ok(());
        }
        let initial = self.initial.as_mut().ok_or(Error::Uninitialized)?;

        let keys: Vec<EdgeKey> = initial.weights.edges().map(|(key, _)| key).collect();
        let mut edge_deltas = Vec::with_capacity(keys.len());
        let mut deltas_c = Vec::with_capacity(keys.len());
        let mut deltas_g = Vec::with_capacity(keys.len());
        let mut deltas_h = Vec::with_capacity(keys.len());
        for key in keys {
            let r1 = initial
                .segments
                .get(&key.first())
                .ok_or(Error::Uninitialized)?;
            let r2 = initial
                .segments
                .get(&key.second())
                .ok_or(Error::Uninitialized)?;
            let d = self.policies.deltas(r1, r2);
            deltas_c.push(d.color);
            deltas_g.push(d.geometric);
            deltas_h.push(d.haptic);
            edge_deltas.push((key, d));
        }

        let calibration = match self.merging {
            MergingCriterion::ManualLambda => Calibration::manual(self.lambda_c, self.lambda_g),
            MergingCriterion::AdaptiveLambda => Calibration::adaptive(&deltas_c, &deltas_h),
            MergingCriterion::Equalization => {
                Calibration::equalized(&deltas_c, &deltas_g, &deltas_h, self.bins)
            }
        };

        for (key, d) in edge_deltas {
            initial.weights.upsert(key, calibration.fuse(&d));
        }

        info!(
            "calibrated {} edge weight(s) under {:?}",
            initial.edge_count(),
            self.merging
        );
        self.state = Some(initial.clone());
        self.calibration = Some(calibration);
        self.calibrated = true;
        Ok(())
    }

    /// Cluster from the initial state down to `threshold`: merge the
    /// cheapest edge while its weight stays below the threshold.
    ///
    /// Calibrates first if the calibration is dirty.
    pub fn cluster(&mut self, threshold: f32) -> Result<()> {
        if self.initial.is_none() {
            return Err(Error::Uninitialized);
        }
        self.calibrate()?;
        self.state = self.initial.clone();
        self.merge_down(threshold)
    }

    /// Continue merging the *current* state up to a (typically higher)
    /// threshold, without restarting from the initial state.
    pub fn resume(&mut self, threshold: f32) -> Result<()> {
        if self.initial.is_none() {
            return Err(Error::Uninitialized);
        }
        self.calibrate()?;
        self.merge_down(threshold)
    }

    /// Cluster from an arbitrary snapshot, e.g. one taken with
    /// [`Clustering::take_state`].
    pub fn cluster_from(&mut self, state: ClusteringState, threshold: f32) -> Result<()> {
        if self.initial.is_none() {
            return Err(Error::Uninitialized);
        }
        self.calibrate()?;
        self.state = Some(state);
        self.merge_down(threshold)
    }

    /// Clone the current state as a resumable snapshot.
    pub fn take_state(&self) -> Result<ClusteringState> {
        self.state.clone().ok_or(Error::Uninitialized)
    }

    /// The current segmentation: live regions and their adjacency.
    pub fn current_state(&self) -> Result<(&BTreeMap<u32, Region>, Vec<(u32, u32)>)> {
        let state = self.state.as_ref().ok_or(Error::Uninitialized)?;
        Ok((&state.segments, state.weights.adjacency_pairs()))
    }

    fn invalidate(&mut self) {
        self.calibrated = false;
        self.calibration = None;
    }

    fn merge_down(&mut self, threshold: f32) -> Result<()> {
        let calibration = self.calibration.clone().ok_or(Error::Uninitialized)?;
        let policies = self.policies;
        let state = self.state.as_mut().ok_or(Error::Uninitialized)?;

        let mut merges = 0usize;
        while let Some((weight, key)) = state.weights.peek_min() {
            if weight >= threshold {
                break;
            }
            debug!(
                "left: {}e/{}p - w: {:.6} - [{}, {}]",
                state.edge_count(),
                state.region_count(),
                weight,
                key.first(),
                key.second()
            );
            Self::merge_pair(state, &policies, &calibration, key)?;
            merges += 1;
        }

        info!(
            "stopped at threshold {:.4}: {} merge(s), {} region(s), {} edge(s)",
            threshold,
            merges,
            state.region_count(),
            state.edge_count()
        );
        Ok(())
    }

    /// Merge the endpoints of `key`. The surviving region keeps the
    /// smaller id; only edges incident to it are recomputed, duplicates
    /// from shared neighbors collapse, and every other edge is untouched.
    fn merge_pair(
        state: &mut ClusteringState,
        policies: &DistancePolicies,
        calibration: &Calibration,
        key: EdgeKey,
    ) -> Result<()> {
        let missing = |id: u32| Error::Other(format!("edge references missing region {id}"));

        state.weights.remove(&key);
        let (a, b) = (key.first(), key.second());
        let ra = state.remove_region(a).ok_or_else(|| missing(a))?;
        let rb = state.remove_region(b).ok_or_else(|| missing(b))?;
        let merged = Region::merge(&ra, &rb);

        let mut neighbors: BTreeSet<u32> = BTreeSet::new();
        neighbors.extend(state.weights.neighbors(a));
        neighbors.extend(state.weights.neighbors(b));
        neighbors.remove(&a);
        neighbors.remove(&b);

        for &n in &neighbors {
            for endpoint in [a, b] {
                if let Some(old) = EdgeKey::new(endpoint, n) {
                    state.weights.remove(&old);
                }
            }
        }

        state.insert_region(a, merged);

        for n in neighbors {
            let Some(new_key) = EdgeKey::new(a, n) else {
                continue;
            };
            let r1 = state.segments.get(&a).ok_or_else(|| missing(a))?;
            let r2 = state.segments.get(&n).ok_or_else(|| missing(n))?;
            let weight = calibration.fuse(&policies.deltas(r1, r2));
            state.weights.upsert(new_key, weight);
        }
        Ok(())
    }

    /// The current partition as a labeled cloud. Labels are consecutive,
    /// assigned in ascending region-id order.
    pub fn labeled_cloud(&self) -> Result<LabeledCloud> {
        let state = self.state.as_ref().ok_or(Error::Uninitialized)?;
        let mut cloud = Vec::new();
        for (label, region) in state.segments.values().enumerate() {
            for p in region.points() {
                cloud.push(LabeledPoint {
                    position: p.position,
                    label: label as u32,
                });
            }
        }
        Ok(cloud)
    }

    /// The current partition painted with the label palette.
    pub fn colored_cloud(&self) -> Result<PointCloud> {
        let state = self.state.as_ref().ok_or(Error::Uninitialized)?;
        let mut cloud = Vec::new();
        for (label, region) in state.segments.values().enumerate() {
            let color = color::label_color(label as u32);
            for p in region.points() {
                cloud.push(ColoredPoint {
                    position: p.position,
                    color,
                });
            }
        }
        Ok(cloud)
    }

    /// Friction visualization: red encodes the friction estimate.
    pub fn friction_cloud(&self) -> Result<PointCloud> {
        let state = self.state.as_ref().ok_or(Error::Uninitialized)?;
        let mut cloud = Vec::new();
        for region in state.segments.values() {
            let color = Rgb::new((region.friction() * 255.0).clamp(0.0, 255.0), 0.0, 50.0);
            for p in region.points() {
                cloud.push(ColoredPoint {
                    position: p.position,
                    color,
                });
            }
        }
        Ok(cloud)
    }

    /// Uncertainty visualization: green encodes the imputation variance.
    pub fn uncertainty_cloud(&self) -> Result<PointCloud> {
        let state = self.state.as_ref().ok_or(Error::Uninitialized)?;
        let mut cloud = Vec::new();
        for region in state.segments.values() {
            let color = Rgb::new(
                0.0,
                (region.friction_variance() * 255.0).clamp(0.0, 255.0),
                0.0,
            );
            for p in region.points() {
                cloud.push(ColoredPoint {
                    position: p.position,
                    color,
                });
            }
        }
        Ok(cloud)
    }

    /// Cluster at every threshold in `[start, end]` with stride `step`,
    /// scoring each partition against the ground truth.
    ///
    /// Each threshold after the first resumes from the previous result,
    /// so the sweep costs one pass over the merge sequence. An inverted
    /// range is corrected with a warning.
    pub fn sweep_thresholds(
        &mut self,
        ground_truth: &LabeledCloud,
        start: f32,
        end: f32,
        step: f32,
    ) -> Result<Vec<(f32, Performance)>> {
        for (name, value) in [("start", start), ("end", end), ("step", step)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::OutOfRange { name, value });
            }
        }
        if step == 0.0 {
            return Err(Error::OutOfRange {
                name: "step",
                value: step,
            });
        }
        let (start, end) = if start > end {
            warn!("start threshold greater than end threshold, inverting");
            (end, start)
        } else {
            (start, end)
        };

        let truth: HashMap<PointKey, usize> = ground_truth
            .iter()
            .map(|lp| (PointKey::of(&lp.position), lp.label as usize))
            .collect();

        info!("testing thresholds from {start} to {end} (step {step})");

        let mut results = Vec::new();
        self.cluster(start)?;
        let p = self.score_against(&truth)?;
        info!("<T, fscore, voi, wov> = <{start:.4}, {:.4}, {:.4}, {:.4}>", p.fscore, p.voi, p.wov);
        results.push((start, p));

        let mut t = start + step;
        while t <= end {
            self.resume(t)?;
            let p = self.score_against(&truth)?;
            info!("<T, fscore, voi, wov> = <{t:.4}, {:.4}, {:.4}, {:.4}>", p.fscore, p.voi, p.wov);
            results.push((t, p));
            t += step;
        }

        Ok(results)
    }

    /// Sweep thresholds and keep the best-scoring one by F-score.
    pub fn best_threshold(
        &mut self,
        ground_truth: &LabeledCloud,
        start: f32,
        end: f32,
        step: f32,
    ) -> Result<(f32, Performance)> {
        let results = self.sweep_thresholds(ground_truth, start, end, step)?;
        let mut best = (0.0, Performance::default());
        for (t, p) in results {
            if p.fscore > best.1.fscore {
                best = (t, p);
            }
        }
        Ok(best)
    }

    fn score_against(&self, truth: &HashMap<PointKey, usize>) -> Result<Performance> {
        let labeled = self.labeled_cloud()?;
        let mut pred_labels = Vec::with_capacity(labeled.len());
        let mut truth_labels = Vec::with_capacity(labeled.len());
        for lp in &labeled {
            if let Some(&t) = truth.get(&PointKey::of(&lp.position)) {
                pred_labels.push(lp.label as usize);
                truth_labels.push(t);
            }
        }
        Ok(metrics::evaluate(&pred_labels, &truth_labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A planar patch of 9 points around `(x, 0, 1)` with a given shade.
    fn patch(x: f32, shade: f32) -> Vec<ColoredPoint> {
        let mut pts = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                pts.push(ColoredPoint::new(
                    x + i as f32 * 0.01,
                    j as f32 * 0.01,
                    1.0,
                    Rgb::new(shade, shade, shade),
                ));
            }
        }
        pts
    }

    /// Manual color-only fusion: fused weight equals the normalized RGB
    /// distance, which makes expected weights easy to reason about.
    fn color_only_engine() -> Clustering {
        let mut engine = Clustering::with_policies(
            ColorDistance::RgbEuclidean,
            GeometricDistance::NormalsDiff,
            HapticDistance::AverageFriction,
            MergingCriterion::ManualLambda,
        );
        engine.set_lambda(1.0, 0.0).unwrap();
        engine
    }

    /// Path graph A–B–C: A and B nearly identical, C far away in color.
    fn path_scene() -> (BTreeMap<u32, Vec<ColoredPoint>>, Vec<(u32, u32)>) {
        let mut segments = BTreeMap::new();
        segments.insert(0, patch(0.0, 100.0));
        segments.insert(1, patch(1.0, 101.0));
        segments.insert(2, patch(2.0, 250.0));
        (segments, vec![(0, 1), (1, 2)])
    }

    #[test]
    fn test_cluster_requires_initial_state() {
        let mut engine = Clustering::new();
        assert!(matches!(engine.cluster(0.5), Err(Error::Uninitialized)));
        assert!(matches!(engine.calibrate(), Err(Error::Uninitialized)));
    }

    #[test]
    fn test_lambda_configuration_guards() {
        let mut engine = Clustering::new();
        // Default criterion is AdaptiveLambda.
        assert!(matches!(
            engine.set_lambda(0.4, 0.4),
            Err(Error::InvalidConfiguration { .. })
        ));

        engine.set_merging(MergingCriterion::ManualLambda);
        assert!(engine.set_lambda(0.4, 0.4).is_ok());
        assert!(engine.set_lambda(0.8, 0.4).is_err());
        assert!(engine.set_lambda(-0.1, 0.4).is_err());
        // The failed calls left the accepted weights in place.
        assert_relative_eq!(engine.lambda_c, 0.4);
    }

    #[test]
    fn test_bins_configuration_guards() {
        let mut engine = Clustering::new();
        assert!(matches!(
            engine.set_bins(16),
            Err(Error::InvalidConfiguration { .. })
        ));

        engine.set_merging(MergingCriterion::Equalization);
        assert!(engine.set_bins(0).is_err());
        assert!(engine.set_bins(16).is_ok());
        assert_eq!(engine.bins, 16);
    }

    #[test]
    fn test_path_graph_merges_only_the_similar_pair() {
        let (segments, adjacency) = path_scene();
        let mut engine = color_only_engine();
        engine.set_initial_state(segments, &adjacency, None).unwrap();
        engine.cluster(0.5).unwrap();

        let (regions, edges) = engine.current_state().unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(edges.len(), 1);
        // A absorbed B under the smaller id; C stayed separate.
        assert!(regions.contains_key(&0));
        assert!(regions.contains_key(&2));
        assert_eq!(regions[&0].len(), 18);

        // The surviving edge got a recomputed, still-large weight.
        let (w, key) = engine
            .state
            .as_ref()
            .unwrap()
            .minimum_weight_edge()
            .unwrap();
        assert_eq!(key, EdgeKey::new(0, 2).unwrap());
        assert!(w > 0.5);
    }

    #[test]
    fn test_merge_counts_and_duplicate_collapse() {
        // Triangle of mutually similar regions: merging two endpoints must
        // collapse the duplicate edges to the shared neighbor.
        let mut segments = BTreeMap::new();
        segments.insert(0, patch(0.0, 100.0));
        segments.insert(1, patch(1.0, 102.0));
        segments.insert(2, patch(2.0, 104.0));
        let adjacency = vec![(0, 1), (1, 2), (0, 2)];

        let mut engine = color_only_engine();
        engine.set_initial_state(segments, &adjacency, None).unwrap();
        engine.calibrate().unwrap();

        let before = engine.state.as_ref().unwrap().clone();
        assert_eq!(before.region_count(), 3);
        assert_eq!(before.edge_count(), 3);

        // One greedy step: region count −1, edge count −2 (dedup).
        engine.cluster(0.011).unwrap();
        let state = engine.state.as_ref().unwrap();
        assert_eq!(state.region_count(), 2);
        assert_eq!(state.edge_count(), 1);

        // All the way: a single region, no edges, never a self-loop.
        engine.cluster(1.0).unwrap();
        let state = engine.state.as_ref().unwrap();
        assert_eq!(state.region_count(), 1);
        assert_eq!(state.edge_count(), 0);
    }

    #[test]
    fn test_cluster_is_deterministic() {
        let (segments, adjacency) = path_scene();
        let mut engine = color_only_engine();
        engine.set_initial_state(segments, &adjacency, None).unwrap();

        engine.cluster(0.5).unwrap();
        let first = engine.labeled_cloud().unwrap();
        engine.cluster(0.5).unwrap();
        let second = engine.labeled_cloud().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resume_is_monotone_and_matches_direct_run() {
        let mut segments = BTreeMap::new();
        for i in 0..6u32 {
            segments.insert(i, patch(i as f32, 40.0 * i as f32));
        }
        let adjacency: Vec<(u32, u32)> = (0..5).map(|i| (i, i + 1)).collect();

        let mut engine = color_only_engine();
        engine
            .set_initial_state(segments.clone(), &adjacency, None)
            .unwrap();
        engine.cluster(0.2).unwrap();
        let coarse = engine.current_state().unwrap().0.len();
        engine.resume(0.6).unwrap();
        let finer_threshold = engine.current_state().unwrap().0.len();
        assert!(finer_threshold <= coarse);

        let mut direct = color_only_engine();
        direct.set_initial_state(segments, &adjacency, None).unwrap();
        direct.cluster(0.6).unwrap();
        assert_eq!(
            direct.current_state().unwrap().0.len(),
            finer_threshold
        );
        assert_eq!(
            direct.labeled_cloud().unwrap(),
            engine.labeled_cloud().unwrap()
        );
    }

    #[test]
    fn test_identical_twins_fuse_near_zero() {
        // Same color and normals, centroids one unit apart, equal friction:
        // all three deltas vanish, so the fused weight must too.
        let mut segments = BTreeMap::new();
        segments.insert(0, patch(0.0, 128.0));
        segments.insert(1, patch(1.0, 128.0));
        let adjacency = vec![(0, 1)];

        for merging in [
            MergingCriterion::ManualLambda,
            MergingCriterion::AdaptiveLambda,
        ] {
            let mut engine = Clustering::new();
            engine.set_merging(merging);
            if merging == MergingCriterion::ManualLambda {
                engine.set_lambda(0.5, 0.3).unwrap();
            }
            engine
                .set_initial_state(segments.clone(), &adjacency, None)
                .unwrap();
            engine.calibrate().unwrap();
            let (w, _) = engine
                .state
                .as_ref()
                .unwrap()
                .minimum_weight_edge()
                .unwrap();
            assert!(w.abs() < 1e-4, "{merging:?}: weight {w}");
        }
    }

    #[test]
    fn test_calibrate_is_idempotent_until_invalidated() {
        let (segments, adjacency) = path_scene();
        let mut engine = color_only_engine();
        engine.set_initial_state(segments, &adjacency, None).unwrap();

        engine.calibrate().unwrap();
        let before = engine.calibration.clone();
        engine.calibrate().unwrap();
        assert_eq!(engine.calibration, before);

        // Changing a strategy parameter re-dirties the calibration.
        engine.set_lambda(0.2, 0.2).unwrap();
        assert!(!engine.calibrated);
        engine.calibrate().unwrap();
        assert_ne!(engine.calibration, before);
    }

    #[test]
    fn test_cloud_projections_cover_every_point() {
        let (segments, adjacency) = path_scene();
        let total: usize = segments.values().map(|v| v.len()).sum();
        let mut engine = color_only_engine();
        engine.set_initial_state(segments, &adjacency, None).unwrap();
        engine.cluster(0.5).unwrap();

        assert_eq!(engine.labeled_cloud().unwrap().len(), total);
        assert_eq!(engine.colored_cloud().unwrap().len(), total);
        assert_eq!(engine.friction_cloud().unwrap().len(), total);
        assert_eq!(engine.uncertainty_cloud().unwrap().len(), total);

        let labels: BTreeSet<u32> = engine
            .labeled_cloud()
            .unwrap()
            .iter()
            .map(|lp| lp.label)
            .collect();
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_sweep_bounds_are_validated() {
        let (segments, adjacency) = path_scene();
        let mut engine = color_only_engine();
        engine.set_initial_state(segments, &adjacency, None).unwrap();
        let truth = engine.labeled_cloud().unwrap();

        assert!(matches!(
            engine.sweep_thresholds(&truth, -0.1, 0.5, 0.1),
            Err(Error::OutOfRange { name: "start", .. })
        ));
        assert!(matches!(
            engine.sweep_thresholds(&truth, 0.0, 1.5, 0.1),
            Err(Error::OutOfRange { name: "end", .. })
        ));
        assert!(matches!(
            engine.sweep_thresholds(&truth, 0.0, 0.5, 0.0),
            Err(Error::OutOfRange { name: "step", .. })
        ));
    }

    #[test]
    fn test_sweep_finds_the_two_group_partition() {
        // Two color groups in a path: 0,1 dark — 2,3 bright.
        let mut segments = BTreeMap::new();
        segments.insert(0, patch(0.0, 60.0));
        segments.insert(1, patch(1.0, 62.0));
        segments.insert(2, patch(2.0, 220.0));
        segments.insert(3, patch(3.0, 222.0));
        let adjacency = vec![(0, 1), (1, 2), (2, 3)];

        let mut engine = color_only_engine();
        engine
            .set_initial_state(segments.clone(), &adjacency, None)
            .unwrap();

        // Ground truth: the two color groups.
        let mut truth = Vec::new();
        for (&id, pts) in &segments {
            for p in pts {
                truth.push(LabeledPoint {
                    position: p.position,
                    label: (id / 2),
                });
            }
        }

        // Inverted range is auto-corrected.
        let (best_t, best) = engine.best_threshold(&truth, 0.9, 0.1, 0.2).unwrap();
        assert_relative_eq!(best.fscore, 1.0);
        assert_relative_eq!(best.wov, 1.0);
        assert!(best.voi < 1e-9);
        assert!(best_t > 0.0 && best_t < 0.9);
    }
}
