//! # svmerge
//!
//! Visuo-haptic supervoxel merging: greedy agglomerative clustering of an
//! over-segmented 3-D point cloud into semantically coherent regions, using
//! a fused distance over color, surface geometry, and surface friction.
//!
//! # Pipeline
//!
//! ```text
//! over-segmentation + adjacency ──► regions ──► friction imputation
//!                                                (GMM fit + regression)
//!           haptic track ────────────────────────────┘
//!                                       │
//!                              calibration (λ / CDFs)
//!                                       │
//!                            greedy merge loop(threshold) ──► partition
//! ```
//!
//! An external segmentation stage provides the fine-grained partition and
//! its adjacency; an optional haptic-exploration log provides sparse
//! friction samples. Regions without samples get their friction regressed
//! from color through a Gaussian mixture fitted over the touched regions.
//! Edge weights fuse the three component distances under one of three
//! strategies (manual weights, adaptive weights, histogram equalization),
//! and the merge loop greedily collapses the cheapest edge until it costs
//! at least the threshold.
//!
//! # Example
//!
//! ```rust,ignore
//! use svmerge::{Clustering, ColorDistance, GeometricDistance, HapticDistance, MergingCriterion};
//!
//! let mut engine = Clustering::with_policies(
//!     ColorDistance::RgbEuclidean,
//!     GeometricDistance::ConvexNormalsDiff,
//!     HapticDistance::AverageFriction,
//!     MergingCriterion::Equalization,
//! );
//! engine.set_initial_state(segments, &adjacency, Some(&track))?;
//! engine.cluster(0.4)?;
//! let labeled = engine.labeled_cloud()?;
//! ```
//!
//! This is an offline, single-threaded batch pass; a `Clustering` value is
//! driven from one thread at a time (`&mut self` enforces it).

pub mod calibration;
pub mod cloud;
pub mod clustering;
pub mod color;
pub mod distance;
/// Error types used across `svmerge`.
pub mod error;
pub mod geometry;
pub mod gmm;
pub mod graph;
pub mod haptic;
pub mod imputation;
pub mod metrics;
pub mod region;

pub use calibration::{Calibration, Cdf, MergingCriterion};
pub use cloud::{ColoredPoint, LabeledCloud, LabeledPoint, PointCloud, PointKey};
pub use clustering::Clustering;
pub use color::Rgb;
pub use distance::{ColorDistance, Deltas, DistancePolicies, GeometricDistance, HapticDistance};
pub use error::{Error, Result};
pub use gmm::MixtureModel;
pub use graph::{ClusteringState, EdgeKey, WeightMap};
pub use haptic::{ForceReading, HapticSample, HapticTrack};
pub use imputation::ImputationConfig;
pub use metrics::Performance;
pub use region::Region;
