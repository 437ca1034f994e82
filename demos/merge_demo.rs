use std::collections::BTreeMap;

use nalgebra::Point3;
use svmerge::{
    Clustering, ColorDistance, ColoredPoint, ForceReading, GeometricDistance, HapticDistance,
    HapticTrack, MergingCriterion, Rgb,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Minimal end-to-end: synthetic over-segmentation -> imputation ->
    // calibration -> merge. Two tabletop objects, each shattered into
    // small patches; the probe touched one patch per object.

    let mut segments: BTreeMap<u32, Vec<ColoredPoint>> = BTreeMap::new();
    let mut track = HapticTrack::new();
    let mut adjacency = Vec::new();

    // Object A: dark rubber (slippery probe readings), patches 0..4.
    // Object B: bright ceramic, patches 5..9.
    for id in 0..10u32 {
        let (shade, x0) = if id < 5 {
            (60.0 + id as f32, id as f32 * 0.1)
        } else {
            (210.0 + (id - 5) as f32, 1.0 + (id - 5) as f32 * 0.1)
        };
        let mut points = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                points.push(ColoredPoint::new(
                    x0 + i as f32 * 0.02,
                    j as f32 * 0.02,
                    1.0,
                    // Jitter all three channels independently so per-region
                    // color statistics stay full rank.
                    Rgb::new(
                        shade + i as f32,
                        shade + j as f32 * 0.5,
                        shade + (i * j) as f32 * 0.2,
                    ),
                ));
            }
        }
        segments.insert(id, points);
        if id != 0 && id != 5 {
            adjacency.push((id - 1, id));
        }
    }
    // The seam between the two objects.
    adjacency.push((4, 5));

    // Probe patch 0 (high friction) and patch 7 (low friction).
    for p in &segments[&0] {
        track.insert(
            p.position,
            ForceReading {
                tangential: 0.8 + p.position.x,
                normal: 1.0,
            },
        );
    }
    for p in &segments[&7] {
        track.insert(
            p.position,
            ForceReading {
                tangential: 0.1 + p.position.y,
                normal: 1.0,
            },
        );
    }
    // A stray probe position off the cloud is simply never matched.
    track.insert(
        Point3::new(9.0, 9.0, 9.0),
        ForceReading {
            tangential: 1.0,
            normal: 1.0,
        },
    );

    let mut engine = Clustering::with_policies(
        ColorDistance::RgbEuclidean,
        GeometricDistance::ConvexNormalsDiff,
        HapticDistance::AverageFriction,
        MergingCriterion::Equalization,
    );
    engine.set_bins(64)?;
    engine.set_initial_state(segments, &adjacency, Some(&track))?;

    engine.cluster(0.4)?;
    let (regions, edges) = engine.current_state()?;
    println!("threshold 0.4: {} region(s), {} edge(s)", regions.len(), edges.len());
    for (id, region) in regions {
        println!(
            "  region {:>2}: {:>3} points, friction {:.3} (variance {:.4}, {} sample(s))",
            id,
            region.len(),
            region.friction(),
            region.friction_variance(),
            region.haptic_samples().len(),
        );
    }

    // Coarsen further without recomputing imputation or calibration.
    engine.resume(0.7)?;
    let labeled = engine.labeled_cloud()?;
    let n_labels = labeled.iter().map(|lp| lp.label).max().map_or(0, |l| l + 1);
    println!("threshold 0.7: {} label(s) over {} points", n_labels, labeled.len());

    Ok(())
}
