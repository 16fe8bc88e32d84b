//! Frame rate normalization tests.
//!
//! These run entirely on synthetic frames; no FFmpeg involvement.

mod common;

use std::time::Duration;

use common::SyntheticSource;
use stillcut::FrameResampler;

fn level_of(frame: &stillcut::ResampledFrame) -> u8 {
    frame.image.as_raw()[0]
}

fn drain_levels(mut resampler: FrameResampler<SyntheticSource>) -> Vec<u8> {
    let mut levels = Vec::new();
    while let Some(frame) = resampler.read().expect("read") {
        assert_eq!(frame.index as usize, levels.len());
        levels.push(level_of(&frame));
    }
    levels
}

// ── Rate conversion ──────────────────────────────────────────────────────

#[test]
fn matching_rates_pass_frames_through() {
    let levels: Vec<u8> = (1u8..=10).map(|step| step * 10).collect();
    let mut resampler =
        FrameResampler::new(SyntheticSource::from_levels(30.0, &levels), 30.0).expect("resampler");

    let mut seen = Vec::new();
    while let Some(frame) = resampler.read().expect("read") {
        assert_eq!(
            frame.elapsed,
            Duration::from_secs_f64(seen.len() as f64 / 30.0)
        );
        seen.push(level_of(&frame));
    }
    assert_eq!(seen, levels);
}

#[test]
fn halving_blends_straddling_pairs() {
    let resampler = FrameResampler::new(
        SyntheticSource::from_levels(30.0, &[10, 20, 30, 40, 50, 60]),
        15.0,
    )
    .expect("resampler");
    assert_eq!(drain_levels(resampler), vec![15, 35, 55]);
}

#[test]
fn integral_downsampling_keeps_centre_frames() {
    // 30 -> 10 fps lands on every third source frame, centred in each
    // window, so no blending happens at all.
    let levels: Vec<u8> = (0u8..9).map(|step| 10 + step * 20).collect();
    let resampler =
        FrameResampler::new(SyntheticSource::from_levels(30.0, &levels), 10.0).expect("resampler");
    assert_eq!(drain_levels(resampler), vec![30, 90, 150]);
}

#[test]
fn upsampling_interpolates_between_frames() {
    let resampler = FrameResampler::new(
        SyntheticSource::from_levels(10.0, &[30, 60, 90]),
        15.0,
    )
    .expect("resampler");
    assert_eq!(drain_levels(resampler), vec![30, 40, 80, 90]);
}

#[test]
fn output_count_tracks_the_rate_ratio() {
    for (count, expected) in [(60, 30u64), (61, 31), (62, 31)] {
        let levels = vec![100u8; count];
        let mut resampler = FrameResampler::new(SyntheticSource::from_levels(30.0, &levels), 15.0)
            .expect("resampler");
        let estimate = resampler.output_frames_estimate().expect("known length");

        let mut produced = 0;
        while resampler.read().expect("read").is_some() {
            produced += 1;
        }
        assert_eq!(produced, expected, "{count} source frames");
        assert!(
            estimate.abs_diff(produced) <= 1,
            "estimate {estimate} too far from {produced}"
        );
        assert_eq!(resampler.frames_read(), produced);
    }
}

// ── Skipping ─────────────────────────────────────────────────────────────

#[test]
fn skip_advances_media_time_by_the_requested_span() {
    let levels = vec![100u8; 150];
    let mut resampler =
        FrameResampler::new(SyntheticSource::from_levels(30.0, &levels), 15.0).expect("resampler");

    let mut elapsed = Vec::new();
    for _ in 0..5 {
        let frame = resampler.read().expect("read").expect("frame");
        elapsed.push(frame.elapsed);
    }
    let before_skip = *elapsed.last().expect("pre-skip frames");

    let outcome = resampler
        .skip(Duration::from_secs(2), Duration::from_secs(1))
        .expect("skip");
    assert!(outcome.completed);
    assert_eq!(outcome.source_frames_skipped, 30);
    assert_eq!(outcome.boundary.len(), 15);
    assert_eq!(outcome.boundary[0].index, 5);

    let last = outcome.boundary.last().expect("boundary frames");
    // The last boundary frame lands exactly the skipped span past the last
    // frame read before the skip.
    assert_eq!(last.elapsed - before_skip, Duration::from_secs(2));

    for frame in &outcome.boundary {
        elapsed.push(frame.elapsed);
    }
    let next = resampler.read().expect("read").expect("frame after skip");
    assert_eq!(next.index, 20);
    elapsed.push(next.elapsed);

    for pair in elapsed.windows(2) {
        assert!(pair[0] < pair[1], "elapsed must be strictly increasing");
    }
}

#[test]
fn tail_longer_than_the_skip_is_clamped() {
    let levels = vec![100u8; 150];
    let mut resampler =
        FrameResampler::new(SyntheticSource::from_levels(30.0, &levels), 15.0).expect("resampler");
    for _ in 0..5 {
        resampler.read().expect("read").expect("frame");
    }

    let outcome = resampler
        .skip(Duration::from_secs(1), Duration::from_secs(2))
        .expect("skip");
    assert!(outcome.completed);
    // The whole second is decoded as boundary; nothing is discarded.
    assert_eq!(outcome.source_frames_skipped, 0);
    assert_eq!(outcome.boundary.len(), 15);
    assert_eq!(outcome.boundary[0].index, 5);
    assert_eq!(
        outcome.boundary[0].elapsed,
        Duration::from_secs_f64(5.0 / 15.0)
    );
}

#[test]
fn skip_beyond_the_source_reports_incomplete() {
    let levels = vec![100u8; 30];
    let mut resampler =
        FrameResampler::new(SyntheticSource::from_levels(30.0, &levels), 15.0).expect("resampler");
    resampler.read().expect("read").expect("frame");

    let outcome = resampler
        .skip(Duration::from_secs(5), Duration::from_secs(1))
        .expect("skip");
    assert!(!outcome.completed);
    assert!(outcome.boundary.is_empty());
    assert_eq!(outcome.source_frames_skipped, 28);
    assert!(resampler.read().expect("read").is_none());
}
