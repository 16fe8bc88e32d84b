//! Progress reporting tests.
//!
//! A recording callback collects every notification the cutter emits so the
//! batching cadence and the per-clip hook can be checked end to end.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{scene_frames, test_video, MemorySinkFactory, SyntheticSource};
use stillcut::{ClipCutter, ClipSummary, CutOptions, ProgressCallback, ProgressInfo};

#[derive(Default)]
struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
    clips: Mutex<Vec<ClipSummary>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().expect("infos").push(info.clone());
    }

    fn on_clip(&self, summary: &ClipSummary) {
        self.clips.lock().expect("clips").push(summary.clone());
    }
}

#[test]
fn callback_sees_every_batch_and_each_clip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let progress = Arc::new(RecordingProgress::default());
    let options = CutOptions::new()
        .with_target_rate(15)
        .with_pre_roll(Duration::from_secs(10))
        .with_min_clip_span(Duration::from_secs(5))
        .with_batch_size(100)
        .with_progress(Arc::clone(&progress) as Arc<dyn ProgressCallback>);

    let clips = ClipCutter::new(options)
        .cut(
            SyntheticSource::new(30.0, scene_frames(1800, 600..885)),
            MemorySinkFactory::default(),
            &test_video(),
            dir.path(),
        )
        .expect("cut");
    assert_eq!(clips.len(), 1);

    let infos = progress.infos.lock().expect("infos");
    // 900 output frames at a batch size of 100, plus the final report.
    assert_eq!(infos.len(), 10);
    for pair in infos.windows(2) {
        assert!(
            pair[0].current <= pair[1].current,
            "progress must not move backwards"
        );
    }

    let last = infos.last().expect("final report");
    assert_eq!(last.current, 900);
    assert!(last.percentage.expect("total is known") > 99.0);
    assert!(last.media_time.expect("media time") >= Duration::from_secs(59));

    let observed = progress.clips.lock().expect("clips");
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].path, clips[0].path);
}

#[test]
fn batch_size_one_reports_every_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    let progress = Arc::new(RecordingProgress::default());
    let options = CutOptions::new()
        .with_target_rate(15)
        .with_progress(Arc::clone(&progress) as Arc<dyn ProgressCallback>);

    ClipCutter::new(options)
        .cut(
            SyntheticSource::new(30.0, scene_frames(60, 0..0)),
            MemorySinkFactory::default(),
            &test_video(),
            dir.path(),
        )
        .expect("cut");

    let infos = progress.infos.lock().expect("infos");
    // One report per output frame, plus the final one.
    assert_eq!(infos.len(), 31);
    let media_times: Vec<_> = infos
        .iter()
        .filter_map(|info| info.media_time)
        .collect();
    for pair in media_times.windows(2) {
        assert!(pair[0] <= pair[1], "media time must not move backwards");
    }
}
