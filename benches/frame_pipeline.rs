//! Benchmarks for the per-frame pipeline stages.
//!
//! Everything runs on synthetic in-memory frames so the numbers reflect
//! resampling and detection cost, not disk or codec throughput.
//!
//! Run with: `cargo bench`

use criterion::Criterion;
use image::{Rgb, RgbImage};
use stillcut::{
    ChangeDetector, DetectorMode, DetectorOptions, FrameResampler, FrameSource, StillcutError,
};

/// Endless synthetic camera feed cycling through a fixed frame set.
struct LoopingSource {
    frames: Vec<RgbImage>,
    rate: f64,
    cursor: usize,
}

impl LoopingSource {
    fn new(rate: f64, frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            rate,
            cursor: 0,
        }
    }
}

impl FrameSource for LoopingSource {
    fn native_rate(&self) -> f64 {
        self.rate
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frames[0].dimensions()
    }

    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn decode_next(&mut self) -> Result<Option<RgbImage>, StillcutError> {
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn skip_next(&mut self) -> Result<bool, StillcutError> {
        self.cursor += 1;
        Ok(true)
    }
}

/// Quarter-PAL frames with a bright block sweeping across the middle.
fn moving_frames(count: usize) -> Vec<RgbImage> {
    (0..count)
        .map(|index| {
            let mut image = RgbImage::from_pixel(320, 240, Rgb([20, 20, 20]));
            let offset = (index as u32 * 8) % 320;
            for y in 100..140 {
                for step in 0..32 {
                    image.put_pixel((offset + step) % 320, y, Rgb([200, 200, 200]));
                }
            }
            image
        })
        .collect()
}

fn benchmark_resampling(criterion: &mut Criterion) {
    let frames = moving_frames(60);

    criterion.bench_function("resample 30 outputs at 30->15 fps", |bencher| {
        bencher.iter(|| {
            let mut resampler =
                FrameResampler::new(LoopingSource::new(30.0, frames.clone()), 15.0).unwrap();
            for _ in 0..30 {
                let _ = resampler.read().unwrap();
            }
        });
    });

    criterion.bench_function("resample 30 outputs at 30->30 fps", |bencher| {
        bencher.iter(|| {
            let mut resampler =
                FrameResampler::new(LoopingSource::new(30.0, frames.clone()), 30.0).unwrap();
            for _ in 0..30 {
                let _ = resampler.read().unwrap();
            }
        });
    });
}

fn benchmark_detection(criterion: &mut Criterion) {
    let frames = moving_frames(30);

    criterion.bench_function("background model scoring", |bencher| {
        bencher.iter(|| {
            let mut detector = ChangeDetector::new(DetectorOptions::new());
            for frame in &frames {
                let _ = detector.is_significant(frame);
            }
        });
    });

    criterion.bench_function("frame difference scoring", |bencher| {
        bencher.iter(|| {
            let mut detector = ChangeDetector::new(
                DetectorOptions::new().with_mode(DetectorMode::FrameDifference),
            );
            for frame in &frames {
                let _ = detector.is_significant(frame);
            }
        });
    });
}

criterion::criterion_group!(benches, benchmark_resampling, benchmark_detection);
criterion::criterion_main!(benches);
