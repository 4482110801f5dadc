use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use starmask::image_proc::detection::{DaoDetector, MatchedFilterDetector, SourceDetector};
use starmask::image_proc::{erode, gaussian_blur};
use starmask::{process, DetectionThreshold, PipelineConfig};
use test_helpers::StarField;

fn make_field(size: usize, stars: usize) -> Array2<u8> {
    (0..stars)
        .fold(StarField::new(size, size).background(25.0, 3.0), |field, i| {
            let x = 20.0 + (i as f64 * 53.0) % (size as f64 - 40.0);
            let y = 20.0 + (i as f64 * 37.0) % (size as f64 - 40.0);
            field.star(x, y, 220.0 / (1.0 + (i % 4) as f64))
        })
        .render_u8(17)
}

fn bench_stages(c: &mut Criterion) {
    let frame = make_field(512, 50);
    let float = frame.mapv(f64::from);

    let mut group = c.benchmark_group("stages_512x512");
    group.bench_function("erode_15", |b| b.iter(|| erode(black_box(&frame.view()), 15)));
    group.bench_function("gaussian_blur_21", |b| {
        b.iter(|| gaussian_blur(black_box(&float.view()), 21))
    });
    group.bench_function("dao_detect", |b| {
        let detector = DaoDetector::default();
        b.iter(|| detector.detect(black_box(&float.view()), 2.0, 15.0))
    });
    group.bench_function("matched_filter_detect", |b| {
        let detector = MatchedFilterDetector::default();
        b.iter(|| detector.detect(black_box(&float.view()), 2.0, 15.0))
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let config = PipelineConfig {
        threshold: DetectionThreshold::Sigma(5.0),
        ..Default::default()
    };
    let small = make_field(512, 50);
    let large = make_field(1024, 200);

    let mut group = c.benchmark_group("process");
    group.sample_size(20);
    group.bench_function("50_stars_512x512", |b| {
        b.iter(|| process(black_box(&small.view()), &config))
    });
    group.bench_function("200_stars_1024x1024", |b| {
        b.iter(|| process(black_box(&large.view()), &config))
    });
    group.finish();
}

criterion_group!(benches, bench_stages, bench_pipeline);
criterion_main!(benches);
