use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use img_convert::converter::{fit_within, make_thumbnail};
use img_convert::estimator::estimate;
use img_convert::transparency::has_transparency;
use img_convert::{Codec, EncodeOptions, ImageCodec, ImageConverter, SourceFormat, TargetFormat};

fn test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

fn encoded(width: u32, height: u32, format: TargetFormat) -> Vec<u8> {
    ImageCodec::new()
        .encode(&test_image(width, height), format, &EncodeOptions { quality: 85 })
        .unwrap()
}

fn bench_estimate(c: &mut Criterion) {
    c.bench_function("estimate", |b| {
        b.iter(|| {
            estimate(
                black_box(SourceFormat::Png),
                black_box(TargetFormat::WebP),
                black_box(true),
                black_box(88),
            )
        })
    });
}

fn bench_transparency_probe(c: &mut Criterion) {
    let mut group = c.benchmark_group("transparency_probe");
    let codec = ImageCodec::new();

    for size in [Small, Medium, Large].iter() {
        let (width, height) = size.dimensions();
        let decoded = codec
            .decode(&encoded(width, height, TargetFormat::Png))
            .unwrap();

        group.bench_with_input(
            BenchmarkId::new("opaque_png", format!("{}x{}", width, height)),
            &decoded,
            |b, decoded| b.iter(|| has_transparency(black_box(decoded), SourceFormat::Png)),
        );
    }

    group.finish();
}

fn bench_resize_and_thumbnail(c: &mut Criterion) {
    let img = test_image(1920, 1080);

    c.bench_function("fit_within", |b| {
        b.iter(|| fit_within(black_box(8000), black_box(3000), 4096, 4096))
    });
    c.bench_function("thumbnail", |b| {
        b.iter(|| make_thumbnail(black_box(&img), 300))
    });
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    group.sample_size(10);
    let codec = ImageCodec::new();
    let converter = ImageConverter::new(&codec);
    let source = encoded(800, 600, TargetFormat::Png);

    for target in TargetFormat::all_formats() {
        if !codec.supports(target) {
            continue;
        }
        group.bench_with_input(
            BenchmarkId::new("png_800x600", target),
            &target,
            |b, &target| b.iter(|| converter.convert_bytes(black_box(&source), target, 80)),
        );
    }

    group.finish();
}

enum ImageSize {
    Small,
    Medium,
    Large,
}

impl ImageSize {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            Small => (320, 240),
            Medium => (1280, 720),
            Large => (3840, 2160),
        }
    }
}

use ImageSize::*;

criterion_group!(
    benches,
    bench_estimate,
    bench_transparency_probe,
    bench_resize_and_thumbnail,
    bench_convert
);
criterion_main!(benches);
