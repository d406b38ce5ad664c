use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use md_core::frame::PixelBuffer;
use md_dither::Ditherer;

fn gradient(width: u32, height: u32) -> PixelBuffer {
    let mut fb = PixelBuffer::new(width, height);
    for (i, px) in fb.data.chunks_exact_mut(4).enumerate() {
        let x = (i % width as usize) as u32;
        let v = (x * 255 / width.max(1)) as u8;
        px[0] = v;
        px[1] = v;
        px[2] = v;
    }
    fb
}

fn bench_dither(c: &mut Criterion) {
    let ditherer = Ditherer::new();

    let hd = gradient(1280, 720);
    c.bench_function("dither_1280x720", |b| {
        b.iter(|| ditherer.process(black_box(&hd)));
    });

    let full_hd = gradient(1920, 1080);
    c.bench_function("dither_1920x1080", |b| {
        b.iter(|| ditherer.process(black_box(&full_hd)));
    });
}

criterion_group!(benches, bench_dither);
criterion_main!(benches);
