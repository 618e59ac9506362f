extern crate criterion;

use analogtv::{AnalogTvSettings, DecodeSettings, FormatProfile, Standard, decode, encode};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgba, RgbaImage};
#[cfg(not(target_os = "windows"))]
use pprof::criterion::{Output, PProfProfiler};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

fn test_card(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width) as u8;
        let g = (y * 255 / height) as u8;
        let b = ((x + y) * 255 / (width + height)) as u8;
        Rgba([r, g, b, 255])
    })
}

fn criterion_benchmark(c: &mut Criterion) {
    for standard in [Standard::Ntsc, Standard::Pal, Standard::Secam] {
        let profile = FormatProfile::new(standard, true);
        let width = standard.working_width() as u32;
        let img = test_card(width, profile.video_scanlines() as u32);

        c.bench_function(&format!("{} encode", standard.name()), |b| {
            b.iter(|| black_box(encode(&profile, &img).unwrap()));
        });

        let signal = encode(&profile, &img).unwrap();
        let settings = DecodeSettings::default();
        c.bench_function(&format!("{} decode", standard.name()), |b| {
            b.iter_batched_ref(
                || Xoshiro256PlusPlus::seed_from_u64(0),
                |rng| black_box(decode(&profile, &signal, width as usize, &settings, rng).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    let img = test_card(640, 480);
    let effect = AnalogTvSettings::default();
    c.bench_function("full effect", |b| {
        b.iter(|| black_box(effect.apply_effect(&img, 0).unwrap()));
    });
}

criterion_group! {
    name = benches;
    config = {
        #[cfg(not(target_os="windows"))]
        let config = Criterion::default().sample_size(10).with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
        #[cfg(target_os="windows")]
        let config = Criterion::default().sample_size(10);

        config
    };
    targets = criterion_benchmark
}
criterion_main!(benches);
