use image::RgbaImage;
use image::imageops::{self, FilterType};
use log::debug;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::codec::{decode, encode};
use crate::distort::distort_signal;
use crate::error::CodecError;
use crate::random::Seeder;
use crate::settings::AnalogTvSettings;

/// We use a seeded RNG so renders are reproducible, but the noise pass and the decoder shouldn't share one stream.
/// Each gets its own salt mixed into the seed.
mod noise_seeds {
    pub const SIGNAL_NOISE: u64 = 0;
    pub const RECEIVER: u64 = 1;
}

impl AnalogTvSettings {
    /// Run an image through the whole chain: resample onto the standard's working grid, encode, distort, decode, and
    /// resample back to the original size.
    pub fn apply_effect(&self, image: &RgbaImage, seed: u64) -> Result<RgbaImage, CodecError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidCount {
                parameter: "image size",
                value: 0,
            });
        }

        let profile = self.profile();
        let working_width = self.standard.working_width() as u32;
        let working_height = profile.video_scanlines() as u32;
        debug!(
            "Applying {} effect to {width}x{height} image on a {working_width}x{working_height} grid",
            self.standard.name()
        );

        let working = imageops::resize(image, working_width, working_height, FilterType::Triangle);
        let mut signal = encode(&profile, &working)?;

        let mut noise_rng: Xoshiro256PlusPlus = Seeder::new(seed).mix(noise_seeds::SIGNAL_NOISE).finalize();
        distort_signal(&mut signal.samples, self.noise, self.distortion_ramp, &mut noise_rng);

        let mut receiver_rng: Xoshiro256PlusPlus = Seeder::new(seed).mix(noise_seeds::RECEIVER).finalize();
        let decoded = decode(
            &profile,
            &signal,
            working_width as usize,
            &self.decode_settings(),
            &mut receiver_rng,
        )?;

        Ok(imageops::resize(&decoded, width, height, FilterType::Triangle))
    }
}
