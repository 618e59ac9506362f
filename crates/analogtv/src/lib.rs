mod codec;
pub mod color;
pub mod distort;
mod effect;
mod error;
pub mod filter;
pub mod format;
mod ntsc;
mod pal;
mod random;
pub mod scanline;
pub mod secam;
pub mod settings;
pub mod shift;
pub mod spectrum;

#[macro_use]
extern crate num_derive;

pub use num_traits::cast::{FromPrimitive, ToPrimitive};

pub use codec::{ChannelFlags, DecodeSettings, Demodulation, Signal, decode, encode};
pub use error::CodecError;
pub use format::{FormatConstants, FormatProfile, Standard};
pub use random::{FromSeeder, Mix, Seeder};
pub use settings::{AnalogTvSettings, OutputChannels, ParseSettingsError};
