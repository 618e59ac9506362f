use std::ops::Range;

use crate::format::FormatProfile;

/// Split `signal_len` samples into `video_scanlines` contiguous segments. The result has one more entry than there are
/// lines: segment `i` is `points[i]..points[i + 1]`.
pub fn boundary_points(signal_len: usize, video_scanlines: usize) -> Vec<usize> {
    (0..=video_scanlines)
        .map(|line| line * signal_len / video_scanlines)
        .collect()
}

/// Image row that logical scanline `line` is drawn on. Interlaced video sends all even rows as the first field, then
/// all odd rows as the second.
pub fn physical_scanline(line: usize, video_scanlines: usize, interlaced: bool) -> usize {
    if !interlaced {
        return line;
    }
    let polarity = if line * 2 >= video_scanlines { 1 } else { 0 };
    (line * 2 + polarity) % video_scanlines
}

/// Where each scanline's segment and active window sit within a signal.
#[derive(Debug, Clone)]
pub(crate) struct ScanlineLayout {
    boundaries: Vec<usize>,
    active_starts: Vec<usize>,
    video_scanlines: usize,
    interlaced: bool,
}

impl ScanlineLayout {
    /// Layout for a signal partitioned by `boundaries` whose active windows are `active_width` samples long.
    pub fn new(profile: &FormatProfile, boundaries: &[usize], active_width: usize) -> Self {
        let video_scanlines = boundaries.len().saturating_sub(1);
        let signal_len = boundaries.last().copied().unwrap_or(0);
        let porch = profile.porch_fraction() * active_width as f64;
        let active_starts = (0..video_scanlines)
            .map(|line| {
                let start = line as f64 * signal_len as f64 / video_scanlines as f64 + porch;
                start.floor() as usize
            })
            .collect();

        ScanlineLayout {
            boundaries: boundaries.to_vec(),
            active_starts,
            video_scanlines,
            interlaced: profile.is_interlaced(),
        }
    }

    pub fn video_scanlines(&self) -> usize {
        self.video_scanlines
    }

    pub fn segment(&self, line: usize) -> Range<usize> {
        self.boundaries[line]..self.boundaries[line + 1]
    }

    /// Absolute index of the first active sample of `line`.
    pub fn active_start(&self, line: usize) -> usize {
        self.active_starts[line]
    }

    pub fn physical_line(&self, line: usize) -> usize {
        physical_scanline(line, self.video_scanlines, self.interlaced)
    }
}

/// Sample at a possibly out-of-range position; anything outside the signal reads as blanking.
pub(crate) fn sample_at(samples: &[f64], position: isize) -> f64 {
    if position < 0 {
        return 0.0;
    }
    samples.get(position as usize).copied().unwrap_or(0.0)
}
