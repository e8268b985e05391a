//! Octave-band spectral contrast

use crate::config::SPECTRAL_CONTRAST_LEN;

/// Number of octave bands above `fmin`; one extra band covers `[0, fmin]`
const N_BANDS: usize = SPECTRAL_CONTRAST_LEN - 1;

struct Band {
    /// STFT bins contributing to this band, ascending
    bins: Vec<usize>,
    /// How many of the lowest / highest bins are averaged for valley / peak
    take: usize,
}

/// Per-frame peak and valley energy of each band
pub struct ContrastBands {
    bands: Vec<Band>,
}

impl ContrastBands {
    pub fn new(sample_rate: u32, n_fft: usize, fmin: f64, quantile: f64) -> Result<Self, String> {
        let freqs = crate::transform::fft_frequencies(sample_rate, n_fft);
        let nyquist = sample_rate as f64 / 2.0;

        // Band edges: 0, fmin, 2 fmin, 4 fmin, ...
        let mut edges = vec![0.0];
        edges.extend((0..=N_BANDS).map(|i| fmin * 2f64.powi(i as i32)));

        if let Some(edge) = edges[..N_BANDS + 1].iter().find(|&&e| e >= nyquist) {
            return Err(format!(
                "spectral contrast band edge {:.0} Hz exceeds Nyquist ({:.0} Hz at {} Hz); \
                 lower contrast_fmin",
                edge, nyquist, sample_rate
            ));
        }

        let mut bands = Vec::with_capacity(SPECTRAL_CONTRAST_LEN);
        for k in 0..=N_BANDS {
            let (low, high) = (edges[k], edges[k + 1]);
            let mut in_band: Vec<bool> = freqs.iter().map(|&f| f >= low && f <= high).collect();

            let first = in_band.iter().position(|&b| b);
            let last = in_band.iter().rposition(|&b| b);
            let (first, last) = match (first, last) {
                (Some(first), Some(last)) => (first, last),
                _ => {
                    return Err(format!(
                        "no STFT bins fall in contrast band {:.0}-{:.0} Hz (n_fft {})",
                        low, high, n_fft
                    ))
                }
            };

            // Each band overlaps its lower neighbour by one bin; the top band
            // runs to Nyquist
            if k > 0 && first > 0 {
                in_band[first - 1] = true;
            }
            if k == N_BANDS {
                in_band[last + 1..].iter_mut().for_each(|b| *b = true);
            }

            let member_count = in_band.iter().filter(|&&b| b).count();
            let mut bins: Vec<usize> = in_band
                .iter()
                .enumerate()
                .filter_map(|(i, &b)| b.then_some(i))
                .collect();
            if k < N_BANDS {
                bins.pop();
            }
            if bins.is_empty() {
                return Err(format!(
                    "contrast band {:.0}-{:.0} Hz is narrower than one STFT bin (n_fft {})",
                    low, high, n_fft
                ));
            }

            let take = (rint(quantile * member_count as f64) as usize).clamp(1, bins.len());
            bands.push(Band { bins, take });
        }

        Ok(Self { bands })
    }

    /// Peak and valley of every band for one magnitude spectrum frame
    pub fn measure(
        &self,
        magnitudes: &[f64],
        scratch: &mut Vec<f64>,
    ) -> ([f64; SPECTRAL_CONTRAST_LEN], [f64; SPECTRAL_CONTRAST_LEN]) {
        let mut peaks = [0.0; SPECTRAL_CONTRAST_LEN];
        let mut valleys = [0.0; SPECTRAL_CONTRAST_LEN];

        for (k, band) in self.bands.iter().enumerate() {
            scratch.clear();
            scratch.extend(band.bins.iter().map(|&i| magnitudes[i]));
            scratch.sort_by(|a, b| a.total_cmp(b));

            let n = scratch.len();
            valleys[k] = scratch[..band.take].iter().sum::<f64>() / band.take as f64;
            peaks[k] = scratch[n - band.take..].iter().sum::<f64>() / band.take as f64;
        }

        (peaks, valleys)
    }
}

/// Round half to even
fn rint(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        r
    }
}
