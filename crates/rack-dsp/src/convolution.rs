//! Uniformly partitioned convolution
//!
//! Overlap-save in the frequency domain with one partition per processing
//! block, so output is sample-aligned with input (no added latency).
//! - RealFFT for 2x efficiency over complex FFT
//! - Frequency-domain delay line; silent input blocks are skipped

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::Processor;
use rack_core::Sample;

/// Single-channel partitioned convolver
pub struct PartitionedConvolver {
    block_size: usize,
    /// IR segments in the frequency domain (half-spectrum)
    partitions: Vec<Vec<Complex<f64>>>,
    /// Spectra of past input windows; slot `(head + j) % len` is `j` blocks old
    fdl: Vec<Vec<Complex<f64>>>,
    fdl_silent: Vec<bool>,
    fdl_head: usize,
    /// Previous block followed by the current one
    window: Vec<f64>,
    prev_block_silent: bool,
    fft_in: Vec<f64>,
    accum: Vec<Complex<f64>>,
    time_out: Vec<f64>,
    fft: Arc<dyn RealToComplex<f64>>,
    ifft: Arc<dyn ComplexToReal<f64>>,
    /// Output gain with the inverse FFT normalisation folded in
    scale: f64,
}

impl PartitionedConvolver {
    /// Convolver for `ir`, processing `block_size` frames per call, output scaled by `gain`
    pub fn new(ir: &[Sample], block_size: usize, gain: f64) -> Self {
        let block_size = block_size.max(1);
        let fft_size = block_size * 2;

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);

        let partitions: Vec<Vec<Complex<f64>>> = ir
            .chunks(block_size)
            .map(|segment| {
                let mut padded = vec![0.0; fft_size];
                padded[..segment.len()].copy_from_slice(segment);
                let mut spectrum = fft.make_output_vec();
                fft.process(&mut padded, &mut spectrum).ok();
                spectrum
            })
            .collect();

        let count = partitions.len();
        log::debug!(
            "Convolver: {} IR samples in {count} partitions of {block_size}",
            ir.len()
        );

        Self {
            block_size,
            fdl: vec![fft.make_output_vec(); count],
            fdl_silent: vec![true; count],
            fdl_head: 0,
            window: vec![0.0; fft_size],
            prev_block_silent: true,
            fft_in: vec![0.0; fft_size],
            accum: fft.make_output_vec(),
            time_out: ifft.make_output_vec(),
            partitions,
            fft,
            ifft,
            scale: gain / fft_size as f64,
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Convolve one block; both slices must be `block_size` long
    pub fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) {
        debug_assert_eq!(input.len(), self.block_size);
        debug_assert_eq!(output.len(), self.block_size);

        let count = self.partitions.len();
        if count == 0 {
            output.fill(0.0);
            return;
        }

        let b = self.block_size;
        self.window.copy_within(b.., 0);
        self.window[b..].copy_from_slice(input);

        let input_silent = input.iter().all(|&s| s == 0.0);
        let window_silent = input_silent && self.prev_block_silent;
        self.prev_block_silent = input_silent;

        self.fdl_head = (self.fdl_head + count - 1) % count;
        let head = self.fdl_head;
        self.fdl_silent[head] = window_silent;
        if !window_silent {
            self.fft_in.copy_from_slice(&self.window);
            self.fft.process(&mut self.fft_in, &mut self.fdl[head]).ok();
        }

        self.accum.fill(Complex::new(0.0, 0.0));
        let mut any = false;
        for (age, partition) in self.partitions.iter().enumerate() {
            let slot = (head + age) % count;
            if self.fdl_silent[slot] {
                continue;
            }
            any = true;
            for ((acc, x), h) in self.accum.iter_mut().zip(&self.fdl[slot]).zip(partition) {
                *acc += x * h;
            }
        }

        if !any {
            output.fill(0.0);
            return;
        }

        // DC and Nyquist bins of a real signal carry no imaginary part
        let last = self.accum.len() - 1;
        self.accum[0].im = 0.0;
        self.accum[last].im = 0.0;
        self.ifft.process(&mut self.accum, &mut self.time_out).ok();

        for (out, &y) in output.iter_mut().zip(&self.time_out[b..]) {
            *out = y * self.scale;
        }
    }
}

impl Processor for PartitionedConvolver {
    fn reset(&mut self) {
        self.window.fill(0.0);
        self.prev_block_silent = true;
        self.fdl_silent.fill(true);
        self.fdl_head = 0;
    }
}

impl std::fmt::Debug for PartitionedConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedConvolver")
            .field("block_size", &self.block_size)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}
