//! End to end checks of single accelerator layers.
//!
//! A test packs the layer's parameters, compiles and runs a schedule over them
//! and scores the output bits against a golden reference.

mod score;

pub use score::{BitErrors, Verdict, ERROR_TOLERANCE};

use crate::{
    accel::{Accelerator, Execution, Geometry},
    layout::{LayerLayout, Layout},
    packer::Packer,
    topology::Topology,
    word::Word,
};

use log::{debug, info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Accelerator(#[from] anyhow::Error),
    #[error(
        "bit error rate {error_rate:.4}% ({mismatches} of {total_bits} bits) is not below {}%",
        ERROR_TOLERANCE
    )]
    Accuracy {
        error_rate: f64,
        mismatches: usize,
        total_bits: usize,
    },
}

/// Packed buffers and geometry of one layer test.
#[derive(Clone, Copy, Debug)]
pub struct LayerTest<'t, W> {
    pub weights: &'t [W],
    pub bias: &'t [W],
    pub input: &'t [W],
    /// Expected output, at least `geometry.output_bits()` bits long
    pub reference: &'t [W],
    pub geometry: Geometry,
}

/// Compile and execute a layer over already packed buffers and score the output.
///
/// Only accelerator failures are returned as errors; an inaccurate output is
/// a failed [`Verdict`], see [`Verdict::into_result`].
pub fn verify_packed<W, A>(
    accel: &mut A,
    test: &LayerTest<'_, W>,
) -> Result<Verdict, HarnessError>
where
    W: Word,
    A: Accelerator<W> + ?Sized,
{
    let geometry = &test.geometry;
    let call = Execution::for_geometry::<W>(geometry);
    info!(
        "testing {:?} layer with {} inputs, {} outputs, width {}",
        geometry.mode, geometry.inputs, geometry.outputs, geometry.width
    );
    assert!(
        call.input_words <= test.input.len(),
        "Layer reads {} input words, the input buffer holds {}",
        call.input_words,
        test.input.len()
    );

    let schedule = accel.compile(test.weights, test.bias, geometry)?;
    let mut output = vec![W::default(); call.output_words];
    accel.execute(test.input, &mut output, &call, &schedule)?;

    let verdict = Verdict::new(BitErrors::count(&output, test.reference, geometry.output_bits()));
    if verdict.passed {
        debug!("error rate: {:7.4}%", verdict.error_rate);
    } else {
        warn!(
            "error rate: {:7.4}% ({} of {} bits)",
            verdict.error_rate, verdict.mismatches, verdict.total_bits
        );
    }
    Ok(verdict)
}

/// Float parameters of one recurrent weight set.
#[derive(Clone, Copy, Debug)]
pub struct RecurrentParams<'p> {
    /// `M x N` input-to-hidden weights
    pub wts_in: &'p [f32],
    /// `N x N` hidden-to-hidden weights
    pub wts_hid: &'p [f32],
    pub bias: &'p [f32],
}

/// Runs layer tests for the layers of one topology against an accelerator.
pub struct Harness<'a, A> {
    packer: Packer<'a>,
    accel: A,
}

impl<'a, A> Harness<'a, A> {
    pub fn new(topology: &'a Topology, accel: A) -> Self {
        Self {
            packer: Packer::new(topology),
            accel,
        }
    }

    pub fn accelerator(&mut self) -> &mut A {
        &mut self.accel
    }

    pub fn into_inner(self) -> A {
        self.accel
    }

    /// Pack a dense (or terminal) layer's parameters and verify the layer.
    /// `input` holds the `M` input bits, `reference` the expected `N` output bits.
    pub fn dense_layer<W>(
        &mut self,
        layer_idx: usize,
        wts: &[f32],
        bias: &[f32],
        input: &[W],
        reference: &[W],
    ) -> Result<Verdict, HarnessError>
    where
        W: Word,
        A: Accelerator<W>,
    {
        let spec = *self.packer.topology().layer(layer_idx);
        let layout = LayerLayout::dense::<W>(spec.m, spec.n);

        let mut weights = vec![W::default(); layout.weight_buffer_len(1)];
        let mut biases = vec![W::default(); layout.bias_buffer_len(1)];
        self.packer.dense_weights(&mut weights, wts, layer_idx);
        self.packer.dense_bias(&mut biases, bias, layer_idx);
        debug!(
            "packed layer {} into {} weight and {} bias words",
            layer_idx,
            weights.len(),
            biases.len()
        );

        let test = LayerTest {
            weights: &weights,
            bias: &biases,
            input,
            reference,
            geometry: Geometry::dense(spec.m, spec.n),
        };
        verify_packed(&mut self.accel, &test)
    }

    /// Pack every weight set of a recurrent layer into shared buffers, set `k`
    /// at `weight_idx = k`, and verify the layer. `input` holds the `M`
    /// external input bits followed by the `N` state bits.
    pub fn recurrent_layer<W>(
        &mut self,
        layer_idx: usize,
        sets: &[RecurrentParams<'_>],
        input: &[W],
        reference: &[W],
    ) -> Result<Verdict, HarnessError>
    where
        W: Word,
        A: Accelerator<W>,
    {
        let spec = *self.packer.topology().layer(layer_idx);
        let layout = LayerLayout::recurrent::<W>(spec.m, spec.n);

        let mut weights = vec![W::default(); layout.weight_buffer_len(sets.len())];
        let mut biases = vec![W::default(); layout.bias_buffer_len(sets.len())];
        for (weight_idx, set) in sets.iter().enumerate() {
            self.packer
                .recurrent_weights(&mut weights, set.wts_in, set.wts_hid, layer_idx, weight_idx);
            self.packer
                .recurrent_bias(&mut biases, set.bias, layer_idx, weight_idx);
        }
        debug!(
            "packed {} sets of layer {}, {} words each",
            sets.len(),
            layer_idx,
            layout.weight_words()
        );

        let test = LayerTest {
            weights: &weights,
            bias: &biases,
            input,
            reference,
            geometry: Geometry::recurrent(spec.m, spec.n),
        };
        verify_packed(&mut self.accel, &test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LayerKind, LayerSpec};
    use anyhow::anyhow;

    /// Writes a fixed output regardless of the schedule.
    struct Replay {
        output: Vec<u8>,
        compiled: usize,
    }

    impl Accelerator<u8> for Replay {
        type Schedule = usize;

        fn compile(
            &mut self,
            weights: &[u8],
            _bias: &[u8],
            _geometry: &Geometry,
        ) -> anyhow::Result<usize> {
            self.compiled += 1;
            Ok(weights.len())
        }

        fn execute(
            &mut self,
            _input: &[u8],
            output: &mut [u8],
            call: &Execution,
            _schedule: &usize,
        ) -> anyhow::Result<()> {
            assert_eq!(output.len(), call.output_words);
            output.copy_from_slice(&self.output[..call.output_words]);
            Ok(())
        }
    }

    struct Broken;

    impl Accelerator<u8> for Broken {
        type Schedule = ();

        fn compile(&mut self, _: &[u8], _: &[u8], _: &Geometry) -> anyhow::Result<()> {
            Err(anyhow!("capacity exceeded"))
        }

        fn execute(&mut self, _: &[u8], _: &mut [u8], _: &Execution, _: &()) -> anyhow::Result<()> {
            unreachable!()
        }
    }

    /// Checks the word counts of every call and answers with the reference,
    /// optionally with one bit flipped.
    struct Conv {
        reference: Vec<u8>,
        flip: Option<usize>,
        input_words: usize,
        output_words: usize,
    }

    impl Accelerator<u8> for Conv {
        type Schedule = Geometry;

        fn compile(&mut self, _: &[u8], _: &[u8], geometry: &Geometry) -> anyhow::Result<Geometry> {
            Ok(*geometry)
        }

        fn execute(
            &mut self,
            input: &[u8],
            output: &mut [u8],
            call: &Execution,
            schedule: &Geometry,
        ) -> anyhow::Result<()> {
            assert_eq!(call.input_words, self.input_words);
            assert_eq!(call.output_words, self.output_words);
            assert_eq!(output.len(), call.output_words);
            assert!(input.len() >= call.input_words);
            assert_eq!(schedule.output_bits(), self.reference.len() * 8);
            output.copy_from_slice(&self.reference);
            if let Some(bit) = self.flip {
                output[bit / 8] ^= 1 << (bit % 8);
            }
            Ok(())
        }
    }

    fn conv_test(accel: &mut Conv, geometry: Geometry, input: &[u8]) -> Verdict {
        let reference = accel.reference.clone();
        let test = LayerTest {
            weights: &[0; 8],
            bias: &[0; 1],
            input,
            reference: &reference,
            geometry,
        };
        verify_packed(accel, &test).unwrap()
    }

    fn topology() -> Topology {
        Topology::new(vec![LayerSpec::new(LayerKind::Terminal, 16, 16)])
    }

    #[test]
    fn matching_output_passes() {
        let t = topology();
        let mut harness = Harness::new(
            &t,
            Replay {
                output: vec![0x5a, 0xc3],
                compiled: 0,
            },
        );
        let verdict = harness
            .dense_layer(1, &[1.; 256], &[1.; 16], &[0u8; 2], &[0x5a, 0xc3])
            .unwrap();
        assert_eq!(verdict.mismatches, 0);
        assert!(verdict.passed);
        assert_eq!(harness.into_inner().compiled, 1);
    }

    #[test]
    fn single_flip_in_sixteen_fails() {
        let t = topology();
        let mut harness = Harness::new(
            &t,
            Replay {
                output: vec![0x5a, 0xc2],
                compiled: 0,
            },
        );
        let verdict = harness
            .dense_layer(1, &[1.; 256], &[1.; 16], &[0u8; 2], &[0x5a, 0xc3])
            .unwrap();
        assert_eq!(verdict.error_rate, 6.25);
        assert!(matches!(
            verdict.into_result(),
            Err(HarnessError::Accuracy { mismatches: 1, .. })
        ));
    }

    #[test]
    fn relays_accelerator_errors() {
        let t = topology();
        let mut harness = Harness::new(&t, Broken);
        let res = harness.dense_layer::<u8>(1, &[1.; 256], &[1.; 16], &[0u8; 2], &[0u8; 2]);
        match res {
            Err(HarnessError::Accelerator(e)) => assert_eq!(e.to_string(), "capacity exceeded"),
            other => panic!("expected an accelerator error, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "input words")]
    fn short_input() {
        let mut accel = Broken;
        let test = LayerTest::<u8> {
            weights: &[],
            bias: &[],
            input: &[0; 1],
            reference: &[0; 8],
            geometry: Geometry::dense(64, 64),
        };
        let _ = verify_packed(&mut accel, &test);
    }

    #[test]
    fn pooled_conv_single_flip() {
        // 16 channels of 4x4, pooled down to 8 channels of 2x2
        let geometry = Geometry::conv(16, 8, 4, false, true);
        let mut accel = Conv {
            reference: vec![0x3c, 0xa5, 0x0f, 0x81],
            flip: Some(13),
            input_words: 16 * 4 * 4 / 8,
            output_words: 4,
        };
        let verdict = conv_test(&mut accel, geometry, &[0; 32]);
        assert_eq!(verdict.total_bits, 8 * 2 * 2);
        assert_eq!(verdict.mismatches, 1);
        assert_eq!(verdict.error_rate, 100. / 32.);
        assert!(!verdict.passed);

        accel.flip = None;
        let verdict = conv_test(&mut accel, geometry, &[0; 32]);
        assert_eq!(verdict.error_rate, 0.);
        assert!(verdict.passed);
    }

    #[test]
    fn first_conv_single_flip() {
        // one input word per pixel of a 4x4 image, 16 channels of 2x2 out
        let geometry = Geometry::conv(1, 16, 4, true, true);
        let mut accel = Conv {
            reference: vec![0xff, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc],
            flip: Some(63),
            input_words: 4 * 4,
            output_words: 8,
        };
        let verdict = conv_test(&mut accel, geometry, &[0; 16]);
        assert_eq!(verdict.total_bits, 16 * 2 * 2);
        assert_eq!(verdict.mismatches, 1);
        assert_eq!(verdict.error_rate, 100. / 64.);
        assert!(!verdict.passed);
    }

    #[test]
    fn wide_conv_tolerates_one_flip() {
        // 16 channels of 8x8 without pooling, one flip in 1024 bits
        let geometry = Geometry::conv(8, 16, 8, false, false);
        let mut accel = Conv {
            reference: (0..128).map(|i| i as u8).collect(),
            flip: Some(700),
            input_words: 8 * 8 * 8 / 8,
            output_words: 128,
        };
        let verdict = conv_test(&mut accel, geometry, &[0; 64]);
        assert_eq!(verdict.mismatches, 1);
        assert_eq!(verdict.error_rate, 100. / 1024.);
        assert!(verdict.passed);
    }
}
