#![allow(dead_code)]

use anyhow::bail;
use bnn_accel::{
    accel::{Accelerator, Execution, Geometry, LayerMode},
    binarize::binarize,
    word::{get_bit, set_bit, to_blocks, Word},
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Binarize `values` into a packed buffer, value `i` at bit `i`.
pub fn pack_bits<W: Word>(values: &[f32]) -> Vec<W> {
    let mut buf = vec![W::default(); to_blocks(values.len(), W::SIZE).max(1)];
    for (i, v) in values.iter().enumerate() {
        set_bit(&mut buf, i, binarize(*v));
    }
    buf
}

fn sign(bit: bool) -> i64 {
    if bit {
        1
    } else {
        -1
    }
}

/// Expected output of a binarized layer computed from the float parameters.
/// `weight(m, n)` yields the weight connecting input `m` to output `n`.
pub fn golden<W, F>(inputs: &[f32], bias: &[f32], weight: F) -> Vec<W>
where
    W: Word,
    F: Fn(usize, usize) -> f32,
{
    let outputs = bias
        .iter()
        .enumerate()
        .map(|(n, b)| {
            let acc: i64 = inputs
                .iter()
                .enumerate()
                .map(|(m, x)| sign(binarize(*x) == binarize(weight(m, n))))
                .sum();
            if acc + sign(binarize(*b)) >= 0 {
                1.
            } else {
                -1.
            }
        })
        .collect::<Vec<f32>>();
    pack_bits(&outputs)
}

pub struct XnorSchedule<W> {
    weights: Vec<W>,
    bias: Vec<W>,
    geometry: Geometry,
}

/// Software stand-in for the accelerator: XNOR-popcount dense layers over
/// the packed buffers, using weight set 0.
#[derive(Default)]
pub struct Xnor {
    pub executions: usize,
}

impl<W: Word> Accelerator<W> for Xnor {
    type Schedule = XnorSchedule<W>;

    fn compile(
        &mut self,
        weights: &[W],
        bias: &[W],
        geometry: &Geometry,
    ) -> anyhow::Result<Self::Schedule> {
        match geometry.mode {
            LayerMode::Dense | LayerMode::Recurrent => {}
            mode => bail!("{:?} layers are not supported", mode),
        }
        if weights.len() * W::SIZE < geometry.inputs * geometry.outputs {
            bail!("weight buffer too small for the layer");
        }
        Ok(XnorSchedule {
            weights: weights.to_vec(),
            bias: bias.to_vec(),
            geometry: *geometry,
        })
    }

    fn execute(
        &mut self,
        input: &[W],
        output: &mut [W],
        call: &Execution,
        schedule: &Self::Schedule,
    ) -> anyhow::Result<()> {
        let g = &schedule.geometry;
        assert_eq!(call.input_words * W::SIZE, g.inputs);
        for n in 0..g.outputs {
            let acc: i64 = (0..g.inputs)
                .map(|m| sign(get_bit(input, m) == get_bit(&schedule.weights, n * g.inputs + m)))
                .sum();
            set_bit(output, n, acc + sign(get_bit(&schedule.bias, n)) >= 0);
        }
        self.executions += 1;
        Ok(())
    }
}
