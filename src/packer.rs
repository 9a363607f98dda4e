//! Binarize float parameters and pack them into accelerator words.
//!
//! Source matrices are row-major `[input][output]`, so the value connecting
//! input `m` to output `n` of a layer with `n_out` outputs is `src[m * n_out + n]`.
//! See [`layout`](crate::layout) for where each set lands in the destination.

use crate::{
    binarize::binarize,
    layout::LayerLayout,
    topology::Topology,
    word::Word,
};

/// Packs the parameters of the layers described by a topology.
#[derive(Clone, Copy, Debug)]
pub struct Packer<'a> {
    topology: &'a Topology,
}

impl<'a> Packer<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &'a Topology {
        self.topology
    }

    /// Layout of layer `layer_idx` for `W` sized words.
    pub fn layout<W: Word>(&self, layer_idx: usize) -> LayerLayout {
        LayerLayout::of::<W>(self.topology.layer(layer_idx))
    }

    /// Pack the weights of a dense layer, `M * N / W::SIZE` words written to the
    /// start of `dst`.
    pub fn dense_weights<W: Word>(&self, dst: &mut [W], wts: &[f32], layer_idx: usize) {
        let spec = self.topology.layer(layer_idx);
        let layout = LayerLayout::dense::<W>(spec.m, spec.n);
        check_source(wts, spec.m, spec.n, layer_idx, "weight");

        let dst = layout.weight_set_mut(dst, 0);
        pack_columns(dst, spec.m, spec.n, |m, n| wts[m * spec.n + n]);
    }

    /// Pack the biases of a dense layer into the first `ceil(N / W::SIZE)` words of `dst`.
    pub fn dense_bias<W: Word>(&self, dst: &mut [W], bias: &[f32], layer_idx: usize) {
        let spec = self.topology.layer(layer_idx);
        let layout = LayerLayout::dense::<W>(spec.m, spec.n);
        pack_bias(layout.bias_set_mut(dst, 0), bias, spec.n, layer_idx);
    }

    /// Pack weight set `weight_idx` of a recurrent layer.
    /// `wts_in` is the `M x N` input-to-hidden matrix and `wts_hid` the
    /// `N x N` hidden-to-hidden matrix; they are packed as if stacked along
    /// the input axis.
    pub fn recurrent_weights<W: Word>(
        &self,
        dst: &mut [W],
        wts_in: &[f32],
        wts_hid: &[f32],
        layer_idx: usize,
        weight_idx: usize,
    ) {
        let spec = self.topology.layer(layer_idx);
        let layout = LayerLayout::recurrent::<W>(spec.m, spec.n);
        check_source(wts_in, spec.m, spec.n, layer_idx, "input weight");
        check_source(wts_hid, spec.n, spec.n, layer_idx, "hidden weight");

        let (m_ext, n_out) = (spec.m, spec.n);
        let dst = layout.weight_set_mut(dst, weight_idx);
        // m_ext is word aligned, so a chunk never straddles the two matrices
        pack_columns(dst, m_ext + n_out, n_out, |m, n| {
            if m < m_ext {
                wts_in[m * n_out + n]
            } else {
                wts_hid[(m - m_ext) * n_out + n]
            }
        });
    }

    /// Pack bias set `weight_idx` of a recurrent layer.
    pub fn recurrent_bias<W: Word>(
        &self,
        dst: &mut [W],
        bias: &[f32],
        layer_idx: usize,
        weight_idx: usize,
    ) {
        let spec = self.topology.layer(layer_idx);
        let layout = LayerLayout::recurrent::<W>(spec.m, spec.n);
        pack_bias(layout.bias_set_mut(dst, weight_idx), bias, spec.n, layer_idx);
    }
}

/// Fills `dst` output by output, each output's `inputs` bits split into whole words.
/// Panics unless `dst` is exactly `inputs * outputs / W::SIZE` words long.
fn pack_columns<W, F>(dst: &mut [W], inputs: usize, outputs: usize, value: F)
where
    W: Word,
    F: Fn(usize, usize) -> f32,
{
    let per_output = inputs / W::SIZE;
    assert_eq!(
        dst.len(),
        per_output * outputs,
        "Packed view doesn't match {} outputs of {} words",
        outputs,
        per_output
    );
    if per_output == 0 {
        return;
    }
    for (n, column) in dst.chunks_exact_mut(per_output).enumerate() {
        for (k, w) in column.iter_mut().enumerate() {
            let m = k * W::SIZE;
            let mut wrd = W::default();
            for b in 0..W::SIZE {
                wrd.set(b, binarize(value(m + b, n)));
            }
            *w = wrd;
        }
    }
}

fn pack_bias<W: Word>(dst: &mut [W], bias: &[f32], n_out: usize, layer_idx: usize) {
    assert!(
        bias.len() >= n_out,
        "Layer {} expects {} biases, received {}",
        layer_idx,
        n_out,
        bias.len()
    );
    for (chunk, w) in bias[..n_out].chunks(W::SIZE).zip(dst.iter_mut()) {
        // bits past the last output stay cleared
        let mut wrd = W::default();
        for (b, v) in chunk.iter().enumerate() {
            wrd.set(b, binarize(*v));
        }
        *w = wrd;
    }
}

fn check_source(src: &[f32], rows: usize, cols: usize, layer_idx: usize, what: &str) {
    assert!(
        src.len() >= rows * cols,
        "Layer {} expects a {}x{} {} matrix, received {} values",
        layer_idx,
        rows,
        cols,
        what,
        src.len()
    );
}
