//! Call boundary of the accelerator's schedule compiler and executor.
//! Neither is implemented in this crate; a host wires in a simulator or a
//! device driver by implementing [`Accelerator`].

use crate::word::{to_blocks, Word};

use serde::{Deserialize, Serialize};

/// What kind of computation a schedule performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerMode {
    /// First convolution, reading one input bit per pixel
    FirstConv,
    Conv,
    Dense,
    /// Dense over the external input followed by the hidden state
    Recurrent,
}

/// Layer geometry handed to the schedule compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Input feature count, for recurrent layers including the hidden state
    pub inputs: usize,
    /// Output feature count
    pub outputs: usize,
    /// Input image width, 1 for dense layers
    pub width: usize,
    pub mode: LayerMode,
    /// Passed through to the compiler untouched
    pub norm_mode: u8,
    /// Apply a 2x2 max pool after a convolution
    pub max_pool: bool,
}

impl Geometry {
    pub fn dense(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            outputs,
            width: 1,
            mode: LayerMode::Dense,
            norm_mode: 0,
            max_pool: false,
        }
    }

    /// `inputs` is the external input width, the hidden state is appended to it.
    pub fn recurrent(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs: inputs + outputs,
            mode: LayerMode::Recurrent,
            ..Self::dense(inputs, outputs)
        }
    }

    pub fn conv(inputs: usize, outputs: usize, width: usize, first: bool, max_pool: bool) -> Self {
        Self {
            inputs,
            outputs,
            width,
            mode: if first {
                LayerMode::FirstConv
            } else {
                LayerMode::Conv
            },
            norm_mode: 0,
            max_pool,
        }
    }

    /// Width of the output image
    pub fn output_width(&self) -> usize {
        if self.max_pool {
            self.width / 2
        } else {
            self.width
        }
    }

    /// Number of meaningful bits in the layer's output
    pub fn output_bits(&self) -> usize {
        let so = self.output_width();
        self.outputs * so * so
    }

    /// Number of words the executor reads from the input buffer
    pub fn input_words<W: Word>(&self) -> usize {
        let si = self.width;
        match self.mode {
            LayerMode::FirstConv => si * si,
            LayerMode::Conv => self.inputs * si * si / W::SIZE,
            LayerMode::Dense | LayerMode::Recurrent => self.inputs / W::SIZE,
        }
    }

    /// Number of words the executor writes to the output buffer, at least one
    pub fn output_words<W: Word>(&self) -> usize {
        to_blocks(self.output_bits(), W::SIZE).max(1)
    }
}

/// Arguments of a single schedule execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Execution {
    pub layer_idx: usize,
    pub input_words: usize,
    pub output_words: usize,
    pub dmem_mode: u8,
}

impl Execution {
    /// Execution of a single layer test with `W` sized words.
    pub fn for_geometry<W: Word>(geometry: &Geometry) -> Self {
        Self {
            layer_idx: 0,
            input_words: geometry.input_words::<W>(),
            output_words: geometry.output_words::<W>(),
            dmem_mode: 0,
        }
    }
}

/// The external schedule compiler and executor.
///
/// Both calls are synchronous. Errors are the implementation's own and are
/// relayed to the caller unchanged.
pub trait Accelerator<W: Word> {
    /// Opaque execution plan
    type Schedule;

    /// Compile a plan over a layer's packed weights and biases.
    fn compile(
        &mut self,
        weights: &[W],
        bias: &[W],
        geometry: &Geometry,
    ) -> anyhow::Result<Self::Schedule>;

    /// Run a compiled plan, reading `input` and writing `output`.
    fn execute(
        &mut self,
        input: &[W],
        output: &mut [W],
        call: &Execution,
        schedule: &Self::Schedule,
    ) -> anyhow::Result<()>;
}
