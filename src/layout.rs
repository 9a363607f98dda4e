//! Geometry of the packed weight and bias buffers.
//!
//! Every layer is packed column-major by output unit: all the input bits of
//! output 0 come first, split into whole words, then those of output 1 and so
//! on. A buffer may hold several weight sets of the same layer back to back,
//! set `k` starting right after set `k - 1`. The offsets computed here are the
//! binary contract with the accelerator's schedule decoder, any change to them
//! is a breaking format change.

use crate::{
    topology::LayerSpec,
    word::{to_blocks, Word},
};

use enum_dispatch::enum_dispatch;

#[enum_dispatch]
pub trait Layout {
    /// Length of the logical input axis of one weight set
    fn inputs(&self) -> usize;

    /// Number of output units
    fn outputs(&self) -> usize;

    /// Width of the words the layout is computed for
    fn word_size(&self) -> usize;

    /// Words taken up by one weight set
    fn weight_words(&self) -> usize {
        self.inputs() * self.outputs() / self.word_size()
    }

    /// Words taken up by one bias set. The last word is padded when the
    /// output count isn't a multiple of the word size.
    fn bias_words(&self) -> usize {
        to_blocks(self.outputs(), self.word_size())
    }

    /// Index of the first word of weight set `weight_idx`
    fn weight_offset(&self, weight_idx: usize) -> usize {
        weight_idx * self.weight_words()
    }

    /// Index of the first word of bias set `weight_idx`
    fn bias_offset(&self, weight_idx: usize) -> usize {
        weight_idx * self.bias_words()
    }

    /// Position of the word holding input `m` of output `n`, relative to the
    /// start of its weight set.
    fn weight_word(&self, m: usize, n: usize) -> usize {
        n * (self.inputs() / self.word_size()) + m / self.word_size()
    }
}

/// Layout of a fully connected layer, `m` inputs per output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DenseLayout {
    m: usize,
    n: usize,
    word_size: usize,
}

impl Layout for DenseLayout {
    fn inputs(&self) -> usize {
        self.m
    }

    fn outputs(&self) -> usize {
        self.n
    }

    fn word_size(&self) -> usize {
        self.word_size
    }
}

/// Layout of a recurrent layer. The input-to-hidden and hidden-to-hidden
/// matrices are laid out as one matrix with `m + n` inputs, external inputs first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecurrentLayout {
    m: usize,
    n: usize,
    word_size: usize,
}

impl Layout for RecurrentLayout {
    fn inputs(&self) -> usize {
        self.m + self.n
    }

    fn outputs(&self) -> usize {
        self.n
    }

    fn word_size(&self) -> usize {
        self.word_size
    }
}

#[enum_dispatch(Layout)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerLayout {
    Dense(DenseLayout),
    Recurrent(RecurrentLayout),
}

impl LayerLayout {
    /// Dense layout for `W` sized words. Panics if `m` isn't a multiple of the word size.
    pub fn dense<W: Word>(m: usize, n: usize) -> Self {
        assert!(
            m % W::SIZE == 0,
            "Dense layer with {} inputs can't be packed into {} bit words",
            m,
            W::SIZE
        );
        DenseLayout {
            m,
            n,
            word_size: W::SIZE,
        }
        .into()
    }

    /// Recurrent layout for `W` sized words.
    /// Panics if either `m` or `m + n` isn't a multiple of the word size.
    pub fn recurrent<W: Word>(m: usize, n: usize) -> Self {
        assert!(
            m % W::SIZE == 0 && (m + n) % W::SIZE == 0,
            "Recurrent layer with {} inputs and {} outputs can't be packed into {} bit words",
            m,
            n,
            W::SIZE
        );
        RecurrentLayout {
            m,
            n,
            word_size: W::SIZE,
        }
        .into()
    }

    /// Pick the layout matching the kind of the layer.
    pub fn of<W: Word>(spec: &LayerSpec) -> Self {
        if spec.kind.is_recurrent() {
            Self::recurrent::<W>(spec.m, spec.n)
        } else {
            Self::dense::<W>(spec.m, spec.n)
        }
    }

    /// Total words needed to hold `sets` weight sets.
    pub fn weight_buffer_len(&self, sets: usize) -> usize {
        sets * self.weight_words()
    }

    /// Total words needed to hold `sets` bias sets.
    pub fn bias_buffer_len(&self, sets: usize) -> usize {
        sets * self.bias_words()
    }

    /// The words of weight set `weight_idx` within `buffer`.
    /// Panics if the buffer is too short to contain the whole set.
    pub fn weight_set_mut<'a, W: Word>(
        &self,
        buffer: &'a mut [W],
        weight_idx: usize,
    ) -> &'a mut [W] {
        self.check_word::<W>();
        let start = self.weight_offset(weight_idx);
        view_mut(buffer, start, self.weight_words(), "weight")
    }

    /// The words of bias set `weight_idx` within `buffer`.
    /// Panics if the buffer is too short to contain the whole set.
    pub fn bias_set_mut<'a, W: Word>(
        &self,
        buffer: &'a mut [W],
        weight_idx: usize,
    ) -> &'a mut [W] {
        self.check_word::<W>();
        let start = self.bias_offset(weight_idx);
        view_mut(buffer, start, self.bias_words(), "bias")
    }

    /// Read back the bit stored for input `m` of output `n` in weight set `weight_idx`.
    /// For recurrent layers inputs from `M` onwards address the hidden state.
    pub fn weight_bit<W: Word>(
        &self,
        buffer: &[W],
        weight_idx: usize,
        m: usize,
        n: usize,
    ) -> bool {
        self.check_word::<W>();
        assert!(m < self.inputs() && n < self.outputs());
        let word = self.weight_offset(weight_idx) + self.weight_word(m, n);
        buffer[word].get(m % W::SIZE)
    }

    /// Read back the bias bit of output `n` in bias set `weight_idx`.
    pub fn bias_bit<W: Word>(&self, buffer: &[W], weight_idx: usize, n: usize) -> bool {
        self.check_word::<W>();
        assert!(n < self.outputs());
        buffer[self.bias_offset(weight_idx) + n / W::SIZE].get(n % W::SIZE)
    }

    fn check_word<W: Word>(&self) {
        assert_eq!(
            self.word_size(),
            W::SIZE,
            "Layout was computed for a different word size"
        );
    }
}

fn view_mut<'a, W>(buffer: &'a mut [W], start: usize, len: usize, what: &str) -> &'a mut [W] {
    let end = start + len;
    assert!(
        end <= buffer.len(),
        "The {} set spanning words {}..{} doesn't fit in a buffer of {} words",
        what,
        start,
        end,
        buffer.len()
    );
    &mut buffer[start..end]
}
