use std::convert::TryFrom;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Architecture of a single accelerator layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Rnn1,
    Rnn2,
    Dense,
    /// The network's output layer
    Terminal,
}

impl LayerKind {
    pub fn is_recurrent(self) -> bool {
        matches!(self, LayerKind::Rnn1 | LayerKind::Rnn2)
    }

    pub fn is_terminal(self) -> bool {
        self == LayerKind::Terminal
    }
}

/// Kind and dimensions of one layer.
/// For recurrent layers `m` is the width of the external input only, the
/// hidden state is `n` wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub kind: LayerKind,
    pub m: usize,
    pub n: usize,
}

impl LayerSpec {
    pub fn new(kind: LayerKind, m: usize, n: usize) -> Self {
        Self { kind, m, n }
    }

    /// Width of the logical input axis once the hidden state is appended.
    pub fn packed_inputs(&self) -> usize {
        if self.kind.is_recurrent() {
            self.m + self.n
        } else {
            self.m
        }
    }
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("failed to parse topology: {0}")]
    Json(#[from] serde_json::Error),
    #[error("topology contains no layers")]
    Empty,
    #[error("layer {layer} ({m} inputs, {n} outputs) is not aligned to {word_size} bit words")]
    Misaligned {
        layer: usize,
        m: usize,
        n: usize,
        word_size: usize,
    },
}

/// The per network layer table. Layers are addressed with 1-based indices.
/// The table is built once and then only read, every component that needs
/// layer dimensions receives a reference to it. A table always has at least
/// one layer, deserialization rejects an empty one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayerTable")]
pub struct Topology {
    layers: Vec<LayerSpec>,
}

#[derive(Deserialize)]
struct LayerTable {
    layers: Vec<LayerSpec>,
}

impl TryFrom<LayerTable> for Topology {
    type Error = TopologyError;

    fn try_from(table: LayerTable) -> Result<Self, Self::Error> {
        if table.layers.is_empty() {
            return Err(TopologyError::Empty);
        }
        Ok(Self {
            layers: table.layers,
        })
    }
}

impl Topology {
    /// Panics if `layers` is empty.
    pub fn new(layers: Vec<LayerSpec>) -> Self {
        assert!(!layers.is_empty(), "A topology needs at least one layer");
        Self { layers }
    }

    /// Load a topology of the form `{"layers": [{"kind": "dense", "m": 64, "n": 64}, ...]}`.
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        let topology: Topology = serde_json::from_str(json)?;
        debug!("loaded topology with {} layers", topology.len());
        Ok(topology)
    }

    /// Number of layers in the network
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the description of layer `layer_idx`.
    /// Panics unless `1 <= layer_idx <= len()`.
    pub fn layer(&self, layer_idx: usize) -> &LayerSpec {
        assert!(
            layer_idx != 0 && layer_idx <= self.layers.len(),
            "Layer index {} out of range, the network has {} layers",
            layer_idx,
            self.layers.len()
        );
        &self.layers[layer_idx - 1]
    }

    pub fn is_recurrent(&self, layer_idx: usize) -> bool {
        self.layer(layer_idx).kind.is_recurrent()
    }

    pub fn is_terminal(&self, layer_idx: usize) -> bool {
        self.layer(layer_idx).kind.is_terminal()
    }

    /// Check that every layer can be packed into words of `word_size` bits.
    /// Panics if `word_size` is zero.
    pub fn validate(&self, word_size: usize) -> Result<(), TopologyError> {
        assert!(word_size > 0, "Word size must be at least one bit");
        for (i, spec) in self.layers.iter().enumerate() {
            if spec.m % word_size != 0 || spec.packed_inputs() % word_size != 0 {
                return Err(TopologyError::Misaligned {
                    layer: i + 1,
                    m: spec.m,
                    n: spec.n,
                    word_size,
                });
            }
        }
        Ok(())
    }
}
