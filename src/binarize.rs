/// Quantize a value to a single bit: `0` for negative values, `1` otherwise.
///
/// Zero (of either sign) maps to `1` and so does NaN, since it never compares
/// less than zero. The accelerator's binarized arithmetic relies on this exact
/// threshold.
#[inline]
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn binarize(value: f32) -> bool {
    !(value < 0.)
}
