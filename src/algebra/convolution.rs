use ndarray::{s, Array2};

use super::matrix::rotate180;

/// Output length along one axis when correlating a kernel of length `f_len`
/// over an input of length `g_len`. The span counts window start positions;
/// a span shorter than the stride is kept whole, with unreached positions
/// left at zero.
pub(crate) fn convolved_length(
    g_len: usize,
    f_len: usize,
    padding: usize,
    stride: usize,
) -> usize {
    let span = g_len as isize - f_len as isize + 2 * padding as isize + 1;
    if span <= 0 {
        return 0;
    }
    let span = span as usize;
    if span < stride {
        span
    } else {
        span.div_ceil(stride)
    }
}

/// Cross-correlates kernel `f` over `g`.
///
/// `g` is implicitly zero-padded by `row_padding`/`col_padding` on all sides
/// and `f` slides over it with the given strides; each output cell is the sum
/// of the elementwise product of `f` with the overlapping region. Where the
/// window extends past `g`'s bounds, only the in-bounds sub-rectangle of both
/// matrices contributes. No kernel flip is applied.
pub fn convolve(
    f: &Array2<f32>,
    g: &Array2<f32>,
    row_stride: usize,
    col_stride: usize,
    row_padding: usize,
    col_padding: usize,
) -> Array2<f32> {
    let (f_rows, f_cols) = f.dim();
    let (g_rows, g_cols) = g.dim();

    let out_rows = convolved_length(g_rows, f_rows, row_padding, row_stride);
    let out_cols = convolved_length(g_cols, f_cols, col_padding, col_stride);
    let mut conv = Array2::zeros((out_rows, out_cols));

    let r_span = g_rows as isize - f_rows as isize + 2 * row_padding as isize + 1;
    let c_span = g_cols as isize - f_cols as isize + 2 * col_padding as isize + 1;
    if r_span <= 0 || c_span <= 0 {
        return conv;
    }

    let row_steps = (r_span as usize).div_ceil(row_stride);
    let col_steps = (c_span as usize).div_ceil(col_stride);

    for i in 0..row_steps {
        let r = (i * row_stride) as isize - row_padding as isize;
        let f_row = (-r).max(0) as usize;
        let g_row = r.max(0) as usize;
        let row_len = (f_rows as isize + r.min(0)).min(g_rows as isize - r.max(0));
        if row_len <= 0 {
            continue;
        }
        let row_len = row_len as usize;

        for j in 0..col_steps {
            let c = (j * col_stride) as isize - col_padding as isize;
            let f_col = (-c).max(0) as usize;
            let g_col = c.max(0) as usize;
            let col_len = (f_cols as isize + c.min(0)).min(g_cols as isize - c.max(0));
            if col_len <= 0 {
                continue;
            }
            let col_len = col_len as usize;

            let f_sub = f.slice(s![f_row..f_row + row_len, f_col..f_col + col_len]);
            let g_sub = g.slice(s![g_row..g_row + row_len, g_col..g_col + col_len]);
            conv[[i, j]] = (&f_sub * &g_sub).sum();
        }
    }

    conv
}

/// Transpose-correlates `f` over `g`: rotates `f` by 180 degrees and
/// correlates with "full" default padding of `f_rows - 1` / `f_cols - 1`.
///
/// This both implements literal transpose-convolution layers and recovers the
/// gradient with respect to an input that was itself used as a kernel.
pub fn convolve_transpose(
    f: &Array2<f32>,
    g: &Array2<f32>,
    row_padding: Option<usize>,
    col_padding: Option<usize>,
) -> Array2<f32> {
    let row_padding = row_padding.unwrap_or(f.nrows() - 1);
    let col_padding = col_padding.unwrap_or(f.ncols() - 1);
    convolve(&rotate180(f), g, 1, 1, row_padding, col_padding)
}
