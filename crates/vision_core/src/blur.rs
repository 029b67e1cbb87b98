//! Separable Gaussian blur over single-channel f32 maps.

/// Gaussian filter with a square kernel applied as two 1D passes.
///
/// Borders are reflected without repeating the edge sample (`dcb|abcd|cba`),
/// the usual default of image libraries.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianBlur {
    kernel: Vec<f32>,
}

impl Default for GaussianBlur {
    /// 51×51 kernel, sigma 3.
    fn default() -> Self {
        Self::new(51, 3.0)
    }
}

impl GaussianBlur {
    /// `size` is forced odd so the kernel has a center tap.
    pub fn new(size: usize, sigma: f32) -> Self {
        let size = size.max(1) | 1;
        let radius = (size / 2) as f32;
        let denom = 2.0 * sigma * sigma;
        let mut kernel: Vec<f32> = (0..size)
            .map(|i| {
                let d = i as f32 - radius;
                (-(d * d) / denom).exp()
            })
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|w| *w /= sum);
        Self { kernel }
    }

    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    pub fn radius(&self) -> usize {
        self.kernel.len() / 2
    }

    /// Blur a row-major `width × height` map.
    pub fn apply(&self, src: &[f32], width: usize, height: usize) -> Vec<f32> {
        debug_assert_eq!(src.len(), width * height);
        let radius = self.radius() as isize;
        let mut rows = vec![0.0f32; src.len()];
        for y in 0..height {
            let line = &src[y * width..(y + 1) * width];
            for x in 0..width {
                let mut acc = 0.0f32;
                for (t, w) in self.kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + t as isize - radius, width);
                    acc += w * line[sx];
                }
                rows[y * width + x] = acc;
            }
        }
        let mut out = vec![0.0f32; src.len()];
        for x in 0..width {
            for y in 0..height {
                let mut acc = 0.0f32;
                for (t, w) in self.kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + t as isize - radius, height);
                    acc += w * rows[sy * width + x];
                }
                out[y * width + x] = acc;
            }
        }
        out
    }
}

/// Map an out-of-range index back into `0..len` by mirroring around the edge samples.
fn reflect_101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        } else {
            i = 2 * len - 2 - i;
        }
    }
    i as usize
}
