use crate::components::{Activation, ActivationArgs, GemmProblem, Operand};

use super::elem::encode_at;
use super::host::OperandLayout;

/// Scalars and vectors applied around the product:
///
/// `D = act(alpha * scale_a * scale_b * sav[i] * acc + beta * scale_c * C + bias[i]) * scale_d`
#[derive(Clone, Debug, PartialEq)]
pub struct GemmArgs {
    pub alpha: f64,
    pub beta: f64,
    /// Multiplier applied to `A` before it is cast back to its storage type.
    pub quant_a: f64,
    /// Multiplier applied to `B` before it is cast back to its storage type.
    pub quant_b: f64,
    pub scale_a: f64,
    pub scale_b: f64,
    pub scale_c: f64,
    pub scale_d: f64,
    /// One alpha multiplier per row.
    pub scale_alpha_vec: Option<Vec<f64>>,
    /// One bias per row.
    pub bias: Option<Vec<f64>>,
    pub activation: Activation,
    pub activation_args: ActivationArgs,
}

impl GemmArgs {
    /// Plain `D = alpha * A * B + beta * C`.
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            quant_a: 1.0,
            quant_b: 1.0,
            scale_a: 1.0,
            scale_b: 1.0,
            scale_c: 1.0,
            scale_d: 1.0,
            scale_alpha_vec: None,
            bias: None,
            activation: Activation::None,
            activation_args: ActivationArgs::default(),
        }
    }

    /// The output of row `row` before `scale_d` is applied.
    pub fn value(&self, row: usize, acc: f64, c: f64) -> f64 {
        let sav = self
            .scale_alpha_vec
            .as_ref()
            .and_then(|sav| sav.get(row))
            .copied()
            .unwrap_or(1.0);
        let mut value = self.alpha * self.scale_a * self.scale_b * sav * acc;
        // C isn't read when beta is zero, it may hold anything.
        if self.beta != 0.0 {
            value += self.beta * self.scale_c * c;
        }
        if let Some(bias) = self.bias.as_ref().and_then(|bias| bias.get(row)) {
            value += bias;
        }
        self.activation.apply(value, &self.activation_args)
    }
}

/// Apply the epilogue to the accumulators and store them in `d`.
///
/// `acc` holds `batch x m x n` values row by row, `c` the decoded `C` buffer. Returns the
/// absolute maximum of the output before `scale_d` is applied.
pub fn store_output(
    problem: &GemmProblem,
    args: &GemmArgs,
    acc: &[f64],
    c: &[f64],
    d: &mut [u8],
) -> f64 {
    let layout_c = OperandLayout::of(problem, Operand::C);
    let layout_d = OperandLayout::of(problem, Operand::D);
    let (m, n) = (problem.m, problem.n);
    let mut amax = 0.0f64;

    for batch in 0..problem.batch {
        for i in 0..m {
            for j in 0..n {
                let c = c.get(layout_c.index(batch, i, j)).copied().unwrap_or(0.0);
                let value = args.value(i, acc[(batch * m + i) * n + j], c);
                amax = amax.max(value.abs());
                encode_at(
                    problem.elems.d,
                    d,
                    layout_d.index(batch, i, j),
                    value * args.scale_d,
                );
            }
        }
    }

    amax
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DataType, GemmElems, Transpose};
    use crate::kernels::elem::decode;
    use pretty_assertions::assert_eq;

    #[test]
    fn value_applies_every_term() {
        let mut args = GemmArgs::new(2.0, 0.5);
        args.scale_a = 0.5;
        args.scale_b = 3.0;
        args.scale_c = 2.0;
        args.scale_alpha_vec = Some(vec![1.0, 10.0]);
        args.bias = Some(vec![0.0, -100.0]);
        args.activation = Activation::Relu;

        // 2 * 0.5 * 3 * 10 * 4 + 0.5 * 2 * 6 - 100
        assert_eq!(args.value(1, 4.0, 6.0), 26.0);
        assert_eq!(args.value(0, -4.0, 6.0), 0.0);
    }

    #[test]
    fn zero_beta_ignores_c() {
        let args = GemmArgs::new(1.0, 0.0);
        assert_eq!(args.value(0, 1.0, f64::NAN), 1.0);
    }

    #[test]
    fn store_keeps_padding_and_reports_amax() {
        let problem = GemmProblem::new(
            1,
            2,
            1,
            1,
            Transpose::N,
            Transpose::N,
            GemmElems::uniform(DataType::F32),
        )
        .with_leading_dims(1, 1, 1, 2);
        let mut args = GemmArgs::new(1.0, 0.0);
        args.scale_d = 0.5;
        let mut d = crate::kernels::elem::encode(DataType::F32, &[9.0; 4]);

        let amax = store_output(&problem, &args, &[-4.0, 2.0], &[], &mut d);

        assert_eq!(amax, 4.0);
        assert_eq!(decode(DataType::F32, &d), vec![-2.0, 9.0, 1.0, 9.0]);
    }
}
