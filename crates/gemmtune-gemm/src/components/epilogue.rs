use core::fmt::Display;

use serde::{Deserialize, Serialize};

use super::DataType;

/// Activation applied by the epilogue.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    #[serde(alias = "None")]
    None,
    #[serde(alias = "Relu")]
    Relu,
    #[serde(alias = "Gelu")]
    Gelu,
    #[serde(alias = "Silu")]
    Silu,
    #[serde(alias = "Sigmoid")]
    Sigmoid,
    #[serde(alias = "Tanh")]
    Tanh,
    #[serde(alias = "LeakyRelu", alias = "leaky_relu")]
    Leakyrelu,
    #[serde(alias = "Clamp")]
    Clamp,
    #[serde(alias = "Abs")]
    Abs,
    #[serde(alias = "Exp")]
    Exp,
    /// Derivative of gelu.
    #[serde(alias = "DGelu")]
    Dgelu,
}

/// Scalar arguments of parameterized activations.
///
/// `leakyrelu` uses `alpha` as the negative slope, `clamp` bounds values to `[alpha, beta]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationArgs {
    #[serde(default)]
    pub alpha: f32,
    #[serde(default)]
    pub beta: f32,
}

const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;
const GELU_COEF: f64 = 0.044_715;

impl Activation {
    pub fn apply(&self, x: f64, args: &ActivationArgs) -> f64 {
        let (alpha, beta) = (args.alpha as f64, args.beta as f64);

        match self {
            Activation::None => x,
            Activation::Relu => x.max(0.0),
            Activation::Gelu => {
                let inner = SQRT_2_OVER_PI * (x + GELU_COEF * x * x * x);
                0.5 * x * (1.0 + inner.tanh())
            }
            Activation::Silu => x / (1.0 + (-x).exp()),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Leakyrelu => match x > 0.0 {
                true => x,
                false => alpha * x,
            },
            Activation::Clamp => x.max(alpha).min(beta),
            Activation::Abs => x.abs(),
            Activation::Exp => x.exp(),
            Activation::Dgelu => {
                let x3 = x * x * x;
                let inner = SQRT_2_OVER_PI * (x + GELU_COEF * x3);
                let tanh = inner.tanh();
                let sech2 = 1.0 - tanh * tanh;
                0.5 * (1.0 + tanh)
                    + 0.5 * x * sech2 * SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_COEF * x * x)
            }
        }
    }
}

impl Display for Activation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Activation::None => "none",
            Activation::Relu => "relu",
            Activation::Gelu => "gelu",
            Activation::Silu => "silu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Leakyrelu => "leakyrelu",
            Activation::Clamp => "clamp",
            Activation::Abs => "abs",
            Activation::Exp => "exp",
            Activation::Dgelu => "dgelu",
        };
        f.write_str(name)
    }
}

/// Fused operations applied to the product before it is stored in `D`:
///
/// `D = act(alpha * acc + beta * C + bias)`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Epilogue {
    pub mode: EpilogueMode,
    /// Type of the bias vector, `None` meaning the type of `D`.
    pub bias_data_type: Option<DataType>,
    pub args: ActivationArgs,
}

/// Combination of bias and activation performed by the epilogue.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpilogueMode {
    #[default]
    Default,
    Bias,
    Activation(Activation),
    ActivationBias(Activation),
}

impl Epilogue {
    /// An epilogue with the given bias type and activation.
    pub fn new(bias: Option<DataType>, activation: Activation) -> Self {
        let mode = match (bias.is_some(), activation) {
            (false, Activation::None) => EpilogueMode::Default,
            (true, Activation::None) => EpilogueMode::Bias,
            (false, act) => EpilogueMode::Activation(act),
            (true, act) => EpilogueMode::ActivationBias(act),
        };
        Self {
            mode,
            bias_data_type: bias,
            args: ActivationArgs::default(),
        }
    }

    pub fn with_args(mut self, args: ActivationArgs) -> Self {
        self.args = args;
        self
    }

    pub fn has_bias(&self) -> bool {
        matches!(self.mode, EpilogueMode::Bias | EpilogueMode::ActivationBias(_))
    }

    pub fn activation(&self) -> Activation {
        match self.mode {
            EpilogueMode::Activation(act) | EpilogueMode::ActivationBias(act) => act,
            _ => Activation::None,
        }
    }

    /// Type of the bias vector for an output of type `d`.
    pub fn bias_type(&self, d: DataType) -> Option<DataType> {
        self.has_bias().then(|| self.bias_data_type.unwrap_or(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activations_match_closed_forms() {
        let args = ActivationArgs {
            alpha: 0.5,
            beta: 2.0,
        };

        assert_eq!(Activation::Relu.apply(-3.0, &args), 0.0);
        assert_eq!(Activation::Leakyrelu.apply(-3.0, &args), -1.5);
        assert_eq!(Activation::Clamp.apply(5.0, &args), 2.0);
        assert_eq!(Activation::Clamp.apply(-5.0, &args), 0.5);
        assert!((Activation::Gelu.apply(1.0, &args) - 0.841_192).abs() < 1e-4);
        assert!((Activation::Dgelu.apply(0.0, &args) - 0.5).abs() < 1e-6);
        assert!((Activation::Sigmoid.apply(0.0, &args) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn epilogue_mode_follows_options() {
        let epilogue = Epilogue::new(Some(DataType::F32), Activation::Relu);

        assert_eq!(epilogue.mode, EpilogueMode::ActivationBias(Activation::Relu));
        assert_eq!(epilogue.bias_type(DataType::F16), Some(DataType::F32));
        assert_eq!(Epilogue::default().bias_type(DataType::F16), None);
        assert_eq!(
            Epilogue::new(None, Activation::None).mode,
            EpilogueMode::Default
        );
    }
}
