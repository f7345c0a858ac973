use crate::components::{DataType, GemmProblem, Operand, Transpose};

use super::elem::{decode, round_to};

/// Accumulation type of the host kernels.
///
/// Integer accumulators wrap on overflow like the matrix cores do.
pub trait Accumulate: bytemuck::Pod + Default + Send + Sync + 'static {
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn add(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;

    /// `self + x * y`.
    fn fma(self, x: Self, y: Self) -> Self {
        self.add(x.mul(y))
    }
}

impl Accumulate for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }
}

impl Accumulate for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }
}

impl Accumulate for i32 {
    fn from_f64(value: f64) -> Self {
        value.round() as i32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }

    fn mul(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }
}

/// How the elements of a stored operand are addressed.
#[derive(new, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperandLayout {
    pub rows: usize,
    pub cols: usize,
    pub ld: usize,
    pub batch_stride: usize,
    pub batch: usize,
}

impl OperandLayout {
    pub fn of(problem: &GemmProblem, operand: Operand) -> Self {
        let (rows, cols) = problem.stored_shape(operand);
        Self::new(
            rows,
            cols,
            problem.ld(operand),
            problem.batch_stride(operand),
            problem.batch,
        )
    }

    /// Element index of the stored `(row, col)` of a batch.
    pub fn index(&self, batch: usize, row: usize, col: usize) -> usize {
        batch * self.batch_stride + col * self.ld + row
    }

    /// Every element index of the operand, batch by batch and column by column.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.batch).flat_map(move |batch| {
            (0..self.cols)
                .flat_map(move |col| (0..self.rows).map(move |row| self.index(batch, row, col)))
        })
    }
}

/// Operands converted to the accumulation type.
///
/// `a` holds `op(A)` row by row (`batch x m x k`) and `bt` holds `op(B)` column by column
/// (`batch x n x k`), so every output element is the dot product of two contiguous slices.
pub struct HostOperands<A> {
    pub a: Vec<A>,
    pub bt: Vec<A>,
}

/// Decode the inputs and convert them to the precision the product is computed in.
///
/// Inputs are multiplied by their quantization factor and cast back to their storage type,
/// mixed inputs are cast to the narrower type and fast compute types cast to their input type.
pub fn load_operands<A: Accumulate>(
    problem: &GemmProblem,
    a: &[u8],
    b: &[u8],
    quant_a: f64,
    quant_b: f64,
) -> HostOperands<A> {
    let (m, n, k, batch) = (problem.m, problem.n, problem.k, problem.batch);
    let convert_a = converter(problem, problem.elems.a, quant_a);
    let convert_b = converter(problem, problem.elems.b, quant_b);

    let a_values = decode(problem.elems.a, a);
    let layout_a = OperandLayout::of(problem, Operand::A);
    let mut op_a = Vec::with_capacity(batch * m * k);
    for bat in 0..batch {
        for i in 0..m {
            for l in 0..k {
                let index = match problem.trans_a {
                    Transpose::N => layout_a.index(bat, i, l),
                    Transpose::T => layout_a.index(bat, l, i),
                };
                op_a.push(convert_a(a_values[index]));
            }
        }
    }

    let b_values = decode(problem.elems.b, b);
    let layout_b = OperandLayout::of(problem, Operand::B);
    let mut op_bt = Vec::with_capacity(batch * n * k);
    for bat in 0..batch {
        for j in 0..n {
            for l in 0..k {
                let index = match problem.trans_b {
                    Transpose::N => layout_b.index(bat, l, j),
                    Transpose::T => layout_b.index(bat, j, l),
                };
                op_bt.push(convert_b(b_values[index]));
            }
        }
    }

    HostOperands {
        a: op_a,
        bt: op_bt,
    }
}

fn converter<A: Accumulate>(
    problem: &GemmProblem,
    ty: DataType,
    quant: f64,
) -> impl Fn(f64) -> A + use<A> {
    let narrow = problem.elems.is_mixed().then(|| problem.elems.narrow_input());
    let fast = problem.elems.compute.fast_input();

    move |value| {
        let mut value = value;
        if quant != 1.0 {
            value = round_to(ty, value * quant);
        }
        if let Some(narrow) = narrow {
            value = round_to(narrow, value);
        }
        if let Some(fast) = fast {
            value = round_to(fast, value);
        }
        A::from_f64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ComputeType, GemmElems};
    use crate::kernels::elem::encode;
    use pretty_assertions::assert_eq;

    #[test]
    fn transposed_operands_are_gathered() {
        // Stored column major: A^T is k x m = 3 x 2.
        let problem = GemmProblem::new(
            2,
            1,
            3,
            1,
            Transpose::T,
            Transpose::N,
            GemmElems::uniform(DataType::F32),
        );
        let a = encode(DataType::F32, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = encode(DataType::F32, &[1.0, 1.0, 1.0]);

        let ops = load_operands::<f32>(&problem, &a, &b, 1.0, 1.0);

        assert_eq!(ops.a, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(ops.bt, vec![1.0, 1.0, 1.0]);

        let problem = GemmProblem::new(
            2,
            1,
            3,
            1,
            Transpose::N,
            Transpose::N,
            GemmElems::uniform(DataType::F32),
        );
        let ops = load_operands::<f32>(&problem, &a, &b, 1.0, 1.0);
        assert_eq!(ops.a, vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn mixed_inputs_are_cast_to_the_narrow_type() {
        let problem = GemmProblem::new(
            1,
            1,
            1,
            1,
            Transpose::N,
            Transpose::N,
            GemmElems::new(
                DataType::F8Fnuz,
                DataType::F16,
                DataType::F16,
                DataType::F16,
                ComputeType::F32,
            ),
        );
        let a = encode(DataType::F8Fnuz, &[2.0]);
        let b = encode(DataType::F16, &[1.0 + 1.0 / 64.0]);

        let ops = load_operands::<f32>(&problem, &a, &b, 1.0, 1.0);
        assert_eq!(ops.bt, vec![1.0]);

        let ops = load_operands::<f32>(&problem, &a, &b, 300.0, 1.0);
        assert_eq!(ops.a, vec![240.0]);
    }

    #[test]
    fn integer_accumulation_wraps() {
        let sum = i32::MAX.fma(2, 3);
        assert_eq!(sum, i32::MAX.wrapping_add(6));
        assert_eq!(Accumulate::add(1.5f32, 2.0), 3.5);
    }

    #[test]
    fn layout_indices_skip_padding() {
        let layout = OperandLayout::new(2, 2, 3, 7, 2);
        let indices: Vec<_> = layout.indices().collect();
        assert_eq!(indices, vec![0, 1, 3, 4, 7, 8, 10, 11]);
    }
}
