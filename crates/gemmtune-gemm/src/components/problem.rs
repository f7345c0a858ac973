use serde::{Deserialize, Serialize};

use super::{ComputeType, DataType, Epilogue, FormattedConfigError, GemmSetupError, Transpose};

/// Element types of a GEMM: `D = alpha * op(A) * op(B) + beta * C`.
#[derive(new, Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemmElems {
    pub a: DataType,
    pub b: DataType,
    pub c: DataType,
    pub d: DataType,
    pub compute: ComputeType,
}

impl GemmElems {
    /// Same type for every operand, with the default accumulation for that type.
    pub fn uniform(ty: DataType) -> Self {
        Self::new(ty, ty, ty, ty, ty.into())
    }

    /// Whether `A` and `B` have different types.
    pub fn is_mixed(&self) -> bool {
        self.a != self.b
    }

    /// The narrower of the two input types, which mixed inputs are both cast to.
    pub fn narrow_input(&self) -> DataType {
        match self.a.size() <= self.b.size() {
            true => self.a,
            false => self.b,
        }
    }
}

/// Optional scaling buffers bound to the problem.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemmScaling {
    /// Scalar scale factors for `A` and `B`.
    pub scale_ab: bool,
    /// Scalar scale factors for `C` and `D`.
    pub scale_cd: bool,
    /// One alpha multiplier per row of `D`.
    pub scale_alpha_vec: bool,
    /// The absolute maximum of `D` is written to a scalar buffer.
    pub amax_d: bool,
}

/// Distance in elements between two consecutive batches of each operand.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStrides {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d: usize,
}

/// Description of a GEMM to solve, regardless of actual data.
///
/// Matrices are column major: the element `(row, col)` of an operand stored with leading
/// dimension `ld` is at `row + col * ld`. `op(A)` is `m x k` and `op(B)` is `k x n`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GemmProblem {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub batch: usize,
    pub trans_a: Transpose,
    pub trans_b: Transpose,
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
    pub ldd: usize,
    pub strides: BatchStrides,
    pub elems: GemmElems,
    pub epilogue: Epilogue,
    pub scaling: GemmScaling,
}

/// One of the matrices of a GEMM.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Operand {
    A,
    B,
    C,
    D,
}

impl GemmProblem {
    /// A packed problem: leading dimensions and batch strides are the smallest valid ones.
    pub fn new(
        m: usize,
        n: usize,
        k: usize,
        batch: usize,
        trans_a: Transpose,
        trans_b: Transpose,
        elems: GemmElems,
    ) -> Self {
        let lda = match trans_a {
            Transpose::N => m,
            Transpose::T => k,
        };
        let ldb = match trans_b {
            Transpose::N => k,
            Transpose::T => n,
        };
        let mut problem = Self {
            m,
            n,
            k,
            batch,
            trans_a,
            trans_b,
            lda,
            ldb,
            ldc: m,
            ldd: m,
            strides: BatchStrides {
                a: 0,
                b: 0,
                c: 0,
                d: 0,
            },
            elems,
            epilogue: Epilogue::default(),
            scaling: GemmScaling::default(),
        };
        problem.strides = problem.packed_strides();
        problem
    }

    pub fn with_epilogue(mut self, epilogue: Epilogue) -> Self {
        self.epilogue = epilogue;
        self
    }

    pub fn with_scaling(mut self, scaling: GemmScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Set the leading dimensions, updating the batch strides to stay packed.
    pub fn with_leading_dims(mut self, lda: usize, ldb: usize, ldc: usize, ldd: usize) -> Self {
        self.lda = lda;
        self.ldb = ldb;
        self.ldc = ldc;
        self.ldd = ldd;
        self.strides = self.packed_strides();
        self
    }

    /// Saturates on overflow, which [validate](Self::validate) then reports.
    fn packed_strides(&self) -> BatchStrides {
        let stride = |operand| self.ld(operand).saturating_mul(self.stored_shape(operand).1);
        BatchStrides {
            a: stride(Operand::A),
            b: stride(Operand::B),
            c: stride(Operand::C),
            d: stride(Operand::D),
        }
    }

    /// Shape `(rows, cols)` of the operand as it is stored in memory.
    pub fn stored_shape(&self, operand: Operand) -> (usize, usize) {
        match operand {
            Operand::A => match self.trans_a {
                Transpose::N => (self.m, self.k),
                Transpose::T => (self.k, self.m),
            },
            Operand::B => match self.trans_b {
                Transpose::N => (self.k, self.n),
                Transpose::T => (self.n, self.k),
            },
            Operand::C | Operand::D => (self.m, self.n),
        }
    }

    pub fn ld(&self, operand: Operand) -> usize {
        match operand {
            Operand::A => self.lda,
            Operand::B => self.ldb,
            Operand::C => self.ldc,
            Operand::D => self.ldd,
        }
    }

    pub fn batch_stride(&self, operand: Operand) -> usize {
        match operand {
            Operand::A => self.strides.a,
            Operand::B => self.strides.b,
            Operand::C => self.strides.c,
            Operand::D => self.strides.d,
        }
    }

    pub fn data_type(&self, operand: Operand) -> DataType {
        match operand {
            Operand::A => self.elems.a,
            Operand::B => self.elems.b,
            Operand::C => self.elems.c,
            Operand::D => self.elems.d,
        }
    }

    /// Number of elements a buffer must hold for the operand, `None` when it overflows.
    pub fn checked_num_elems(&self, operand: Operand) -> Option<usize> {
        let (rows, cols) = self.stored_shape(operand);
        if rows == 0 || cols == 0 || self.batch == 0 {
            return Some(0);
        }
        self.batch_stride(operand)
            .checked_mul(self.batch - 1)?
            .checked_add(self.ld(operand).checked_mul(cols - 1)?)?
            .checked_add(rows)
    }

    /// Number of bytes a buffer must hold for the operand, `None` when it overflows.
    pub fn checked_num_bytes(&self, operand: Operand) -> Option<usize> {
        self.checked_num_elems(operand)?
            .checked_mul(self.data_type(operand).size())
    }

    /// Number of elements a buffer must hold for the operand, saturating on overflow.
    pub fn num_elems(&self, operand: Operand) -> usize {
        self.checked_num_elems(operand).unwrap_or(usize::MAX)
    }

    /// Number of bytes a buffer must hold for the operand, saturating on overflow.
    pub fn num_bytes(&self, operand: Operand) -> usize {
        self.checked_num_bytes(operand).unwrap_or(usize::MAX)
    }

    /// Whether more than one batch is computed.
    pub fn is_batched(&self) -> bool {
        self.batch > 1
    }

    /// Number of floating point operations of the product.
    pub fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64 * self.batch as f64
    }

    pub fn kind(&self) -> GemmKind {
        self.into()
    }

    /// Check that the problem describes a computable GEMM.
    pub fn validate(&self) -> Result<(), GemmSetupError> {
        if self.m == 0 || self.n == 0 || self.k == 0 || self.batch == 0 {
            let (m, n, k, batch) = (self.m, self.n, self.k, self.batch);
            return Err(FormattedConfigError::new(move || {
                format!("Sizes must be non-zero, got m={m} n={n} k={k} batch={batch}")
            })
            .into());
        }

        for operand in [Operand::A, Operand::B, Operand::C, Operand::D] {
            let rows = self.stored_shape(operand).0;
            let ld = self.ld(operand);
            if ld < rows {
                return Err(FormattedConfigError::new(move || {
                    format!("Leading dimension of {operand:?} is {ld}, should be at least {rows}")
                })
                .into());
            }
            if self.checked_num_bytes(operand).is_none() {
                return Err(FormattedConfigError::new(move || {
                    format!("{operand:?} is larger than the address space")
                })
                .into());
            }
        }

        let elems = self.elems;
        let integer_inputs = elems.a.is_integer() || elems.b.is_integer();
        let valid_compute = match elems.compute {
            ComputeType::I32 => elems.a == DataType::I8 && elems.b == DataType::I8,
            ComputeType::F64 => elems.a == DataType::F64 && elems.b == DataType::F64,
            _ => !integer_inputs && elems.a != DataType::F64 && elems.b != DataType::F64,
        };
        if !valid_compute {
            return Err(FormattedConfigError::new(move || {
                format!(
                    "Compute type {:?} can't be used with inputs {}/{}",
                    elems.compute, elems.a, elems.b
                )
            })
            .into());
        }

        Ok(())
    }
}

/// Interpretation of a GEMM based on its sizes.
#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum GemmKind {
    /// (M, K) @ (K, N) → (M, N), with M, K, N > 1
    General,

    /// (M, K) @ (K, 1) → (M, 1)
    MatVec,

    /// (1, K) @ (K, N) → (1, N)
    VecMat,

    /// (1, 1) @ (1, N) → (1, N)
    ScalarVec,

    /// (M, 1) @ (1, 1) → (M, 1)
    VecScalar,

    /// (1, K) @ (K, 1) → (1, 1)
    InnerProduct,

    /// (M, 1) @ (1, N) → (M, N)
    OuterProduct,

    /// (1, 1) @ (1, 1) → (1, 1)
    ScalarProduct,
}

impl From<&GemmProblem> for GemmKind {
    fn from(problem: &GemmProblem) -> Self {
        enum DimKind {
            Scalar,
            Vector,
        }

        impl From<usize> for DimKind {
            fn from(x: usize) -> Self {
                match x {
                    1 => DimKind::Scalar,
                    _ => DimKind::Vector,
                }
            }
        }

        use DimKind::*;
        match (problem.m.into(), problem.n.into(), problem.k.into()) {
            (Scalar, Scalar, Scalar) => GemmKind::ScalarProduct,
            (Scalar, Scalar, Vector) => GemmKind::InnerProduct,
            (Scalar, Vector, Scalar) => GemmKind::ScalarVec,
            (Scalar, Vector, Vector) => GemmKind::VecMat,
            (Vector, Scalar, Scalar) => GemmKind::VecScalar,
            (Vector, Scalar, Vector) => GemmKind::MatVec,
            (Vector, Vector, Scalar) => GemmKind::OuterProduct,
            (Vector, Vector, Vector) => GemmKind::General,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn problem(trans_a: Transpose, trans_b: Transpose) -> GemmProblem {
        GemmProblem::new(8, 4, 16, 3, trans_a, trans_b, GemmElems::uniform(DataType::F32))
    }

    #[test]
    fn packed_leading_dims_follow_transposes() {
        let nn = problem(Transpose::N, Transpose::N);
        assert_eq!((nn.lda, nn.ldb, nn.ldc), (8, 16, 8));
        assert_eq!(nn.strides.a, 8 * 16);

        let tt = problem(Transpose::T, Transpose::T);
        assert_eq!((tt.lda, tt.ldb), (16, 4));
        assert_eq!(tt.stored_shape(Operand::A), (16, 8));
        assert_eq!(tt.num_elems(Operand::B), 4 * 16 * 3);
    }

    #[test]
    fn padded_leading_dims_grow_buffers() {
        let problem = problem(Transpose::N, Transpose::N).with_leading_dims(10, 16, 8, 8);

        assert_eq!(problem.strides.a, 10 * 16);
        assert_eq!(problem.num_elems(Operand::A), 10 * 16 * 2 + 10 * 15 + 8);
        assert_eq!(problem.num_bytes(Operand::D), 8 * 4 * 3 * 4);
    }

    #[test]
    fn validation_rejects_degenerate_problems() {
        assert!(problem(Transpose::N, Transpose::T).validate().is_ok());

        let mut zero = problem(Transpose::N, Transpose::N);
        zero.k = 0;
        assert!(zero.validate().is_err());

        let short_ld = problem(Transpose::N, Transpose::N).with_leading_dims(4, 16, 8, 8);
        assert!(short_ld.validate().is_err());

        let float_int = GemmProblem::new(
            8,
            8,
            8,
            1,
            Transpose::N,
            Transpose::N,
            GemmElems::new(
                DataType::F16,
                DataType::F16,
                DataType::F16,
                DataType::F16,
                ComputeType::I32,
            ),
        );
        assert!(float_int.validate().is_err());
    }

    #[test]
    fn overflowing_buffers_are_invalid() {
        let huge = 1 << 33;
        let problem = GemmProblem::new(
            huge,
            huge,
            64,
            2,
            Transpose::N,
            Transpose::N,
            GemmElems::uniform(DataType::F32),
        );

        assert_eq!(problem.checked_num_bytes(Operand::D), None);
        assert_eq!(problem.num_bytes(Operand::D), usize::MAX);
        let err = problem.validate().unwrap_err();
        assert!(err.to_string().contains("address space"), "{err}");
    }

    #[test]
    fn kind_from_sizes() {
        let mut problem = problem(Transpose::N, Transpose::N);
        assert_eq!(problem.kind(), GemmKind::General);
        problem.n = 1;
        assert_eq!(problem.kind(), GemmKind::MatVec);
        problem.m = 1;
        assert_eq!(problem.kind(), GemmKind::InnerProduct);
    }
}
