use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;

use crate::components::GemmProblem;

use super::{KernelSpec, Rejection, builtin_kernels};

/// Ordered registry of kernels, indexed by name.
///
/// The position of a kernel is its algorithm index, and ties of the heuristic are broken by it.
#[derive(Clone, Debug, Default)]
pub struct KernelCatalog {
    kernels: Vec<KernelSpec>,
    indices: HashMap<String, usize>,
}

static BUILTIN: OnceLock<Arc<KernelCatalog>> = OnceLock::new();

impl KernelCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default kernels for the supported architectures.
    pub fn builtin() -> Self {
        builtin_kernels().into_iter().collect()
    }

    /// The builtin catalog, shared by every user.
    pub fn shared_builtin() -> Arc<Self> {
        BUILTIN.get_or_init(|| Arc::new(Self::builtin())).clone()
    }

    /// Add a kernel, returning its index. Registering an existing name returns the existing
    /// index and keeps the catalog unchanged.
    pub fn register(&mut self, kernel: KernelSpec) -> usize {
        let name = kernel.name();
        if let Some(index) = self.indices.get(&name) {
            return *index;
        }

        let index = self.kernels.len();
        self.kernels.push(kernel);
        self.indices.insert(name, index);
        index
    }

    pub fn get(&self, name: &str) -> Option<&KernelSpec> {
        self.index_of(name).map(|index| &self.kernels[index])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    pub fn kernel(&self, index: usize) -> Option<&KernelSpec> {
        self.kernels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KernelSpec> {
        self.kernels.iter()
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Kernels able to solve the problem on the given architecture, with their index.
    pub fn compatible<'a>(
        &'a self,
        problem: &'a GemmProblem,
        arch: &'a str,
    ) -> impl Iterator<Item = (usize, &'a KernelSpec)> + 'a {
        self.kernels
            .iter()
            .enumerate()
            .filter(move |(_, kernel)| kernel.supports(problem, arch).is_ok())
    }

    /// Why every incompatible kernel can't solve the problem.
    pub fn rejections(&self, problem: &GemmProblem, arch: &str) -> Vec<(String, Rejection)> {
        self.kernels
            .iter()
            .filter_map(|kernel| {
                kernel
                    .supports(problem, arch)
                    .err()
                    .map(|reason| (kernel.name(), reason))
            })
            .collect()
    }
}

impl FromIterator<KernelSpec> for KernelCatalog {
    fn from_iter<T: IntoIterator<Item = KernelSpec>>(iter: T) -> Self {
        let mut catalog = Self::new();
        catalog.extend(iter);
        catalog
    }
}

impl Extend<KernelSpec> for KernelCatalog {
    fn extend<T: IntoIterator<Item = KernelSpec>>(&mut self, iter: T) {
        for kernel in iter {
            self.register(kernel);
        }
    }
}
