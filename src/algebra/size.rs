use std::fmt;

/// Shape of a tensor: ordered dimension lengths plus a kernel count.
///
/// `dimensions[0]` is the column count and `dimensions[1]` the row count of
/// the per-kernel matrix view; the kernel count stacks that many equal slices
/// along an implicit trailing axis. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Size {
    dimensions: Vec<usize>,
    kernel_count: usize,
}

impl Size {
    pub fn new(dimensions: impl Into<Vec<usize>>) -> Self {
        Self::with_kernels(dimensions, 1)
    }

    pub fn with_kernels(dimensions: impl Into<Vec<usize>>, kernel_count: usize) -> Self {
        let mut dimensions = dimensions.into();
        if dimensions.is_empty() {
            dimensions.push(0);
        }
        Size {
            dimensions,
            kernel_count: kernel_count.max(1),
        }
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn kernel_count(&self) -> usize {
        self.kernel_count
    }

    /// Number of values in a single kernel slice.
    pub fn length(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Number of values across all kernel slices.
    pub fn total_length(&self) -> usize {
        self.length() * self.kernel_count
    }

    pub(crate) fn columns(&self) -> usize {
        self.dimensions[0]
    }

    pub(crate) fn rows(&self) -> usize {
        self.dimensions.get(1).copied().unwrap_or(1)
    }
}

impl PartialEq for Size {
    fn eq(&self, other: &Self) -> bool {
        self.total_length() == other.total_length() && self.dimensions == other.dimensions
    }
}

impl Eq for Size {}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dimensions = self
            .dimensions
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if self.kernel_count > 1 {
            write!(f, "({}) x{}", dimensions, self.kernel_count)
        } else {
            write!(f, "({})", dimensions)
        }
    }
}
