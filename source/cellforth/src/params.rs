#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sizes of everything a [`Vm`](crate::Vm) allocates up front.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[non_exhaustive]
pub struct VmParams {
    /// Size of the heap in bytes. Stacks, dictionary and compiled code all
    /// come out of it.
    #[cfg_attr(feature = "serde", serde(default = "VmParams::default_heap_size"))]
    pub heap_size: usize,
    /// Capacity of each of the data, return and float stacks.
    #[cfg_attr(feature = "serde", serde(default = "VmParams::default_stack_cells"))]
    pub stack_cells: usize,
    /// Longest line the host can feed in one go.
    #[cfg_attr(
        feature = "serde",
        serde(default = "VmParams::default_input_buf_elems")
    )]
    pub input_buf_elems: usize,
    #[cfg_attr(
        feature = "serde",
        serde(default = "VmParams::default_output_buf_elems")
    )]
    pub output_buf_elems: usize,
}

impl VmParams {
    pub const DEFAULT_HEAP_SIZE: usize = 1024 * 1024;
    pub const DEFAULT_STACK_CELLS: usize = 1024;
    pub const DEFAULT_INPUT_BUF_ELEMS: usize = 1024;
    pub const DEFAULT_OUTPUT_BUF_ELEMS: usize = 4096;

    #[allow(dead_code)]
    const fn default_heap_size() -> usize {
        Self::DEFAULT_HEAP_SIZE
    }
    #[allow(dead_code)]
    const fn default_stack_cells() -> usize {
        Self::DEFAULT_STACK_CELLS
    }
    #[allow(dead_code)]
    const fn default_input_buf_elems() -> usize {
        Self::DEFAULT_INPUT_BUF_ELEMS
    }
    #[allow(dead_code)]
    const fn default_output_buf_elems() -> usize {
        Self::DEFAULT_OUTPUT_BUF_ELEMS
    }

    pub const fn new() -> Self {
        Self {
            heap_size: Self::DEFAULT_HEAP_SIZE,
            stack_cells: Self::DEFAULT_STACK_CELLS,
            input_buf_elems: Self::DEFAULT_INPUT_BUF_ELEMS,
            output_buf_elems: Self::DEFAULT_OUTPUT_BUF_ELEMS,
        }
    }

    pub const fn with_heap_size(self, heap_size: usize) -> Self {
        Self { heap_size, ..self }
    }

    pub const fn with_stack_cells(self, stack_cells: usize) -> Self {
        Self {
            stack_cells,
            ..self
        }
    }

    pub const fn with_input_buf_elems(self, input_buf_elems: usize) -> Self {
        Self {
            input_buf_elems,
            ..self
        }
    }

    pub const fn with_output_buf_elems(self, output_buf_elems: usize) -> Self {
        Self {
            output_buf_elems,
            ..self
        }
    }
}

impl Default for VmParams {
    fn default() -> Self {
        Self::new()
    }
}
