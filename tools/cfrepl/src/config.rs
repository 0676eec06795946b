use std::{
    fs,
    path::{Path, PathBuf},
};

use cellforth::VmParams;
use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;

/// Settings read from a `--config` TOML file.
///
/// ```toml
/// boot = "my-boot.fs"
///
/// [vm]
/// heap_size = 4194304
/// stack_cells = 256
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplConfig {
    #[serde(default)]
    pub vm: VmParams,
    /// Boot program to load instead of the built-in one.
    pub boot: Option<PathBuf>,
}

impl ReplConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_toml(&text)
            .wrap_err_with(|| format!("failed to parse config file '{}'", path.display()))
    }

    fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).into_diagnostic()
    }
}

#[derive(Clone, Debug, Default, Args)]
#[command(next_help_heading = "VM Options")]
pub struct VmOptions {
    /// Size of the VM heap in bytes.
    #[clap(long)]
    heap_size: Option<usize>,

    /// Capacity of each of the data, return and float stacks, in cells.
    #[clap(long)]
    stack_cells: Option<usize>,

    /// Longest input line accepted, in bytes.
    #[clap(long)]
    input_buf_elems: Option<usize>,

    /// Output buffered per line, in bytes.
    #[clap(long)]
    output_buf_elems: Option<usize>,
}

impl VmOptions {
    /// Overrides `params` with every option given on the command line.
    pub fn apply(&self, params: VmParams) -> VmParams {
        let mut params = params;
        if let Some(n) = self.heap_size {
            params = params.with_heap_size(n);
        }
        if let Some(n) = self.stack_cells {
            params = params.with_stack_cells(n);
        }
        if let Some(n) = self.input_buf_elems {
            params = params.with_input_buf_elems(n);
        }
        if let Some(n) = self.output_buf_elems {
            params = params.with_output_buf_elems(n);
        }
        params
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_vm_table_keeps_defaults() {
        let config = ReplConfig::from_toml(
            r#"
            boot = "other.fs"

            [vm]
            stack_cells = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.boot, Some(PathBuf::from("other.fs")));
        assert_eq!(config.vm.stack_cells, 64);
        assert_eq!(config.vm.heap_size, VmParams::DEFAULT_HEAP_SIZE);
        assert_eq!(config.vm.output_buf_elems, VmParams::DEFAULT_OUTPUT_BUF_ELEMS);
    }

    #[test]
    fn empty_config() {
        let config = ReplConfig::from_toml("").unwrap();
        assert_eq!(config.vm, VmParams::new());
        assert!(config.boot.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ReplConfig::from_toml("[vm]\nheap = 1\n").is_err());
        assert!(ReplConfig::from_toml("colour = true\n").is_err());
    }

    #[test]
    fn flags_win() {
        let opts = VmOptions {
            heap_size: Some(8192),
            ..VmOptions::default()
        };
        let params = opts.apply(VmParams::new().with_heap_size(4096).with_stack_cells(32));
        assert_eq!(params.heap_size, 8192);
        assert_eq!(params.stack_cells, 32);
    }
}
