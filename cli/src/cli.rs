use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;

/// Submits a batch of operations to a fresh space and streams the resulting
/// events to stdout, prompting for approval decisions as the run suspends.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Path to a JSON file containing either a full operations envelope
    /// (`{"protocolVersion": "1.0", "operations": [...]}`) or a bare array of
    /// operations, which is wrapped with the current protocol version.
    pub batch: PathBuf,

    /// Policy preset the space is created with.
    #[arg(long, value_enum, default_value_t = Preset::Standard)]
    pub preset: Preset,

    /// Human-readable name recorded on the space.
    #[arg(long)]
    pub name: Option<String>,

    /// Overrides the preset's base container image.
    #[arg(long)]
    pub base_image: Option<String>,

    /// Host directory under which the space's workspace is created.
    /// Defaults to `WORKSPACE_BASE_DIR`, then a temp directory.
    #[arg(long)]
    pub workspace_base_dir: Option<PathBuf>,

    /// How `approvalRequired` suspensions are resolved.
    #[arg(long, value_enum, default_value_t = ApprovalMode::Interactive)]
    pub approve: ApprovalMode,

    /// Leave the space's container running after the run completes instead
    /// of destroying it.
    #[arg(long, default_value_t = false)]
    pub keep: bool,

    /// Specifies color settings for use in the output.
    #[arg(long, value_enum, default_value_t = Color::Auto)]
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Preset {
    Restrictive,
    Standard,
    Permissive,
}

impl From<Preset> for spacehost_protocol::PresetName {
    fn from(value: Preset) -> Self {
        match value {
            Preset::Restrictive => spacehost_protocol::PresetName::Restrictive,
            Preset::Standard => spacehost_protocol::PresetName::Standard,
            Preset::Permissive => spacehost_protocol::PresetName::Permissive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ApprovalMode {
    /// Prompt on stdin for every `approvalRequired` suspension.
    Interactive,
    /// Approve every suspension automatically.
    ApproveAll,
    /// Deny every suspension automatically.
    DenyAll,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Color {
    Always,
    Never,
    #[default]
    Auto,
}

impl Color {
    pub fn use_ansi(self) -> bool {
        match self {
            Color::Always => true,
            Color::Never => false,
            Color::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }
}
