//! Shell integration script printed by `shai init`.
//!
//! The script only forwards the shell's native hooks to `shai hook ...` and
//! wires the interactive function and widget to `shai ask` / `shai widget`.

use crate::preferences::Preferences;
use anyhow::{Context, Result};
use clap::ValueEnum;
use minijinja::{Environment, context};

const ZSH_TEMPLATE: &str = include_str!("templates/init.zsh.j2");

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Zsh,
}

/// Render the integration for `shell`, invoking the binary at `bin`.
pub fn render(shell: Shell, bin: &str, prefs: &Preferences) -> Result<String> {
    let source = match shell {
        Shell::Zsh => ZSH_TEMPLATE,
    };
    let bin = shlex::try_quote(bin).context("quoting the shai binary path")?;
    let env = Environment::new();
    let tmpl = env
        .template_from_str(source)
        .context("parsing shell integration template")?;
    tmpl.render(context! {
        bin => bin.to_string(),
        history_lines => prefs.history_lines,
        include_aliases => prefs.include_aliases,
        widget_key => prefs.widget_key,
    })
    .context("rendering shell integration")
}
