//! # Shell Completion Module
//!
//! Completion scripts through `clap_complete`, plus a hidden
//! `complete-tracks` helper that lists catalog ids for shells that support
//! dynamic candidates.
//!
//! ```bash
//! muse-radio completion bash > ~/.local/share/bash-completion/completions/muse-radio
//! muse-radio completion zsh > ~/.config/zsh/completions/_muse-radio
//! ```

use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

use crate::catalog::Catalog;
use crate::cli::Shell;

/// Write the completion script for `cmd` to `out`.
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

/// Write completions to stdout.
pub fn print_completions(shell: Shell, cmd: &mut Command) {
    generate_completions(shell_to_completion_shell(shell), cmd, &mut io::stdout());
}

#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// One `id<TAB>artist - title` line per catalog track, the format fish
/// uses for described candidates.
pub fn track_completions(catalog: &Catalog) -> Vec<String> {
    catalog
        .all_tracks()
        .iter()
        .map(|t| format!("{}\t{} - {}", t.id, t.artist, t.title))
        .collect()
}

/// Print [`track_completions`] to `out`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn print_track_completions(catalog: &Catalog, out: &mut dyn Write) -> io::Result<()> {
    for line in track_completions(catalog) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
