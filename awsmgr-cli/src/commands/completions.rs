//! Shell completion generation and installation.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use console::style;
use directories::BaseDirs;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Cli;

const BIN_NAME: &str = "awsmgr";

/// Write the completion script for `shell` to `out`.
pub(crate) fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

/// Detect the user's current shell from environment.
pub(crate) fn detect_shell_type() -> Option<Shell> {
    if let Ok(shell_path) = env::var("SHELL") {
        return shell_from_path(&shell_path);
    }

    if cfg!(windows) && env::var("PSModulePath").is_ok() {
        return Some(Shell::PowerShell);
    }

    None
}

/// Parse a shell binary path into its `Shell` enum.
fn shell_from_path(shell_path: &str) -> Option<Shell> {
    let shell_name = Path::new(shell_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match shell_name {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "pwsh" | "powershell" => Some(Shell::PowerShell),
        _ => None,
    }
}

/// Completion script location for `shell`, relative to the user's directories.
fn completion_install_path(shell: Shell, dirs: &BaseDirs) -> Result<PathBuf> {
    let path = match shell {
        Shell::Bash => dirs
            .data_dir()
            .join("bash-completion")
            .join("completions")
            .join(BIN_NAME),
        Shell::Zsh => dirs.home_dir().join(".zfunc").join(format!("_{BIN_NAME}")),
        Shell::Fish => dirs
            .config_dir()
            .join("fish")
            .join("completions")
            .join(format!("{BIN_NAME}.fish")),
        Shell::PowerShell => match env::var("PROFILE") {
            Ok(profile) => PathBuf::from(&profile)
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
                .join(format!("{BIN_NAME}.ps1")),
            Err(_) => dirs
                .config_dir()
                .join("powershell")
                .join("completions")
                .join(format!("{BIN_NAME}.ps1")),
        },
        Shell::Elvish => dirs
            .config_dir()
            .join("elvish")
            .join("lib")
            .join(format!("{BIN_NAME}.elv")),
        _ => anyhow::bail!("Unsupported shell for auto-install"),
    };
    Ok(path)
}

/// Append the `~/.zfunc` fpath line to `.zshrc` unless it is already there.
///
/// Returns whether the file was changed.
fn ensure_zsh_fpath(zshrc: &Path) -> Result<bool> {
    let fpath_line = "fpath=(~/.zfunc $fpath)";
    let present = fs::read_to_string(zshrc).is_ok_and(|content| content.contains(fpath_line));
    if present {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(zshrc)
        .with_context(|| format!("Failed to update {}", zshrc.display()))?;
    writeln!(file, "\n# {BIN_NAME} completions")?;
    writeln!(file, "{fpath_line}")?;
    writeln!(file, "autoload -Uz compinit && compinit")?;
    Ok(true)
}

/// Install shell completions automatically.
pub(crate) fn install_completions(shell_arg: Option<Shell>) -> Result<()> {
    let shell = match shell_arg {
        Some(s) => s,
        None => detect_shell_type().context(
            "Could not detect your shell. Please specify it explicitly:\n  \
             awsmgr completions --install bash",
        )?,
    };

    let dirs = BaseDirs::new().context("Could not determine home directory")?;
    let path = completion_install_path(shell, &dirs)?;

    let mut buf = Vec::new();
    write_completions(shell, &mut buf);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(&path, &buf)
        .with_context(|| format!("Failed to write completion file: {}", path.display()))?;

    eprintln!(
        "{} Installed {} completions to {}",
        style("✓").green().bold(),
        style(format!("{shell:?}")).cyan(),
        style(path.display()).yellow()
    );

    match shell {
        Shell::Bash => {
            eprintln!();
            eprintln!("Completions will be loaded automatically on new terminals.");
            eprintln!(
                "To activate now: {}",
                style(format!("source {}", path.display())).cyan()
            );
        },
        Shell::Zsh => {
            let zshrc = dirs.home_dir().join(".zshrc");
            if ensure_zsh_fpath(&zshrc)? {
                eprintln!(
                    "{} Added fpath to {}",
                    style("✓").green().bold(),
                    style(zshrc.display()).yellow()
                );
            }
            eprintln!();
            eprintln!("Restart your shell or run: {}", style("exec zsh").cyan());
        },
        Shell::PowerShell => {
            eprintln!();
            eprintln!("Add this to your PowerShell profile to load on startup:");
            eprintln!(
                "  {}",
                style(format!("Import-Module {}", path.display())).cyan()
            );
        },
        _ => {
            eprintln!();
            eprintln!("Completions will be loaded automatically on new {shell:?} sessions.");
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_from_path_known_shells() {
        assert_eq!(shell_from_path("/bin/bash"), Some(Shell::Bash));
        assert_eq!(shell_from_path("/usr/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(shell_from_path("/usr/local/bin/fish"), Some(Shell::Fish));
        assert_eq!(shell_from_path("/usr/bin/elvish"), Some(Shell::Elvish));
        assert_eq!(shell_from_path("/usr/bin/pwsh"), Some(Shell::PowerShell));
        assert_eq!(shell_from_path("zsh"), Some(Shell::Zsh));
    }

    #[test]
    fn test_shell_from_path_unknown() {
        assert_eq!(shell_from_path("/usr/bin/tcsh"), None);
        assert_eq!(shell_from_path(""), None);
    }

    #[test]
    fn test_install_paths_name_the_binary() {
        let Some(dirs) = BaseDirs::new() else {
            return;
        };
        let bash = completion_install_path(Shell::Bash, &dirs).unwrap();
        assert!(bash.ends_with("bash-completion/completions/awsmgr"));

        let zsh = completion_install_path(Shell::Zsh, &dirs).unwrap();
        assert!(zsh.ends_with(".zfunc/_awsmgr"));

        let fish = completion_install_path(Shell::Fish, &dirs).unwrap();
        assert!(fish.ends_with("fish/completions/awsmgr.fish"));

        let elvish = completion_install_path(Shell::Elvish, &dirs).unwrap();
        assert!(elvish.ends_with("elvish/lib/awsmgr.elv"));
    }

    #[test]
    fn test_ensure_zsh_fpath_appends_once() {
        let dir = tempfile::tempdir().unwrap();
        let zshrc = dir.path().join(".zshrc");
        fs::write(&zshrc, "export EDITOR=vi\n").unwrap();

        assert!(ensure_zsh_fpath(&zshrc).unwrap());
        assert!(!ensure_zsh_fpath(&zshrc).unwrap());

        let content = fs::read_to_string(&zshrc).unwrap();
        assert!(content.starts_with("export EDITOR=vi\n"));
        assert_eq!(content.matches("fpath=(~/.zfunc $fpath)").count(), 1);
    }

    #[test]
    fn test_write_completions_mentions_groups() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let mut buf = Vec::new();
            write_completions(shell, &mut buf);
            let output = String::from_utf8(buf).unwrap();
            assert!(output.contains("awsmgr"));
            assert!(output.contains("delete_buckets"));
        }
    }

    #[test]
    fn test_detect_shell_type_does_not_panic() {
        let _ = detect_shell_type();
    }
}
