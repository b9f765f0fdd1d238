//! Free-form invocation parsing for the command layer
//!
//! Turns `name [flags] command...` text into a start request. Flags are only
//! recognized before the first command token; a leading `cd DIR && rest`
//! becomes the working-directory option.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::job::StartOptions;

/// A parsed start invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub cmd: Vec<String>,
    pub opts: StartOptions,
}

/// Parse free-form invocation text into a start request
pub fn parse_invocation(text: &str) -> Result<Invocation> {
    let mut tokens = text.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| Error::Invocation("missing job name".to_string()))?
        .to_string();

    let mut opts = StartOptions::default();
    let mut cmd: Vec<String> = Vec::new();

    for token in tokens {
        if cmd.is_empty() {
            match token {
                "--pty" => {
                    opts.pty = true;
                    continue;
                }
                "--ansi" => {
                    opts.clean_ansi = true;
                    continue;
                }
                "--raw" => {
                    opts.clean_ansi = false;
                    continue;
                }
                "--restart" => {
                    opts.auto_restart = true;
                    continue;
                }
                t if t.starts_with("--cwd=") => {
                    opts.cwd = Some(PathBuf::from(&t["--cwd=".len()..]));
                    continue;
                }
                t if t.starts_with("--") => {
                    return Err(Error::Invocation(format!("unknown flag: {t}")));
                }
                _ => {}
            }
        }
        cmd.push(token.to_string());
    }

    // a leading `cd DIR &&` prefix becomes the working directory
    if cmd.len() > 3 && cmd[0] == "cd" && cmd[2] == "&&" {
        opts.cwd = Some(PathBuf::from(&cmd[1]));
        cmd.drain(..3);
    }

    if cmd.is_empty() {
        return Err(Error::Invocation("missing command".to_string()));
    }

    Ok(Invocation { name, cmd, opts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_name_and_command() {
        let inv = parse_invocation("web npm run dev").unwrap();
        assert_eq!(inv.name, "web");
        assert_eq!(inv.cmd, vec!["npm", "run", "dev"]);
        assert_eq!(inv.opts, StartOptions::default());
    }

    #[test]
    fn parses_flags_before_the_command() {
        let inv = parse_invocation("tunnel --pty --ansi --restart ngrok http 3000").unwrap();
        assert!(inv.opts.pty);
        assert!(inv.opts.clean_ansi);
        assert!(inv.opts.auto_restart);
        assert_eq!(inv.cmd, vec!["ngrok", "http", "3000"]);
    }

    #[test]
    fn cwd_flag_sets_working_directory() {
        let inv = parse_invocation("build --cwd=/srv/app make all").unwrap();
        assert_eq!(inv.opts.cwd.as_deref(), Some(Path::new("/srv/app")));
        assert_eq!(inv.cmd, vec!["make", "all"]);
    }

    #[test]
    fn cd_prefix_becomes_working_directory() {
        let inv = parse_invocation("web cd frontend && npm start").unwrap();
        assert_eq!(inv.opts.cwd.as_deref(), Some(Path::new("frontend")));
        assert_eq!(inv.cmd, vec!["npm", "start"]);
    }

    #[test]
    fn dashes_after_the_command_are_arguments() {
        let inv = parse_invocation("lint cargo clippy --all-targets").unwrap();
        assert_eq!(inv.cmd, vec!["cargo", "clippy", "--all-targets"]);
    }

    #[test]
    fn rejects_incomplete_invocations() {
        assert!(matches!(parse_invocation(""), Err(Error::Invocation(_))));
        assert!(matches!(parse_invocation("web"), Err(Error::Invocation(_))));
        assert!(matches!(
            parse_invocation("web --bogus npm start"),
            Err(Error::Invocation(_))
        ));
    }
}
