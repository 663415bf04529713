//! Command-line argument handling.
//!
//! Flags follow the classic DOS style: a token starting with `-` (or `/` when
//! it is at most three characters long) is a group of case-insensitive
//! single-character switches, so `-SM`, `/s` and `-s -m` are equivalent.
//! Those tokens are first normalized into a regular argument vector, which
//! [`clap`] then parses.

use anyhow::{Result, bail};
use clap::Parser;
use findxml_core::FindSettings;
use std::ffi::OsString;

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// No arguments at all.
    Usage,
    /// `-h` or `-?`.
    Help,
    Search { settings: FindSettings, patterns: Vec<String> },
}

#[derive(Parser, Debug)]
#[command(name = "findxml", disable_help_flag = true, disable_version_flag = true)]
struct CliArgs {
    /// Search the pattern directories and all their subdirectories.
    #[arg(short = 's')]
    search_subtree: bool,
    /// Print only the name of each matching file.
    #[arg(short = 'm')]
    file_names_only: bool,
    /// Keep namespaces, so queries must match them.
    #[arg(short = 'n')]
    preserve_namespaces: bool,
    /// Query given inline with `-c:<query>`.
    #[arg(long = "query", value_name = "XPATH")]
    query: Option<String>,
    /// The query (unless given inline) followed by file patterns.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    positionals: Vec<String>,
}

#[derive(Debug, Default)]
struct Switches {
    search_subtree: bool,
    file_names_only: bool,
    preserve_namespaces: bool,
    query: Option<String>,
}

enum Normalized {
    Help,
    Args(Vec<String>),
}

fn is_switch_group(arg: &str) -> bool {
    arg.starts_with('-') || (arg.starts_with('/') && arg.chars().count() <= 3)
}

fn normalize(args: &[String]) -> Normalized {
    let mut switches = Switches::default();
    let mut positionals = Vec::new();
    for arg in args {
        if let Some(query) = arg.strip_prefix("-c:").or_else(|| arg.strip_prefix("-C:")) {
            switches.query = Some(query.to_string());
            continue;
        }
        if !is_switch_group(arg) {
            positionals.push(arg.clone());
            continue;
        }
        for c in arg.to_lowercase().chars().skip(1) {
            match c {
                'h' | '?' => return Normalized::Help,
                's' => switches.search_subtree = true,
                'm' => switches.file_names_only = true,
                'n' => switches.preserve_namespaces = true,
                other => tracing::debug!(switch = %other, arg = %arg, "ignoring unknown switch"),
            }
        }
    }

    let mut argv = vec!["findxml".to_string()];
    for (set, flag) in [
        (switches.search_subtree, "-s"),
        (switches.file_names_only, "-m"),
        (switches.preserve_namespaces, "-n"),
    ] {
        if set {
            argv.push(flag.to_string());
        }
    }
    if let Some(query) = switches.query {
        argv.push(format!("--query={query}"));
    }
    argv.push("--".to_string());
    argv.extend(positionals);
    Normalized::Args(argv)
}

/// Interprets the arguments following the program name.
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.into().to_string_lossy().into_owned()).collect();
    if args.is_empty() {
        return Ok(Invocation::Usage);
    }
    let argv = match normalize(&args) {
        Normalized::Help => return Ok(Invocation::Help),
        Normalized::Args(argv) => argv,
    };
    tracing::trace!(?argv, "normalized arguments");
    let cli = CliArgs::try_parse_from(argv)?;

    let mut positionals = cli.positionals.into_iter();
    let Some(query) = cli.query.or_else(|| positionals.next()) else {
        bail!("no xpath query given");
    };
    if query.is_empty() {
        bail!("the xpath query is empty");
    }
    let patterns: Vec<String> = positionals.collect();
    if patterns.is_empty() {
        bail!("no file pattern given");
    }

    let settings = FindSettings {
        query,
        search_subtree: cli.search_subtree,
        show_file_names_only: cli.file_names_only,
        ignore_namespaces: !cli.preserve_namespaces,
    };
    Ok(Invocation::Search { settings, patterns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn search(args: &[&str]) -> (FindSettings, Vec<String>) {
        match parse_args(args).unwrap() {
            Invocation::Search { settings, patterns } => (settings, patterns),
            other => panic!("expected a search, got {other:?}"),
        }
    }

    #[rstest]
    #[case::separate(&["-s", "-m", "-n"])]
    #[case::grouped(&["-SMN"])]
    #[case::slash(&["/s", "/mn"])]
    #[case::repeated(&["-ss", "-m", "-mn"])]
    fn switch_groups(#[case] switches: &[&str]) {
        let mut args = switches.to_vec();
        args.extend(["//a", "*.xml"]);
        let (settings, patterns) = search(&args);
        assert!(settings.search_subtree);
        assert!(settings.show_file_names_only);
        assert!(!settings.ignore_namespaces);
        assert_eq!(settings.query, "//a");
        assert_eq!(patterns, vec!["*.xml"]);
    }

    #[rstest]
    fn defaults_ignore_namespaces() {
        let (settings, patterns) = search(&["/Project", "a.xml", "b/*.xml"]);
        assert_eq!(settings, FindSettings::with_query("/Project"));
        assert_eq!(patterns, vec!["a.xml", "b/*.xml"]);
    }

    #[rstest]
    fn long_slash_tokens_are_positional() {
        let (settings, patterns) = search(&["//Reference", "/src/*.xml"]);
        assert_eq!(settings.query, "//Reference");
        assert_eq!(patterns, vec!["/src/*.xml"]);
    }

    #[rstest]
    fn inline_query_leaves_positionals_as_patterns() {
        let (settings, patterns) = search(&["-c://item[@id='-1']", "a.xml", "b.xml"]);
        assert_eq!(settings.query, "//item[@id='-1']");
        assert_eq!(patterns, vec!["a.xml", "b.xml"]);
    }

    #[rstest]
    fn unknown_switches_are_ignored() {
        let (settings, _) = search(&["-xq", "//a", "*.xml"]);
        assert_eq!(settings, FindSettings::with_query("//a"));
    }

    #[rstest]
    #[case::dash_h(&["-h"])]
    #[case::question(&["/?"])]
    #[case::after_others(&["-s", "//a", "-Mh", "*.xml"])]
    fn help_wins(#[case] args: &[&str]) {
        assert_eq!(parse_args(args).unwrap(), Invocation::Help);
    }

    #[rstest]
    fn no_arguments_is_usage() {
        assert_eq!(parse_args(Vec::<String>::new()).unwrap(), Invocation::Usage);
    }

    #[rstest]
    #[case::only_switches(&["-s"], "no xpath query")]
    #[case::no_pattern(&["//a"], "no file pattern")]
    #[case::empty_query(&["", "a.xml"], "empty")]
    fn usage_errors(#[case] args: &[&str], #[case] message: &str) {
        let err = parse_args(args).unwrap_err();
        assert!(err.to_string().contains(message), "{err}");
    }
}
