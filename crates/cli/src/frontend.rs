//! Command-line parsing.

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

use waa::Options;

use crate::registry;

/// A parsed invocation: which action, which paths, which options.
#[derive(Debug)]
pub struct Invocation {
    /// Canonical name of the requested action.
    pub action: &'static str,
    /// Path arguments, as given.
    pub paths: Vec<PathBuf>,
    /// Per-run options for the session.
    pub options: Options,
    /// Logging verbosity: negative is quieter, positive is louder.
    pub verbosity: i32,
}

/// Builds the clap command tree from the action registry.
#[must_use]
pub fn build_command() -> Command {
    let mut command = Command::new("fsvc")
        .about("fsvc - fast filesystem version control")
        .disable_help_subcommand(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("more diagnostic output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::Count)
                .global(true)
                .help("less diagnostic output"),
        )
        .arg(
            Arg::new("recurse")
                .short('R')
                .action(ArgAction::Count)
                .global(true)
                .help("increase recursion depth"),
        )
        .arg(
            Arg::new("no-recurse")
                .short('N')
                .action(ArgAction::Count)
                .global(true)
                .help("decrease recursion depth"),
        )
        .arg(
            Arg::new("checksum")
                .short('C')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("re-check contents even when the stat data is unchanged"),
        )
        .arg(
            Arg::new("softroot")
                .long("softroot")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true)
                .help("path prefix to strip before addressing the administrative area"),
        );

    for spec in registry::ACTIONS {
        let mut sub = Command::new(spec.name())
            .about(spec.help_text)
            .arg(
                Arg::new("paths")
                    .value_parser(clap::value_parser!(PathBuf))
                    .num_args(0..)
                    .help("paths inside the working copy"),
            );
        for alias in &spec.names[1..] {
            sub = sub.alias(*alias);
        }
        command = command.subcommand(sub);
    }
    command
}

/// Parses process arguments into an [`Invocation`].
///
/// Without a subcommand the default action (status) runs with no paths.
pub fn parse() -> Result<Invocation, clap::Error> {
    let matches = build_command().try_get_matches()?;

    let (action, paths) = match matches.subcommand() {
        Some((name, sub)) => {
            let paths = sub
                .get_many::<PathBuf>("paths")
                .map(|all| all.cloned().collect())
                .unwrap_or_default();
            // Subcommand names come from the registry, so the lookup
            // cannot fail; fall back to the default for safety.
            let spec = registry::find(name).unwrap_or(registry::ACTIONS[0]);
            (spec.name(), paths)
        }
        None => (registry::ACTIONS[0].name(), Vec::new()),
    };

    let options = Options {
        recursive: 1 + i32::from(matches.get_count("recurse"))
            - i32::from(matches.get_count("no-recurse")),
        checksum: matches.get_flag("checksum"),
        softroot: matches.get_one::<PathBuf>("softroot").cloned(),
        ..Options::default()
    };

    let verbosity =
        i32::from(matches.get_count("verbose")) - i32::from(matches.get_count("quiet"));

    Ok(Invocation {
        action,
        paths,
        options,
        verbosity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_action_has_a_subcommand() {
        let command = build_command();
        for spec in registry::ACTIONS {
            assert!(
                command
                    .get_subcommands()
                    .any(|sub| sub.get_name() == spec.name()),
                "missing subcommand for {}",
                spec.name()
            );
        }
    }

    #[test]
    fn aliases_are_registered() {
        let matches = build_command()
            .try_get_matches_from(["fsvc", "st", "some/path"])
            .expect("alias parses");
        let (name, sub) = matches.subcommand().expect("subcommand present");
        assert_eq!(name, "status");
        let paths: Vec<&PathBuf> = sub.get_many("paths").expect("paths").collect();
        assert_eq!(paths, [&PathBuf::from("some/path")]);
    }

    #[test]
    fn recursion_options_combine() {
        let matches = build_command()
            .try_get_matches_from(["fsvc", "-N", "-N", "status"])
            .expect("parses");
        assert_eq!(matches.get_count("no-recurse"), 2);
    }
}
