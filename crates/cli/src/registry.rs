//! The action registry.
//!
//! One static [`ActionSpec`] per shipped command; the core reads only these
//! fields and never matches on action names itself.

use actions::ActionSpec;
use tree::EntryFlags;

/// `status` - the default action: report what changed.
pub static STATUS: ActionSpec = ActionSpec {
    names: &["status", "st"],
    help_text: "show the status of the working copy entries",
    is_filter: true,
    ..ActionSpec::DEFAULT
};

/// `add` - mark entries for versioning.
pub static ADD: ActionSpec = ActionSpec {
    names: &["add"],
    help_text: "mark entries to be versioned",
    i_val: EntryFlags::ADD.bits(),
    ..ActionSpec::DEFAULT
};

/// `unversion` - take entries out of version control.
pub static UNVERSION: ActionSpec = ActionSpec {
    names: &["unversion"],
    help_text: "take entries out of version control",
    i_val: EntryFlags::UNVERSION.bits(),
    ..ActionSpec::DEFAULT
};

/// `_build-new-list` - rebuild the entry list from the filesystem.
pub static BUILD: ActionSpec = ActionSpec {
    names: &["_build-new-list"],
    help_text: "build a new entry list from the current filesystem state",
    ..ActionSpec::DEFAULT
};

/// `info` - show details about the stored entry list.
pub static INFO: ActionSpec = ActionSpec {
    names: &["info"],
    help_text: "show details about the stored entry list",
    ..ActionSpec::DEFAULT
};

/// `help` - list the known actions.
///
/// Runs without a WAA root so it works before any setup.
pub static HELP: ActionSpec = ActionSpec {
    names: &["help", "?"],
    help_text: "show this list of actions",
    is_import_export: true,
    ..ActionSpec::DEFAULT
};

/// All shipped actions; the first one is the default.
pub static ACTIONS: &[&ActionSpec] = &[&STATUS, &ADD, &UNVERSION, &BUILD, &INFO, &HELP];

/// Finds an action by canonical name or alias.
#[must_use]
pub fn find(name: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().copied().find(|spec| spec.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_same_spec() {
        assert!(std::ptr::eq(find("status").unwrap(), &STATUS));
        assert!(std::ptr::eq(find("st").unwrap(), &STATUS));
        assert!(std::ptr::eq(find("?").unwrap(), &HELP));
        assert!(find("commit").is_none());
    }

    #[test]
    fn default_action_is_status() {
        assert!(std::ptr::eq(ACTIONS[0], &STATUS));
    }
}
