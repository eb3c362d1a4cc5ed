use actions::Action;
use waa::Session;

use crate::ignore::IgnoreMatcher;

/// Everything an update pass needs besides the tree itself.
///
/// The session carries the per-run options and the WAA root stat; the
/// action receives the dispatched entries; the ignore matcher filters
/// discoveries. All three are external collaborators of the core.
pub struct UpdateContext<'a> {
    /// The invocation's session.
    pub session: &'a mut Session,
    /// The current action.
    pub action: &'a mut dyn Action,
    /// The ignore predicate.
    pub ignore: &'a mut dyn IgnoreMatcher,
}
