//! The rule pack interface and the registry of built-in packs.

use thiserror::Error;

use super::packs::{
    AnchorePack, ClairPack, CosignPack, DocklePack, GrypePack, HadolintPack, SnykPack, SyftPack,
    TrivyPack,
};
use super::Finding;
use crate::dockerfile::BuildFileModel;

/// Errors from rule pack selection.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RuleError {
    #[error("unknown rule pack {0:?} (run `dockaudit packs` to list them)")]
    UnknownPack(String),
}

/// A lazily evaluated sequence of findings for one model.
pub type Findings<'a> = Box<dyn Iterator<Item = Finding> + 'a>;

/// An independent set of heuristic checks over one Dockerfile.
///
/// `check` returns a fresh iterator each call, so the sequence can be
/// restarted by calling it again. Packs never mutate the model.
pub trait RulePack: Send + Sync {
    /// Short identifier used on the command line and in rule ids.
    fn name(&self) -> &'static str;

    /// One-line description for `dockaudit packs`.
    fn description(&self) -> &'static str;

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a>;
}

/// Defer a check until the iterator is first pulled.
pub(crate) fn deferred<'a, F, I>(check: F) -> impl Iterator<Item = Finding> + 'a
where
    F: FnOnce() -> I + 'a,
    I: IntoIterator<Item = Finding>,
    I::IntoIter: 'a,
{
    std::iter::once_with(check).flatten()
}

static PACKS: &[&dyn RulePack] = &[
    &AnchorePack,
    &ClairPack,
    &CosignPack,
    &DocklePack,
    &GrypePack,
    &HadolintPack,
    &SnykPack,
    &SyftPack,
    &TrivyPack,
];

/// All built-in packs, in name order.
pub fn registry() -> &'static [&'static dyn RulePack] {
    PACKS
}

/// Look up a pack by name (case-insensitive).
pub fn find_pack(name: &str) -> Option<&'static dyn RulePack> {
    PACKS
        .iter()
        .copied()
        .find(|p| p.name().eq_ignore_ascii_case(name))
}

/// Resolve pack names; an empty list selects every pack.
pub fn select_packs<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static dyn RulePack>, RuleError> {
    if names.is_empty() {
        return Ok(PACKS.to_vec());
    }

    let mut selected: Vec<&'static dyn RulePack> = Vec::new();
    for name in names {
        let pack =
            find_pack(name.as_ref()).ok_or_else(|| RuleError::UnknownPack(name.as_ref().to_string()))?;
        if !selected.iter().any(|p| p.name() == pack.name()) {
            selected.push(pack);
        }
    }
    Ok(selected)
}
