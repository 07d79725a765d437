//! Rule packs and the runner that applies them to parsed build files.

mod finding;
mod pack;
mod packs;
mod runner;
mod suppress;

pub use finding::{display_path, AuditResult, Finding, Severity, SuppressedFinding};
pub use pack::{find_pack, registry, select_packs, Findings, RuleError, RulePack};
pub use packs::{
    AnchorePack, ClairPack, CosignPack, DocklePack, GrypePack, HadolintPack, SnykPack, SyftPack,
    TrivyPack,
};
pub use runner::Runner;
pub use suppress::{
    filter_suppressed, matches_suppression, parse_suppressions, Suppression, SuppressionType,
};
