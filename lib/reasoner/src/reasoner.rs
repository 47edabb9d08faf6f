//! The top-level reasoning entry point, tying the schema
//! summary, compiled rule table, semi-naive evaluator and incremental
//! maintenance together the way the retrieval pack's `RlReasoner` does.

use rustc_hash::FxHashSet;

use rdfkit_model::EncodedTriple;

use crate::backend::RuleBackend;
use crate::compile::compile_rules;
use crate::config::ReasonerConfig;
use crate::error::ReasonerResult;
use crate::incremental::{self, IncrementalReport};
use crate::rules::Rule;
use crate::semi_naive::{run_fixpoint, MaterializeReport};
use crate::tbox::TBoxCache;

pub struct Reasoner<'b> {
    backend: &'b dyn RuleBackend,
    config: ReasonerConfig,
    tbox: TBoxCache,
    rules: Vec<Rule>,
    derived: FxHashSet<EncodedTriple>,
}

impl<'b> Reasoner<'b> {
    pub fn new(backend: &'b dyn RuleBackend) -> ReasonerResult<Self> {
        Self::with_config(backend, ReasonerConfig::default())
    }

    pub fn with_config(backend: &'b dyn RuleBackend, config: ReasonerConfig) -> ReasonerResult<Self> {
        config.validate()?;
        let tbox = TBoxCache::build(backend, 1);
        let rules = compile_rules(&tbox, backend, config.profile);
        Ok(Reasoner { backend, config, tbox, rules, derived: FxHashSet::default() })
    }

    /// Runs the fixpoint loop to completion (or a configured cap) and replaces the
    /// in-memory derived set with the result.
    pub fn materialize(&mut self) -> ReasonerResult<MaterializeReport> {
        let (derived, report) = run_fixpoint(&self.rules, self.backend, &self.config)?;
        self.derived = derived;
        Ok(report)
    }

    pub fn derived_facts(&self) -> &FxHashSet<EncodedTriple> {
        &self.derived
    }

    /// Seeds the in-memory derived set from a previously persisted one (e.g. the backend's
    /// own derived-facts relation read back after reopening a store). A fresh `Reasoner`
    /// otherwise starts with an empty derived set, which would make
    /// [`Reasoner::incremental_delete`] retract nothing on its first call after restart.
    pub fn seed_derived(&mut self, derived: FxHashSet<EncodedTriple>) {
        self.derived = derived;
    }

    pub fn tbox(&self) -> &TBoxCache {
        &self.tbox
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Retracts `removed_explicit` from consideration and drops any derived fact that no
    /// longer has a supporting derivation.
    pub fn incremental_delete(&mut self, removed_explicit: &[EncodedTriple]) -> ReasonerResult<IncrementalReport> {
        incremental::incremental_delete(&self.rules, self.backend, &mut self.derived, removed_explicit, &self.config)
    }

    /// Rebuilds the schema summary and recompiles the rule table. Call after an UPDATE
    /// touches a TBox-relevant predicate; `tbox().is_tbox_relevant` tells the
    /// caller whether a given triple warrants it.
    pub fn refresh_tbox(&mut self) {
        let version = self.tbox.version + 1;
        self.tbox = TBoxCache::build(self.backend, version);
        self.rules = compile_rules(&self.tbox, self.backend, self.config.profile);
    }
}
