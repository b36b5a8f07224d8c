//! The generational algorithm layer (§4.I-§4.M): evaluators, selection,
//! reinsertion, non-dominated sorting, offspring production, the
//! transposition cache, and the steady-state/NSGA-II drivers that tie them
//! together.
//!
//! Mirrors `symreg-core`'s flat module-plus-re-export layout.

pub mod config;
pub mod driver;
pub mod evaluator;
pub mod individual;
pub mod objective;
pub mod offspring;
pub mod reinsertion;
pub mod selection;
pub mod sorter;
pub mod transposition;

pub use config::{GaConfig, GaConfigBuilder};
pub use driver::{CreatorKind, GenerationReport, Nsga2Driver, RunResult, SteadyStateDriver};
pub use evaluator::{
    AggregateEvaluator, AkaikeInformationCriterionEvaluator, BayesianInformationCriterionEvaluator,
    DiversityEvaluator, EvaluationBudget, Evaluator, EvaluatorCounters, LeastSquaresEvaluator, LengthEvaluator,
    MinimumDescriptionLengthEvaluator, MultiEvaluator, Reduction, ShapeEvaluator, ERR_MAX,
};
pub use individual::Individual;
pub use objective::{Objective, Optimize};
pub use offspring::{
    BasicGenerator, BroodGenerator, OffspringEnv, OffspringGenerator, OffspringSelectionGenerator,
    PolygenicGenerator,
};
pub use reinsertion::{KeepBestReinserter, Reinserter, ReplaceWorstReinserter};
pub use selection::{
    Compare, CrowdedCompare, ProportionalSelector, RandomSelector, RankTournamentSelector, Selector,
    SingleObjectiveCompare, TournamentSelector,
};
pub use sorter::{FitnessSlice, ParetoArchive, SorterKind, crowding_distance};
pub use transposition::{TranspositionCache, ZobristTable};

pub use symreg_error::{SymregError, SymregResult};

pub mod prelude {
    pub use super::config::{GaConfig, GaConfigBuilder};
    pub use super::driver::{CreatorKind, GenerationReport, Nsga2Driver, RunResult, SteadyStateDriver};
    pub use super::evaluator::{Evaluator, LeastSquaresEvaluator};
    pub use super::individual::Individual;
    pub use super::objective::{Objective, Optimize};
    pub use super::offspring::{BasicGenerator, OffspringEnv, OffspringGenerator};
    pub use super::reinsertion::{KeepBestReinserter, Reinserter};
    pub use super::selection::{Selector, TournamentSelector};
    pub use super::sorter::SorterKind;
    pub use super::transposition::{TranspositionCache, ZobristTable};
    pub use symreg_error::{SymregError, SymregResult};
}
