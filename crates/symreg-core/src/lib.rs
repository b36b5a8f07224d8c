pub mod autodiff;
pub mod dataset;
pub mod dispatch;
pub mod domain;
pub mod interpreter;
pub mod matrix;
pub mod metrics;
pub mod node;
pub mod ops;
pub mod primitive_set;
pub mod tree;

pub use autodiff::{forward_jacobian, forward_jet_jacobian, reverse_jacobian};
pub use dataset::{DataRange, Dataset, Variable, variable_hash};
pub use dispatch::DispatchTable;
pub use domain::{Executor, ThreadPool, WaitGroup, random_provider};
pub use interpreter::{evaluate, evaluate_to_vec};
pub use matrix::{BATCH, Matrix};
pub use metrics::{ErrorMetric, fisher_information, gaussian_nll, poisson_nll, poisson_nll_identity};
pub use node::Node;
pub use ops::{ALL_NODE_KINDS, Arity, NodeKind};
pub use primitive_set::{Primitive, PrimitiveSet};
pub use tree::{HashMode, Tree};

pub use symreg_error::{SymregError, SymregResult};

pub mod prelude {
    pub use super::autodiff::{forward_jacobian, forward_jet_jacobian, reverse_jacobian};
    pub use super::dataset::{DataRange, Dataset, Variable, variable_hash};
    pub use super::dispatch::DispatchTable;
    pub use super::domain::{Executor, random_provider};
    pub use super::interpreter::{evaluate, evaluate_to_vec};
    pub use super::metrics::{ErrorMetric, fisher_information, gaussian_nll, poisson_nll, poisson_nll_identity};
    pub use super::node::Node;
    pub use super::ops::{Arity, NodeKind};
    pub use super::primitive_set::PrimitiveSet;
    pub use super::tree::{HashMode, Tree};
    pub use symreg_error::{SymregError, SymregResult};
}

/// Installs a compact `tracing` subscriber and a panic hook that logs through
/// it. Idempotent; safe to call from every binary entry point and from tests.
pub fn init_logging() {
    use std::sync::Once;
    static INIT_LOGGING: Once = Once::new();

    INIT_LOGGING.call_once(|| {
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        std::panic::set_hook(Box::new(|info| {
            tracing::error!("PANIC: {}", info);
        }));

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .with_target(false)
                    .with_level(true)
                    .compact(),
            )
            .init();
    });
}
