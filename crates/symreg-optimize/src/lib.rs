//! Nonlinear coefficient optimization (§4.E): a cost-function wrapper over
//! the interpreter and autodiff, a damped Gauss-Newton (Levenberg–Marquardt)
//! solver, a first-order SGD solver with pluggable update rules, and a
//! non-mutating wrapper that ties either solver to a tree.

pub mod coefficient_optimizer;
pub mod cost_function;
pub mod levenberg_marquardt;
pub mod sgd;
pub mod update_rule;

pub use coefficient_optimizer::{Solver, optimize as optimize_coefficients};
pub use cost_function::CostFunction;
pub use sgd::OptimizeSummary;
pub use update_rule::{
    AdaDelta, AdaMax, Adam, AmsGrad, Constant, Momentum, RmsProp, UpdateRule, YamAdam, Yogi,
};
