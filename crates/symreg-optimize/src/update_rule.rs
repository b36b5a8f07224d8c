//! Pluggable learning-rate update rules for the first-order optimizer
//! (§4.E). Grounded on Operon's `optimizer/solvers/sgd.hpp` `UpdateRule`
//! namespace: each rule is a stateful function `gradient -> step`, the state
//! shaped like the gradient itself and carried between calls.

/// A learning-rate rule: turns a raw gradient into a parameter step, holding
/// whatever per-parameter moment state the rule needs between calls.
pub trait UpdateRule {
    /// `step` has the same length as `gradient`; the caller applies
    /// `params -= step`.
    fn update(&mut self, gradient: &[f64], step: &mut [f64]);

    fn name(&self) -> &'static str;
}

fn zeros(dim: usize) -> Vec<f64> {
    vec![0.0; dim]
}

/// Fixed learning rate, no state.
pub struct Constant {
    rate: f64,
}

impl Constant {
    pub fn new(rate: f64) -> Self {
        Constant { rate }
    }
}

impl Default for Constant {
    fn default() -> Self {
        Constant::new(0.1)
    }
}

impl UpdateRule for Constant {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        for (s, g) in step.iter_mut().zip(gradient) {
            *s = self.rate * g;
        }
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

pub struct Momentum {
    rate: f64,
    beta: f64,
    first_moment: Vec<f64>,
}

impl Momentum {
    pub fn new(dim: usize, rate: f64, beta: f64) -> Self {
        Momentum { rate, beta, first_moment: zeros(dim) }
    }
}

impl UpdateRule for Momentum {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        for i in 0..gradient.len() {
            self.first_moment[i] = self.first_moment[i] * self.beta + gradient[i];
            step[i] = self.rate * self.first_moment[i];
        }
    }

    fn name(&self) -> &'static str {
        "momentum"
    }
}

pub struct RmsProp {
    rate: f64,
    beta: f64,
    epsilon: f64,
    second_moment: Vec<f64>,
}

impl RmsProp {
    pub fn new(dim: usize, rate: f64, beta: f64, epsilon: f64) -> Self {
        RmsProp { rate, beta, epsilon, second_moment: zeros(dim) }
    }
}

impl UpdateRule for RmsProp {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        for i in 0..gradient.len() {
            self.second_moment[i] =
                self.beta * self.second_moment[i] + (1.0 - self.beta) * gradient[i] * gradient[i];
            step[i] = self.rate / (self.second_moment[i].sqrt() + self.epsilon) * gradient[i];
        }
    }

    fn name(&self) -> &'static str {
        "rmsprop"
    }
}

pub struct AdaDelta {
    beta: f64,
    epsilon: f64,
    gradient_moment: Vec<f64>,
    delta_moment: Vec<f64>,
    previous_delta: Vec<f64>,
}

impl AdaDelta {
    pub fn new(dim: usize, beta: f64, epsilon: f64) -> Self {
        AdaDelta {
            beta,
            epsilon,
            gradient_moment: zeros(dim),
            delta_moment: zeros(dim),
            previous_delta: zeros(dim),
        }
    }
}

impl UpdateRule for AdaDelta {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        for i in 0..gradient.len() {
            self.gradient_moment[i] =
                self.beta * self.gradient_moment[i] + (1.0 - self.beta) * gradient[i] * gradient[i];
            self.delta_moment[i] = self.beta * self.delta_moment[i]
                + (1.0 - self.beta) * self.previous_delta[i] * self.previous_delta[i];
            let delta = ((self.delta_moment[i] + self.epsilon) / (self.gradient_moment[i] + self.epsilon))
                .sqrt()
                * gradient[i];
            self.previous_delta[i] = delta;
            step[i] = delta;
        }
    }

    fn name(&self) -> &'static str {
        "adadelta"
    }
}

pub struct AdaMax {
    rate: f64,
    beta1: f64,
    beta2: f64,
    first_moment: Vec<f64>,
    second_moment: Vec<f64>,
}

impl AdaMax {
    pub fn new(dim: usize, rate: f64, beta1: f64, beta2: f64) -> Self {
        AdaMax { rate, beta1, beta2, first_moment: zeros(dim), second_moment: zeros(dim) }
    }
}

impl UpdateRule for AdaMax {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        for i in 0..gradient.len() {
            self.first_moment[i] -= (1.0 - self.beta1) * (self.first_moment[i] - gradient[i]);
            self.second_moment[i] = (self.beta2 * self.second_moment[i]).max(gradient[i].abs());
            step[i] = self.rate * self.first_moment[i] / self.second_moment[i].max(f64::MIN_POSITIVE);
        }
    }

    fn name(&self) -> &'static str {
        "adamax"
    }
}

pub struct Adam {
    rate: f64,
    epsilon: f64,
    beta1: f64,
    beta2: f64,
    first_moment: Vec<f64>,
    second_moment: Vec<f64>,
    debias: bool,
    step_count: u64,
}

impl Adam {
    pub fn new(dim: usize, rate: f64, epsilon: f64, beta1: f64, beta2: f64, debias: bool) -> Self {
        Adam {
            rate,
            epsilon,
            beta1,
            beta2,
            first_moment: zeros(dim),
            second_moment: zeros(dim),
            debias,
            step_count: 0,
        }
    }
}

impl UpdateRule for Adam {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        self.step_count += 1;
        for i in 0..gradient.len() {
            self.first_moment[i] -= (1.0 - self.beta1) * (self.first_moment[i] - gradient[i]);
            self.second_moment[i] -=
                (1.0 - self.beta2) * (self.second_moment[i] - gradient[i] * gradient[i]);

            let (m, v) = if self.debias {
                (
                    self.first_moment[i] / (1.0 - self.beta1.powi(self.step_count as i32)),
                    self.second_moment[i] / (1.0 - self.beta2.powi(self.step_count as i32)),
                )
            } else {
                (self.first_moment[i], self.second_moment[i])
            };

            step[i] = self.rate * m / (v.sqrt() + self.epsilon);
        }
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}

pub struct YamAdam {
    epsilon: f64,
    first_moment: Vec<f64>,
    second_moment: Vec<f64>,
    delta_moment: Vec<f64>,
    delta: Vec<f64>,
    beta: Vec<f64>,
    previous_delta: Vec<f64>,
}

impl YamAdam {
    pub fn new(dim: usize, epsilon: f64) -> Self {
        YamAdam {
            epsilon,
            first_moment: zeros(dim),
            second_moment: zeros(dim),
            delta_moment: zeros(dim),
            delta: zeros(dim),
            beta: zeros(dim),
            previous_delta: zeros(dim),
        }
    }
}

impl UpdateRule for YamAdam {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        for i in 0..gradient.len() {
            self.previous_delta[i] = self.delta[i];
            let b = self.beta[i];
            self.first_moment[i] = b * self.first_moment[i] + (1.0 - b) * gradient[i];
            let centered = gradient[i] - self.first_moment[i];
            self.second_moment[i] = b * self.second_moment[i] + (1.0 - b) * centered * centered;
            self.delta_moment[i] =
                b * self.delta_moment[i] + (1.0 - b) * self.delta[i] * self.delta[i];
            self.delta[i] = ((self.delta_moment[i] + self.epsilon) / (self.second_moment[i] + self.epsilon))
                .sqrt()
                * self.first_moment[i];
            let num = self.delta[i].abs() + self.epsilon;
            let den = self.previous_delta[i].abs() + self.epsilon;
            self.beta[i] = (1.0 / (1.0 + num / den)).exp() - self.epsilon;
            step[i] = self.delta[i];
        }
    }

    fn name(&self) -> &'static str {
        "yamadam"
    }
}

pub struct AmsGrad {
    rate: f64,
    epsilon: f64,
    beta1: f64,
    beta2: f64,
    first_moment: Vec<f64>,
    second_moment: Vec<f64>,
}

impl AmsGrad {
    pub fn new(dim: usize, rate: f64, epsilon: f64, beta1: f64, beta2: f64) -> Self {
        AmsGrad { rate, epsilon, beta1, beta2, first_moment: zeros(dim), second_moment: zeros(dim) }
    }
}

impl UpdateRule for AmsGrad {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        for i in 0..gradient.len() {
            self.first_moment[i] = self.beta1 * self.first_moment[i] + (1.0 - self.beta1) * gradient[i];
            let candidate =
                (self.beta2 * self.second_moment[i] + (1.0 - self.beta2)) * gradient[i] * gradient[i];
            self.second_moment[i] = self.second_moment[i].max(candidate);
            step[i] =
                self.rate * self.first_moment[i] / (self.second_moment[i].sqrt() + self.epsilon);
        }
    }

    fn name(&self) -> &'static str {
        "amsgrad"
    }
}

pub struct Yogi {
    rate: f64,
    epsilon: f64,
    beta1: f64,
    beta2: f64,
    first_moment: Vec<f64>,
    second_moment: Vec<f64>,
    debias: bool,
    step_count: u64,
}

impl Yogi {
    pub fn new(dim: usize, rate: f64, epsilon: f64, beta1: f64, beta2: f64, debias: bool) -> Self {
        Yogi {
            rate,
            epsilon,
            beta1,
            beta2,
            first_moment: zeros(dim),
            second_moment: zeros(dim),
            debias,
            step_count: 0,
        }
    }
}

impl UpdateRule for Yogi {
    fn update(&mut self, gradient: &[f64], step: &mut [f64]) {
        self.step_count += 1;
        for i in 0..gradient.len() {
            self.first_moment[i] -= (1.0 - self.beta1) * (self.first_moment[i] - gradient[i]);
            let g2 = gradient[i] * gradient[i];
            let diff = self.second_moment[i] - g2;
            self.second_moment[i] -= (1.0 - self.beta2) * diff.signum() * g2;

            let (m, v) = if self.debias {
                (
                    self.first_moment[i] / (1.0 - self.beta1.powi(self.step_count as i32)),
                    self.second_moment[i] / (1.0 - self.beta2.powi(self.step_count as i32)),
                )
            } else {
                (self.first_moment[i], self.second_moment[i])
            };

            step[i] = self.rate * m / (v.sqrt() + self.epsilon);
        }
    }

    fn name(&self) -> &'static str {
        "yogi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_rule_scales_gradient_linearly() {
        let mut rule = Constant::new(0.5);
        let mut step = vec![0.0; 2];
        rule.update(&[2.0, -4.0], &mut step);
        assert_eq!(step, vec![1.0, -2.0]);
    }

    #[test]
    fn momentum_accumulates_across_calls() {
        let mut rule = Momentum::new(1, 1.0, 0.5);
        let mut step = vec![0.0; 1];
        rule.update(&[1.0], &mut step);
        assert_eq!(step, vec![1.0]);
        rule.update(&[1.0], &mut step);
        assert_eq!(step, vec![1.5]);
    }

    #[test]
    fn every_rule_produces_a_finite_step_from_a_zero_gradient() {
        let grad = [0.0, 0.0];
        let mut step = vec![0.0; 2];
        let mut rules: Vec<Box<dyn UpdateRule>> = vec![
            Box::new(Constant::new(0.1)),
            Box::new(Momentum::new(2, 0.1, 0.9)),
            Box::new(RmsProp::new(2, 0.1, 0.9, 1e-6)),
            Box::new(AdaDelta::new(2, 0.9, 1e-6)),
            Box::new(AdaMax::new(2, 0.1, 0.9, 0.999)),
            Box::new(Adam::new(2, 0.1, 1e-8, 0.9, 0.999, false)),
            Box::new(YamAdam::new(2, 1e-6)),
            Box::new(AmsGrad::new(2, 0.1, 1e-6, 0.9, 0.999)),
            Box::new(Yogi::new(2, 0.1, 1e-8, 0.9, 0.999, false)),
        ];
        for rule in rules.iter_mut() {
            rule.update(&grad, &mut step);
            assert!(step.iter().all(|s| s.is_finite()), "{} produced non-finite step", rule.name());
        }
    }
}
