//! Derivative-free minimization for conditional-sum-of-squares estimation.

/// Outcome of a Nelder-Mead run.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub optimal_point: Vec<f64>,
    pub optimal_value: f64,
    pub iterations: usize,
    /// False when `max_iter` was reached before the simplex collapsed.
    pub converged: bool,
}

/// Nelder-Mead coefficients and stopping rule.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Stop when the spread of objective values in the simplex falls below this.
    pub tolerance: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
    /// Offset of the initial simplex vertices from the starting point.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            tolerance: 1e-9,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            initial_step: 0.1,
        }
    }
}

/// Minimize `objective` without bounds.
///
/// Non-finite objective values are treated as `+inf`, so the simplex moves
/// away from regions where the objective is undefined.
pub fn nelder_mead<F>(objective: F, initial: &[f64], config: &NelderMeadConfig) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let dim = initial.len();
    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    if dim == 0 {
        return NelderMeadResult {
            optimal_point: Vec::new(),
            optimal_value: eval(initial),
            iterations: 0,
            converged: true,
        };
    }

    let mut vertices: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    vertices.push((initial.to_vec(), eval(initial)));
    for i in 0..dim {
        let mut x = initial.to_vec();
        x[i] += if x[i].abs() > 1e-8 {
            config.initial_step * x[i].abs()
        } else {
            config.initial_step
        };
        let v = eval(&x);
        vertices.push((x, v));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iter {
        iterations += 1;
        vertices.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = vertices[0].1;
        let worst = vertices[dim].1;
        if (worst - best).abs() <= config.tolerance * (1.0 + best.abs()) {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| vertices[..dim].iter().map(|(x, _)| x[j]).sum::<f64>() / dim as f64)
            .collect();
        let toward = |from: &[f64], coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, p)| c + coef * (p - c))
                .collect()
        };

        let reflected = toward(&vertices[dim].0, -config.reflection);
        let f_reflected = eval(&reflected);

        if f_reflected < best {
            let expanded = toward(&reflected, config.expansion);
            let f_expanded = eval(&expanded);
            vertices[dim] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < vertices[dim - 1].1 {
            vertices[dim] = (reflected, f_reflected);
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < worst {
            let c = toward(&reflected, config.contraction);
            let f = eval(&c);
            (c, f)
        } else {
            let c = toward(&vertices[dim].0, config.contraction);
            let f = eval(&c);
            (c, f)
        };
        if f_contracted < worst.min(f_reflected) {
            vertices[dim] = (contracted, f_contracted);
            continue;
        }

        let anchor = vertices[0].0.clone();
        for (x, f) in vertices.iter_mut().skip(1) {
            for (xi, ai) in x.iter_mut().zip(&anchor) {
                *xi = ai + config.shrink * (*xi - ai);
            }
            *f = eval(x);
        }
    }

    vertices.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (optimal_point, optimal_value) = vertices.swap_remove(0);
    NelderMeadResult {
        optimal_point,
        optimal_value,
        iterations,
        converged,
    }
}
