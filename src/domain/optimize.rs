//! Derivative-free minimization (Nelder-Mead simplex).

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    /// Convergence when the spread of simplex values falls below
    /// `tolerance * (|f_best| + tolerance)`.
    pub tolerance: f64,
    /// Fresh simplexes built around the best point when a run hits
    /// `max_iterations`.
    pub restarts: usize,
    /// A restart that lowers the best value by no more than this (relative)
    /// counts as converged.
    pub restart_tolerance: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            tolerance: 1e-9,
            restarts: 3,
            restart_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimizes `f` starting from `start`, with initial simplex offsets `steps`.
/// Non-finite objective values are treated as `+inf`. `iterations` counts
/// every simplex step across restarts.
pub fn nelder_mead<F>(f: F, start: &[f64], steps: &[f64], options: NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let mut best = simplex_search(&eval, start, steps, options);
    for _ in 0..options.restarts {
        if best.converged {
            break;
        }
        let next = simplex_search(&eval, &best.x, steps, options);
        let stalled = next.value.is_finite()
            && best.value - next.value
                <= options.restart_tolerance * (best.value.abs() + options.tolerance);
        tracing::trace!(
            previous = best.value,
            value = next.value,
            stalled,
            "restarted simplex"
        );
        best = Minimum {
            converged: next.converged || stalled,
            iterations: best.iterations + next.iterations,
            x: next.x,
            value: next.value,
        };
    }
    best
}

fn simplex_search<F>(eval: &F, start: &[f64], steps: &[f64], options: NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = start.len();

    if n == 0 {
        let value = eval(start);
        return Minimum {
            x: Vec::new(),
            value,
            iterations: 0,
            converged: value.is_finite(),
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.to_vec());
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] += steps[i];
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let (alpha, gamma, rho, sigma) = (1.0, 2.0, 0.5, 0.5);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[n];
        if best.is_finite()
            && worst.is_finite()
            && (worst - best).abs() <= options.tolerance * (best.abs() + options.tolerance)
        {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |coef: f64| -> Vec<f64> {
            (0..n)
                .map(|j| centroid[j] + coef * (simplex[n][j] - centroid[j]))
                .collect()
        };

        let reflected = towards(-alpha);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = towards(-gamma);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let c = towards(-rho);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = towards(rho);
            let fc = eval(&c);
            (c, fc)
        };

        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        for i in 1..=n {
            let shrunk: Vec<f64> = (0..n)
                .map(|j| simplex[0][j] + sigma * (simplex[i][j] - simplex[0][j]))
                .collect();
            values[i] = eval(&shrunk);
            simplex[i] = shrunk;
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);

    Minimum {
        x: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    }
}
