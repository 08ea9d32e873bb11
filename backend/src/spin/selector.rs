use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectError {
    #[error("invalid draw input: {0}")]
    InvalidInput(&'static str),
}

/// Picks one entry with probability proportional to its weight.
///
/// Entries own consecutive intervals of `[0, total)` in input order and the
/// first entry whose cumulative boundary reaches `random_unit() * total`
/// wins. Zero-weight entries own an empty interval and can never win.
/// Weights are relative: `[(a, 2.0), (b, 6.0)]` behaves like `[(a, 0.25), (b, 0.75)]`.
///
/// A draw over no entries, over a negative or non-finite weight, or over a
/// zero total is rejected instead of falling back to the first entry.
pub fn pick<T, F>(items: &[(T, f64)], random_unit: F) -> Result<&T, SelectError>
where
    F: FnOnce() -> f64,
{
    if items.is_empty() {
        return Err(SelectError::InvalidInput("no items to draw from"));
    }

    let mut total = 0.0;
    for (_, weight) in items {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(SelectError::InvalidInput("weights must be finite and non-negative"));
        }
        total += weight;
    }
    if !total.is_finite() || total <= 0.0 {
        return Err(SelectError::InvalidInput("total weight must be positive"));
    }

    let unit = random_unit();
    if !(0.0..1.0).contains(&unit) {
        return Err(SelectError::InvalidInput("random unit must lie in [0, 1)"));
    }

    let threshold = unit * total;
    let mut cumulative = 0.0;
    let mut last_candidate = None;
    for (id, weight) in items {
        if *weight == 0.0 {
            continue;
        }
        cumulative += weight;
        last_candidate = Some(id);
        if cumulative >= threshold {
            return Ok(id);
        }
    }

    // Only reachable through float rounding at the very top of the range.
    last_candidate.ok_or(SelectError::InvalidInput("total weight must be positive"))
}
