use super::ranker::ScoredCandidate;

/// Outcome of picking the single best chunk for a query.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    Match(ScoredCandidate<'a>),
    NoMatch,
}

impl<'a> Selection<'a> {
    pub fn candidate(&self) -> Option<&ScoredCandidate<'a>> {
        match self {
            Selection::Match(c) => Some(c),
            Selection::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Selection::Match(_))
    }
}

/// Drop candidates scoring below `threshold`, then take the highest score.
///
/// Ties go to the candidate seen first. Section identity plays no part.
pub fn select_best<'a>(candidates: &[ScoredCandidate<'a>], threshold: f32) -> Selection<'a> {
    let mut best: Option<ScoredCandidate<'a>> = None;

    // `>=` also drops NaN scores
    for candidate in candidates.iter().filter(|c| c.score >= threshold) {
        match best {
            Some(b) if candidate.score <= b.score => {}
            _ => best = Some(*candidate),
        }
    }

    best.map_or(Selection::NoMatch, Selection::Match)
}
