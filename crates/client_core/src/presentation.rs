//! Score overlay: tier classification and rendering. No I/O.

pub const EXCELLENT_THRESHOLD: f64 = 7.0;
pub const GOOD_THRESHOLD: f64 = 5.0;
pub const RESULT_HEADING: &str = "ATS Score Result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Excellent,
    Good,
    NeedsWork,
}

impl ScoreTier {
    pub fn for_score(score: f64) -> Self {
        if score >= EXCELLENT_THRESHOLD {
            Self::Excellent
        } else if score >= GOOD_THRESHOLD {
            Self::Good
        } else {
            Self::NeedsWork
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Excellent => {
                "Excellent match! Your resume is well-aligned with the job description."
            }
            Self::Good => {
                "Good match. Consider making some improvements to better align with the job requirements."
            }
            Self::NeedsWork => {
                "Your resume might need significant updates to better match this job description."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisResult {
    pub score: f64,
    pub tier: ScoreTier,
}

impl AnalysisResult {
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            tier: ScoreTier::for_score(score),
        }
    }

    pub fn score_label(&self) -> String {
        format!("{:.1}/10", self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    pub heading: &'static str,
    pub score_label: String,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultOverlay {
    result: Option<AnalysisResult>,
}

impl ResultOverlay {
    pub fn show(&mut self, result: AnalysisResult) {
        self.result = Some(result);
    }

    pub fn dismiss(&mut self) {
        self.result = None;
    }

    pub fn is_open(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn render(&self) -> Option<RenderedResult> {
        self.result.as_ref().map(|result| RenderedResult {
            heading: RESULT_HEADING,
            score_label: result.score_label(),
            message: result.tier.message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive_at_thresholds() {
        assert_eq!(ScoreTier::for_score(7.0), ScoreTier::Excellent);
        assert_eq!(ScoreTier::for_score(6.999), ScoreTier::Good);
        assert_eq!(ScoreTier::for_score(5.0), ScoreTier::Good);
        assert_eq!(ScoreTier::for_score(4.999), ScoreTier::NeedsWork);
    }

    #[test]
    fn tier_is_monotonic_over_observed_domain() {
        let mut previous = ScoreTier::for_score(0.0);
        for step in 0..=100 {
            let tier = ScoreTier::for_score(f64::from(step) / 10.0);
            let rank = |tier: ScoreTier| match tier {
                ScoreTier::NeedsWork => 0,
                ScoreTier::Good => 1,
                ScoreTier::Excellent => 2,
            };
            assert!(rank(tier) >= rank(previous));
            previous = tier;
        }
    }

    #[test]
    fn renders_score_with_one_decimal() {
        let mut overlay = ResultOverlay::default();
        overlay.show(AnalysisResult::from_score(8.2));
        let rendered = overlay.render().expect("overlay open");
        assert_eq!(rendered.score_label, "8.2/10");
        assert_eq!(rendered.message, ScoreTier::Excellent.message());
        assert_eq!(rendered.heading, "ATS Score Result");

        overlay.show(AnalysisResult::from_score(6.0));
        assert_eq!(overlay.render().expect("open").score_label, "6.0/10");
    }

    #[test]
    fn dismiss_closes_overlay() {
        let mut overlay = ResultOverlay::default();
        overlay.show(AnalysisResult::from_score(3.1));
        overlay.dismiss();
        assert!(!overlay.is_open());
        assert!(overlay.render().is_none());
    }
}
