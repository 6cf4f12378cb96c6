use serde::Serialize;
use strum_macros::Display;

#[derive(Debug, sqlx::FromRow)]
pub struct EvaluationSql {
    pub id: u64,
    pub school_id: u64,
    pub teacher_id: u64,
    pub teacher_name: String,
    pub evaluator_name: String,
    pub term: String,
    pub year: i32,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EvaluationItem {
    pub criterion: String,
    pub score: f64,
    pub max_score: f64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum PerformanceBand {
    Excellent,
    Good,
    Satisfactory,
    #[strum(to_string = "Needs Improvement")]
    NeedsImprovement,
}

impl PerformanceBand {
    pub fn from_percentage(percentage: f64) -> Self {
        match percentage {
            p if p >= 80.0 => PerformanceBand::Excellent,
            p if p >= 65.0 => PerformanceBand::Good,
            p if p >= 50.0 => PerformanceBand::Satisfactory,
            _ => PerformanceBand::NeedsImprovement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationTotals {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub band: PerformanceBand,
}

impl EvaluationTotals {
    pub fn from_items(items: &[EvaluationItem]) -> Self {
        let score: f64 = items.iter().map(|i| i.score).sum();
        let max_score: f64 = items.iter().map(|i| i.max_score).sum();
        let percentage = if max_score > 0.0 {
            (score / max_score * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            score,
            max_score,
            percentage,
            band: PerformanceBand::from_percentage(percentage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(score: f64, max_score: f64) -> EvaluationItem {
        EvaluationItem {
            criterion: "Lesson planning".into(),
            score,
            max_score,
            comment: None,
        }
    }

    #[test]
    fn totals_and_band() {
        let totals = EvaluationTotals::from_items(&[item(8.0, 10.0), item(14.0, 20.0), item(3.0, 5.0)]);
        assert_eq!(totals.score, 25.0);
        assert_eq!(totals.max_score, 35.0);
        assert_eq!(totals.percentage, 71.43);
        assert_eq!(totals.band, PerformanceBand::Good);
    }

    #[test]
    fn empty_evaluation_scores_zero() {
        let totals = EvaluationTotals::from_items(&[]);
        assert_eq!(totals.percentage, 0.0);
        assert_eq!(totals.band, PerformanceBand::NeedsImprovement);
        assert_eq!(totals.band.to_string(), "Needs Improvement");
    }

    #[test]
    fn band_thresholds() {
        assert_eq!(PerformanceBand::from_percentage(80.0), PerformanceBand::Excellent);
        assert_eq!(PerformanceBand::from_percentage(79.99), PerformanceBand::Good);
        assert_eq!(PerformanceBand::from_percentage(50.0), PerformanceBand::Satisfactory);
        assert_eq!(PerformanceBand::from_percentage(49.99), PerformanceBand::NeedsImprovement);
    }
}
