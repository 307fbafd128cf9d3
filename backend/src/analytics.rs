// src/analytics.rs
//
// Read-side aggregation over ledger entries. Nothing here touches storage;
// handlers fetch attempts and quizzes, then hand them over.

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    analytics::{QuizOverview, QuizStats, StudentQuizSummary, SubjectCount},
    attempt::{Attempt, AttemptWithQuiz, QuizMeta},
    quiz::Quiz,
};

impl From<&Quiz> for QuizMeta {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            subject: quiz.subject.clone(),
            class_level: quiz.class_level.clone(),
            total_questions: quiz.total_questions,
            passing_score: quiz.passing_score,
            show_correct_answers: quiz.show_correct_answers,
        }
    }
}

/// Attempt count, pass count and rounded averages for one quiz.
/// Attempts belonging to other quizzes are ignored.
pub fn quiz_stats(quiz_id: i64, attempts: &[Attempt]) -> QuizStats {
    let relevant: Vec<&Attempt> = attempts.iter().filter(|a| a.quiz_id == quiz_id).collect();
    let attempt_count = relevant.len();

    if attempt_count == 0 {
        return QuizStats {
            quiz_id,
            attempt_count: 0,
            pass_count: 0,
            average_percentage: 0,
            average_time_taken: 0,
        };
    }

    let pass_count = relevant.iter().filter(|a| a.passed).count();
    let total_percentage: f64 = relevant.iter().map(|a| a.percentage).sum();
    let total_time: i64 = relevant.iter().map(|a| a.time_taken).sum();

    QuizStats {
        quiz_id,
        attempt_count,
        pass_count,
        average_percentage: (total_percentage / attempt_count as f64).round() as i64,
        average_time_taken: (total_time as f64 / attempt_count as f64).round() as i64,
    }
}

/// Best attempt and history for one student on one quiz.
///
/// Best is the highest percentage; on a tie the later submission wins.
pub fn student_quiz_summary(quiz_id: i64, student_id: &str, attempts: Vec<Attempt>) -> StudentQuizSummary {
    let mut history: Vec<Attempt> = attempts
        .into_iter()
        .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
        .collect();
    history.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));

    // History is newest first, so the first maximum seen is the most recent one.
    let best_attempt = history
        .iter()
        .fold(None::<&Attempt>, |best, a| match best {
            Some(b) if b.percentage >= a.percentage => Some(b),
            _ => Some(a),
        })
        .cloned();

    StudentQuizSummary {
        quiz_id,
        student_id: student_id.to_string(),
        attempt_count: history.len(),
        best_attempt,
        history,
    }
}

/// Active/inactive counts, optionally narrowed to one subject.
/// The per-subject breakdown is sorted by subject name.
pub fn quiz_overview(quizzes: &[Quiz], subject: Option<&str>) -> QuizOverview {
    let mut by_subject: BTreeMap<&str, SubjectCount> = BTreeMap::new();

    for quiz in quizzes.iter().filter(|q| subject.is_none_or(|s| q.subject == s)) {
        let entry = by_subject.entry(quiz.subject.as_str()).or_insert_with(|| SubjectCount {
            subject: quiz.subject.clone(),
            active: 0,
            inactive: 0,
        });
        if quiz.is_active {
            entry.active += 1;
        } else {
            entry.inactive += 1;
        }
    }

    let by_subject: Vec<SubjectCount> = by_subject.into_values().collect();
    let active = by_subject.iter().map(|s| s.active).sum();
    let inactive = by_subject.iter().map(|s| s.inactive).sum();

    QuizOverview {
        subject: subject.map(str::to_string),
        total: active + inactive,
        active,
        inactive,
        by_subject,
    }
}

/// Resolves each attempt's quiz reference. Attempts whose quiz has since been
/// removed keep `quiz: None`.
pub fn join_quiz_metadata(attempts: Vec<Attempt>, quizzes: &[Quiz]) -> Vec<AttemptWithQuiz> {
    let index: HashMap<i64, &Quiz> = quizzes.iter().map(|q| (q.id, q)).collect();

    attempts
        .into_iter()
        .map(|attempt| {
            let quiz = index.get(&attempt.quiz_id).map(|q| QuizMeta::from(*q));
            AttemptWithQuiz { attempt, quiz }
        })
        .collect()
}

/// Distinct quiz ids referenced by `attempts`, in first-seen order.
pub fn referenced_quiz_ids(attempts: &[Attempt]) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();
    for attempt in attempts {
        if !ids.contains(&attempt.quiz_id) {
            ids.push(attempt.quiz_id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{attempt::AttemptStatus, quiz::QuizRow};
    use chrono::{Duration, TimeZone, Utc};
    use sqlx::types::Json;

    fn attempt(id: i64, quiz_id: i64, student: &str, percentage: f64, minutes_after: i64) -> Attempt {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        Attempt {
            id,
            quiz_id,
            student_id: student.to_string(),
            answers: Json(vec![]),
            detailed_answers: Json(vec![]),
            score: 0,
            percentage,
            total_questions: 4,
            time_taken: 10 + id,
            passed: percentage >= 60.0,
            status: AttemptStatus::Completed,
            submitted_at: base + Duration::minutes(minutes_after),
        }
    }

    fn quiz(id: i64, subject: &str, active: bool) -> Quiz {
        Quiz::assemble(
            QuizRow {
                id,
                title: format!("Quiz {}", id),
                description: None,
                subject: subject.to_string(),
                class_level: "6".to_string(),
                creator: "mr_patil".to_string(),
                time_limit: 20,
                passing_score: 60.0,
                allow_retake: true,
                show_correct_answers: true,
                is_active: active,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            vec![],
        )
    }

    #[test]
    fn test_stats_for_empty_quiz_are_zero() {
        let stats = quiz_stats(1, &[]);
        assert_eq!(stats.attempt_count, 0);
        assert_eq!(stats.average_percentage, 0);
        assert_eq!(stats.average_time_taken, 0);
    }

    #[test]
    fn test_stats_round_averages() {
        let attempts = vec![
            attempt(1, 1, "asha", 75.0, 0),
            attempt(2, 1, "ravi", 50.0, 1),
            attempt(3, 1, "meera", 66.67, 2),
            attempt(4, 2, "asha", 100.0, 3),
        ];
        let stats = quiz_stats(1, &attempts);
        assert_eq!(stats.attempt_count, 3);
        assert_eq!(stats.pass_count, 2);
        // (75 + 50 + 66.67) / 3 = 63.89
        assert_eq!(stats.average_percentage, 64);
        // (11 + 12 + 13) / 3
        assert_eq!(stats.average_time_taken, 12);
    }

    #[test]
    fn test_best_attempt_tie_goes_to_latest() {
        let attempts = vec![
            attempt(1, 1, "asha", 80.0, 0),
            attempt(2, 1, "asha", 50.0, 5),
            attempt(3, 1, "asha", 80.0, 10),
            attempt(4, 1, "ravi", 100.0, 15),
        ];
        let summary = student_quiz_summary(1, "asha", attempts);
        assert_eq!(summary.attempt_count, 3);
        assert_eq!(summary.best_attempt.map(|a| a.id), Some(3));
        let order: Vec<i64> = summary.history.iter().map(|a| a.id).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_summary_without_attempts() {
        let summary = student_quiz_summary(1, "asha", vec![]);
        assert!(summary.best_attempt.is_none());
        assert!(summary.history.is_empty());
    }

    #[test]
    fn test_overview_counts_and_filter() {
        let quizzes = vec![
            quiz(1, "Science", true),
            quiz(2, "Science", false),
            quiz(3, "History", true),
        ];

        let all = quiz_overview(&quizzes, None);
        assert_eq!((all.total, all.active, all.inactive), (3, 2, 1));
        assert_eq!(all.by_subject[0].subject, "History");
        assert_eq!(all.by_subject[1].active, 1);
        assert_eq!(all.by_subject[1].inactive, 1);

        let science = quiz_overview(&quizzes, Some("Science"));
        assert_eq!((science.total, science.active, science.inactive), (2, 1, 1));
        assert_eq!(science.by_subject.len(), 1);
    }

    #[test]
    fn test_join_keeps_orphans() {
        let attempts = vec![attempt(1, 1, "asha", 75.0, 0), attempt(2, 9, "asha", 50.0, 1)];
        let joined = join_quiz_metadata(attempts, &[quiz(1, "Science", true)]);
        assert_eq!(joined[0].quiz.as_ref().map(|q| q.title.as_str()), Some("Quiz 1"));
        assert!(joined[1].quiz.is_none());
    }

    #[test]
    fn test_referenced_ids_are_distinct() {
        let attempts = vec![
            attempt(1, 2, "asha", 75.0, 0),
            attempt(2, 1, "asha", 50.0, 1),
            attempt(3, 2, "asha", 50.0, 2),
        ];
        assert_eq!(referenced_quiz_ids(&attempts), vec![2, 1]);
    }
}
