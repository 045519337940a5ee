//! Server-side view of a user's study data as a [`StudyBundle`].

use serde_json::{json, Map, Value};

use super::bundle::{Counter, Entry, ExamEntry, StudyBundle, StudyStats};
use super::merge::{merge_collections, merge_study_stats};
use crate::core::time::format_primitive;
use crate::db::models::{ExamRecord, MistakeRecord, Question, UserStats};

fn into_fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub(crate) fn question_entry(question: &Question) -> Entry {
    Entry::new(
        question.id.clone(),
        into_fields(json!({
            "content": question.content,
            "type": question.question_type,
            "options": question.options.0,
            "answer": question.answer.0,
            "explanation": question.explanation,
            "difficulty": question.difficulty,
            "tags": question.tags.0,
            "category": question.category,
            "isPublic": question.is_public,
            "version": question.version,
            "createdBy": question.created_by,
            "createdAt": format_primitive(question.created_at),
            "updatedAt": format_primitive(question.updated_at),
        })),
    )
}

pub(crate) fn mistake_entry(record: &MistakeRecord) -> Entry {
    Entry::new(
        record.id.clone(),
        into_fields(json!({
            "questionId": record.question_id,
            "question": record.question_snapshot.0,
            "userAnswer": record.user_answer.0,
            "importance": record.importance,
            "masteryLevel": record.mastery_level,
            "consecutiveCorrect": record.consecutive_correct,
            "wrongCount": record.wrong_count,
            "reviewCount": record.review_count,
            "nextReviewDate": format_primitive(record.next_review_at),
            "lastWrongDate": format_primitive(record.last_wrong_at),
            "isArchived": record.is_archived,
            "notes": record.notes,
            "tags": record.tags.0,
        })),
    )
}

pub(crate) fn exam_entry(record: &ExamRecord) -> ExamEntry {
    ExamEntry {
        date: format_primitive(record.completed_at),
        fields: into_fields(json!({
            "id": record.id,
            "title": record.title,
            "score": record.score,
            "grade": record.grade,
            "totalQuestions": record.total_questions,
            "correctCount": record.correct_count,
            "duration": record.duration_seconds,
        })),
    }
}

/// Rows loaded for one user's export.
pub(crate) struct ServerRows<'a> {
    pub(crate) public_questions: &'a [Question],
    pub(crate) personal_questions: &'a [Question],
    pub(crate) mistakes: &'a [MistakeRecord],
    pub(crate) exams: &'a [ExamRecord],
    pub(crate) stats: UserStats,
}

/// Builds the export bundle: rows from the database come first, then
/// anything only the stored document knows about.
pub(crate) fn compose_bundle(stored: StudyBundle, rows: ServerRows<'_>) -> StudyBundle {
    let by_id = |entry: &Entry| entry.id.clone();

    let public = merge_collections(
        rows.public_questions.iter().map(question_entry).collect(),
        stored.public_questions,
        by_id,
    );
    let personal = merge_collections(
        rows.personal_questions.iter().map(question_entry).collect(),
        stored.personal_questions,
        by_id,
    );
    let mistakes = merge_collections(
        rows.mistakes.iter().map(mistake_entry).collect(),
        stored.mistake_bank,
        by_id,
    );

    let server_stats = StudyStats {
        total_questions: non_negative(rows.stats.total_questions),
        correct_answers: non_negative(rows.stats.correct_answers),
        total_study_time: non_negative(rows.stats.study_time_seconds),
        exam_records: rows.exams.iter().map(exam_entry).collect(),
        extra: Map::new(),
    };
    let (study_stats, _) = merge_study_stats(server_stats, stored.study_stats);

    StudyBundle {
        public_questions: public.items,
        personal_questions: personal.items,
        mistake_bank: mistakes.items,
        study_stats,
    }
}

fn non_negative(value: i64) -> Counter {
    Counter::from(u64::try_from(value).unwrap_or(0))
}
