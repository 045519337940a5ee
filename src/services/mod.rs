pub(crate) mod exam_grading;
pub(crate) mod login_guard;
pub(crate) mod question_editing;
pub(crate) mod review_scheduler;
pub(crate) mod share_codes;
pub(crate) mod sync;
