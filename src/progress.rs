use crate::models::EnrollmentStatus;

/// Outcome of a progress recomputation for one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percent: i32,
    pub status: EnrollmentStatus,
}

/// compute_progress
///
/// `round(100 * completed / total)`, rounding halves up, with the course marked complete only
/// when every item is done. A course with no items is reported as 0% and in progress.
/// `completed` is clamped to `total` so a stale completion row can never push past 100%.
///
/// The same arithmetic is expressed in SQL by [`PROGRESS_SQL`]; keep them in step.
pub fn compute_progress(completed: i64, total: i64) -> Progress {
    if total <= 0 {
        return Progress {
            percent: 0,
            status: EnrollmentStatus::InProgress,
        };
    }

    let completed = completed.clamp(0, total);
    let percent = (200 * completed + total) / (2 * total);

    Progress {
        percent: percent as i32,
        status: if completed == total {
            EnrollmentStatus::Completed
        } else {
            EnrollmentStatus::InProgress
        },
    }
}

/// The atomic recomputation statement.
///
/// Counts the course's items and the user's completions in the same statement that writes the
/// enrollment, so the write can never be based on counts read by an earlier statement.
/// `$1` = user id, `$2` = course id.
pub const PROGRESS_SQL: &str = r#"
    WITH totals AS (
        SELECT
            (SELECT COUNT(*) FROM course_items ci WHERE ci.course_id = $2) AS total,
            (
                (SELECT COUNT(*)
                   FROM module_progresses mp
                   JOIN course_items ci ON ci.module_id = mp.module_id
                  WHERE ci.course_id = $2
                    AND mp.user_id = $1
                    AND mp.completed_at IS NOT NULL)
              + (SELECT COUNT(*)
                   FROM workshop_submissions ws
                   JOIN course_items ci ON ci.workshop_id = ws.workshop_id
                  WHERE ci.course_id = $2
                    AND ws.user_id = $1)
            ) AS completed
    )
    UPDATE enrollments e
       SET progress_percent = CASE
               WHEN t.total = 0 THEN 0
               ELSE ((200 * LEAST(t.completed, t.total) + t.total) / (2 * t.total))::INTEGER
           END,
           status = CASE
               WHEN t.total > 0 AND t.completed >= t.total THEN 'COMPLETED'::enrollment_status
               ELSE 'IN_PROGRESS'::enrollment_status
           END,
           updated_at = NOW()
      FROM totals t
     WHERE e.user_id = $1 AND e.course_id = $2
    RETURNING e.id, e.user_id, e.course_id, e.progress_percent, e.status, e.enrolled_at, e.updated_at
"#;

/// Recomputes every enrollment of course `$1` in one statement, for changes to the item set.
/// Callers lock the enrollment rows first so the counts include any completion committed
/// while they waited.
pub const COURSE_PROGRESS_SQL: &str = r#"
    WITH totals AS (
        SELECT COUNT(*) AS total FROM course_items WHERE course_id = $1
    ),
    done AS (
        SELECT e.id AS enrollment_id,
               (
                   (SELECT COUNT(*)
                      FROM module_progresses mp
                      JOIN course_items ci ON ci.module_id = mp.module_id
                     WHERE ci.course_id = $1
                       AND mp.user_id = e.user_id
                       AND mp.completed_at IS NOT NULL)
                 + (SELECT COUNT(*)
                      FROM workshop_submissions ws
                      JOIN course_items ci ON ci.workshop_id = ws.workshop_id
                     WHERE ci.course_id = $1
                       AND ws.user_id = e.user_id)
               ) AS completed
          FROM enrollments e
         WHERE e.course_id = $1
    )
    UPDATE enrollments e
       SET progress_percent = CASE
               WHEN t.total = 0 THEN 0
               ELSE ((200 * LEAST(d.completed, t.total) + t.total) / (2 * t.total))::INTEGER
           END,
           status = CASE
               WHEN t.total > 0 AND d.completed >= t.total THEN 'COMPLETED'::enrollment_status
               ELSE 'IN_PROGRESS'::enrollment_status
           END,
           updated_at = NOW()
      FROM done d, totals t
     WHERE e.id = d.enrollment_id
"#;
