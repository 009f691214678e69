/// Returns the instant a pending event becomes eligible for re-dispatch.
///
/// The window grows linearly with the retry count: `updated_at + deadline × retry_count`.
/// `None` when that instant is not representable; such an event never becomes due.
pub fn next_due_at(
    updated_at: time::OffsetDateTime,
    deadline: time::Duration,
    retry_count: i32,
) -> Option<time::OffsetDateTime> {
    let window = deadline.checked_mul(retry_count.max(0))?;
    updated_at.checked_add(window)
}

/// Whether a pending event is overdue at `now`.
pub fn is_overdue(
    updated_at: time::OffsetDateTime,
    deadline: time::Duration,
    retry_count: i32,
    now: time::OffsetDateTime,
) -> bool {
    next_due_at(updated_at, deadline, retry_count).is_some_and(|due| due < now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_due_grows_with_retries() {
        let updated = datetime!(2024-05-01 12:00 UTC);
        let deadline = time::Duration::minutes(5);

        assert_eq!(next_due_at(updated, deadline, 0), Some(updated));
        assert_eq!(
            next_due_at(updated, deadline, 1),
            Some(datetime!(2024-05-01 12:05 UTC))
        );
        assert_eq!(
            next_due_at(updated, deadline, 3),
            Some(datetime!(2024-05-01 12:15 UTC))
        );
    }

    #[test]
    fn test_overdue_is_strict() {
        let updated = datetime!(2024-05-01 12:00 UTC);
        let deadline = time::Duration::minutes(5);

        assert!(!is_overdue(updated, deadline, 2, datetime!(2024-05-01 12:10 UTC)));
        assert!(is_overdue(updated, deadline, 2, datetime!(2024-05-01 12:10:01 UTC)));
        assert!(!is_overdue(updated, deadline, 2, datetime!(2024-05-01 12:09 UTC)));
    }

    #[test]
    fn test_negative_retry_count_treated_as_zero() {
        let updated = datetime!(2024-05-01 12:00 UTC);
        assert_eq!(
            next_due_at(updated, time::Duration::minutes(5), -2),
            Some(updated)
        );
    }

    #[test]
    fn test_out_of_range_window_is_never_due() {
        let updated = datetime!(2024-05-01 12:00 UTC);
        let huge = time::Duration::seconds(1_000_000_000_000);

        assert_eq!(next_due_at(updated, huge, 1), None);
        assert_eq!(next_due_at(updated, time::Duration::MAX, 2), None);
        assert!(!is_overdue(updated, huge, 1, datetime!(9999-12-31 23:59 UTC)));
    }
}
