//! Field rules shared by poll creation and update.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{PollError, PollResult};

pub const MIN_OPTIONS: usize = 2;

pub fn question(question: &str) -> PollResult<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(PollError::validation("Poll question is required"));
    }

    Ok(question.to_owned())
}

/// Trims every option and checks the set: at least two, none empty, no repeats.
pub fn options(options: &[String]) -> PollResult<Vec<String>> {
    if options.len() < MIN_OPTIONS {
        return Err(PollError::validation("A poll must have at least two options"));
    }

    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(options.len());

    for (i, option) in options.iter().enumerate() {
        let option = option.trim();

        if option.is_empty() {
            return Err(PollError::validation(format!("Option {} was empty", i + 1)));
        }
        if !seen.insert(option) {
            return Err(PollError::validation(format!("Option '{}' appears more than once", option)));
        }

        result.push(option.to_owned());
    }

    Ok(result)
}

pub fn allowed_selections(allowed: i64, option_count: usize) -> PollResult<i32> {
    if allowed < 1 {
        return Err(PollError::validation("Allowed selections must be at least 1"));
    }
    if allowed > option_count as i64 {
        return Err(PollError::validation("Allowed selections cannot exceed the number of options"));
    }

    Ok(allowed as i32)
}

pub fn end_time(end: DateTime<Utc>, now: DateTime<Utc>) -> PollResult<DateTime<Utc>> {
    if end <= now {
        return Err(PollError::validation("End time must be in the future"));
    }

    Ok(end)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn texts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_are_trimmed_and_must_be_distinct() {
        assert_eq!(options(&texts(&[" Pizza ", "Sushi"])).unwrap(), texts(&["Pizza", "Sushi"]));
        assert!(options(&texts(&["Pizza"])).is_err());
        assert!(options(&texts(&["Pizza", "  "])).is_err());
        assert!(options(&texts(&["Pizza", "Pizza "])).is_err());
        // Case matters for option identity.
        assert!(options(&texts(&["pizza", "Pizza"])).is_ok());
    }

    #[test]
    fn allowed_selections_stays_within_option_count() {
        assert!(allowed_selections(0, 3).is_err());
        assert!(allowed_selections(4, 3).is_err());
        assert_eq!(allowed_selections(3, 3).unwrap(), 3);
    }

    #[test]
    fn end_time_must_be_strictly_later() {
        let now = Utc::now();
        assert!(end_time(now, now).is_err());
        assert!(end_time(now - Duration::seconds(1), now).is_err());
        assert!(end_time(now + Duration::seconds(1), now).is_ok());
    }

    #[test]
    fn blank_question_is_rejected() {
        assert!(question(" \t").is_err());
        assert_eq!(question(" Lunch? ").unwrap(), "Lunch?");
    }
}
