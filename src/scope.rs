//! Scope resolution.
//!
//! Turns a caller-supplied [`ScopeFilter`] into the predicate every content
//! store query is constrained by. The resolver performs no authorization
//! checks — the caller has already verified the requester may see the
//! referenced buckets, courses, and files.

use crate::filter::ScopeFilter;

/// The store-level restriction a resolved scope imposes.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopePredicate {
    /// Restrict to exactly these file ids.
    Files(Vec<String>),
    /// Restrict to exactly these course ids.
    Courses(Vec<String>),
    /// Matches no content units. A filter with neither files nor courses
    /// resolves here on purpose: there is no unscoped full-corpus search.
    Nothing,
}

impl ScopePredicate {
    pub fn is_nothing(&self) -> bool {
        matches!(self, ScopePredicate::Nothing)
    }

    /// Whether a unit with the given ownership falls inside this scope.
    ///
    /// Used by in-memory filtering; the SQLite backend expresses the same
    /// predicate as SQL.
    pub fn matches(&self, file_id: &str, course_id: &str) -> bool {
        match self {
            ScopePredicate::Files(files) => files.iter().any(|f| f == file_id),
            ScopePredicate::Courses(courses) => courses.iter().any(|c| c == course_id),
            ScopePredicate::Nothing => false,
        }
    }
}

/// Resolve a filter into a [`ScopePredicate`].
///
/// File scope takes precedence over course scope when both are populated.
pub fn resolve(filter: &ScopeFilter) -> ScopePredicate {
    let files = filter.file_ids();
    if !files.is_empty() {
        return ScopePredicate::Files(files);
    }
    let courses = filter.course_ids();
    if !courses.is_empty() {
        return ScopePredicate::Courses(courses.to_vec());
    }
    ScopePredicate::Nothing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    fn filter(courses: &[&str], files: &[&str]) -> ScopeFilter {
        ScopeFilter::Standard(Filter {
            bucket_id: "b1".into(),
            courses: courses.iter().map(|s| s.to_string()).collect(),
            files: files.iter().map(|s| s.to_string()).collect(),
            documents: Vec::new(),
        })
    }

    #[test]
    fn test_files_win_over_courses() {
        let predicate = resolve(&filter(&["c1", "c2"], &["f1"]));
        assert_eq!(predicate, ScopePredicate::Files(vec!["f1".into()]));
    }

    #[test]
    fn test_courses_when_no_files() {
        let predicate = resolve(&filter(&["c1"], &[]));
        assert_eq!(predicate, ScopePredicate::Courses(vec!["c1".into()]));
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let predicate = resolve(&filter(&[], &[]));
        assert!(predicate.is_nothing());
        assert!(!predicate.matches("f1", "c1"));
    }

    #[test]
    fn test_matches_respects_variant() {
        let by_file = resolve(&filter(&[], &["f1"]));
        assert!(by_file.matches("f1", "c-other"));
        assert!(!by_file.matches("f2", "c1"));

        let by_course = resolve(&filter(&["c1"], &[]));
        assert!(by_course.matches("f-any", "c1"));
        assert!(!by_course.matches("f1", "c2"));
    }
}
