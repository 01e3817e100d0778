use uuid::Uuid;

/// Separates the app id prefix from the unique suffix in a task id.
///
/// App ids may themselves contain the delimiter; extraction always
/// splits at the last occurrence, and the UUID suffix never contains
/// one.
pub const TASK_ID_DELIMITER: char = '.';

/// Generate a fresh task id carrying the app id as its prefix.
#[must_use]
pub fn new_task_id(app_id: &str) -> String {
    format!("{app_id}{TASK_ID_DELIMITER}{}", Uuid::new_v4())
}

/// Extract the app id encoded in a task id, if well-formed.
#[must_use]
pub fn app_id_for_task(task_id: &str) -> Option<&str> {
    task_id
        .rsplit_once(TASK_ID_DELIMITER)
        .map(|(app_id, _)| app_id)
        .filter(|app_id| !app_id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_app_ids() {
        let task_id = new_task_id("web");
        assert_eq!(app_id_for_task(&task_id), Some("web"));
    }

    #[test]
    fn round_trips_dotted_app_ids() {
        let task_id = new_task_id("prod.api.v2");
        assert_eq!(app_id_for_task(&task_id), Some("prod.api.v2"));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(app_id_for_task("no-delimiter"), None);
        assert_eq!(app_id_for_task(".orphan-suffix"), None);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = new_task_id("web");
        let b = new_task_id("web");
        assert_ne!(a, b);
    }
}
