/// Apps shown when `/list-apps` returns any of them.
pub const DEFAULT_ALLOWED_APPS: &[&str] = &[
    "my_agent",
    "sequential_workflow",
    "parallel_workflow",
    "loop_workflow",
];

/// Keep the allowed apps, in backend order. If none of them is present,
/// keep every app that is not internal (`__` prefix).
pub fn filter_apps(apps: &[String], allowed: &[String]) -> Vec<String> {
    let selected: Vec<String> = apps
        .iter()
        .filter(|app| allowed.iter().any(|a| a == *app))
        .cloned()
        .collect();
    if !selected.is_empty() {
        return selected;
    }
    apps.iter()
        .filter(|app| !app.starts_with("__"))
        .cloned()
        .collect()
}

/// `"my_agent"` -> `"My Agent"`.
pub fn format_agent_name(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_apps_keeps_allowed() {
        let apps = strings(&["loop_workflow", "other", "my_agent", "__internal"]);
        let allowed = strings(DEFAULT_ALLOWED_APPS);
        assert_eq!(filter_apps(&apps, &allowed), strings(&["loop_workflow", "my_agent"]));
    }

    #[test]
    fn test_filter_apps_falls_back_to_public() {
        let apps = strings(&["__pycache__", "weather", "currency_converter"]);
        let allowed = strings(DEFAULT_ALLOWED_APPS);
        assert_eq!(
            filter_apps(&apps, &allowed),
            strings(&["weather", "currency_converter"])
        );
    }

    #[test]
    fn test_filter_apps_empty() {
        assert!(filter_apps(&[], &strings(DEFAULT_ALLOWED_APPS)).is_empty());
    }

    #[test]
    fn test_format_agent_name() {
        assert_eq!(format_agent_name("my_agent"), "My Agent");
        assert_eq!(format_agent_name("sequential_workflow"), "Sequential Workflow");
        assert_eq!(format_agent_name("bot"), "Bot");
        assert_eq!(format_agent_name("a__b"), "A  B");
    }
}
